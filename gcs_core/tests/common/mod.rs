//! Shared fixtures: a configurable plugin that records every hook call

#![allow(dead_code)]

use gcs_core::{
    DiagnosticsSink, ManagerConfig, MemorySink, Plugin, PluginArgumentDescription, PluginContext,
    PluginDependency, PluginDescriptor, PluginManager, PluginSpec, ShutdownFlag, ShutdownHandle,
    ShutdownNotifier, StaticLoader, VersionRange,
};
use parking_lot::Mutex;
use semver::Version;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub type Log = Arc<Mutex<Vec<String>>>;

/// Published by plugins with `publish` set
#[derive(Debug)]
pub struct Service {
    pub owner: String,
}

#[derive(Debug, Clone, Default)]
pub struct Behavior {
    pub fail_initialize: Option<String>,
    pub hang_initialize: bool,
    pub panic_extensions: bool,
    /// Notify asynchronous shutdown after this delay
    pub async_shutdown: Option<Duration>,
    /// Answer asynchronously and never notify
    pub stuck_shutdown: bool,
    pub fail_self_test: Option<String>,
    pub publish: bool,
    pub consume: bool,
}

pub struct Recorder {
    name: String,
    log: Log,
    behavior: Behavior,
    service: Option<Arc<Service>>,
    stuck: Option<ShutdownNotifier>,
}

impl Recorder {
    fn record(&self, event: &str) {
        self.log.lock().push(format!("{}:{}", event, self.name));
    }
}

impl Plugin for Recorder {
    fn initialize(&mut self, ctx: &PluginContext) -> Result<(), String> {
        self.record("init");
        for (option, value) in ctx.arguments() {
            self.log
                .lock()
                .push(format!("arg:{}:{}={}", self.name, option, value));
        }
        if self.behavior.hang_initialize {
            thread::sleep(Duration::from_secs(30));
        }
        if let Some(reason) = &self.behavior.fail_initialize {
            return Err(reason.clone());
        }
        if self.behavior.publish {
            let service = Arc::new(Service {
                owner: self.name.clone(),
            });
            ctx.object_pool().add_object(service.clone());
            self.service = Some(service);
        }
        Ok(())
    }

    fn extensions_initialized(&mut self, ctx: &PluginContext) {
        self.record("ext");
        if self.behavior.panic_extensions {
            panic!("{} cannot start", self.name);
        }
        if self.behavior.consume {
            for service in ctx.object_pool().get_objects::<Service>() {
                self.log
                    .lock()
                    .push(format!("found:{}:{}", self.name, service.owner));
            }
        }
    }

    fn about_to_shutdown(&mut self) -> ShutdownFlag {
        self.record("stop");
        if let Some(service) = self.service.take() {
            // The pool is not reachable here; leaving it published is what
            // the manager warns about
            drop(service);
        }
        if let Some(delay) = self.behavior.async_shutdown {
            let (notifier, handle) = ShutdownHandle::pair();
            let log = self.log.clone();
            let name = self.name.clone();
            thread::spawn(move || {
                thread::sleep(delay);
                log.lock().push(format!("async-done:{}", name));
                notifier.notify();
            });
            return ShutdownFlag::Asynchronous(handle);
        }
        if self.behavior.stuck_shutdown {
            let (notifier, handle) = ShutdownHandle::pair();
            self.stuck = Some(notifier);
            return ShutdownFlag::Asynchronous(handle);
        }
        ShutdownFlag::Synchronous
    }

    fn self_test(&mut self) -> Result<(), String> {
        self.record("test");
        match &self.behavior.fail_self_test {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.log.lock().push(format!("drop:{}", self.name));
    }
}

/// Plugin with default behavior logging to `log`
pub fn recorder(name: &str, log: &Log) -> Box<dyn Plugin> {
    Box::new(Recorder {
        name: name.to_string(),
        log: log.clone(),
        behavior: Behavior::default(),
        service: None,
        stuck: None,
    })
}

/// Declaration of one test plugin
#[derive(Clone)]
pub struct PluginDef {
    pub descriptor: PluginDescriptor,
    pub behavior: Behavior,
    /// Leave out of the loader so loading fails
    pub unregistered: bool,
}

pub fn plugin(name: &str) -> PluginDef {
    PluginDef {
        descriptor: PluginDescriptor::new(name, Version::new(1, 0, 0)),
        behavior: Behavior::default(),
        unregistered: false,
    }
}

impl PluginDef {
    pub fn version(mut self, version: &str) -> Self {
        self.descriptor.version = Version::parse(version).unwrap();
        self.descriptor.compat_version = self.descriptor.version.clone();
        self
    }

    pub fn depends_on(mut self, name: &str, range: &str) -> Self {
        self.descriptor = self.descriptor.with_dependency(PluginDependency::required(
            name,
            VersionRange::parse(range).unwrap(),
        ));
        self
    }

    pub fn optionally_depends_on(mut self, name: &str, range: &str) -> Self {
        self.descriptor = self.descriptor.with_dependency(PluginDependency::optional(
            name,
            VersionRange::parse(range).unwrap(),
        ));
        self
    }

    pub fn argument(mut self, name: &str, parameter: &str) -> Self {
        self.descriptor = self.descriptor.with_argument(PluginArgumentDescription {
            name: name.to_string(),
            parameter: parameter.to_string(),
            description: String::new(),
        });
        self
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn unregistered(mut self) -> Self {
        self.unregistered = true;
        self
    }
}

pub struct Harness {
    pub manager: PluginManager,
    pub log: Log,
    pub sink: Arc<MemorySink>,
}

impl Harness {
    pub fn events(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Events of one kind (`init`, `ext`, `stop`, ...) as plugin names
    pub fn events_of(&self, kind: &str) -> Vec<String> {
        let prefix = format!("{}:", kind);
        self.log
            .lock()
            .iter()
            .filter_map(|event| event.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn state(&self, name: &str) -> gcs_core::PluginState {
        self.manager.registry().find_by_name(name).unwrap().state()
    }

    pub fn error(&self, name: &str) -> Option<gcs_core::PluginError> {
        self.manager
            .registry()
            .find_by_name(name)
            .unwrap()
            .error()
            .cloned()
    }
}

pub fn build(defs: Vec<PluginDef>) -> Harness {
    build_with(defs, ManagerConfig::default())
}

pub fn build_with(defs: Vec<PluginDef>, config: ManagerConfig) -> Harness {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::new(MemorySink::new());

    let mut loader = StaticLoader::new();
    for def in defs.iter().filter(|def| !def.unregistered) {
        let name = def.descriptor.name.clone();
        let behavior = def.behavior.clone();
        let log = log.clone();
        loader.register(def.descriptor.name.clone(), move || -> Box<dyn Plugin> {
            Box::new(Recorder {
                name: name.clone(),
                log: log.clone(),
                behavior: behavior.clone(),
                service: None,
                stuck: None,
            })
        });
    }

    let sink_handle: Arc<dyn DiagnosticsSink> = sink.clone();
    let mut manager = PluginManager::new(config, Arc::new(loader), sink_handle);
    for def in defs {
        let path = format!("/virtual/{}.pluginspec", def.descriptor.name.to_lowercase());
        manager.add_spec(PluginSpec::new(def.descriptor, path));
    }

    Harness { manager, log, sink }
}
