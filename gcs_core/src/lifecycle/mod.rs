//! Lifecycle supervision
//!
//! The supervisor drives resolved specs through
//! `Loaded -> Initialized -> Running -> Stopped -> Deleted` in stages. Each
//! stage first checks that every healthy spec sits in the stage's starting
//! state and returns [`PluginError::InvalidStateTransition`] without touching
//! anything if one does not.
//!
//! Startup stages walk the load queue front to back, shutdown stages back to
//! front. A failure is recorded on the spec and handed on to everything that
//! requires it; the rest of the queue carries on.

mod hooks;

pub use hooks::{HookOutcome, HookRunner};
pub(crate) use hooks::panic_message;

use crate::config::DEFAULT_HOOK_TIMEOUT_MS;
use crate::descriptor::DependencyKind;
use crate::diagnostics::DiagnosticsSink;
use crate::error::{PluginError, PluginResult};
use crate::loader::LibraryLoader;
use crate::plugin::{
    ObjectPool, PluginContext, PluginInstance, PluginState, SharedPlugin, ShutdownFlag,
    ShutdownHandle,
};
use crate::registry::PluginRegistry;
use crate::resolver;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default time granted to asynchronous shutdowns
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Default upper bound for a single hook call
pub const DEFAULT_HOOK_TIMEOUT: Duration = Duration::from_millis(DEFAULT_HOOK_TIMEOUT_MS);

/// Which plugins `run_tests` covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TestSelection {
    All,
    Plugins(Vec<String>),
}

impl TestSelection {
    pub fn includes(&self, name: &str) -> bool {
        match self {
            TestSelection::All => true,
            TestSelection::Plugins(names) => names.iter().any(|n| n == name),
        }
    }
}

/// Results of plugin self tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestReport {
    pub passed: Vec<String>,
    /// `(plugin, reason)`
    pub failed: Vec<(String, String)>,
}

impl TestReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.passed.len() + self.failed.len()
    }
}

/// Drives plugins through their lifecycle
pub struct LifecycleSupervisor {
    registry: Arc<RwLock<PluginRegistry>>,
    loader: Arc<dyn LibraryLoader>,
    pool: ObjectPool,
    sink: Arc<dyn DiagnosticsSink>,
    hooks: HookRunner,
    shutdown_timeout: Duration,
}

impl LifecycleSupervisor {
    pub fn new(
        registry: Arc<RwLock<PluginRegistry>>,
        loader: Arc<dyn LibraryLoader>,
        pool: ObjectPool,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        Self {
            registry,
            loader,
            pool,
            sink,
            hooks: HookRunner::new(Some(DEFAULT_HOOK_TIMEOUT)),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Bound every hook call; `None` runs hooks inline without a bound
    pub fn with_hook_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.hooks = HookRunner::new(timeout);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<RwLock<PluginRegistry>> {
        &self.registry
    }

    /// `Read -> Resolved`: link dependencies and compute the load queue
    pub fn resolve(&self) -> PluginResult<()> {
        let mut registry = self.registry.write();
        resolver::resolve(&mut registry, &*self.sink)
    }

    /// `Resolved -> Loaded`: create plugin objects in load order
    ///
    /// Specs disabled since resolution stay `Resolved` and their dependents
    /// fail.
    pub fn load_libraries(&self) -> PluginResult<()> {
        let queue = self.expect_state(PluginState::Resolved, PluginState::Loaded)?;

        for index in queue {
            let (name, library_path, enabled) = {
                let registry = self.registry.read();
                let spec = &registry.all()[index];
                if spec.has_error() {
                    continue;
                }
                (spec.name().to_string(), spec.library_path(), spec.is_enabled())
            };

            if !enabled {
                self.sink
                    .info(&name, "Disabled after resolution, not loading".to_string());
                self.fail_dependents(&mut self.registry.write(), index);
                continue;
            }

            let loaded = self.loader.load(&name, &library_path);

            let mut registry = self.registry.write();
            match loaded {
                Ok(loaded) => {
                    let spec = registry.spec_mut(index);
                    spec.set_instance(PluginInstance::new(loaded));
                    spec.advance(PluginState::Loaded)?;
                    self.sink.debug(&name, "Loaded".to_string());
                }
                Err(error) => self.fail(&mut registry, index, error),
            }
        }

        Ok(())
    }

    /// `Loaded -> Initialized`: call `initialize` in load order
    pub fn initialize_plugins(&self) -> PluginResult<()> {
        let queue = self.expect_state(PluginState::Loaded, PluginState::Initialized)?;

        for index in queue {
            let Some((name, plugin, ctx)) = self.hook_target(index) else {
                continue;
            };

            let outcome = self.hooks.run(&name, plugin, move |p| p.initialize(&ctx));

            let mut registry = self.registry.write();
            let failure = match outcome {
                HookOutcome::Completed(Ok(())) => None,
                HookOutcome::Completed(Err(message)) => Some(message),
                HookOutcome::Failed(message) => Some(message),
                HookOutcome::TimedOut => {
                    abandon(&mut registry, index);
                    Some(self.timeout_message())
                }
            };

            match failure {
                None => {
                    registry.spec_mut(index).advance(PluginState::Initialized)?;
                    self.sink.debug(&name, "Initialized".to_string());
                }
                Some(message) => {
                    self.fail(&mut registry, index, PluginError::InitializeFailed(message))
                }
            }
        }

        Ok(())
    }

    /// `Initialized -> Running`: call `extensions_initialized` in load order
    pub fn extensions_initialized(&self) -> PluginResult<()> {
        let queue = self.expect_state(PluginState::Initialized, PluginState::Running)?;

        for index in queue {
            let Some((name, plugin, ctx)) = self.hook_target(index) else {
                continue;
            };

            let outcome = self
                .hooks
                .run(&name, plugin, move |p| p.extensions_initialized(&ctx));

            let mut registry = self.registry.write();
            let failure = match outcome {
                HookOutcome::Completed(()) => None,
                HookOutcome::Failed(message) => Some(message),
                HookOutcome::TimedOut => {
                    abandon(&mut registry, index);
                    Some(self.timeout_message())
                }
            };

            match failure {
                None => {
                    registry.spec_mut(index).advance(PluginState::Running)?;
                    self.sink.info(&name, "Running".to_string());
                }
                Some(message) => self.fail(
                    &mut registry,
                    index,
                    PluginError::ExtensionsInitializedFailed(message),
                ),
            }
        }

        Ok(())
    }

    /// `Running -> Stopped`: call `about_to_shutdown` in reverse load order
    ///
    /// Waits for asynchronous shutdowns, bounded by the shutdown timeout.
    /// Misbehaving hooks only produce warnings.
    pub fn stop_plugins(&self) -> PluginResult<()> {
        let queue = self.expect_state(PluginState::Running, PluginState::Stopped)?;
        let mut pending: Vec<(String, ShutdownHandle)> = Vec::new();

        for index in queue.into_iter().rev() {
            let Some((name, plugin, _)) = self.hook_target(index) else {
                continue;
            };

            let outcome = self.hooks.run(&name, plugin, |p| p.about_to_shutdown());

            let mut registry = self.registry.write();
            match outcome {
                HookOutcome::Completed(ShutdownFlag::Synchronous) => {}
                HookOutcome::Completed(ShutdownFlag::Asynchronous(handle)) => {
                    pending.push((name.clone(), handle));
                }
                HookOutcome::Failed(message) => {
                    self.sink
                        .warning(&name, format!("Shutdown hook failed: {}", message));
                }
                HookOutcome::TimedOut => {
                    abandon(&mut registry, index);
                    self.sink.warning(
                        &name,
                        format!("Shutdown hook {}", self.timeout_message()),
                    );
                }
            }
            registry.spec_mut(index).advance(PluginState::Stopped)?;
            self.sink.debug(&name, "Stopped".to_string());
        }

        let deadline = Instant::now() + self.shutdown_timeout;
        for (name, handle) in pending {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !handle.wait(Some(remaining)) {
                self.sink.warning(
                    &name,
                    format!(
                        "Asynchronous shutdown did not finish within {:?}",
                        self.shutdown_timeout
                    ),
                );
            }
        }

        Ok(())
    }

    /// `Stopped -> Deleted`: release instances, then libraries, in reverse
    /// load order
    ///
    /// Failed specs that still own an instance are released in the same pass
    /// and stay `Invalid`.
    pub fn delete_plugins(&self) -> PluginResult<()> {
        self.expect_state(PluginState::Stopped, PluginState::Deleted)?;

        // Pooled objects may carry code from the libraries about to unload
        if !self.pool.is_empty() {
            self.sink.warning(
                "",
                format!(
                    "There are still objects in the object pool: {:?}",
                    self.pool.type_names()
                ),
            );
            self.pool.clear();
        }

        let queue = self.registry.read().queue().to_vec();
        for index in queue.into_iter().rev() {
            let (name, instance) = {
                let mut registry = self.registry.write();
                let spec = registry.spec_mut(index);
                (spec.name().to_string(), spec.take_instance())
            };

            if let Some(instance) = instance {
                if instance.is_abandoned() {
                    self.sink.warning(
                        &name,
                        "Library kept loaded, a hook never returned".to_string(),
                    );
                }
                drop(instance);
            }

            let mut registry = self.registry.write();
            let spec = registry.spec_mut(index);
            if !spec.has_error() && spec.state() == PluginState::Stopped {
                spec.advance(PluginState::Deleted)?;
                self.sink.debug(&name, "Deleted".to_string());
            }
        }

        Ok(())
    }

    /// Call `self_test` on the selected running plugins
    pub fn run_tests(&self, selection: &TestSelection) -> PluginResult<TestReport> {
        let queue = {
            let registry = self.registry.read();
            let mut selected = Vec::new();
            for &index in registry.queue() {
                let spec = &registry.all()[index];
                if !selection.includes(spec.name()) || spec.has_error() {
                    continue;
                }
                if spec.state() != PluginState::Running {
                    return Err(spec.transition_error(PluginState::Running));
                }
                selected.push(index);
            }
            selected
        };

        let mut report = TestReport::default();
        for index in queue {
            let Some((name, plugin, _)) = self.hook_target(index) else {
                continue;
            };

            let failure = match self.hooks.run(&name, plugin, |p| p.self_test()) {
                HookOutcome::Completed(Ok(())) => None,
                HookOutcome::Completed(Err(message)) => Some(message),
                HookOutcome::Failed(message) => Some(message),
                HookOutcome::TimedOut => {
                    abandon(&mut self.registry.write(), index);
                    Some(self.timeout_message())
                }
            };

            match failure {
                None => {
                    self.sink.info(&name, "Self test passed".to_string());
                    report.passed.push(name);
                }
                Some(reason) => {
                    self.sink
                        .error(&name, format!("Self test failed: {}", reason));
                    report.failed.push((name, reason));
                }
            }
        }

        Ok(report)
    }

    /// Indices of the queue after checking that every healthy, enabled spec
    /// is in state `from`
    fn expect_state(&self, from: PluginState, to: PluginState) -> PluginResult<Vec<usize>> {
        let registry = self.registry.read();
        if let Some(spec) = registry
            .all()
            .iter()
            .find(|spec| spec.is_enabled() && !spec.has_error() && spec.state() != from)
        {
            return Err(spec.transition_error(to));
        }
        Ok(registry.queue().to_vec())
    }

    /// Plugin object and context of a healthy spec
    fn hook_target(&self, index: usize) -> Option<(String, SharedPlugin, PluginContext)> {
        let registry = self.registry.read();
        let spec = &registry.all()[index];
        if spec.has_error() {
            return None;
        }
        let plugin = spec.instance()?.plugin();
        let ctx = PluginContext::new(spec.name(), spec.arguments().to_vec(), self.pool.clone());
        Some((spec.name().to_string(), plugin, ctx))
    }

    fn timeout_message(&self) -> String {
        format!(
            "timed out after {:?}",
            self.hooks.timeout().unwrap_or_default()
        )
    }

    /// Record `error` on `index` and fail everything that requires it
    fn fail(&self, registry: &mut PluginRegistry, index: usize, error: PluginError) {
        let name = registry.all()[index].name().to_string();
        self.sink.error(&name, error.to_string());
        registry.fail(index, error);

        for edge in registry.graph().dependent_edges(index) {
            let dependent = &registry.all()[edge.from];
            if edge.kind == DependencyKind::Optional && !dependent.has_error() {
                self.sink.warning(
                    dependent.name(),
                    format!("Optional dependency '{}' failed to load", name),
                );
            }
        }

        self.fail_dependents(registry, index);
    }

    fn fail_dependents(&self, registry: &mut PluginRegistry, index: usize) {
        for dependent in registry.fail_dependents(index) {
            let spec = &registry.all()[dependent];
            if let Some(error) = spec.error() {
                self.sink.error(spec.name(), error.to_string());
            }
        }
    }
}

fn abandon(registry: &mut PluginRegistry, index: usize) {
    if let Some(instance) = registry.spec_mut(index).instance_mut() {
        instance.abandon();
    }
}
