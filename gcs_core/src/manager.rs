//! Plugin manager
//!
//! Owns everything the extension system needs at runtime and runs the
//! startup and shutdown pipelines:
//!
//! ```text
//! discover -> apply_arguments -> load_plugins -> run_tests -> ... -> shutdown
//! ```

use crate::arguments::{
    ArgumentError, PluginArguments, NO_LOAD_OPTION, TEST_ALL, TEST_OPTION,
};
use crate::config::ManagerConfig;
use crate::descriptor;
use crate::diagnostics::{DiagnosticsSink, TracingSink};
use crate::error::PluginResult;
use crate::lifecycle::{LifecycleSupervisor, TestReport, TestSelection};
use crate::loader::{LibraryLoader, NativeLoader};
use crate::plugin::{ObjectPool, PluginSpec, PluginState};
use crate::registry::PluginRegistry;
use parking_lot::{RwLock, RwLockReadGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Entry point of the extension system
pub struct PluginManager {
    config: ManagerConfig,
    registry: Arc<RwLock<PluginRegistry>>,
    pool: ObjectPool,
    sink: Arc<dyn DiagnosticsSink>,
    supervisor: LifecycleSupervisor,
    test_selection: Option<TestSelection>,
    running: bool,
}

impl PluginManager {
    pub fn new(
        config: ManagerConfig,
        loader: Arc<dyn LibraryLoader>,
        sink: Arc<dyn DiagnosticsSink>,
    ) -> Self {
        let registry = Arc::new(RwLock::new(PluginRegistry::new()));
        let pool = ObjectPool::new();
        let supervisor =
            LifecycleSupervisor::new(registry.clone(), loader, pool.clone(), sink.clone())
                .with_hook_timeout(config.hook_timeout())
                .with_shutdown_timeout(config.shutdown_timeout());

        Self {
            config,
            registry,
            pool,
            sink,
            supervisor,
            test_selection: None,
            running: false,
        }
    }

    /// Native libraries, diagnostics to `tracing`
    pub fn with_defaults(config: ManagerConfig) -> Self {
        Self::new(config, Arc::new(NativeLoader::new()), Arc::new(TracingSink))
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn add_plugin_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.config.plugin_paths.contains(&path) {
            self.config.plugin_paths.push(path);
        }
    }

    /// Scan the plugin paths for descriptors and register them
    ///
    /// Directories are walked recursively in sorted order so discovery order
    /// is stable. Returns the number of newly registered descriptors.
    pub fn discover(&mut self) -> usize {
        let mut found = Vec::new();
        for directory in &self.config.plugin_paths {
            if let Err(e) =
                collect_descriptors(directory, &self.config.descriptor_extension, &mut found)
            {
                self.sink.warning(
                    "",
                    format!(
                        "Cannot scan plugin directory {}: {}",
                        directory.display(),
                        e
                    ),
                );
            }
        }

        let mut registered = 0;
        for path in found {
            let known = self
                .registry
                .read()
                .all()
                .iter()
                .any(|spec| spec.descriptor_path() == path);
            if !known {
                self.add_descriptor(&path);
                registered += 1;
            }
        }

        self.sink.debug(
            "",
            format!("Discovered {} plugin descriptors", registered),
        );
        registered
    }

    /// Parse one descriptor and register it, failed or not
    pub fn add_descriptor(&mut self, path: &Path) -> usize {
        let spec = match descriptor::parse_file(path) {
            Ok(descriptor) => PluginSpec::new(descriptor, path),
            Err(error) => PluginSpec::invalid(path, error),
        };
        self.add_spec(spec)
    }

    /// Register a spec, applying the configured enable flags
    pub fn add_spec(&mut self, spec: PluginSpec) -> usize {
        let mut registry = self.registry.write();
        let index = registry.register(spec);

        let spec = registry.spec_mut(index);
        if let Some(error) = spec.error() {
            self.sink.error(spec.name(), error.to_string());
            return index;
        }
        if self.config.disabled_plugins.iter().any(|n| n == spec.name()) {
            spec.set_enabled(false);
        } else if spec.is_experimental()
            && self
                .config
                .enabled_experimental
                .iter()
                .any(|n| n == spec.name())
        {
            spec.set_enabled(true);
        }
        self.sink.debug(
            spec.name(),
            format!(
                "Read {} from {}",
                spec.version(),
                spec.descriptor_path().display()
            ),
        );
        index
    }

    /// Apply `-pluginpath`, `-noload`, `-test` and plugin options
    ///
    /// Directories given with `-pluginpath` are added to the search paths and
    /// scanned first, so their plugins can be named by the other options.
    /// The remaining options are all validated before any plugin changes.
    pub fn apply_arguments(&mut self, args: &PluginArguments) -> Result<(), ArgumentError> {
        let new_paths: Vec<PathBuf> = args
            .plugin_paths()
            .iter()
            .filter(|path| !self.config.plugin_paths.contains(path))
            .cloned()
            .collect();
        if !new_paths.is_empty() {
            for path in new_paths {
                self.add_plugin_path(path);
            }
            self.discover();
        }

        let mut registry = self.registry.write();

        for name in args.no_load() {
            if !registry.contains(name) {
                return Err(ArgumentError::UnknownPlugin {
                    option: NO_LOAD_OPTION.to_string(),
                    plugin: name.clone(),
                });
            }
        }
        for name in args.tests() {
            if name != TEST_ALL && !registry.contains(name) {
                return Err(ArgumentError::UnknownPlugin {
                    option: TEST_OPTION.to_string(),
                    plugin: name.clone(),
                });
            }
        }

        let mut routes = Vec::new();
        for (option, value) in args.options() {
            let mut declared = false;
            for spec in registry.all().iter().filter(|spec| !spec.has_error()) {
                let Some(argument) = spec
                    .descriptor()
                    .arguments
                    .iter()
                    .find(|argument| argument.name == *option)
                else {
                    continue;
                };
                if argument.takes_value() && value.is_empty() {
                    return Err(ArgumentError::MissingOptionValue {
                        option: option.clone(),
                        parameter: argument.parameter.clone(),
                    });
                }
                routes.push((spec.index(), option.clone(), value.clone()));
                declared = true;
            }
            if !declared {
                return Err(ArgumentError::UnknownOption(option.clone()));
            }
        }

        for name in args.no_load() {
            if let Some(index) = registry.index_of(name) {
                registry.spec_mut(index).set_enabled(false);
            }
        }
        for (index, option, value) in routes {
            registry.spec_mut(index).push_argument(option, value);
        }
        self.test_selection = args.test_selection();

        Ok(())
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> PluginResult<()> {
        self.registry.write().set_enabled(name, enabled)
    }

    /// Resolve, load, initialize and start every plugin
    ///
    /// Plugin failures are recorded on their specs; only a call in the wrong
    /// state is an error.
    pub fn load_plugins(&mut self) -> PluginResult<()> {
        self.supervisor.resolve()?;
        self.supervisor.load_libraries()?;
        self.running = true;
        self.supervisor.initialize_plugins()?;
        self.supervisor.extensions_initialized()?;

        let stats = self.registry.read().stats();
        self.sink.info(
            "",
            format!(
                "{} of {} plugins running",
                stats.running, stats.total_plugins
            ),
        );
        Ok(())
    }

    /// Run the self tests selected with `-test`
    pub fn run_tests(&self) -> PluginResult<Option<TestReport>> {
        match &self.test_selection {
            Some(selection) => self.supervisor.run_tests(selection).map(Some),
            None => Ok(None),
        }
    }

    /// Stop and delete every plugin in reverse load order
    pub fn shutdown(&mut self) -> PluginResult<()> {
        if !self.running {
            return Ok(());
        }
        self.running = false;
        self.supervisor.stop_plugins()?;
        self.supervisor.delete_plugins()?;
        self.sink.info("", "All plugins shut down".to_string());
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Configured required plugins that did not reach `Running`
    pub fn missing_required(&self) -> Vec<String> {
        let registry = self.registry.read();
        self.config
            .required_plugins
            .iter()
            .filter(|name| {
                registry
                    .find_by_name(name)
                    .map(|spec| spec.state() != PluginState::Running)
                    .unwrap_or(true)
            })
            .cloned()
            .collect()
    }

    pub fn registry(&self) -> RwLockReadGuard<'_, PluginRegistry> {
        self.registry.read()
    }

    pub fn shared_registry(&self) -> Arc<RwLock<PluginRegistry>> {
        self.registry.clone()
    }

    pub fn object_pool(&self) -> &ObjectPool {
        &self.pool
    }

    /// Stage level access to the lifecycle
    pub fn supervisor(&self) -> &LifecycleSupervisor {
        &self.supervisor
    }
}

impl Drop for PluginManager {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!("Plugin shutdown failed: {}", e);
        }
    }
}

fn collect_descriptors(
    directory: &Path,
    extension: &str,
    found: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    let mut entries = std::fs::read_dir(directory)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_descriptors(&path, extension, found)?;
        } else if path.extension().is_some_and(|ext| ext == extension) {
            found.push(path);
        }
    }
    Ok(())
}
