//! Loader for plugins compiled into the host

use super::{LibraryLoader, LoadedPlugin};
use crate::error::{PluginError, PluginResult};
use crate::lifecycle::panic_message;
use crate::plugin::Plugin;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

type Factory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// Creates built-in plugins by name; the library path is ignored
#[derive(Default)]
pub struct StaticLoader {
    factories: HashMap<String, Factory>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the factory for plugin `name`, replacing an earlier one
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn with<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        self.register(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl LibraryLoader for StaticLoader {
    fn load(&self, name: &str, library_path: &Path) -> PluginResult<LoadedPlugin> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::LibraryLoadFailed {
                path: library_path.to_path_buf(),
                reason: format!("No built-in plugin named '{}'", name),
            })?;

        let plugin = panic::catch_unwind(AssertUnwindSafe(factory)).map_err(|payload| {
            PluginError::InvalidPluginType {
                path: library_path.to_path_buf(),
                reason: format!(
                    "Plugin factory panicked: {}",
                    panic_message(&*payload)
                ),
            }
        })?;

        tracing::debug!("Created built-in plugin '{}'", name);
        Ok(LoadedPlugin::built_in(plugin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::PluginContext;

    struct Idle;

    impl Plugin for Idle {
        fn initialize(&mut self, _ctx: &PluginContext) -> Result<(), String> {
            Ok(())
        }

        fn extensions_initialized(&mut self, _ctx: &PluginContext) {}
    }

    #[test]
    fn test_static_loader_creates_registered_plugin() {
        let loader = StaticLoader::new().with("Idle", || Box::new(Idle));
        assert!(loader.contains("Idle"));

        let loaded = loader.load("Idle", Path::new("ignored")).unwrap();
        assert!(loaded.library.is_none());
    }

    #[test]
    fn test_static_loader_unknown_plugin() {
        let loader = StaticLoader::new();
        let error = loader.load("Ghost", Path::new("libghost.so")).err().unwrap();
        assert!(matches!(error, PluginError::LibraryLoadFailed { .. }));
    }

    #[test]
    fn test_static_loader_panicking_factory() {
        let loader = StaticLoader::new().with("Broken", || -> Box<dyn Plugin> {
            panic!("no hardware")
        });
        let error = loader.load("Broken", Path::new("")).err().unwrap();
        assert_eq!(
            error,
            PluginError::InvalidPluginType {
                path: Path::new("").to_path_buf(),
                reason: "Plugin factory panicked: no hardware".to_string(),
            }
        );
    }
}
