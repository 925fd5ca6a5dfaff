//! Plugin library loading
//!
//! The lifecycle supervisor never touches shared libraries itself; it asks a
//! [`LibraryLoader`] for a plugin object. [`NativeLoader`] loads `cdylib`
//! plugins with libloading, [`StaticLoader`] serves plugins compiled into the
//! host.

mod native;
mod static_loader;

pub use native::NativeLoader;
pub use static_loader::StaticLoader;

use crate::error::PluginResult;
use crate::plugin::Plugin;
use libloading::Library;
use std::path::Path;

/// A freshly created plugin object
pub struct LoadedPlugin {
    pub plugin: Box<dyn Plugin>,
    /// Library the object's code lives in, `None` for built-in plugins
    pub library: Option<Library>,
}

impl LoadedPlugin {
    pub fn built_in(plugin: Box<dyn Plugin>) -> Self {
        Self {
            plugin,
            library: None,
        }
    }
}

/// Source of plugin objects
pub trait LibraryLoader: Send + Sync {
    /// Create the plugin object for `name`, implemented by `library_path`
    ///
    /// Fails with `LibraryLoadFailed` or `InvalidPluginType`.
    fn load(&self, name: &str, library_path: &Path) -> PluginResult<LoadedPlugin>;
}
