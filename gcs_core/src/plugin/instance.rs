//! Live plugin objects

use super::traits::Plugin;
use crate::loader::LoadedPlugin;
use libloading::Library;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Plugin object shared between its spec and a running hook
pub type SharedPlugin = Arc<Mutex<Box<dyn Plugin>>>;

/// A plugin object together with the library its code lives in
///
/// Field order matters: the object is dropped before the library is unloaded.
pub struct PluginInstance {
    plugin: SharedPlugin,
    library: Option<Library>,
    abandoned: bool,
}

impl PluginInstance {
    pub(crate) fn new(loaded: LoadedPlugin) -> Self {
        Self {
            plugin: Arc::new(Mutex::new(loaded.plugin)),
            library: loaded.library,
            abandoned: false,
        }
    }

    pub fn plugin(&self) -> SharedPlugin {
        self.plugin.clone()
    }

    pub fn has_library(&self) -> bool {
        self.library.is_some()
    }

    /// Mark the instance as still referenced by a hook that never returned
    pub(crate) fn abandon(&mut self) {
        self.abandoned = true;
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned
    }
}

impl Drop for PluginInstance {
    fn drop(&mut self) {
        // A hook thread may still run plugin code; keep it mapped
        if self.abandoned || Arc::strong_count(&self.plugin) > 1 {
            if let Some(library) = self.library.take() {
                std::mem::forget(library);
            }
        }
    }
}

impl fmt::Debug for PluginInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginInstance")
            .field("library", &self.library.is_some())
            .field("abandoned", &self.abandoned)
            .finish()
    }
}
