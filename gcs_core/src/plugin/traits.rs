//! Plugin lifecycle interface

use super::object_pool::ObjectPool;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Version of the [`PluginDeclaration`] layout
pub const ABI_VERSION: u32 = 1;

/// Version of the core crate a plugin was built against
pub const CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Symbol exported by [`export_plugin!`](crate::export_plugin)
pub const DECLARATION_SYMBOL: &[u8] = b"gcs_plugin_declaration\0";

/// Lifecycle interface of a plugin
///
/// Hooks are called by the lifecycle supervisor in dependency order:
/// `initialize` on every plugin first, then `extensions_initialized` on every
/// plugin, and at shutdown `about_to_shutdown` in reverse order. A hook may
/// run on a supervisor thread when a hook timeout is configured.
pub trait Plugin: Send {
    /// Set up the plugin; objects other plugins need go into the pool here
    fn initialize(&mut self, ctx: &PluginContext) -> Result<(), String>;

    /// Called once every plugin in the batch is initialized
    fn extensions_initialized(&mut self, ctx: &PluginContext);

    /// Prepare for shutdown
    ///
    /// Return [`ShutdownFlag::Asynchronous`] to keep the plugin alive until
    /// the matching [`ShutdownNotifier`] fires.
    fn about_to_shutdown(&mut self) -> ShutdownFlag {
        ShutdownFlag::Synchronous
    }

    /// Self test run for plugins selected with `-test`
    fn self_test(&mut self) -> Result<(), String> {
        Ok(())
    }
}

/// Everything a plugin hook gets to see of the host
#[derive(Debug, Clone)]
pub struct PluginContext {
    plugin_name: String,
    arguments: Vec<(String, String)>,
    pool: ObjectPool,
}

impl PluginContext {
    pub fn new(
        plugin_name: impl Into<String>,
        arguments: Vec<(String, String)>,
        pool: ObjectPool,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            arguments,
            pool,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// Options routed to this plugin, in command line order
    pub fn arguments(&self) -> &[(String, String)] {
        &self.arguments
    }

    /// Value of the last occurrence of option `name`
    pub fn argument(&self, name: &str) -> Option<&str> {
        self.arguments
            .iter()
            .rev()
            .find(|(option, _)| option == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn object_pool(&self) -> &ObjectPool {
        &self.pool
    }
}

/// Answer of [`Plugin::about_to_shutdown`]
#[derive(Debug)]
pub enum ShutdownFlag {
    Synchronous,
    Asynchronous(ShutdownHandle),
}

/// Supervisor side of an asynchronous shutdown
#[derive(Debug)]
pub struct ShutdownHandle {
    done: Receiver<()>,
}

/// Plugin side of an asynchronous shutdown; dropping it also counts as done
#[derive(Debug)]
pub struct ShutdownNotifier {
    done: Sender<()>,
}

impl ShutdownHandle {
    /// Create a connected notifier/handle pair
    pub fn pair() -> (ShutdownNotifier, ShutdownHandle) {
        let (done_tx, done_rx) = bounded(1);
        (
            ShutdownNotifier { done: done_tx },
            ShutdownHandle { done: done_rx },
        )
    }

    /// Block until the plugin finished shutting down or `timeout` passed.
    ///
    /// Returns `false` on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(timeout) => !matches!(
                self.done.recv_timeout(timeout),
                Err(RecvTimeoutError::Timeout)
            ),
            None => {
                let _ = self.done.recv();
                true
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self.done.try_recv(), Err(TryRecvError::Empty))
    }
}

impl ShutdownNotifier {
    pub fn notify(self) {
        let _ = self.done.send(());
    }
}

/// Declaration exported by a plugin library
///
/// Read through [`DECLARATION_SYMBOL`]. `abi_version` stays the first field so
/// that it can be checked before anything else is trusted.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PluginDeclaration {
    pub abi_version: u32,
    pub core_version: &'static str,
    pub create: fn() -> Box<dyn Plugin>,
}

/// Export a plugin type from a `cdylib`
///
/// The type must implement [`Plugin`] and `Default`.
///
/// # Example
///
/// ```ignore
/// use gcs_core::export_plugin;
///
/// #[derive(Default)]
/// pub struct WelcomePlugin;
///
/// impl gcs_core::Plugin for WelcomePlugin {
///     // ...
/// }
///
/// export_plugin!(WelcomePlugin);
/// ```
#[macro_export]
macro_rules! export_plugin {
    ($plugin_type:ty) => {
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        pub static gcs_plugin_declaration: $crate::PluginDeclaration = {
            fn create() -> Box<dyn $crate::Plugin> {
                Box::new(<$plugin_type as ::std::default::Default>::default())
            }

            $crate::PluginDeclaration {
                abi_version: $crate::ABI_VERSION,
                core_version: $crate::CORE_VERSION,
                create,
            }
        };
    };
}
