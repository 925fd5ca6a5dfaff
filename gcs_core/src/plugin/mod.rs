//! Plugin side of the extension system
//!
//! # Architecture
//!
//! - **Plugin trait** - the lifecycle interface every plugin implements
//! - **PluginSpec** - one discovered descriptor together with its state, error
//!   and live instance
//! - **Object pool** - objects plugins publish for each other
//!
//! # Creating Plugins
//!
//! ```ignore
//! use gcs_core::{export_plugin, Plugin, PluginContext};
//!
//! #[derive(Default)]
//! pub struct MyPlugin;
//!
//! impl Plugin for MyPlugin {
//!     fn initialize(&mut self, ctx: &PluginContext) -> Result<(), String> {
//!         ctx.object_pool().add_object(std::sync::Arc::new(MyService::new()));
//!         Ok(())
//!     }
//!
//!     fn extensions_initialized(&mut self, _ctx: &PluginContext) {}
//! }
//!
//! export_plugin!(MyPlugin);
//! ```

mod instance;
pub mod object_pool;
mod spec;
mod state;
mod traits;

pub use instance::{PluginInstance, SharedPlugin};
pub use object_pool::ObjectPool;
pub use spec::PluginSpec;
pub use state::PluginState;
pub use traits::{
    Plugin, PluginContext, PluginDeclaration, ShutdownFlag, ShutdownHandle, ShutdownNotifier,
    ABI_VERSION, CORE_VERSION, DECLARATION_SYMBOL,
};
