//! # GCS Core
//!
//! The extension system of the ground control station.
//!
//! Every feature of the application ships as a plugin: a shared library plus
//! a descriptor declaring its name, version and dependencies. This crate
//! turns a directory of descriptors into a running set of plugins:
//!
//! - **Descriptors**: XML plugin declarations, parsed and written back
//! - **Resolution**: dependency linking by name and version range, cycle
//!   detection, deterministic load order
//! - **Loading**: shared libraries through libloading, or built-in factories
//! - **Lifecycle**: two phase initialization, reverse order shutdown,
//!   bounded hook calls
//! - **Registry**: queryable store of every plugin and its state
//!
//! A plugin that fails takes everything depending on it down with it, and
//! nothing else.
//!
//! ## Quick Start
//!
//! ```no_run
//! use gcs_core::{ManagerConfig, PluginArguments, PluginManager};
//!
//! let config = ManagerConfig::default().with_plugin_path("/usr/lib/gcs/plugins");
//! let mut manager = PluginManager::with_defaults(config);
//! manager.discover();
//! manager.apply_arguments(&PluginArguments::parse(["-noload", "Welcome"]).unwrap()).unwrap();
//! manager.load_plugins().unwrap();
//!
//! for spec in manager.registry().failed() {
//!     eprintln!("{}: {}", spec.name(), spec.error().unwrap());
//! }
//!
//! manager.shutdown().unwrap();
//! ```

pub mod arguments;
pub mod config;
pub mod descriptor;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod loader;
pub mod manager;
pub mod plugin;
pub mod registry;
pub mod resolver;
pub mod usage;

// Re-export commonly used types for easy access
pub use arguments::{ArgumentError, PluginArguments};
pub use config::{ConfigError, ManagerConfig, DEFAULT_HOOK_TIMEOUT_MS};
pub use descriptor::{
    DependencyKind, PluginArgumentDescription, PluginDependency, PluginDescriptor, VersionRange,
};
pub use diagnostics::{
    ChannelSink, Diagnostic, DiagnosticsSink, MemorySink, Severity, TracingSink,
};
pub use error::{CycleMember, DescriptorFault, PluginError, PluginResult};
pub use lifecycle::{LifecycleSupervisor, TestReport, TestSelection};
pub use loader::{LibraryLoader, LoadedPlugin, NativeLoader, StaticLoader};
pub use manager::PluginManager;
pub use plugin::{
    ObjectPool, Plugin, PluginContext, PluginDeclaration, PluginSpec, PluginState, ShutdownFlag,
    ShutdownHandle, ShutdownNotifier, ABI_VERSION, CORE_VERSION,
};
pub use registry::{PluginRegistry, PluginStats};
pub use usage::{format_plugin_options, format_plugin_versions};
