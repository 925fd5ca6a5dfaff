//! Error types for the extension system
//!
//! Every failure a plugin can hit on its way from descriptor to `Running` has a
//! variant here. Errors are recorded on the owning [`PluginSpec`] instead of
//! being returned past the pipeline boundary.
//!
//! [`PluginSpec`]: crate::plugin::PluginSpec

use crate::plugin::PluginState;
use semver::Version;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// What exactly is wrong with a descriptor file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorFault {
    /// A required attribute is absent
    MissingAttribute { element: String, attribute: String },
    /// An attribute is present but its value cannot be used
    InvalidAttribute {
        attribute: String,
        value: String,
        reason: String,
    },
    /// An element that has no meaning at this place in the document
    UnexpectedElement(String),
    /// The document root is not `<plugin>`
    WrongTopLevelElement(String),
    /// XML syntax error (unexpected closing tag, unexpected token, ...)
    Syntax(String),
}

impl fmt::Display for DescriptorFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorFault::MissingAttribute { element, attribute } => {
                write!(f, "Expected attribute '{}' on element '{}'", attribute, element)
            }
            DescriptorFault::InvalidAttribute {
                attribute,
                value,
                reason,
            } => write!(
                f,
                "Invalid format of attribute '{}' (value '{}'): {}",
                attribute, value, reason
            ),
            DescriptorFault::UnexpectedElement(name) => {
                write!(f, "Unexpected element '{}'", name)
            }
            DescriptorFault::WrongTopLevelElement(name) => {
                write!(f, "Expected element 'plugin' as top level element, found '{}'", name)
            }
            DescriptorFault::Syntax(message) => write!(f, "{}", message),
        }
    }
}

/// One step of a dependency cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleMember {
    pub name: String,
    pub version: Version,
}

impl fmt::Display for CycleMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.version)
    }
}

fn format_cycle(path: &[CycleMember]) -> String {
    let Some(first) = path.first() else {
        return String::new();
    };
    path.iter()
        .zip(path.iter().skip(1).chain(std::iter::once(first)))
        .map(|(from, to)| format!("{} depends on {}", from, to))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Extension system errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("Descriptor file '{}' does not exist", .0.display())]
    FileNotFound(PathBuf),

    #[error("Cannot read descriptor file '{}': {reason}", .path.display())]
    FileUnreadable { path: PathBuf, reason: String },

    #[error("Error parsing '{}' at line {line}, column {column}: {fault}", .path.display())]
    MalformedDescriptor {
        path: PathBuf,
        line: u32,
        column: u32,
        fault: DescriptorFault,
    },

    #[error("Could not resolve dependency '{name}({range})'")]
    UnresolvedDependency { name: String, range: String },

    #[error("Circular dependency detected: {}", format_cycle(.0))]
    CircularDependency(Vec<CycleMember>),

    #[error("Failed to load library '{}': {reason}", .path.display())]
    LibraryLoadFailed { path: PathBuf, reason: String },

    #[error("Library '{}' does not provide a valid plugin: {reason}", .path.display())]
    InvalidPluginType { path: PathBuf, reason: String },

    #[error("Cannot load plugin because dependency '{dependency}' failed to load ('{root}': {reason})")]
    DependencyLoadFailed {
        /// Direct dependency that is unavailable
        dependency: String,
        /// Plugin where the failure originated
        root: String,
        /// Why the root plugin is unavailable
        reason: String,
    },

    #[error("Plugin initialization failed: {0}")]
    InitializeFailed(String),

    #[error("Plugin extensions initialization failed: {0}")]
    ExtensionsInitializedFailed(String),

    #[error("Invalid state transition for plugin '{plugin}': {from} -> {to}")]
    InvalidStateTransition {
        plugin: String,
        from: PluginState,
        to: PluginState,
    },

    #[error("Plugin '{name}' is already provided by '{}'", .provider.display())]
    DuplicatePlugin { name: String, provider: PathBuf },

    #[error("Plugin '{0}' not found")]
    NotFound(String),
}

impl PluginError {
    /// Cycle path carried by a [`PluginError::CircularDependency`]
    pub fn cycle(&self) -> Option<&[CycleMember]> {
        match self {
            PluginError::CircularDependency(path) => Some(path),
            _ => None,
        }
    }

    /// `(root plugin, reason)` to hand on to dependents of `failed`.
    ///
    /// A dependency failure is forwarded unchanged so that every transitive
    /// dependent names the plugin where things went wrong first.
    pub fn root_cause(&self, failed: &str) -> (String, String) {
        match self {
            PluginError::DependencyLoadFailed { root, reason, .. } => {
                (root.clone(), reason.clone())
            }
            other => (failed.to_string(), other.to_string()),
        }
    }
}

/// Result type for extension system operations
pub type PluginResult<T> = Result<T, PluginError>;
