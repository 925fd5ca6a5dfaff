//! Plugin descriptors
//!
//! A descriptor is the on-disk declaration of one plugin: an XML file (by
//! default with the `pluginspec` extension) naming the plugin, its version,
//! the plugins it depends on and the library that implements it.
//!
//! ```xml
//! <plugin name="Uploader" version="1.2.0" compatVersion="1.0.0">
//!     <vendor>The GCS Project</vendor>
//!     <description>Firmware upgrade</description>
//!     <library>libuploader.so</library>
//!     <dependencyList>
//!         <dependency name="Core" version=">=1.0"/>
//!         <dependency name="UAVTalk" version="1.0.0" type="optional"/>
//!     </dependencyList>
//!     <argumentList>
//!         <argument name="port" parameter="device">Serial port to use</argument>
//!     </argumentList>
//! </plugin>
//! ```

mod parser;
mod writer;

pub use parser::{parse_file, parse_str};
pub use writer::write;

use semver::{Version, VersionReq};
use std::fmt;
use std::path::PathBuf;

/// Element and attribute names of the descriptor format
pub(crate) mod tags {
    pub const PLUGIN: &str = "plugin";
    pub const NAME: &str = "name";
    pub const VERSION: &str = "version";
    pub const COMPAT_VERSION: &str = "compatVersion";
    pub const EXPERIMENTAL: &str = "experimental";
    pub const VENDOR: &str = "vendor";
    pub const COPYRIGHT: &str = "copyright";
    pub const LICENSE: &str = "license";
    pub const DESCRIPTION: &str = "description";
    pub const URL: &str = "url";
    pub const CATEGORY: &str = "category";
    pub const LIBRARY: &str = "library";
    pub const DEPENDENCY_LIST: &str = "dependencyList";
    pub const DEPENDENCY: &str = "dependency";
    pub const DEPENDENCY_TYPE: &str = "type";
    pub const DEPENDENCY_TYPE_REQUIRED: &str = "required";
    pub const DEPENDENCY_TYPE_OPTIONAL: &str = "optional";
    pub const ARGUMENT_LIST: &str = "argumentList";
    pub const ARGUMENT: &str = "argument";
    pub const ARGUMENT_PARAMETER: &str = "parameter";
}

/// Version constraint of a declared dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    /// Semver requirement such as `>=1.0` or `^2.1`, matched against the
    /// candidate's version
    Requirement(VersionReq),
    /// Bare version pin, satisfied by any plugin whose
    /// `compatVersion <= pin <= version`
    Compatible(Version),
}

impl VersionRange {
    /// Parse a range; text starting with a digit is a compatibility pin
    pub fn parse(text: &str) -> Result<Self, semver::Error> {
        let text = text.trim();
        if text.starts_with(|c: char| c.is_ascii_digit()) {
            Version::parse(text).map(VersionRange::Compatible)
        } else {
            VersionReq::parse(text).map(VersionRange::Requirement)
        }
    }

    /// Whether a plugin with the given versions satisfies this range
    pub fn accepts(&self, version: &Version, compat_version: &Version) -> bool {
        match self {
            VersionRange::Requirement(req) => req.matches(version),
            VersionRange::Compatible(pin) => compat_version <= pin && pin <= version,
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::Requirement(req) => write!(f, "{}", req),
            VersionRange::Compatible(pin) => write!(f, "{}", pin),
        }
    }
}

/// Whether a dependency must be present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyKind {
    #[default]
    Required,
    /// Ordering hint only; the plugin loads without it
    Optional,
}

/// A dependency declared in a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDependency {
    pub name: String,
    pub range: VersionRange,
    pub kind: DependencyKind,
}

impl PluginDependency {
    pub fn required(name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            name: name.into(),
            range,
            kind: DependencyKind::Required,
        }
    }

    pub fn optional(name: impl Into<String>, range: VersionRange) -> Self {
        Self {
            name: name.into(),
            range,
            kind: DependencyKind::Optional,
        }
    }

    pub fn is_optional(&self) -> bool {
        self.kind == DependencyKind::Optional
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.range)
    }
}

/// A command line option a plugin accepts through `-p name=value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginArgumentDescription {
    pub name: String,
    /// Name of the value, empty for flags
    pub parameter: String,
    pub description: String,
}

impl PluginArgumentDescription {
    pub fn takes_value(&self) -> bool {
        !self.parameter.is_empty()
    }
}

/// Metadata parsed from a descriptor
///
/// Optional text fields are empty when the descriptor omits them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: Version,
    pub compat_version: Version,
    pub experimental: bool,
    pub vendor: String,
    pub copyright: String,
    pub license: String,
    pub description: String,
    pub url: String,
    pub category: String,
    /// Library as written in the descriptor; `None` derives it from the name
    pub library: Option<PathBuf>,
    pub dependencies: Vec<PluginDependency>,
    pub arguments: Vec<PluginArgumentDescription>,
}

impl PluginDescriptor {
    /// Minimal descriptor with `compatVersion == version`
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            compat_version: version.clone(),
            version,
            experimental: false,
            vendor: String::new(),
            copyright: String::new(),
            license: String::new(),
            description: String::new(),
            url: String::new(),
            category: String::new(),
            library: None,
            dependencies: Vec::new(),
            arguments: Vec::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: PluginDependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.library = Some(library.into());
        self
    }

    pub fn with_argument(mut self, argument: PluginArgumentDescription) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Whether this plugin can stand in for `dependency`
    pub fn provides(&self, dependency: &PluginDependency) -> bool {
        self.name == dependency.name
            && dependency
                .range
                .accepts(&self.version, &self.compat_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version(text: &str) -> Version {
        Version::parse(text).unwrap()
    }

    #[test]
    fn test_requirement_range() {
        let range = VersionRange::parse(">=1.0").unwrap();
        assert!(matches!(range, VersionRange::Requirement(_)));
        assert!(range.accepts(&version("1.0.0"), &version("1.0.0")));
        assert!(range.accepts(&version("3.2.1"), &version("3.0.0")));
        assert!(!range.accepts(&version("0.9.9"), &version("0.9.0")));
        assert_eq!(range.to_string(), ">=1.0");
    }

    #[test]
    fn test_compatibility_pin() {
        let range = VersionRange::parse("1.5.0").unwrap();
        assert!(matches!(range, VersionRange::Compatible(_)));

        // compatVersion <= pin <= version
        assert!(range.accepts(&version("1.6.0"), &version("1.0.0")));
        assert!(range.accepts(&version("1.5.0"), &version("1.5.0")));
        assert!(!range.accepts(&version("1.6.0"), &version("1.6.0")));
        assert!(!range.accepts(&version("1.4.0"), &version("1.0.0")));
    }

    #[test]
    fn test_invalid_range() {
        assert!(VersionRange::parse("1.0").is_err());
        assert!(VersionRange::parse(">=x").is_err());
    }

    #[test]
    fn test_provides() {
        let descriptor = PluginDescriptor::new("Core", version("2.1.0"));
        let wanted = PluginDependency::required("Core", VersionRange::parse(">=2.0").unwrap());
        let too_new = PluginDependency::required("Core", VersionRange::parse(">=3.0").unwrap());
        let other = PluginDependency::required("Welcome", VersionRange::parse("*").unwrap());

        assert!(descriptor.provides(&wanted));
        assert!(!descriptor.provides(&too_new));
        assert!(!descriptor.provides(&other));
    }
}
