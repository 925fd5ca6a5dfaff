//! Help and version text for hosts
//!
//! Lists what the discovered plugins add to the command line and which
//! plugin versions are installed.

use crate::arguments::PLUGIN_OPTION_SHORT;
use crate::plugin::{PluginSpec, CORE_VERSION};
use crate::registry::PluginRegistry;
use std::fmt::Write;

/// Plugin options declared by every healthy descriptor, grouped by plugin
///
/// Plugins without options are left out. Empty when no plugin declares any.
pub fn format_plugin_options(registry: &PluginRegistry) -> String {
    let declaring: Vec<&PluginSpec> = healthy(registry)
        .filter(|spec| !spec.descriptor().arguments.is_empty())
        .collect();
    if declaring.is_empty() {
        return String::new();
    }

    let usage = |name: &str, parameter: &str| {
        if parameter.is_empty() {
            format!("{} {}", PLUGIN_OPTION_SHORT, name)
        } else {
            format!("{} {}=<{}>", PLUGIN_OPTION_SHORT, name, parameter)
        }
    };
    let width = declaring
        .iter()
        .flat_map(|spec| &spec.descriptor().arguments)
        .map(|argument| usage(&argument.name, &argument.parameter).len())
        .max()
        .unwrap_or_default();

    let mut out = String::from("Plugin options:\n");
    for spec in declaring {
        let _ = writeln!(out, "  {}:", spec.name());
        for argument in &spec.descriptor().arguments {
            let option = usage(&argument.name, &argument.parameter);
            if argument.description.is_empty() {
                let _ = writeln!(out, "    {}", option);
            } else {
                let _ = writeln!(
                    out,
                    "    {:<width$}  {}",
                    option,
                    argument.description,
                    width = width
                );
            }
        }
    }
    out
}

/// Core version followed by the name and version of every healthy plugin
pub fn format_plugin_versions(registry: &PluginRegistry) -> String {
    let mut out = format!("GCS core {}\n", CORE_VERSION);
    let specs: Vec<&PluginSpec> = healthy(registry).collect();
    if specs.is_empty() {
        out.push_str("No plugins found\n");
        return out;
    }

    let width = specs.iter().map(|spec| spec.name().len()).max().unwrap_or_default();
    out.push_str("Plugins:\n");
    for spec in specs {
        let _ = write!(out, "  {:<width$}  {}", spec.name(), spec.version(), width = width);
        if !spec.is_enabled() {
            out.push_str(" (disabled)");
        }
        out.push('\n');
    }
    out
}

fn healthy(registry: &PluginRegistry) -> impl Iterator<Item = &PluginSpec> {
    registry.all().iter().filter(|spec| !spec.has_error())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{PluginArgumentDescription, PluginDescriptor};
    use semver::Version;

    fn argument(name: &str, parameter: &str, description: &str) -> PluginArgumentDescription {
        PluginArgumentDescription {
            name: name.to_string(),
            parameter: parameter.to_string(),
            description: description.to_string(),
        }
    }

    fn registry() -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        let core = PluginDescriptor::new("Core", Version::new(1, 2, 0))
            .with_argument(argument("connect", "port", "Connect on startup"))
            .with_argument(argument("fullscreen", "", ""));
        let map = PluginDescriptor::new("Map", Version::new(0, 9, 1));
        let mut hitl = PluginDescriptor::new("HITL", Version::new(2, 0, 0))
            .with_argument(argument("sim", "", "Use the simulator"));
        hitl.experimental = true;

        registry.register(PluginSpec::new(core, "/plugins/core.pluginspec"));
        registry.register(PluginSpec::new(map, "/plugins/map.pluginspec"));
        registry.register(PluginSpec::new(hitl, "/plugins/hitl.pluginspec"));
        registry
    }

    #[test]
    fn test_plugin_options() {
        assert_eq!(
            format_plugin_options(&registry()),
            "Plugin options:\n\
             \x20 Core:\n\
             \x20   -p connect=<port>  Connect on startup\n\
             \x20   -p fullscreen\n\
             \x20 HITL:\n\
             \x20   -p sim             Use the simulator\n"
        );
    }

    #[test]
    fn test_no_plugin_options() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginSpec::new(
            PluginDescriptor::new("Map", Version::new(1, 0, 0)),
            "/plugins/map.pluginspec",
        ));
        assert!(format_plugin_options(&registry).is_empty());
    }

    #[test]
    fn test_plugin_versions() {
        assert_eq!(
            format_plugin_versions(&registry()),
            format!(
                "GCS core {}\nPlugins:\n  Core  1.2.0\n  Map   0.9.1\n  HITL  2.0.0 (disabled)\n",
                CORE_VERSION
            )
        );
        assert_eq!(
            format_plugin_versions(&PluginRegistry::new()),
            format!("GCS core {}\nNo plugins found\n", CORE_VERSION)
        );
    }
}
