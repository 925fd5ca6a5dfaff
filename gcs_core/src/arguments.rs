//! Startup arguments understood by the extension system
//!
//! Single dash options, the way desktop plugin hosts take them:
//!
//! | Option | Meaning |
//! |---|---|
//! | `-noload <plugin>` | keep the plugin at `Read` |
//! | `-test <plugin>` / `-test all` | run self tests once everything runs |
//! | `-pluginpath <dir>` | add a descriptor search directory |
//! | `-p <option>[=<value>]`, `-plugin-option ...` | route an option to the plugins declaring it |
//!
//! Everything else is kept as a free argument for the host.

use crate::lifecycle::TestSelection;
use std::path::PathBuf;
use thiserror::Error;

pub const NO_LOAD_OPTION: &str = "-noload";
pub const TEST_OPTION: &str = "-test";
pub const PLUGIN_PATH_OPTION: &str = "-pluginpath";
pub const PLUGIN_OPTION_SHORT: &str = "-p";
pub const PLUGIN_OPTION: &str = "-plugin-option";

/// Value of `-test` selecting every plugin
pub const TEST_ALL: &str = "all";

/// Startup argument errors; all of them abort startup
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("The option '{0}' requires an argument")]
    MissingValue(String),

    #[error("Unknown plugin '{plugin}' given to '{option}'")]
    UnknownPlugin { option: String, plugin: String },

    #[error("Unknown plugin option '{0}'")]
    UnknownOption(String),

    #[error("The plugin option '{option}' requires a value ({parameter})")]
    MissingOptionValue { option: String, parameter: String },
}

/// Parsed startup arguments
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginArguments {
    no_load: Vec<String>,
    tests: Vec<String>,
    plugin_paths: Vec<PathBuf>,
    /// `(option, value)`, value empty for flags
    options: Vec<(String, String)>,
    free: Vec<String>,
}

impl PluginArguments {
    /// Parse arguments, program name excluded
    ///
    /// Plugin names and options are checked later against the discovered
    /// plugins.
    pub fn parse<I, S>(args: I) -> Result<Self, ArgumentError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Self::default();
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            let option = arg.as_str();
            if !matches!(
                option,
                NO_LOAD_OPTION | TEST_OPTION | PLUGIN_PATH_OPTION | PLUGIN_OPTION_SHORT | PLUGIN_OPTION
            ) {
                parsed.free.push(arg);
                continue;
            }

            let value = args
                .next()
                .ok_or_else(|| ArgumentError::MissingValue(arg.clone()))?;

            match option {
                NO_LOAD_OPTION => parsed.no_load.push(value),
                TEST_OPTION => parsed.tests.push(value),
                PLUGIN_PATH_OPTION => parsed.plugin_paths.push(PathBuf::from(value)),
                _ => {
                    let (name, value) = match value.split_once('=') {
                        Some((name, value)) => (name.to_string(), value.to_string()),
                        None => (value.clone(), String::new()),
                    };
                    if name.is_empty() {
                        return Err(ArgumentError::MissingValue(option.to_string()));
                    }
                    parsed.options.push((name, value));
                }
            }
        }

        Ok(parsed)
    }

    /// Plugins named with `-noload`
    pub fn no_load(&self) -> &[String] {
        &self.no_load
    }

    /// Plugin names given to `-test`, `all` included
    pub fn tests(&self) -> &[String] {
        &self.tests
    }

    /// `None` when no `-test` was given
    pub fn test_selection(&self) -> Option<TestSelection> {
        if self.tests.is_empty() {
            None
        } else if self.tests.iter().any(|name| name == TEST_ALL) {
            Some(TestSelection::All)
        } else {
            Some(TestSelection::Plugins(self.tests.clone()))
        }
    }

    pub fn plugin_paths(&self) -> &[PathBuf] {
        &self.plugin_paths
    }

    pub fn options(&self) -> &[(String, String)] {
        &self.options
    }

    /// Arguments not meant for the extension system
    pub fn free_arguments(&self) -> &[String] {
        &self.free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_options() {
        let args = PluginArguments::parse([
            "-noload",
            "Welcome",
            "-test",
            "Core",
            "-pluginpath",
            "/opt/plugins",
            "-p",
            "port=ttyUSB0",
            "-plugin-option",
            "dfu",
            "--fullscreen",
            "mission.xml",
        ])
        .unwrap();

        assert_eq!(args.no_load(), ["Welcome"]);
        assert_eq!(args.tests(), ["Core"]);
        assert_eq!(args.plugin_paths(), [PathBuf::from("/opt/plugins")]);
        assert_eq!(
            args.options(),
            [
                ("port".to_string(), "ttyUSB0".to_string()),
                ("dfu".to_string(), String::new()),
            ]
        );
        assert_eq!(args.free_arguments(), ["--fullscreen", "mission.xml"]);
    }

    #[test]
    fn test_missing_value_is_fatal() {
        assert_eq!(
            PluginArguments::parse(["-noload"]).unwrap_err(),
            ArgumentError::MissingValue("-noload".to_string())
        );
        assert_eq!(
            PluginArguments::parse(["-p", "=1"]).unwrap_err(),
            ArgumentError::MissingValue("-p".to_string())
        );
    }

    #[test]
    fn test_selection() {
        let none = PluginArguments::parse(Vec::<String>::new()).unwrap();
        assert_eq!(none.test_selection(), None);

        let some = PluginArguments::parse(["-test", "Core", "-test", "Uploader"]).unwrap();
        assert_eq!(
            some.test_selection(),
            Some(TestSelection::Plugins(vec![
                "Core".to_string(),
                "Uploader".to_string()
            ]))
        );

        let all = PluginArguments::parse(["-test", "Core", "-test", "all"]).unwrap();
        assert_eq!(all.test_selection(), Some(TestSelection::All));
    }

    #[test]
    fn test_value_may_contain_equals() {
        let args = PluginArguments::parse(["-p", "url=udp://host:14550?a=b"]).unwrap();
        assert_eq!(
            args.options(),
            [("url".to_string(), "udp://host:14550?a=b".to_string())]
        );
    }
}
