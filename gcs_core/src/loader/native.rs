//! Dynamic library plugin loader using libloading

use super::{LibraryLoader, LoadedPlugin};
use crate::error::{PluginError, PluginResult};
use crate::lifecycle::panic_message;
use crate::plugin::{PluginDeclaration, ABI_VERSION, CORE_VERSION, DECLARATION_SYMBOL};
use libloading::Library;
use std::panic;
use std::path::Path;

/// Loads plugins exported with [`export_plugin!`](crate::export_plugin)
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl NativeLoader {
    pub fn new() -> Self {
        Self
    }
}

impl LibraryLoader for NativeLoader {
    fn load(&self, name: &str, library_path: &Path) -> PluginResult<LoadedPlugin> {
        let load_failed = |reason: String| PluginError::LibraryLoadFailed {
            path: library_path.to_path_buf(),
            reason,
        };
        let invalid = |reason: String| PluginError::InvalidPluginType {
            path: library_path.to_path_buf(),
            reason,
        };

        if !library_path.exists() {
            return Err(load_failed("Library not found".to_string()));
        }

        // SAFETY: loading a library runs its initializers. Plugin libraries
        // are trusted code built against this crate.
        let library = unsafe { Library::new(library_path) }
            .map_err(|e| load_failed(e.to_string()))?;

        let declaration = {
            // SAFETY: the symbol is the address of the exported static
            let symbol = unsafe { library.get::<*const PluginDeclaration>(DECLARATION_SYMBOL) }
                .map_err(|e| invalid(format!("Missing plugin declaration: {}", e)))?;
            let pointer: *const PluginDeclaration = *symbol;

            // SAFETY: `abi_version` is the first field of a repr(C) struct,
            // so it can be read before the layout is known to match
            let abi_version = unsafe { pointer.cast::<u32>().read() };
            check_abi_version(abi_version).map_err(invalid)?;

            // SAFETY: layout checked above
            unsafe { pointer.read() }
        };

        check_core_version(declaration.core_version).map_err(invalid)?;

        let plugin = panic::catch_unwind(declaration.create).map_err(|payload| {
            invalid(format!(
                "Plugin factory panicked: {}",
                panic_message(&*payload)
            ))
        })?;

        tracing::info!("Loaded plugin '{}' from: {}", name, library_path.display());

        Ok(LoadedPlugin {
            plugin,
            library: Some(library),
        })
    }
}

fn check_abi_version(abi_version: u32) -> Result<(), String> {
    if abi_version != ABI_VERSION {
        return Err(format!(
            "ABI version {} does not match host ABI version {}",
            abi_version, ABI_VERSION
        ));
    }
    Ok(())
}

fn check_core_version(core_version: &str) -> Result<(), String> {
    if core_version != CORE_VERSION {
        return Err(format!(
            "Built against core {}, host runs core {}",
            core_version, CORE_VERSION
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    /// A C library mapped into this process, which exports no declaration
    #[cfg(target_os = "linux")]
    fn system_library() -> Option<PathBuf> {
        let maps = std::fs::read_to_string("/proc/self/maps").ok()?;
        let mapped: Vec<PathBuf> = maps
            .lines()
            .filter_map(|line| line.split_whitespace().nth(5))
            .filter(|path| path.starts_with('/') && path.contains(".so"))
            .map(PathBuf::from)
            .collect();
        let is_libc = |path: &PathBuf| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("libc.") || name.starts_with("libc-"))
        };
        mapped.iter().find(|path| is_libc(path)).cloned()
    }

    #[test]
    fn test_load_nonexistent_library() {
        let path = Path::new("/nonexistent/libplugin.so");
        let error = NativeLoader::new().load("Plugin", path).err().unwrap();

        assert_eq!(
            error,
            PluginError::LibraryLoadFailed {
                path: path.to_path_buf(),
                reason: "Library not found".to_string(),
            }
        );
    }

    #[test]
    fn test_load_garbage_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".so")
            .tempfile()
            .unwrap();
        file.write_all(b"definitely not a shared object").unwrap();

        let error = NativeLoader::new()
            .load("Plugin", file.path())
            .err()
            .unwrap();
        assert!(matches!(error, PluginError::LibraryLoadFailed { .. }));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_library_without_declaration() {
        let path = system_library().expect("libc is mapped into every test process");
        let error = NativeLoader::new().load("Plugin", &path).err().unwrap();

        match error {
            PluginError::InvalidPluginType { path: reported, reason } => {
                assert_eq!(reported, path);
                assert!(reason.starts_with("Missing plugin declaration"), "{}", reason);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_version_checks() {
        assert!(check_abi_version(ABI_VERSION).is_ok());
        assert_eq!(
            check_abi_version(ABI_VERSION + 1).unwrap_err(),
            format!(
                "ABI version {} does not match host ABI version {}",
                ABI_VERSION + 1,
                ABI_VERSION
            )
        );

        assert!(check_core_version(CORE_VERSION).is_ok());
        assert!(check_core_version("0.0.0-other")
            .unwrap_err()
            .starts_with("Built against core 0.0.0-other"));
    }
}
