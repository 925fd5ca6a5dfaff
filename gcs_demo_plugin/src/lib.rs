//! Welcome page plugin
//!
//! Reference plugin for the GCS extension system. It publishes a
//! [`WelcomePage`] into the object pool during `initialize`, picks up the
//! pages other plugins contributed once every plugin is initialized, and
//! withdraws its page on shutdown.
//!
//! Built as a `cdylib` and described by `Welcome.pluginspec`.

use gcs_core::{ObjectPool, Plugin, PluginContext, ShutdownFlag};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const DEFAULT_GREETING: &str = "Welcome to the ground control station";

/// Start page contributed to the object pool
#[derive(Debug)]
pub struct WelcomePage {
    pub owner: String,
    pub greeting: String,
    opened: AtomicUsize,
}

impl WelcomePage {
    pub fn new(owner: impl Into<String>, greeting: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            greeting: greeting.into(),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn open(&self) -> &str {
        self.opened.fetch_add(1, Ordering::Relaxed);
        &self.greeting
    }

    pub fn times_opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

#[derive(Default)]
pub struct WelcomePlugin {
    page: Option<Arc<WelcomePage>>,
    pool: Option<ObjectPool>,
    /// Pages found in the pool after startup, our own included
    pages_seen: usize,
}

impl WelcomePlugin {
    pub fn page(&self) -> Option<&Arc<WelcomePage>> {
        self.page.as_ref()
    }

    pub fn pages_seen(&self) -> usize {
        self.pages_seen
    }
}

impl Plugin for WelcomePlugin {
    fn initialize(&mut self, ctx: &PluginContext) -> Result<(), String> {
        let greeting = ctx.argument("greeting").unwrap_or(DEFAULT_GREETING);
        if greeting.trim().is_empty() {
            return Err("greeting must not be empty".to_string());
        }

        let page = Arc::new(WelcomePage::new(ctx.plugin_name(), greeting));
        ctx.object_pool().add_object(page.clone());
        self.page = Some(page);
        self.pool = Some(ctx.object_pool().clone());

        tracing::debug!("Welcome page registered");
        Ok(())
    }

    fn extensions_initialized(&mut self, ctx: &PluginContext) {
        let pages = ctx.object_pool().get_objects::<WelcomePage>();
        self.pages_seen = pages.len();
        for page in &pages {
            tracing::info!("Welcome page from '{}': {}", page.owner, page.greeting);
        }
    }

    fn about_to_shutdown(&mut self) -> ShutdownFlag {
        if let (Some(pool), Some(page)) = (self.pool.take(), self.page.as_ref()) {
            if !pool.remove_object(page) {
                tracing::warn!("Welcome page was already removed from the object pool");
            }
        }
        ShutdownFlag::Synchronous
    }

    fn self_test(&mut self) -> Result<(), String> {
        let page = self.page.as_ref().ok_or("welcome page not created")?;
        let pool = self.pool.as_ref().ok_or("object pool not available")?;
        let published = pool
            .get_objects::<WelcomePage>()
            .iter()
            .any(|p| Arc::ptr_eq(p, page));
        if !published {
            return Err("welcome page missing from the object pool".to_string());
        }
        Ok(())
    }
}

gcs_core::export_plugin!(WelcomePlugin);

#[cfg(test)]
mod tests {
    use super::*;
    use gcs_core::{descriptor, VersionRange};
    use std::path::Path;

    fn context(pool: &ObjectPool, arguments: Vec<(String, String)>) -> PluginContext {
        PluginContext::new("Welcome", arguments, pool.clone())
    }

    #[test]
    fn test_lifecycle_publishes_and_withdraws_page() {
        let pool = ObjectPool::new();
        let ctx = context(&pool, Vec::new());
        let mut plugin = WelcomePlugin::default();

        plugin.initialize(&ctx).unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(
            pool.get_object::<WelcomePage>().unwrap().greeting,
            DEFAULT_GREETING
        );

        pool.add_object(Arc::new(WelcomePage::new("Map", "Plan a mission")));
        plugin.extensions_initialized(&ctx);
        assert_eq!(plugin.pages_seen(), 2);
        assert!(plugin.self_test().is_ok());

        assert!(matches!(plugin.about_to_shutdown(), ShutdownFlag::Synchronous));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get_object::<WelcomePage>().unwrap().owner, "Map");
    }

    #[test]
    fn test_greeting_argument() {
        let pool = ObjectPool::new();
        let ctx = context(&pool, vec![("greeting".to_string(), "Hello pilot".to_string())]);
        let mut plugin = WelcomePlugin::default();

        plugin.initialize(&ctx).unwrap();
        let page = plugin.page().unwrap();
        assert_eq!(page.open(), "Hello pilot");
        assert_eq!(page.times_opened(), 1);

        let empty = context(&pool, vec![("greeting".to_string(), " ".to_string())]);
        assert!(WelcomePlugin::default().initialize(&empty).is_err());
    }

    #[test]
    fn test_self_test_before_initialize_fails() {
        assert!(WelcomePlugin::default().self_test().is_err());
    }

    #[test]
    fn test_declaration() {
        assert_eq!(gcs_plugin_declaration.abi_version, gcs_core::ABI_VERSION);
        assert_eq!(gcs_plugin_declaration.core_version, gcs_core::CORE_VERSION);

        let mut plugin = (gcs_plugin_declaration.create)();
        assert!(plugin.self_test().is_err());
    }

    #[test]
    fn test_descriptor() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("Welcome.pluginspec");
        let descriptor = descriptor::parse_file(&path).unwrap();

        assert_eq!(descriptor.name, "Welcome");
        assert_eq!(descriptor.arguments.len(), 1);
        assert_eq!(descriptor.arguments[0].name, "greeting");
        assert!(descriptor.arguments[0].takes_value());
        assert_eq!(descriptor.dependencies.len(), 1);
        assert!(descriptor.dependencies[0].is_optional());
        assert_eq!(
            descriptor.dependencies[0].range,
            VersionRange::parse(">=1.0").unwrap()
        );
    }
}
