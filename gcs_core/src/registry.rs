//! Plugin registry and query API

use crate::error::{PluginError, PluginResult};
use crate::plugin::{PluginSpec, PluginState};
use crate::resolver::DependencyGraph;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Indexed store of every discovered spec
///
/// Specs keep their insertion (discovery) order; the index of a spec in
/// [`all`](Self::all) is its discovery index.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    specs: Vec<PluginSpec>,
    /// Name -> index of the spec owning that name
    by_name: HashMap<String, usize>,
    graph: DependencyGraph,
    /// Resolved load order
    load_queue: Vec<usize>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spec and return its discovery index
    ///
    /// When two valid specs share a name the higher version keeps it (the
    /// first discovered on equal versions); the other one is failed with
    /// [`PluginError::DuplicatePlugin`] but stays listable.
    pub fn register(&mut self, mut spec: PluginSpec) -> usize {
        let index = self.specs.len();
        spec.set_index(index);

        if !spec.has_error() {
            match self.by_name.get(spec.name()).copied() {
                None => {
                    self.by_name.insert(spec.name().to_string(), index);
                }
                Some(existing) => {
                    let current = &self.specs[existing];
                    if spec.version().cmp(current.version()) == Ordering::Greater {
                        let error = PluginError::DuplicatePlugin {
                            name: spec.name().to_string(),
                            provider: spec.descriptor_path().to_path_buf(),
                        };
                        tracing::warn!("{}", error);
                        self.specs[existing].fail(error);
                        self.by_name.insert(spec.name().to_string(), index);
                    } else {
                        let error = PluginError::DuplicatePlugin {
                            name: spec.name().to_string(),
                            provider: current.descriptor_path().to_path_buf(),
                        };
                        tracing::warn!("{}", error);
                        spec.fail(error);
                    }
                }
            }
        }

        tracing::debug!(
            "Registered plugin '{}' from {}",
            spec.name(),
            spec.descriptor_path().display()
        );
        self.specs.push(spec);
        index
    }

    /// Look up the spec owning `name`
    pub fn find_by_name(&self, name: &str) -> PluginResult<&PluginSpec> {
        self.index_of(name)
            .map(|index| &self.specs[index])
            .ok_or_else(|| PluginError::NotFound(name.to_string()))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, index: usize) -> Option<&PluginSpec> {
        self.specs.get(index)
    }

    /// Every spec in discovery order, including failed ones
    pub fn all(&self) -> &[PluginSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Enable or disable a plugin before resolution
    ///
    /// A disabled plugin stays at `Read` without that being an error.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> PluginResult<()> {
        let index = self
            .index_of(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        self.specs[index].set_enabled(enabled);
        Ok(())
    }

    /// Specs in resolved load order
    pub fn load_queue(&self) -> Vec<&PluginSpec> {
        self.load_queue
            .iter()
            .map(|&index| &self.specs[index])
            .collect()
    }

    /// Resolved direct dependencies of `name`
    pub fn dependencies_of(&self, name: &str) -> PluginResult<Vec<&PluginSpec>> {
        let index = self
            .index_of(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        Ok(self
            .graph
            .dependencies(index)
            .into_iter()
            .map(|dependency| &self.specs[dependency])
            .collect())
    }

    /// Specs that directly depend on `name`
    pub fn dependents_of(&self, name: &str) -> PluginResult<Vec<&PluginSpec>> {
        let index = self
            .index_of(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        Ok(self
            .graph
            .dependents(index)
            .into_iter()
            .map(|dependent| &self.specs[dependent])
            .collect())
    }

    /// Specs carrying an error
    pub fn failed(&self) -> Vec<&PluginSpec> {
        self.specs.iter().filter(|spec| spec.has_error()).collect()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Get plugin statistics
    pub fn stats(&self) -> PluginStats {
        let mut stats = PluginStats {
            total_plugins: self.specs.len(),
            ..Default::default()
        };

        for spec in &self.specs {
            if !spec.is_enabled() {
                stats.disabled += 1;
            }
            match spec.state() {
                PluginState::Invalid => stats.invalid += 1,
                PluginState::Read => stats.read += 1,
                PluginState::Resolved => stats.resolved += 1,
                PluginState::Loaded => stats.loaded += 1,
                PluginState::Initialized => stats.initialized += 1,
                PluginState::Running => stats.running += 1,
                PluginState::Stopped => stats.stopped += 1,
                PluginState::Deleted => stats.deleted += 1,
            }
        }

        stats
    }

    pub(crate) fn spec_mut(&mut self, index: usize) -> &mut PluginSpec {
        &mut self.specs[index]
    }

    pub(crate) fn specs_mut(&mut self) -> &mut [PluginSpec] {
        &mut self.specs
    }

    pub(crate) fn queue(&self) -> &[usize] {
        &self.load_queue
    }

    pub(crate) fn set_graph(&mut self, graph: DependencyGraph) {
        self.graph = graph;
    }

    pub(crate) fn set_load_queue(&mut self, load_queue: Vec<usize>) {
        self.load_queue = load_queue;
    }

    /// Record `error` on the spec at `index`
    pub(crate) fn fail(&mut self, index: usize, error: PluginError) {
        self.specs[index].fail(error);
    }

    /// `(root plugin, reason)` that dependents of `index` are told about
    pub(crate) fn failure_cause(&self, index: usize) -> (String, String) {
        let spec = &self.specs[index];
        match spec.error() {
            Some(error) => error.root_cause(spec.name()),
            None => (spec.name().to_string(), "Plugin is disabled".to_string()),
        }
    }

    /// Fail every enabled transitive dependent of `root` that is still healthy
    ///
    /// Returns the newly failed specs in breadth first order.
    pub(crate) fn fail_dependents(&mut self, root: usize) -> Vec<usize> {
        let (root_name, reason) = self.failure_cause(root);
        let mut failed = Vec::new();

        for (dependent, via) in self.graph.required_dependents(root) {
            let spec = &self.specs[dependent];
            if spec.has_error() || !spec.is_enabled() {
                continue;
            }
            let error = PluginError::DependencyLoadFailed {
                dependency: self.specs[via].name().to_string(),
                root: root_name.clone(),
                reason: reason.clone(),
            };
            self.specs[dependent].fail(error);
            failed.push(dependent);
        }

        failed
    }
}

/// Plugin statistics
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PluginStats {
    pub total_plugins: usize,
    pub disabled: usize,
    pub invalid: usize,
    pub read: usize,
    pub resolved: usize,
    pub loaded: usize,
    pub initialized: usize,
    pub running: usize,
    pub stopped: usize,
    pub deleted: usize,
}

impl PluginStats {
    pub fn print(&self) {
        tracing::info!("Plugin Statistics:");
        tracing::info!("  Total: {}", self.total_plugins);
        tracing::info!("  Disabled: {}", self.disabled);
        tracing::info!("  Invalid: {}", self.invalid);
        tracing::info!("  Read: {}", self.read);
        tracing::info!("  Resolved: {}", self.resolved);
        tracing::info!("  Loaded: {}", self.loaded);
        tracing::info!("  Initialized: {}", self.initialized);
        tracing::info!("  Running: {}", self.running);
        tracing::info!("  Stopped: {}", self.stopped);
        tracing::info!("  Deleted: {}", self.deleted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{DependencyKind, PluginDescriptor};
    use semver::Version;
    use std::path::PathBuf;

    fn spec(name: &str, version: &str) -> PluginSpec {
        PluginSpec::new(
            PluginDescriptor::new(name, Version::parse(version).unwrap()),
            format!("/plugins/{}-{}.pluginspec", name, version),
        )
    }

    #[test]
    fn test_registry_register() {
        let mut registry = PluginRegistry::new();
        assert_eq!(registry.register(spec("Core", "1.0.0")), 0);
        assert_eq!(registry.register(spec("Welcome", "1.0.0")), 1);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("Welcome"));
        assert_eq!(registry.find_by_name("Welcome").unwrap().index(), 1);
    }

    #[test]
    fn test_find_missing_plugin() {
        let registry = PluginRegistry::new();
        assert_eq!(
            registry.find_by_name("Core").unwrap_err(),
            PluginError::NotFound("Core".to_string())
        );
    }

    #[test]
    fn test_registry_duplicate_keeps_first_on_equal_version() {
        let mut registry = PluginRegistry::new();
        registry.register(spec("Core", "1.0.0"));
        let second = registry.register(PluginSpec::new(
            PluginDescriptor::new("Core", Version::new(1, 0, 0)),
            "/other/core.pluginspec",
        ));

        assert_eq!(registry.find_by_name("Core").unwrap().index(), 0);
        let loser = registry.get(second).unwrap();
        assert_eq!(loser.state(), PluginState::Invalid);
        assert_eq!(
            loser.error(),
            Some(&PluginError::DuplicatePlugin {
                name: "Core".to_string(),
                provider: PathBuf::from("/plugins/Core-1.0.0.pluginspec"),
            })
        );
    }

    #[test]
    fn test_registry_duplicate_higher_version_wins() {
        let mut registry = PluginRegistry::new();
        registry.register(spec("Core", "1.0.0"));
        registry.register(spec("Core", "1.2.0"));

        assert_eq!(registry.find_by_name("Core").unwrap().index(), 1);
        assert!(registry.get(0).unwrap().has_error());
        assert_eq!(registry.all().len(), 2);
        assert_eq!(registry.failed().len(), 1);
    }

    #[test]
    fn test_invalid_specs_are_listed_but_not_named() {
        let mut registry = PluginRegistry::new();
        let path = PathBuf::from("/plugins/broken.pluginspec");
        registry.register(PluginSpec::invalid(&path, PluginError::FileNotFound(path.clone())));

        assert_eq!(registry.all().len(), 1);
        assert!(!registry.contains("broken"));
    }

    #[test]
    fn test_set_enabled() {
        let mut registry = PluginRegistry::new();
        registry.register(spec("Welcome", "1.0.0"));

        registry.set_enabled("Welcome", false).unwrap();
        assert!(!registry.find_by_name("Welcome").unwrap().is_enabled());
        assert!(registry.set_enabled("Nope", false).is_err());
    }

    #[test]
    fn test_fail_dependents_forwards_root_cause() {
        let mut registry = PluginRegistry::new();
        registry.register(spec("A", "1.0.0"));
        registry.register(spec("B", "1.0.0"));
        registry.register(spec("C", "1.0.0"));

        let mut graph = DependencyGraph::with_nodes(3);
        graph.add_edge(1, 0, DependencyKind::Required);
        graph.add_edge(2, 1, DependencyKind::Required);
        registry.set_graph(graph);

        registry.fail(0, PluginError::InitializeFailed("no link".to_string()));
        assert_eq!(registry.fail_dependents(0), vec![1, 2]);

        assert_eq!(
            registry.get(2).unwrap().error(),
            Some(&PluginError::DependencyLoadFailed {
                dependency: "B".to_string(),
                root: "A".to_string(),
                reason: "Plugin initialization failed: no link".to_string(),
            })
        );
        assert_eq!(registry.dependents_of("A").unwrap()[0].name(), "B");
        assert_eq!(registry.dependencies_of("C").unwrap()[0].name(), "B");
    }

    #[test]
    fn test_plugin_stats() {
        let mut registry = PluginRegistry::new();
        registry.register(spec("A", "1.0.0"));
        registry.register(spec("B", "1.0.0"));
        registry.set_enabled("B", false).unwrap();
        registry.fail(0, PluginError::InitializeFailed("x".to_string()));

        let stats = registry.stats();
        assert_eq!(stats.total_plugins, 2);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.read, 1);
        assert_eq!(stats.disabled, 1);
    }
}
