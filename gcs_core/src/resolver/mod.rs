//! Dependency resolution
//!
//! Turns the registry's `Read` specs into a load queue:
//!
//! 1. link every declared dependency to a concrete spec ([`graph`])
//! 2. reject dependency cycles and order the rest ([`order`])
//! 3. fail everything that transitively requires an unusable spec
//!
//! Usable, enabled specs end up `Resolved`; disabled ones stay `Read`.

pub mod graph;
pub mod order;

pub use graph::{DependencyEdge, DependencyGraph, GraphBuild};
pub use order::{find_cycles, load_order};

use crate::diagnostics::DiagnosticsSink;
use crate::error::{CycleMember, PluginError, PluginResult};
use crate::plugin::PluginState;
use crate::registry::PluginRegistry;

/// Resolve every healthy spec of `registry`
///
/// Fails with [`PluginError::InvalidStateTransition`] and leaves the registry
/// untouched if a healthy spec is not in state `Read`.
pub fn resolve(registry: &mut PluginRegistry, sink: &dyn DiagnosticsSink) -> PluginResult<()> {
    if let Some(spec) = registry
        .all()
        .iter()
        .find(|spec| !spec.has_error() && spec.state() != PluginState::Read)
    {
        return Err(spec.transition_error(PluginState::Resolved));
    }

    let participants: Vec<usize> = registry
        .all()
        .iter()
        .filter(|spec| !spec.has_error())
        .map(|spec| spec.index())
        .collect();

    let GraphBuild {
        graph,
        unresolved,
        skipped,
    } = DependencyGraph::build(registry.all(), &participants);

    for (dependent, dependency) in skipped {
        sink.info(
            registry.all()[dependent].name(),
            format!("Optional dependency '{}' not found, skipping", dependency),
        );
    }

    let mut roots = Vec::new();
    for (dependent, dependency) in unresolved {
        if registry.all()[dependent].has_error() {
            continue;
        }
        let error = PluginError::UnresolvedDependency {
            name: dependency.name.clone(),
            range: dependency.range.to_string(),
        };
        sink.error(registry.all()[dependent].name(), error.to_string());
        registry.fail(dependent, error);
        roots.push(dependent);
    }

    let healthy: Vec<usize> = participants
        .iter()
        .copied()
        .filter(|&index| !registry.all()[index].has_error())
        .collect();
    for cycle in find_cycles(&graph, &healthy) {
        let path: Vec<CycleMember> = cycle
            .iter()
            .map(|&member| {
                let spec = &registry.all()[member];
                CycleMember {
                    name: spec.name().to_string(),
                    version: spec.version().clone(),
                }
            })
            .collect();
        for &member in &cycle {
            if registry.all()[member].has_error() {
                continue;
            }
            let error = PluginError::CircularDependency(path.clone());
            sink.error(registry.all()[member].name(), error.to_string());
            registry.fail(member, error);
            roots.push(member);
        }
    }

    // Disabled specs are not errors but still unusable for their dependents
    roots.extend(
        participants
            .iter()
            .copied()
            .filter(|&index| !registry.all()[index].is_enabled()),
    );

    registry.set_graph(graph);
    for root in roots {
        for dependent in registry.fail_dependents(root) {
            let spec = &registry.all()[dependent];
            if let Some(error) = spec.error() {
                sink.error(spec.name(), error.to_string());
            }
        }
    }

    let loadable: Vec<usize> = participants
        .into_iter()
        .filter(|&index| {
            let spec = &registry.all()[index];
            spec.is_enabled() && !spec.has_error()
        })
        .collect();

    for &index in &loadable {
        let spec = registry.spec_mut(index);
        spec.advance(PluginState::Resolved)?;
        sink.debug(spec.name(), format!("Resolved {}", spec.version()));
    }

    let queue = load_order(registry.graph(), &loadable);
    registry.set_load_queue(queue);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{PluginDependency, PluginDescriptor, VersionRange};
    use crate::diagnostics::{MemorySink, Severity};
    use crate::plugin::PluginSpec;
    use semver::Version;

    fn add(registry: &mut PluginRegistry, name: &str, deps: &[(&str, &str)]) -> usize {
        let mut descriptor = PluginDescriptor::new(name, Version::new(1, 0, 0));
        for (dep, range) in deps {
            descriptor = descriptor
                .with_dependency(PluginDependency::required(*dep, VersionRange::parse(range).unwrap()));
        }
        registry.register(PluginSpec::new(descriptor, format!("{}.pluginspec", name)))
    }

    fn names(registry: &PluginRegistry) -> Vec<&str> {
        registry.load_queue().iter().map(|spec| spec.name()).collect()
    }

    #[test]
    fn test_resolve_orders_dependencies_first() {
        let mut registry = PluginRegistry::new();
        add(&mut registry, "C", &[("B", ">=1.0"), ("A", ">=1.0")]);
        add(&mut registry, "B", &[("A", ">=1.0")]);
        add(&mut registry, "A", &[]);

        resolve(&mut registry, &MemorySink::new()).unwrap();

        assert_eq!(names(&registry), vec!["A", "B", "C"]);
        assert!(registry
            .all()
            .iter()
            .all(|spec| spec.state() == PluginState::Resolved));
    }

    #[test]
    fn test_unresolved_dependency() {
        let mut registry = PluginRegistry::new();
        add(&mut registry, "D", &[("Foo", ">=2.0")]);
        add(&mut registry, "E", &[("D", "*")]);
        let sink = MemorySink::new();

        resolve(&mut registry, &sink).unwrap();

        let d = registry.find_by_name("D").unwrap();
        assert_eq!(d.state(), PluginState::Invalid);
        assert_eq!(
            d.error(),
            Some(&PluginError::UnresolvedDependency {
                name: "Foo".to_string(),
                range: ">=2.0".to_string(),
            })
        );
        assert!(matches!(
            registry.find_by_name("E").unwrap().error(),
            Some(PluginError::DependencyLoadFailed { root, .. }) if root == "D"
        ));
        assert!(registry.load_queue().is_empty());
        assert!(sink.contains(Severity::Error, "D", "Foo(>=2.0)"));
    }

    #[test]
    fn test_cycle_members_and_dependents_fail() {
        let mut registry = PluginRegistry::new();
        add(&mut registry, "A", &[("B", "*")]);
        add(&mut registry, "B", &[("C", "*")]);
        add(&mut registry, "C", &[("A", "*")]);
        add(&mut registry, "D", &[("A", "*")]);
        add(&mut registry, "E", &[]);

        resolve(&mut registry, &MemorySink::new()).unwrap();

        for name in ["A", "B", "C"] {
            let cycle: Vec<&str> = registry
                .find_by_name(name)
                .unwrap()
                .error()
                .and_then(PluginError::cycle)
                .unwrap()
                .iter()
                .map(|member| member.name.as_str())
                .collect();
            assert_eq!(cycle, vec!["A", "B", "C"]);
        }
        assert!(matches!(
            registry.find_by_name("D").unwrap().error(),
            Some(PluginError::DependencyLoadFailed { dependency, .. }) if dependency == "A"
        ));
        assert_eq!(names(&registry), vec!["E"]);
    }

    #[test]
    fn test_every_member_of_a_cycle_fails() {
        let mut registry = PluginRegistry::new();
        add(&mut registry, "A", &[("B", "*"), ("D", "*")]);
        add(&mut registry, "B", &[("C", "*")]);
        add(&mut registry, "C", &[("A", "*")]);
        let d = PluginDescriptor::new("D", Version::new(1, 0, 0))
            .with_dependency(PluginDependency::optional("B", VersionRange::parse("*").unwrap()));
        registry.register(PluginSpec::new(d, "D.pluginspec"));
        add(&mut registry, "E", &[]);
        let sink = MemorySink::new();

        resolve(&mut registry, &sink).unwrap();

        let cycle_of = |name: &str| -> Vec<String> {
            registry
                .find_by_name(name)
                .unwrap()
                .error()
                .and_then(PluginError::cycle)
                .unwrap()
                .iter()
                .map(|member| member.name.clone())
                .collect()
        };
        assert_eq!(cycle_of("A"), ["A", "B", "C"]);
        assert_eq!(cycle_of("D"), ["A", "D", "B", "C"]);
        assert_eq!(
            registry.find_by_name("D").unwrap().state(),
            PluginState::Invalid
        );
        assert!(sink.contains(Severity::Error, "D", "D(1.0.0) depends on B(1.0.0)"));
        assert_eq!(names(&registry), vec!["E"]);
    }

    #[test]
    fn test_disabled_plugin_stays_read() {
        let mut registry = PluginRegistry::new();
        add(&mut registry, "A", &[]);
        add(&mut registry, "B", &[("A", "*")]);
        add(&mut registry, "C", &[]);
        registry.set_enabled("A", false).unwrap();

        resolve(&mut registry, &MemorySink::new()).unwrap();

        let a = registry.find_by_name("A").unwrap();
        assert_eq!(a.state(), PluginState::Read);
        assert!(!a.has_error());
        assert_eq!(
            registry.find_by_name("B").unwrap().error(),
            Some(&PluginError::DependencyLoadFailed {
                dependency: "A".to_string(),
                root: "A".to_string(),
                reason: "Plugin is disabled".to_string(),
            })
        );
        assert_eq!(names(&registry), vec!["C"]);
    }

    #[test]
    fn test_resolve_twice_is_rejected() {
        let mut registry = PluginRegistry::new();
        add(&mut registry, "A", &[]);
        resolve(&mut registry, &MemorySink::new()).unwrap();

        let error = resolve(&mut registry, &MemorySink::new()).unwrap_err();
        assert_eq!(
            error,
            PluginError::InvalidStateTransition {
                plugin: "A".to_string(),
                from: PluginState::Resolved,
                to: PluginState::Resolved,
            }
        );
        assert_eq!(names(&registry), vec!["A"]);
    }
}
