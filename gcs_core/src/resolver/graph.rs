//! Dependency graph building
//!
//! Specs are nodes addressed by their index in the registry; edges point from
//! a dependent to the dependency it resolved to.

use crate::descriptor::{DependencyKind, PluginDependency};
use crate::plugin::PluginSpec;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};

/// Resolved dependency edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    /// Dependent spec
    pub from: usize,
    /// Spec providing the dependency
    pub to: usize,
    pub kind: DependencyKind,
}

/// Arena-indexed dependency graph
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: Vec<DependencyEdge>,
    /// Node -> ids of edges leaving it (its dependencies)
    outgoing: Vec<Vec<usize>>,
    /// Node -> ids of edges entering it (its dependents)
    incoming: Vec<Vec<usize>>,
}

/// Outcome of linking declared dependencies to specs
#[derive(Debug, Default)]
pub struct GraphBuild {
    pub graph: DependencyGraph,
    /// Required dependencies without a provider, per dependent
    pub unresolved: Vec<(usize, PluginDependency)>,
    /// Optional dependencies without a provider, per dependent
    pub skipped: Vec<(usize, PluginDependency)>,
}

impl DependencyGraph {
    pub fn with_nodes(node_count: usize) -> Self {
        Self {
            edges: Vec::new(),
            outgoing: vec![Vec::new(); node_count],
            incoming: vec![Vec::new(); node_count],
        }
    }

    /// Link the dependencies of every participating spec
    ///
    /// A dependency resolves to the participating spec of the same name with
    /// the highest version in range; equal versions go to the one discovered
    /// first.
    pub fn build(specs: &[PluginSpec], participants: &[usize]) -> GraphBuild {
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for &index in participants {
            by_name.entry(specs[index].name()).or_default().push(index);
        }

        let mut build = GraphBuild {
            graph: DependencyGraph::with_nodes(specs.len()),
            ..Default::default()
        };

        for &from in participants {
            for dependency in &specs[from].descriptor().dependencies {
                let provider = by_name
                    .get(dependency.name.as_str())
                    .into_iter()
                    .flatten()
                    .copied()
                    .filter(|&candidate| specs[candidate].descriptor().provides(dependency))
                    .max_by_key(|&candidate| {
                        (specs[candidate].version().clone(), Reverse(candidate))
                    });

                match provider {
                    Some(to) => build.graph.add_edge(from, to, dependency.kind),
                    None if dependency.is_optional() => {
                        build.skipped.push((from, dependency.clone()))
                    }
                    None => build.unresolved.push((from, dependency.clone())),
                }
            }
        }

        build
    }

    pub fn add_edge(&mut self, from: usize, to: usize, kind: DependencyKind) {
        let id = self.edges.len();
        self.edges.push(DependencyEdge { from, to, kind });
        self.outgoing[from].push(id);
        self.incoming[to].push(id);
    }

    pub fn node_count(&self) -> usize {
        self.outgoing.len()
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Edges from `node` to its dependencies, in declaration order
    pub fn dependency_edges(&self, node: usize) -> impl Iterator<Item = &DependencyEdge> {
        self.outgoing
            .get(node)
            .into_iter()
            .flatten()
            .map(move |&id| &self.edges[id])
    }

    /// Edges from the dependents of `node` to it
    pub fn dependent_edges(&self, node: usize) -> impl Iterator<Item = &DependencyEdge> {
        self.incoming
            .get(node)
            .into_iter()
            .flatten()
            .map(move |&id| &self.edges[id])
    }

    /// Distinct direct dependencies of `node`
    pub fn dependencies(&self, node: usize) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.dependency_edges(node)
            .map(|edge| edge.to)
            .filter(|&to| seen.insert(to))
            .collect()
    }

    /// Distinct direct dependents of `node`
    pub fn dependents(&self, node: usize) -> Vec<usize> {
        let mut seen = HashSet::new();
        self.dependent_edges(node)
            .map(|edge| edge.from)
            .filter(|&from| seen.insert(from))
            .collect()
    }

    /// Every spec that transitively requires `root`, breadth first
    ///
    /// Each entry names the dependency through which it was reached. Optional
    /// edges are not followed.
    pub fn required_dependents(&self, root: usize) -> Vec<(usize, usize)> {
        let mut visited = HashSet::from([root]);
        let mut queue = VecDeque::from([root]);
        let mut reached = Vec::new();

        while let Some(node) = queue.pop_front() {
            for edge in self.dependent_edges(node) {
                if edge.kind == DependencyKind::Required && visited.insert(edge.from) {
                    reached.push((edge.from, node));
                    queue.push_back(edge.from);
                }
            }
        }

        reached
    }
}
