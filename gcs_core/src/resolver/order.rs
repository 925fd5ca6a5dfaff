//! Cycle detection and load ordering

use super::graph::DependencyGraph;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

const UNVISITED: usize = usize::MAX;

/// Strongly connected components of the subgraph spanned by `nodes`
///
/// Iterative Tarjan, roots taken in the given order. Each component is
/// sorted by node index. Edges to nodes outside `nodes` are ignored.
pub fn strongly_connected(graph: &DependencyGraph, nodes: &[usize]) -> Vec<Vec<usize>> {
    let mut member = vec![false; graph.node_count()];
    for &node in nodes {
        member[node] = true;
    }

    let mut index = vec![UNVISITED; graph.node_count()];
    let mut lowlink = vec![0usize; graph.node_count()];
    let mut on_stack = vec![false; graph.node_count()];
    let mut stack = Vec::new();
    let mut next_index = 0;
    let mut components = Vec::new();

    for &root in nodes {
        if index[root] != UNVISITED {
            continue;
        }

        let mut work: Vec<(usize, std::vec::IntoIter<usize>)> = Vec::new();
        index[root] = next_index;
        lowlink[root] = next_index;
        next_index += 1;
        stack.push(root);
        on_stack[root] = true;
        work.push((root, graph.dependencies(root).into_iter()));

        while let Some((node, pending)) = work.last_mut() {
            let node = *node;
            match pending.next() {
                Some(next) if !member[next] => {}
                Some(next) if index[next] == UNVISITED => {
                    index[next] = next_index;
                    lowlink[next] = next_index;
                    next_index += 1;
                    stack.push(next);
                    on_stack[next] = true;
                    work.push((next, graph.dependencies(next).into_iter()));
                }
                Some(next) => {
                    if on_stack[next] {
                        lowlink[node] = lowlink[node].min(index[next]);
                    }
                }
                None => {
                    work.pop();
                    if let Some((parent, _)) = work.last() {
                        let parent = *parent;
                        lowlink[parent] = lowlink[parent].min(lowlink[node]);
                    }
                    if lowlink[node] == index[node] {
                        let mut component = Vec::new();
                        while let Some(top) = stack.pop() {
                            on_stack[top] = false;
                            component.push(top);
                            if top == node {
                                break;
                            }
                        }
                        component.sort_unstable();
                        components.push(component);
                    }
                }
            }
        }
    }

    components
}

/// Find dependency cycles among `nodes`
///
/// Every node of a strongly connected component with more than one member,
/// and every node depending on itself, lies on at least one reported cycle.
/// A cycle is the shortest dependency path from a member back to itself,
/// rotated to start at its earliest discovered node. Cycles are sorted by
/// that first node. Edges to nodes outside `nodes` are ignored.
pub fn find_cycles(graph: &DependencyGraph, nodes: &[usize]) -> Vec<Vec<usize>> {
    let mut cycles: Vec<Vec<usize>> = Vec::new();

    for component in strongly_connected(graph, nodes) {
        let cyclic = match component.as_slice() {
            [single] => graph.dependencies(*single).contains(single),
            _ => true,
        };
        if !cyclic {
            continue;
        }

        let mut covered = HashSet::new();
        for &start in &component {
            if covered.contains(&start) {
                continue;
            }
            let Some(mut cycle) = shortest_cycle(graph, &component, start) else {
                continue;
            };
            covered.extend(cycle.iter().copied());
            let earliest = cycle.iter().min().copied();
            if let Some(offset) = cycle.iter().position(|&node| Some(node) == earliest) {
                cycle.rotate_left(offset);
            }
            if !cycles.contains(&cycle) {
                cycles.push(cycle);
            }
        }
    }

    cycles.sort_by_key(|cycle| cycle.first().copied());
    cycles
}

/// Shortest path from `start` back to itself inside a sorted `component`
fn shortest_cycle(
    graph: &DependencyGraph,
    component: &[usize],
    start: usize,
) -> Option<Vec<usize>> {
    let mut parent: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for next in graph.dependencies(node) {
            if component.binary_search(&next).is_err() {
                continue;
            }
            if next == start {
                let mut cycle = vec![node];
                let mut current = node;
                while current != start {
                    current = *parent.get(&current)?;
                    cycle.push(current);
                }
                cycle.reverse();
                return Some(cycle);
            }
            if !parent.contains_key(&next) {
                parent.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    None
}

/// Order `nodes` so that every node follows all of its dependencies
///
/// Kahn's algorithm; among nodes that are ready, the lowest index (earliest
/// discovered) goes first. Only edges between members of `nodes` count.
/// Nodes caught in a cycle are left out.
pub fn load_order(graph: &DependencyGraph, nodes: &[usize]) -> Vec<usize> {
    let mut member = vec![false; graph.node_count()];
    for &node in nodes {
        member[node] = true;
    }

    let mut pending = vec![0usize; graph.node_count()];
    for &node in nodes {
        pending[node] = graph
            .dependencies(node)
            .into_iter()
            .filter(|&dependency| member[dependency])
            .count();
    }

    let mut ready: BinaryHeap<Reverse<usize>> = nodes
        .iter()
        .copied()
        .filter(|&node| pending[node] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for dependent in graph.dependents(node) {
            if member[dependent] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
    }

    order
}
