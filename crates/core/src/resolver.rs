// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dependency resolver: topological order, parallel cohorts, critical path.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Assumed duration when a sortie carries no estimate.
pub const DEFAULT_DURATION_MS: u64 = 1000;

/// One node in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverNode {
    pub id: String,
    pub dependencies: Vec<String>,
    pub estimated_duration_ms: Option<u64>,
}

impl ResolverNode {
    pub fn new(id: impl Into<String>, dependencies: Vec<String>) -> Self {
        Self { id: id.into(), dependencies, estimated_duration_ms: None }
    }

    pub fn with_duration(mut self, ms: u64) -> Self {
        self.estimated_duration_ms = Some(ms);
        self
    }
}

/// Resolver output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub success: bool,
    pub topological_order: Vec<String>,
    /// Cohorts by depth; all members of a group may run concurrently.
    pub parallel_groups: Vec<Vec<String>>,
    pub critical_path: Vec<String>,
    pub estimated_duration_ms: u64,
    pub has_cycles: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycle_nodes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Resolution {
    fn cyclic(cycle_nodes: Vec<String>) -> Self {
        Self {
            success: false,
            topological_order: vec![],
            parallel_groups: vec![],
            critical_path: vec![],
            estimated_duration_ms: 0,
            has_cycles: true,
            cycle_nodes,
            error: Some("circular dependency detected".to_string()),
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            topological_order: vec![],
            parallel_groups: vec![],
            critical_path: vec![],
            estimated_duration_ms: 0,
            has_cycles: false,
            cycle_nodes: vec![],
            error: Some(error),
        }
    }
}

/// Resolve a dependency graph into an execution plan.
///
/// Ties in the topological order are broken by insertion order, so the plan
/// is deterministic for a given input slice.
pub fn resolve_dependencies(nodes: &[ResolverNode]) -> Resolution {
    // Index by id, preserving insertion order for tie-breaking.
    let index: HashMap<&str, usize> =
        nodes.iter().enumerate().map(|(i, n)| (n.id.as_str(), i)).collect();

    for node in nodes {
        for dep in &node.dependencies {
            if !index.contains_key(dep.as_str()) {
                return Resolution::failed(format!(
                    "node {} depends on unknown node {}",
                    node.id, dep
                ));
            }
        }
    }

    if let Some(cycle) = find_cycle(nodes, &index) {
        return Resolution::cyclic(cycle);
    }

    let order = topological_order(nodes, &index);
    let depths = node_depths(nodes, &index);
    let groups = parallel_groups(nodes, &depths);
    let cp_len = critical_path_lengths(nodes, &index);
    let critical_path = trace_critical_path(nodes, &index, &cp_len);
    let estimated_duration_ms = nodes
        .iter()
        .map(|n| cp_len.get(n.id.as_str()).copied().unwrap_or(0))
        .max()
        .unwrap_or(0);

    Resolution {
        success: true,
        topological_order: order,
        parallel_groups: groups,
        critical_path,
        estimated_duration_ms,
        has_cycles: false,
        cycle_nodes: vec![],
        error: None,
    }
}

fn duration_of(node: &ResolverNode) -> u64 {
    node.estimated_duration_ms.unwrap_or(DEFAULT_DURATION_MS)
}

/// DFS with a recursion set; returns the ids on the first cycle found.
fn find_cycle(nodes: &[ResolverNode], index: &HashMap<&str, usize>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        White,
        Grey,
        Black,
    }

    let mut marks = vec![Mark::White; nodes.len()];

    // Iterative DFS so a deep graph can't blow the call stack.
    fn visit(
        start: usize,
        nodes: &[ResolverNode],
        index: &HashMap<&str, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<usize>> {
        let mut work: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some(&(n, edge)) = work.last() {
            if edge == 0 {
                marks[n] = Mark::Grey;
                path.push(n);
            }
            if edge < nodes[n].dependencies.len() {
                if let Some(last) = work.last_mut() {
                    last.1 += 1;
                }
                let dep = match index.get(nodes[n].dependencies[edge].as_str()) {
                    Some(&d) => d,
                    None => continue,
                };
                match marks[dep] {
                    Mark::Grey => {
                        // Cycle: slice the current path from the repeat point.
                        let from = path.iter().position(|&p| p == dep).unwrap_or(0);
                        let mut cycle: Vec<usize> = path[from..].to_vec();
                        cycle.push(dep);
                        return Some(cycle);
                    }
                    Mark::White => work.push((dep, 0)),
                    Mark::Black => {}
                }
            } else {
                marks[n] = Mark::Black;
                path.pop();
                work.pop();
            }
        }
        None
    }

    let mut path = Vec::new();
    for i in 0..nodes.len() {
        if marks[i] == Mark::White {
            if let Some(cycle) = visit(i, nodes, index, &mut marks, &mut path) {
                return Some(cycle.into_iter().map(|i| nodes[i].id.clone()).collect());
            }
        }
    }
    None
}

/// Kahn's algorithm; the ready set is scanned in insertion order.
fn topological_order(nodes: &[ResolverNode], index: &HashMap<&str, usize>) -> Vec<String> {
    let mut indegree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, node) in nodes.iter().enumerate() {
        for dep in &node.dependencies {
            if let Some(&d) = index.get(dep.as_str()) {
                indegree[i] += 1;
                dependents[d].push(i);
            }
        }
    }

    let mut ready: Vec<usize> = (0..nodes.len()).filter(|&i| indegree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());
    while !ready.is_empty() {
        let next = ready.remove(0);
        order.push(nodes[next].id.clone());
        for &dep in &dependents[next] {
            indegree[dep] -= 1;
            if indegree[dep] == 0 {
                // Insert keeping the ready set sorted by insertion index.
                let pos = ready.partition_point(|&r| r < dep);
                ready.insert(pos, dep);
            }
        }
    }
    order
}

/// Depth of each node: 0 for roots, else 1 + max(depth of deps).
fn node_depths(nodes: &[ResolverNode], index: &HashMap<&str, usize>) -> Vec<usize> {
    let mut depths = vec![0usize; nodes.len()];
    // Dependencies always precede dependents in a valid (acyclic) graph
    // only when ids were inserted in order; walk until a fixpoint instead.
    let mut changed = true;
    while changed {
        changed = false;
        for (i, node) in nodes.iter().enumerate() {
            let depth = node
                .dependencies
                .iter()
                .filter_map(|d| index.get(d.as_str()).map(|&j| depths[j] + 1))
                .max()
                .unwrap_or(0);
            if depth != depths[i] {
                depths[i] = depth;
                changed = true;
            }
        }
    }
    depths
}

fn parallel_groups(nodes: &[ResolverNode], depths: &[usize]) -> Vec<Vec<String>> {
    let max_depth = depths.iter().copied().max().unwrap_or(0);
    let mut groups: Vec<Vec<String>> = vec![Vec::new(); if nodes.is_empty() { 0 } else { max_depth + 1 }];
    for (i, node) in nodes.iter().enumerate() {
        groups[depths[i]].push(node.id.clone());
    }
    groups
}

/// Longest-chain length ending at each node, summing estimated durations.
fn critical_path_lengths<'a>(
    nodes: &'a [ResolverNode],
    index: &HashMap<&str, usize>,
) -> HashMap<&'a str, u64> {
    let mut lengths: HashMap<&str, u64> = HashMap::with_capacity(nodes.len());
    let mut changed = true;
    while changed {
        changed = false;
        for node in nodes {
            let deps_max = node
                .dependencies
                .iter()
                .filter_map(|d| {
                    index
                        .get(d.as_str())
                        .and_then(|&j| lengths.get(nodes[j].id.as_str()).copied())
                })
                .max()
                .unwrap_or(0);
            let len = deps_max + duration_of(node);
            if lengths.get(node.id.as_str()) != Some(&len) {
                lengths.insert(node.id.as_str(), len);
                changed = true;
            }
        }
    }
    lengths
}

/// Trace the longest chain from its terminal node back through the
/// dependency edges of maximum length.
fn trace_critical_path(
    nodes: &[ResolverNode],
    index: &HashMap<&str, usize>,
    lengths: &HashMap<&str, u64>,
) -> Vec<String> {
    let Some(end) = nodes
        .iter()
        .max_by_key(|n| lengths.get(n.id.as_str()).copied().unwrap_or(0))
    else {
        return vec![];
    };

    let mut path = vec![end.id.clone()];
    let mut current = end;
    loop {
        let next = current
            .dependencies
            .iter()
            .filter_map(|d| index.get(d.as_str()).map(|&j| &nodes[j]))
            .max_by_key(|n| lengths.get(n.id.as_str()).copied().unwrap_or(0));
        match next {
            Some(node) => {
                path.push(node.id.clone());
                current = node;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;

#[cfg(test)]
#[path = "resolver_props.rs"]
mod props;
