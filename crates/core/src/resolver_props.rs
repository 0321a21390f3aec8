// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests over randomly generated dependency graphs.

use super::*;
use proptest::prelude::*;

/// Random DAG: node `i` may only depend on nodes `< i`, so the graph is
/// acyclic by construction.
fn arb_dag(max_nodes: usize) -> impl Strategy<Value = Vec<ResolverNode>> {
    prop::collection::vec(prop::collection::vec(any::<prop::sample::Index>(), 0..4), 1..max_nodes)
        .prop_map(|spec| {
            spec.iter()
                .enumerate()
                .map(|(i, deps)| {
                    let mut dep_ids: Vec<String> = deps
                        .iter()
                        .filter(|_| i > 0)
                        .map(|idx| idx.index(i).to_string())
                        .collect();
                    dep_ids.sort();
                    dep_ids.dedup();
                    ResolverNode::new(i.to_string(), dep_ids)
                })
                .collect()
        })
}

proptest! {
    #[test]
    fn acyclic_graphs_always_resolve(nodes in arb_dag(24)) {
        let r = resolve_dependencies(&nodes);
        prop_assert!(r.success);
        prop_assert!(!r.has_cycles);
        prop_assert_eq!(r.topological_order.len(), nodes.len());
    }

    #[test]
    fn topological_order_respects_every_edge(nodes in arb_dag(24)) {
        let r = resolve_dependencies(&nodes);
        let position: std::collections::HashMap<&str, usize> = r
            .topological_order
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.as_str(), pos))
            .collect();
        for node in &nodes {
            for dep in &node.dependencies {
                prop_assert!(position[dep.as_str()] < position[node.id.as_str()]);
            }
        }
    }

    #[test]
    fn parallel_groups_partition_the_nodes(nodes in arb_dag(24)) {
        let r = resolve_dependencies(&nodes);
        let mut seen: Vec<&str> = r
            .parallel_groups
            .iter()
            .flatten()
            .map(String::as_str)
            .collect();
        seen.sort_unstable();
        let mut expected: Vec<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        expected.sort_unstable();
        prop_assert_eq!(seen, expected);
    }

    #[test]
    fn critical_path_bounds_total_duration(nodes in arb_dag(24)) {
        let r = resolve_dependencies(&nodes);
        let total: u64 = nodes
            .iter()
            .map(|n| n.estimated_duration_ms.unwrap_or(DEFAULT_DURATION_MS))
            .sum();
        prop_assert!(r.estimated_duration_ms <= total);
        prop_assert!(!r.critical_path.is_empty());
    }
}
