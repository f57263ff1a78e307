//! Property tests for validation and planning over random graphs

mod common;

use common::builders::join_node;
use operator_flow::graph::{Connection, Graph, NodeId};
use operator_flow::scheduler::FlowPlanner;
use operator_flow::GraphValidator;
use proptest::prelude::*;
use std::collections::HashMap;

/// Random DAG as (node count, forward edges `i -> j` with `i < j`).
fn dag() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
    (2usize..12).prop_flat_map(|n| {
        let edges = prop::collection::vec((0..n, 0..n), 0..n * 2).prop_map(|pairs| {
            let mut edges: Vec<(usize, usize)> = pairs
                .into_iter()
                .filter(|(a, b)| a != b)
                .map(|(a, b)| (a.min(b), a.max(b)))
                .collect();
            edges.sort_unstable();
            edges.dedup();
            edges
        });
        (Just(n), edges)
    })
}

fn build(n: usize, edges: &[(usize, usize)]) -> (Graph, Vec<NodeId>) {
    let mut graph = Graph::new("random");
    let ids: Vec<NodeId> = (0..n)
        .map(|j| {
            let mut ports: Vec<String> = edges
                .iter()
                .filter(|(_, to)| *to == j)
                .map(|(from, _)| format!("from_{}", from))
                .collect();
            ports.push("back".to_string());
            let ports: Vec<&str> = ports.iter().map(String::as_str).collect();
            graph
                .add_node(join_node(&format!("N{}", j), &ports))
                .unwrap()
        })
        .collect();

    for &(from, to) in edges {
        graph
            .connect(ids[from], "out", ids[to], &format!("from_{}", from))
            .unwrap();
    }
    (graph, ids)
}

proptest! {
    #[test]
    fn test_random_dag_is_valid_and_ordered((n, edges) in dag()) {
        let (graph, ids) = build(n, &edges);

        let validation = GraphValidator::validate(&graph);
        prop_assert!(validation.valid, "{:?}", validation.errors);

        let plan = FlowPlanner::compile(&graph).unwrap();
        prop_assert_eq!(plan.order.len(), n);

        let position: HashMap<NodeId, usize> =
            plan.order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        for &(from, to) in &edges {
            prop_assert!(position[&ids[from]] < position[&ids[to]]);
            prop_assert!(plan.level(ids[from]) < plan.level(ids[to]));
        }

        let in_waves: usize = plan.waves.iter().map(Vec::len).sum();
        prop_assert_eq!(in_waves, n);
        prop_assert_eq!(plan.stats.wave_count, plan.waves.len());
    }

    #[test]
    fn test_back_edge_is_reported_as_cycle((n, edges) in dag(), pick in any::<prop::sample::Index>()) {
        prop_assume!(!edges.is_empty());
        let (mut graph, ids) = build(n, &edges);
        let (from, to) = edges[pick.index(edges.len())];
        graph.add_connection(Connection::new(ids[to], "out", ids[from], "back"));

        let validation = GraphValidator::validate(&graph);
        prop_assert!(!validation.valid);
        prop_assert!(validation.has_cycle());
        prop_assert!(FlowPlanner::compile(&graph).is_err());
    }

    #[test]
    fn test_disabling_nodes_never_breaks_a_dag((n, edges) in dag(), mask in prop::collection::vec(any::<bool>(), 12)) {
        let (mut graph, ids) = build(n, &edges);
        for (i, id) in ids.iter().enumerate() {
            if mask[i] {
                graph.set_enabled(*id, false).unwrap();
            }
        }

        prop_assert!(GraphValidator::validate(&graph).valid);
        let plan = FlowPlanner::compile(&graph).unwrap();
        let enabled = mask.iter().take(n).filter(|disabled| !**disabled).count();
        prop_assert_eq!(plan.len(), enabled);
        for &(from, to) in &edges {
            if !mask[from] && !mask[to] {
                prop_assert!(plan.position(ids[from]) < plan.position(ids[to]));
            }
        }
    }
}
