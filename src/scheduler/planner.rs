use super::plan::{ExecutionPlan, PlanStats};
use crate::error::{FlowError, Result};
use crate::graph::{Graph, NodeId};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Compiles a graph snapshot into an [`ExecutionPlan`]
pub struct FlowPlanner;

impl ExecutionPlan {
    /// Compile `graph`. Fails with [`FlowError::Scheduling`] when the enabled
    /// subgraph is not acyclic.
    pub fn build(graph: &Graph) -> Result<ExecutionPlan> {
        FlowPlanner::compile(graph)
    }
}

impl FlowPlanner {
    /// Compile a graph into an execution plan.
    ///
    /// Disabled nodes are dropped along with every connection touching them.
    /// Ties in the topological order are broken by node name, then id, so the
    /// same graph always yields the same plan.
    pub fn compile(graph: &Graph) -> Result<ExecutionPlan> {
        let start_time = std::time::Instant::now();

        let enabled: Vec<NodeId> = graph
            .nodes_sorted()
            .into_iter()
            .filter(|n| n.enabled)
            .map(|n| n.id)
            .collect();
        let enabled_set: HashSet<NodeId> = enabled.iter().copied().collect();

        // Build adjacency lists (forward and backward), distinct per node pair
        let mut fwd_adj: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut bwd_adj: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut consumers: HashMap<(NodeId, String), usize> = HashMap::new();

        for conn in graph.connections() {
            if !enabled_set.contains(&conn.source) || !enabled_set.contains(&conn.target) {
                continue;
            }
            *consumers
                .entry((conn.source, conn.source_port.clone()))
                .or_default() += 1;

            let next = fwd_adj.entry(conn.source).or_default();
            if !next.contains(&conn.target) {
                next.push(conn.target);
                bwd_adj.entry(conn.target).or_default().push(conn.source);
            }
        }

        let order = Self::topological_sort(graph, &enabled, &fwd_adj, &bwd_adj)?;

        // Level = 1 + deepest predecessor; order guarantees predecessors first
        let mut levels: HashMap<NodeId, usize> = HashMap::with_capacity(order.len());
        for &id in &order {
            let level = bwd_adj
                .get(&id)
                .into_iter()
                .flatten()
                .filter_map(|p| levels.get(p))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            levels.insert(id, level);
        }

        let wave_count = levels.values().max().map(|l| l + 1).unwrap_or(0);
        let mut waves: Vec<Vec<NodeId>> = vec![Vec::new(); wave_count];
        for &id in &order {
            if let Some(&level) = levels.get(&id) {
                waves[level].push(id);
            }
        }

        let terminal: HashSet<NodeId> = order
            .iter()
            .copied()
            .filter(|id| fwd_adj.get(id).map_or(true, Vec::is_empty))
            .collect();

        let unreachable_from_sink = Self::unreachable_from_sinks(graph, &order, &bwd_adj);
        let isolated: Vec<NodeId> = if order.len() > 1 {
            order
                .iter()
                .copied()
                .filter(|id| !fwd_adj.contains_key(id) && !bwd_adj.contains_key(id))
                .collect()
        } else {
            Vec::new()
        };

        let stats = PlanStats {
            total_nodes: graph.node_count(),
            enabled_nodes: order.len(),
            disabled_nodes: graph.node_count().saturating_sub(order.len()),
            entry_nodes: order.iter().filter(|id| !bwd_adj.contains_key(*id)).count(),
            terminal_nodes: terminal.len(),
            wave_count,
            max_wave_width: waves.iter().map(Vec::len).max().unwrap_or(0),
            compile_time_us: start_time.elapsed().as_micros() as u64,
        };

        tracing::debug!(
            "Compiled plan for '{}': {} nodes in {} waves",
            graph.name,
            stats.enabled_nodes,
            stats.wave_count
        );

        Ok(ExecutionPlan {
            order,
            waves,
            stats,
            unreachable_from_sink,
            isolated,
            predecessors: bwd_adj,
            consumers,
            terminal,
            levels,
        })
    }

    /// Kahn's algorithm over distinct predecessor counts
    fn topological_sort(
        graph: &Graph,
        enabled: &[NodeId],
        fwd_adj: &HashMap<NodeId, Vec<NodeId>>,
        bwd_adj: &HashMap<NodeId, Vec<NodeId>>,
    ) -> Result<Vec<NodeId>> {
        let key = |id: NodeId| -> (String, NodeId) {
            (
                graph.node(id).map(|n| n.name.clone()).unwrap_or_default(),
                id,
            )
        };

        let mut in_degree: HashMap<NodeId, usize> = enabled
            .iter()
            .map(|&id| (id, bwd_adj.get(&id).map_or(0, Vec::len)))
            .collect();

        let mut ready: BTreeSet<(String, NodeId)> = enabled
            .iter()
            .filter(|id| in_degree.get(*id) == Some(&0))
            .map(|&id| key(id))
            .collect();
        let mut order = Vec::with_capacity(enabled.len());

        while let Some((_, node)) = ready.pop_first() {
            order.push(node);
            for &next in fwd_adj.get(&node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(key(next));
                    }
                }
            }
        }

        if order.len() != enabled.len() {
            let scheduled: HashSet<NodeId> = order.iter().copied().collect();
            let stuck: Vec<String> = enabled
                .iter()
                .filter(|id| !scheduled.contains(*id))
                .map(|&id| key(id).0)
                .collect();
            tracing::warn!(
                "Graph '{}' has a cycle! Only {} of {} nodes scheduled.",
                graph.name,
                order.len(),
                enabled.len()
            );
            return Err(FlowError::Scheduling(format!(
                "Cycle detected among nodes: {}",
                stuck.join(", ")
            )));
        }

        Ok(order)
    }

    /// Backward reachability from structural sinks (nodes without output
    /// ports). Empty when the graph declares no sink at all.
    fn unreachable_from_sinks(
        graph: &Graph,
        order: &[NodeId],
        bwd_adj: &HashMap<NodeId, Vec<NodeId>>,
    ) -> Vec<NodeId> {
        let sinks: Vec<NodeId> = order
            .iter()
            .copied()
            .filter(|&id| graph.node(id).is_some_and(|n| n.outputs().is_empty()))
            .collect();
        if sinks.is_empty() {
            return Vec::new();
        }

        let mut reachable: HashSet<NodeId> = sinks.iter().copied().collect();
        let mut stack = sinks;
        while let Some(node) = stack.pop() {
            for &prev in bwd_adj.get(&node).into_iter().flatten() {
                if reachable.insert(prev) {
                    stack.push(prev);
                }
            }
        }

        order
            .iter()
            .copied()
            .filter(|id| !reachable.contains(id))
            .collect()
    }
}
