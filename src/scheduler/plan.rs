use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Execution plan for one graph snapshot.
/// Covers enabled nodes only; disabled nodes and their connections are absent.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    /// Enabled nodes in topological order
    pub order: Vec<NodeId>,

    /// Dependency levels; every node sits one level after its deepest predecessor
    pub waves: Vec<Vec<NodeId>>,

    /// Compilation statistics
    pub stats: PlanStats,

    /// Nodes with no path to a node without output ports
    pub unreachable_from_sink: Vec<NodeId>,

    /// Enabled nodes with no enabled connection at all
    pub isolated: Vec<NodeId>,

    pub(crate) predecessors: HashMap<NodeId, Vec<NodeId>>,
    pub(crate) consumers: HashMap<(NodeId, String), usize>,
    pub(crate) terminal: HashSet<NodeId>,
    pub(crate) levels: HashMap<NodeId, usize>,
}

/// Statistics about a compiled plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStats {
    /// Total number of nodes in the graph (including disabled)
    pub total_nodes: usize,

    /// Number of nodes in the plan
    pub enabled_nodes: usize,

    /// Number of disabled nodes (not in the plan)
    pub disabled_nodes: usize,

    /// Nodes without enabled predecessors
    pub entry_nodes: usize,

    /// Nodes without enabled successors
    pub terminal_nodes: usize,

    /// Number of dependency levels
    pub wave_count: usize,

    /// Largest number of nodes in a single level
    pub max_wave_width: usize,

    /// Compilation time in microseconds
    pub compile_time_us: u64,
}

impl ExecutionPlan {
    /// Check if the plan has any nodes
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.levels.contains_key(&node)
    }

    /// Distinct enabled nodes feeding `node`
    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        self.predecessors
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of enabled connections reading `node.port`
    pub fn consumer_count(&self, node: NodeId, port: &str) -> usize {
        self.consumers
            .get(&(node, port.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Whether no enabled node consumes any of `node`'s outputs
    pub fn is_terminal(&self, node: NodeId) -> bool {
        self.terminal.contains(&node)
    }

    /// Zero-based wave index of `node`
    pub fn level(&self, node: NodeId) -> Option<usize> {
        self.levels.get(&node).copied()
    }

    /// Position of `node` in the topological order
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.order.iter().position(|&id| id == node)
    }
}
