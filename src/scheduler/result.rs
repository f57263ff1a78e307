//! Structured outcome of a run and of each node in it.

use super::context::{RunId, RunStatus};
use super::events::FlowEvent;
use crate::graph::{NodeId, PortValues};
use std::collections::HashMap;
use std::time::Duration;

/// Outcome of a single node execution.
#[derive(Debug, Clone)]
pub struct NodeExecutionResult {
    pub node_id: NodeId,
    pub node_name: String,
    pub success: bool,
    /// Outputs keyed by port name; empty on failure. Image outputs appear
    /// only when `record_image_outputs` is set.
    pub outputs: PortValues,
    pub elapsed: Duration,
    /// Failure message; `None` on success
    pub error: Option<String>,
}

impl NodeExecutionResult {
    pub fn succeeded(
        node_id: NodeId,
        node_name: impl Into<String>,
        outputs: PortValues,
        elapsed: Duration,
    ) -> Self {
        Self {
            node_id,
            node_name: node_name.into(),
            success: true,
            outputs,
            elapsed,
            error: None,
        }
    }

    pub fn failed(
        node_id: NodeId,
        node_name: impl Into<String>,
        error: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            node_id,
            node_name: node_name.into(),
            success: false,
            outputs: PortValues::new(),
            elapsed,
            error: Some(error.into()),
        }
    }
}

/// Why a run did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    /// The graph failed validation; nothing was executed
    Validation(Vec<String>),
    /// A critical node failed
    Node { node_id: NodeId, message: String },
    /// The caller's cancellation signal fired
    Cancelled,
    /// Internal invariant violated while planning or joining work
    Scheduling(String),
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunFailure::Validation(errors) => {
                write!(f, "Validation failed: {}", errors.join("; "))
            }
            RunFailure::Node { message, .. } => write!(f, "{}", message),
            RunFailure::Cancelled => write!(f, "Execution cancelled"),
            RunFailure::Scheduling(message) => write!(f, "Scheduling error: {}", message),
        }
    }
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone)]
pub struct FlowExecutionResult {
    pub run_id: RunId,
    pub status: RunStatus,
    /// True only when every critical node succeeded and the run was not cancelled
    pub success: bool,
    pub elapsed: Duration,
    /// Sequential: topological order. Parallel: wave order, unordered within a wave.
    pub node_results: Vec<NodeExecutionResult>,
    /// Output values of terminal nodes, detached from the buffer pool
    pub final_outputs: HashMap<NodeId, PortValues>,
    pub error: Option<String>,
    pub failure: Option<RunFailure>,
    pub events: Vec<FlowEvent>,
}

impl FlowExecutionResult {
    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    pub fn node_result(&self, node_id: NodeId) -> Option<&NodeExecutionResult> {
        self.node_results.iter().find(|r| r.node_id == node_id)
    }

    /// Node names in result order
    pub fn executed_names(&self) -> Vec<&str> {
        self.node_results
            .iter()
            .map(|r| r.node_name.as_str())
            .collect()
    }

    pub fn failed_nodes(&self) -> impl Iterator<Item = &NodeExecutionResult> {
        self.node_results.iter().filter(|r| !r.success)
    }
}
