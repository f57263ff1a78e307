//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod mock_helpers;

use operator_flow::graph::{NodeId, Value};
use operator_flow::FlowExecutionResult;
use std::time::Duration;

/// Per-node delay used by timing-sensitive tests
pub fn test_step_delay() -> Duration {
    Duration::from_millis(10)
}

/// Text emitted on `out` by a terminal node
pub fn final_text(result: &FlowExecutionResult, node: NodeId) -> Option<String> {
    result
        .final_outputs
        .get(&node)
        .and_then(|outputs| outputs.get("out"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
