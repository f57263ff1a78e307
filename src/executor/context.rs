use crate::executor::operator::OperatorError;
use crate::graph::Node;
use crate::pool::{BufferPool, BufferShape, PooledBuffer};
use crate::scheduler::RunId;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What an executor sees of the run while it executes one node.
#[derive(Clone)]
pub struct NodeContext {
    run_id: RunId,
    node: Arc<Node>,
    cancel: CancellationToken,
    pool: BufferPool,
}

impl NodeContext {
    pub fn new(run_id: RunId, node: Arc<Node>, cancel: CancellationToken, pool: BufferPool) -> Self {
        Self {
            run_id,
            node,
            cancel,
            pool,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// The node being executed, including its current parameter values.
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// `Err(Cancelled)` once the run or this node's wave has been cancelled.
    pub fn check_cancelled(&self) -> Result<(), OperatorError> {
        if self.cancel.is_cancelled() {
            Err(OperatorError::Cancelled)
        } else {
            Ok(())
        }
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Rent a zeroed buffer for an image output. Wrap it with
    /// [`crate::graph::ImageFrame::from_pooled`] once written; it goes back
    /// to the pool when the last consumer drops the frame.
    pub fn rent_frame(&self, shape: BufferShape) -> PooledBuffer {
        self.pool.rent(shape)
    }

    /// Numeric parameter, or `InvalidParameter` when absent or not numeric.
    pub fn require_f64(&self, name: &str) -> Result<f64, OperatorError> {
        self.node
            .param_f64(name)
            .ok_or_else(|| OperatorError::invalid_parameter(name, "expected a numeric value"))
    }

    pub fn require_i64(&self, name: &str) -> Result<i64, OperatorError> {
        self.node
            .param_i64(name)
            .ok_or_else(|| OperatorError::invalid_parameter(name, "expected an integer value"))
    }
}

impl std::fmt::Debug for NodeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeContext")
            .field("run_id", &self.run_id)
            .field("node", &self.node.name)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
