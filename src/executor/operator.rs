//! The execution contract every operator type implements.

use crate::executor::context::NodeContext;
use crate::graph::{Node, PortValues};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a single operator execution.
///
/// These never unwind through the scheduler; they end up as the error text of
/// a [`crate::scheduler::NodeExecutionResult`].
#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: String, message: String },

    #[error("Missing required input '{0}'")]
    MissingInput(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("No executor registered for operator type '{0}'")]
    NoExecutor(String),

    #[error("Cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OperatorError {
    pub fn invalid_parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        OperatorError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, OperatorError::Cancelled)
    }
}

/// Polymorphic implementation of one operator type.
///
/// `execute` receives the gathered inputs keyed by input-port name and returns
/// values keyed by output-port name. Long-running implementations should poll
/// [`NodeContext::is_cancelled`] (or await the token) and return
/// [`OperatorError::Cancelled`] promptly.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OperatorExecutor: Send + Sync {
    async fn execute(
        &self,
        ctx: &NodeContext,
        inputs: PortValues,
    ) -> Result<PortValues, OperatorError>;

    /// Static checks on a node's configuration, run by flow validation.
    fn validate(&self, _node: &Node) -> Result<(), String> {
        Ok(())
    }
}
