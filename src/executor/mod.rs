//! Operator execution contract and type-based dispatch.
//!
//! ```text
//! Node.operator_type ──► ExecutorRegistry ──► Arc<dyn OperatorExecutor>
//!                                                  │
//!                          NodeContext + inputs ───┘──► outputs | OperatorError
//! ```

pub mod builtin;
pub mod context;
pub mod operator;
pub mod registry;

pub use context::NodeContext;
pub use operator::{OperatorError, OperatorExecutor};
pub use registry::ExecutorRegistry;
