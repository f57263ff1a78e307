//! Run planning and execution.
//!
//! ```text
//! Graph ──► GraphValidator ──► FlowPlanner ──► ExecutionPlan
//!                                                  │
//!            RunOptions ──► FlowScheduler::execute ┘──► FlowExecutionResult
//!                                  │
//!                                  ├──► RunRegistry (status polling)
//!                                  └──► FlowEvent subscribers
//! ```
//!
//! Sequential runs execute one node at a time in topological order. Parallel
//! runs admit one dependency wave at a time and bound concurrency with a
//! per-run semaphore. A critical failure or cancellation stops admission;
//! in-flight nodes are cancelled cooperatively and their results recorded.

pub mod context;
pub mod engine;
pub mod events;
pub mod plan;
pub mod planner;
pub mod result;

pub use crate::config::ExecutionMode;
pub use context::{ExecutionContext, RunId, RunRegistry, RunStatus, SharedContext};
pub use engine::{FlowScheduler, FlowValidationResult, RunOptions};
pub use events::{EventSink, FlowEvent, Subscribers, EVENT_CHANNEL_CAPACITY};
pub use plan::{ExecutionPlan, PlanStats};
pub use planner::FlowPlanner;
pub use result::{FlowExecutionResult, NodeExecutionResult, RunFailure};
