//! # Operator Flow: graph execution engine for image-inspection operators
//!
//! A flow is a directed acyclic graph of operator nodes wired port to port.
//! The engine validates the graph, compiles it into an execution plan and runs
//! it sequentially or in parallel waves, dispatching each node to an
//! executor registered for its operator type.
//!
//! ## Architecture
//!
//! - **Graph**: nodes with typed ports and bounded parameters, plus connections
//! - **Validation**: references, fan-in, kind compatibility, cycles, required inputs
//! - **Scheduler**: planning, sequential/parallel runs, cancellation, status polling
//! - **Executor**: the async operator contract and the type-keyed registry
//! - **Pool**: shape-keyed reuse of large image buffers
//! - **Communication**: crossbeam channels fan run events out to subscribers
//!
//! ## Configuration
//!
//! Engine settings are read from `engine.toml` in the platform config
//! directory under `operator-flow` (see [`config`]).
//!
//! ## Example
//!
//! ```ignore
//! use operator_flow::{
//!     config::EngineConfig,
//!     executor::builtin::{constant_node, passthrough_node},
//!     graph::{DataKind, Graph},
//!     scheduler::{FlowScheduler, RunOptions},
//! };
//!
//! #[tokio::main]
//! async fn main() -> operator_flow::Result<()> {
//!     let config = EngineConfig::load_or_default("engine.toml");
//!     let _guard = operator_flow::logging::init_logging(&config.logging)?;
//!
//!     let mut graph = Graph::new("demo");
//!     let k = graph.add_node(constant_node("K", 3.0))?;
//!     let p = graph.add_node(passthrough_node("P", "value", DataKind::Scalar))?;
//!     graph.connect(k, "value", p, "value")?;
//!
//!     let scheduler = FlowScheduler::new(config);
//!     let result = scheduler.execute(&graph, RunOptions::parallel()).await;
//!     println!("{} in {:?}", result.status, result.elapsed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod graph;
pub mod logging;
pub mod pool;
pub mod scheduler;
pub mod validation;

// Re-export commonly used types
pub use config::{EngineConfig, ExecutionMode};
pub use error::{FlowError, Result};
pub use executor::{ExecutorRegistry, NodeContext, OperatorError, OperatorExecutor};
pub use graph::{Connection, DataKind, Graph, Node, NodeId, PortDescriptor, PortValues, Value};
pub use pool::{BufferPool, BufferShape};
pub use scheduler::{FlowExecutionResult, FlowScheduler, RunId, RunOptions, RunStatus};
pub use validation::{GraphValidator, ValidationResult};
