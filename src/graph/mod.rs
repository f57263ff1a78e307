//! Graph model: operator nodes, typed ports, parameters and connections.
//!
//! ```text
//! [Camera] ─image─► [Threshold] ─image─► [Blob] ─count─► [Judge]
//!                        ▲
//!                 level (parameter)
//! ```
//!
//! The model carries no execution state. The scheduler reads it as an
//! immutable snapshot; results live in [`crate::scheduler`].

pub mod flow_graph;
pub mod id;
pub mod node;
pub mod parameter;
pub mod port;
pub mod value;

pub use flow_graph::{qualified_port_key, Connection, Graph};
pub use id::{NodeId, OperatorType};
pub use node::{Node, Position};
pub use parameter::Parameter;
pub use port::{DataKind, PortDescriptor, PortDirection};
pub use value::{Geometry, ImageFrame, PortValues, Value};
