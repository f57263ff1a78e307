//! The flow graph: nodes plus directed port-to-port connections.
//!
//! A `Graph` is handed to the scheduler as an immutable snapshot for the
//! duration of one run. `connect` enforces the structural invariants at edit
//! time; `add_connection` stores a connection verbatim (for import layers)
//! and leaves checking to the validator.

use crate::error::{FlowError, Result};
use crate::graph::id::NodeId;
use crate::graph::node::Node;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A directed link from an output port to an input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source: NodeId,
    pub source_port: String,
    pub target: NodeId,
    pub target_port: String,
}

impl Connection {
    pub fn new(
        source: NodeId,
        source_port: impl Into<String>,
        target: NodeId,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source,
            source_port: source_port.into(),
            target,
            target_port: target_port.into(),
        }
    }
}

/// Key under which a caller supplies the initial value of `node.port`.
///
/// Callers may also use the bare port name, which matches that port on every
/// node where it has no incoming connection. Inputs whose feeder is disabled
/// or failed are only reachable through the qualified key.
pub fn qualified_port_key(node_name: &str, port: &str) -> String {
    format!("{}.{}", node_name, port)
}

/// Named graph of operator nodes.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub name: String,
    nodes: HashMap<NodeId, Node>,
    connections: Vec<Connection>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            connections: Vec::new(),
        }
    }

    // ── Graph building ──

    /// Add a node. Returns its id.
    pub fn add_node(&mut self, node: Node) -> Result<NodeId> {
        let id = node.id;
        if self.nodes.contains_key(&id) {
            return Err(FlowError::Graph(format!("Duplicate node id {}", id)));
        }
        self.nodes.insert(id, node);
        Ok(id)
    }

    /// Remove a node and every connection touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.connections
            .retain(|c| c.source != id && c.target != id);
        Some(node)
    }

    /// Connect `source.source_port` to `target.target_port`.
    ///
    /// Rejects unknown nodes/ports, a second connection into the same input,
    /// and incompatible data kinds. Cycles are reported by the validator.
    pub fn connect(
        &mut self,
        source: NodeId,
        source_port: &str,
        target: NodeId,
        target_port: &str,
    ) -> Result<()> {
        let src = self
            .nodes
            .get(&source)
            .ok_or_else(|| FlowError::Graph(format!("Invalid source node: {}", source)))?;
        let dst = self
            .nodes
            .get(&target)
            .ok_or_else(|| FlowError::Graph(format!("Invalid target node: {}", target)))?;
        if source == target {
            return Err(FlowError::Graph(
                "Cannot connect node to itself".to_string(),
            ));
        }

        let out_port = src.output(source_port).ok_or_else(|| {
            FlowError::Graph(format!("Node '{}' has no output '{}'", src.name, source_port))
        })?;
        let in_port = dst.input(target_port).ok_or_else(|| {
            FlowError::Graph(format!("Node '{}' has no input '{}'", dst.name, target_port))
        })?;

        if !out_port.kind.is_compatible_with(in_port.kind) {
            return Err(FlowError::Graph(format!(
                "Port mismatch: {}.{} ({:?}) -> {}.{} ({:?})",
                src.name, source_port, out_port.kind, dst.name, target_port, in_port.kind
            )));
        }
        if self.source_of(target, target_port).is_some() {
            return Err(FlowError::Graph(format!(
                "Input {}.{} is already connected",
                dst.name, target_port
            )));
        }

        self.connections
            .push(Connection::new(source, source_port, target, target_port));
        Ok(())
    }

    /// Store a connection without checks.
    pub fn add_connection(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    /// Remove the connection feeding `target.target_port`.
    pub fn disconnect(&mut self, target: NodeId, target_port: &str) -> Option<Connection> {
        let idx = self
            .connections
            .iter()
            .position(|c| c.target == target && c.target_port == target_port)?;
        Some(self.connections.remove(idx))
    }

    /// Enable or disable a node.
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<()> {
        let node = self
            .nodes
            .get_mut(&id)
            .ok_or_else(|| FlowError::Graph(format!("Unknown node: {}", id)))?;
        node.enabled = enabled;
        Ok(())
    }

    // ── Queries ──

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Find a node by display name (first match).
    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|n| n.name == name)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Nodes ordered by name, then id. Used wherever output must be deterministic.
    pub fn nodes_sorted(&self) -> Vec<&Node> {
        let mut nodes: Vec<&Node> = self.nodes.values().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections ending at `node`.
    pub fn incoming(&self, node: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.target == node)
    }

    /// Connections starting at `node`.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.source == node)
    }

    /// The connection feeding a given input port, if any.
    pub fn source_of(&self, target: NodeId, target_port: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.target == target && c.target_port == target_port)
    }

    /// Whether a node exists and is enabled.
    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.nodes.get(&id).is_some_and(|n| n.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::port::{DataKind, PortDescriptor};

    fn image_node(name: &str) -> Node {
        Node::new(name, "Filter")
            .with_input(PortDescriptor::input("in", DataKind::Image))
            .with_output(PortDescriptor::output("out", DataKind::Image))
    }

    #[test]
    fn test_connect_linear() {
        let mut graph = Graph::new("linear");
        let a = graph.add_node(image_node("A")).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();

        graph.connect(a, "out", b, "in").unwrap();
        assert_eq!(graph.connections().len(), 1);
        assert_eq!(graph.incoming(b).count(), 1);
        assert_eq!(graph.outgoing(a).count(), 1);
    }

    #[test]
    fn test_connect_rejects_second_input() {
        let mut graph = Graph::new("fan-in");
        let a = graph.add_node(image_node("A")).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();
        let c = graph.add_node(image_node("C")).unwrap();

        graph.connect(a, "out", c, "in").unwrap();
        let err = graph.connect(b, "out", c, "in").unwrap_err();
        assert!(err.to_string().contains("already connected"));
    }

    #[test]
    fn test_connect_rejects_kind_mismatch() {
        let mut graph = Graph::new("kinds");
        let a = graph.add_node(image_node("A")).unwrap();
        let b = graph
            .add_node(Node::new("B", "Gate").with_input(PortDescriptor::input("flag", DataKind::Boolean)))
            .unwrap();

        assert!(graph.connect(a, "out", b, "flag").is_err());
    }

    #[test]
    fn test_connect_any_kind() {
        let mut graph = Graph::new("any");
        let a = graph.add_node(image_node("A")).unwrap();
        let b = graph
            .add_node(Node::new("B", "Log").with_input(PortDescriptor::input("value", DataKind::Any)))
            .unwrap();

        assert!(graph.connect(a, "out", b, "value").is_ok());
    }

    #[test]
    fn test_connect_unknown_port_and_self() {
        let mut graph = Graph::new("bad");
        let a = graph.add_node(image_node("A")).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();

        assert!(graph.connect(a, "missing", b, "in").is_err());
        assert!(graph.connect(a, "out", a, "in").is_err());
        assert!(graph.connect(a, "out", NodeId::new(), "in").is_err());
    }

    #[test]
    fn test_remove_node_drops_connections() {
        let mut graph = Graph::new("remove");
        let a = graph.add_node(image_node("A")).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();
        graph.connect(a, "out", b, "in").unwrap();

        assert!(graph.remove_node(a).is_some());
        assert!(graph.connections().is_empty());
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let mut graph = Graph::new("dup");
        let node = image_node("A");
        let copy = node.clone();
        graph.add_node(node).unwrap();
        assert!(graph.add_node(copy).is_err());
    }

    #[test]
    fn test_disconnect() {
        let mut graph = Graph::new("disconnect");
        let a = graph.add_node(image_node("A")).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();
        graph.connect(a, "out", b, "in").unwrap();

        assert!(graph.disconnect(b, "in").is_some());
        assert!(graph.source_of(b, "in").is_none());
        assert!(graph.disconnect(b, "in").is_none());
    }
}
