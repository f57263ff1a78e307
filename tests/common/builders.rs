//! Test data builders for creating graphs

use operator_flow::graph::{DataKind, Graph, Node, NodeId, PortDescriptor};
use std::collections::HashMap;

/// Operator type served by [`super::mock_helpers::StepExecutor`]
pub const STEP: &str = "Step";

/// A step node with one optional `in` input and one `out` output.
pub fn step_node(name: &str) -> Node {
    join_node(name, &["in"])
}

/// A step node with several optional inputs.
pub fn join_node(name: &str, inputs: &[&str]) -> Node {
    inputs.iter().fold(
        Node::new(name, STEP).with_output(PortDescriptor::output("out", DataKind::Any)),
        |node, port| node.with_input(PortDescriptor::optional_input(*port, DataKind::Any)),
    )
}

/// Builder for wiring test graphs by node name
pub struct GraphBuilder {
    graph: Graph,
    ids: HashMap<String, NodeId>,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            graph: Graph::new(name),
            ids: HashMap::new(),
        }
    }

    pub fn node(mut self, node: Node) -> Self {
        let name = node.name.clone();
        let id = self.graph.add_node(node).expect("add node");
        self.ids.insert(name, id);
        self
    }

    pub fn step(self, name: &str) -> Self {
        self.node(step_node(name))
    }

    /// Connect `from.out` to `to.port`.
    pub fn link(mut self, from: &str, to: &str, port: &str) -> Self {
        let source = self.ids[from];
        let target = self.ids[to];
        self.graph
            .connect(source, "out", target, port)
            .expect("connect");
        self
    }

    pub fn build(self) -> (Graph, HashMap<String, NodeId>) {
        (self.graph, self.ids)
    }
}

/// `names[0] -> names[1] -> ...` through `out -> in`.
pub fn linear(names: &[&str]) -> (Graph, HashMap<String, NodeId>) {
    let builder = names
        .iter()
        .fold(GraphBuilder::new("linear"), |b, name| b.step(name));
    names
        .windows(2)
        .fold(builder, |b, pair| b.link(pair[0], pair[1], "in"))
        .build()
}

/// `A -> {B, C} -> D`, with D reading B on `left` and C on `right`.
pub fn diamond() -> (Graph, HashMap<String, NodeId>) {
    GraphBuilder::new("diamond")
        .step("A")
        .step("B")
        .step("C")
        .node(join_node("D", &["left", "right"]))
        .link("A", "B", "in")
        .link("A", "C", "in")
        .link("B", "D", "left")
        .link("C", "D", "right")
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_builder() {
        let (graph, ids) = linear(&["A", "B", "C"]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.connections().len(), 2);
        assert!(graph.source_of(ids["C"], "in").is_some());
    }
}
