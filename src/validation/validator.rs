use super::ValidationResult;
use crate::graph::{qualified_port_key, Connection, Graph, NodeId};
use std::collections::{HashMap, HashSet};

/// Visit state for the three-colour cycle search.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Runs the structural and type checks over a graph.
pub struct GraphValidator;

impl GraphValidator {
    /// Validate a graph with no caller-supplied inputs.
    pub fn validate(graph: &Graph) -> ValidationResult {
        Self::validate_with_inputs(graph, std::iter::empty::<&str>())
    }

    /// Validate a graph, counting `provided` input keys (`"port"` or
    /// `"Node.port"`) as satisfying unconnected required inputs.
    ///
    /// Checks run in a fixed order and every finding is collected:
    /// 1. connection endpoints exist
    /// 2. at most one connection per input
    /// 3. data kinds are compatible
    /// 4. no cycle among enabled nodes
    /// 5. required inputs are fed
    /// 6. parameter values respect their declared bounds
    pub fn validate_with_inputs<'a>(
        graph: &Graph,
        provided: impl IntoIterator<Item = &'a str>,
    ) -> ValidationResult {
        let provided: HashSet<&str> = provided.into_iter().collect();
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let resolved = Self::check_references(graph, &mut errors);
        Self::check_fan_in(graph, &resolved, &mut errors);
        Self::check_kinds(graph, &resolved, &mut errors);
        Self::check_cycles(graph, &resolved, &mut errors);
        Self::check_required_inputs(graph, &resolved, &provided, &mut errors, &mut warnings);
        Self::check_parameters(graph, &mut errors);
        Self::check_disabled_links(graph, &resolved, &mut warnings);

        for warning in &warnings {
            tracing::debug!("Graph '{}': {}", graph.name, warning);
        }

        ValidationResult::from_findings(errors, warnings)
    }

    /// Check 1. Returns the connections whose endpoints all exist.
    fn check_references<'g>(graph: &'g Graph, errors: &mut Vec<String>) -> Vec<&'g Connection> {
        let mut resolved = Vec::with_capacity(graph.connections().len());

        for (idx, conn) in graph.connections().iter().enumerate() {
            let mut ok = true;
            match graph.node(conn.source) {
                None => {
                    errors.push(format!(
                        "Connection #{}: unknown source node {}",
                        idx, conn.source
                    ));
                    ok = false;
                }
                Some(src) if src.output(&conn.source_port).is_none() => {
                    errors.push(format!(
                        "Connection #{}: node '{}' has no output port '{}'",
                        idx, src.name, conn.source_port
                    ));
                    ok = false;
                }
                Some(_) => {}
            }
            match graph.node(conn.target) {
                None => {
                    errors.push(format!(
                        "Connection #{}: unknown target node {}",
                        idx, conn.target
                    ));
                    ok = false;
                }
                Some(dst) if dst.input(&conn.target_port).is_none() => {
                    errors.push(format!(
                        "Connection #{}: node '{}' has no input port '{}'",
                        idx, dst.name, conn.target_port
                    ));
                    ok = false;
                }
                Some(_) => {}
            }
            if ok {
                resolved.push(conn);
            }
        }

        resolved
    }

    /// Check 2.
    fn check_fan_in(graph: &Graph, resolved: &[&Connection], errors: &mut Vec<String>) {
        let mut counts: HashMap<(NodeId, &str), usize> = HashMap::new();
        for conn in resolved {
            *counts
                .entry((conn.target, conn.target_port.as_str()))
                .or_default() += 1;
        }

        let mut over: Vec<_> = counts.into_iter().filter(|(_, n)| *n > 1).collect();
        over.sort_by(|a, b| a.0.cmp(&b.0));
        for ((target, port), count) in over {
            errors.push(format!(
                "Input '{}' receives {} connections (at most one allowed)",
                port_label(graph, target, port),
                count
            ));
        }
    }

    /// Check 3.
    fn check_kinds(graph: &Graph, resolved: &[&Connection], errors: &mut Vec<String>) {
        for conn in resolved {
            let (Some(src), Some(dst)) = (graph.node(conn.source), graph.node(conn.target)) else {
                continue;
            };
            let (Some(out), Some(inp)) = (src.output(&conn.source_port), dst.input(&conn.target_port))
            else {
                continue;
            };
            if !out.kind.is_compatible_with(inp.kind) {
                errors.push(format!(
                    "Port kind mismatch: {}.{} ({:?}) -> {}.{} ({:?})",
                    src.name, conn.source_port, out.kind, dst.name, conn.target_port, inp.kind
                ));
            }
        }
    }

    /// Check 4. Depth-first search with unvisited / in-progress / done marks;
    /// an edge into an in-progress node closes a cycle.
    fn check_cycles(graph: &Graph, resolved: &[&Connection], errors: &mut Vec<String>) {
        let order: Vec<NodeId> = graph
            .nodes_sorted()
            .into_iter()
            .filter(|n| n.enabled)
            .map(|n| n.id)
            .collect();

        let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for conn in resolved {
            if graph.is_enabled(conn.source) && graph.is_enabled(conn.target) {
                let next = successors.entry(conn.source).or_default();
                if !next.contains(&conn.target) {
                    next.push(conn.target);
                }
            }
        }
        for next in successors.values_mut() {
            next.sort_by(|a, b| node_sort_key(graph, *a).cmp(&node_sort_key(graph, *b)));
        }

        let mut marks: HashMap<NodeId, Mark> =
            order.iter().map(|&id| (id, Mark::Unvisited)).collect();

        for &root in &order {
            if marks.get(&root) != Some(&Mark::Unvisited) {
                continue;
            }

            // (node, index of next successor to visit)
            let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];
            marks.insert(root, Mark::InProgress);

            while let Some((node, next_idx)) = stack.last().copied() {
                let succ = successors.get(&node).map(Vec::as_slice).unwrap_or(&[]);
                if next_idx >= succ.len() {
                    marks.insert(node, Mark::Done);
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let child = succ[next_idx];
                match marks.get(&child).copied().unwrap_or(Mark::Done) {
                    Mark::Unvisited => {
                        marks.insert(child, Mark::InProgress);
                        stack.push((child, 0));
                    }
                    Mark::InProgress => {
                        let start = stack.iter().position(|(id, _)| *id == child).unwrap_or(0);
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|(id, _)| node_name(graph, *id))
                            .collect();
                        path.push(node_name(graph, child));
                        errors.push(format!("Cycle detected: {}", path.join(" -> ")));
                    }
                    Mark::Done => {}
                }
            }
        }
    }

    /// Check 5. Disabled sources do not count as feeding an input; that case
    /// is surfaced as a warning and falls back to defaults at run time.
    fn check_required_inputs(
        graph: &Graph,
        resolved: &[&Connection],
        provided: &HashSet<&str>,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        for node in graph.nodes_sorted() {
            if !node.enabled {
                continue;
            }
            for port in node.inputs().iter().filter(|p| p.required) {
                let feeders: Vec<&&Connection> = resolved
                    .iter()
                    .filter(|c| c.target == node.id && c.target_port == port.name)
                    .collect();
                let fed_by_enabled = feeders.iter().any(|c| graph.is_enabled(c.source));
                if fed_by_enabled {
                    continue;
                }

                // Bare port keys only reach inputs with no incoming connection.
                let has_fallback = port.has_usable_default()
                    || (feeders.is_empty() && provided.contains(port.name.as_str()))
                    || provided.contains(qualified_port_key(&node.name, &port.name).as_str());

                if !feeders.is_empty() {
                    warnings.push(format!(
                        "Required input '{}.{}' is fed only by a disabled node{}",
                        node.name,
                        port.name,
                        if has_fallback {
                            "; its default will be used"
                        } else {
                            " and has no default"
                        }
                    ));
                } else if !has_fallback {
                    errors.push(format!(
                        "Required input '{}.{}' is not connected and has no default",
                        node.name, port.name
                    ));
                }
            }
        }
    }

    /// Check 6.
    fn check_parameters(graph: &Graph, errors: &mut Vec<String>) {
        for node in graph.nodes_sorted() {
            if !node.enabled {
                continue;
            }
            for (name, parameter) in node.parameters() {
                if let Some(problem) = parameter.violation() {
                    errors.push(format!(
                        "Parameter '{}.{}' is invalid: {}",
                        node.name, name, problem
                    ));
                }
            }
        }
    }

    fn check_disabled_links(graph: &Graph, resolved: &[&Connection], warnings: &mut Vec<String>) {
        for conn in resolved {
            if !graph.is_enabled(conn.source) || !graph.is_enabled(conn.target) {
                warnings.push(format!(
                    "Connection {}.{} -> {}.{} touches a disabled node and is ignored",
                    node_name(graph, conn.source),
                    conn.source_port,
                    node_name(graph, conn.target),
                    conn.target_port
                ));
            }
        }
    }
}

fn node_name(graph: &Graph, id: NodeId) -> String {
    graph
        .node(id)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn node_sort_key(graph: &Graph, id: NodeId) -> (String, NodeId) {
    (node_name(graph, id), id)
}

fn port_label(graph: &Graph, node: NodeId, port: &str) -> String {
    qualified_port_key(&node_name(graph, node), port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{DataKind, ImageFrame, Node, Parameter, PortDescriptor, Value};
    use crate::pool::{Buffer, BufferShape};

    fn image_node(name: &str) -> Node {
        Node::new(name, "Filter")
            .with_input(PortDescriptor::input("in", DataKind::Image))
            .with_output(PortDescriptor::output("out", DataKind::Image))
    }

    fn source_node(name: &str) -> Node {
        Node::new(name, "Camera").with_output(PortDescriptor::output("out", DataKind::Image))
    }

    #[test]
    fn test_linear_graph_is_valid() {
        let mut graph = Graph::new("linear");
        let a = graph.add_node(source_node("A")).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();
        let c = graph.add_node(image_node("C")).unwrap();
        graph.connect(a, "out", b, "in").unwrap();
        graph.connect(b, "out", c, "in").unwrap();

        let result = GraphValidator::validate(&graph);
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_dangling_references_reported() {
        let mut graph = Graph::new("dangling");
        let a = graph.add_node(source_node("A")).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();
        graph.add_connection(Connection::new(a, "nope", b, "in"));
        graph.add_connection(Connection::new(NodeId::new(), "out", b, "in"));

        let result = GraphValidator::validate(&graph);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("no output port 'nope'")));
        assert!(result.errors.iter().any(|e| e.contains("unknown source node")));
        // B.in ends up without a valid feeder
        assert!(result.errors.iter().any(|e| e.contains("'B.in' is not connected")));
    }

    #[test]
    fn test_fan_in_reported() {
        let mut graph = Graph::new("fan-in");
        let a = graph.add_node(source_node("A")).unwrap();
        let b = graph.add_node(source_node("B")).unwrap();
        let c = graph.add_node(image_node("C")).unwrap();
        graph.add_connection(Connection::new(a, "out", c, "in"));
        graph.add_connection(Connection::new(b, "out", c, "in"));

        let result = GraphValidator::validate(&graph);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("'C.in' receives 2 connections"));
    }

    #[test]
    fn test_kind_mismatch_reported() {
        let mut graph = Graph::new("kinds");
        let a = graph.add_node(source_node("A")).unwrap();
        let b = graph
            .add_node(Node::new("B", "Gate").with_input(PortDescriptor::input("flag", DataKind::Boolean)))
            .unwrap();
        graph.add_connection(Connection::new(a, "out", b, "flag"));

        let result = GraphValidator::validate(&graph);
        assert!(result.errors.iter().any(|e| e.starts_with("Port kind mismatch")));
    }

    #[test]
    fn test_cycle_reported_with_path() {
        let mut graph = Graph::new("cycle");
        let a = graph.add_node(image_node("A")).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();
        graph.add_connection(Connection::new(a, "out", b, "in"));
        graph.add_connection(Connection::new(b, "out", a, "in"));

        let result = GraphValidator::validate(&graph);
        assert!(!result.valid);
        assert!(result.has_cycle());
        assert!(result.errors.contains(&"Cycle detected: A -> B -> A".to_string()));
    }

    #[test]
    fn test_cycle_through_disabled_node_ignored() {
        let mut graph = Graph::new("cycle-disabled");
        let a = graph
            .add_node(image_node("A").with_input(
                PortDescriptor::input("in", DataKind::Image)
                    .with_default(ImageFrame::from_buffer(Buffer::detached(BufferShape::gray8(1, 1)))),
            ))
            .unwrap();
        let b = graph.add_node(image_node("B").disabled()).unwrap();
        graph.add_connection(Connection::new(a, "out", b, "in"));
        graph.add_connection(Connection::new(b, "out", a, "in"));

        let result = GraphValidator::validate(&graph);
        assert!(!result.has_cycle());
        assert!(result.valid, "{:?}", result.errors);
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("'A.in' is fed only by a disabled node; its default will be used")));
    }

    #[test]
    fn test_required_input_fed_by_disabled_node_is_warning() {
        let mut graph = Graph::new("disabled-feeder");
        let a = graph.add_node(source_node("A").disabled()).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();
        graph.connect(a, "out", b, "in").unwrap();

        let result = GraphValidator::validate(&graph);
        assert!(result.valid);
        assert!(result.warnings.iter().any(|w| w.contains("has no default")));
        assert!(result.warnings.iter().any(|w| w.contains("touches a disabled node")));
    }

    #[test]
    fn test_provided_inputs_satisfy_required_ports() {
        let mut graph = Graph::new("inputs");
        graph.add_node(image_node("B")).unwrap();

        assert!(!GraphValidator::validate(&graph).valid);
        assert!(GraphValidator::validate_with_inputs(&graph, ["in"]).valid);
        assert!(GraphValidator::validate_with_inputs(&graph, ["B.in"]).valid);
        assert!(!GraphValidator::validate_with_inputs(&graph, ["C.in"]).valid);
    }

    #[test]
    fn test_bare_input_does_not_cover_disabled_feeder() {
        let mut graph = Graph::new("bare");
        let a = graph.add_node(source_node("A").disabled()).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();
        graph.connect(a, "out", b, "in").unwrap();

        let bare = GraphValidator::validate_with_inputs(&graph, ["in"]);
        assert!(bare.warnings.iter().any(|w| w.contains("has no default")));

        let qualified = GraphValidator::validate_with_inputs(&graph, ["B.in"]);
        assert!(qualified
            .warnings
            .iter()
            .any(|w| w.contains("its default will be used")));
    }

    #[test]
    fn test_parameter_violation_reported() {
        let mut node = source_node("A").with_parameter("gain", Parameter::new(1.0).with_range(0.0, 2.0));
        if let Some(p) = node.parameter_mut("gain") {
            p.set_unchecked(Value::Scalar(5.0));
        }
        let mut graph = Graph::new("params");
        graph.add_node(node).unwrap();

        let result = GraphValidator::validate(&graph);
        assert!(result.errors.iter().any(|e| e.contains("'A.gain' is invalid")));
    }

    #[test]
    fn test_validation_is_idempotent() {
        let mut graph = Graph::new("idempotent");
        let a = graph.add_node(image_node("A")).unwrap();
        let b = graph.add_node(image_node("B")).unwrap();
        let c = graph.add_node(image_node("C")).unwrap();
        graph.add_connection(Connection::new(a, "out", b, "in"));
        graph.add_connection(Connection::new(b, "out", c, "in"));
        graph.add_connection(Connection::new(c, "out", a, "in"));
        graph.add_connection(Connection::new(a, "out", c, "in"));

        assert_eq!(GraphValidator::validate(&graph), GraphValidator::validate(&graph));
    }
}
