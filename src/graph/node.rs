//! Operator instances placed in a graph.

use crate::error::{FlowError, Result};
use crate::graph::id::{NodeId, OperatorType};
use crate::graph::parameter::Parameter;
use crate::graph::port::{PortDescriptor, PortDirection};
use crate::graph::value::Value;
use std::collections::BTreeMap;

/// Editor canvas coordinates. Carried through, never read by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// One operator instance: identity, ports and parameters.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub operator_type: OperatorType,
    /// Disabled nodes are skipped and treated as absent.
    pub enabled: bool,
    /// A failing critical node aborts the run; a non-critical one does not.
    pub critical: bool,
    pub position: Position,
    inputs: Vec<PortDescriptor>,
    outputs: Vec<PortDescriptor>,
    parameters: BTreeMap<String, Parameter>,
}

impl Node {
    pub fn new(name: impl Into<String>, operator_type: impl Into<OperatorType>) -> Self {
        Self::with_id(NodeId::new(), name, operator_type)
    }

    pub fn with_id(
        id: NodeId,
        name: impl Into<String>,
        operator_type: impl Into<OperatorType>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            operator_type: operator_type.into(),
            enabled: true,
            critical: true,
            position: Position::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }

    // ── Builder helpers (replace a same-named port/parameter) ──

    pub fn with_input(mut self, port: PortDescriptor) -> Self {
        replace_port(&mut self.inputs, PortDescriptor { direction: PortDirection::Input, ..port });
        self
    }

    pub fn with_output(mut self, port: PortDescriptor) -> Self {
        replace_port(&mut self.outputs, PortDescriptor { direction: PortDirection::Output, ..port });
        self
    }

    pub fn with_parameter(mut self, name: impl Into<String>, parameter: Parameter) -> Self {
        self.parameters.insert(name.into(), parameter);
        self
    }

    pub fn non_critical(mut self) -> Self {
        self.critical = false;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Position { x, y };
        self
    }

    // ── Port definition ──

    /// Add an input port; names must be unique among inputs.
    pub fn add_input(&mut self, port: PortDescriptor) -> Result<()> {
        if self.input(&port.name).is_some() {
            return Err(FlowError::Graph(format!(
                "Node '{}' already has an input named '{}'",
                self.name, port.name
            )));
        }
        self.inputs.push(PortDescriptor {
            direction: PortDirection::Input,
            ..port
        });
        Ok(())
    }

    /// Add an output port; names must be unique among outputs.
    pub fn add_output(&mut self, port: PortDescriptor) -> Result<()> {
        if self.output(&port.name).is_some() {
            return Err(FlowError::Graph(format!(
                "Node '{}' already has an output named '{}'",
                self.name, port.name
            )));
        }
        self.outputs.push(PortDescriptor {
            direction: PortDirection::Output,
            ..port
        });
        Ok(())
    }

    pub fn inputs(&self) -> &[PortDescriptor] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PortDescriptor] {
        &self.outputs
    }

    pub fn input(&self, name: &str) -> Option<&PortDescriptor> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PortDescriptor> {
        self.outputs.iter().find(|p| p.name == name)
    }

    // ── Parameters ──

    pub fn define_parameter(&mut self, name: impl Into<String>, parameter: Parameter) -> Result<()> {
        let name = name.into();
        if self.parameters.contains_key(&name) {
            return Err(FlowError::Graph(format!(
                "Node '{}' already defines parameter '{}'",
                self.name, name
            )));
        }
        self.parameters.insert(name, parameter);
        Ok(())
    }

    /// Set a parameter value, enforcing its kind, bounds and options.
    pub fn set_parameter(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let node_name = &self.name;
        let parameter = self.parameters.get_mut(name).ok_or_else(|| {
            FlowError::Graph(format!("Node '{}' has no parameter '{}'", node_name, name))
        })?;
        parameter.set(value.into()).map_err(|message| {
            FlowError::Graph(format!(
                "Invalid value for '{}.{}': {}",
                node_name, name, message
            ))
        })
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(name)
    }

    pub fn parameter_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.parameters.get_mut(name)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn param_value(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name).map(Parameter::value)
    }

    pub fn param_f64(&self, name: &str) -> Option<f64> {
        self.param_value(name).and_then(Value::as_f64)
    }

    pub fn param_i64(&self, name: &str) -> Option<i64> {
        self.param_value(name).and_then(Value::as_i64)
    }

    pub fn param_bool(&self, name: &str) -> Option<bool> {
        self.param_value(name).and_then(Value::as_bool)
    }

    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param_value(name).and_then(Value::as_str)
    }
}

fn replace_port(ports: &mut Vec<PortDescriptor>, port: PortDescriptor) {
    match ports.iter_mut().find(|p| p.name == port.name) {
        Some(existing) => *existing = port,
        None => ports.push(port),
    }
}
