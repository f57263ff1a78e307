//! Built-in utility operators.
//!
//! None of these process images; they exist so a graph can be wired and run
//! end to end (sources, relays and pooled image producers).

use crate::executor::context::NodeContext;
use crate::executor::operator::{OperatorError, OperatorExecutor};
use crate::executor::registry::ExecutorRegistry;
use crate::graph::{DataKind, ImageFrame, Node, Parameter, PortDescriptor, PortValues, Value};
use crate::pool::{BufferShape, ElementFormat};
use async_trait::async_trait;

pub const CONSTANT: &str = "Constant";
pub const PASSTHROUGH: &str = "Passthrough";
pub const BLANK_IMAGE: &str = "BlankImage";

/// Largest width or height a `BlankImage` node accepts.
pub const MAX_IMAGE_SIDE: i64 = 1 << 16;

pub(crate) fn register_builtins(registry: &ExecutorRegistry) {
    registry.register_executor(CONSTANT, ConstantExecutor);
    registry.register_executor(PASSTHROUGH, PassthroughExecutor);
    registry.register_executor(BLANK_IMAGE, BlankImageExecutor);
}

/// Emits its `value` parameter on the `value` output (or the first output
/// when no port has that name).
pub struct ConstantExecutor;

/// A `Constant` node with a single `value` output of the value's kind.
pub fn constant_node(name: impl Into<String>, value: impl Into<Value>) -> Node {
    let value = value.into();
    Node::new(name, CONSTANT)
        .with_output(PortDescriptor::output("value", value.kind()))
        .with_parameter("value", Parameter::new(value))
}

#[async_trait]
impl OperatorExecutor for ConstantExecutor {
    async fn execute(
        &self,
        ctx: &NodeContext,
        _inputs: PortValues,
    ) -> Result<PortValues, OperatorError> {
        let node = ctx.node();
        let value = node
            .param_value("value")
            .ok_or_else(|| OperatorError::invalid_parameter("value", "not defined"))?;
        let port = output_port(node)?;

        let mut outputs = PortValues::new();
        outputs.insert(port, value.clone());
        Ok(outputs)
    }

    fn validate(&self, node: &Node) -> Result<(), String> {
        if node.param_value("value").is_none() {
            return Err("parameter 'value' is not defined".to_string());
        }
        output_port(node).map(|_| ()).map_err(|e| e.to_string())
    }
}

fn output_port(node: &Node) -> Result<String, OperatorError> {
    if node.output("value").is_some() {
        return Ok("value".to_string());
    }
    node.outputs()
        .first()
        .map(|p| p.name.clone())
        .ok_or_else(|| OperatorError::Precondition("node declares no output port".to_string()))
}

/// Copies each input to the output port with the same name.
pub struct PassthroughExecutor;

/// A `Passthrough` node relaying `port` of the given kind.
pub fn passthrough_node(name: impl Into<String>, port: &str, kind: DataKind) -> Node {
    Node::new(name, PASSTHROUGH)
        .with_input(PortDescriptor::input(port, kind))
        .with_output(PortDescriptor::output(port, kind))
}

#[async_trait]
impl OperatorExecutor for PassthroughExecutor {
    async fn execute(
        &self,
        ctx: &NodeContext,
        inputs: PortValues,
    ) -> Result<PortValues, OperatorError> {
        let node = ctx.node();
        Ok(inputs
            .into_iter()
            .filter(|(name, _)| node.output(name).is_some())
            .collect())
    }
}

/// Rents a frame from the pool and fills it with `fill`.
///
/// Parameters: `width`, `height`, `channels` (1..=4) and `fill` (0..=255).
pub struct BlankImageExecutor;

/// A `BlankImage` node producing 8-bit frames of `shape` on its `image` output.
pub fn blank_image_node(name: impl Into<String>, shape: BufferShape, fill: u8) -> Node {
    Node::new(name, BLANK_IMAGE)
        .with_output(PortDescriptor::output("image", DataKind::Image))
        .with_parameter(
            "width",
            Parameter::new(shape.width as i64).with_range(1.0, MAX_IMAGE_SIDE as f64),
        )
        .with_parameter(
            "height",
            Parameter::new(shape.height as i64).with_range(1.0, MAX_IMAGE_SIDE as f64),
        )
        .with_parameter(
            "channels",
            Parameter::new(shape.channels as i64).with_range(1.0, 4.0),
        )
        .with_parameter("fill", Parameter::new(fill as i64).with_range(0.0, 255.0))
}

impl BlankImageExecutor {
    fn shape(node: &Node) -> Result<BufferShape, OperatorError> {
        let dim = |name: &str, max: i64| -> Result<u32, OperatorError> {
            let value = node
                .param_i64(name)
                .ok_or_else(|| OperatorError::invalid_parameter(name, "expected an integer"))?;
            if value < 1 || value > max {
                return Err(OperatorError::invalid_parameter(
                    name,
                    format!("{} is outside 1..={}", value, max),
                ));
            }
            Ok(value as u32)
        };

        let width = dim("width", MAX_IMAGE_SIDE)?;
        let height = dim("height", MAX_IMAGE_SIDE)?;
        let channels = dim("channels", 4)?;
        let shape = BufferShape::new(width, height, channels, ElementFormat::U8);
        if shape.checked_byte_len().is_none() {
            return Err(OperatorError::invalid_parameter(
                "width",
                format!("a {} frame does not fit in memory", shape),
            ));
        }
        Ok(shape)
    }
}

#[async_trait]
impl OperatorExecutor for BlankImageExecutor {
    async fn execute(
        &self,
        ctx: &NodeContext,
        _inputs: PortValues,
    ) -> Result<PortValues, OperatorError> {
        ctx.check_cancelled()?;
        let shape = Self::shape(ctx.node())?;
        let fill = ctx.node().param_i64("fill").unwrap_or(0).clamp(0, 255) as u8;

        let mut buffer = ctx.rent_frame(shape);
        if fill != 0 {
            buffer.as_mut_slice().fill(fill);
        }

        let mut outputs = PortValues::new();
        outputs.insert(
            "image".to_string(),
            Value::Image(ImageFrame::from_pooled(buffer)),
        );
        Ok(outputs)
    }

    fn validate(&self, node: &Node) -> Result<(), String> {
        Self::shape(node).map(|_| ()).map_err(|e| e.to_string())
    }
}
