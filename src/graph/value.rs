//! Typed values flowing between ports and stored in parameters.
//!
//! [`Value`] is a tagged union over the data kinds a port can declare, so the
//! engine can check kind compatibility without inspecting payloads.
//! Image payloads are [`ImageFrame`] handles that may be backed by a pooled
//! buffer; the buffer goes back to its pool once the last handle is dropped.

use crate::graph::port::DataKind;
use crate::pool::{Buffer, BufferShape, PooledBuffer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Output or input values of one node, keyed by port name.
pub type PortValues = HashMap<String, Value>;

/// Geometric primitives produced by measurement-style operators.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point { x: f64, y: f64 },
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    Rect { x: f64, y: f64, width: f64, height: f64 },
    Circle { cx: f64, cy: f64, radius: f64 },
}

enum FrameStorage {
    Pooled(PooledBuffer),
    Owned(Buffer),
}

/// Shared handle to an image payload.
///
/// Cloning is cheap (reference counted). A frame created from a
/// [`PooledBuffer`] stays checked out until every clone is dropped.
#[derive(Clone)]
pub struct ImageFrame {
    storage: Arc<FrameStorage>,
}

impl ImageFrame {
    pub fn from_pooled(buffer: PooledBuffer) -> Self {
        Self {
            storage: Arc::new(FrameStorage::Pooled(buffer)),
        }
    }

    pub fn from_buffer(buffer: Buffer) -> Self {
        Self {
            storage: Arc::new(FrameStorage::Owned(buffer)),
        }
    }

    pub fn shape(&self) -> BufferShape {
        match self.storage.as_ref() {
            FrameStorage::Pooled(b) => b.shape(),
            FrameStorage::Owned(b) => b.shape(),
        }
    }

    pub fn data(&self) -> &[u8] {
        match self.storage.as_ref() {
            FrameStorage::Pooled(b) => b.as_slice(),
            FrameStorage::Owned(b) => b.as_slice(),
        }
    }

    /// Whether this frame holds a buffer checked out of a pool.
    pub fn is_pooled(&self) -> bool {
        matches!(self.storage.as_ref(), FrameStorage::Pooled(_))
    }

    /// A frame that belongs to no pool. Pooled pixels are copied; a frame
    /// that already owns its buffer is shared.
    pub fn detach(&self) -> ImageFrame {
        let copy = match self.storage.as_ref() {
            FrameStorage::Pooled(b) => Buffer::from_vec(b.shape(), b.as_slice().to_vec()),
            FrameStorage::Owned(_) => return self.clone(),
        };
        // The pooled slice always matches its shape, so `from_vec` cannot fail.
        ImageFrame::from_buffer(copy.unwrap_or_else(|| Buffer::detached(self.shape())))
    }

    /// Number of live handles sharing this frame.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.storage)
    }
}

impl From<PooledBuffer> for ImageFrame {
    fn from(buffer: PooledBuffer) -> Self {
        Self::from_pooled(buffer)
    }
}

impl From<Buffer> for ImageFrame {
    fn from(buffer: Buffer) -> Self {
        Self::from_buffer(buffer)
    }
}

impl PartialEq for ImageFrame {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.data() == other.data()
    }
}

impl fmt::Debug for ImageFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageFrame")
            .field("shape", &self.shape())
            .field("pooled", &self.is_pooled())
            .finish()
    }
}

/// A value carried by a port or parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Image(ImageFrame),
    Scalar(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
    Geometry(Geometry),
}

impl Value {
    /// The data kind this value satisfies.
    pub fn kind(&self) -> DataKind {
        match self {
            Value::Image(_) => DataKind::Image,
            Value::Scalar(_) | Value::Integer(_) => DataKind::Scalar,
            Value::Boolean(_) => DataKind::Boolean,
            Value::Text(_) => DataKind::String,
            Value::Geometry(_) => DataKind::Geometry,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&ImageFrame> {
        match self {
            Value::Image(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_geometry(&self) -> Option<&Geometry> {
        match self {
            Value::Geometry(g) => Some(g),
            _ => None,
        }
    }

    /// Copy image payloads out of the pool; other values are cloned as-is.
    pub fn detached(&self) -> Value {
        match self {
            Value::Image(frame) => Value::Image(frame.detach()),
            other => other.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Scalar(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Geometry> for Value {
    fn from(g: Geometry) -> Self {
        Value::Geometry(g)
    }
}

impl From<ImageFrame> for Value {
    fn from(frame: ImageFrame) -> Self {
        Value::Image(frame)
    }
}
