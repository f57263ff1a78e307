//! Fixed-shape binary buffers handed out by the [`BufferPool`](super::BufferPool).
//!
//! A [`Buffer`] is plain owned memory tagged with the pool it came from.
//! A [`PooledBuffer`] is the checked-out form: it returns its buffer to the
//! originating pool when dropped, unless it was detached with
//! [`PooledBuffer::into_inner`].

use super::buffer_pool::PoolShared;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Weak;

/// Identifier of the pool a buffer was allocated by. `0` is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolId(pub(crate) u64);

impl PoolId {
    /// Marker for buffers that do not belong to any pool.
    pub const DETACHED: PoolId = PoolId(0);
}

/// Element type of a single channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementFormat {
    U8,
    U16,
    F32,
}

impl ElementFormat {
    /// Size of one element in bytes.
    pub const fn size_bytes(self) -> usize {
        match self {
            ElementFormat::U8 => 1,
            ElementFormat::U16 => 2,
            ElementFormat::F32 => 4,
        }
    }
}

/// Shape key of a pooled buffer: dimensions plus element format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferShape {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub format: ElementFormat,
}

impl BufferShape {
    pub const fn new(width: u32, height: u32, channels: u32, format: ElementFormat) -> Self {
        Self {
            width,
            height,
            channels,
            format,
        }
    }

    /// 8-bit three channel frame.
    pub const fn rgb8(width: u32, height: u32) -> Self {
        Self::new(width, height, 3, ElementFormat::U8)
    }

    /// 8-bit single channel frame.
    pub const fn gray8(width: u32, height: u32) -> Self {
        Self::new(width, height, 1, ElementFormat::U8)
    }

    /// Total number of bytes a buffer of this shape occupies, or `None` when
    /// that does not fit in `usize`.
    pub fn checked_byte_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.channels as usize)?
            .checked_mul(self.format.size_bytes())
    }

    /// Total number of bytes a buffer of this shape occupies. Saturates for
    /// shapes that [`checked_byte_len`](Self::checked_byte_len) rejects.
    pub fn byte_len(&self) -> usize {
        self.checked_byte_len().unwrap_or(usize::MAX)
    }
}

impl fmt::Display for BufferShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} {:?}",
            self.width, self.height, self.channels, self.format
        )
    }
}

/// Owned, fixed-shape byte buffer.
pub struct Buffer {
    shape: BufferShape,
    data: Vec<u8>,
    origin: PoolId,
}

impl Buffer {
    pub(crate) fn allocate(shape: BufferShape, origin: PoolId) -> Self {
        Self {
            shape,
            data: vec![0; shape.byte_len()],
            origin,
        }
    }

    fn empty() -> Self {
        Self {
            shape: BufferShape::gray8(0, 0),
            data: Vec::new(),
            origin: PoolId::DETACHED,
        }
    }

    /// Allocate a zeroed buffer that belongs to no pool.
    pub fn detached(shape: BufferShape) -> Self {
        Self::allocate(shape, PoolId::DETACHED)
    }

    /// Wrap existing bytes. Fails when the length does not match the shape.
    pub fn from_vec(shape: BufferShape, data: Vec<u8>) -> Option<Self> {
        (data.len() == shape.byte_len()).then_some(Self {
            shape,
            data,
            origin: PoolId::DETACHED,
        })
    }

    pub fn shape(&self) -> BufferShape {
        self.shape
    }

    pub fn origin(&self) -> PoolId {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Reset every byte to zero.
    pub(crate) fn clear(&mut self) {
        self.data.fill(0);
    }

    /// Whether the byte length still matches the declared shape.
    pub(crate) fn is_intact(&self) -> bool {
        self.data.len() == self.shape.byte_len()
    }

    /// Copy into a new buffer that belongs to no pool.
    pub fn to_detached(&self) -> Buffer {
        Buffer {
            shape: self.shape,
            data: self.data.clone(),
            origin: PoolId::DETACHED,
        }
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("shape", &self.shape)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// A buffer checked out of a pool. Dropping it hands the buffer back.
pub struct PooledBuffer {
    buffer: Buffer,
    pool: Weak<PoolShared>,
}

impl PooledBuffer {
    pub(crate) fn new(buffer: Buffer, pool: Weak<PoolShared>) -> Self {
        Self { buffer, pool }
    }

    pub fn shape(&self) -> BufferShape {
        self.buffer.shape
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer.data
    }

    /// Take ownership of the buffer; it will no longer return automatically.
    pub fn into_inner(mut self) -> Buffer {
        self.pool = Weak::new();
        std::mem::replace(&mut self.buffer, Buffer::empty())
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.accept(std::mem::replace(&mut self.buffer, Buffer::empty()));
        }
    }
}

impl fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}
