//! Buffer pool for large fixed-shape payloads (image frames).
//!
//! Node executions rent buffers keyed by [`BufferShape`] instead of
//! allocating a fresh frame on every run. A checked-out [`PooledBuffer`]
//! is owned by exactly one in-flight value; when it is dropped the buffer
//! becomes idle again, or is released if its shape is already at capacity.
//!
//! ```text
//!  rent(shape) ──► PooledBuffer ──► ImageFrame ──► consumers ──► drop
//!       ▲                                                         │
//!       └──────────── idle shard (≤ capacity per shape) ◄─────────┘
//! ```

pub mod buffer;
pub mod buffer_pool;

pub use buffer::{Buffer, BufferShape, ElementFormat, PoolId, PooledBuffer};
pub use buffer_pool::{BufferPool, PoolStatistics, ReturnOutcome, DEFAULT_MAX_IDLE_PER_SHAPE};
