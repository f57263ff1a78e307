//! Sharded, concurrency-safe pool of reusable fixed-shape buffers.
//!
//! Idle buffers are kept per [`BufferShape`] in independent shards, each
//! behind its own lock, so concurrent node executions renting different
//! shapes never contend. Counters are atomics and can be read at any time
//! without taking a shard lock.

use super::buffer::{Buffer, BufferShape, PoolId, PooledBuffer};
use crate::config::PoolSettings;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Default number of idle buffers retained per shape.
pub const DEFAULT_MAX_IDLE_PER_SHAPE: usize = 8;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// What happened to a buffer handed back with [`BufferPool::return_buffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// Buffer is idle in the pool again.
    Retained,
    /// The shape was already at capacity; the buffer was released.
    Discarded,
    /// The buffer does not belong to this pool (or was resized); ignored.
    Rejected,
}

/// Snapshot of pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolStatistics {
    /// Buffers currently idle across all shapes
    pub idle_count: usize,
    /// Total `rent` calls
    pub rent_count: u64,
    /// Total accepted returns (retained or discarded)
    pub return_count: u64,
    /// Buffers freshly allocated because no idle one matched
    pub create_count: u64,
    /// Returns released because the shape was at capacity
    pub discard_count: u64,
    /// Returns refused because the buffer was foreign
    pub reject_count: u64,
    /// Fraction of rents served from idle buffers
    pub hit_rate: f64,
    /// Number of shapes the pool has seen
    pub distinct_shapes: usize,
}

struct Shard {
    idle: Mutex<Vec<Buffer>>,
}

#[derive(Default)]
struct Counters {
    idle: AtomicUsize,
    rents: AtomicU64,
    hits: AtomicU64,
    returns: AtomicU64,
    creates: AtomicU64,
    discards: AtomicU64,
    rejects: AtomicU64,
}

/// State shared between the pool handle and every checked-out buffer.
pub(crate) struct PoolShared {
    id: PoolId,
    default_capacity: AtomicUsize,
    shape_capacity: DashMap<BufferShape, usize>,
    shards: DashMap<BufferShape, Arc<Shard>>,
    counters: Counters,
}

impl PoolShared {
    fn shard(&self, shape: BufferShape) -> Arc<Shard> {
        // Clone the Arc out so the map's shard lock is not held while the
        // shape's own mutex is taken.
        self.shards
            .entry(shape)
            .or_insert_with(|| {
                Arc::new(Shard {
                    idle: Mutex::new(Vec::new()),
                })
            })
            .value()
            .clone()
    }

    fn capacity_for(&self, shape: BufferShape) -> usize {
        self.shape_capacity
            .get(&shape)
            .map(|entry| *entry.value())
            .unwrap_or_else(|| self.default_capacity.load(Ordering::Relaxed))
    }

    pub(crate) fn accept(&self, buffer: Buffer) -> ReturnOutcome {
        if buffer.origin() != self.id || !buffer.is_intact() {
            self.counters.rejects.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                "Rejected foreign buffer of shape {} (origin {:?})",
                buffer.shape(),
                buffer.origin()
            );
            return ReturnOutcome::Rejected;
        }

        self.counters.returns.fetch_add(1, Ordering::Relaxed);
        let shape = buffer.shape();
        let capacity = self.capacity_for(shape);
        let shard = self.shard(shape);
        let mut idle = shard.idle.lock();
        if idle.len() < capacity {
            idle.push(buffer);
            self.counters.idle.fetch_add(1, Ordering::Relaxed);
            ReturnOutcome::Retained
        } else {
            drop(idle);
            self.counters.discards.fetch_add(1, Ordering::Relaxed);
            tracing::trace!("Discarded buffer of shape {}: shape at capacity {}", shape, capacity);
            ReturnOutcome::Discarded
        }
    }
}

/// Reuse pool for large fixed-shape binary payloads.
///
/// Cloning the pool yields another handle to the same shards.
#[derive(Clone)]
pub struct BufferPool {
    shared: Arc<PoolShared>,
}

impl BufferPool {
    /// Create a pool retaining at most `max_idle_per_shape` idle buffers per shape.
    pub fn new(max_idle_per_shape: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                id: PoolId(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed)),
                default_capacity: AtomicUsize::new(max_idle_per_shape),
                shape_capacity: DashMap::new(),
                shards: DashMap::new(),
                counters: Counters::default(),
            }),
        }
    }

    /// Create a pool from configuration, applying per-shape limits.
    pub fn from_settings(settings: &PoolSettings) -> Self {
        let pool = Self::new(settings.max_idle_per_shape);
        for limit in &settings.shape_limits {
            pool.set_shape_capacity(limit.shape, limit.max_idle);
        }
        pool
    }

    pub fn id(&self) -> PoolId {
        self.shared.id
    }

    /// Check out a buffer of `shape`.
    ///
    /// Reuses an idle buffer (zeroed) when one exists, otherwise allocates.
    /// Never blocks on other shapes.
    pub fn rent(&self, shape: BufferShape) -> PooledBuffer {
        let counters = &self.shared.counters;
        counters.rents.fetch_add(1, Ordering::Relaxed);

        let reused = self.shared.shard(shape).idle.lock().pop();
        let buffer = match reused {
            Some(mut buffer) => {
                counters.idle.fetch_sub(1, Ordering::Relaxed);
                counters.hits.fetch_add(1, Ordering::Relaxed);
                buffer.clear();
                buffer
            }
            None => {
                counters.creates.fetch_add(1, Ordering::Relaxed);
                Buffer::allocate(shape, self.shared.id)
            }
        };

        PooledBuffer::new(buffer, Arc::downgrade(&self.shared))
    }

    /// Hand a buffer back explicitly.
    ///
    /// Buffers from another pool are rejected. Ownership guarantees a buffer
    /// cannot be returned twice.
    pub fn return_buffer(&self, buffer: Buffer) -> ReturnOutcome {
        self.shared.accept(buffer)
    }

    /// Override the idle capacity of one shape. Excess idle buffers are released.
    pub fn set_shape_capacity(&self, shape: BufferShape, max_idle: usize) {
        self.shared.shape_capacity.insert(shape, max_idle);

        let shard = self.shared.shard(shape);
        let mut idle = shard.idle.lock();
        if idle.len() > max_idle {
            let excess = idle.len() - max_idle;
            idle.truncate(max_idle);
            self.shared.counters.idle.fetch_sub(excess, Ordering::Relaxed);
        }
    }

    /// Idle capacity currently applied to `shape`.
    pub fn shape_capacity(&self, shape: BufferShape) -> usize {
        self.shared.capacity_for(shape)
    }

    /// Number of idle buffers of one shape.
    pub fn idle_count(&self, shape: BufferShape) -> usize {
        self.shared
            .shards
            .get(&shape)
            .map(|shard| shard.idle.lock().len())
            .unwrap_or(0)
    }

    /// Release every idle buffer. Returns how many were released.
    ///
    /// Callers must not run this concurrently with rent/return traffic they
    /// expect to observe consistently.
    pub fn clear(&self) -> usize {
        let mut released = 0;
        for shard in self.shared.shards.iter() {
            let mut idle = shard.idle.lock();
            released += idle.len();
            idle.clear();
        }
        self.shared.counters.idle.fetch_sub(released, Ordering::Relaxed);
        tracing::debug!("Buffer pool cleared, {} idle buffers released", released);
        released
    }

    /// Non-blocking read of the running counters.
    pub fn statistics(&self) -> PoolStatistics {
        let c = &self.shared.counters;
        let rents = c.rents.load(Ordering::Relaxed);
        let hits = c.hits.load(Ordering::Relaxed);
        PoolStatistics {
            idle_count: c.idle.load(Ordering::Relaxed),
            rent_count: rents,
            return_count: c.returns.load(Ordering::Relaxed),
            create_count: c.creates.load(Ordering::Relaxed),
            discard_count: c.discards.load(Ordering::Relaxed),
            reject_count: c.rejects.load(Ordering::Relaxed),
            hit_rate: if rents == 0 {
                0.0
            } else {
                hits as f64 / rents as f64
            },
            distinct_shapes: self.shared.shards.len(),
        }
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IDLE_PER_SHAPE)
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("id", &self.shared.id)
            .field("stats", &self.statistics())
            .finish()
    }
}
