//! Tunable settings for the engine
//!
//! # Main Types
//!
//! - [`ExecutionSettings`] - Scheduling mode, worker limits and result retention
//! - [`PoolSettings`] - Buffer pool capacities
//! - [`LoggingSettings`] - Log filter and optional log directory
//!
//! Every field has a serde default so a partial file only overrides what it
//! names.

use crate::pool::{BufferShape, DEFAULT_MAX_IDLE_PER_SHAPE};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How a run walks the execution order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One node at a time in topological order
    #[default]
    Sequential,
    /// Each dependency level runs concurrently
    Parallel,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Mode used when a run does not ask for one
    #[serde(default)]
    pub default_mode: ExecutionMode,

    /// Upper bound on concurrently executing nodes in parallel mode.
    /// `None` uses the host's available parallelism.
    #[serde(default)]
    pub max_parallelism: Option<usize>,

    /// Seconds a finished run stays queryable through the status API
    #[serde(default = "default_status_retention_secs")]
    pub status_retention_secs: u64,

    /// Also keep image outputs of non-terminal nodes in per-node results.
    /// Each kept frame costs one copy outside the pool.
    #[serde(default)]
    pub record_image_outputs: bool,
}

fn default_status_retention_secs() -> u64 {
    300
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            default_mode: ExecutionMode::default(),
            max_parallelism: None,
            status_retention_secs: default_status_retention_secs(),
            record_image_outputs: false,
        }
    }
}

impl ExecutionSettings {
    /// Effective worker limit, never below one.
    pub fn effective_parallelism(&self) -> usize {
        self.max_parallelism
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1)
    }
}

/// Idle-capacity override for one buffer shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeLimit {
    pub shape: BufferShape,
    pub max_idle: usize,
}

/// Buffer pool settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Idle buffers kept per shape unless overridden
    #[serde(default = "default_max_idle_per_shape")]
    pub max_idle_per_shape: usize,

    #[serde(default)]
    pub shape_limits: Vec<ShapeLimit>,
}

fn default_max_idle_per_shape() -> usize {
    DEFAULT_MAX_IDLE_PER_SHAPE
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_idle_per_shape: DEFAULT_MAX_IDLE_PER_SHAPE,
            shape_limits: Vec::new(),
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_filter")]
    pub filter: String,

    /// Directory for daily-rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_filter() -> String {
    "info,operator_flow=debug".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            log_dir: None,
        }
    }
}
