//! Per-run state exposed for status polling.

use crate::graph::NodeId;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Identifier of one execution run.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunId({})", self.0)
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a run: `Idle -> Running -> {Completed, Failed, Cancelled}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Snapshot of a run's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub run_id: RunId,
    pub graph_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    /// Finished nodes over planned nodes, 0.0 to 100.0
    pub progress: f64,
    pub total_nodes: usize,
    pub finished_nodes: usize,
    /// Node executing right now (sequential mode)
    pub current_node: Option<NodeId>,
    /// Nodes executing right now (parallel mode)
    pub active_nodes: Vec<NodeId>,
}

impl ExecutionContext {
    pub fn new(run_id: RunId, graph_name: impl Into<String>, total_nodes: usize) -> Self {
        Self {
            run_id,
            graph_name: graph_name.into(),
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Idle,
            progress: 0.0,
            total_nodes,
            finished_nodes: 0,
            current_node: None,
            active_nodes: Vec::new(),
        }
    }

    pub(crate) fn node_started(&mut self, node: NodeId) {
        self.current_node = Some(node);
        if !self.active_nodes.contains(&node) {
            self.active_nodes.push(node);
        }
    }

    pub(crate) fn node_finished(&mut self, node: NodeId) {
        self.active_nodes.retain(|&id| id != node);
        if self.current_node == Some(node) {
            self.current_node = self.active_nodes.last().copied();
        }
        self.finished_nodes += 1;
        self.progress = if self.total_nodes == 0 {
            100.0
        } else {
            (self.finished_nodes as f64 / self.total_nodes as f64 * 100.0).min(100.0)
        };
    }

    pub(crate) fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
        self.current_node = None;
        self.active_nodes.clear();
        if status == RunStatus::Completed {
            self.progress = 100.0;
        }
    }
}

/// Shared, lock-protected context of one run. The scheduler is the only writer.
pub type SharedContext = Arc<RwLock<ExecutionContext>>;

struct RunEntry {
    context: SharedContext,
    finished: Option<Instant>,
}

/// Live and recently finished runs, keyed by id.
pub struct RunRegistry {
    runs: DashMap<RunId, RunEntry>,
    retention: Duration,
}

impl RunRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            runs: DashMap::new(),
            retention,
        }
    }

    /// Track a new run and return its shared context.
    pub fn register(&self, context: ExecutionContext) -> SharedContext {
        self.purge_expired();
        let run_id = context.run_id;
        let shared = Arc::new(RwLock::new(context));
        self.runs.insert(
            run_id,
            RunEntry {
                context: Arc::clone(&shared),
                finished: None,
            },
        );
        shared
    }

    /// Start the retention clock for a run.
    pub fn mark_finished(&self, run_id: RunId) {
        if let Some(mut entry) = self.runs.get_mut(&run_id) {
            entry.finished = Some(Instant::now());
        }
    }

    /// Snapshot of a run; `None` if unknown or expired.
    pub fn get(&self, run_id: RunId) -> Option<ExecutionContext> {
        let snapshot = {
            let entry = self.runs.get(&run_id)?;
            (!self.is_expired(&entry)).then(|| entry.context.read().clone())
        };
        if snapshot.is_none() {
            self.runs.remove(&run_id);
        }
        snapshot
    }

    /// Drop finished runs older than the retention window.
    pub fn purge_expired(&self) -> usize {
        let before = self.runs.len();
        self.runs.retain(|_, entry| !self.is_expired(entry));
        before.saturating_sub(self.runs.len())
    }

    /// Ids of runs that have not finished yet.
    pub fn active_runs(&self) -> Vec<RunId> {
        self.runs
            .iter()
            .filter(|entry| entry.finished.is_none())
            .map(|entry| *entry.key())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn is_expired(&self, entry: &RunEntry) -> bool {
        entry
            .finished
            .is_some_and(|at| at.elapsed() >= self.retention)
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}
