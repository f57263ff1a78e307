//! Domain events emitted at run and node transitions.
//!
//! Events are always appended to the run's [`FlowExecutionResult`]. When a
//! subscriber channel is attached they are also pushed to it without blocking;
//! a full channel drops the event for that subscriber only, and a closed one
//! is removed from the subscriber list.
//!
//! [`FlowExecutionResult`]: super::FlowExecutionResult

use super::context::{RunId, RunStatus};
use crate::graph::NodeId;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Sender, TrySendError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Capacity of each subscriber channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Subscriber list shared between a scheduler and the sinks of its runs.
pub type Subscribers = Arc<Mutex<Vec<Sender<FlowEvent>>>>;

/// Immutable record of a run or node transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlowEvent {
    RunStarted {
        run_id: RunId,
        graph: String,
        node_count: usize,
        at: DateTime<Utc>,
    },
    NodeStarted {
        run_id: RunId,
        node_id: NodeId,
        node_name: String,
        at: DateTime<Utc>,
    },
    NodeCompleted {
        run_id: RunId,
        node_id: NodeId,
        node_name: String,
        success: bool,
        elapsed_ms: u64,
        error: Option<String>,
        at: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        status: RunStatus,
        elapsed_ms: u64,
        error: Option<String>,
        at: DateTime<Utc>,
    },
}

impl FlowEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            FlowEvent::RunStarted { run_id, .. }
            | FlowEvent::NodeStarted { run_id, .. }
            | FlowEvent::NodeCompleted { run_id, .. }
            | FlowEvent::RunCompleted { run_id, .. } => *run_id,
        }
    }

    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            FlowEvent::NodeStarted { node_id, .. } | FlowEvent::NodeCompleted { node_id, .. } => {
                Some(*node_id)
            }
            _ => None,
        }
    }
}

/// Per-run event collector with optional fan-out to subscribers.
#[derive(Debug, Default)]
pub struct EventSink {
    events: Vec<FlowEvent>,
    subscribers: Subscribers,
}

impl EventSink {
    pub fn new(senders: Vec<Sender<FlowEvent>>) -> Self {
        Self::shared(Arc::new(Mutex::new(senders)))
    }

    /// Sink that publishes to, and prunes, an existing subscriber list.
    pub fn shared(subscribers: Subscribers) -> Self {
        Self {
            events: Vec::new(),
            subscribers,
        }
    }

    pub fn emit(&mut self, event: FlowEvent) {
        self.subscribers
            .lock()
            .retain(|tx| match tx.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Event subscriber is full, dropping event");
                    true
                }
                Err(TrySendError::Disconnected(_)) => {
                    tracing::debug!("Event subscriber closed, removing it");
                    false
                }
            });
        self.events.push(event);
    }

    /// Subscribers still attached.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn events(&self) -> &[FlowEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<FlowEvent> {
        self.events
    }
}
