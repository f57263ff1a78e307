//! Scripted executors and scheduler construction helpers

use super::builders::STEP;
use async_trait::async_trait;
use operator_flow::config::{EngineConfig, ExecutionMode};
use operator_flow::executor::{ExecutorRegistry, NodeContext, OperatorError, OperatorExecutor};
use operator_flow::graph::{PortValues, Value};
use operator_flow::FlowScheduler;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What a [`StepExecutor`] observed across all its executions.
#[derive(Default)]
pub struct StepTrace {
    pub started: Mutex<Vec<String>>,
    pub inputs_seen: Mutex<HashMap<String, PortValues>>,
    active: AtomicUsize,
    pub max_active: AtomicUsize,
}

struct ActiveGuard<'a>(&'a StepTrace);

impl<'a> ActiveGuard<'a> {
    fn enter(trace: &'a StepTrace) -> Self {
        let now = trace.active.fetch_add(1, Ordering::SeqCst) + 1;
        trace.max_active.fetch_max(now, Ordering::SeqCst);
        Self(trace)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Executor for `Step` nodes.
///
/// Emits `"Name"` or `"Name(in1,in2)"` on `out`, built from its text inputs in
/// port order, so tests can see exactly which upstream values arrived.
#[derive(Clone, Default)]
pub struct StepExecutor {
    delay: Duration,
    failures: HashMap<String, String>,
    panics: Vec<String>,
    cancel_on: Option<(String, CancellationToken)>,
    pub trace: Arc<StepTrace>,
}

impl StepExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long per node, waking early on cancellation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self, node: &str, message: &str) -> Self {
        self.failures.insert(node.to_string(), message.to_string());
        self
    }

    pub fn panicking(mut self, node: &str) -> Self {
        self.panics.push(node.to_string());
        self
    }

    /// Fire `token` as soon as `node` starts executing.
    pub fn cancel_when_started(mut self, node: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((node.to_string(), token));
        self
    }

    pub fn started(&self) -> Vec<String> {
        self.trace.started.lock().clone()
    }

    pub fn inputs_of(&self, node: &str) -> Option<PortValues> {
        self.trace.inputs_seen.lock().get(node).cloned()
    }

    pub fn max_active(&self) -> usize {
        self.trace.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OperatorExecutor for StepExecutor {
    async fn execute(
        &self,
        ctx: &NodeContext,
        inputs: PortValues,
    ) -> Result<PortValues, OperatorError> {
        let name = ctx.node().name.clone();
        self.trace.started.lock().push(name.clone());
        self.trace
            .inputs_seen
            .lock()
            .insert(name.clone(), inputs.clone());
        let _active = ActiveGuard::enter(&self.trace);

        if let Some((trigger, token)) = &self.cancel_on {
            if *trigger == name {
                token.cancel();
            }
        }
        if self.panics.contains(&name) {
            panic!("step '{}' exploded", name);
        }
        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = ctx.cancellation().cancelled() => return Err(OperatorError::Cancelled),
            }
        }
        if let Some(message) = self.failures.get(&name) {
            return Err(OperatorError::Other(anyhow::anyhow!("{}", message)));
        }

        let mut parts: Vec<(&String, &str)> = inputs
            .iter()
            .filter_map(|(port, value)| value.as_str().map(|text| (port, text)))
            .collect();
        parts.sort();
        let label = if parts.is_empty() {
            name
        } else {
            let joined: Vec<&str> = parts.iter().map(|(_, text)| *text).collect();
            format!("{}({})", name, joined.join(","))
        };

        let mut outputs = PortValues::new();
        outputs.insert("out".to_string(), Value::Text(label));
        Ok(outputs)
    }
}

/// Scheduler with the built-in operators plus `step` for `Step` nodes.
pub fn step_scheduler(step: &StepExecutor, config: EngineConfig) -> FlowScheduler {
    let registry = ExecutorRegistry::with_builtins();
    registry.register_executor(STEP, step.clone());
    FlowScheduler::with_registry(config, Arc::new(registry))
}

/// Default config running in parallel mode with at most `workers` nodes at once.
pub fn parallel_config(workers: usize) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.execution.default_mode = ExecutionMode::Parallel;
    config.execution.max_parallelism = Some(workers);
    config
}
