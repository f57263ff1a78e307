//! The flow scheduler: validates, plans and drives one run.
//!
//! Each run:
//! 1. Re-validate the graph (with the caller's input keys).
//! 2. Compile the execution plan.
//! 3. Execute nodes in topological order (sequential) or wave by wave (parallel).
//! 4. Route outputs to consumers, releasing pooled frames after their last read.
//! 5. Publish the aggregate result and the final context snapshot.

use super::context::{ExecutionContext, RunId, RunRegistry, RunStatus, SharedContext};
use super::events::{EventSink, FlowEvent, Subscribers, EVENT_CHANNEL_CAPACITY};
use super::plan::{ExecutionPlan, PlanStats};
use super::result::{FlowExecutionResult, NodeExecutionResult, RunFailure};
use crate::config::{EngineConfig, ExecutionMode, ExecutionSettings};
use crate::error::FlowError;
use crate::executor::{ExecutorRegistry, NodeContext, OperatorError, OperatorExecutor};
use crate::graph::{qualified_port_key, Graph, Node, NodeId, PortValues, Value};
use crate::pool::BufferPool;
use crate::validation::{GraphValidator, ValidationResult};
use chrono::Utc;
use crossbeam_channel::{bounded, Receiver};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::Instrument;

/// Per-run request: id, mode, entry inputs and cancellation.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Known before `execute` returns so callers can poll status
    pub run_id: RunId,
    /// Falls back to the configured default mode
    pub mode: Option<ExecutionMode>,
    /// Initial values keyed `"Node.port"` or bare `"port"`
    pub inputs: PortValues,
    pub cancel: CancellationToken,
    /// Cancel the run automatically after this long
    pub deadline: Option<Duration>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequential() -> Self {
        Self::new().with_mode(ExecutionMode::Sequential)
    }

    pub fn parallel() -> Self {
        Self::new().with_mode(ExecutionMode::Parallel)
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_input(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(key.into(), value.into());
        self
    }

    pub fn with_inputs(mut self, inputs: PortValues) -> Self {
        self.inputs.extend(inputs);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Time-bounded cancellation. The caller's own token keeps working.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Validation outcome including flow-level warnings and plan statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Present when the graph could be planned
    pub stats: Option<PlanStats>,
}

/// Why the driver stopped admitting work.
enum Halt {
    Cancelled,
    Failed(RunFailure),
}

/// What a driver hands back once it stops.
struct RunOutcome {
    results: Vec<NodeExecutionResult>,
    final_outputs: HashMap<NodeId, PortValues>,
    halt: Option<Halt>,
    events: EventSink,
}

/// Executes graphs against a registry of operator executors.
pub struct FlowScheduler {
    registry: Arc<ExecutorRegistry>,
    pool: BufferPool,
    settings: ExecutionSettings,
    runs: RunRegistry,
    subscribers: Subscribers,
}

impl FlowScheduler {
    /// Scheduler with the built-in operators and a pool built from `config`.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registry(config, Arc::new(ExecutorRegistry::with_builtins()))
    }

    pub fn with_registry(config: EngineConfig, registry: Arc<ExecutorRegistry>) -> Self {
        Self {
            registry,
            pool: BufferPool::from_settings(&config.pool),
            runs: RunRegistry::new(Duration::from_secs(
                config.execution.status_retention_secs,
            )),
            settings: config.execution,
            subscribers: Subscribers::default(),
        }
    }

    /// Share an existing pool instead of the one built from config.
    pub fn with_pool(mut self, pool: BufferPool) -> Self {
        self.pool = pool;
        self
    }

    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    /// Receive every event emitted from now on. Slow receivers lose events
    /// once their channel is full; runs never block on them. Dropping the
    /// receiver unsubscribes at the next event.
    pub fn subscribe(&self) -> Receiver<FlowEvent> {
        let (tx, rx) = bounded(EVENT_CHANNEL_CAPACITY);
        self.subscribers.lock().push(tx);
        rx
    }

    /// Subscribers not yet found closed.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Snapshot of a live or recently finished run.
    pub fn get_execution_status(&self, run_id: RunId) -> Option<ExecutionContext> {
        self.runs.get(run_id)
    }

    /// Structural checks plus reachability warnings and executor-level
    /// parameter checks. Never mutates the graph.
    pub fn validate_flow(&self, graph: &Graph) -> FlowValidationResult {
        let ValidationResult {
            valid,
            mut errors,
            mut warnings,
        } = GraphValidator::validate(graph);
        let mut stats = None;

        if valid {
            match ExecutionPlan::build(graph) {
                Ok(plan) => {
                    for &id in &plan.unreachable_from_sink {
                        warnings.push(format!(
                            "Node '{}' has no path to a terminal output",
                            node_name(graph, id)
                        ));
                    }
                    for &id in &plan.isolated {
                        warnings.push(format!(
                            "Node '{}' is not connected to any other node",
                            node_name(graph, id)
                        ));
                    }
                    stats = Some(plan.stats);
                }
                Err(e) => errors.push(e.to_string()),
            }
        }

        for node in graph.nodes_sorted().into_iter().filter(|n| n.enabled) {
            match self.registry.get(&node.operator_type) {
                None => warnings.push(format!(
                    "Node '{}': no executor registered for operator type '{}'",
                    node.name, node.operator_type
                )),
                Some(executor) => {
                    if let Err(message) = executor.validate(node) {
                        errors.push(format!("Node '{}': {}", node.name, message));
                    }
                }
            }
        }

        FlowValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
            stats,
        }
    }

    /// Run a graph to completion, failure or cancellation.
    ///
    /// Always returns a structured result; node failures never propagate as
    /// errors from this call.
    pub async fn execute(&self, graph: &Graph, options: RunOptions) -> FlowExecutionResult {
        let span = tracing::info_span!("flow_run", run_id = %options.run_id, graph = %graph.name);
        self.run(graph, options).instrument(span).await
    }

    async fn run(&self, graph: &Graph, options: RunOptions) -> FlowExecutionResult {
        let started = Instant::now();
        let RunOptions {
            run_id,
            mode,
            inputs,
            cancel,
            deadline,
        } = options;
        let mode = mode.unwrap_or(self.settings.default_mode);
        let events = EventSink::shared(Arc::clone(&self.subscribers));

        let validation =
            GraphValidator::validate_with_inputs(graph, inputs.keys().map(String::as_str));
        for warning in &validation.warnings {
            tracing::warn!("{}", warning);
        }
        if !validation.valid {
            tracing::warn!(
                "Refusing to run invalid graph '{}': {} error(s)",
                graph.name,
                validation.errors.len()
            );
            return self.reject(run_id, graph, started, events, RunFailure::Validation(validation.errors));
        }

        let plan = match ExecutionPlan::build(graph) {
            Ok(plan) => plan,
            Err(FlowError::Scheduling(message)) => {
                return self.reject(run_id, graph, started, events, RunFailure::Scheduling(message))
            }
            Err(other) => {
                return self.reject(run_id, graph, started, events, RunFailure::Scheduling(other.to_string()))
            }
        };

        let context = self
            .runs
            .register(ExecutionContext::new(run_id, &graph.name, plan.len()));
        context.write().status = RunStatus::Running;

        tracing::info!(
            "Starting run of '{}': {} nodes in {} waves ({} mode)",
            graph.name,
            plan.len(),
            plan.stats.wave_count,
            mode
        );

        let token = cancel.child_token();
        let deadline_timer = deadline.map(|limit| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::warn!("Run deadline of {:?} reached, cancelling", limit);
                token.cancel();
            })
        });
        let mut guard = RunGuard {
            runs: &self.runs,
            run_id,
            context: Arc::clone(&context),
            token: token.clone(),
            deadline_timer,
            armed: true,
        };

        let mut driver = RunDriver::new(self, graph, &plan, run_id, &inputs, token, Arc::clone(&context), events);
        driver.events.emit(FlowEvent::RunStarted {
            run_id,
            graph: graph.name.clone(),
            node_count: plan.len(),
            at: Utc::now(),
        });

        match mode {
            ExecutionMode::Sequential => driver.run_sequential().await,
            ExecutionMode::Parallel => {
                driver
                    .run_parallel(self.settings.effective_parallelism())
                    .await
            }
        }

        guard.disarm();
        let outcome = driver.finish();
        self.complete(run_id, &context, started, outcome)
    }

    /// Finish a run that never started executing nodes.
    fn reject(
        &self,
        run_id: RunId,
        graph: &Graph,
        started: Instant,
        events: EventSink,
        failure: RunFailure,
    ) -> FlowExecutionResult {
        let context = self.runs.register(ExecutionContext::new(run_id, &graph.name, 0));
        let outcome = RunOutcome {
            results: Vec::new(),
            final_outputs: HashMap::new(),
            halt: Some(Halt::Failed(failure)),
            events,
        };
        self.complete(run_id, &context, started, outcome)
    }

    fn complete(
        &self,
        run_id: RunId,
        context: &SharedContext,
        started: Instant,
        outcome: RunOutcome,
    ) -> FlowExecutionResult {
        let RunOutcome {
            results,
            final_outputs,
            halt,
            mut events,
        } = outcome;
        let elapsed = started.elapsed();

        let (status, failure) = match halt {
            None => (RunStatus::Completed, None),
            Some(Halt::Cancelled) => (RunStatus::Cancelled, Some(RunFailure::Cancelled)),
            Some(Halt::Failed(failure)) => (RunStatus::Failed, Some(failure)),
        };
        let error = failure.as_ref().map(ToString::to_string);

        context.write().finish(status);
        self.runs.mark_finished(run_id);

        match status {
            RunStatus::Completed => tracing::info!(
                "Run completed: {} nodes in {:?}",
                results.len(),
                elapsed
            ),
            RunStatus::Cancelled => tracing::info!(
                "Run cancelled after {} nodes ({:?})",
                results.len(),
                elapsed
            ),
            _ => tracing::error!(
                "Run failed: {}",
                error.as_deref().unwrap_or("unknown error")
            ),
        }

        events.emit(FlowEvent::RunCompleted {
            run_id,
            status,
            elapsed_ms: elapsed.as_millis() as u64,
            error: error.clone(),
            at: Utc::now(),
        });

        FlowExecutionResult {
            run_id,
            status,
            success: status == RunStatus::Completed,
            elapsed,
            node_results: results,
            final_outputs,
            error,
            failure,
            events: events.into_events(),
        }
    }
}

impl std::fmt::Debug for FlowScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowScheduler")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("active_runs", &self.runs.active_runs().len())
            .finish()
    }
}

fn node_name(graph: &Graph, id: NodeId) -> String {
    graph
        .node(id)
        .map(|n| n.name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// Await one executor. Owns everything so it can run on a spawned task.
async fn invoke(
    executor: Arc<dyn OperatorExecutor>,
    ctx: NodeContext,
    inputs: PortValues,
) -> Result<PortValues, OperatorError> {
    executor.execute(&ctx, inputs).await
}

/// Map a node task that did not return into that node's failure.
fn join_failure(node: &Node, join_err: JoinError) -> OperatorError {
    if join_err.is_cancelled() {
        return OperatorError::Cancelled;
    }
    tracing::error!("Executor for node '{}' panicked: {}", node.name, join_err);
    OperatorError::Other(anyhow::anyhow!("Executor panicked: {}", join_err))
}

fn is_image(value: &Value) -> bool {
    matches!(value, Value::Image(_))
}

/// Settles a run whose `execute` future is dropped before it completes:
/// cancels outstanding node work and reports the run as cancelled.
struct RunGuard<'s> {
    runs: &'s RunRegistry,
    run_id: RunId,
    context: SharedContext,
    token: CancellationToken,
    deadline_timer: Option<JoinHandle<()>>,
    armed: bool,
}

impl RunGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
        if let Some(timer) = self.deadline_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Some(timer) = self.deadline_timer.take() {
            timer.abort();
        }
        if !self.armed {
            return;
        }
        tracing::warn!("Run {} dropped before completion, marking it cancelled", self.run_id);
        self.token.cancel();
        self.context.write().finish(RunStatus::Cancelled);
        self.runs.mark_finished(self.run_id);
    }
}

/// Keep declared outputs whose values match their port kind.
fn check_outputs(node: &Node, outputs: PortValues) -> Result<PortValues, OperatorError> {
    let mut checked = PortValues::with_capacity(outputs.len());
    for (port, value) in outputs {
        match node.output(&port) {
            Some(desc) if desc.kind.accepts(&value) => {
                checked.insert(port, value);
            }
            Some(desc) => {
                return Err(OperatorError::Precondition(format!(
                    "output '{}' produced {:?} but is declared {:?}",
                    port,
                    value.kind(),
                    desc.kind
                )))
            }
            None => tracing::debug!("Dropping undeclared output '{}' of node '{}'", port, node.name),
        }
    }
    Ok(checked)
}

/// Mutable state of one run. Only the driver writes it.
struct RunDriver<'a> {
    graph: &'a Graph,
    plan: &'a ExecutionPlan,
    registry: &'a ExecutorRegistry,
    pool: &'a BufferPool,
    record_images: bool,
    run_id: RunId,
    inputs: &'a PortValues,
    token: CancellationToken,
    context: SharedContext,
    events: EventSink,
    nodes: HashMap<NodeId, Arc<Node>>,
    /// Produced values still awaiting readers, keyed by (node, output port)
    values: HashMap<(NodeId, String), Value>,
    pending_reads: HashMap<(NodeId, String), usize>,
    results: Vec<NodeExecutionResult>,
    final_outputs: HashMap<NodeId, PortValues>,
    halt: Option<Halt>,
}

impl<'a> RunDriver<'a> {
    #[allow(clippy::too_many_arguments)]
    fn new(
        scheduler: &'a FlowScheduler,
        graph: &'a Graph,
        plan: &'a ExecutionPlan,
        run_id: RunId,
        inputs: &'a PortValues,
        token: CancellationToken,
        context: SharedContext,
        events: EventSink,
    ) -> Self {
        let nodes = plan
            .order
            .iter()
            .filter_map(|id| graph.node(*id).map(|n| (*id, Arc::new(n.clone()))))
            .collect();

        Self {
            graph,
            plan,
            registry: scheduler.registry.as_ref(),
            pool: &scheduler.pool,
            record_images: scheduler.settings.record_image_outputs,
            run_id,
            inputs,
            token,
            context,
            events,
            nodes,
            values: HashMap::new(),
            pending_reads: HashMap::new(),
            results: Vec::new(),
            final_outputs: HashMap::new(),
            halt: None,
        }
    }

    async fn run_sequential(&mut self) {
        let plan = self.plan;
        for &node_id in &plan.order {
            if self.token.is_cancelled() {
                tracing::info!("Cancellation observed before node {}", node_name(self.graph, node_id));
                self.halt(Halt::Cancelled);
                break;
            }
            let Some(node) = self.nodes.get(&node_id).cloned() else {
                self.halt(Halt::Failed(RunFailure::Scheduling(format!(
                    "Planned node {} is missing from the graph",
                    node_id
                ))));
                break;
            };

            self.begin_node(&node);
            let started = Instant::now();
            let outcome = match self.prepare(&node, self.token.child_token()) {
                Ok((executor, ctx, inputs)) => {
                    // Spawned so a panicking executor fails its node instead
                    // of unwinding through the run.
                    let span = tracing::debug_span!("node", node = %node.name);
                    let task = tokio::spawn(invoke(executor, ctx, inputs).instrument(span));
                    match AbortOnDropHandle::new(task).await {
                        Ok(outcome) => outcome,
                        Err(join_err) => Err(join_failure(&node, join_err)),
                    }
                }
                Err(e) => Err(e),
            };

            if self.record(&node, outcome, started.elapsed()) {
                break;
            }
        }
    }

    /// Admit one wave at a time; at most `parallelism` nodes execute at once.
    async fn run_parallel(&mut self, parallelism: usize) {
        let plan = self.plan;
        let semaphore = Arc::new(Semaphore::new(parallelism.max(1)));

        for (level, wave) in plan.waves.iter().enumerate() {
            if self.token.is_cancelled() {
                tracing::info!("Cancellation observed before wave {}", level);
                self.halt(Halt::Cancelled);
                break;
            }
            tracing::debug!("Admitting wave {} ({} nodes)", level, wave.len());

            let wave_token = self.token.child_token();
            let wave_started = Instant::now();
            let mut join_set = JoinSet::new();
            let mut in_flight: HashMap<tokio::task::Id, Arc<Node>> = HashMap::new();

            for &node_id in wave {
                if self.halt.is_some() {
                    break;
                }
                let Some(node) = self.nodes.get(&node_id).cloned() else {
                    self.halt(Halt::Failed(RunFailure::Scheduling(format!(
                        "Planned node {} is missing from the graph",
                        node_id
                    ))));
                    break;
                };

                self.begin_node(&node);
                match self.prepare(&node, wave_token.child_token()) {
                    Ok((executor, ctx, inputs)) => {
                        let semaphore = Arc::clone(&semaphore);
                        let span = tracing::debug_span!("node", node = %node.name);
                        let task = async move {
                            let Ok(_permit) = semaphore.acquire_owned().await else {
                                return (Err(OperatorError::Cancelled), Duration::ZERO);
                            };
                            if ctx.is_cancelled() {
                                return (Err(OperatorError::Cancelled), Duration::ZERO);
                            }
                            let started = Instant::now();
                            let outcome = invoke(executor, ctx, inputs).await;
                            (outcome, started.elapsed())
                        };
                        let handle = join_set.spawn(task.instrument(span));
                        in_flight.insert(handle.id(), node);
                    }
                    Err(e) => {
                        if self.record(&node, Err(e), Duration::ZERO) {
                            wave_token.cancel();
                        }
                    }
                }
            }

            // A halt cancels the rest of the wave; wait for it to observe that.
            if self.halt.is_some() {
                wave_token.cancel();
            }
            while let Some(joined) = join_set.join_next_with_id().await {
                let (node, outcome, elapsed) = match joined {
                    Ok((id, (outcome, elapsed))) => match in_flight.remove(&id) {
                        Some(node) => (node, outcome, elapsed),
                        None => continue,
                    },
                    Err(join_err) => {
                        let Some(node) = in_flight.remove(&join_err.id()) else {
                            continue;
                        };
                        let outcome = Err(join_failure(&node, join_err));
                        (node, outcome, wave_started.elapsed())
                    }
                };

                if self.record(&node, outcome, elapsed) {
                    wave_token.cancel();
                }
            }

            if self.halt.is_some() {
                break;
            }
        }
    }

    fn begin_node(&mut self, node: &Node) {
        tracing::debug!("Executing node '{}' ({})", node.name, node.operator_type);
        self.context.write().node_started(node.id);
        self.events.emit(FlowEvent::NodeStarted {
            run_id: self.run_id,
            node_id: node.id,
            node_name: node.name.clone(),
            at: Utc::now(),
        });
    }

    fn prepare(
        &self,
        node: &Arc<Node>,
        token: CancellationToken,
    ) -> Result<(Arc<dyn OperatorExecutor>, NodeContext, PortValues), OperatorError> {
        let executor = self.registry.resolve(&node.operator_type)?;
        let inputs = self.gather_inputs(node)?;
        let ctx = NodeContext::new(self.run_id, Arc::clone(node), token, self.pool.clone());
        Ok((executor, ctx, inputs))
    }

    /// Upstream value, then caller input, then port default.
    fn gather_inputs(&self, node: &Node) -> Result<PortValues, OperatorError> {
        let mut inputs = PortValues::with_capacity(node.inputs().len());

        for port in node.inputs() {
            let feeder = self.graph.source_of(node.id, &port.name);
            let upstream = feeder
                .filter(|c| self.plan.contains(c.source))
                .and_then(|c| self.values.get(&(c.source, c.source_port.clone())))
                .cloned();

            let value = match upstream {
                Some(value) => Some(value),
                None => match self.caller_input(node, &port.name, feeder.is_none()) {
                    Some(value) if port.kind.accepts(value) => Some(value.clone()),
                    Some(value) => {
                        return Err(OperatorError::Precondition(format!(
                            "input '{}' expects {:?} but was given {:?}",
                            port.name,
                            port.kind,
                            value.kind()
                        )))
                    }
                    None => port
                        .default
                        .as_ref()
                        .filter(|v| port.kind.accepts(v))
                        .cloned(),
                },
            };

            match value {
                Some(value) => {
                    inputs.insert(port.name.clone(), value);
                }
                None if port.required => return Err(OperatorError::MissingInput(port.name.clone())),
                None => {}
            }
        }

        Ok(inputs)
    }

    /// `"Node.port"` applies to any unfed input; a bare `"port"` only to
    /// inputs with no incoming connection.
    fn caller_input(&self, node: &Node, port: &str, entry_point: bool) -> Option<&'a Value> {
        let inputs = self.inputs;
        inputs
            .get(&qualified_port_key(&node.name, port))
            .or_else(|| inputs.get(port).filter(|_| entry_point))
    }

    /// Count one read of every value `node` consumed; drop values nobody
    /// else will read so pooled frames go back to the pool.
    fn release_inputs(&mut self, node: NodeId) {
        let graph = self.graph;
        for conn in graph.incoming(node) {
            let key = (conn.source, conn.source_port.clone());
            if let Some(remaining) = self.pending_reads.get_mut(&key) {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    self.pending_reads.remove(&key);
                    self.values.remove(&key);
                }
            }
        }
    }

    /// Record a finished node. Returns whether the run is now halted.
    fn record(
        &mut self,
        node: &Node,
        outcome: Result<PortValues, OperatorError>,
        elapsed: Duration,
    ) -> bool {
        self.release_inputs(node.id);
        self.context.write().node_finished(node.id);

        match outcome.and_then(|outputs| check_outputs(node, outputs)) {
            Ok(outputs) => {
                tracing::debug!("Node '{}' completed in {:?}", node.name, elapsed);

                // One detached copy per kept frame, shared by both views.
                let terminal = self.plan.is_terminal(node.id);
                let detached: PortValues = outputs
                    .iter()
                    .filter(|(_, value)| terminal || self.record_images || !is_image(value))
                    .map(|(port, value)| (port.clone(), value.detached()))
                    .collect();
                let recorded: PortValues = detached
                    .iter()
                    .filter(|(_, value)| self.record_images || !is_image(value))
                    .map(|(port, value)| (port.clone(), value.clone()))
                    .collect();
                if terminal {
                    self.final_outputs.insert(node.id, detached);
                }

                for (port, value) in outputs {
                    let readers = self.plan.consumer_count(node.id, &port);
                    if readers > 0 {
                        self.pending_reads.insert((node.id, port.clone()), readers);
                        self.values.insert((node.id, port), value);
                    }
                }

                self.events.emit(FlowEvent::NodeCompleted {
                    run_id: self.run_id,
                    node_id: node.id,
                    node_name: node.name.clone(),
                    success: true,
                    elapsed_ms: elapsed.as_millis() as u64,
                    error: None,
                    at: Utc::now(),
                });
                self.results.push(NodeExecutionResult::succeeded(
                    node.id,
                    node.name.clone(),
                    recorded,
                    elapsed,
                ));
            }
            Err(err) => {
                let message = err.to_string();
                let halt = if err.is_cancelled()
                    && (self.token.is_cancelled() || self.halt.is_some())
                {
                    tracing::debug!("Node '{}' observed cancellation", node.name);
                    Some(Halt::Cancelled)
                } else if node.critical {
                    tracing::error!("Node '{}' failed: {}", node.name, message);
                    Some(Halt::Failed(RunFailure::Node {
                        node_id: node.id,
                        message: format!("Node '{}' failed: {}", node.name, message),
                    }))
                } else {
                    tracing::warn!("Non-critical node '{}' failed: {}", node.name, message);
                    None
                };

                self.events.emit(FlowEvent::NodeCompleted {
                    run_id: self.run_id,
                    node_id: node.id,
                    node_name: node.name.clone(),
                    success: false,
                    elapsed_ms: elapsed.as_millis() as u64,
                    error: Some(message.clone()),
                    at: Utc::now(),
                });
                self.results.push(NodeExecutionResult::failed(
                    node.id,
                    node.name.clone(),
                    message,
                    elapsed,
                ));

                if let Some(halt) = halt {
                    self.halt(halt);
                }
            }
        }

        self.halt.is_some()
    }

    /// The first reason to stop wins.
    fn halt(&mut self, halt: Halt) {
        if self.halt.is_none() {
            self.halt = Some(halt);
        }
    }

    fn finish(self) -> RunOutcome {
        RunOutcome {
            results: self.results,
            final_outputs: self.final_outputs,
            halt: self.halt,
            events: self.events,
        }
    }
}
