use crate::emitter::RunEmitter;
use crate::steplog::{StepEntry, StepLog};
use crate::visit::NodeVisit;
use crate::{MachineConfig, StateGraph};
use statecore::{
    AnyValue, ContractError, EngineError, EventSink, NodeContext, NodeError, NodeId, NoopSink,
    Process, ProcessResult, Result, RunId, RunStatus, RuntimeProperties, StateData, StateNode,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tick-driven scheduler over a [`StateGraph`].
///
/// Each tick enters every active process into its node, invokes the nodes
/// concurrently behind a counting gate, routes the outputs through the
/// nodes' transitions and makes the successors the next active set. The loop
/// ends when no process is left, when cancellation is observed, or when a
/// process exhausts its retry budget.
pub struct StateMachine {
    graph: Arc<StateGraph>,
    config: MachineConfig,
    gate: Arc<Semaphore>,
    sink: Arc<dyn EventSink>,
    properties: RuntimeProperties,
    parent_cancellation: Option<CancellationToken>,
    cancellation: CancellationToken,
    status: RunStatus,
    active: Vec<Process>,
    exit: Option<NodeId>,
    step_log: Option<StepLog>,
    run_id: Option<RunId>,
    ticks: u64,
}

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    pub ticks: u64,
    pub duration: Duration,

    /// Results produced at the exit node, in the order it accepted them
    pub results: Vec<ProcessResult>,
}

struct InvocationOutcome {
    result: std::result::Result<AnyValue, NodeError>,
    logs: Vec<String>,
    elapsed: Duration,
}

struct Dispatched {
    slot: usize,
    processes: Vec<Process>,
    handle: JoinHandle<InvocationOutcome>,
}

impl StateMachine {
    pub fn new(graph: Arc<StateGraph>, config: MachineConfig) -> Self {
        let gate = Arc::new(Semaphore::new(config.gate_permits()));
        let step_log = config.record_steps.then(StepLog::new);
        Self {
            graph,
            config,
            gate,
            sink: Arc::new(NoopSink),
            properties: RuntimeProperties::new(),
            parent_cancellation: None,
            cancellation: CancellationToken::new(),
            status: RunStatus::NotStarted,
            active: Vec::new(),
            exit: None,
            step_log,
            run_id: None,
            ticks: 0,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share a concurrency gate with other machines.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_properties(mut self, properties: RuntimeProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Derive this machine's cancellation from `parent`: cancelling the parent
    /// cancels the run, cancelling the run leaves the parent untouched.
    pub fn with_cancellation(mut self, parent: CancellationToken) -> Self {
        self.cancellation = parent.child_token();
        self.parent_cancellation = Some(parent);
        self
    }

    /// Collect results produced at `exit` into [`RunSummary::results`].
    pub fn set_exit(&mut self, exit: Option<NodeId>) {
        self.exit = exit;
    }

    pub fn exit(&self) -> Option<NodeId> {
        self.exit
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        &self.graph
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn gate(&self) -> &Arc<Semaphore> {
        &self.gate
    }

    pub fn properties(&self) -> &RuntimeProperties {
        &self.properties
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn is_finished(&self) -> bool {
        self.status == RunStatus::Finished
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Stop scheduling new invocations. In-flight invocations complete.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Token observed by the current run. Replaced on [`StateMachine::reset`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Processes waiting for the next tick.
    pub fn active(&self) -> &[Process] {
        &self.active
    }

    pub fn step_log(&self) -> Option<&StepLog> {
        self.step_log.as_ref()
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Return to `NotStarted`: clears the active set, the step log and the
    /// cancellation signal. Runtime properties are kept.
    pub fn reset(&mut self) {
        self.status = RunStatus::NotStarted;
        self.active.clear();
        self.ticks = 0;
        self.run_id = None;
        if let Some(log) = self.step_log.as_mut() {
            log.clear();
        }
        self.cancellation = match &self.parent_cancellation {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        tracing::debug!("State machine reset");
    }

    pub async fn run_value<T: StateData>(&mut self, entry: NodeId, input: T) -> Result<RunSummary> {
        self.run(entry, AnyValue::new(input)).await
    }

    /// Drive the graph from `entry` until no work remains.
    pub async fn run(&mut self, entry: NodeId, input: AnyValue) -> Result<RunSummary> {
        if !self.status.accepts_run() {
            return Err(EngineError::NotReset(self.status));
        }
        self.config.validate()?;
        if let Some(exit) = self.exit {
            self.graph.require(exit)?;
        }
        let first = self.new_process(entry, input)?;

        let run_id = Uuid::new_v4();
        let events = RunEmitter::new(run_id, Arc::clone(&self.sink));
        let started = Instant::now();
        self.run_id = Some(run_id);
        self.status = RunStatus::Running;
        self.ticks = 0;
        self.active.clear();
        if let Some(log) = self.step_log.as_mut() {
            log.clear();
        }

        tracing::info!(
            "Starting run {} at node '{}'",
            run_id,
            self.graph.require(entry)?.name()
        );
        events.run_started(entry);
        self.active.push(first);

        let mut results = Vec::new();
        loop {
            if self.cancellation.is_cancelled() {
                self.status = RunStatus::Cancelled;
                tracing::info!("Run {} cancelled after {} tick(s)", run_id, self.ticks);
                events.run_cancelled(self.ticks);
                return Ok(self.summary(run_id, started, results));
            }
            if self.active.is_empty() {
                self.status = RunStatus::Finished;
                tracing::info!("Run {} finished in {} tick(s)", run_id, self.ticks);
                events.run_finished(self.ticks, started.elapsed());
                return Ok(self.summary(run_id, started, results));
            }
            if let Some(limit) = self.config.max_ticks {
                if self.ticks >= limit {
                    return Err(self.fail(&events, EngineError::TickLimit(limit)));
                }
            }

            self.ticks += 1;
            tracing::debug!("Tick {}: {} active process(es)", self.ticks, self.active.len());
            events.tick(self.ticks, self.active.len());

            let active = std::mem::take(&mut self.active);
            match self.tick(&events, active, &mut results).await {
                Ok(next) => self.active = next,
                Err(e) => return Err(self.fail(&events, e)),
            }
        }
    }

    async fn tick(
        &mut self,
        events: &RunEmitter,
        active: Vec<Process>,
        results: &mut Vec<ProcessResult>,
    ) -> Result<Vec<Process>> {
        let graph = Arc::clone(&self.graph);

        let mut visits: Vec<NodeVisit> = Vec::new();
        for process in active {
            let slot = match visits.iter().position(|v| v.node_id() == process.node_id()) {
                Some(slot) => slot,
                None => {
                    visits.push(NodeVisit::new(process.node_id()));
                    visits.len() - 1
                }
            };
            visits[slot].enter(process, events);
        }

        let mut next = Vec::new();
        let mut dispatched = Vec::new();
        let mut snapshot = Vec::new();
        for (slot, visit) in visits.iter_mut().enumerate() {
            if self.cancellation.is_cancelled() {
                next.extend(visit.take_pending());
                continue;
            }
            let node = graph.require(visit.node_id())?;
            for processes in visit.take_invocations(node.combines_input())? {
                snapshot.extend(processes.iter().map(|p| StepEntry {
                    process_id: p.id(),
                    node_id: node.id(),
                    node_name: node.name().to_string(),
                    attempt: p.attempt(),
                }));
                let handle = self.dispatch(node, &processes);
                dispatched.push(Dispatched {
                    slot,
                    processes,
                    handle,
                });
            }
        }
        if let Some(log) = self.step_log.as_mut() {
            log.record(self.ticks, snapshot);
        }

        let mut completed: Vec<Vec<(Vec<Process>, InvocationOutcome)>> =
            visits.iter().map(|_| Vec::new()).collect();
        for dispatch in dispatched {
            let outcome = dispatch
                .handle
                .await
                .map_err(|e| EngineError::Execution(format!("Task join error: {}", e)))?;
            completed[dispatch.slot].push((dispatch.processes, outcome));
        }

        for (mut visit, invocations) in visits.into_iter().zip(completed) {
            if !visit.was_invoked() {
                visit.exit(events);
                continue;
            }
            let node = graph.require(visit.node_id())?;

            let invocation_count = invocations.len();
            let mut elapsed = Duration::ZERO;
            let mut failed = Vec::new();
            for (processes, outcome) in invocations {
                elapsed = elapsed.max(outcome.elapsed);
                for line in outcome.logs {
                    events.node_log(node.id(), line);
                }
                match outcome.result {
                    Ok(value) => {
                        let origin = processes.first().ok_or_else(|| {
                            EngineError::IllegalState(format!(
                                "node '{}' produced output without a process",
                                node.name()
                            ))
                        })?;
                        visit.record_output(origin.create_result(value));
                    }
                    Err(error) => failed.push((processes, error)),
                }
            }
            events.node_invoked(node.id(), node.name(), invocation_count, failed.len(), elapsed);

            for (processes, error) in failed {
                for mut process in processes {
                    if process.can_reattempt() {
                        tracing::warn!(
                            "Node '{}' failed, retrying (attempt {}/{}): {}",
                            node.name(),
                            process.attempt(),
                            process.max_reruns(),
                            error
                        );
                        events.retrying(node.id(), process.id(), process.attempt(), error.to_string());
                        next.push(process);
                    } else {
                        return Err(EngineError::RetriesExhausted {
                            node: node.name().to_string(),
                            attempts: process.attempt(),
                            source: error.clone(),
                        });
                    }
                }
            }

            self.route(node, &visit, events, results, &mut next)?;
            visit.exit(events);
        }

        Ok(next)
    }

    /// Evaluate transitions for every output of a visit.
    fn route(
        &self,
        node: &StateNode,
        visit: &NodeVisit,
        events: &RunEmitter,
        results: &mut Vec<ProcessResult>,
        next: &mut Vec<Process>,
    ) -> Result<()> {
        let is_exit = self.exit == Some(node.id());
        for result in visit.outputs() {
            if is_exit {
                results.push(result.clone());
            }
            if node.is_dead_end() {
                continue;
            }
            let successors = node.evaluate_transitions(result.value())?;
            if successors.is_empty() && !is_exit {
                tracing::warn!("Output of node '{}' matched no transition", node.name());
                events.unrouted(node.id(), result.process_id());
            }
            for successor in successors {
                next.push(self.new_process(successor.node_id, successor.input)?);
            }
        }
        Ok(())
    }

    fn dispatch(&self, node: &StateNode, processes: &[Process]) -> JoinHandle<InvocationOutcome> {
        let graph = Arc::clone(&self.graph);
        let gate = Arc::clone(&self.gate);
        let node_id = node.id();
        let (process_id, attempt) = processes
            .first()
            .map(|p| (p.id(), p.attempt()))
            .unwrap_or_default();
        let ctx = NodeContext::new(
            node_id,
            process_id,
            self.properties.clone(),
            self.cancellation.clone(),
        )
        .with_attempt(attempt);
        let inputs: Vec<AnyValue> = processes.iter().map(|p| p.input().clone()).collect();
        let timeout = self.config.invocation_timeout();

        tokio::spawn(async move {
            let _permit = match gate.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return InvocationOutcome {
                        result: Err(NodeError::failed("concurrency gate closed")),
                        logs: Vec::new(),
                        elapsed: Duration::ZERO,
                    }
                }
            };
            let started = Instant::now();
            let result = match graph.node(node_id) {
                Some(node) => {
                    let invocation = node.invoke(inputs, &ctx);
                    match timeout {
                        Some(limit) => tokio::time::timeout(limit, invocation)
                            .await
                            .unwrap_or_else(|_| {
                                Err(NodeError::Timeout {
                                    millis: limit.as_millis() as u64,
                                })
                            }),
                        None => invocation.await,
                    }
                }
                None => Err(NodeError::failed(format!("node {} is not part of the graph", node_id))),
            };
            InvocationOutcome {
                result,
                logs: ctx.take_logs(),
                elapsed: started.elapsed(),
            }
        })
    }

    fn new_process(&self, node_id: NodeId, input: AnyValue) -> Result<Process> {
        let node = self.graph.require(node_id)?;
        let found = input.type_descriptor();
        if !node.input_type().accepts(&found) {
            return Err(ContractError::TypeMismatch {
                expected: node.input_type().short_name(),
                found: found.short_name(),
            }
            .into());
        }
        let budget = node.max_reruns().unwrap_or(self.config.max_reruns);
        Ok(Process::with_max_reruns(node_id, input, budget))
    }

    fn fail(&mut self, events: &RunEmitter, error: EngineError) -> EngineError {
        self.status = RunStatus::Failed;
        tracing::error!("Run failed: {}", error);
        events.run_failed(error.to_string());
        error
    }

    fn summary(&self, run_id: RunId, started: Instant, results: Vec<ProcessResult>) -> RunSummary {
        RunSummary {
            run_id,
            status: self.status,
            ticks: self.ticks,
            duration: started.elapsed(),
            results,
        }
    }
}
