use crate::{MachineConfig, RunSummary, StateGraph, StateMachine};
use statecore::{
    AnyValue, ContractError, EngineError, EventSink, NodeId, NoopSink, ProcessResult, Result,
    RunStatus, RuntimeProperties, StateData, TypeDescriptor,
};
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// A state machine with a declared input type `I` and output type `O`.
///
/// Entry and exit nodes are checked against the declared types when they are
/// set. A run returns every `O` produced at the exit node; a batch run returns
/// one such list per input, in submission order.
pub struct TypedStateMachine<I, O> {
    graph: Arc<StateGraph>,
    config: MachineConfig,
    sink: Arc<dyn EventSink>,
    gate: Arc<Semaphore>,
    cancellation: CancellationToken,
    shared_properties: Option<RuntimeProperties>,
    entry: Option<NodeId>,
    exit: Option<NodeId>,
    machine: StateMachine,
    _types: PhantomData<fn(I) -> O>,
}

impl<I: StateData, O: StateData> TypedStateMachine<I, O> {
    pub fn new(graph: impl Into<Arc<StateGraph>>, config: MachineConfig) -> Self {
        let graph = graph.into();
        let gate = Arc::new(Semaphore::new(config.gate_permits()));
        let cancellation = CancellationToken::new();
        let sink: Arc<dyn EventSink> = Arc::new(NoopSink);
        let machine = StateMachine::new(Arc::clone(&graph), config.clone())
            .with_gate(Arc::clone(&gate))
            .with_sink(Arc::clone(&sink))
            .with_cancellation(cancellation.clone());
        Self {
            graph,
            config,
            sink,
            gate,
            cancellation,
            shared_properties: None,
            entry: None,
            exit: None,
            machine,
            _types: PhantomData,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.machine = self.machine.with_sink(Arc::clone(&sink));
        self.sink = sink;
        self
    }

    /// Make batch runs share `properties` instead of getting a fresh bag each.
    /// Single runs use it too.
    pub fn share_properties(mut self, properties: RuntimeProperties) -> Self {
        self.machine = self.machine.with_properties(properties.clone());
        self.shared_properties = Some(properties);
        self
    }

    pub fn set_entry_node(&mut self, node: NodeId) -> Result<&mut Self> {
        let state = self.graph.require(node)?;
        let declared = TypeDescriptor::of::<I>();
        if !state.input_type().accepts(&declared) {
            return Err(ContractError::EntryMismatch {
                node: state.name().to_string(),
                expected: declared.short_name(),
                found: state.input_type().short_name(),
            }
            .into());
        }
        self.entry = Some(node);
        Ok(self)
    }

    pub fn set_exit_node(&mut self, node: NodeId) -> Result<&mut Self> {
        let state = self.graph.require(node)?;
        let declared = TypeDescriptor::of::<O>();
        if !declared.accepts(&state.output_type()) {
            return Err(ContractError::ExitMismatch {
                node: state.name().to_string(),
                expected: declared.short_name(),
                found: state.output_type().short_name(),
            }
            .into());
        }
        self.exit = Some(node);
        self.machine.set_exit(Some(node));
        Ok(self)
    }

    pub fn entry_node(&self) -> Option<NodeId> {
        self.entry
    }

    pub fn exit_node(&self) -> Option<NodeId> {
        self.exit
    }

    pub fn graph(&self) -> &Arc<StateGraph> {
        &self.graph
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn properties(&self) -> &RuntimeProperties {
        self.machine.properties()
    }

    pub fn status(&self) -> RunStatus {
        self.machine.status()
    }

    pub fn is_finished(&self) -> bool {
        self.machine.is_finished()
    }

    pub fn is_cancelled(&self) -> bool {
        self.machine.is_cancelled()
    }

    /// Cancel the current run and every batch run in flight.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Reset after a failed or cancelled run. Clears the cancellation signal.
    pub fn reset(&mut self) {
        if self.cancellation.is_cancelled() {
            self.cancellation = CancellationToken::new();
            let properties = self.machine.properties().clone();
            let mut machine = StateMachine::new(Arc::clone(&self.graph), self.config.clone())
                .with_gate(Arc::clone(&self.gate))
                .with_sink(Arc::clone(&self.sink))
                .with_properties(properties)
                .with_cancellation(self.cancellation.clone());
            machine.set_exit(self.exit);
            self.machine = machine;
        } else {
            self.machine.reset();
        }
    }

    fn endpoints(&self) -> Result<(NodeId, NodeId)> {
        let entry = self
            .entry
            .ok_or_else(|| EngineError::InvalidConfiguration("entry node is not set".to_string()))?;
        let exit = self
            .exit
            .ok_or_else(|| EngineError::InvalidConfiguration("exit node is not set".to_string()))?;
        Ok((entry, exit))
    }

    /// Run one input to completion and return the exit node's outputs.
    pub async fn run(&mut self, input: I) -> Result<Vec<O>> {
        self.run_detailed(input).await.map(|(outputs, _)| outputs)
    }

    /// Like [`TypedStateMachine::run`], also returning the run summary.
    pub async fn run_detailed(&mut self, input: I) -> Result<(Vec<O>, RunSummary)> {
        let (entry, _) = self.endpoints()?;
        let summary = self.machine.run(entry, AnyValue::new(input)).await?;
        let outputs = collect_outputs::<O>(summary.results.clone())?;
        Ok((outputs, summary))
    }

    /// Run every input as an independent run, concurrently, and return the
    /// outputs in submission order.
    pub async fn run_batch(&self, inputs: Vec<I>) -> Result<Vec<Vec<O>>> {
        let (entry, exit) = self.endpoints()?;
        let total = inputs.len();
        tracing::info!("Starting batch of {} run(s)", total);

        let mut runs = JoinSet::new();
        for (index, input) in inputs.into_iter().enumerate() {
            let mut machine = StateMachine::new(Arc::clone(&self.graph), self.config.clone())
                .with_gate(Arc::clone(&self.gate))
                .with_sink(Arc::clone(&self.sink))
                .with_cancellation(self.cancellation.clone());
            if let Some(properties) = &self.shared_properties {
                machine = machine.with_properties(properties.clone());
            }
            machine.set_exit(Some(exit));
            runs.spawn(async move {
                let summary = machine.run(entry, AnyValue::new(input)).await?;
                let outputs = collect_outputs::<O>(summary.results)?;
                Ok::<_, EngineError>((index, outputs))
            });
        }

        let mut by_index = BTreeMap::new();
        while let Some(joined) = runs.join_next().await {
            let (index, outputs) =
                joined.map_err(|e| EngineError::Execution(format!("Task join error: {}", e)))??;
            by_index.insert(index, outputs);
        }
        if by_index.len() != total {
            return Err(EngineError::IllegalState(format!(
                "batch produced {} of {} result set(s)",
                by_index.len(),
                total
            )));
        }
        Ok(by_index.into_values().collect())
    }
}

fn collect_outputs<O: StateData>(results: Vec<ProcessResult>) -> Result<Vec<O>> {
    results
        .into_iter()
        .map(|r| r.into_value().take::<O>().map_err(EngineError::from))
        .collect()
}
