use crate::bridge::{self, ErasedInvocation};
use crate::value::short_type_name;
use crate::{
    AnyValue, ContractError, EngineError, NodeError, ProcessId, RuntimeProperties, StateData,
    Transition, TypeDescriptor,
};
use async_trait::async_trait;
use futures::FutureExt;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type NodeId = Uuid;

/// A typed transformation invoked once per input.
#[async_trait]
pub trait Node: Send + Sync + 'static {
    type Input: StateData;
    type Output: StateData;

    /// Display name used in events and diagrams.
    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    async fn invoke(&self, input: Self::Input, ctx: &NodeContext) -> Result<Self::Output, NodeError>;
}

/// A typed transformation that folds every input buffered in a tick into one
/// output.
#[async_trait]
pub trait CombiningNode: Send + Sync + 'static {
    type Input: StateData;
    type Output: StateData;

    fn name(&self) -> String {
        short_type_name(std::any::type_name::<Self>())
    }

    async fn invoke_all(
        &self,
        inputs: Vec<Self::Input>,
        ctx: &NodeContext,
    ) -> Result<Self::Output, NodeError>;
}

/// Execution context passed to each invocation
#[derive(Clone)]
pub struct NodeContext {
    pub node_id: NodeId,

    /// Process being served; the first process of the batch for combining nodes
    pub process_id: ProcessId,

    /// 1 for the first invocation, incremented on every retry
    pub attempt: u32,

    /// Bag shared by all nodes of the run
    pub properties: RuntimeProperties,

    /// Cancellation signal of the run
    pub cancellation: CancellationToken,

    logs: Arc<Mutex<Vec<String>>>,
}

impl NodeContext {
    pub fn new(
        node_id: NodeId,
        process_id: ProcessId,
        properties: RuntimeProperties,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            node_id,
            process_id,
            attempt: 1,
            properties,
            cancellation,
            logs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Context outside any run, for exercising nodes directly.
    pub fn detached() -> Self {
        Self::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            RuntimeProperties::new(),
            CancellationToken::new(),
        )
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Queue a free-form log line; the scheduler forwards it to the event sink
    /// once the invocation completes.
    pub fn log(&self, message: impl Into<String>) {
        if let Ok(mut logs) = self.logs.lock() {
            logs.push(message.into());
        }
    }

    pub fn take_logs(&self) -> Vec<String> {
        self.logs
            .lock()
            .map(|mut logs| std::mem::take(&mut *logs))
            .unwrap_or_default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Ask the run to stop scheduling new work.
    pub fn stop(&self) {
        self.cancellation.cancel();
    }
}

/// Adapter turning a synchronous closure into a [`Node`].
pub struct FnNode<I, O, F> {
    f: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O, F> FnNode<I, O, F>
where
    F: Fn(I) -> Result<O, NodeError> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<I, O, F> Node for FnNode<I, O, F>
where
    I: StateData,
    O: StateData,
    F: Fn(I) -> Result<O, NodeError> + Send + Sync + 'static,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> String {
        format!("fn {} to {}", TypeDescriptor::of::<I>(), TypeDescriptor::of::<O>())
    }

    async fn invoke(&self, input: I, _ctx: &NodeContext) -> Result<O, NodeError> {
        (self.f)(input)
    }
}

trait Invoke: Send + Sync {
    fn invoke<'a>(&'a self, inputs: Vec<AnyValue>, ctx: &'a NodeContext) -> ErasedInvocation<'a>;
}

struct PerInput<N>(N);

impl<N: Node> Invoke for PerInput<N> {
    fn invoke<'a>(&'a self, mut inputs: Vec<AnyValue>, ctx: &'a NodeContext) -> ErasedInvocation<'a> {
        bridge::erase(async move {
            if inputs.len() != 1 {
                return Err(NodeError::InvalidInput(format!(
                    "expected exactly one input, got {}",
                    inputs.len()
                )));
            }
            let input = inputs
                .pop()
                .ok_or_else(|| NodeError::InvalidInput("no input".to_string()))?;
            let input = bridge::expect_input::<N::Input>(input)?;
            self.0.invoke(input, ctx).await
        })
    }
}

struct Combined<N>(N);

impl<N: CombiningNode> Invoke for Combined<N> {
    fn invoke<'a>(&'a self, inputs: Vec<AnyValue>, ctx: &'a NodeContext) -> ErasedInvocation<'a> {
        bridge::erase(async move {
            let inputs = inputs
                .into_iter()
                .map(bridge::expect_input::<N::Input>)
                .collect::<Result<Vec<_>, _>>()?;
            self.0.invoke_all(inputs, ctx).await
        })
    }
}

/// Where an output goes next, as decided by a node's transitions.
#[derive(Debug, Clone)]
pub struct Successor {
    pub node_id: NodeId,
    pub input: AnyValue,
}

/// A vertex of a state graph: a type-erased node plus its outgoing transitions.
#[derive(Clone)]
pub struct StateNode {
    id: NodeId,
    name: String,
    input_type: TypeDescriptor,
    output_type: TypeDescriptor,
    transitions: Vec<Transition>,
    dead_end: bool,
    parallel_transitions: bool,
    combine_input: bool,
    max_reruns: Option<u32>,
    invoker: Arc<dyn Invoke>,
}

impl StateNode {
    pub fn new<N: Node>(node: N) -> Self {
        Self::from_parts(
            node.name(),
            TypeDescriptor::of::<N::Input>(),
            TypeDescriptor::of::<N::Output>(),
            false,
            Arc::new(PerInput(node)),
        )
    }

    /// Wrap a node that receives all of a tick's inputs in one call.
    pub fn combining<N: CombiningNode>(node: N) -> Self {
        Self::from_parts(
            node.name(),
            TypeDescriptor::of::<N::Input>(),
            TypeDescriptor::of::<N::Output>(),
            true,
            Arc::new(Combined(node)),
        )
    }

    fn from_parts(
        name: String,
        input_type: TypeDescriptor,
        output_type: TypeDescriptor,
        combine_input: bool,
        invoker: Arc<dyn Invoke>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            input_type,
            output_type,
            transitions: Vec::new(),
            dead_end: false,
            parallel_transitions: false,
            combine_input,
            max_reruns: None,
            invoker,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Outputs of a dead-end node terminate their path.
    pub fn dead_end(mut self) -> Self {
        self.dead_end = true;
        self
    }

    /// Fire every matching transition instead of only the first.
    pub fn with_parallel_transitions(mut self) -> Self {
        self.parallel_transitions = true;
        self
    }

    /// Override the retry budget of processes scheduled on this node.
    /// The budget counts the first attempt, so values below 1 are raised to 1.
    pub fn with_max_reruns(mut self, max_reruns: u32) -> Self {
        self.max_reruns = Some(max_reruns.max(1));
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn input_type(&self) -> TypeDescriptor {
        self.input_type
    }

    pub fn output_type(&self) -> TypeDescriptor {
        self.output_type
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn is_dead_end(&self) -> bool {
        self.dead_end
    }

    pub fn allows_parallel_transitions(&self) -> bool {
        self.parallel_transitions
    }

    pub fn combines_input(&self) -> bool {
        self.combine_input
    }

    pub fn max_reruns(&self) -> Option<u32> {
        self.max_reruns
    }

    /// Append a transition built from this node.
    pub fn add_transition(&mut self, transition: Transition) -> Result<&mut Transition, ContractError> {
        if transition.source() != self.id {
            return Err(ContractError::IncompatibleTransition {
                from: self.name.clone(),
                to: transition.target().to_string(),
                reason: "transition was built from a different source node".to_string(),
            });
        }
        self.transitions.push(transition);
        let last = self.transitions.len() - 1;
        Ok(&mut self.transitions[last])
    }

    /// Invoke with the given inputs: exactly one, or the whole batch when the
    /// node combines input.
    pub fn invoke<'a>(&'a self, inputs: Vec<AnyValue>, ctx: &'a NodeContext) -> ErasedInvocation<'a> {
        if inputs.is_empty() {
            let name = self.name.clone();
            return async move {
                Err::<AnyValue, _>(NodeError::InvalidInput(format!(
                    "node '{}' invoked without input",
                    name
                )))
            }
            .boxed();
        }
        self.invoker.invoke(inputs, ctx)
    }

    /// Route one output through the transitions in declaration order.
    ///
    /// Dead-end nodes never produce successors.
    pub fn evaluate_transitions(&self, output: &AnyValue) -> Result<Vec<Successor>, EngineError> {
        let mut successors = Vec::new();
        if self.dead_end {
            return Ok(successors);
        }
        for transition in &self.transitions {
            let mut firing = transition.fire(output);
            if !firing.evaluate()? {
                continue;
            }
            tracing::trace!("Transition '{}' -> {} fired", self.name, transition.target());
            successors.push(Successor {
                node_id: transition.target(),
                input: firing.next_input()?,
            });
            if !self.parallel_transitions {
                break;
            }
        }
        Ok(successors)
    }
}

impl fmt::Debug for StateNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateNode")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("input", &self.input_type)
            .field("output", &self.output_type)
            .field("transitions", &self.transitions.len())
            .field("dead_end", &self.dead_end)
            .field("parallel_transitions", &self.parallel_transitions)
            .field("combine_input", &self.combine_input)
            .finish()
    }
}
