// crates/stateruntime/tests/batch_test.rs

use async_trait::async_trait;
use statecore::{Node, NodeContext, NodeError, RunStatus, RuntimeProperties, StateNode};
use stateruntime::{MachineConfig, StateGraph, TypedStateMachine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Later inputs finish first.
struct Staggered;

#[async_trait]
impl Node for Staggered {
    type Input = u64;
    type Output = String;

    async fn invoke(&self, input: u64, _ctx: &NodeContext) -> Result<String, NodeError> {
        tokio::time::sleep(Duration::from_millis((10 - input) * 5)).await;
        Ok(format!("item {}", input))
    }
}

/// Tracks how many invocations run at once.
struct Gauge {
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[async_trait]
impl Node for Gauge {
    type Input = u64;
    type Output = u64;

    async fn invoke(&self, input: u64, _ctx: &NodeContext) -> Result<u64, NodeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(input)
    }
}

struct Tally;

#[async_trait]
impl Node for Tally {
    type Input = u64;
    type Output = u64;

    async fn invoke(&self, input: u64, ctx: &NodeContext) -> Result<u64, NodeError> {
        ctx.properties.update("runs", 0_u64, |n| n + 1).await;
        Ok(input)
    }
}

fn single_node_machine<N>(node: N) -> TypedStateMachine<N::Input, N::Output>
where
    N: Node,
{
    let mut graph = StateGraph::new();
    let id = graph.add_node(StateNode::new(node).dead_end());
    let mut machine = TypedStateMachine::new(graph, MachineConfig::default());
    machine.set_entry_node(id).map(|_| ()).unwrap();
    machine.set_exit_node(id).map(|_| ()).unwrap();
    machine
}

#[tokio::test]
async fn test_batch_preserves_submission_order() {
    let machine = single_node_machine(Staggered);
    let inputs: Vec<u64> = (0..6).collect();
    let outputs = machine.run_batch(inputs).await.unwrap();
    let expected: Vec<Vec<String>> = (0..6).map(|i| vec![format!("item {}", i)]).collect();
    assert_eq!(outputs, expected);
}

#[tokio::test]
async fn test_batch_of_nothing() {
    let machine = single_node_machine(Staggered);
    assert!(machine.run_batch(Vec::new()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_batch_shares_the_concurrency_gate() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut graph = StateGraph::new();
    let id = graph.add_node(
        StateNode::new(Gauge {
            in_flight: Arc::clone(&in_flight),
            peak: Arc::clone(&peak),
        })
        .dead_end(),
    );
    let mut machine =
        TypedStateMachine::<u64, u64>::new(graph, MachineConfig::default().with_max_concurrency(2));
    machine.set_entry_node(id).map(|_| ()).unwrap();
    machine.set_exit_node(id).map(|_| ()).unwrap();

    let outputs = machine.run_batch((0..8).collect()).await.unwrap();
    assert_eq!(outputs.len(), 8);
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_batch_properties_isolated_unless_shared() {
    let machine = single_node_machine(Tally);
    machine.run_batch(vec![1, 2, 3]).await.unwrap();
    assert_eq!(machine.properties().get::<u64>("runs").await, None);

    let shared = RuntimeProperties::new();
    let mut graph = StateGraph::new();
    let id = graph.add_node(StateNode::new(Tally).dead_end());
    let mut machine = TypedStateMachine::<u64, u64>::new(graph, MachineConfig::default())
        .share_properties(shared.clone());
    machine.set_entry_node(id).map(|_| ()).unwrap();
    machine.set_exit_node(id).map(|_| ()).unwrap();

    machine.run_batch(vec![1, 2, 3, 4]).await.unwrap();
    assert_eq!(shared.get::<u64>("runs").await, Some(4));
}

#[tokio::test]
async fn test_batch_failure_is_reported() {
    struct Picky;

    #[async_trait]
    impl Node for Picky {
        type Input = u64;
        type Output = u64;

        async fn invoke(&self, input: u64, _ctx: &NodeContext) -> Result<u64, NodeError> {
            if input == 3 {
                return Err(NodeError::InvalidInput("three".to_string()));
            }
            Ok(input)
        }
    }

    let machine = single_node_machine(Picky);
    assert!(machine.run_batch(vec![1, 2, 3]).await.is_err());
    // The binding's own machine is untouched by batch runs.
    assert_eq!(machine.status(), RunStatus::NotStarted);
}
