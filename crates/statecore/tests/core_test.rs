// crates/statecore/tests/core_test.rs

use async_trait::async_trait;
use statecore::{
    AnyValue, CombiningNode, ContractError, EngineError, EventBus, EventSink, FnNode, MachineEvent,
    Node, NodeContext, NodeError, NoopSink, Process, RuntimeProperties, StateNode, Transition,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

fn int_node(name: &str) -> StateNode {
    StateNode::new(FnNode::new(|n: i64| Ok::<_, NodeError>(n))).with_name(name)
}

fn text_node(name: &str) -> StateNode {
    StateNode::new(FnNode::new(|s: String| Ok::<_, NodeError>(s))).with_name(name)
}

struct Concat;

#[async_trait]
impl CombiningNode for Concat {
    type Input = String;
    type Output = String;

    async fn invoke_all(&self, inputs: Vec<String>, _ctx: &NodeContext) -> Result<String, NodeError> {
        Ok(inputs.join("+"))
    }
}

struct Length;

#[async_trait]
impl Node for Length {
    type Input = String;
    type Output = usize;

    async fn invoke(&self, input: String, ctx: &NodeContext) -> Result<usize, NodeError> {
        ctx.log(format!("measuring '{}'", input));
        Ok(input.len())
    }
}

#[test]
fn test_reattempt_budget_allows_one_less_retry() {
    let mut process = Process::with_max_reruns(Uuid::new_v4(), AnyValue::new(1_i64), 3);
    assert_eq!(process.attempt(), 1);
    assert!(process.can_reattempt());
    assert_eq!(process.attempt(), 2);
    assert!(process.can_reattempt());
    assert_eq!(process.attempt(), 3);
    assert!(!process.can_reattempt());
    assert!(!process.can_reattempt());
    assert_eq!(process.attempt(), 3);

    let mut single = Process::with_max_reruns(Uuid::new_v4(), AnyValue::new(1_i64), 1);
    assert!(!single.can_reattempt());
}

#[test]
fn test_process_result_keeps_origin() {
    let node = Uuid::new_v4();
    let process = Process::new(node, AnyValue::new("in".to_string()));
    let result = process.create_result(AnyValue::new(2_usize));
    assert_eq!(result.process_id(), process.id());
    assert_eq!(result.node_id(), node);
    assert_eq!(result.into_value().take::<usize>().unwrap(), 2);
}

#[test]
fn test_non_converting_transition_requires_matching_types() {
    let from = int_node("ints");
    let to = text_node("texts");

    let err = Transition::always(&from, &to).unwrap_err();
    assert!(matches!(err, ContractError::IncompatibleTransition { .. }));

    let err = Transition::new(&from, &to, |_: &i64| true).unwrap_err();
    assert!(matches!(err, ContractError::IncompatibleTransition { .. }));
}

#[test]
fn test_predicate_must_match_source_output() {
    let from = int_node("a");
    let to = int_node("b");
    let err = Transition::new(&from, &to, |_: &String| true).unwrap_err();
    assert!(matches!(err, ContractError::IncompatibleTransition { .. }));
}

#[test]
fn test_converting_transition_checks_converted_type() {
    let from = int_node("ints");
    let to = text_node("texts");
    let ok = Transition::converting(&from, &to, |_: &i64| true, |n: &i64| n.to_string());
    assert!(ok.is_ok());

    let err = Transition::converting(&from, &to, |_: &i64| true, |n: &i64| *n * 2).unwrap_err();
    assert!(matches!(err, ContractError::IncompatibleTransition { .. }));
}

#[test]
fn test_converter_runs_once_and_only_after_firing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let from = int_node("ints");
    let to = text_node("texts");
    let transition = Transition::converting(
        &from,
        &to,
        |n: &i64| *n > 0,
        move |n: &i64| {
            counter.fetch_add(1, Ordering::SeqCst);
            format!("#{}", n)
        },
    )
    .unwrap();

    let output = AnyValue::new(5_i64);
    let mut firing = transition.fire(&output);
    assert!(matches!(
        firing.next_input(),
        Err(EngineError::ConversionNotFired { .. })
    ));
    assert!(matches!(
        firing.converted(),
        Err(EngineError::ConversionNotFired { .. })
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert!(firing.evaluate().unwrap());
    let first = firing.next_input().unwrap();
    let second = firing.next_input().unwrap();
    assert_eq!(first.downcast_ref::<String>().map(String::as_str), Some("#5"));
    assert_eq!(second.downcast_ref::<String>().map(String::as_str), Some("#5"));
    assert_eq!(firing.converted().unwrap().downcast_ref::<String>().map(String::as_str), Some("#5"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let negative = AnyValue::new(-1_i64);
    let mut firing = transition.fire(&negative);
    assert!(!firing.evaluate().unwrap());
    assert!(!firing.has_fired());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_converted_without_converter() {
    let from = int_node("a");
    let to = int_node("b");
    let transition = Transition::always(&from, &to).unwrap();
    let output = AnyValue::new(1_i64);
    let mut firing = transition.fire(&output);
    assert!(firing.evaluate().unwrap());
    assert!(matches!(firing.converted(), Err(EngineError::MissingConverter { .. })));
    assert_eq!(firing.next_input().unwrap().downcast_ref::<i64>(), Some(&1));
}

#[test]
fn test_predicate_on_wrong_value_is_a_transition_error() {
    let from = int_node("a");
    let to = int_node("b");
    let transition = Transition::new(&from, &to, |n: &i64| *n > 0).unwrap();
    let err = transition.evaluate(&AnyValue::new("oops".to_string())).unwrap_err();
    assert!(matches!(err, EngineError::Transition { .. }));
}

#[test]
fn test_first_match_and_parallel_routing() {
    let small = int_node("small");
    let large = int_node("large");
    let any = int_node("any");

    let mut first_match = int_node("router");
    first_match
        .add_transition(Transition::new(&first_match, &small, |n: &i64| *n < 10).unwrap())
        .unwrap();
    first_match
        .add_transition(Transition::new(&first_match, &large, |n: &i64| *n >= 10).unwrap())
        .unwrap();
    first_match
        .add_transition(Transition::always(&first_match, &any).unwrap())
        .unwrap();

    let successors = first_match.evaluate_transitions(&AnyValue::new(3_i64)).unwrap();
    assert_eq!(successors.len(), 1);
    assert_eq!(successors[0].node_id, small.id());

    let successors = first_match.evaluate_transitions(&AnyValue::new(30_i64)).unwrap();
    assert_eq!(successors.len(), 1);
    assert_eq!(successors[0].node_id, large.id());

    let mut parallel = int_node("fan").with_parallel_transitions();
    parallel
        .add_transition(Transition::new(&parallel, &small, |n: &i64| *n < 10).unwrap())
        .unwrap();
    parallel
        .add_transition(Transition::new(&parallel, &large, |n: &i64| *n >= 10).unwrap())
        .unwrap();
    parallel
        .add_transition(Transition::always(&parallel, &any).unwrap())
        .unwrap();

    let targets: Vec<_> = parallel
        .evaluate_transitions(&AnyValue::new(3_i64))
        .unwrap()
        .into_iter()
        .map(|s| s.node_id)
        .collect();
    assert_eq!(targets, vec![small.id(), any.id()]);
}

#[test]
fn test_dead_end_never_routes() {
    let next = int_node("next");
    let mut end = int_node("end");
    end.add_transition(Transition::always(&end, &next).unwrap()).unwrap();
    let end = end.dead_end();
    assert!(end.evaluate_transitions(&AnyValue::new(1_i64)).unwrap().is_empty());
}

#[test]
fn test_transition_from_other_node_is_rejected() {
    let a = int_node("a");
    let b = int_node("b");
    let mut c = int_node("c");
    let err = c.add_transition(Transition::always(&a, &b).unwrap()).unwrap_err();
    assert!(matches!(err, ContractError::IncompatibleTransition { .. }));
}

#[tokio::test]
async fn test_erased_invocation_round_trip() {
    init_tracing();
    let node = StateNode::new(Length);
    assert_eq!(node.name(), "Length");
    assert_eq!(node.output_type().short_name(), "usize");

    let ctx = NodeContext::detached();
    let value = node
        .invoke(vec![AnyValue::new("four".to_string())], &ctx)
        .await
        .unwrap();
    assert_eq!(value.take::<usize>().unwrap(), 4);
    assert_eq!(ctx.take_logs(), vec!["measuring 'four'".to_string()]);
    assert!(ctx.take_logs().is_empty());
}

#[tokio::test]
async fn test_erased_invocation_rejects_bad_input() {
    let node = StateNode::new(Length);
    let ctx = NodeContext::detached();

    let err = node.invoke(vec![AnyValue::new(4_i64)], &ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::InvalidInputType { .. }));

    let err = node.invoke(Vec::new(), &ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::InvalidInput(_)));

    let two = vec![AnyValue::new("a".to_string()), AnyValue::new("b".to_string())];
    let err = node.invoke(two, &ctx).await.unwrap_err();
    assert!(matches!(err, NodeError::InvalidInput(_)));
}

#[tokio::test]
async fn test_combining_node_receives_every_input() {
    let node = StateNode::combining(Concat);
    assert!(node.combines_input());
    let ctx = NodeContext::detached();
    let inputs = vec![
        AnyValue::new("a".to_string()),
        AnyValue::new("b".to_string()),
        AnyValue::new("c".to_string()),
    ];
    let value = node.invoke(inputs, &ctx).await.unwrap();
    assert_eq!(value.take::<String>().unwrap(), "a+b+c");
}

#[tokio::test]
async fn test_properties_update_is_atomic() {
    let properties = RuntimeProperties::new();
    let mut handles = Vec::new();
    for _ in 0..50 {
        let properties = properties.clone();
        handles.push(tokio::spawn(async move {
            properties.update("hits", 0_u64, |n| n + 1).await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert_eq!(properties.get::<u64>("hits").await, Some(50));
}

#[tokio::test]
async fn test_properties_are_typed() {
    let properties = RuntimeProperties::new();
    assert!(properties.is_empty().await);
    properties.insert("name", "machine".to_string()).await;
    properties.insert("count", 3_i32).await;

    assert_eq!(properties.get::<String>("name").await.as_deref(), Some("machine"));
    assert_eq!(properties.get::<i64>("count").await, None);
    assert_eq!(properties.keys().await, vec!["count".to_string(), "name".to_string()]);

    let previous = properties.insert("count", 4_i32).await.unwrap();
    assert_eq!(previous.take::<i32>().unwrap(), 3);
    assert!(properties.remove("name").await.is_some());
    assert!(!properties.contains("name").await);
    assert_eq!(properties.len().await, 1);
}

#[tokio::test]
async fn test_properties_hand_out_opaque_values() {
    let properties = RuntimeProperties::new();
    properties.insert("limit", 8_u32).await;

    let value = properties.get_value("limit").await.unwrap();
    assert_eq!(value.downcast_ref::<u32>(), Some(&8));
    assert!(value.downcast_ref::<u64>().is_none());
    assert!(properties.get_value("missing").await.is_none());
}

#[test]
fn test_expect_value_checks_the_wrapped_type() {
    assert_eq!(statecore::bridge::expect_value::<i64>(AnyValue::new(5_i64)).unwrap(), 5);

    let err = statecore::bridge::expect_value::<i64>(AnyValue::new("five".to_string())).unwrap_err();
    assert!(matches!(err, ContractError::TypeMismatch { .. }));
}

#[test]
fn test_zero_node_budget_is_raised_to_one() {
    let node = StateNode::new(FnNode::new(|n: i64| Ok::<_, NodeError>(n)));
    assert_eq!(node.clone().with_max_reruns(0).max_reruns(), Some(1));
    assert_eq!(node.with_max_reruns(4).max_reruns(), Some(4));
}

#[tokio::test]
async fn test_event_bus_fans_out() {
    let bus = EventBus::new(16);
    let mut first = bus.subscribe();
    let mut second = bus.subscribe();
    let run_id = Uuid::new_v4();
    bus.emit(&MachineEvent::Tick {
        run_id,
        tick: 1,
        active: 2,
        timestamp: chrono::Utc::now(),
    });

    for rx in [&mut first, &mut second] {
        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), "Tick");
        assert_eq!(event.run_id(), run_id);
    }
}

#[test]
fn test_events_serialize_with_type_tag() {
    let event = MachineEvent::RunCancelled {
        run_id: Uuid::new_v4(),
        ticks: 4,
        timestamp: chrono::Utc::now(),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "RunCancelled");
    assert_eq!(json["ticks"], 4);
}

#[test]
fn test_closures_are_sinks() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let record = Arc::clone(&seen);
    let sink: Arc<dyn EventSink> = Arc::new(move |event: &MachineEvent| {
        record.lock().unwrap().push(event.kind());
    });
    sink.emit(&MachineEvent::RunFailed {
        run_id: Uuid::new_v4(),
        error: "boom".to_string(),
        timestamp: chrono::Utc::now(),
    });
    NoopSink.emit(&MachineEvent::RunFailed {
        run_id: Uuid::new_v4(),
        error: "ignored".to_string(),
        timestamp: chrono::Utc::now(),
    });
    assert_eq!(*seen.lock().unwrap(), vec!["RunFailed"]);
}
