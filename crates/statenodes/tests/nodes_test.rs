// crates/statenodes/tests/nodes_test.rs

use statecore::{CombiningNode, Node, NodeContext, NodeError, StateNode};
use statenodes::{
    DebugNode, DelayNode, FormatIntNode, JsonParseNode, JsonStringifyNode, ParseIntNode, ScaleNode,
    SumNode,
};
use std::time::Duration;

#[tokio::test]
async fn test_parse_int_trims_whitespace() {
    let ctx = NodeContext::detached();
    let value = ParseIntNode.invoke(" 42\n".to_string(), &ctx).await.unwrap();
    assert_eq!(value, 42);
}

#[tokio::test]
async fn test_parse_int_rejects_text() {
    let ctx = NodeContext::detached();
    let result = ParseIntNode.invoke("forty-two".to_string(), &ctx).await;
    assert!(matches!(result, Err(NodeError::InvalidInput(_))));
}

#[tokio::test]
async fn test_scale_reports_overflow() {
    let ctx = NodeContext::detached();
    assert_eq!(ScaleNode::doubling().invoke(21, &ctx).await.unwrap(), 42);

    let result = ScaleNode::new(2).invoke(i64::MAX, &ctx).await;
    assert!(matches!(result, Err(NodeError::ExecutionFailed(_))));
}

#[tokio::test]
async fn test_format_int() {
    let ctx = NodeContext::detached();
    assert_eq!(FormatIntNode.invoke(-7, &ctx).await.unwrap(), "-7");
}

#[tokio::test]
async fn test_sum_combines_and_logs() {
    let ctx = NodeContext::detached();
    let total = SumNode.invoke_all(vec![3, 4, 5], &ctx).await.unwrap();
    assert_eq!(total, 12);
    assert_eq!(ctx.take_logs(), vec!["Summing 3 value(s)".to_string()]);
}

#[tokio::test]
async fn test_json_parse_and_stringify() {
    let ctx = NodeContext::detached();
    let value = JsonParseNode
        .invoke(r#"{"answer": 42}"#.to_string(), &ctx)
        .await
        .unwrap();
    assert_eq!(value["answer"], 42);

    let text = JsonStringifyNode.invoke(value, &ctx).await.unwrap();
    assert!(text.contains("\"answer\": 42"));

    let broken = JsonParseNode.invoke("{".to_string(), &ctx).await;
    assert!(matches!(broken, Err(NodeError::ExecutionFailed(_))));
}

#[tokio::test]
async fn test_debug_node_passes_value_through() {
    let ctx = NodeContext::detached();
    let node = DebugNode::<Vec<i64>>::new("tap");
    let value = node.invoke(vec![1, 2], &ctx).await.unwrap();
    assert_eq!(value, vec![1, 2]);
    assert_eq!(node.name(), "debug.tap");
    assert_eq!(ctx.take_logs(), vec!["DEBUG [tap]: [1, 2]".to_string()]);
}

#[tokio::test]
async fn test_delay_node_waits() {
    let ctx = NodeContext::detached();
    let node = DelayNode::<String>::from_millis(20);
    let started = std::time::Instant::now();
    let value = node.invoke("late".to_string(), &ctx).await.unwrap();
    assert_eq!(value, "late");
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[tokio::test]
async fn test_delay_node_observes_cancellation() {
    let ctx = NodeContext::detached();
    let node = DelayNode::<i64>::new(Duration::from_secs(30));
    let token = ctx.cancellation.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();
    });
    let result = node.invoke(1, &ctx).await;
    assert!(matches!(result, Err(NodeError::Cancelled)));
}

#[test]
fn test_stock_nodes_declare_types() {
    let parse = StateNode::new(ParseIntNode);
    assert_eq!(parse.input_type().short_name(), "String");
    assert_eq!(parse.output_type().short_name(), "i64");

    let sum = StateNode::combining(SumNode);
    assert!(sum.combines_input());
    assert_eq!(sum.name(), "math.sum");
}
