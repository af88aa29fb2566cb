use async_trait::async_trait;
use statecore::{Node, NodeContext, NodeError};

/// Parse a JSON document
pub struct JsonParseNode;

#[async_trait]
impl Node for JsonParseNode {
    type Input = String;
    type Output = serde_json::Value;

    fn name(&self) -> String {
        "transform.json_parse".to_string()
    }

    async fn invoke(&self, input: String, _ctx: &NodeContext) -> Result<serde_json::Value, NodeError> {
        serde_json::from_str(&input)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON parse error: {}", e)))
    }
}

/// Render a JSON value as pretty-printed text
pub struct JsonStringifyNode;

#[async_trait]
impl Node for JsonStringifyNode {
    type Input = serde_json::Value;
    type Output = String;

    fn name(&self) -> String {
        "transform.json_stringify".to_string()
    }

    async fn invoke(&self, input: serde_json::Value, _ctx: &NodeContext) -> Result<String, NodeError> {
        serde_json::to_string_pretty(&input)
            .map_err(|e| NodeError::ExecutionFailed(format!("JSON stringify error: {}", e)))
    }
}
