use async_trait::async_trait;
use statecore::{CombiningNode, Node, NodeContext, NodeError};

/// Parse decimal text into an integer
pub struct ParseIntNode;

#[async_trait]
impl Node for ParseIntNode {
    type Input = String;
    type Output = i64;

    fn name(&self) -> String {
        "math.parse_int".to_string()
    }

    async fn invoke(&self, input: String, _ctx: &NodeContext) -> Result<i64, NodeError> {
        input
            .trim()
            .parse::<i64>()
            .map_err(|e| NodeError::InvalidInput(format!("'{}' is not an integer: {}", input, e)))
    }
}

/// Multiply by a fixed factor
pub struct ScaleNode {
    factor: i64,
}

impl ScaleNode {
    pub fn new(factor: i64) -> Self {
        Self { factor }
    }

    pub fn doubling() -> Self {
        Self::new(2)
    }
}

#[async_trait]
impl Node for ScaleNode {
    type Input = i64;
    type Output = i64;

    fn name(&self) -> String {
        format!("math.scale x{}", self.factor)
    }

    async fn invoke(&self, input: i64, _ctx: &NodeContext) -> Result<i64, NodeError> {
        input
            .checked_mul(self.factor)
            .ok_or_else(|| NodeError::ExecutionFailed(format!("{} * {} overflows", input, self.factor)))
    }
}

/// Render an integer as decimal text
pub struct FormatIntNode;

#[async_trait]
impl Node for FormatIntNode {
    type Input = i64;
    type Output = String;

    fn name(&self) -> String {
        "math.format_int".to_string()
    }

    async fn invoke(&self, input: i64, _ctx: &NodeContext) -> Result<String, NodeError> {
        Ok(input.to_string())
    }
}

/// Sum every integer that reached the node in the same tick
pub struct SumNode;

#[async_trait]
impl CombiningNode for SumNode {
    type Input = i64;
    type Output = i64;

    fn name(&self) -> String {
        "math.sum".to_string()
    }

    async fn invoke_all(&self, inputs: Vec<i64>, ctx: &NodeContext) -> Result<i64, NodeError> {
        ctx.log(format!("Summing {} value(s)", inputs.len()));
        inputs.iter().try_fold(0i64, |acc, v| {
            acc.checked_add(*v)
                .ok_or_else(|| NodeError::ExecutionFailed("sum overflows".to_string()))
        })
    }
}
