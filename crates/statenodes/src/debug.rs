use async_trait::async_trait;
use statecore::{Node, NodeContext, NodeError, StateData};
use std::fmt::Debug;
use std::marker::PhantomData;

/// Pass-through node that logs every value it sees
pub struct DebugNode<T> {
    label: String,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T> DebugNode<T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: StateData + Debug> Node for DebugNode<T> {
    type Input = T;
    type Output = T;

    fn name(&self) -> String {
        format!("debug.{}", self.label)
    }

    async fn invoke(&self, input: T, ctx: &NodeContext) -> Result<T, NodeError> {
        tracing::debug!("[{}] {:?}", self.label, input);
        ctx.log(format!("DEBUG [{}]: {:?}", self.label, input));
        Ok(input)
    }
}
