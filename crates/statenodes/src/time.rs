use async_trait::async_trait;
use statecore::{Node, NodeContext, NodeError, StateData};
use std::marker::PhantomData;
use tokio::time::{sleep, Duration};

/// Delay a value for a fixed duration, then pass it through
pub struct DelayNode<T> {
    delay: Duration,
    _marker: PhantomData<fn(T) -> T>,
}

impl<T> DelayNode<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            _marker: PhantomData,
        }
    }

    pub fn from_millis(delay_ms: u64) -> Self {
        Self::new(Duration::from_millis(delay_ms))
    }
}

impl<T> Default for DelayNode<T> {
    fn default() -> Self {
        Self::from_millis(1000)
    }
}

#[async_trait]
impl<T: StateData> Node for DelayNode<T> {
    type Input = T;
    type Output = T;

    fn name(&self) -> String {
        "time.delay".to_string()
    }

    async fn invoke(&self, input: T, ctx: &NodeContext) -> Result<T, NodeError> {
        ctx.log(format!("Delaying for {}ms", self.delay.as_millis()));

        tokio::select! {
            _ = sleep(self.delay) => Ok(input),
            _ = ctx.cancellation.cancelled() => Err(NodeError::Cancelled),
        }
    }
}
