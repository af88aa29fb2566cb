use serde::{Deserialize, Serialize};
use statecore::{EngineError, DEFAULT_MAX_RERUNS};
use std::path::Path;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Configuration for a state machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Invocations allowed in flight at once, engine-wide
    pub max_concurrency: usize,

    /// Retry budget for processes whose node sets none
    pub max_reruns: u32,

    /// Keep a per-tick log of invoked processes
    pub record_steps: bool,

    /// Capacity of the broadcast event bus
    pub event_buffer_size: usize,

    /// Abort the run after this many ticks
    pub max_ticks: Option<u64>,

    /// Fail an invocation that runs longer than this
    pub invocation_timeout_ms: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 20,
            max_reruns: DEFAULT_MAX_RERUNS,
            record_steps: false,
            event_buffer_size: 1000,
            max_ticks: None,
            invocation_timeout_ms: None,
        }
    }
}

impl MachineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfiguration(format!("config parse error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidConfiguration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_concurrency == 0 {
            return Err(EngineError::InvalidConfiguration(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency > Semaphore::MAX_PERMITS {
            return Err(EngineError::InvalidConfiguration(format!(
                "max_concurrency must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.max_reruns == 0 {
            return Err(EngineError::InvalidConfiguration(
                "max_reruns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_max_reruns(mut self, max_reruns: u32) -> Self {
        self.max_reruns = max_reruns;
        self
    }

    pub fn with_step_log(mut self) -> Self {
        self.record_steps = true;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    pub fn with_invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Permits for a new concurrency gate. Clamped so building a gate never
    /// panics; out-of-range values are still rejected by `validate` before a run.
    pub(crate) fn gate_permits(&self) -> usize {
        self.max_concurrency.clamp(1, Semaphore::MAX_PERMITS)
    }

    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout_ms.map(Duration::from_millis)
    }
}
