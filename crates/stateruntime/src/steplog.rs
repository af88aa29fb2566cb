use serde::Serialize;
use statecore::{NodeId, ProcessId};

/// One process invoked during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepEntry {
    pub process_id: ProcessId,
    pub node_id: NodeId,
    pub node_name: String,
    pub attempt: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub invoked: Vec<StepEntry>,
}

/// Append-only record of what each tick invoked. Diagnostic only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepLog {
    ticks: Vec<TickSnapshot>,
}

impl StepLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tick: u64, invoked: Vec<StepEntry>) {
        self.ticks.push(TickSnapshot { tick, invoked });
    }

    pub fn ticks(&self) -> &[TickSnapshot] {
        &self.ticks
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    pub fn clear(&mut self) {
        self.ticks.clear();
    }

    /// How many times `node` was invoked over the whole log.
    pub fn invocations_of(&self, node: NodeId) -> usize {
        self.ticks
            .iter()
            .flat_map(|t| t.invoked.iter())
            .filter(|e| e.node_id == node)
            .count()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
