use crate::{NodeId, ProcessId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Notifications emitted by the scheduler, in scheduling order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MachineEvent {
    RunStarted {
        run_id: RunId,
        entry: NodeId,
        timestamp: DateTime<Utc>,
    },
    Tick {
        run_id: RunId,
        tick: u64,
        active: usize,
        timestamp: DateTime<Utc>,
    },
    NodeEntered {
        run_id: RunId,
        node_id: NodeId,
        process_id: ProcessId,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    NodeInvoked {
        run_id: RunId,
        node_id: NodeId,
        node_name: String,
        invocations: usize,
        failures: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeExited {
        run_id: RunId,
        node_id: NodeId,
        timestamp: DateTime<Utc>,
    },
    NodeLog {
        run_id: RunId,
        node_id: NodeId,
        message: String,
        timestamp: DateTime<Utc>,
    },
    Retrying {
        run_id: RunId,
        node_id: NodeId,
        process_id: ProcessId,
        attempt: u32,
        error: String,
        timestamp: DateTime<Utc>,
    },
    Unrouted {
        run_id: RunId,
        node_id: NodeId,
        process_id: ProcessId,
        timestamp: DateTime<Utc>,
    },
    RunFinished {
        run_id: RunId,
        ticks: u64,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    RunCancelled {
        run_id: RunId,
        ticks: u64,
        timestamp: DateTime<Utc>,
    },
    RunFailed {
        run_id: RunId,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

impl MachineEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            MachineEvent::RunStarted { run_id, .. }
            | MachineEvent::Tick { run_id, .. }
            | MachineEvent::NodeEntered { run_id, .. }
            | MachineEvent::NodeInvoked { run_id, .. }
            | MachineEvent::NodeExited { run_id, .. }
            | MachineEvent::NodeLog { run_id, .. }
            | MachineEvent::Retrying { run_id, .. }
            | MachineEvent::Unrouted { run_id, .. }
            | MachineEvent::RunFinished { run_id, .. }
            | MachineEvent::RunCancelled { run_id, .. }
            | MachineEvent::RunFailed { run_id, .. } => *run_id,
        }
    }

    /// Short tag matching the serialized `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            MachineEvent::RunStarted { .. } => "RunStarted",
            MachineEvent::Tick { .. } => "Tick",
            MachineEvent::NodeEntered { .. } => "NodeEntered",
            MachineEvent::NodeInvoked { .. } => "NodeInvoked",
            MachineEvent::NodeExited { .. } => "NodeExited",
            MachineEvent::NodeLog { .. } => "NodeLog",
            MachineEvent::Retrying { .. } => "Retrying",
            MachineEvent::Unrouted { .. } => "Unrouted",
            MachineEvent::RunFinished { .. } => "RunFinished",
            MachineEvent::RunCancelled { .. } => "RunCancelled",
            MachineEvent::RunFailed { .. } => "RunFailed",
        }
    }
}

/// Receiver of scheduler notifications.
///
/// Called synchronously from the scheduling control flow; implementations
/// must only observe.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &MachineEvent);
}

impl<F> EventSink for F
where
    F: Fn(&MachineEvent) + Send + Sync,
{
    fn emit(&self, event: &MachineEvent) {
        self(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &MachineEvent) {}
}

/// Fan-out of events to any number of async subscribers
pub struct EventBus {
    sender: broadcast::Sender<MachineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MachineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: MachineEvent) {
        let _ = self.sender.send(event);
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: &MachineEvent) {
        self.publish(event.clone());
    }
}
