use chrono::Utc;
use statecore::{EventSink, MachineEvent, NodeId, ProcessId, RunId};
use std::sync::Arc;
use std::time::Duration;

/// Stamps events with the run id and a timestamp before handing them to the sink.
#[derive(Clone)]
pub(crate) struct RunEmitter {
    run_id: RunId,
    sink: Arc<dyn EventSink>,
}

impl RunEmitter {
    pub(crate) fn new(run_id: RunId, sink: Arc<dyn EventSink>) -> Self {
        Self { run_id, sink }
    }

    fn emit(&self, event: MachineEvent) {
        self.sink.emit(&event);
    }

    pub(crate) fn run_started(&self, entry: NodeId) {
        self.emit(MachineEvent::RunStarted {
            run_id: self.run_id,
            entry,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn tick(&self, tick: u64, active: usize) {
        self.emit(MachineEvent::Tick {
            run_id: self.run_id,
            tick,
            active,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn node_entered(&self, node_id: NodeId, process_id: ProcessId, attempt: u32) {
        self.emit(MachineEvent::NodeEntered {
            run_id: self.run_id,
            node_id,
            process_id,
            attempt,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn node_invoked(
        &self,
        node_id: NodeId,
        node_name: &str,
        invocations: usize,
        failures: usize,
        duration: Duration,
    ) {
        self.emit(MachineEvent::NodeInvoked {
            run_id: self.run_id,
            node_id,
            node_name: node_name.to_string(),
            invocations,
            failures,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn node_exited(&self, node_id: NodeId) {
        self.emit(MachineEvent::NodeExited {
            run_id: self.run_id,
            node_id,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn node_log(&self, node_id: NodeId, message: String) {
        self.emit(MachineEvent::NodeLog {
            run_id: self.run_id,
            node_id,
            message,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn retrying(&self, node_id: NodeId, process_id: ProcessId, attempt: u32, error: String) {
        self.emit(MachineEvent::Retrying {
            run_id: self.run_id,
            node_id,
            process_id,
            attempt,
            error,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn unrouted(&self, node_id: NodeId, process_id: ProcessId) {
        self.emit(MachineEvent::Unrouted {
            run_id: self.run_id,
            node_id,
            process_id,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn run_finished(&self, ticks: u64, duration: Duration) {
        self.emit(MachineEvent::RunFinished {
            run_id: self.run_id,
            ticks,
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn run_cancelled(&self, ticks: u64) {
        self.emit(MachineEvent::RunCancelled {
            run_id: self.run_id,
            ticks,
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn run_failed(&self, error: String) {
        self.emit(MachineEvent::RunFailed {
            run_id: self.run_id,
            error,
            timestamp: Utc::now(),
        });
    }
}
