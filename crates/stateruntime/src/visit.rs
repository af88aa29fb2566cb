use crate::emitter::RunEmitter;
use statecore::{EngineError, NodeId, Process, ProcessResult};

/// Per-tick buffers of one node: the processes that entered it and the
/// results it produced. Lives for a single tick, so the node itself stays
/// stateless between runs.
pub(crate) struct NodeVisit {
    node_id: NodeId,
    pending: Vec<Process>,
    outputs: Vec<ProcessResult>,
    was_invoked: bool,
}

impl NodeVisit {
    pub(crate) fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            pending: Vec::new(),
            outputs: Vec::new(),
            was_invoked: false,
        }
    }

    pub(crate) fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub(crate) fn enter(&mut self, process: Process, events: &RunEmitter) {
        events.node_entered(self.node_id, process.id(), process.attempt());
        self.pending.push(process);
    }

    /// Split the buffered processes into invocations: one per process, or a
    /// single one holding everything when the node combines input.
    pub(crate) fn take_invocations(&mut self, combine_input: bool) -> Result<Vec<Vec<Process>>, EngineError> {
        if self.pending.is_empty() {
            return Err(EngineError::IllegalState(format!(
                "node {} invoked with no buffered input",
                self.node_id
            )));
        }
        self.was_invoked = true;
        let pending = std::mem::take(&mut self.pending);
        if combine_input {
            Ok(vec![pending])
        } else {
            Ok(pending.into_iter().map(|p| vec![p]).collect())
        }
    }

    /// Processes that entered but were never dispatched.
    pub(crate) fn take_pending(&mut self) -> Vec<Process> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn was_invoked(&self) -> bool {
        self.was_invoked
    }

    pub(crate) fn record_output(&mut self, result: ProcessResult) {
        self.outputs.push(result);
    }

    pub(crate) fn outputs(&self) -> &[ProcessResult] {
        &self.outputs
    }

    pub(crate) fn exit(mut self, events: &RunEmitter) {
        self.pending.clear();
        self.outputs.clear();
        events.node_exited(self.node_id);
    }
}
