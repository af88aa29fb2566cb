use crate::{AnyValue, NodeId};
use uuid::Uuid;

pub type ProcessId = Uuid;

/// Retry budget given to a process unless configured otherwise.
pub const DEFAULT_MAX_RERUNS: u32 = 3;

/// A scheduled unit of work: one input bound to one node.
#[derive(Debug, Clone)]
pub struct Process {
    id: ProcessId,
    node_id: NodeId,
    input: AnyValue,
    max_reruns: u32,
    attempt: u32,
}

impl Process {
    pub fn new(node_id: NodeId, input: AnyValue) -> Self {
        Self::with_max_reruns(node_id, input, DEFAULT_MAX_RERUNS)
    }

    pub fn with_max_reruns(node_id: NodeId, input: AnyValue, max_reruns: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id,
            input,
            max_reruns,
            attempt: 1,
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn input(&self) -> &AnyValue {
        &self.input
    }

    pub fn max_reruns(&self) -> u32 {
        self.max_reruns
    }

    /// The attempt currently scheduled; the first invocation is attempt 1.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Claim another attempt after a failed invocation.
    ///
    /// Each successful call consumes one attempt. Once `attempt` reaches
    /// `max_reruns` this returns `false` on every call.
    pub fn can_reattempt(&mut self) -> bool {
        if self.attempt < self.max_reruns {
            self.attempt += 1;
            true
        } else {
            false
        }
    }

    pub fn create_result(&self, value: AnyValue) -> ProcessResult {
        ProcessResult {
            process_id: self.id,
            node_id: self.node_id,
            value,
        }
    }
}

/// Value produced by invoking a node, traceable to its process.
#[derive(Debug, Clone)]
pub struct ProcessResult {
    process_id: ProcessId,
    node_id: NodeId,
    value: AnyValue,
}

impl ProcessResult {
    pub fn process_id(&self) -> ProcessId {
        self.process_id
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn value(&self) -> &AnyValue {
        &self.value
    }

    pub fn into_value(self) -> AnyValue {
        self.value
    }
}
