use crate::{NodeId, RunStatus};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Contract violation: {0}")]
    Contract(#[from] ContractError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Illegal state: {0}")]
    IllegalState(String),

    #[error("Node '{node}' failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        node: String,
        attempts: u32,
        #[source]
        source: NodeError,
    },

    #[error("Transition from '{node}' to {target} failed: {reason}")]
    Transition {
        node: String,
        target: NodeId,
        reason: String,
    },

    #[error("Transition to {target} has no converter")]
    MissingConverter { target: NodeId },

    #[error("Converted value for transition to {target} read before the transition fired")]
    ConversionNotFired { target: NodeId },

    #[error("State machine must be reset before it can run again (status: {0})")]
    NotReset(RunStatus),

    #[error("Tick limit of {0} exceeded")]
    TickLimit(u64),

    #[error("Execution error: {0}")]
    Execution(String),
}

/// Failures raised by node logic. These go through the retry path.
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid input type: expected {expected}, got {actual}")]
    InvalidInputType { expected: String, actual: String },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Cancelled")]
    Cancelled,
}

impl NodeError {
    pub fn failed(msg: impl fmt::Display) -> Self {
        Self::ExecutionFailed(msg.to_string())
    }
}

/// Structural type-contract violations, detected at build or bind time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractError {
    #[error("Transition {from} -> {to} is incompatible: {reason}")]
    IncompatibleTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Entry node '{node}' accepts {found}, binding declares {expected}")]
    EntryMismatch {
        node: String,
        expected: String,
        found: String,
    },

    #[error("Exit node '{node}' produces {found}, binding declares {expected}")]
    ExitMismatch {
        node: String,
        expected: String,
        found: String,
    },

    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },
}
