//! Core abstractions for the state engine
//!
//! This crate provides the graph data model every other component builds on:
//! typed nodes behind a type-erased vertex, conditional transitions, retryable
//! processes, the runtime property bag and the event model. It contains no
//! scheduler.

pub mod bridge;
mod error;
pub mod events;
mod node;
mod process;
mod properties;
mod status;
mod transition;
mod value;

pub use error::{ContractError, EngineError, NodeError};
pub use events::*;
pub use node::{CombiningNode, FnNode, Node, NodeContext, NodeId, StateNode, Successor};
pub use process::{Process, ProcessId, ProcessResult, DEFAULT_MAX_RERUNS};
pub use properties::RuntimeProperties;
pub use status::RunStatus;
pub use transition::{Firing, Transition};
pub use value::{AnyValue, StateData, TypeDescriptor};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
