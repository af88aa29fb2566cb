//! State machine runtime
//!
//! This crate provides the graph container, the tick-driven scheduler that
//! drives a graph to completion, the typed binding with submission-ordered
//! batch runs, and text diagram export.

mod config;
pub mod diagram;
mod emitter;
mod graph;
mod machine;
mod steplog;
mod typed;
mod visit;

pub use config::MachineConfig;
pub use graph::{GraphWarning, StateGraph};
pub use machine::{RunSummary, StateMachine};
pub use steplog::{StepEntry, StepLog, TickSnapshot};
pub use typed::TypedStateMachine;
