mod base;

pub use base::{EventBus, EventSink, MachineEvent, NoopSink, RunId};
