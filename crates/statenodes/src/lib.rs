//! Standard node library
//!
//! Stock nodes for common conversions, arithmetic, timing and debugging.

mod arithmetic;
mod debug;
mod time;
mod transform;

pub use arithmetic::{FormatIntNode, ParseIntNode, ScaleNode, SumNode};
pub use debug::DebugNode;
pub use time::DelayNode;
pub use transform::{JsonParseNode, JsonStringifyNode};
