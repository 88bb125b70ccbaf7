//! Worker primitives shared by background subsystems: an explicitly passed
//! runtime handle, task classification for tracing, generation ids and
//! cooperative cancellation.

mod class;
mod runtime;
mod token;

pub use class::TaskClass;
pub use runtime::WorkerRuntime;
pub use token::{CancelSignal, Cancelled, GenerationClock};
