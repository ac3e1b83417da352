//! Adapters implementing endpoint ports.

pub mod memory;
mod recording;
mod tracing_observer;

pub use recording::RecordingObserver;
pub use tracing_observer::TracingObserver;
