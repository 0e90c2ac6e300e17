//! EEG-Core: Foundation types for the streaming EEG monitor
//!
//! Raw samples, per-cycle signal windows, the bounded sample history shared
//! between the acquisition and processing contexts, and the error taxonomy.

pub mod error;
pub mod ring_buffer;
pub mod sample;

pub use error::{EegError, EegResult};
pub use ring_buffer::{BufferMetrics, SampleRingBuffer};
pub use sample::{Framing, Sample, SignalWindow, TimestampSpan, WindowStats};
