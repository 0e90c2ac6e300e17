//! EEG-Monitor: runtime service for the streaming EEG monitor
//!
//! [`MonitorService`] wires an acquisition source to the processing
//! [`Pipeline`](eeg_processing::Pipeline): samples are pushed from a
//! blocking thread into the shared ring buffer while a timer-driven task
//! runs one cycle per interval and broadcasts the results.

pub mod cli;
pub mod service;

pub use service::{
    AcquisitionEnd, MonitorContext, MonitorHandle, MonitorReport, MonitorService, MonitorStats,
    OUTPUT_CHANNEL_CAPACITY,
};
