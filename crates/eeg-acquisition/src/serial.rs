//! Serial-port acquisition (feature `serial`)

use crate::{frame_reader, SampleSource};
use eeg_core::{EegError, EegResult, Framing};
use std::time::Duration;
use tracing::info;

/// Default baud rate of the acquisition firmware
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    /// Read timeout; an expired read yields `ReadOutcome::Idle`
    pub timeout: Duration,
    pub framing: Framing,
}

impl SerialSettings {
    pub fn new(port: impl Into<String>, framing: Framing) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(100),
            framing,
        }
    }
}

/// Open the port for blocking reads and wrap it in the framing's reader
pub fn open_serial(settings: &SerialSettings) -> EegResult<Box<dyn SampleSource>> {
    info!(
        port = %settings.port,
        baud = settings.baud_rate,
        framing = ?settings.framing,
        "opening serial port"
    );

    let port = tokio_serial::new(&settings.port, settings.baud_rate)
        .timeout(settings.timeout)
        .open()
        .map_err(|e| EegError::Io {
            source_name: settings.port.clone(),
            message: format!("Failed to open port: {}", e),
        })?;

    Ok(frame_reader(port, settings.framing, settings.port.clone()))
}
