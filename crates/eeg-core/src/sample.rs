//! Raw samples and per-cycle signal windows

use serde::{Deserialize, Serialize};

/// One raw reading from the acquisition source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// ADC code as reported by the device
    pub code: i32,
    /// Device timestamp in milliseconds, when the framing carries one
    pub timestamp_ms: Option<u64>,
}

impl Sample {
    /// Sample without a timestamp (binary framing)
    pub fn new(code: i32) -> Self {
        Self {
            code,
            timestamp_ms: None,
        }
    }

    /// Sample carrying a device timestamp (text framing)
    pub fn with_timestamp(code: i32, timestamp_ms: u64) -> Self {
        Self {
            code,
            timestamp_ms: Some(timestamp_ms),
        }
    }
}

/// Wire framing used by the acquisition source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// One `<timestamp_ms>,<value>` line per sample
    #[default]
    Text,
    /// Two little-endian bytes per sample, no delimiter
    Binary,
}

impl std::str::FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(Framing::Text),
            "binary" => Ok(Framing::Binary),
            other => Err(format!("unknown framing '{}', expected 'text' or 'binary'", other)),
        }
    }
}

/// First and last device timestamps covered by a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampSpan {
    pub first_ms: u64,
    pub last_ms: u64,
}

impl TimestampSpan {
    /// Span of the timestamped samples in `samples`, if any carry one
    pub fn of(samples: &[Sample]) -> Option<Self> {
        let first = samples.iter().find_map(|s| s.timestamp_ms)?;
        let last = samples.iter().rev().find_map(|s| s.timestamp_ms)?;
        Some(Self {
            first_ms: first,
            last_ms: last,
        })
    }

    pub fn duration_ms(&self) -> u64 {
        self.last_ms.saturating_sub(self.first_ms)
    }
}

/// One processing cycle's working buffer of centered voltages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalWindow {
    /// Samples in acquisition order (volts, zero-centered)
    pub samples: Vec<f64>,
    /// Sampling rate in Hz
    pub sample_rate: f64,
}

impl SignalWindow {
    pub fn new(samples: Vec<f64>, sample_rate: f64) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Window duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.samples.len() as f64 / self.sample_rate
        } else {
            0.0
        }
    }

    pub fn stats(&self) -> WindowStats {
        WindowStats::calculate(&self.samples)
    }
}

/// Basic amplitude statistics for a window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    pub mean: f64,
    pub rms: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub peak_to_peak: f64,
}

impl WindowStats {
    pub fn calculate(data: &[f64]) -> Self {
        if data.is_empty() {
            return Self {
                mean: 0.0,
                rms: 0.0,
                std_dev: 0.0,
                min: 0.0,
                max: 0.0,
                peak_to_peak: 0.0,
            };
        }

        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let rms = (data.iter().map(|x| x * x).sum::<f64>() / n).sqrt();
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;

        let min = data.iter().fold(f64::INFINITY, |a, &b| a.min(b));
        let max = data.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));

        Self {
            mean,
            rms,
            std_dev: variance.sqrt(),
            min,
            max,
            peak_to_peak: max - min,
        }
    }

    /// True when every sample has the same value
    pub fn is_flat(&self) -> bool {
        self.peak_to_peak == 0.0
    }
}
