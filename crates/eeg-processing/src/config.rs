//! Configuration management for the monitor pipeline

use crate::band_power::BandReduction;
use eeg_core::{EegError, EegResult, Framing};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Sampling rate in Hz
    pub sample_rate: f64,
    /// Raw samples retained; also the analysis window length
    pub buffer_capacity: usize,
    pub band_pass: BandPassConfig,
    pub notch: NotchConfig,
    /// Absolute voltage beyond which a sample is treated as an artifact
    pub artifact_threshold: f64,
    pub adc: AdcConfig,
    pub frequency_bands: Vec<FrequencyBand>,
    /// Cadence of processing cycles in milliseconds
    pub processing_interval_ms: u64,
    pub filter_mode: FilterMode,
    pub spectral_method: SpectralMethod,
    pub band_reduction: BandReduction,
    pub framing: Framing,
}

/// Butterworth band-pass definition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPassConfig {
    pub low: f64,
    pub high: f64,
    pub order: usize,
}

/// Line-noise rejection: one notch per frequency, all sharing a quality factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotchConfig {
    pub frequencies: Vec<f64>,
    pub quality_factor: f64,
}

/// Raw-code-to-voltage parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdcConfig {
    pub max_code: i32,
    pub reference_voltage: f64,
    pub bias_voltage: f64,
}

/// Named half-open frequency interval `[low, high)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub name: String,
    pub low: f64,
    pub high: f64,
}

/// How designed filters are run over a window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Single forward pass; introduces group delay
    #[default]
    Causal,
    /// Forward and backward passes; needs the whole window in memory
    ZeroPhase,
}

/// Spectral estimation algorithm
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SpectralMethod {
    /// Hann-windowed FFT magnitude over the whole window
    #[default]
    Fft,
    /// Averaged periodograms of overlapping segments
    Welch {
        segment_length: usize,
        /// Overlap between consecutive segments, in samples
        overlap: usize,
    },
}

impl SpectralMethod {
    /// Welch with 50% overlap
    pub fn welch(segment_length: usize) -> Self {
        SpectralMethod::Welch {
            segment_length,
            overlap: segment_length / 2,
        }
    }
}

impl FrequencyBand {
    pub fn new(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            low,
            high,
        }
    }

    #[inline]
    pub fn contains(&self, frequency: f64) -> bool {
        frequency >= self.low && frequency < self.high
    }

    /// Delta, Theta, Alpha and Beta
    pub fn eeg_defaults() -> Vec<Self> {
        vec![
            Self::new("Delta", 0.5, 4.0),
            Self::new("Theta", 4.0, 8.0),
            Self::new("Alpha", 8.0, 12.0),
            Self::new("Beta", 12.0, 30.0),
        ]
    }

    /// Default bands plus Gamma (30-50 Hz)
    pub fn with_gamma() -> Vec<Self> {
        let mut bands = Self::eeg_defaults();
        bands.push(Self::new("Gamma", 30.0, 50.0));
        bands
    }
}

impl Default for BandPassConfig {
    fn default() -> Self {
        Self {
            low: 0.5,
            high: 50.0,
            order: 4,
        }
    }
}

impl Default for NotchConfig {
    fn default() -> Self {
        Self {
            frequencies: vec![50.0, 100.0],
            quality_factor: 30.0,
        }
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        // 12-bit converter on a 5 V reference, centered at mid-scale
        Self {
            max_code: 4095,
            reference_voltage: 5.0,
            bias_voltage: 2.5,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::mains_50hz()
    }
}

/// Preset configurations for common scenarios
impl MonitorConfig {
    /// Regions with 50 Hz mains: notches at 50 and 100 Hz
    pub fn mains_50hz() -> Self {
        Self {
            sample_rate: 1000.0,
            buffer_capacity: 1024,
            band_pass: BandPassConfig::default(),
            notch: NotchConfig::default(),
            artifact_threshold: 2.4,
            adc: AdcConfig::default(),
            frequency_bands: FrequencyBand::eeg_defaults(),
            processing_interval_ms: 100,
            filter_mode: FilterMode::default(),
            spectral_method: SpectralMethod::default(),
            band_reduction: BandReduction::default(),
            framing: Framing::default(),
        }
    }

    /// Regions with 60 Hz mains: notches at 60 and 120 Hz
    pub fn mains_60hz() -> Self {
        Self {
            notch: NotchConfig {
                frequencies: vec![60.0, 120.0],
                quality_factor: 30.0,
            },
            ..Self::mains_50hz()
        }
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    /// Reject every setting the pipeline cannot start with
    pub fn validate(&self) -> EegResult<()> {
        if !(self.sample_rate > 0.0) || !self.sample_rate.is_finite() {
            return Err(EegError::config("Sample rate must be positive"));
        }

        if self.buffer_capacity < 2 {
            return Err(EegError::config("Buffer capacity must be at least 2 samples"));
        }

        let nyquist = self.nyquist();
        let bp = &self.band_pass;
        if bp.order == 0 {
            return Err(EegError::filter("Band-pass order must be at least 1"));
        }
        if !(bp.low > 0.0 && bp.low < bp.high && bp.high < nyquist) {
            return Err(EegError::filter(format!(
                "Band-pass cutoffs must satisfy 0 < low < high < {} Hz, got {}..{}",
                nyquist, bp.low, bp.high
            )));
        }

        if !(self.notch.quality_factor > 0.0) {
            return Err(EegError::filter("Notch quality factor must be positive"));
        }
        for &freq in &self.notch.frequencies {
            if !(freq > 0.0 && freq < nyquist) {
                return Err(EegError::filter(format!(
                    "Notch frequency {} Hz outside (0, {}) Hz",
                    freq, nyquist
                )));
            }
        }

        if !(self.artifact_threshold > 0.0) {
            return Err(EegError::config("Artifact threshold must be positive"));
        }

        if self.adc.max_code <= 0 {
            return Err(EegError::config("ADC max code must be positive"));
        }

        for band in &self.frequency_bands {
            if band.name.is_empty() {
                return Err(EegError::config("Frequency band name must not be empty"));
            }
            if !(band.low >= 0.0 && band.low < band.high) {
                return Err(EegError::config(format!(
                    "Frequency band '{}' must satisfy 0 <= low < high, got {}..{}",
                    band.name, band.low, band.high
                )));
            }
        }
        for (i, band) in self.frequency_bands.iter().enumerate() {
            if self.frequency_bands[..i].iter().any(|b| b.name == band.name) {
                return Err(EegError::config(format!(
                    "Frequency band '{}' defined twice",
                    band.name
                )));
            }
        }

        if self.processing_interval_ms == 0 {
            return Err(EegError::config("Processing interval must be greater than 0"));
        }

        if let SpectralMethod::Welch {
            segment_length,
            overlap,
        } = self.spectral_method
        {
            if segment_length < 2 {
                return Err(EegError::config("Welch segment length must be at least 2"));
            }
            if overlap >= segment_length {
                return Err(EegError::config(format!(
                    "Welch overlap {} must be smaller than segment length {}",
                    overlap, segment_length
                )));
            }
        }

        Ok(())
    }

    /// Export configuration to JSON
    pub fn to_json(&self) -> EegResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EegError::Serialization {
            message: format!("Failed to serialize configuration: {}", e),
        })
    }

    /// Import configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> EegResult<Self> {
        serde_json::from_str(json).map_err(|e| EegError::Serialization {
            message: format!("Failed to deserialize configuration: {}", e),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> EegResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            EegError::config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }
}
