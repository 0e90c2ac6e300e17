//! Synthetic EEG source for testing and demos

use crate::source::{ReadOutcome, SampleSource};
use eeg_core::{EegError, EegResult, Sample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::{Duration, Instant};
use tracing::info;

/// One sinusoidal component, amplitude in volts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SineComponent {
    pub frequency: f64,
    pub amplitude: f64,
}

impl SineComponent {
    pub fn new(frequency: f64, amplitude: f64) -> Self {
        Self {
            frequency,
            amplitude,
        }
    }
}

/// Configuration for synthetic signal generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Sampling rate in Hz
    pub sample_rate: f64,
    /// Rhythms making up the clean signal
    pub components: Vec<SineComponent>,
    /// Power-line interference
    pub line_noise: Option<SineComponent>,
    /// Gaussian noise standard deviation in volts (0.0 = no noise)
    pub noise_std: f64,
    /// Probability per sample of an artifact spike
    pub artifact_probability: f64,
    /// Spike amplitude in volts, sign chosen at random
    pub artifact_amplitude: f64,
    /// ADC full-scale code
    pub max_code: i32,
    pub reference_voltage: f64,
    pub bias_voltage: f64,
    /// Samples to produce before reporting a disconnect
    pub sample_budget: Option<u64>,
    /// Sleep so samples arrive at `sample_rate`
    pub realtime: bool,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            sample_rate: 1000.0,
            components: vec![SineComponent::new(10.0, 0.5)],
            line_noise: Some(SineComponent::new(50.0, 0.2)),
            noise_std: 0.02,
            artifact_probability: 0.0,
            artifact_amplitude: 2.5,
            max_code: 4095,
            reference_voltage: 5.0,
            bias_voltage: 2.5,
            sample_budget: None,
            realtime: false,
            seed: None,
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> EegResult<()> {
        if !(self.sample_rate > 0.0) {
            return Err(EegError::config("Synthetic sample rate must be positive"));
        }
        if self.max_code <= 0 {
            return Err(EegError::config("Synthetic ADC max code must be positive"));
        }
        if !(self.reference_voltage > 0.0) {
            return Err(EegError::config("Synthetic reference voltage must be positive"));
        }
        if !(self.noise_std.is_finite() && self.noise_std >= 0.0) {
            return Err(EegError::config(
                "Noise standard deviation must be finite and non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&self.artifact_probability) {
            return Err(EegError::config("Artifact probability must lie in [0, 1]"));
        }
        Ok(())
    }
}

/// Deterministic (when seeded) generator of raw ADC samples
#[derive(Debug)]
pub struct SyntheticSource {
    config: SyntheticConfig,
    rng: StdRng,
    noise: Normal<f64>,
    index: u64,
    started: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> EegResult<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = Normal::new(0.0, config.noise_std).map_err(|e| {
            EegError::config(format!("Failed to create normal distribution: {}", e))
        })?;

        Ok(Self {
            config,
            rng,
            noise,
            index: 0,
            started: None,
        })
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Samples produced so far
    pub fn produced(&self) -> u64 {
        self.index
    }

    /// Clean signal plus interference, noise and spikes at sample `index`, volts
    fn voltage_at(&mut self, index: u64) -> f64 {
        let t = index as f64 / self.config.sample_rate;
        let mut volts: f64 = self
            .config
            .components
            .iter()
            .map(|c| c.amplitude * (2.0 * PI * c.frequency * t).sin())
            .sum();

        if let Some(line) = self.config.line_noise {
            volts += line.amplitude * (2.0 * PI * line.frequency * t).sin();
        }

        volts += self.noise.sample(&mut self.rng);

        let probability = self.config.artifact_probability;
        if probability > 0.0 && self.rng.gen::<f64>() < probability {
            let sign = if self.rng.gen::<bool>() { 1.0 } else { -1.0 };
            volts += sign * self.config.artifact_amplitude;
        }

        volts
    }

    /// Voltage to ADC code, saturating at the rails like a real converter
    fn encode(&self, volts: f64) -> i32 {
        let max = self.config.max_code as f64;
        let scaled = (volts + self.config.bias_voltage) / self.config.reference_voltage;
        let code = (scaled * max).round();
        code.clamp(0.0, max) as i32
    }

    /// Next sample without pacing or budget checks
    pub fn generate_sample(&mut self) -> Sample {
        let index = self.index;
        self.index += 1;

        let volts = self.voltage_at(index);
        let timestamp_ms = (index as f64 * 1000.0 / self.config.sample_rate) as u64;
        Sample::with_timestamp(self.encode(volts), timestamp_ms)
    }

    /// `count` consecutive samples
    pub fn generate(&mut self, count: usize) -> Vec<Sample> {
        (0..count).map(|_| self.generate_sample()).collect()
    }

    fn pace(&mut self) {
        let started = *self.started.get_or_insert_with(Instant::now);
        let due = started + Duration::from_secs_f64(self.index as f64 / self.config.sample_rate);
        let now = Instant::now();
        if due > now {
            std::thread::sleep(due - now);
        }
    }
}

impl SampleSource for SyntheticSource {
    fn next_sample(&mut self) -> EegResult<ReadOutcome> {
        if let Some(budget) = self.config.sample_budget {
            if self.index >= budget {
                info!(samples = self.index, "synthetic source exhausted");
                return Err(EegError::SourceDisconnected {
                    source_name: self.describe(),
                });
            }
        }

        if self.config.realtime {
            self.pace();
        }

        Ok(ReadOutcome::Sample(self.generate_sample()))
    }

    fn describe(&self) -> String {
        "synthetic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_config() -> SyntheticConfig {
        SyntheticConfig {
            noise_std: 0.0,
            line_noise: None,
            seed: Some(7),
            ..SyntheticConfig::default()
        }
    }

    #[test]
    fn test_seeded_sources_match() {
        let config = SyntheticConfig {
            seed: Some(42),
            artifact_probability: 0.05,
            ..SyntheticConfig::default()
        };
        let a = SyntheticSource::new(config.clone()).unwrap().generate(500);
        let b = SyntheticSource::new(config).unwrap().generate(500);
        assert_eq!(a, b);
    }

    #[test]
    fn test_codes_stay_in_range() {
        let config = SyntheticConfig {
            seed: Some(1),
            artifact_probability: 0.2,
            artifact_amplitude: 10.0,
            ..SyntheticConfig::default()
        };
        let samples = SyntheticSource::new(config).unwrap().generate(2000);
        assert!(samples.iter().all(|s| (0..=4095).contains(&s.code)));
        assert!(samples.iter().any(|s| s.code == 0 || s.code == 4095));
    }

    #[test]
    fn test_clean_sine_is_centered() {
        let mut source = SyntheticSource::new(quiet_config()).unwrap();
        let samples = source.generate(1000);

        // sin(0) sits at mid-scale, the 10 Hz crest at 0.5 V above it
        assert_eq!(samples[0].code, 2048);
        assert_eq!(samples[25].code, ((3.0 / 5.0) * 4095.0f64).round() as i32);
        assert_eq!(samples[999].timestamp_ms, Some(999));
    }

    #[test]
    fn test_budget_ends_with_disconnect() {
        let config = SyntheticConfig {
            sample_budget: Some(3),
            ..quiet_config()
        };
        let mut source = SyntheticSource::new(config).unwrap();
        for _ in 0..3 {
            assert!(matches!(source.next_sample().unwrap(), ReadOutcome::Sample(_)));
        }
        let err = source.next_sample().unwrap_err();
        assert!(matches!(err, EegError::SourceDisconnected { .. }));
        assert_eq!(source.produced(), 3);
    }

    #[test]
    fn test_realtime_pacing() {
        let config = SyntheticConfig {
            realtime: true,
            sample_rate: 1000.0,
            ..quiet_config()
        };
        let mut source = SyntheticSource::new(config).unwrap();
        let start = Instant::now();
        for _ in 0..51 {
            source.next_sample().unwrap();
        }
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_invalid_config() {
        let config = SyntheticConfig {
            noise_std: -1.0,
            ..SyntheticConfig::default()
        };
        assert!(SyntheticSource::new(config).unwrap_err().is_configuration());

        let config = SyntheticConfig {
            noise_std: f64::NAN,
            ..SyntheticConfig::default()
        };
        assert!(SyntheticSource::new(config).is_err());

        let config = SyntheticConfig {
            artifact_probability: 1.5,
            ..SyntheticConfig::default()
        };
        assert!(SyntheticSource::new(config).unwrap_err().is_configuration());
    }
}
