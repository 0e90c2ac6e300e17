//! One processing cycle: snapshot → convert → sanitize → filter → spectrum → bands

use crate::artifacts::ArtifactSanitizer;
use crate::band_power::{BandPowerAggregator, BandPowerMap};
use crate::config::{FilterMode, MonitorConfig};
use crate::filters::FilterBank;
use crate::metrics::{CycleMetrics, CycleTimer};
use crate::spectral::{SpectralEstimator, SpectralPeak, Spectrum};
use crate::units::UnitConverter;
use eeg_core::{EegResult, Sample, SampleRingBuffer, SignalWindow, TimestampSpan, WindowStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Everything one cycle hands to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleOutput {
    /// Zero-based index of the completed cycle
    pub cycle: u64,
    pub filtered: SignalWindow,
    pub spectrum: Spectrum,
    pub band_powers: BandPowerMap,
    pub peak: Option<SpectralPeak>,
    pub artifacts_repaired: usize,
    /// Device timestamps covered by the window, when the framing carries them
    pub timestamp_span: Option<TimestampSpan>,
    pub metrics: CycleMetrics,
}

/// Stages of the per-cycle computation, built once per configuration
#[derive(Debug)]
pub struct Pipeline {
    sample_rate: f64,
    window_len: usize,
    filter_mode: FilterMode,
    converter: UnitConverter,
    sanitizer: ArtifactSanitizer,
    filters: Arc<FilterBank>,
    estimator: SpectralEstimator,
    aggregator: BandPowerAggregator,
    cycles_completed: u64,
}

impl Pipeline {
    /// Validate `config` and design every stage
    pub fn new(config: &MonitorConfig) -> EegResult<Self> {
        config.validate()?;
        let filters = Arc::new(FilterBank::design(config)?);
        Self::with_filters(config, filters)
    }

    /// Build around an already designed filter bank
    pub fn with_filters(config: &MonitorConfig, filters: Arc<FilterBank>) -> EegResult<Self> {
        config.validate()?;

        info!(
            sample_rate = config.sample_rate,
            window = config.buffer_capacity,
            filters = filters.len(),
            mode = ?config.filter_mode,
            method = ?config.spectral_method,
            "processing pipeline ready"
        );

        Ok(Self {
            sample_rate: config.sample_rate,
            window_len: config.buffer_capacity,
            filter_mode: config.filter_mode,
            converter: UnitConverter::from_config(&config.adc)?,
            sanitizer: ArtifactSanitizer::new(config.artifact_threshold),
            filters,
            estimator: SpectralEstimator::new(config.spectral_method, config.sample_rate),
            aggregator: BandPowerAggregator::new(
                config.frequency_bands.clone(),
                config.band_reduction,
            ),
            cycles_completed: 0,
        })
    }

    /// Samples required before a cycle may run
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn filters(&self) -> &Arc<FilterBank> {
        &self.filters
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Run a cycle over the buffer contents, or `None` while it is still filling
    pub fn run_cycle(&mut self, buffer: &SampleRingBuffer) -> Option<CycleOutput> {
        let samples = buffer.snapshot();
        if samples.len() < self.window_len {
            trace!(have = samples.len(), need = self.window_len, "buffer not full, skipping cycle");
            return None;
        }
        Some(self.process_samples(&samples))
    }

    /// Run every stage over `samples` in order
    pub fn process_samples(&mut self, samples: &[Sample]) -> CycleOutput {
        let mut timer = CycleMetrics::start_timing();
        timer.set_window_len(samples.len());

        let mut volts = self.converter.convert(samples);
        timer.stage("convert");

        let artifacts_repaired = self.sanitizer.sanitize(&mut volts);
        timer.stage("sanitize");

        // A constant window has no content in any pass band
        let filtered = if WindowStats::calculate(&volts).is_flat() {
            trace!("flat window, filters bypassed");
            vec![0.0; volts.len()]
        } else {
            self.filters.apply(&volts, self.filter_mode)
        };
        timer.stage("filter");

        let spectrum = self.estimator.estimate(&filtered);
        timer.stage("spectrum");

        let band_powers = self.aggregator.aggregate(&spectrum);
        timer.stage("bands");

        let output =
            self.finish_cycle(samples, filtered, spectrum, band_powers, artifacts_repaired, timer);
        debug!(
            cycle = output.cycle,
            artifacts = output.artifacts_repaired,
            peak_hz = output.peak.map(|p| p.frequency),
            took_us = output.metrics.processing_time_us,
            "cycle complete"
        );
        output
    }

    fn finish_cycle(
        &mut self,
        samples: &[Sample],
        filtered: Vec<f64>,
        spectrum: Spectrum,
        band_powers: BandPowerMap,
        artifacts_repaired: usize,
        timer: CycleTimer,
    ) -> CycleOutput {
        let cycle = self.cycles_completed;
        self.cycles_completed += 1;

        CycleOutput {
            cycle,
            filtered: SignalWindow::new(filtered, self.sample_rate),
            peak: spectrum.peak(),
            spectrum,
            band_powers,
            artifacts_repaired,
            timestamp_span: TimestampSpan::of(samples),
            metrics: timer.finish(),
        }
    }
}
