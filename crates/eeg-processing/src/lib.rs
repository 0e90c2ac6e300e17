//! EEG-Processing: per-cycle signal processing for the streaming monitor
//!
//! Raw codes are converted to centered voltages, artifacts are repaired,
//! line noise and out-of-band content are filtered away, and the window is
//! reduced to a spectrum and relative band powers.

pub mod artifacts;
pub mod band_power;
pub mod config;
pub mod filters;
pub mod metrics;
pub mod pipeline;
pub mod spectral;
pub mod units;

pub use artifacts::ArtifactSanitizer;
pub use band_power::{BandPower, BandPowerAggregator, BandPowerMap, BandReduction};
pub use config::{
    AdcConfig, BandPassConfig, FilterMode, FrequencyBand, MonitorConfig, NotchConfig,
    SpectralMethod,
};
pub use filters::{FilterBank, FilterKind, FilterSpec};
pub use metrics::{CycleMetrics, CycleTimer};
pub use pipeline::{CycleOutput, Pipeline};
pub use spectral::{SpectralEstimator, Spectrum, SpectrumKind, SpectralPeak};
pub use units::UnitConverter;
