//! Relative power inside named frequency bands

use crate::config::FrequencyBand;
use crate::spectral::Spectrum;
use serde::{Deserialize, Serialize};

/// How in-band bin powers are combined
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandReduction {
    /// Sum of bin powers; disjoint bands covering the spectrum add up to 1
    #[default]
    Sum,
    /// Mean bin power, for comparing bands of different widths
    Mean,
}

/// Power of one band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandPower {
    pub name: String,
    /// Reduced in-band power, in the spectrum's power units
    pub absolute: f64,
    /// `absolute` divided by the total power of all bins
    pub fraction: f64,
    /// Number of spectrum bins inside the band
    pub bins: usize,
}

/// Per-band powers in configuration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BandPowerMap {
    pub bands: Vec<BandPower>,
    /// Total power of every retained bin
    pub total_power: f64,
}

impl BandPowerMap {
    pub fn get(&self, name: &str) -> Option<&BandPower> {
        self.bands.iter().find(|b| b.name == name)
    }

    pub fn fraction(&self, name: &str) -> Option<f64> {
        self.get(name).map(|b| b.fraction)
    }

    /// Band with the largest fraction
    pub fn dominant(&self) -> Option<&BandPower> {
        self.bands
            .iter()
            .fold(None, |best: Option<&BandPower>, band| match best {
                Some(b) if b.fraction >= band.fraction => Some(b),
                _ => Some(band),
            })
    }

    pub fn fraction_sum(&self) -> f64 {
        self.bands.iter().map(|b| b.fraction).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.bands.iter().map(|b| (b.name.as_str(), b.fraction))
    }
}

/// Integrates spectral power over externally configured bands
#[derive(Debug, Clone, PartialEq)]
pub struct BandPowerAggregator {
    bands: Vec<FrequencyBand>,
    reduction: BandReduction,
}

impl BandPowerAggregator {
    pub fn new(bands: Vec<FrequencyBand>, reduction: BandReduction) -> Self {
        Self { bands, reduction }
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    pub fn reduction(&self) -> BandReduction {
        self.reduction
    }

    /// Band powers of `spectrum`; bands without bins get zero
    pub fn aggregate(&self, spectrum: &Spectrum) -> BandPowerMap {
        let total_power: f64 = (0..spectrum.len()).map(|i| spectrum.bin_power(i)).sum();
        let divisor = total_power.max(f64::MIN_POSITIVE);

        let bands = self
            .bands
            .iter()
            .map(|band| {
                let mut sum = 0.0;
                let mut bins = 0usize;
                for (i, &frequency) in spectrum.frequencies.iter().enumerate() {
                    if band.contains(frequency) {
                        sum += spectrum.bin_power(i);
                        bins += 1;
                    }
                }

                let absolute = match (self.reduction, bins) {
                    (_, 0) => 0.0,
                    (BandReduction::Sum, _) => sum,
                    (BandReduction::Mean, n) => sum / n as f64,
                };

                BandPower {
                    name: band.name.clone(),
                    absolute,
                    fraction: absolute / divisor,
                    bins,
                }
            })
            .collect();

        BandPowerMap { bands, total_power }
    }
}
