//! Spectral estimation: windowed FFT magnitude and Welch PSD

use crate::config::SpectralMethod;
use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::warn;

/// What the values of a [`Spectrum`] measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectrumKind {
    /// `|X[k]| / N` of a Hann-windowed FFT
    Magnitude,
    /// One-sided power spectral density, V²/Hz
    PowerDensity,
}

/// Largest bin of a spectrum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    pub frequency: f64,
    pub value: f64,
}

/// Non-negative frequency bins in increasing order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    pub kind: SpectrumKind,
    pub frequencies: Vec<f64>,
    pub values: Vec<f64>,
}

impl Spectrum {
    /// Result for a degenerate input window
    pub fn empty(kind: SpectrumKind) -> Self {
        Self {
            kind,
            frequencies: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Bin spacing in Hz, zero for fewer than two bins
    pub fn resolution(&self) -> f64 {
        match self.frequencies.as_slice() {
            [first, second, ..] => second - first,
            _ => 0.0,
        }
    }

    /// Power carried by bin `index`: squared magnitude or the density itself
    #[inline]
    pub fn bin_power(&self, index: usize) -> f64 {
        let value = self.values[index];
        match self.kind {
            SpectrumKind::Magnitude => value * value,
            SpectrumKind::PowerDensity => value,
        }
    }

    /// First bin holding the maximum value
    pub fn peak(&self) -> Option<SpectralPeak> {
        let mut best: Option<usize> = None;
        for (i, &value) in self.values.iter().enumerate() {
            match best {
                Some(b) if self.values[b] >= value => {}
                _ => best = Some(i),
            }
        }
        best.map(|i| SpectralPeak {
            frequency: self.frequencies[i],
            value: self.values[i],
        })
    }

    /// Value of the bin nearest to `frequency`
    pub fn value_near(&self, frequency: f64) -> Option<f64> {
        let resolution = self.resolution();
        if resolution <= 0.0 {
            return self.values.first().copied();
        }
        let index = (frequency / resolution).round();
        if index < 0.0 {
            return None;
        }
        self.values.get(index as usize).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.frequencies.iter().copied().zip(self.values.iter().copied())
    }
}

#[derive(Clone, Copy)]
enum Symmetry {
    /// Endpoints both zero, for whole-window FFTs
    Symmetric,
    /// Period of exactly N, for Welch segments
    Periodic,
}

fn hann(len: usize, symmetry: Symmetry) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    let denom = match symmetry {
        Symmetry::Symmetric => (len - 1) as f64,
        Symmetry::Periodic => len as f64,
    };
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / denom).cos())
        .collect()
}

/// Spectral estimator for filtered windows
///
/// Owns an FFT planner so plans for recurring window lengths are reused.
pub struct SpectralEstimator {
    method: SpectralMethod,
    sample_rate: f64,
    planner: RealFftPlanner<f64>,
}

impl SpectralEstimator {
    pub fn new(method: SpectralMethod, sample_rate: f64) -> Self {
        Self {
            method,
            sample_rate,
            planner: RealFftPlanner::new(),
        }
    }

    pub fn method(&self) -> SpectralMethod {
        self.method
    }

    pub fn kind(&self) -> SpectrumKind {
        match self.method {
            SpectralMethod::Fft => SpectrumKind::Magnitude,
            SpectralMethod::Welch { .. } => SpectrumKind::PowerDensity,
        }
    }

    /// Spectrum of `signal`; empty when the signal has fewer than two samples
    pub fn estimate(&mut self, signal: &[f64]) -> Spectrum {
        if signal.len() < 2 || !(self.sample_rate > 0.0) {
            return Spectrum::empty(self.kind());
        }

        match self.method {
            SpectralMethod::Fft => self.fft_magnitude(signal),
            SpectralMethod::Welch {
                segment_length,
                overlap,
            } => self.welch(signal, segment_length, overlap),
        }
    }

    /// Real FFT of `buffer` in place; `None` if the transform rejects it
    fn transform(&mut self, buffer: &mut [f64]) -> Option<Vec<num_complex::Complex<f64>>> {
        let r2c = self.planner.plan_fft_forward(buffer.len());
        let mut output = r2c.make_output_vec();
        match r2c.process(buffer, &mut output) {
            Ok(()) => Some(output),
            Err(e) => {
                warn!(error = %e, len = buffer.len(), "FFT failed");
                None
            }
        }
    }

    fn fft_magnitude(&mut self, signal: &[f64]) -> Spectrum {
        let n = signal.len();
        let window = hann(n, Symmetry::Symmetric);
        let mut buffer: Vec<f64> = signal.iter().zip(&window).map(|(x, w)| x * w).collect();

        let Some(output) = self.transform(&mut buffer) else {
            return Spectrum::empty(SpectrumKind::Magnitude);
        };

        let norm = (n as f64).max(1.0);
        let bin_width = self.sample_rate / n as f64;

        Spectrum {
            kind: SpectrumKind::Magnitude,
            frequencies: (0..output.len()).map(|k| k as f64 * bin_width).collect(),
            values: output.iter().map(|c| c.norm() / norm).collect(),
        }
    }

    fn welch(&mut self, signal: &[f64], segment_length: usize, overlap: usize) -> Spectrum {
        let n = signal.len();
        let (segment, overlap) = if segment_length > n || segment_length < 2 {
            (n, n / 2)
        } else {
            (segment_length, overlap.min(segment_length - 1))
        };
        let step = segment - overlap;

        let window = hann(segment, Symmetry::Periodic);
        let window_power: f64 = window.iter().map(|w| w * w).sum();
        let scale = 1.0 / (self.sample_rate * window_power.max(f64::MIN_POSITIVE));

        let bins = segment / 2 + 1;
        let mut accumulated = vec![0.0; bins];
        let mut segments = 0usize;

        let mut start = 0;
        while start + segment <= n {
            let chunk = &signal[start..start + segment];
            let mean = chunk.iter().sum::<f64>() / segment as f64;
            let mut buffer: Vec<f64> = chunk
                .iter()
                .zip(&window)
                .map(|(x, w)| (x - mean) * w)
                .collect();

            let Some(output) = self.transform(&mut buffer) else {
                return Spectrum::empty(SpectrumKind::PowerDensity);
            };
            for (acc, c) in accumulated.iter_mut().zip(&output) {
                *acc += c.norm_sqr() * scale;
            }

            segments += 1;
            start += step;
        }

        // One-sided: fold negative frequencies into every bin but DC and an even-length Nyquist
        let last_doubled = if segment % 2 == 0 { bins - 1 } else { bins };
        for value in accumulated.iter_mut().take(last_doubled).skip(1) {
            *value *= 2.0;
        }

        let count = segments.max(1) as f64;
        let bin_width = self.sample_rate / segment as f64;

        Spectrum {
            kind: SpectrumKind::PowerDensity,
            frequencies: (0..bins).map(|k| k as f64 * bin_width).collect(),
            values: accumulated.into_iter().map(|v| v / count).collect(),
        }
    }
}

impl std::fmt::Debug for SpectralEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralEstimator")
            .field("method", &self.method)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
