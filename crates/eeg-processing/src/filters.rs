//! Digital filters for EEG processing
//!
//! Every design is a cascade of second-order sections in `f64`. Specs are
//! designed once per configuration and never mutated; applying a spec keeps
//! its running state on the stack, so one spec can serve any number of
//! windows concurrently.

use crate::config::{FilterMode, MonitorConfig};
use eeg_core::{EegError, EegResult};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::debug;

/// Residual fraction of an edge transient tolerated once the padding has run
const EDGE_SETTLE_LEVEL: f64 = 1e-3;

/// Filter families supported by the bank
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterKind {
    /// Butterworth band-pass between `low` and `high` Hz
    BandPass { low: f64, high: f64, order: usize },
    /// Second-order IIR notch at `frequency` Hz
    Notch { frequency: f64, quality_factor: f64 },
}

/// Second-order section, `a[0]` is always 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

impl Biquad {
    /// Band-pass section `(1 - z^-2) / (1 - 2Re(p) z^-1 + |p|^2 z^-2)` for a pole and its conjugate
    fn conjugate_pair(pole: Complex64) -> Self {
        Self {
            b: [1.0, 0.0, -1.0],
            a: [1.0, -2.0 * pole.re, pole.norm_sqr()],
        }
    }

    /// Band-pass section for two poles that are already a real or conjugate pair
    fn pole_pair(p1: Complex64, p2: Complex64) -> Self {
        Self {
            b: [1.0, 0.0, -1.0],
            a: [1.0, -(p1 + p2).re, (p1 * p2).re],
        }
    }

    /// Complex response at `omega` radians per sample
    fn response(&self, omega: f64) -> Complex64 {
        let z1 = Complex64::from_polar(1.0, -omega);
        let z2 = z1 * z1;
        let num = self.b[0] + self.b[1] * z1 + self.b[2] * z2;
        let den = self.a[0] + self.a[1] * z1 + self.a[2] * z2;
        num / den
    }

    fn scale_numerator(&mut self, gain: f64) {
        for b in &mut self.b {
            *b *= gain;
        }
    }

    fn dc_gain(&self) -> f64 {
        let den: f64 = self.a.iter().sum();
        if den.abs() < f64::EPSILON {
            return 0.0;
        }
        self.b.iter().sum::<f64>() / den
    }

    /// Largest pole radius; 1.0 or more means the section never settles
    fn pole_radius(&self) -> f64 {
        let [_, a1, a2] = self.a;
        let disc = a1 * a1 - 4.0 * a2;
        if disc < 0.0 {
            a2.sqrt()
        } else {
            let root = disc.sqrt();
            ((-a1 + root) / 2.0).abs().max(((-a1 - root) / 2.0).abs())
        }
    }

    /// State that makes a constant unit input pass without transient
    fn steady_state(&self) -> [f64; 2] {
        let g = self.dc_gain();
        [g - self.b[0], self.b[2] - self.a[2] * g]
    }

    /// Transposed direct form II over `signal`, starting from `state`
    fn run(&self, signal: &mut [f64], mut state: [f64; 2]) {
        let [b0, b1, b2] = self.b;
        let [_, a1, a2] = self.a;
        for x in signal.iter_mut() {
            let input = *x;
            let y = b0 * input + state[0];
            state[0] = b1 * input - a1 * y + state[1];
            state[1] = b2 * input - a2 * y;
            *x = y;
        }
    }
}

/// One designed filter: its parameters and the derived sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    kind: FilterKind,
    sample_rate: f64,
    sections: Vec<Biquad>,
}

impl FilterSpec {
    /// Derive coefficients for `kind` at `sample_rate`
    ///
    /// Cutoffs are checked against Nyquist and rejected rather than clamped.
    pub fn design(kind: FilterKind, sample_rate: f64) -> EegResult<Self> {
        if !(sample_rate > 0.0) || !sample_rate.is_finite() {
            return Err(EegError::filter(format!(
                "Sample rate must be positive, got {}",
                sample_rate
            )));
        }

        let sections = match kind {
            FilterKind::BandPass { low, high, order } => {
                design_band_pass(low, high, order, sample_rate)?
            }
            FilterKind::Notch {
                frequency,
                quality_factor,
            } => vec![design_notch(frequency, quality_factor, sample_rate)?],
        };

        debug!(?kind, sample_rate, sections = sections.len(), "designed filter");

        Ok(Self {
            kind,
            sample_rate,
            sections,
        })
    }

    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Magnitude response at `frequency` Hz
    pub fn magnitude_at(&self, frequency: f64) -> f64 {
        let omega = 2.0 * PI * frequency / self.sample_rate;
        self.sections
            .iter()
            .map(|s| s.response(omega).norm())
            .product()
    }

    /// Filter a whole window
    pub fn apply(&self, signal: &[f64], mode: FilterMode) -> Vec<f64> {
        match mode {
            FilterMode::Causal => {
                let mut out = signal.to_vec();
                for section in &self.sections {
                    section.run(&mut out, [0.0, 0.0]);
                }
                out
            }
            FilterMode::ZeroPhase => self.filter_forward_backward(signal),
        }
    }

    /// Steady-state initial conditions for the cascade with a unit input
    fn initial_states(&self) -> Vec<[f64; 2]> {
        let mut scale = 1.0;
        self.sections
            .iter()
            .map(|section| {
                let zi = section.steady_state();
                let scaled = [zi[0] * scale, zi[1] * scale];
                scale *= section.dc_gain();
                scaled
            })
            .collect()
    }

    fn run_cascade(&self, signal: &mut [f64], initial: &[[f64; 2]], level: f64) {
        for (section, zi) in self.sections.iter().zip(initial) {
            section.run(signal, [zi[0] * level, zi[1] * level]);
        }
    }

    /// Edge padding for an `n`-sample window: long enough for the slowest
    /// pole to decay to `EDGE_SETTLE_LEVEL`, never shorter than three times
    /// the cascade length, capped at `n - 1`
    fn padding(&self, n: usize) -> usize {
        let minimum = 3 * (2 * self.sections.len() + 1);
        let radius = self
            .sections
            .iter()
            .map(Biquad::pole_radius)
            .fold(0.0, f64::max);

        let settle = if radius >= 1.0 {
            usize::MAX
        } else if radius <= 0.0 {
            0
        } else {
            (EDGE_SETTLE_LEVEL.ln() / radius.ln()).ceil() as usize
        };

        settle.max(minimum).min(n.saturating_sub(1))
    }

    /// Forward-backward filtering with odd-extension padding
    fn filter_forward_backward(&self, signal: &[f64]) -> Vec<f64> {
        let n = signal.len();
        if n < 2 {
            return signal.to_vec();
        }

        let padlen = self.padding(n);
        let first = signal[0];
        let last = signal[n - 1];

        let mut ext = Vec::with_capacity(n + 2 * padlen);
        ext.extend((1..=padlen).rev().map(|i| 2.0 * first - signal[i]));
        ext.extend_from_slice(signal);
        ext.extend((1..=padlen).map(|i| 2.0 * last - signal[n - 1 - i]));

        let initial = self.initial_states();

        let x0 = ext[0];
        self.run_cascade(&mut ext, &initial, x0);
        ext.reverse();

        let y0 = ext[0];
        self.run_cascade(&mut ext, &initial, y0);
        ext.reverse();

        ext[padlen..padlen + n].to_vec()
    }
}

/// Frequency pre-warping for the bilinear transform, rad/s
fn prewarp(frequency: f64, sample_rate: f64) -> f64 {
    2.0 * sample_rate * (PI * frequency / sample_rate).tan()
}

/// Butterworth band-pass as `order` second-order sections, each scaled to
/// unity gain at the geometric center frequency
fn design_band_pass(low: f64, high: f64, order: usize, sample_rate: f64) -> EegResult<Vec<Biquad>> {
    let nyquist = sample_rate / 2.0;
    if order == 0 {
        return Err(EegError::filter("Band-pass order must be at least 1"));
    }
    if !(low > 0.0 && low < high && high < nyquist) {
        return Err(EegError::filter(format!(
            "Band-pass cutoffs must satisfy 0 < low < high < {} Hz, got {}..{}",
            nyquist, low, high
        )));
    }

    let w1 = prewarp(low, sample_rate);
    let w2 = prewarp(high, sample_rate);
    let w0 = (w1 * w2).sqrt();
    let bw = w2 - w1;

    let fs2 = 2.0 * sample_rate;
    let bilinear = |s: Complex64| (fs2 + s) / (fs2 - s);

    let mut sections = Vec::with_capacity(order);
    for k in 0..order {
        // Prototype pole angle is pi * step / (2 * order)
        let step = 2 * k + order + 1;
        if step > 2 * order {
            continue; // lower half plane, covered by its conjugate
        }

        let p = Complex64::from_polar(1.0, PI * step as f64 / (2 * order) as f64);
        let half = p * (bw / 2.0);
        let root = (half * half - w0 * w0).sqrt();
        let z1 = bilinear(half + root);
        let z2 = bilinear(half - root);

        if step == 2 * order {
            sections.push(Biquad::pole_pair(z1, z2));
        } else {
            sections.push(Biquad::conjugate_pair(z1));
            sections.push(Biquad::conjugate_pair(z2));
        }
    }

    let center = 2.0 * (w0 / fs2).atan();
    for section in &mut sections {
        let gain = section.response(center).norm();
        if gain > 0.0 {
            section.scale_numerator(1.0 / gain);
        }
    }

    Ok(sections)
}

/// Standard IIR notch with -3 dB bandwidth `frequency / quality_factor`
fn design_notch(frequency: f64, quality_factor: f64, sample_rate: f64) -> EegResult<Biquad> {
    let nyquist = sample_rate / 2.0;
    if !(quality_factor > 0.0) {
        return Err(EegError::filter(format!(
            "Notch quality factor must be positive, got {}",
            quality_factor
        )));
    }
    if !(frequency > 0.0 && frequency < nyquist) {
        return Err(EegError::filter(format!(
            "Notch frequency must lie in (0, {}) Hz, got {}",
            nyquist, frequency
        )));
    }

    let w0 = frequency / nyquist;
    let bw = w0 / quality_factor;
    if bw >= 1.0 {
        return Err(EegError::filter(format!(
            "Notch at {} Hz with Q {} is wider than the Nyquist band",
            frequency, quality_factor
        )));
    }

    let beta = (bw * PI / 2.0).tan();
    let gain = 1.0 / (1.0 + beta);
    let cos_w0 = (w0 * PI).cos();

    Ok(Biquad {
        b: [gain, -2.0 * gain * cos_w0, gain],
        a: [1.0, -2.0 * gain * cos_w0, 2.0 * gain - 1.0],
    })
}

/// Band-pass followed by every configured notch
#[derive(Debug, Clone, PartialEq)]
pub struct FilterBank {
    specs: Vec<FilterSpec>,
}

impl FilterBank {
    /// Chain already-designed specs in the given order
    pub fn new(specs: Vec<FilterSpec>) -> Self {
        Self { specs }
    }

    /// Design the band-pass and notch chain described by `config`
    pub fn design(config: &MonitorConfig) -> EegResult<Self> {
        let bp = config.band_pass;
        let mut specs = Vec::with_capacity(1 + config.notch.frequencies.len());
        specs.push(FilterSpec::design(
            FilterKind::BandPass {
                low: bp.low,
                high: bp.high,
                order: bp.order,
            },
            config.sample_rate,
        )?);

        for &frequency in &config.notch.frequencies {
            specs.push(FilterSpec::design(
                FilterKind::Notch {
                    frequency,
                    quality_factor: config.notch.quality_factor,
                },
                config.sample_rate,
            )?);
        }

        Ok(Self { specs })
    }

    pub fn specs(&self) -> &[FilterSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Run every stage in order; attenuation accumulates across stages
    pub fn apply(&self, window: &[f64], mode: FilterMode) -> Vec<f64> {
        let mut out = window.to_vec();
        for spec in &self.specs {
            out = spec.apply(&out, mode);
        }
        out
    }

    /// Combined magnitude response at `frequency` Hz
    pub fn magnitude_at(&self, frequency: f64) -> f64 {
        self.specs.iter().map(|s| s.magnitude_at(frequency)).product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 1000.0;

    fn sine(freq: f64, amplitude: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    fn peak(signal: &[f64]) -> f64 {
        signal.iter().fold(0.0, |m, x| m.max(x.abs()))
    }

    fn band_pass(low: f64, high: f64, order: usize) -> FilterKind {
        FilterKind::BandPass { low, high, order }
    }

    #[test]
    fn test_band_pass_has_order_sections() {
        for order in 1..=6 {
            let spec = FilterSpec::design(band_pass(0.5, 50.0, order), FS).unwrap();
            assert_eq!(spec.sections().len(), order);
        }
    }

    #[test]
    fn test_band_pass_response_shape() {
        for order in [1usize, 2, 4, 5] {
            let spec = FilterSpec::design(band_pass(0.5, 50.0, order), FS).unwrap();

            // -3 dB exactly at both cutoffs
            assert!((spec.magnitude_at(0.5) - 0.5f64.sqrt()).abs() < 1e-6, "order {}", order);
            assert!((spec.magnitude_at(50.0) - 0.5f64.sqrt()).abs() < 1e-6, "order {}", order);

            let center = 2.0 * FS * (PI * 0.5 / FS).tan() * 2.0 * FS * (PI * 50.0 / FS).tan();
            let center_hz = FS / PI * (center.sqrt() / (2.0 * FS)).atan();
            assert!((spec.magnitude_at(center_hz) - 1.0).abs() < 1e-9);

            assert!(spec.magnitude_at(10.0) > 0.95);
            assert!(spec.magnitude_at(200.0) < 0.5);
        }

        let steep = FilterSpec::design(band_pass(0.5, 50.0, 4), FS).unwrap();
        assert!(steep.magnitude_at(300.0) < 1e-3);
        assert!(steep.magnitude_at(0.01) < 1e-3);
    }

    #[test]
    fn test_band_pass_rejects_invalid_cutoffs() {
        for kind in [
            band_pass(40.0, 20.0, 4),
            band_pass(20.0, 20.0, 4),
            band_pass(0.0, 20.0, 4),
            band_pass(1.0, 500.0, 4),
            band_pass(1.0, 600.0, 4),
            band_pass(1.0, 40.0, 0),
        ] {
            let err = FilterSpec::design(kind, FS).unwrap_err();
            assert!(err.is_configuration(), "{:?}", kind);
        }
    }

    #[test]
    fn test_notch_response() {
        let spec = FilterSpec::design(
            FilterKind::Notch {
                frequency: 50.0,
                quality_factor: 30.0,
            },
            FS,
        )
        .unwrap();

        assert!(spec.magnitude_at(50.0) < 1e-9);
        assert!(spec.magnitude_at(10.0) > 0.99);
        assert!(spec.magnitude_at(100.0) > 0.99);
    }

    #[test]
    fn test_notch_rejects_invalid_parameters() {
        let notch = |frequency, quality_factor| FilterKind::Notch {
            frequency,
            quality_factor,
        };
        assert!(FilterSpec::design(notch(50.0, 0.0), FS).is_err());
        assert!(FilterSpec::design(notch(50.0, -2.0), FS).is_err());
        assert!(FilterSpec::design(notch(500.0, 30.0), FS).is_err());
        assert!(FilterSpec::design(notch(0.0, 30.0), FS).is_err());
        assert!(FilterSpec::design(notch(50.0, 30.0), 0.0).is_err());
    }

    #[test]
    fn test_design_is_deterministic() {
        let a = FilterSpec::design(band_pass(0.5, 45.0, 5), FS).unwrap();
        let b = FilterSpec::design(band_pass(0.5, 45.0, 5), FS).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_chain_removes_line_noise() {
        let bank = FilterBank::design(&MonitorConfig::mains_50hz()).unwrap();
        assert_eq!(bank.len(), 3);

        let line = sine(50.0, 1.0, 7000);
        for mode in [FilterMode::Causal, FilterMode::ZeroPhase] {
            let filtered = bank.apply(&line, mode);
            assert_eq!(filtered.len(), line.len());
            // Skip start-up and edge transients of the narrow notch
            let settled = &filtered[2000..5000];
            assert!(peak(settled) < 0.1 * peak(&line), "{:?}: {}", mode, peak(settled));
        }
    }

    #[test]
    fn test_chain_passes_in_band_sine() {
        let bank = FilterBank::design(&MonitorConfig::mains_50hz()).unwrap();
        let alpha = sine(10.0, 1.0, 7000);
        let limit = 10f64.powf(-3.0 / 20.0);

        for mode in [FilterMode::Causal, FilterMode::ZeroPhase] {
            let filtered = bank.apply(&alpha, mode);
            let settled = &filtered[2000..5000];
            assert!(peak(settled) > limit, "{:?}: {}", mode, peak(settled));
        }
    }

    #[test]
    fn test_zero_phase_preserves_timing() {
        let spec = FilterSpec::design(band_pass(1.0, 40.0, 4), FS).unwrap();
        let input = sine(10.0, 1.0, 3000);
        let output = spec.apply(&input, FilterMode::ZeroPhase);

        // No group delay: output tracks input sample for sample mid-window
        for i in 1000..2000 {
            assert!((output[i] - input[i]).abs() < 0.05, "sample {}", i);
        }
    }

    #[test]
    fn test_padding_follows_slowest_pole() {
        // Slowest pole near 0.5 Hz decays over seconds: padding hits the cap
        let slow = FilterSpec::design(band_pass(0.5, 50.0, 4), FS).unwrap();
        assert_eq!(slow.padding(1024), 1023);
        assert!(slow.padding(100_000) > 3000);

        // 1 Hz edge: time constant around 435 samples
        let edge = FilterSpec::design(band_pass(1.0, 40.0, 4), FS).unwrap();
        let pad = edge.padding(100_000);
        assert!(pad > 2000 && pad < 5000, "pad {}", pad);

        let notch = FilterSpec::design(
            FilterKind::Notch {
                frequency: 50.0,
                quality_factor: 30.0,
            },
            FS,
        )
        .unwrap();
        assert!(notch.padding(100_000) < pad);
        assert_eq!(notch.padding(2), 1);
    }

    #[test]
    fn test_zero_phase_short_windows() {
        let spec = FilterSpec::design(band_pass(1.0, 40.0, 4), FS).unwrap();
        assert!(spec.apply(&[], FilterMode::ZeroPhase).is_empty());
        assert_eq!(spec.apply(&[0.3], FilterMode::ZeroPhase), vec![0.3]);

        let short = spec.apply(&[0.1, -0.2, 0.3, 0.0, 0.1], FilterMode::ZeroPhase);
        assert_eq!(short.len(), 5);
        assert!(short.iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_steady_state_notch_passes_dc() {
        let spec = FilterSpec::design(
            FilterKind::Notch {
                frequency: 50.0,
                quality_factor: 30.0,
            },
            FS,
        )
        .unwrap();
        let dc = vec![0.7; 200];
        let out = spec.apply(&dc, FilterMode::ZeroPhase);
        assert!(out.iter().all(|x| (x - 0.7).abs() < 1e-9));
    }
}
