//! Raw ADC code to centered voltage conversion

use crate::config::AdcConfig;
use eeg_core::{EegError, EegResult, Sample};

/// Maps raw integer codes to zero-centered volts
///
/// `physical = code / max_code * reference - bias`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitConverter {
    max_code: f64,
    reference_voltage: f64,
    bias_voltage: f64,
}

impl UnitConverter {
    pub fn new(max_code: f64, reference_voltage: f64, bias_voltage: f64) -> EegResult<Self> {
        if !(max_code > 0.0) || !max_code.is_finite() {
            return Err(EegError::config(format!(
                "ADC max code must be positive, got {}",
                max_code
            )));
        }
        if !reference_voltage.is_finite() || !bias_voltage.is_finite() {
            return Err(EegError::config("ADC reference and bias voltages must be finite"));
        }

        Ok(Self {
            max_code,
            reference_voltage,
            bias_voltage,
        })
    }

    pub fn from_config(adc: &AdcConfig) -> EegResult<Self> {
        Self::new(adc.max_code as f64, adc.reference_voltage, adc.bias_voltage)
    }

    #[inline]
    pub fn to_volts(&self, code: i32) -> f64 {
        code as f64 / self.max_code * self.reference_voltage - self.bias_voltage
    }

    /// Nearest code for a voltage, clamped to `0..=max_code`
    pub fn to_code(&self, volts: f64) -> i32 {
        let code = ((volts + self.bias_voltage) / self.reference_voltage * self.max_code).round();
        code.clamp(0.0, self.max_code) as i32
    }

    pub fn convert(&self, samples: &[Sample]) -> Vec<f64> {
        samples.iter().map(|s| self.to_volts(s.code)).collect()
    }
}
