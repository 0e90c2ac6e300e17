//! Command-line surface of the `eeg-monitor` binary

use anyhow::{bail, Context, Result};
use clap::Parser;
use eeg_acquisition::{open_file, stdin_source, SampleSource, SyntheticConfig, SyntheticSource};
use eeg_core::Framing;
use eeg_processing::MonitorConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "eeg-monitor",
    version,
    about = "Real-time single-channel EEG monitor",
    long_about = "Acquires raw ADC samples, removes artifacts, filters, and reports the spectrum\n\
                  peak and EEG band powers every processing interval."
)]
pub struct Cli {
    /// JSON configuration file; defaults to the 50 Hz mains preset
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Recorded capture to replay, or `-` for standard input
    #[arg(long, conflicts_with = "synthetic")]
    pub input: Option<PathBuf>,

    /// Serial port to acquire from
    #[cfg(feature = "serial")]
    #[arg(long, conflicts_with_all = ["input", "synthetic"])]
    pub port: Option<String>,

    /// Serial baud rate
    #[cfg(feature = "serial")]
    #[arg(long, default_value_t = eeg_acquisition::serial::DEFAULT_BAUD_RATE)]
    pub baud: u32,

    /// Sample framing (text, binary); overrides the configuration file
    #[arg(long)]
    pub framing: Option<Framing>,

    /// Generate a synthetic 10 Hz rhythm with line noise instead of reading a device
    #[arg(long)]
    pub synthetic: bool,

    /// Stop after this many seconds
    #[arg(long)]
    pub duration_secs: Option<f64>,

    /// Sampling rate in Hz; overrides the configuration file
    #[arg(long)]
    pub sample_rate: Option<f64>,

    /// Processing interval in milliseconds; overrides the configuration file
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Print one JSON object per cycle instead of a text line
    #[arg(long)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Configuration file (or preset) with command-line overrides applied, validated
    pub fn load_config(&self) -> Result<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => MonitorConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => MonitorConfig::mains_50hz(),
        };

        if let Some(framing) = self.framing {
            config.framing = framing;
        }
        if let Some(sample_rate) = self.sample_rate {
            config.sample_rate = sample_rate;
        }
        if let Some(interval_ms) = self.interval_ms {
            config.processing_interval_ms = interval_ms;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn duration(&self) -> Result<Option<Duration>> {
        match self.duration_secs {
            None => Ok(None),
            Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
            Some(secs) => bail!("--duration-secs must be a positive number, got {}", secs),
        }
    }

    /// Open the selected acquisition source
    pub fn build_source(&self, config: &MonitorConfig) -> Result<Box<dyn SampleSource>> {
        #[cfg(feature = "serial")]
        if let Some(port) = &self.port {
            let mut settings = eeg_acquisition::SerialSettings::new(port.clone(), config.framing);
            settings.baud_rate = self.baud;
            return eeg_acquisition::open_serial(&settings)
                .with_context(|| format!("Failed to open serial port {}", port));
        }

        if let Some(path) = &self.input {
            if path.as_os_str() == "-" {
                return Ok(stdin_source(config.framing));
            }
            return open_file(path, config.framing)
                .with_context(|| format!("Failed to open capture {}", path.display()));
        }

        if self.synthetic {
            let synthetic = SyntheticConfig {
                sample_rate: config.sample_rate,
                max_code: config.adc.max_code,
                reference_voltage: config.adc.reference_voltage,
                bias_voltage: config.adc.bias_voltage,
                realtime: true,
                ..SyntheticConfig::default()
            };
            let source =
                SyntheticSource::new(synthetic).context("Invalid synthetic source settings")?;
            return Ok(Box::new(source));
        }

        bail!("No acquisition source selected; pass --input <FILE|->, --synthetic or --port <PORT>")
    }
}
