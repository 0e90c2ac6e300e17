//! eeg-monitor: acquire, clean, filter and analyse a single EEG channel in real time

use anyhow::{Context, Result};
use clap::Parser;
use eeg_monitor::cli::Cli;
use eeg_monitor::MonitorService;
use eeg_processing::CycleOutput;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// What gets printed per cycle; the filtered window itself stays in-process
#[derive(Debug, Serialize)]
struct CycleSummary<'a> {
    cycle: u64,
    peak_hz: Option<f64>,
    peak_value: Option<f64>,
    bands: Vec<(&'a str, f64)>,
    artifacts_repaired: usize,
    processing_time_us: u64,
}

impl<'a> From<&'a CycleOutput> for CycleSummary<'a> {
    fn from(output: &'a CycleOutput) -> Self {
        Self {
            cycle: output.cycle,
            peak_hz: output.peak.map(|p| p.frequency),
            peak_value: output.peak.map(|p| p.value),
            bands: output.band_powers.iter().collect(),
            artifacts_repaired: output.artifacts_repaired,
            processing_time_us: output.metrics.processing_time_us,
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

async fn print_cycles(mut outputs: broadcast::Receiver<Arc<CycleOutput>>, json: bool) {
    loop {
        match outputs.recv().await {
            Ok(output) => {
                let summary = CycleSummary::from(output.as_ref());
                if json {
                    match serde_json::to_string(&summary) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!(error = %e, "failed to encode cycle"),
                    }
                } else {
                    let peak = match output.peak {
                        Some(peak) => format!("{:6.2} Hz ({:.4})", peak.frequency, peak.value),
                        None => "      -".to_string(),
                    };
                    let bands: Vec<String> = summary
                        .bands
                        .iter()
                        .map(|(name, fraction)| format!("{} {:5.1}%", name, fraction * 100.0))
                        .collect();
                    println!(
                        "cycle {:5}  peak {}  {}  repaired {}  {} us",
                        summary.cycle,
                        peak,
                        bands.join("  "),
                        summary.artifacts_repaired,
                        summary.processing_time_us
                    );
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "output lagged, cycles dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.load_config()?;
    let duration = cli.duration()?;
    let source = cli.build_source(&config)?;

    let service = MonitorService::new(config).context("Failed to build processing pipeline")?;
    let handle = service.start(source).context("Failed to start monitor")?;
    let printer = tokio::spawn(print_cycles(handle.subscribe(), cli.json));

    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        _ = handle.stopped() => info!("acquisition ended"),
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = deadline => info!("duration elapsed"),
    }

    // A second Ctrl-C abandons a source stuck in a blocking read
    let report = tokio::select! {
        report = handle.stop() => report.context("Monitor shut down abnormally")?,
        _ = tokio::signal::ctrl_c() => {
            warn!("forced exit");
            std::process::exit(130);
        }
    };
    printer.await.context("Output printer failed")?;

    info!(
        samples = report.samples_pushed,
        skipped = report.lines_skipped,
        cycles = report.cycles_completed,
        waiting = report.cycles_skipped,
        elapsed_ms = report.elapsed_ms,
        end = ?report.end,
        "run complete"
    );
    Ok(())
}
