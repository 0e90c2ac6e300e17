use eeg_acquisition::{SampleSource, SineComponent, SyntheticConfig, SyntheticSource};
use eeg_monitor::{AcquisitionEnd, MonitorService};
use eeg_processing::{CycleOutput, MonitorConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

fn alpha_with_line_noise(budget: u64) -> Box<dyn SampleSource> {
    let source = SyntheticSource::new(SyntheticConfig {
        components: vec![SineComponent::new(10.0, 0.5)],
        line_noise: Some(SineComponent::new(50.0, 0.5)),
        noise_std: 0.005,
        realtime: true,
        sample_budget: Some(budget),
        seed: Some(77),
        ..SyntheticConfig::default()
    })
    .unwrap();
    Box::new(source)
}

#[tokio::test]
async fn streams_cycles_until_source_ends() {
    let mut config = MonitorConfig::mains_50hz();
    config.buffer_capacity = 1000;
    config.processing_interval_ms = 50;

    let service = MonitorService::new(config).unwrap();
    let handle = service.start(alpha_with_line_noise(1600)).unwrap();

    let mut outputs = handle.subscribe();
    let collector = tokio::spawn(async move {
        let mut received: Vec<Arc<CycleOutput>> = Vec::new();
        loop {
            match outputs.recv().await {
                Ok(output) => received.push(output),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return received,
            }
        }
    });

    let report = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .expect("monitor did not finish")
        .unwrap();
    let received = collector.await.unwrap();

    assert!(matches!(report.end, AcquisitionEnd::Disconnected { .. }));
    assert_eq!(report.samples_pushed, 1600);
    assert!(report.cycles_skipped >= 1);
    assert!(!received.is_empty());
    assert_eq!(received.len() as u64, report.cycles_completed);

    for (index, output) in received.iter().enumerate() {
        assert_eq!(output.cycle, index as u64);
        assert_eq!(output.filtered.len(), 1000);

        let peak = output.peak.unwrap();
        assert!(
            (peak.frequency - 10.0).abs() <= 1.0,
            "cycle {}: peak at {}",
            index,
            peak.frequency
        );
        assert_eq!(
            output.band_powers.dominant().map(|b| b.name.as_str()),
            Some("Alpha"),
            "cycle {}",
            index
        );
        assert!(output.band_powers.fraction_sum() <= 1.0 + 1e-9);
    }
}

#[tokio::test]
async fn stop_interrupts_unbounded_source() {
    let mut config = MonitorConfig::mains_60hz();
    config.buffer_capacity = 128;
    config.processing_interval_ms = 10;

    let service = MonitorService::new(config).unwrap();
    let source = SyntheticSource::new(SyntheticConfig {
        realtime: true,
        seed: Some(5),
        ..SyntheticConfig::default()
    })
    .unwrap();
    let handle = service.start(Box::new(source)).unwrap();

    tokio::time::sleep(Duration::from_millis(300)).await;
    let live = handle.stats();
    assert!(live.is_running);
    assert!(live.samples_pushed > 0);

    let report = handle.stop().await.unwrap();
    assert_eq!(report.end, AcquisitionEnd::Stopped);
    assert!(report.samples_pushed >= live.samples_pushed);
    assert!(report.cycles_completed >= 1);
}
