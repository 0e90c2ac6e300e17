//! Monitor runtime: a blocking acquisition thread feeding the sample buffer
//! and a timer-driven processing task broadcasting cycle results.

use eeg_acquisition::{ReadOutcome, SampleSource};
use eeg_core::{EegError, EegResult, SampleRingBuffer};
use eeg_processing::{CycleOutput, FilterBank, MonitorConfig, Pipeline};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Cycles buffered per subscriber before the oldest are dropped
pub const OUTPUT_CHANNEL_CAPACITY: usize = 16;

/// Why the acquisition thread stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AcquisitionEnd {
    /// `MonitorHandle::stop` was called
    Stopped,
    /// The source reached end of stream or went away
    Disconnected { source_name: String },
    /// Unrecoverable read failure
    Failed { message: String },
}

/// Live counters, readable while the monitor runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub is_running: bool,
    pub samples_pushed: u64,
    pub lines_skipped: u64,
    pub cycles_completed: u64,
    /// Ticks that found the buffer not yet full
    pub cycles_skipped: u64,
}

/// Final account of a monitor run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub samples_pushed: u64,
    pub lines_skipped: u64,
    pub cycles_completed: u64,
    pub cycles_skipped: u64,
    pub end: AcquisitionEnd,
    pub elapsed_ms: u64,
}

/// State shared by the acquisition thread, the processing task and the handle
#[derive(Debug)]
pub struct MonitorContext {
    config: MonitorConfig,
    buffer: SampleRingBuffer,
    stop: AtomicBool,
    shutdown: watch::Sender<bool>,
    lines_skipped: AtomicU64,
    cycles_completed: AtomicU64,
    cycles_skipped: AtomicU64,
}

impl MonitorContext {
    fn new(config: MonitorConfig) -> EegResult<Self> {
        let buffer = SampleRingBuffer::new(config.buffer_capacity)?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            config,
            buffer,
            stop: AtomicBool::new(false),
            shutdown,
            lines_skipped: AtomicU64::new(0),
            cycles_completed: AtomicU64::new(0),
            cycles_skipped: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn buffer(&self) -> &SampleRingBuffer {
        &self.buffer
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Raise the stop flag; no new cycle or read starts after this
    fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Raise the stop flag and wake the processing task
    fn signal_shutdown(&self) {
        self.request_stop();
        self.shutdown.send_replace(true);
    }

    fn stats(&self) -> MonitorStats {
        MonitorStats {
            is_running: !self.stop_requested(),
            samples_pushed: self.buffer.total_pushed(),
            lines_skipped: self.lines_skipped.load(Ordering::Relaxed),
            cycles_completed: self.cycles_completed.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
        }
    }
}

/// Validated configuration plus the filter bank designed from it
#[derive(Debug, Clone)]
pub struct MonitorService {
    config: MonitorConfig,
    filters: Arc<FilterBank>,
}

impl MonitorService {
    /// Validate `config` and design the filters; every configuration error surfaces here
    pub fn new(config: MonitorConfig) -> EegResult<Self> {
        config.validate()?;
        let filters = Arc::new(FilterBank::design(&config)?);
        Ok(Self { config, filters })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn filters(&self) -> &Arc<FilterBank> {
        &self.filters
    }

    /// Spawn both execution contexts. Must be called from within a tokio runtime.
    pub fn start(&self, source: Box<dyn SampleSource>) -> EegResult<MonitorHandle> {
        let pipeline = Pipeline::with_filters(&self.config, Arc::clone(&self.filters))?;
        let context = Arc::new(MonitorContext::new(self.config.clone())?);
        let (output, _) = broadcast::channel(OUTPUT_CHANNEL_CAPACITY);

        info!(
            source = %source.describe(),
            sample_rate = self.config.sample_rate,
            window = self.config.buffer_capacity,
            interval_ms = self.config.processing_interval_ms,
            "monitor starting"
        );

        let acquisition = {
            let context = Arc::clone(&context);
            tokio::task::spawn_blocking(move || acquisition_loop(context, source))
        };
        let processing =
            tokio::spawn(processing_loop(Arc::clone(&context), pipeline, output.clone()));

        Ok(MonitorHandle {
            context,
            acquisition,
            processing,
            output,
            started: Instant::now(),
        })
    }
}

/// Owner of a running monitor
#[derive(Debug)]
pub struct MonitorHandle {
    context: Arc<MonitorContext>,
    acquisition: JoinHandle<AcquisitionEnd>,
    processing: JoinHandle<()>,
    output: broadcast::Sender<Arc<CycleOutput>>,
    started: Instant,
}

impl MonitorHandle {
    /// Receive every cycle completed from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<CycleOutput>> {
        self.output.subscribe()
    }

    pub fn context(&self) -> &Arc<MonitorContext> {
        &self.context
    }

    pub fn stats(&self) -> MonitorStats {
        self.context.stats()
    }

    /// Resolves once shutdown has been signalled, by `stop` or by the source ending
    pub async fn stopped(&self) {
        let mut shutdown = self.context.shutdown.subscribe();
        // Err only if the sender is gone, which means the context is being torn down
        let _ = shutdown.wait_for(|stopped| *stopped).await;
    }

    /// Stop acquisition, let an in-flight cycle finish, then stop processing.
    ///
    /// A source blocked inside a read without a timeout (stdin, a plain file
    /// on a stalled mount) is joined only once that read returns.
    pub async fn stop(self) -> EegResult<MonitorReport> {
        info!("stop requested");
        self.context.request_stop();
        self.finish().await
    }

    /// Run until the source disconnects or fails
    pub async fn wait(self) -> EegResult<MonitorReport> {
        self.finish().await
    }

    async fn finish(self) -> EegResult<MonitorReport> {
        let MonitorHandle {
            context,
            acquisition,
            processing,
            output,
            started,
        } = self;

        // Both tasks are joined even when one of them panicked
        let acquired = acquisition.await;
        context.signal_shutdown();
        let processed = processing.await;
        drop(output);

        let end = acquired.map_err(|e| EegError::task("acquisition", e))?;
        processed.map_err(|e| EegError::task("processing", e))?;

        let stats = context.stats();
        let report = MonitorReport {
            samples_pushed: stats.samples_pushed,
            lines_skipped: stats.lines_skipped,
            cycles_completed: stats.cycles_completed,
            cycles_skipped: stats.cycles_skipped,
            end,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            samples = report.samples_pushed,
            skipped = report.lines_skipped,
            cycles = report.cycles_completed,
            end = ?report.end,
            "monitor stopped"
        );
        Ok(report)
    }
}

/// Sole writer of the sample buffer. Runs on a blocking thread and drops the
/// source, closing its I/O handle, before returning.
fn acquisition_loop(
    context: Arc<MonitorContext>,
    mut source: Box<dyn SampleSource>,
) -> AcquisitionEnd {
    let source_name = source.describe();
    info!(source = %source_name, "acquisition started");

    let end = loop {
        if context.stop_requested() {
            break AcquisitionEnd::Stopped;
        }

        match source.next_sample() {
            Ok(ReadOutcome::Sample(sample)) => context.buffer.push(sample),
            Ok(ReadOutcome::Skipped(reason)) => {
                let skipped = context.lines_skipped.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(source = %source_name, %reason, skipped, "frame skipped");
            }
            Ok(ReadOutcome::Idle) => {}
            Err(EegError::SourceDisconnected { source_name }) => {
                warn!(source = %source_name, "acquisition source disconnected");
                break AcquisitionEnd::Disconnected { source_name };
            }
            Err(e) => {
                error!(source = %source_name, error = %e, "acquisition failed");
                break AcquisitionEnd::Failed {
                    message: e.to_string(),
                };
            }
        }
    };

    drop(source);
    context.signal_shutdown();
    info!(
        samples = context.buffer.total_pushed(),
        skipped = context.lines_skipped.load(Ordering::Relaxed),
        "acquisition finished"
    );
    end
}

/// Runs one cycle per tick once the buffer is full; exits only on the
/// shutdown signal, which is sent after acquisition has ended
async fn processing_loop(
    context: Arc<MonitorContext>,
    mut pipeline: Pipeline,
    output: broadcast::Sender<Arc<CycleOutput>>,
) {
    let mut shutdown = context.shutdown.subscribe();
    let mut ticker = interval(Duration::from_millis(context.config.processing_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            // The flag only ever goes true, so any change means shutdown
            _ = shutdown.changed() => break,
            _ = ticker.tick() => {
                // Stop raised, acquisition not yet joined: idle until shutdown
                if context.stop_requested() {
                    continue;
                }
                match pipeline.run_cycle(&context.buffer) {
                    Some(cycle) => {
                        context.cycles_completed.fetch_add(1, Ordering::Relaxed);
                        // No subscribers is not an error
                        let _ = output.send(Arc::new(cycle));
                    }
                    None => {
                        context.cycles_skipped.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        }
    }

    info!(cycles = pipeline.cycles_completed(), "processing stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg_acquisition::{frame_reader, SineComponent, SyntheticConfig, SyntheticSource};
    use eeg_core::Framing;
    use std::io::Cursor;

    fn test_config() -> MonitorConfig {
        let mut config = MonitorConfig::mains_50hz();
        config.buffer_capacity = 256;
        config.processing_interval_ms = 20;
        config
    }

    fn realtime_source(budget: Option<u64>) -> Box<dyn SampleSource> {
        let source = SyntheticSource::new(SyntheticConfig {
            components: vec![SineComponent::new(10.0, 0.5)],
            realtime: true,
            sample_budget: budget,
            seed: Some(11),
            ..SyntheticConfig::default()
        })
        .unwrap();
        Box::new(source)
    }

    #[test]
    fn test_invalid_config_rejected_before_start() {
        let mut config = test_config();
        config.buffer_capacity = 0;
        assert!(MonitorService::new(config).unwrap_err().is_configuration());

        let mut config = test_config();
        config.notch.frequencies = vec![600.0];
        assert!(MonitorService::new(config).unwrap_err().is_configuration());
    }

    #[tokio::test]
    async fn test_stop_while_streaming() {
        let service = MonitorService::new(test_config()).unwrap();
        let handle = service.start(realtime_source(None)).unwrap();
        let mut outputs = handle.subscribe();

        let first = tokio::time::timeout(Duration::from_secs(5), outputs.recv())
            .await
            .expect("no cycle within 5 s")
            .unwrap();
        assert_eq!(first.cycle, 0);
        assert_eq!(first.filtered.len(), 256);
        assert!(!first.spectrum.is_empty());
        assert!(handle.stats().is_running);

        let report = handle.stop().await.unwrap();
        assert_eq!(report.end, AcquisitionEnd::Stopped);
        assert!(report.cycles_completed >= 1);
        assert!(report.samples_pushed >= 256);
        assert_eq!(report.lines_skipped, 0);
    }

    #[tokio::test]
    async fn test_disconnect_shuts_down() {
        let service = MonitorService::new(test_config()).unwrap();
        let handle = service.start(realtime_source(Some(600))).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle.stopped())
            .await
            .expect("source did not end");
        assert!(!handle.stats().is_running);

        let report = handle.wait().await.unwrap();
        assert_eq!(
            report.end,
            AcquisitionEnd::Disconnected {
                source_name: "synthetic".to_string()
            }
        );
        assert_eq!(report.samples_pushed, 600);
        // The buffer fills after 256 ms of a 600 ms run
        assert!(report.cycles_skipped >= 1);
        assert!(report.cycles_completed >= 1);
    }

    #[tokio::test]
    async fn test_skipped_lines_counted() {
        let mut text = String::new();
        for i in 0..300 {
            text.push_str(&format!("{},{}\n", i, 2048 + (i % 7)));
            if i % 100 == 50 {
                text.push_str("checksum error\n");
            }
        }

        let service = MonitorService::new(test_config()).unwrap();
        let source = frame_reader(Cursor::new(text.into_bytes()), Framing::Text, "capture");
        let handle = service.start(source).unwrap();
        let report = handle.wait().await.unwrap();

        assert_eq!(report.samples_pushed, 300);
        assert_eq!(report.lines_skipped, 3);
        assert!(matches!(report.end, AcquisitionEnd::Disconnected { .. }));
    }

    #[tokio::test]
    async fn test_service_restarts_with_same_filters() {
        let service = MonitorService::new(test_config()).unwrap();
        for _ in 0..2 {
            let handle = service.start(realtime_source(Some(10))).unwrap();
            let report = handle.wait().await.unwrap();
            assert_eq!(report.samples_pushed, 10);
            assert_eq!(report.cycles_completed, 0);
        }
        assert_eq!(Arc::strong_count(service.filters()), 1);
    }

    /// Blows up on its first read
    struct PanickingSource;

    impl SampleSource for PanickingSource {
        fn next_sample(&mut self) -> EegResult<ReadOutcome> {
            panic!("device driver fault");
        }

        fn describe(&self) -> String {
            "panicking".to_string()
        }
    }

    /// Each read blocks for a while and yields nothing, like a quiet serial line
    struct SlowSource {
        delay: Duration,
    }

    impl SampleSource for SlowSource {
        fn next_sample(&mut self) -> EegResult<ReadOutcome> {
            std::thread::sleep(self.delay);
            Ok(ReadOutcome::Idle)
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    #[tokio::test]
    async fn test_acquisition_panic_still_tears_down_processing() {
        let service = MonitorService::new(test_config()).unwrap();
        let handle = service.start(Box::new(PanickingSource)).unwrap();
        let context = Arc::clone(handle.context());

        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, EegError::TaskFailed { ref task, .. } if task == "acquisition"));

        // Processing has exited and released its share of the context
        assert!(context.stop_requested());
        assert_eq!(Arc::strong_count(&context), 1);
    }

    #[tokio::test]
    async fn test_processing_outlives_acquisition_on_stop() {
        let service = MonitorService::new(test_config()).unwrap();
        let source = SlowSource {
            delay: Duration::from_millis(400),
        };
        let handle = service.start(Box::new(source)).unwrap();
        let context = Arc::clone(handle.context());

        tokio::time::sleep(Duration::from_millis(50)).await;
        let stopping = tokio::spawn(handle.stop());

        // Several ticks pass with the stop flag raised while the read is still blocked
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(context.stop_requested());
        assert!(!stopping.is_finished());
        // Ours, the handle's, the acquisition thread's and the processing task's
        assert_eq!(Arc::strong_count(&context), 4);

        let report = stopping.await.unwrap().unwrap();
        assert_eq!(report.end, AcquisitionEnd::Stopped);
        assert_eq!(report.cycles_completed, 0);
        assert_eq!(Arc::strong_count(&context), 1);
    }
}
