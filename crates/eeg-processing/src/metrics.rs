//! Per-cycle timing

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Performance metrics for one processing cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleMetrics {
    /// Wall time spent in the cycle, microseconds
    pub processing_time_us: u64,
    /// Samples in the analysed window
    pub window_len: usize,
    /// Time spent in each stage, microseconds, in execution order
    pub stage_times_us: Vec<(String, u64)>,
}

impl CycleMetrics {
    /// Start timing a cycle
    pub fn start_timing() -> CycleTimer {
        let now = Instant::now();
        CycleTimer {
            start_time: now,
            stage_start: now,
            metrics: CycleMetrics::default(),
        }
    }

    pub fn stage_time_us(&self, stage: &str) -> Option<u64> {
        self.stage_times_us
            .iter()
            .find(|(name, _)| name == stage)
            .map(|(_, us)| *us)
    }
}

/// Helper for timing a cycle and its stages
pub struct CycleTimer {
    start_time: Instant,
    stage_start: Instant,
    metrics: CycleMetrics,
}

impl CycleTimer {
    /// Close the current stage under `name`
    pub fn stage(&mut self, name: &str) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.stage_start).as_micros() as u64;
        self.metrics.stage_times_us.push((name.to_string(), elapsed));
        self.stage_start = now;
    }

    pub fn set_window_len(&mut self, len: usize) {
        self.metrics.window_len = len;
    }

    /// Finish timing and return metrics
    pub fn finish(mut self) -> CycleMetrics {
        self.metrics.processing_time_us = self.start_time.elapsed().as_micros() as u64;
        self.metrics
    }
}
