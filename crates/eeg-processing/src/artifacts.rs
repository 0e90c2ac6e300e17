//! Amplitude artifact detection and repair
//!
//! Flagged samples are replaced by linear interpolation over sample index
//! between the nearest unflagged neighbours. Flagged runs at either edge take
//! the value of the nearest unflagged sample. With fewer than two unflagged
//! anchors there is nothing to interpolate and flagged samples become zero.
//! Windows are processed independently; no state carries over.

use tracing::debug;

/// Threshold-based artifact sanitizer for one window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArtifactSanitizer {
    threshold: f64,
}

impl ArtifactSanitizer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Mask of samples whose absolute value exceeds the threshold
    pub fn detect(&self, window: &[f64]) -> Vec<bool> {
        window.iter().map(|x| x.abs() > self.threshold).collect()
    }

    /// Copy of `window` with every masked sample repaired
    pub fn repair(&self, window: &[f64], mask: &[bool]) -> Vec<f64> {
        debug_assert_eq!(window.len(), mask.len());
        let mut out = window.to_vec();

        let anchors: Vec<usize> = (0..window.len()).filter(|&i| !mask[i]).collect();
        if anchors.len() == window.len() {
            return out;
        }

        if anchors.len() < 2 {
            for (value, &flagged) in out.iter_mut().zip(mask) {
                if flagged {
                    *value = 0.0;
                }
            }
            return out;
        }

        // `next` is the index into `anchors` of the first anchor after i
        let mut next = 0;
        for i in 0..window.len() {
            if !mask[i] {
                next += 1;
                continue;
            }

            out[i] = if next == 0 {
                window[anchors[0]]
            } else if next == anchors.len() {
                window[anchors[anchors.len() - 1]]
            } else {
                let left = anchors[next - 1];
                let right = anchors[next];
                let t = (i - left) as f64 / (right - left) as f64;
                window[left] + t * (window[right] - window[left])
            };
        }

        out
    }

    /// Detect and repair in place, returning the number of repaired samples
    pub fn sanitize(&self, window: &mut [f64]) -> usize {
        let mask = self.detect(window);
        let flagged = mask.iter().filter(|&&m| m).count();
        if flagged > 0 {
            let repaired = self.repair(window, &mask);
            window.copy_from_slice(&repaired);
            debug!(flagged, threshold = self.threshold, "repaired artifact samples");
        }
        flagged
    }
}
