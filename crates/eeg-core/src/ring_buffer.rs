//! Bounded sample history shared by the acquisition and processing contexts
//!
//! The acquisition thread is the only writer. Readers never see the backing
//! storage: they get an owned copy taken under the same lock as `push`, so a
//! snapshot can never observe a half-written slot.

use crate::error::{EegError, EegResult};
use crate::sample::Sample;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for buffer monitoring
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferMetrics {
    pub total_pushed: u64,
    pub total_evicted: u64,
    pub current_size: usize,
    pub capacity: usize,
}

struct RingState {
    slots: Vec<Sample>,
    /// Index the next push writes to
    cursor: usize,
    len: usize,
}

/// Fixed-capacity, overwrite-oldest buffer of raw samples
pub struct SampleRingBuffer {
    state: Mutex<RingState>,
    capacity: usize,
    total_pushed: AtomicU64,
    total_evicted: AtomicU64,
}

impl SampleRingBuffer {
    /// Create a buffer holding at most `capacity` samples
    pub fn new(capacity: usize) -> EegResult<Self> {
        if capacity == 0 {
            return Err(EegError::config("Buffer capacity must be greater than 0"));
        }

        Ok(Self {
            state: Mutex::new(RingState {
                slots: vec![Sample::new(0); capacity],
                cursor: 0,
                len: 0,
            }),
            capacity,
            total_pushed: AtomicU64::new(0),
            total_evicted: AtomicU64::new(0),
        })
    }

    /// Append one sample, evicting the oldest when full. O(1), never fails.
    pub fn push(&self, sample: Sample) {
        let evicted = {
            let mut state = self.state.lock();
            let cursor = state.cursor;
            state.slots[cursor] = sample;
            state.cursor = (cursor + 1) % self.capacity;
            if state.len < self.capacity {
                state.len += 1;
                false
            } else {
                true
            }
        };

        self.total_pushed.fetch_add(1, Ordering::Relaxed);
        if evicted {
            self.total_evicted.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Append a batch of samples under a single lock acquisition
    pub fn extend<I: IntoIterator<Item = Sample>>(&self, samples: I) {
        let mut pushed = 0u64;
        let mut evicted = 0u64;
        {
            let mut state = self.state.lock();
            for sample in samples {
                let cursor = state.cursor;
                state.slots[cursor] = sample;
                state.cursor = (cursor + 1) % self.capacity;
                if state.len < self.capacity {
                    state.len += 1;
                } else {
                    evicted += 1;
                }
                pushed += 1;
            }
        }
        self.total_pushed.fetch_add(pushed, Ordering::Relaxed);
        self.total_evicted.fetch_add(evicted, Ordering::Relaxed);
    }

    /// Copy of the current contents, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        let state = self.state.lock();
        let mut out = Vec::with_capacity(state.len);

        if state.len < self.capacity {
            out.extend_from_slice(&state.slots[..state.len]);
        } else {
            // Full: the cursor points at the oldest sample
            out.extend_from_slice(&state.slots[state.cursor..]);
            out.extend_from_slice(&state.slots[..state.cursor]);
        }

        out
    }

    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples ever pushed, readable without taking the lock
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed.load(Ordering::Relaxed)
    }

    pub fn metrics(&self) -> BufferMetrics {
        BufferMetrics {
            total_pushed: self.total_pushed.load(Ordering::Relaxed),
            total_evicted: self.total_evicted.load(Ordering::Relaxed),
            current_size: self.len(),
            capacity: self.capacity,
        }
    }

    /// Drop all samples; counters are kept
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.cursor = 0;
        state.len = 0;
    }
}

impl std::fmt::Debug for SampleRingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRingBuffer")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("total_pushed", &self.total_pushed())
            .finish()
    }
}
