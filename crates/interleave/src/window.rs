//! Sliding window of byte deliveries.

use std::collections::VecDeque;
use tokio::time::Instant;

/// One delivery of real or padding bytes to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub time: Instant,
    pub size: u64,
}

/// Time-ordered delivery history with a running byte total.
///
/// Samples are appended in time order, so stale samples are always a prefix
/// and pruning never scans past the first sample that is still in the window.
#[derive(Debug, Default)]
pub struct History {
    samples: VecDeque<Sample>,
    total_bytes: u128,
}

impl History {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample. `time` must not precede the last sample's time.
    pub fn push(&mut self, sample: Sample) {
        debug_assert!(self.samples.back().map_or(true, |last| last.time <= sample.time));
        self.total_bytes += u128::from(sample.size);
        self.samples.push_back(sample);
    }

    /// Drop every leading sample with `time < cutoff`. Returns how many were
    /// dropped.
    pub fn prune_before(&mut self, cutoff: Instant) -> usize {
        let mut pruned = 0;
        while let Some(front) = self.samples.front() {
            if front.time >= cutoff {
                break;
            }
            self.total_bytes -= u128::from(front.size);
            self.samples.pop_front();
            pruned += 1;
        }
        pruned
    }

    /// Sum of the sizes of all retained samples. Wide enough that it never
    /// saturates.
    #[must_use]
    pub const fn total_bytes(&self) -> u128 {
        self.total_bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.total_bytes = 0;
    }
}
