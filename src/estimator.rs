//! Frame Time Estimator
//!
//! Tracks present timestamps and keeps a smoothed estimate of the display's
//! real refresh period. The nominal rate only seeds the estimate; real
//! displays drift from what they report.

use std::collections::VecDeque;

use tracing::{debug, trace};

/// Number of raw timestamps retained
pub const HISTORY_LEN: usize = 16;

/// Weight of a new in-band sample in the moving average
pub const SMOOTHING_WEIGHT: f64 = 1.0 / 16.0;

/// Deltas at or above this multiple of the estimate are stalls
pub const UPPER_BAND: f64 = 1.5;

/// Deltas at or below this multiple of the estimate are double presents
pub const LOWER_BAND: f64 = 0.5;

/// Nominal period in microseconds for a rate in deci-Hertz.
pub fn period_from_dhz(dhz: u32) -> u64 {
    if dhz == 0 {
        return 0;
    }
    let dhz = u64::from(dhz);
    (10_000_000 + dhz / 2) / dhz
}

/// Smoothed display period estimate
#[derive(Debug, Clone)]
pub struct FrameTimeEstimator {
    /// Current estimate in microseconds, 0 until known
    estimate: f64,
    history: VecDeque<u64>,
    accepted: u64,
    rejected: u64,
}

impl Default for FrameTimeEstimator {
    fn default() -> Self {
        Self::new(0)
    }
}

impl FrameTimeEstimator {
    /// Create an estimator seeded from a nominal rate (0 = unknown).
    pub fn new(rate_dhz: u32) -> Self {
        Self {
            estimate: period_from_dhz(rate_dhz) as f64,
            history: VecDeque::with_capacity(HISTORY_LEN),
            accepted: 0,
            rejected: 0,
        }
    }

    /// Re-arm for a new nominal rate, dropping all history.
    pub fn reset(&mut self, rate_dhz: u32) {
        debug!(
            "Frame time estimator reset to {} dHz ({} us)",
            rate_dhz,
            period_from_dhz(rate_dhz)
        );
        *self = Self::new(rate_dhz);
    }

    /// Record a present timestamp in microseconds.
    pub fn update(&mut self, timestamp: u64) {
        if let Some(&last) = self.history.back() {
            let delta = timestamp.saturating_sub(last) as f64;

            if self.estimate <= 0.0 {
                if delta > 0.0 {
                    self.estimate = delta;
                    self.accepted += 1;
                }
            } else if delta > self.estimate * LOWER_BAND && delta < self.estimate * UPPER_BAND {
                self.estimate += (delta - self.estimate) * SMOOTHING_WEIGHT;
                self.accepted += 1;
            } else {
                trace!(
                    "Discarding frame delta {} us (estimate {:.0} us)",
                    delta,
                    self.estimate
                );
                self.rejected += 1;
            }
        }

        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(timestamp);
    }

    /// Current estimate in microseconds (0 if unknown).
    pub fn estimate(&self) -> u64 {
        self.estimate.round() as u64
    }

    /// Last raw timestamp recorded.
    pub fn last_sample_time(&self) -> Option<u64> {
        self.history.back().copied()
    }

    /// Retained timestamps, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = u64> + '_ {
        self.history.iter().copied()
    }

    /// Number of deltas blended into the estimate.
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Number of deltas discarded as stalls or double presents.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// First refresh boundary strictly after `now`, projected from the last
    /// sample. `None` without an estimate or a sample.
    pub fn next_boundary(&self, now: u64) -> Option<u64> {
        let period = self.estimate();
        let last = self.last_sample_time()?;
        if period == 0 {
            return None;
        }
        if now < last {
            return Some(last + period);
        }
        let periods = (now - last) / period + 1;
        Some(last + periods * period)
    }
}
