//! Wall-clock source used for frame pacing.

use std::time::{Duration, Instant};

use spin_sleep::SpinSleeper;

/// Monotonic microsecond clock that can block the calling thread
pub trait Clock {
    /// Microseconds since an arbitrary fixed origin.
    fn now_micros(&self) -> u64;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Real time, sleeping natively and spinning out the tail
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
    sleeper: SpinSleeper,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            sleeper: SpinSleeper::default(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_micros(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }

    fn sleep(&self, duration: Duration) {
        self.sleeper.sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now_micros();
        clock.sleep(Duration::from_micros(500));
        let b = clock.now_micros();
        assert!(b >= a + 500);
    }
}
