//! Frame clock.
use std::{
    thread,
    time::{Duration, Instant},
};

use crate::vm::Hz;

/// Timer to synchronize a thread with a fixed rate software clock.
///
/// It is designed to work with the yielding cooperative pattern
/// of the driver loop. When the VM yields control back to the
/// caller, time elapses until it is resumed. Once the loop
/// is resumed, the elapsed time is taken into account when determining
/// the next cycle.
pub struct Clock {
    start: Instant,
    interval: Duration,
}

impl Clock {
    /// Creates a new clock with the current time as internal state.
    pub fn new(frequency: Hz) -> Self {
        Self {
            start: Instant::now(),
            interval: frequency.into(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Set the clock state back to zero.
    pub fn reset(&mut self) {
        self.start = Instant::now()
    }

    /// Block the current thread until the next clock cycle.
    pub fn wait(&mut self) {
        while self.start.elapsed() < self.interval {
            // Sleep does not have enough resolution at 60 Hz.
            //
            // Spinning a loop causes high CPU usage and fan madness.
            //
            // Yielding in a loop is the best alternative.
            thread::yield_now();
        }

        // Reset back to zero, rather than trying to catch up.
        //
        // If the VM was paused for debugging, and a large
        // amount of time has elapsed until it is resumed,
        // it should simply continue at the next cycle running
        // at its usual speed.
        self.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clock_wait() {
        let mut clock = Clock::new(Hz(200));
        assert_eq!(clock.interval(), Duration::from_millis(5));

        let start = Instant::now();
        clock.wait();
        clock.wait();
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_clock_zero_frequency() {
        // Zero frequency has no interval to wait on.
        let mut clock = Clock::new(Hz(0));
        assert_eq!(clock.interval(), Duration::ZERO);
        clock.wait();
    }
}
