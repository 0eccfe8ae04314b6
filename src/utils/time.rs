//! Monotonic time sources
//!
//! Everything that measures elapsed time (the playback clock, the scheduler
//! and the simulated backend) reads it through [`TimeSource`], so tests can
//! drive the engine with a manually advanced clock.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of monotonic timestamps
pub trait TimeSource: Send + Sync {
    /// Current monotonic time
    fn now(&self) -> Instant;
}

/// Shared handle to a time source
pub type SharedTimeSource = Arc<dyn TimeSource>;

/// Wall-clock backed time source
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Time source that only moves when told to
#[derive(Debug)]
pub struct ManualTimeSource {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// Total time advanced since creation
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        self.origin + *self.offset.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_time_source_only_moves_on_advance() {
        let time = ManualTimeSource::new();
        let t0 = time.now();
        assert_eq!(time.now(), t0);

        time.advance(Duration::from_millis(250));
        assert_eq!(time.now() - t0, Duration::from_millis(250));
        assert_eq!(time.elapsed(), Duration::from_millis(250));
    }

    #[test]
    fn test_system_time_source_is_monotonic() {
        let time = SystemTimeSource;
        let a = time.now();
        let b = time.now();
        assert!(b >= a);
    }
}
