//! Logical playback clock
//!
//! The single source of truth for elapsed footage time. Decoders report
//! stale or lagging positions right after seeks, so the displayed timer and
//! every seek target are computed from wall-clock intervals instead:
//!
//! ```text
//! stopped: position = manual_offset
//! running: position = manual_offset + (now - start_reference) * rate
//! ```

use crate::utils::time::SharedTimeSource;
use log::debug;
use std::time::Instant;

/// Logical playback clock
pub struct PlaybackClock {
    /// Time source the running interval is measured with
    time: SharedTimeSource,

    /// When the current running interval began, `None` while stopped
    start_reference: Option<Instant>,

    /// Seconds accumulated from finished intervals and seeks
    manual_offset: f64,

    /// Multiplier applied to the running interval
    rate: f64,
}

impl PlaybackClock {
    pub fn new(time: SharedTimeSource) -> Self {
        Self {
            time,
            start_reference: None,
            manual_offset: 0.0,
            rate: 1.0,
        }
    }

    /// Begin a running interval; no-op if already running
    pub fn start(&mut self) {
        if self.start_reference.is_none() {
            self.start_reference = Some(self.time.now());
        }
    }

    /// Fold the running interval into the offset and stop
    pub fn stop(&mut self) {
        if let Some(started) = self.start_reference.take() {
            let elapsed = self.time.now().saturating_duration_since(started).as_secs_f64();
            self.manual_offset += elapsed * self.rate;
            debug!(
                "Clock stopped after {:.3}s at {:.2}x, offset {:.3}s",
                elapsed, self.rate, self.manual_offset
            );
        }
    }

    /// Shift the logical position by `delta_seconds`
    ///
    /// Callers stop the clock first; the result never goes below zero.
    pub fn add_offset(&mut self, delta_seconds: f64) {
        debug_assert!(
            self.start_reference.is_none(),
            "add_offset on a running clock would double count"
        );
        self.manual_offset = (self.manual_offset + delta_seconds).max(0.0);
    }

    /// Place a stopped clock at an absolute position
    pub fn set_position(&mut self, seconds: f64) {
        debug_assert!(self.start_reference.is_none());
        self.manual_offset = seconds.max(0.0);
    }

    /// Current logical position in seconds
    pub fn position_seconds(&self) -> f64 {
        match self.start_reference {
            None => self.manual_offset,
            Some(started) => {
                let elapsed = self.time.now().saturating_duration_since(started).as_secs_f64();
                self.manual_offset + elapsed * self.rate
            }
        }
    }

    /// Set the multiplier for the running interval
    ///
    /// Already accumulated offset is never rescaled.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn is_running(&self) -> bool {
        self.start_reference.is_some()
    }

    /// Zero the clock; the rate is kept
    pub fn reset(&mut self) {
        self.start_reference = None;
        self.manual_offset = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::ManualTimeSource;
    use std::sync::Arc;
    use std::time::Duration;

    fn clock() -> (Arc<ManualTimeSource>, PlaybackClock) {
        let time = Arc::new(ManualTimeSource::new());
        let clock = PlaybackClock::new(time.clone());
        (time, clock)
    }

    #[test]
    fn test_stopped_clock_reports_offset() {
        let (time, mut clock) = clock();
        clock.add_offset(12.5);
        time.advance(Duration::from_secs(3));
        assert_eq!(clock.position_seconds(), 12.5);
        assert!(!clock.is_running());
    }

    #[test]
    fn test_running_interval_accumulates() {
        let (time, mut clock) = clock();
        clock.start();
        time.advance(Duration::from_secs(4));
        assert_eq!(clock.position_seconds(), 4.0);

        clock.stop();
        time.advance(Duration::from_secs(10));
        assert_eq!(clock.position_seconds(), 4.0);

        clock.start();
        time.advance(Duration::from_secs(1));
        clock.stop();
        assert_eq!(clock.position_seconds(), 5.0);
    }

    #[test]
    fn test_rate_scales_only_running_interval() {
        let (time, mut clock) = clock();
        clock.add_offset(10.0);
        clock.set_rate(2.0);
        clock.start();
        time.advance(Duration::from_secs(5));
        clock.stop();
        assert_eq!(clock.position_seconds(), 20.0);

        clock.set_rate(0.5);
        assert_eq!(clock.position_seconds(), 20.0);
        clock.start();
        time.advance(Duration::from_secs(4));
        assert_eq!(clock.position_seconds(), 22.0);
    }

    #[test]
    fn test_offset_never_negative() {
        let (_time, mut clock) = clock();
        clock.add_offset(3.0);
        clock.add_offset(-50.0);
        assert_eq!(clock.position_seconds(), 0.0);

        clock.set_position(-4.0);
        assert_eq!(clock.position_seconds(), 0.0);
    }

    #[test]
    fn test_monotonic_while_running() {
        let (time, mut clock) = clock();
        clock.set_rate(0.25);
        clock.start();
        let mut last = clock.position_seconds();
        for _ in 0..20 {
            time.advance(Duration::from_millis(130));
            let now = clock.position_seconds();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn test_start_twice_keeps_first_reference() {
        let (time, mut clock) = clock();
        clock.start();
        time.advance(Duration::from_secs(2));
        clock.start();
        time.advance(Duration::from_secs(1));
        assert_eq!(clock.position_seconds(), 3.0);
    }

    #[test]
    fn test_reset_zeroes_but_keeps_rate() {
        let (time, mut clock) = clock();
        clock.set_rate(4.0);
        clock.start();
        time.advance(Duration::from_secs(1));
        clock.reset();
        assert_eq!(clock.position_seconds(), 0.0);
        assert!(!clock.is_running());
        assert_eq!(clock.rate(), 4.0);
    }
}
