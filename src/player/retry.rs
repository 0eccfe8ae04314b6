//! Bounded polling
//!
//! Pre-buffering and the post-seek watchdog both follow the same shape:
//! check, and if the condition does not hold yet, check again after a short
//! interval, up to a fixed number of attempts. [`BoundedPoll`] captures that
//! loop as a value so the caller can reschedule itself instead of blocking.

use crate::utils::error::CamSyncError;
use std::path::Path;
use std::time::Duration;

/// Attempt budget and spacing of a bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between attempts
    pub interval: Duration,

    /// Attempts before giving up
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on the time the poll can take
    pub fn window(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Result of one poll attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// The condition held
    Done,

    /// Check again after the given delay
    Retry(Duration),

    /// Budget spent without the condition holding
    Exhausted,
}

/// Attempt counter for one bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedPoll {
    policy: PollPolicy,
    attempts: u32,
}

impl BoundedPoll {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Record one attempt whose condition was `ready`
    pub fn step(&mut self, ready: bool) -> PollStep {
        self.attempts = self.attempts.saturating_add(1);
        if ready {
            PollStep::Done
        } else if self.attempts >= self.policy.max_attempts {
            PollStep::Exhausted
        } else {
            PollStep::Retry(self.policy.interval)
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.policy.max_attempts
    }

    /// Start over with the same policy
    pub fn restart(&mut self) {
        self.attempts = 0;
    }

    /// Timeout error for a pre-buffer poll on `path`
    pub fn into_timeout(self, path: &Path) -> CamSyncError {
        CamSyncError::PreBufferTimeout {
            path: path.to_path_buf(),
            attempts: self.attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(100), 3)
    }

    #[test]
    fn test_done_on_ready() {
        let mut poll = BoundedPoll::new(policy());
        assert_eq!(poll.step(false), PollStep::Retry(Duration::from_millis(100)));
        assert_eq!(poll.step(true), PollStep::Done);
        assert_eq!(poll.attempts(), 2);
    }

    #[test]
    fn test_exhausts_after_budget() {
        let mut poll = BoundedPoll::new(policy());
        assert!(matches!(poll.step(false), PollStep::Retry(_)));
        assert!(matches!(poll.step(false), PollStep::Retry(_)));
        assert_eq!(poll.step(false), PollStep::Exhausted);
        assert!(poll.is_exhausted());

        let err = poll.into_timeout(Path::new("CAM3_20240101_1200.mp4"));
        assert!(matches!(err, CamSyncError::PreBufferTimeout { attempts: 3, .. }));
    }

    #[test]
    fn test_restart() {
        let mut poll = BoundedPoll::new(policy());
        poll.step(false);
        poll.step(false);
        poll.step(false);
        poll.restart();
        assert_eq!(poll.attempts(), 0);
        assert!(matches!(poll.step(false), PollStep::Retry(_)));
    }

    #[test]
    fn test_window() {
        assert_eq!(policy().window(), Duration::from_millis(300));
    }
}
