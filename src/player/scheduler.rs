//! Cooperative timer queue
//!
//! The engine never sleeps. Follow-up work (the next pre-buffer poll, the
//! next watchdog poll, the end of a skip's settle delay, the display tick)
//! is queued here with a due time and run by the owner of the UI loop when
//! it calls `poll`. Every task is tagged with the epoch of the selection it
//! belongs to, so work queued for a replaced selection is discarded.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Deferred work items
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Poll pre-buffering sessions
    PreBufferPoll,

    /// Poll for sessions that escaped the paused state
    WatchdogPoll,

    /// End of a skip's settle delay
    SettleSkip,

    /// Refresh the time display
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    due: Instant,
    seq: u64,
    epoch: u64,
    task: Task,
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.due.cmp(&other.due).then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Timer queue ordered by due time, FIFO among equal due times
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Reverse<Entry>>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` to run at `now + delay`
    pub fn schedule(&mut self, now: Instant, delay: Duration, epoch: u64, task: Task) {
        let entry = Entry {
            due: now + delay,
            seq: self.next_seq,
            epoch,
            task,
        };
        self.next_seq += 1;
        self.queue.push(Reverse(entry));
    }

    /// Pop the earliest task due at or before `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<(u64, Task)> {
        match self.queue.peek() {
            Some(Reverse(entry)) if entry.due <= now => {
                let Reverse(entry) = self.queue.pop()?;
                Some((entry.epoch, entry.task))
            }
            _ => None,
        }
    }

    /// Whether a task of this kind is queued for `epoch`
    pub fn is_pending(&self, epoch: u64, task: Task) -> bool {
        self.queue
            .iter()
            .any(|Reverse(entry)| entry.epoch == epoch && entry.task == task)
    }

    /// Time until the earliest queued task
    pub fn next_due_in(&self, now: Instant) -> Option<Duration> {
        self.queue
            .peek()
            .map(|Reverse(entry)| entry.due.saturating_duration_since(now))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_due_order() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        scheduler.schedule(now, Duration::from_millis(300), 1, Task::SettleSkip);
        scheduler.schedule(now, Duration::from_millis(100), 1, Task::WatchdogPoll);
        scheduler.schedule(now, Duration::from_millis(100), 1, Task::Tick);

        assert_eq!(scheduler.pop_due(now), None);

        let later = now + Duration::from_millis(100);
        assert_eq!(scheduler.pop_due(later), Some((1, Task::WatchdogPoll)));
        assert_eq!(scheduler.pop_due(later), Some((1, Task::Tick)));
        assert_eq!(scheduler.pop_due(later), None);

        assert_eq!(scheduler.next_due_in(later), Some(Duration::from_millis(200)));
        assert_eq!(
            scheduler.pop_due(now + Duration::from_secs(1)),
            Some((1, Task::SettleSkip))
        );
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_is_pending_is_epoch_scoped() {
        let mut scheduler = Scheduler::new();
        let now = Instant::now();
        scheduler.schedule(now, Duration::ZERO, 4, Task::WatchdogPoll);
        assert!(scheduler.is_pending(4, Task::WatchdogPoll));
        assert!(!scheduler.is_pending(5, Task::WatchdogPoll));
        assert!(!scheduler.is_pending(4, Task::Tick));

        scheduler.clear();
        assert_eq!(scheduler.len(), 0);
    }
}
