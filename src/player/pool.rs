//! Stream pool
//!
//! Owns the decoder sessions of one selection, in file order, and commands
//! them as a unit. Sessions that fail are kept in place so indices stay
//! stable; they still receive every fan-out command (as logged no-ops) but
//! are ignored by the aggregate reads.

use crate::decoder::{DecoderSession, DrawingTarget, MediaBackend, StreamState};
use crate::player::retry::{BoundedPoll, PollPolicy, PollStep};
use crate::utils::error::{CamSyncError, Result};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Pre-buffer progress of one session
#[derive(Debug)]
enum Slot {
    /// Waiting for the first Playing report
    Pending { poll: BoundedPoll, retried: bool },

    /// Primed and paused
    Ready,

    /// Flagged Error
    Failed,
}

/// Outcome of a finished pre-buffer
#[derive(Debug, Default)]
pub struct PreBufferReport {
    /// Indices of primed sessions
    pub ready: Vec<usize>,

    /// Sessions left flagged Error, with the reason
    pub failed: Vec<(usize, CamSyncError)>,
}

/// Result of one pre-buffer poll
#[derive(Debug)]
pub enum PreBufferProgress {
    /// Poll again after the given delay
    Pending(Duration),

    /// Every session is either primed or flagged Error
    Complete(PreBufferReport),
}

/// Decoder sessions of one selection
pub struct StreamPool {
    /// Backend the sessions were opened on, kept for retries
    backend: Arc<dyn MediaBackend>,

    /// Sessions in selection order
    sessions: Vec<DecoderSession>,

    /// Per-session pre-buffer progress, empty outside pre-buffering
    slots: Vec<Slot>,

    /// Failures recorded while pre-buffering
    failures: Vec<(usize, CamSyncError)>,

    policy: PollPolicy,
}

impl StreamPool {
    /// Open one session per file on its drawing target, in file order
    ///
    /// A file the backend refuses becomes a faulted session; only a
    /// mismatch between files and targets is an error.
    pub fn build(
        backend: Arc<dyn MediaBackend>,
        files: &[PathBuf],
        targets: Vec<DrawingTarget>,
        policy: PollPolicy,
    ) -> Result<Self> {
        if files.is_empty() {
            return Err(CamSyncError::EmptySelection);
        }
        if files.len() != targets.len() {
            return Err(CamSyncError::Presentation(format!(
                "{} drawing targets for {} files",
                targets.len(),
                files.len()
            )));
        }

        let mut sessions = Vec::with_capacity(files.len());
        for (index, (path, target)) in files.iter().zip(targets).enumerate() {
            let session = match DecoderSession::open(index, backend.as_ref(), path, target.clone()) {
                Ok(session) => session,
                Err(e) => {
                    warn!("Opening {:?} failed: {}", path, e);
                    DecoderSession::faulted(index, path, target, e.to_string())
                }
            };
            sessions.push(session);
        }

        info!(
            "Built pool of {} sessions on the {} backend",
            sessions.len(),
            backend.name()
        );

        Ok(Self {
            backend,
            sessions,
            slots: Vec::new(),
            failures: Vec::new(),
            policy,
        })
    }

    /// Start pre-buffering: play every session so the backend decodes a frame
    pub fn begin_prebuffer(&mut self) {
        self.failures.clear();
        let mut slots = Vec::with_capacity(self.sessions.len());

        for index in 0..self.sessions.len() {
            let slot = if self.sessions[index].is_faulted() {
                // Refused at open time; the one retry happens right away
                self.retry(index)
            } else {
                match self.sessions[index].play() {
                    Ok(()) => Slot::Pending {
                        poll: BoundedPoll::new(self.policy),
                        retried: false,
                    },
                    Err(e) => {
                        debug!("Session {} play failed during pre-buffer: {}", index, e);
                        self.retry(index)
                    }
                }
            };
            slots.push(slot);
        }

        self.slots = slots;
    }

    /// Poll every pending session once
    ///
    /// A session that reports Playing is paused immediately. A session that
    /// exhausts its attempts (or reports Error) is reopened once; a second
    /// failure leaves it flagged Error.
    pub fn poll_prebuffer(&mut self) -> PreBufferProgress {
        for index in 0..self.slots.len() {
            let (mut poll, retried) = match &self.slots[index] {
                Slot::Pending { poll, retried } => (*poll, *retried),
                _ => continue,
            };

            let state = self.sessions[index].poll_state();
            let step = match state {
                StreamState::Playing | StreamState::Ended => poll.step(true),
                StreamState::Error => PollStep::Exhausted,
                _ => poll.step(false),
            };

            let next = match step {
                PollStep::Done => {
                    if let Err(e) = self.sessions[index].pause() {
                        warn!("Session {} could not be paused after priming: {}", index, e);
                    }
                    debug!("Session {} primed after {} polls", index, poll.attempts());
                    Slot::Ready
                }
                PollStep::Retry(_) => Slot::Pending { poll, retried },
                PollStep::Exhausted if !retried => {
                    warn!(
                        "Session {} not ready after {} polls ({:?}), reopening",
                        index,
                        poll.attempts(),
                        state
                    );
                    self.retry(index)
                }
                PollStep::Exhausted => {
                    let err = poll.into_timeout(self.sessions[index].path());
                    warn!("{}", err);
                    self.sessions[index].mark_faulted(err.to_string());
                    self.failures.push((index, err));
                    Slot::Failed
                }
            };
            self.slots[index] = next;
        }

        if self.slots.iter().any(|slot| matches!(slot, Slot::Pending { .. })) {
            return PreBufferProgress::Pending(self.policy.interval);
        }

        let ready = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| matches!(slot, Slot::Ready))
            .map(|(index, _)| index)
            .collect();
        self.slots.clear();

        PreBufferProgress::Complete(PreBufferReport {
            ready,
            failed: std::mem::take(&mut self.failures),
        })
    }

    /// Whether a pre-buffer is in progress
    pub fn is_prebuffering(&self) -> bool {
        !self.slots.is_empty()
    }

    /// The single retry: stop, reopen, play again
    fn retry(&mut self, index: usize) -> Slot {
        let session = &mut self.sessions[index];
        let outcome = session
            .reopen(self.backend.as_ref())
            .and_then(|()| session.play());

        match outcome {
            Ok(()) => Slot::Pending {
                poll: BoundedPoll::new(self.policy),
                retried: true,
            },
            Err(e) => {
                warn!("Retry of session {} failed: {}", index, e);
                if !session.is_faulted() {
                    session.mark_faulted(e.to_string());
                }
                self.failures.push((index, e));
                Slot::Failed
            }
        }
    }

    /// Play every session
    pub fn play_all(&mut self) {
        self.fan_out("play", |s| s.play());
    }

    /// Pause every session; already paused or faulted sessions are fine
    pub fn pause_all(&mut self) {
        self.fan_out("pause", |s| s.pause());
    }

    /// Set the rate of every session
    pub fn set_rate_all(&mut self, rate: f32) {
        self.fan_out("set_rate", |s| s.set_rate(rate));
    }

    /// Seek every session, clamping the target to each session's own duration
    pub fn seek_all(&mut self, target_ms: i64) {
        let target = target_ms.max(0) as u64;
        self.fan_out("seek", |s| {
            let clamped = match s.duration_ms() {
                Some(duration) => target.min(duration),
                None => target,
            };
            s.seek(clamped)
        });
    }

    fn fan_out<F>(&mut self, name: &str, mut f: F)
    where
        F: FnMut(&mut DecoderSession) -> Result<()>,
    {
        for session in &mut self.sessions {
            match f(session) {
                Ok(()) => {}
                Err(CamSyncError::SessionFaulted { index }) => {
                    debug!("Skipped {} on faulted session {}", name, index);
                }
                Err(e) => warn!("{} on session {} failed: {}", name, session.index(), e),
            }
        }
    }

    /// Whether any healthy session reports Playing
    pub fn is_any_playing(&mut self) -> bool {
        !self.playing_sessions().is_empty()
    }

    /// Indices of healthy sessions that report Playing
    pub fn playing_sessions(&mut self) -> Vec<usize> {
        self.sessions
            .iter_mut()
            .filter(|s| !s.is_faulted())
            .filter_map(|s| (s.poll_state() == StreamState::Playing).then(|| s.index()))
            .collect()
    }

    /// Pause the given sessions only
    ///
    /// Used by the watchdog to correct sessions that escaped the paused state.
    pub fn force_pause(&mut self, indices: &[usize]) {
        for &index in indices {
            if let Some(session) = self.sessions.get_mut(index) {
                if let Err(e) = session.pause() {
                    warn!("Force pause of session {} failed: {}", index, e);
                }
            }
        }
    }

    /// Mean reported position of healthy sessions, in milliseconds
    pub fn average_position_ms(&self) -> Option<u64> {
        let positions: Vec<u64> = self
            .healthy()
            .filter_map(|s| s.position_ms())
            .collect();
        if positions.is_empty() {
            return None;
        }
        Some(positions.iter().sum::<u64>() / positions.len() as u64)
    }

    /// Longest known duration among healthy sessions, in milliseconds
    pub fn max_duration_ms(&self) -> Option<u64> {
        self.healthy().filter_map(|s| s.duration_ms()).max()
    }

    /// Healthy sessions whose reported position is off the logical position
    /// by more than `tolerance`
    pub fn drifted(&self, logical_ms: u64, tolerance: Duration) -> Vec<(usize, u64)> {
        let tolerance = tolerance.as_millis() as u64;
        self.healthy()
            .filter_map(|s| s.position_ms().map(|p| (s.index(), p)))
            .filter(|&(_, position)| position.abs_diff(logical_ms) > tolerance)
            .collect()
    }

    fn healthy(&self) -> impl Iterator<Item = &DecoderSession> {
        self.sessions.iter().filter(|s| !s.is_faulted())
    }

    pub fn healthy_count(&self) -> usize {
        self.healthy().count()
    }

    pub fn sessions(&self) -> &[DecoderSession] {
        &self.sessions
    }

    /// Refresh and return every session's state, in file order
    pub fn poll_states(&mut self) -> Vec<StreamState> {
        self.sessions.iter_mut().map(|s| s.poll_state()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stop and release every session
    pub fn release(&mut self) {
        self.slots.clear();
        for session in &mut self.sessions {
            session.release();
        }
        info!("Released {} sessions", self.sessions.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{SimulatedBackend, SimulatedMedia};
    use crate::utils::time::ManualTimeSource;
    use std::path::Path;

    struct Fixture {
        time: Arc<ManualTimeSource>,
        backend: Arc<SimulatedBackend>,
    }

    impl Fixture {
        fn new() -> Self {
            let time = Arc::new(ManualTimeSource::new());
            let backend = Arc::new(SimulatedBackend::new(time.clone(), SimulatedMedia::default()));
            Self { time, backend }
        }

        fn pool(&self, names: &[&str]) -> StreamPool {
            let files: Vec<PathBuf> = names.iter().map(PathBuf::from).collect();
            let targets = (0..files.len() as u64)
                .map(|id| DrawingTarget::headless(id, 320, 240))
                .collect();
            let policy = PollPolicy::new(Duration::from_millis(100), 5);
            StreamPool::build(self.backend.clone(), &files, targets, policy).unwrap()
        }

        fn prebuffer(&self, pool: &mut StreamPool) -> PreBufferReport {
            pool.begin_prebuffer();
            for _ in 0..100 {
                self.time.advance(Duration::from_millis(100));
                if let PreBufferProgress::Complete(report) = pool.poll_prebuffer() {
                    return report;
                }
            }
            panic!("pre-buffer never completed");
        }
    }

    #[test]
    fn test_build_rejects_mismatched_targets() {
        let fixture = Fixture::new();
        let files = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];
        let targets = vec![DrawingTarget::headless(0, 1, 1)];
        let policy = PollPolicy::new(Duration::from_millis(100), 5);
        let result = StreamPool::build(fixture.backend.clone(), &files, targets, policy);
        assert!(matches!(result, Err(CamSyncError::Presentation(_))));

        let result = StreamPool::build(fixture.backend.clone(), &[], Vec::new(), policy);
        assert!(matches!(result, Err(CamSyncError::EmptySelection)));
    }

    #[test]
    fn test_prebuffer_leaves_sessions_paused() {
        let fixture = Fixture::new();
        let mut pool = fixture.pool(&["a.mp4", "b.mp4", "c.mp4"]);

        let report = fixture.prebuffer(&mut pool);
        assert_eq!(report.ready, vec![0, 1, 2]);
        assert!(report.failed.is_empty());
        assert!(!pool.is_prebuffering());
        assert!(!pool.is_any_playing());

        for name in ["a.mp4", "b.mp4", "c.mp4"] {
            let probe = fixture.backend.probe(Path::new(name)).unwrap();
            assert_eq!(probe.state(), StreamState::Paused);
            assert_eq!(probe.play_requests(), 1);
        }
    }

    #[test]
    fn test_corrupt_file_is_retried_once_then_flagged() {
        let fixture = Fixture::new();
        fixture.backend.configure("bad.mp4", SimulatedMedia::corrupt());
        let mut pool = fixture.pool(&["a.mp4", "bad.mp4", "c.mp4"]);
        assert!(pool.sessions()[1].is_faulted());

        let report = fixture.prebuffer(&mut pool);
        assert_eq!(report.ready, vec![0, 2]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 1);
        assert!(matches!(report.failed[0].1, CamSyncError::MediaOpen { .. }));
        assert_eq!(fixture.backend.open_count(Path::new("bad.mp4")), 2);
        assert_eq!(pool.healthy_count(), 2);
    }

    #[test]
    fn test_stalled_session_recovers_on_retry() {
        let fixture = Fixture::new();
        fixture.backend.configure(
            "slow.mp4",
            SimulatedMedia {
                stalled_opens: 1,
                ..SimulatedMedia::default()
            },
        );
        let mut pool = fixture.pool(&["a.mp4", "slow.mp4"]);

        let report = fixture.prebuffer(&mut pool);
        assert_eq!(report.ready, vec![0, 1]);
        assert_eq!(fixture.backend.open_count(Path::new("slow.mp4")), 2);
    }

    #[test]
    fn test_session_that_never_starts_times_out() {
        let fixture = Fixture::new();
        fixture.backend.configure(
            "dead.mp4",
            SimulatedMedia {
                stalled_opens: u32::MAX,
                ..SimulatedMedia::default()
            },
        );
        let mut pool = fixture.pool(&["a.mp4", "dead.mp4"]);

        let report = fixture.prebuffer(&mut pool);
        assert_eq!(report.ready, vec![0]);
        assert!(matches!(
            report.failed[0],
            (1, CamSyncError::PreBufferTimeout { attempts: 5, .. })
        ));
        assert!(pool.sessions()[1].is_faulted());
    }

    #[test]
    fn test_pause_all_is_idempotent() {
        let fixture = Fixture::new();
        fixture.backend.configure("bad.mp4", SimulatedMedia::corrupt());
        let mut pool = fixture.pool(&["a.mp4", "bad.mp4"]);
        fixture.prebuffer(&mut pool);

        let before = pool.poll_states();
        pool.pause_all();
        pool.pause_all();
        let after = pool.poll_states();
        assert_eq!(before, after);
        assert_eq!(after, vec![StreamState::Paused, StreamState::Error]);
    }

    #[test]
    fn test_seek_all_clamps_per_session() {
        let fixture = Fixture::new();
        fixture
            .backend
            .configure("short.mp4", SimulatedMedia::with_duration(Duration::from_millis(599_960)));
        let mut pool = fixture.pool(&["a.mp4", "short.mp4"]);
        fixture.prebuffer(&mut pool);

        pool.seek_all(700_000);
        let long = fixture.backend.probe(Path::new("a.mp4")).unwrap();
        let short = fixture.backend.probe(Path::new("short.mp4")).unwrap();
        assert_eq!(long.seek_requests(), vec![Duration::from_secs(600)]);
        assert_eq!(short.seek_requests(), vec![Duration::from_millis(599_960)]);

        pool.seek_all(-5_000);
        assert_eq!(long.seek_requests()[1], Duration::ZERO);
    }

    #[test]
    fn test_average_position_excludes_faulted() {
        let fixture = Fixture::new();
        fixture.backend.configure("bad.mp4", SimulatedMedia::corrupt());
        let mut pool = fixture.pool(&["a.mp4", "bad.mp4", "c.mp4"]);
        fixture.prebuffer(&mut pool);

        pool.seek_all(30_000);
        assert_eq!(pool.average_position_ms(), Some(30_000));
        assert_eq!(pool.max_duration_ms(), Some(600_000));

        assert!(pool.drifted(30_000, Duration::from_millis(500)).is_empty());
        assert_eq!(pool.drifted(40_000, Duration::from_millis(500)).len(), 2);
    }

    #[test]
    fn test_play_all_skips_faulted() {
        let fixture = Fixture::new();
        fixture.backend.configure("bad.mp4", SimulatedMedia::corrupt());
        let mut pool = fixture.pool(&["a.mp4", "bad.mp4"]);
        fixture.prebuffer(&mut pool);

        pool.play_all();
        assert_eq!(pool.playing_sessions(), vec![0]);

        pool.release();
        assert!(!pool.is_any_playing());
    }
}
