//! Transport controller implementation for camsync
//!
//! This module provides the TransportController, the state machine that
//! turns user intents into pool and clock operations. All follow-up work
//! (pre-buffer polls, watchdog polls, the end of a skip's settle delay and
//! the display tick) runs from `poll`, so the controller never blocks the
//! loop that drives it.

use crate::decoder::{MediaBackend, StreamState};
use crate::footage::Selection;
use crate::player::clock::PlaybackClock;
use crate::player::commands::TransportCommand;
use crate::player::pool::{PreBufferProgress, PreBufferReport, StreamPool};
use crate::player::retry::{BoundedPoll, PollPolicy, PollStep};
use crate::player::scheduler::{Scheduler, Task};
use crate::player::{PlayerEvent, PlayerEventHandler, TransportState};
use crate::surface::PresentationSurface;
use crate::utils::config::{Config, PlaybackConfig, SyncConfig};
use crate::utils::error::{CamSyncError, Result};
use crate::utils::time::SharedTimeSource;
use crate::utils::{format_duration, parse_time_input};

use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Seek request resolved against the clock once the controls accept it
#[derive(Debug, Clone, Copy)]
enum SeekRequest {
    /// Signed delta in seconds
    Relative(f64),

    /// Absolute logical position in seconds
    Absolute(f64),

    /// Fraction of the longest healthy duration, in percent
    Percent(f64),
}

/// Ceiling for the logical position while no healthy session reports a
/// duration
const UNKNOWN_DURATION_LIMIT_SECONDS: f64 = 24.0 * 3600.0;

/// Everything that lives exactly as long as one selection
struct PlaybackSession {
    selection: Selection,
    pool: StreamPool,

    /// Post-seek watchdog, `None` when idle
    watchdog: Option<BoundedPoll>,

    /// Sessions currently reported as out of tolerance
    drifting: Vec<usize>,
}

/// Per-session part of a status snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub index: usize,
    pub path: PathBuf,
    pub state: StreamState,
    pub position_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub fault: Option<String>,
}

/// Snapshot of the transport for display and scripting
#[derive(Debug, Clone, Serialize)]
pub struct TransportStatus {
    pub state: TransportState,
    pub controls_enabled: bool,
    pub selection: Option<String>,
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub speed: f32,
    pub average_position_seconds: Option<f64>,
    pub sessions: Vec<SessionStatus>,
}

/// Main transport controller
pub struct TransportController {
    // Collaborators
    backend: Arc<dyn MediaBackend>,
    time: SharedTimeSource,
    surface: Box<dyn PresentationSurface>,

    // Configuration
    playback: PlaybackConfig,
    sync: SyncConfig,

    // State
    state: TransportState,
    clock: PlaybackClock,
    speed: f32,
    session: Option<PlaybackSession>,

    // Deferred work; tasks from older epochs are dropped
    scheduler: Scheduler,
    epoch: u64,

    // Event handling
    event_handlers: Vec<Box<dyn PlayerEventHandler>>,
}

impl TransportController {
    pub fn new(
        config: &Config,
        backend: Arc<dyn MediaBackend>,
        time: SharedTimeSource,
        surface: Box<dyn PresentationSurface>,
    ) -> Self {
        let speed = config.playback.initial_speed;
        let mut clock = PlaybackClock::new(Arc::clone(&time));
        clock.set_rate(speed as f64);

        Self {
            backend,
            time,
            surface,
            playback: config.playback.clone(),
            sync: config.sync.clone(),
            state: TransportState::Idle,
            clock,
            speed,
            session: None,
            scheduler: Scheduler::new(),
            epoch: 0,
            event_handlers: Vec::new(),
        }
    }

    /// Register an event handler
    pub fn add_event_handler(&mut self, handler: Box<dyn PlayerEventHandler>) {
        self.event_handlers.push(handler);
    }

    /// Replace the current selection and start pre-buffering it
    ///
    /// Controls stay disabled until pre-buffering completes. Only a broken
    /// presentation surface makes this fail.
    pub fn load_selection(&mut self, selection: Selection) -> Result<()> {
        if let Some(mut previous) = self.session.take() {
            info!("Replacing selection {}", previous.selection.name());
            previous.pool.release();
        }

        self.epoch += 1;
        self.scheduler.clear();
        self.clock.reset();
        self.set_state(TransportState::Buffering);

        let targets = match self.surface.drawing_targets(&selection) {
            Ok(targets) => targets,
            Err(e) => {
                error!("Presentation surface failed: {}", e);
                self.set_state(TransportState::Idle);
                return Err(e);
            }
        };

        let policy = PollPolicy::new(
            self.sync.prebuffer_poll_interval(),
            self.sync.prebuffer_max_attempts,
        );
        let mut pool =
            match StreamPool::build(Arc::clone(&self.backend), selection.files(), targets, policy) {
                Ok(pool) => pool,
                Err(e) => {
                    error!("Could not build stream pool: {}", e);
                    self.set_state(TransportState::Idle);
                    return Err(e);
                }
            };

        if (self.speed - 1.0).abs() > f32::EPSILON {
            pool.set_rate_all(self.speed);
        }
        pool.begin_prebuffer();

        info!(
            "Loading {} ({} cameras), pre-buffering",
            selection.name(),
            selection.len()
        );
        let event = PlayerEvent::SelectionLoaded {
            name: selection.name().to_string(),
            sessions: selection.len(),
        };
        self.session = Some(PlaybackSession {
            selection,
            pool,
            watchdog: None,
            drifting: Vec::new(),
        });

        self.schedule(self.sync.prebuffer_poll_interval(), Task::PreBufferPoll);
        self.schedule(self.playback.tick_interval(), Task::Tick);
        self.emit(event);
        self.update_display();
        Ok(())
    }

    /// Run every task that is due
    pub fn poll(&mut self) {
        let now = self.time.now();
        while let Some((epoch, task)) = self.scheduler.pop_due(now) {
            if epoch != self.epoch {
                debug!("Dropping {:?} from epoch {}", task, epoch);
                continue;
            }
            match task {
                Task::PreBufferPoll => self.on_prebuffer_poll(),
                Task::WatchdogPoll => self.on_watchdog_poll(),
                Task::SettleSkip => self.on_settle(),
                Task::Tick => self.on_tick(),
            }
        }
    }

    /// Time until the next queued task
    pub fn next_due_in(&self) -> Option<Duration> {
        self.scheduler.next_due_in(self.time.now())
    }

    /// Pause if anything plays, otherwise play
    pub fn toggle_play_pause(&mut self) -> Result<TransportState> {
        self.ensure_controls()?;
        let session = self
            .session
            .as_mut()
            .ok_or(CamSyncError::ControlsDisabled(self.state))?;

        if self.state == TransportState::Playing || session.pool.is_any_playing() {
            session.pool.pause_all();
            self.clock.stop();
            self.set_state(TransportState::Paused);
            self.emit(PlayerEvent::PlaybackPaused);
        } else {
            if let Some(end) = session.pool.max_duration_ms() {
                if self.clock.position_seconds() * 1000.0 >= end as f64 {
                    info!("At end of footage, seek back to play again");
                    return Ok(self.state);
                }
            }
            session.watchdog = None;
            session.pool.play_all();
            self.clock.start();
            self.set_state(TransportState::Playing);
            self.emit(PlayerEvent::PlaybackStarted);
        }

        self.update_display();
        Ok(self.state)
    }

    /// Skip by `delta_seconds`, settling paused under the watchdog
    pub fn skip(&mut self, delta_seconds: f64) -> Result<f64> {
        if !delta_seconds.is_finite() {
            return Err(CamSyncError::InvalidTimeInput(delta_seconds.to_string()));
        }
        self.begin_seek(SeekRequest::Relative(delta_seconds))
    }

    /// Seek to an absolute logical position
    pub fn seek_to(&mut self, seconds: f64) -> Result<f64> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(CamSyncError::InvalidTimeInput(seconds.to_string()));
        }
        self.begin_seek(SeekRequest::Absolute(seconds))
    }

    /// Seek to a percentage of the longest healthy duration
    pub fn seek_percent(&mut self, percent: f64) -> Result<f64> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(CamSyncError::InvalidTimeInput(format!("{}%", percent)));
        }
        self.begin_seek(SeekRequest::Percent(percent))
    }

    /// Seek to a user-entered time (`HH:MM:SS`, `MM:SS` or seconds)
    pub fn jump_to(&mut self, text: &str) -> Result<f64> {
        let seconds = parse_time_input(text)?;
        self.seek_to(seconds)
    }

    /// Change the playback rate of every session and of the clock
    ///
    /// While playing, the interval so far is folded at the old rate first.
    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(CamSyncError::InvalidSpeed(speed));
        }
        self.ensure_controls()?;

        if self.clock.is_running() {
            self.clock.stop();
            self.clock.set_rate(speed as f64);
            self.clock.start();
        } else {
            self.clock.set_rate(speed as f64);
        }

        if let Some(session) = self.session.as_mut() {
            session.pool.set_rate_all(speed);
        }

        info!("Playback speed: {}x", speed);
        self.speed = speed;
        self.surface.show_transport(self.state, speed);
        self.emit(PlayerEvent::SpeedChanged { speed });
        Ok(())
    }

    /// Release every session, reset the clock and close the window
    pub fn stop_app(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.pool.pause_all();
            session.pool.release();
        }

        self.clock.reset();
        self.scheduler.clear();
        self.epoch += 1;
        self.state = TransportState::Idle;
        self.surface.teardown();

        info!("Playback stopped");
        self.emit(PlayerEvent::Stopped);
    }

    /// Dispatch a bound command
    pub fn execute(&mut self, command: &TransportCommand) -> Result<()> {
        debug!("Executing {:?}", command);
        match command {
            TransportCommand::TogglePlayPause => self.toggle_play_pause().map(|_| ()),
            TransportCommand::Stop => {
                self.stop_app();
                Ok(())
            }
            TransportCommand::SetSpeed(speed) => self.set_speed(*speed),
            TransportCommand::Skip(delta) => self.skip(*delta).map(|_| ()),
            TransportCommand::JumpTo(text) => self.jump_to(text).map(|_| ()),
            TransportCommand::SeekPercent(percent) => self.seek_percent(*percent).map(|_| ()),
        }
    }

    /// Current state and per-session details
    pub fn status(&mut self) -> TransportStatus {
        let position_seconds = self.clock.position_seconds();
        let mut status = TransportStatus {
            state: self.state,
            controls_enabled: self.state.controls_enabled(),
            selection: None,
            position_seconds,
            duration_seconds: None,
            speed: self.speed,
            average_position_seconds: None,
            sessions: Vec::new(),
        };

        if let Some(session) = self.session.as_mut() {
            status.selection = Some(session.selection.name().to_string());
            status.duration_seconds = session.pool.max_duration_ms().map(|ms| ms as f64 / 1000.0);
            status.average_position_seconds =
                session.pool.average_position_ms().map(|ms| ms as f64 / 1000.0);
            let states = session.pool.poll_states();
            status.sessions = session
                .pool
                .sessions()
                .iter()
                .zip(states)
                .map(|(s, state)| SessionStatus {
                    index: s.index(),
                    path: s.path().to_path_buf(),
                    state,
                    position_ms: s.position_ms(),
                    duration_ms: s.duration_ms(),
                    fault: s.fault().map(str::to_string),
                })
                .collect();
        }

        status
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Logical position in seconds
    pub fn position_seconds(&self) -> f64 {
        self.clock.position_seconds()
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.session.as_ref().map(|s| &s.selection)
    }

    pub fn pool(&self) -> Option<&StreamPool> {
        self.session.as_ref().map(|s| &s.pool)
    }

    /// Whether the post-seek watchdog is still polling
    pub fn watchdog_active(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.watchdog.is_some())
            .unwrap_or(false)
    }

    fn ensure_controls(&self) -> Result<()> {
        if self.state.controls_enabled() {
            Ok(())
        } else {
            Err(CamSyncError::ControlsDisabled(self.state))
        }
    }

    /// Shared skip/seek sequence
    ///
    /// disable controls, pause, stop the clock, move it, seek every session,
    /// then let the watchdog and the settle delay bring the state back to
    /// Paused.
    fn begin_seek(&mut self, request: SeekRequest) -> Result<f64> {
        match self.state {
            TransportState::Skipping => {
                warn!("Skip rejected, previous skip still settling");
                return Err(CamSyncError::SkipInFlight);
            }
            TransportState::Idle | TransportState::Buffering => {
                return Err(CamSyncError::ControlsDisabled(self.state));
            }
            TransportState::Paused | TransportState::Playing => {}
        }

        let max_duration_ms = self
            .session
            .as_ref()
            .ok_or(CamSyncError::ControlsDisabled(self.state))?
            .pool
            .max_duration_ms();

        if let SeekRequest::Percent(_) = request {
            if max_duration_ms.is_none() {
                return Err(CamSyncError::InvalidTimeInput(
                    "duration not known yet".to_string(),
                ));
            }
        }

        self.set_state(TransportState::Skipping);

        let Some(session) = self.session.as_mut() else {
            return Err(CamSyncError::ControlsDisabled(self.state));
        };
        session.pool.pause_all();
        self.clock.stop();

        match request {
            SeekRequest::Relative(delta) => self.clock.add_offset(delta),
            SeekRequest::Absolute(seconds) => self.clock.set_position(seconds),
            SeekRequest::Percent(percent) => {
                let total = max_duration_ms.unwrap_or(0) as f64 / 1000.0;
                self.clock.set_position(total * percent / 100.0);
            }
        }
        let max_seconds = max_duration_ms
            .map(|ms| ms as f64 / 1000.0)
            .unwrap_or(UNKNOWN_DURATION_LIMIT_SECONDS);
        if self.clock.position_seconds() > max_seconds {
            self.clock.set_position(max_seconds);
        }

        let target = self.clock.position_seconds();
        session.pool.seek_all((target * 1000.0).round() as i64);
        info!("Seeking all sessions to {:.2}s ({:?})", target, request);

        self.start_watchdog();
        self.schedule(self.sync.settle_delay(), Task::SettleSkip);
        self.emit(PlayerEvent::SkipStarted {
            target_seconds: target,
        });
        self.update_display();
        Ok(target)
    }

    fn start_watchdog(&mut self) {
        let policy = PollPolicy::new(self.sync.watchdog_interval(), self.sync.watchdog_max_attempts);
        if let Some(session) = self.session.as_mut() {
            session.watchdog = Some(BoundedPoll::new(policy));
        }
        if !self.scheduler.is_pending(self.epoch, Task::WatchdogPoll) {
            self.schedule(policy.interval, Task::WatchdogPoll);
        }
    }

    fn on_prebuffer_poll(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.pool.poll_prebuffer() {
            PreBufferProgress::Pending(delay) => self.schedule(delay, Task::PreBufferPoll),
            PreBufferProgress::Complete(report) => self.finish_prebuffer(report),
        }
    }

    fn finish_prebuffer(&mut self, report: PreBufferReport) {
        let failed = report.failed.len();
        for (index, err) in report.failed {
            let message = format!("Camera {} unavailable: {}", index + 1, err);
            warn!("{}", message);
            self.surface.show_status(&message);
            self.emit(PlayerEvent::SessionFailed {
                index,
                reason: err.to_string(),
            });
        }

        if let Some(session) = self.session.as_mut() {
            session.pool.seek_all(0);
            session.pool.pause_all();
        }
        self.clock.reset();
        self.start_watchdog();

        info!(
            "Pre-buffer complete: {} ready, {} failed",
            report.ready.len(),
            failed
        );
        self.set_state(TransportState::Paused);
        self.emit(PlayerEvent::PreBufferComplete {
            healthy: report.ready.len(),
            failed,
        });
        self.update_display();
    }

    /// One watchdog poll
    ///
    /// Runs for the whole attempt budget, force-pausing any session caught
    /// playing, because a seek can resume a pipeline well after it returns.
    fn on_watchdog_poll(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(mut poll) = session.watchdog else {
            return;
        };

        let escaped = session.pool.playing_sessions();
        if !escaped.is_empty() {
            warn!("Sessions {:?} escaped pause, forcing pause", escaped);
            session.pool.force_pause(&escaped);
        }

        match poll.step(false) {
            PollStep::Retry(delay) => {
                session.watchdog = Some(poll);
                self.schedule(delay, Task::WatchdogPoll);
            }
            PollStep::Done | PollStep::Exhausted => {
                session.watchdog = None;
                let stuck = session.pool.playing_sessions();
                if stuck.is_empty() {
                    debug!("Watchdog finished after {} polls", poll.attempts());
                } else {
                    let message = format!("Sessions {:?} ignore pause, giving up", stuck);
                    warn!("{}", message);
                    self.surface.show_status(&message);
                    self.emit(PlayerEvent::WatchdogGaveUp { sessions: stuck });
                }
            }
        }
    }

    fn on_settle(&mut self) {
        if self.state != TransportState::Skipping {
            return;
        }
        if self.watchdog_active() {
            self.schedule(self.sync.watchdog_interval(), Task::SettleSkip);
            return;
        }

        let position = self.clock.position_seconds();
        debug!("Skip settled at {:.2}s", position);
        self.set_state(TransportState::Paused);
        self.emit(PlayerEvent::SkipSettled {
            position_seconds: position,
        });
        self.update_display();
    }

    fn on_tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        let mut reached_end = None;
        let mut drift_events = Vec::new();
        if self.state == TransportState::Playing {
            let logical_ms = (self.clock.position_seconds() * 1000.0) as u64;

            if let Some(end_ms) = session.pool.max_duration_ms() {
                if logical_ms >= end_ms {
                    session.pool.pause_all();
                    self.clock.stop();
                    self.clock.set_position(end_ms as f64 / 1000.0);
                    reached_end = Some(end_ms as f64 / 1000.0);
                }
            }

            if reached_end.is_none() {
                let drifted = session.pool.drifted(logical_ms, self.sync.drift_tolerance());
                for &(index, position_ms) in &drifted {
                    if !session.drifting.contains(&index) {
                        warn!(
                            "Session {} drifted: reports {}ms, logical {}ms",
                            index, position_ms, logical_ms
                        );
                        drift_events.push(PlayerEvent::SessionDrifted {
                            index,
                            position_ms,
                            logical_ms,
                        });
                    }
                }
                for &index in &session.drifting {
                    if !drifted.iter().any(|&(i, _)| i == index) {
                        info!("Session {} back in sync", index);
                        drift_events.push(PlayerEvent::SessionResynced { index });
                    }
                }
                session.drifting = drifted.into_iter().map(|(index, _)| index).collect();
            }
        }

        for event in drift_events {
            self.emit(event);
        }

        if let Some(position_seconds) = reached_end {
            info!("End of footage at {:.2}s", position_seconds);
            self.set_state(TransportState::Paused);
            self.emit(PlayerEvent::EndOfFootage { position_seconds });
        }

        self.update_display();
        self.schedule(self.playback.tick_interval(), Task::Tick);
    }

    fn update_display(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let position = self.clock.position_seconds();
        let duration = session
            .pool
            .max_duration_ms()
            .map(|ms| format_duration(Duration::from_millis(ms)))
            .unwrap_or_else(|| "--:--".to_string());
        let elapsed = format!(
            "{} / {}",
            format_duration(Duration::try_from_secs_f64(position).unwrap_or(Duration::MAX)),
            duration
        );
        let footage = session.selection.footage_time_text(position);
        self.surface.show_time(&elapsed, &footage);
    }

    fn set_state(&mut self, state: TransportState) {
        if self.state != state {
            debug!("Transport {:?} -> {:?}", self.state, state);
        }
        self.state = state;
        self.surface.set_controls_enabled(state.controls_enabled());
        self.surface.show_transport(state, self.speed);
    }

    fn schedule(&mut self, delay: Duration, task: Task) {
        let now = self.time.now();
        self.scheduler.schedule(now, delay, self.epoch, task);
    }

    fn emit(&mut self, event: PlayerEvent) {
        for handler in &mut self.event_handlers {
            handler.handle_event(event.clone());
        }
    }
}

impl Drop for TransportController {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.pool.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DrawingTarget, SimulatedBackend, SimulatedMedia};
    use crate::utils::time::ManualTimeSource;

    struct NullSurface;

    impl PresentationSurface for NullSurface {
        fn drawing_targets(&mut self, selection: &Selection) -> Result<Vec<DrawingTarget>> {
            Ok((0..selection.len() as u64)
                .map(|id| DrawingTarget::headless(id, 64, 48))
                .collect())
        }
        fn set_controls_enabled(&mut self, _enabled: bool) {}
        fn show_time(&mut self, _elapsed: &str, _footage: &str) {}
        fn show_status(&mut self, _message: &str) {}
        fn show_transport(&mut self, _state: TransportState, _speed: f32) {}
        fn teardown(&mut self) {}
    }

    fn controller() -> (Arc<ManualTimeSource>, TransportController) {
        let time = Arc::new(ManualTimeSource::new());
        let backend = Arc::new(SimulatedBackend::new(time.clone(), SimulatedMedia::default()));
        let controller =
            TransportController::new(&Config::default(), backend, time.clone(), Box::new(NullSurface));
        (time, controller)
    }

    fn load(time: &ManualTimeSource, controller: &mut TransportController) {
        let selection = Selection::from_files(vec![
            PathBuf::from("CAM1_20240315_1200.mp4"),
            PathBuf::from("CAM2_20240315_1200.mp4"),
        ])
        .unwrap();
        controller.load_selection(selection).unwrap();
        for _ in 0..40 {
            time.advance(Duration::from_millis(50));
            controller.poll();
        }
    }

    #[test]
    fn test_controls_disabled_while_idle() {
        let (_time, mut controller) = controller();
        assert!(matches!(
            controller.toggle_play_pause(),
            Err(CamSyncError::ControlsDisabled(TransportState::Idle))
        ));
        assert!(matches!(
            controller.skip(30.0),
            Err(CamSyncError::ControlsDisabled(TransportState::Idle))
        ));
        assert!(matches!(
            controller.set_speed(2.0),
            Err(CamSyncError::ControlsDisabled(TransportState::Idle))
        ));
        assert_eq!(controller.speed(), 1.0);
    }

    #[test]
    fn test_controls_disabled_while_buffering() {
        let (_time, mut controller) = controller();
        let selection = Selection::from_files(vec![PathBuf::from("a.mp4")]).unwrap();
        controller.load_selection(selection).unwrap();
        assert_eq!(controller.state(), TransportState::Buffering);
        assert!(matches!(
            controller.toggle_play_pause(),
            Err(CamSyncError::ControlsDisabled(TransportState::Buffering))
        ));
    }

    #[test]
    fn test_load_reaches_paused() {
        let (time, mut controller) = controller();
        load(&time, &mut controller);
        assert_eq!(controller.state(), TransportState::Paused);
        assert_eq!(controller.position_seconds(), 0.0);
    }

    #[test]
    fn test_invalid_speed_rejected() {
        let (_time, mut controller) = controller();
        assert!(matches!(controller.set_speed(0.0), Err(CamSyncError::InvalidSpeed(_))));
        assert!(matches!(controller.set_speed(f32::NAN), Err(CamSyncError::InvalidSpeed(_))));
        assert_eq!(controller.speed(), 1.0);
    }

    #[test]
    fn test_invalid_jump_leaves_state() {
        let (time, mut controller) = controller();
        load(&time, &mut controller);
        assert!(matches!(
            controller.jump_to("1:xx"),
            Err(CamSyncError::InvalidTimeInput(_))
        ));
        assert_eq!(controller.state(), TransportState::Paused);
        assert_eq!(controller.position_seconds(), 0.0);
    }

    #[test]
    fn test_seek_percent_bounds() {
        let (time, mut controller) = controller();
        load(&time, &mut controller);
        assert!(controller.seek_percent(120.0).is_err());
        assert_eq!(controller.seek_percent(50.0).unwrap(), 300.0);
    }

    #[test]
    fn test_stop_app_returns_to_idle() {
        let (time, mut controller) = controller();
        load(&time, &mut controller);
        controller.stop_app();
        assert_eq!(controller.state(), TransportState::Idle);
        assert!(controller.pool().is_none());
        assert_eq!(controller.position_seconds(), 0.0);
    }
}
