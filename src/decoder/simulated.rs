//! Latency-modelling backend
//!
//! Simulated pipelines behave like the asynchronous native pipelines the
//! engine is built for: playback starts only after a startup latency,
//! positions advance with the injected [`TimeSource`] scaled by the rate,
//! and per-file quirks reproduce backend misbehaviour (files that never
//! open, pipelines that never start, pauses that are ignored, seeks that
//! silently resume playback). Used by the headless binary and the tests.

use crate::decoder::{DrawingTarget, FrameSink, MediaBackend, MediaPipeline, StreamState, VideoFrame};
use crate::utils::error::{CamSyncError, Result};
use crate::utils::time::SharedTimeSource;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Behaviour of one simulated media file
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedMedia {
    /// Media duration
    pub duration: Duration,

    /// Delay between the first play request and the Playing state
    pub startup_latency: Duration,

    /// The backend refuses to open the file
    pub open_fails: bool,

    /// Number of opens whose pipeline stays in Opening forever
    pub stalled_opens: u32,

    /// Pause requests are accepted but have no effect
    pub ignores_pause: bool,

    /// A seek on a paused pipeline resumes playback
    pub resumes_on_seek: bool,
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(600),
            startup_latency: Duration::from_millis(300),
            open_fails: false,
            stalled_opens: 0,
            ignores_pause: false,
            resumes_on_seek: false,
        }
    }
}

impl SimulatedMedia {
    /// Media with the given duration and default latency
    pub fn with_duration(duration: Duration) -> Self {
        Self {
            duration,
            ..Self::default()
        }
    }

    /// A file the backend cannot parse
    pub fn corrupt() -> Self {
        Self {
            open_fails: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    /// Opened, nothing requested
    Idle,

    /// Play requested; frames appear at `ready_at` unless stalled
    Starting { ready_at: Instant },

    /// Presenting frames since `since`, from `position`
    Playing { since: Instant },

    /// Paused; `decoded` is false when paused before the first frame
    Paused { decoded: bool },

    /// Position reached the duration
    Ended,

    /// Stopped and released
    Stopped,
}

struct PipelineModel {
    media: SimulatedMedia,
    stalled: bool,
    phase: Phase,
    position: Duration,
    rate: f32,
    sink: Option<Arc<dyn FrameSink>>,
    play_requests: u32,
    pause_requests: u32,
    seek_requests: Vec<Duration>,
}

impl PipelineModel {
    /// Apply transitions that are due at `now`
    fn settle(&mut self, now: Instant) {
        if let Phase::Starting { ready_at } = self.phase {
            if !self.stalled && now >= ready_at {
                self.phase = Phase::Playing { since: ready_at };
                self.present_frame();
            }
        }

        if let Phase::Playing { since } = self.phase {
            let advanced = now.saturating_duration_since(since).mul_f64(self.rate as f64);
            let position = self.position + advanced;
            if position >= self.media.duration {
                self.position = self.media.duration;
                self.phase = Phase::Ended;
            }
        }
    }

    fn current_position(&self, now: Instant) -> Duration {
        match self.phase {
            Phase::Playing { since } => {
                let advanced = now.saturating_duration_since(since).mul_f64(self.rate as f64);
                (self.position + advanced).min(self.media.duration)
            }
            _ => self.position,
        }
    }

    /// Fold the running interval into `position`
    fn freeze(&mut self, now: Instant) {
        if let Phase::Playing { .. } = self.phase {
            self.position = self.current_position(now);
            self.phase = Phase::Playing { since: now };
        }
    }

    fn has_decoded(&self) -> bool {
        match self.phase {
            Phase::Playing { .. } | Phase::Ended => true,
            Phase::Paused { decoded } => decoded,
            _ => false,
        }
    }

    fn present_frame(&self) {
        if let Some(sink) = &self.sink {
            sink.present(VideoFrame {
                data: vec![0x40; 2 * 2 * 3],
                stride: 2 * 3,
                width: 2,
                height: 2,
                pts: self.position,
            });
        }
    }
}

/// Simulated backend
pub struct SimulatedBackend {
    time: SharedTimeSource,
    default_media: SimulatedMedia,
    media: Mutex<HashMap<PathBuf, SimulatedMedia>>,
    opens: Mutex<HashMap<PathBuf, u32>>,
    latest: Mutex<HashMap<PathBuf, Arc<Mutex<PipelineModel>>>>,
}

impl SimulatedBackend {
    /// Create a backend whose unconfigured files behave like `default_media`
    pub fn new(time: SharedTimeSource, default_media: SimulatedMedia) -> Self {
        Self {
            time,
            default_media,
            media: Mutex::new(HashMap::new()),
            opens: Mutex::new(HashMap::new()),
            latest: Mutex::new(HashMap::new()),
        }
    }

    /// Override the behaviour of one file
    pub fn configure(&self, path: impl Into<PathBuf>, media: SimulatedMedia) {
        self.media.lock().insert(path.into(), media);
    }

    /// Number of times `path` was opened
    pub fn open_count(&self, path: &Path) -> u32 {
        self.opens.lock().get(path).copied().unwrap_or(0)
    }

    /// Inspect the most recently opened pipeline for `path`
    pub fn probe(&self, path: &Path) -> Option<SimulatedProbe> {
        self.latest.lock().get(path).map(|model| SimulatedProbe {
            model: Arc::clone(model),
            time: Arc::clone(&self.time),
        })
    }
}

impl MediaBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn open(&self, path: &Path, target: &DrawingTarget) -> Result<Box<dyn MediaPipeline>> {
        let media = self
            .media
            .lock()
            .get(path)
            .cloned()
            .unwrap_or_else(|| self.default_media.clone());

        let open_number = {
            let mut opens = self.opens.lock();
            let count = opens.entry(path.to_path_buf()).or_insert(0);
            *count += 1;
            *count
        };

        if media.open_fails {
            return Err(CamSyncError::MediaOpen {
                path: path.to_path_buf(),
                reason: "simulated media is unreadable".to_string(),
            });
        }

        let stalled = open_number <= media.stalled_opens;
        debug!("Simulated open #{} of {:?} (stalled: {})", open_number, path, stalled);

        let model = Arc::new(Mutex::new(PipelineModel {
            media,
            stalled,
            phase: Phase::Idle,
            position: Duration::ZERO,
            rate: 1.0,
            sink: target.sink.clone(),
            play_requests: 0,
            pause_requests: 0,
            seek_requests: Vec::new(),
        }));

        self.latest.lock().insert(path.to_path_buf(), Arc::clone(&model));

        Ok(Box::new(SimulatedPipeline {
            model,
            time: Arc::clone(&self.time),
        }))
    }
}

/// Pipeline handle returned by [`SimulatedBackend::open`]
struct SimulatedPipeline {
    model: Arc<Mutex<PipelineModel>>,
    time: SharedTimeSource,
}

impl MediaPipeline for SimulatedPipeline {
    fn play(&mut self) -> Result<()> {
        let now = self.time.now();
        let mut model = self.model.lock();
        model.settle(now);
        model.play_requests += 1;

        match model.phase {
            Phase::Idle | Phase::Paused { decoded: false } => {
                let ready_at = now + model.media.startup_latency;
                model.phase = Phase::Starting { ready_at };
            }
            Phase::Paused { decoded: true } => {
                model.phase = Phase::Playing { since: now };
            }
            Phase::Stopped => {
                return Err(CamSyncError::backend("simulated pipeline was stopped"));
            }
            Phase::Starting { .. } | Phase::Playing { .. } | Phase::Ended => {}
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let now = self.time.now();
        let mut model = self.model.lock();
        model.settle(now);
        model.pause_requests += 1;

        if model.media.ignores_pause {
            return Ok(());
        }

        match model.phase {
            Phase::Playing { .. } => {
                model.position = model.current_position(now);
                model.phase = Phase::Paused { decoded: true };
            }
            Phase::Starting { .. } => {
                model.phase = Phase::Paused { decoded: false };
            }
            _ => {}
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut model = self.model.lock();
        model.phase = Phase::Stopped;
        model.position = Duration::ZERO;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let now = self.time.now();
        let mut model = self.model.lock();
        model.settle(now);
        model.seek_requests.push(position);

        let target = position.min(model.media.duration);
        match model.phase {
            Phase::Playing { .. } => {
                model.position = target;
                model.phase = Phase::Playing { since: now };
            }
            Phase::Paused { decoded: true } | Phase::Ended => {
                model.position = target;
                model.phase = if model.media.resumes_on_seek {
                    Phase::Playing { since: now }
                } else {
                    Phase::Paused { decoded: true }
                };
            }
            Phase::Stopped => {
                return Err(CamSyncError::backend("simulated pipeline was stopped"));
            }
            _ => model.position = target,
        }
        Ok(())
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        if !(rate > 0.0) {
            return Err(CamSyncError::backend(format!("invalid rate {}", rate)));
        }
        let now = self.time.now();
        let mut model = self.model.lock();
        model.settle(now);
        model.freeze(now);
        model.rate = rate;
        Ok(())
    }

    fn position(&self) -> Option<Duration> {
        let now = self.time.now();
        let mut model = self.model.lock();
        model.settle(now);
        model.has_decoded().then(|| model.current_position(now))
    }

    fn duration(&self) -> Option<Duration> {
        let now = self.time.now();
        let mut model = self.model.lock();
        model.settle(now);
        model.has_decoded().then_some(model.media.duration)
    }

    fn state(&self) -> StreamState {
        let now = self.time.now();
        let mut model = self.model.lock();
        model.settle(now);
        match model.phase {
            Phase::Idle | Phase::Stopped => StreamState::Idle,
            Phase::Starting { .. } => StreamState::Opening,
            Phase::Playing { .. } => StreamState::Playing,
            Phase::Paused { .. } => StreamState::Paused,
            Phase::Ended => StreamState::Ended,
        }
    }
}

/// Read-only view of a simulated pipeline
pub struct SimulatedProbe {
    model: Arc<Mutex<PipelineModel>>,
    time: SharedTimeSource,
}

impl SimulatedProbe {
    pub fn state(&self) -> StreamState {
        SimulatedPipeline {
            model: Arc::clone(&self.model),
            time: Arc::clone(&self.time),
        }
        .state()
    }

    pub fn position(&self) -> Duration {
        let now = self.time.now();
        let mut model = self.model.lock();
        model.settle(now);
        model.current_position(now)
    }

    pub fn rate(&self) -> f32 {
        self.model.lock().rate
    }

    pub fn play_requests(&self) -> u32 {
        self.model.lock().play_requests
    }

    pub fn pause_requests(&self) -> u32 {
        self.model.lock().pause_requests
    }

    pub fn seek_requests(&self) -> Vec<Duration> {
        self.model.lock().seek_requests.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::ManualTimeSource;

    fn open(backend: &SimulatedBackend, path: &str) -> Box<dyn MediaPipeline> {
        backend
            .open(Path::new(path), &DrawingTarget::headless(0, 320, 240))
            .unwrap()
    }

    #[test]
    fn test_playback_starts_after_latency() {
        let time = Arc::new(ManualTimeSource::new());
        let backend = SimulatedBackend::new(time.clone(), SimulatedMedia::default());
        let mut pipeline = open(&backend, "a.mp4");

        pipeline.play().unwrap();
        assert_eq!(pipeline.state(), StreamState::Opening);
        assert_eq!(pipeline.position(), None);

        time.advance(Duration::from_millis(300));
        assert_eq!(pipeline.state(), StreamState::Playing);

        time.advance(Duration::from_secs(2));
        assert_eq!(pipeline.position(), Some(Duration::from_secs(2)));
        assert_eq!(pipeline.duration(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_rate_scales_position() {
        let time = Arc::new(ManualTimeSource::new());
        let backend = SimulatedBackend::new(time.clone(), SimulatedMedia::default());
        let mut pipeline = open(&backend, "a.mp4");

        pipeline.play().unwrap();
        time.advance(Duration::from_millis(300));
        time.advance(Duration::from_secs(1));
        pipeline.set_rate(4.0).unwrap();
        time.advance(Duration::from_secs(1));

        assert_eq!(pipeline.position(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_pause_before_first_frame_leaves_blank_surface() {
        let time = Arc::new(ManualTimeSource::new());
        let backend = SimulatedBackend::new(time.clone(), SimulatedMedia::default());
        let mut pipeline = open(&backend, "a.mp4");

        pipeline.play().unwrap();
        pipeline.pause().unwrap();
        time.advance(Duration::from_secs(1));

        assert_eq!(pipeline.state(), StreamState::Paused);
        assert_eq!(pipeline.position(), None);
    }

    #[test]
    fn test_resumes_on_seek_quirk() {
        let time = Arc::new(ManualTimeSource::new());
        let backend = SimulatedBackend::new(
            time.clone(),
            SimulatedMedia {
                resumes_on_seek: true,
                ..SimulatedMedia::default()
            },
        );
        let mut pipeline = open(&backend, "a.mp4");

        pipeline.play().unwrap();
        time.advance(Duration::from_millis(300));
        pipeline.pause().unwrap();
        pipeline.seek(Duration::from_secs(30)).unwrap();

        assert_eq!(pipeline.state(), StreamState::Playing);
    }

    #[test]
    fn test_reaches_end() {
        let time = Arc::new(ManualTimeSource::new());
        let backend =
            SimulatedBackend::new(time.clone(), SimulatedMedia::with_duration(Duration::from_secs(5)));
        let mut pipeline = open(&backend, "a.mp4");

        pipeline.play().unwrap();
        time.advance(Duration::from_secs(10));

        assert_eq!(pipeline.state(), StreamState::Ended);
        assert_eq!(pipeline.position(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_stalled_opens_then_recovers() {
        let time = Arc::new(ManualTimeSource::new());
        let backend = SimulatedBackend::new(time.clone(), SimulatedMedia::default());
        backend.configure(
            "slow.mp4",
            SimulatedMedia {
                stalled_opens: 1,
                ..SimulatedMedia::default()
            },
        );

        let mut first = open(&backend, "slow.mp4");
        first.play().unwrap();
        time.advance(Duration::from_secs(5));
        assert_eq!(first.state(), StreamState::Opening);

        let mut second = open(&backend, "slow.mp4");
        second.play().unwrap();
        time.advance(Duration::from_secs(1));
        assert_eq!(second.state(), StreamState::Playing);
        assert_eq!(backend.open_count(Path::new("slow.mp4")), 2);
    }
}
