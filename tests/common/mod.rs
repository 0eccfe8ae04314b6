//! Shared fixture for camsync integration tests
//!
//! Builds a transport controller over the simulated backend, a manual time
//! source and a recording surface, with the camera files of one bucket
//! created in a temporary directory.

#![allow(dead_code)]

use camsync::decoder::{DrawingTarget, SimulatedBackend, SimulatedMedia, SimulatedProbe};
use camsync::player::{PlayerEvent, PlayerEventHandler, TransportController, TransportState};
use camsync::surface::PresentationSurface;
use camsync::utils::{Config, ManualTimeSource};
use camsync::{Result, Selection};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Step the harness advances time by between polls
pub const STEP: Duration = Duration::from_millis(50);

/// Everything the recording surface was asked to show
#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub controls_enabled: Vec<bool>,
    pub elapsed: String,
    pub footage: String,
    pub statuses: Vec<String>,
    pub transport: Vec<(TransportState, f32)>,
    pub torn_down: bool,
}

/// Surface that records instead of drawing
pub struct RecordingSurface {
    log: Arc<Mutex<SurfaceLog>>,
}

impl PresentationSurface for RecordingSurface {
    fn drawing_targets(&mut self, selection: &Selection) -> Result<Vec<DrawingTarget>> {
        Ok((0..selection.len() as u64)
            .map(|id| DrawingTarget::headless(id, 320, 240))
            .collect())
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.log.lock().controls_enabled.push(enabled);
    }

    fn show_time(&mut self, elapsed: &str, footage: &str) {
        let mut log = self.log.lock();
        log.elapsed = elapsed.to_string();
        log.footage = footage.to_string();
    }

    fn show_status(&mut self, message: &str) {
        self.log.lock().statuses.push(message.to_string());
    }

    fn show_transport(&mut self, state: TransportState, speed: f32) {
        self.log.lock().transport.push((state, speed));
    }

    fn teardown(&mut self) {
        self.log.lock().torn_down = true;
    }
}

/// Event handler that keeps every event
struct RecordingHandler {
    events: Arc<Mutex<Vec<PlayerEvent>>>,
}

impl PlayerEventHandler for RecordingHandler {
    fn handle_event(&mut self, event: PlayerEvent) {
        self.events.lock().push(event);
    }
}

/// Test harness around one controller
pub struct Harness {
    pub time: Arc<ManualTimeSource>,
    pub backend: Arc<SimulatedBackend>,
    pub controller: TransportController,
    pub surface: Arc<Mutex<SurfaceLog>>,
    pub events: Arc<Mutex<Vec<PlayerEvent>>>,
    pub files: Vec<PathBuf>,
    _dir: TempDir,
}

impl Harness {
    /// `cameras` files of one bucket starting at 14:30:00, 600s each
    pub fn new(cameras: usize) -> anyhow::Result<Self> {
        Self::with_media(cameras, SimulatedMedia::default())
    }

    /// Like [`Harness::new`] with every file behaving like `media`
    pub fn with_media(cameras: usize, media: SimulatedMedia) -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let mut files = Vec::with_capacity(cameras);
        for i in 1..=cameras {
            let path = dir.path().join(format!("CAM{}_20240315_143000.mp4", i));
            std::fs::write(&path, b"")?;
            files.push(path);
        }

        let time = Arc::new(ManualTimeSource::new());
        let backend = Arc::new(SimulatedBackend::new(time.clone(), media));
        let surface = Arc::new(Mutex::new(SurfaceLog::default()));
        let events = Arc::new(Mutex::new(Vec::new()));

        let mut controller = TransportController::new(
            &Config::default(),
            backend.clone(),
            time.clone(),
            Box::new(RecordingSurface {
                log: surface.clone(),
            }),
        );
        controller.add_event_handler(Box::new(RecordingHandler {
            events: events.clone(),
        }));

        Ok(Self {
            time,
            backend,
            controller,
            surface,
            events,
            files,
            _dir: dir,
        })
    }

    /// Override the behaviour of camera `index` (0-based)
    pub fn configure(&self, index: usize, media: SimulatedMedia) {
        self.backend.configure(self.files[index].clone(), media);
    }

    /// Load the bucket directory and run until pre-buffering completes
    pub fn load(&mut self) -> anyhow::Result<()> {
        let selection = Selection::from_dir(self._dir.path())?;
        self.controller.load_selection(selection)?;
        self.run_until(Duration::from_secs(20), |c| c.state() == TransportState::Paused);
        anyhow::ensure!(
            self.controller.state() == TransportState::Paused,
            "pre-buffer did not complete"
        );
        Ok(())
    }

    /// Advance time in small steps, polling the controller after each
    pub fn run_for(&mut self, duration: Duration) {
        let mut elapsed = Duration::ZERO;
        while elapsed < duration {
            self.time.advance(STEP);
            self.controller.poll();
            elapsed += STEP;
        }
    }

    /// Run until `done` holds or `limit` passes
    pub fn run_until<F>(&mut self, limit: Duration, done: F)
    where
        F: Fn(&TransportController) -> bool,
    {
        let mut elapsed = Duration::ZERO;
        while !done(&self.controller) && elapsed < limit {
            self.time.advance(STEP);
            self.controller.poll();
            elapsed += STEP;
        }
    }

    /// Run until a skip has settled back to Paused
    pub fn settle(&mut self) {
        self.run_until(Duration::from_secs(10), |c| {
            c.state() == TransportState::Paused && !c.watchdog_active()
        });
    }

    pub fn probe(&self, index: usize) -> Option<SimulatedProbe> {
        self.backend.probe(&self.files[index])
    }

    pub fn events(&self) -> Vec<PlayerEvent> {
        self.events.lock().clone()
    }
}
