//! Headless console surface
//!
//! Lays tiles out on a virtual canvas, counts presented frames per tile and
//! writes time, status and transport changes to the log.

use crate::decoder::{DrawingTarget, FrameSink, VideoFrame};
use crate::footage::Selection;
use crate::player::TransportState;
use crate::surface::{tile_grid, PresentationSurface};
use crate::utils::error::{CamSyncError, Result};
use log::{debug, info};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Frame sink that only counts frames
#[derive(Debug, Default)]
pub struct FrameCounter {
    frames: AtomicU64,
}

impl FrameCounter {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

impl FrameSink for FrameCounter {
    fn present(&self, frame: VideoFrame) {
        if self.frames.fetch_add(1, Ordering::Relaxed) == 0 {
            debug!("First frame {}x{} at {:?}", frame.width, frame.height, frame.pts);
        }
    }
}

/// Console surface
pub struct ConsoleSurface {
    /// Canvas size the tiles are cut from
    width: u32,
    height: u32,

    /// Most tiles one window can show
    max_tiles: usize,

    counters: Vec<Arc<FrameCounter>>,
    controls_enabled: bool,
    last_time: String,
    last_transport: Option<(TransportState, f32)>,
}

impl ConsoleSurface {
    pub fn new(width: u32, height: u32, max_tiles: usize) -> Self {
        Self {
            width,
            height,
            max_tiles,
            counters: Vec::new(),
            controls_enabled: false,
            last_time: String::new(),
            last_transport: None,
        }
    }

    /// Frames presented on each tile so far
    pub fn frame_counts(&self) -> Vec<u64> {
        self.counters.iter().map(|c| c.frames()).collect()
    }

    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    /// Last time text shown
    pub fn last_time(&self) -> &str {
        &self.last_time
    }
}

impl PresentationSurface for ConsoleSurface {
    fn drawing_targets(&mut self, selection: &Selection) -> Result<Vec<DrawingTarget>> {
        if selection.len() > self.max_tiles {
            return Err(CamSyncError::Presentation(format!(
                "{} cameras do not fit in {} tiles",
                selection.len(),
                self.max_tiles
            )));
        }

        let (cols, rows, tile_w, tile_h) = tile_grid(selection.len(), self.width, self.height);
        if tile_w == 0 || tile_h == 0 {
            return Err(CamSyncError::Presentation(format!(
                "canvas {}x{} too small for a {}x{} grid",
                self.width, self.height, cols, rows
            )));
        }

        info!("Now playing: {}", selection.name());
        self.counters = (0..selection.len()).map(|_| Arc::new(FrameCounter::default())).collect();

        Ok(self
            .counters
            .iter()
            .enumerate()
            .map(|(i, counter)| {
                let sink: Arc<dyn FrameSink> = counter.clone();
                DrawingTarget::with_sink(i as u64, tile_w, tile_h, sink)
            })
            .collect())
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        if self.controls_enabled != enabled {
            debug!("Controls {}", if enabled { "enabled" } else { "disabled" });
        }
        self.controls_enabled = enabled;
    }

    fn show_time(&mut self, elapsed: &str, footage: &str) {
        let text = format!("{}  {}", elapsed, footage);
        if text != self.last_time {
            info!("{}", text);
            self.last_time = text;
        }
    }

    fn show_status(&mut self, message: &str) {
        info!("Status: {}", message);
    }

    fn show_transport(&mut self, state: TransportState, speed: f32) {
        if self.last_transport != Some((state, speed)) {
            info!("[{}] {:?} at {}x", state.play_label(), state, speed);
            self.last_transport = Some((state, speed));
        }
    }

    fn teardown(&mut self) {
        info!("Closing playback window ({:?} frames shown)", self.frame_counts());
        self.counters.clear();
        self.controls_enabled = false;
    }
}
