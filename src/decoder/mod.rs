//! Decoder module for camsync
//!
//! This module defines the capability contract the playback engine needs
//! from a media decoding backend, and the [`DecoderSession`] wrapper that
//! gives every backend pipeline the same control surface. Backends decode
//! and render asynchronously; none of the commands below waits for the
//! native pipeline to reach the requested state.

mod frame;
mod session;
pub mod simulated;

#[cfg(feature = "ffmpeg")]
mod ffmpeg_backend;

pub use frame::{FrameSink, VideoFrame};
pub use session::DecoderSession;
pub use simulated::{SimulatedBackend, SimulatedMedia, SimulatedProbe};

#[cfg(feature = "ffmpeg")]
pub use ffmpeg_backend::FfmpegBackend;

use crate::utils::error::Result;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Backend factory for decoding pipelines
pub trait MediaBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Bind a new pipeline to `path` and the output surface `target`
    ///
    /// Must not start playback. Fails when the backend cannot parse the
    /// file at all.
    fn open(&self, path: &Path, target: &DrawingTarget) -> Result<Box<dyn MediaPipeline>>;
}

/// One native decoding pipeline
///
/// State changes requested through this trait are asynchronous: the value
/// returned by [`MediaPipeline::state`] may lag a command by several hundred
/// milliseconds.
pub trait MediaPipeline: Send {
    /// Request playback
    fn play(&mut self) -> Result<()>;

    /// Request pause
    fn pause(&mut self) -> Result<()>;

    /// Stop and release decoding resources; the pipeline may be reopened
    /// by the backend afterwards but not resumed
    fn stop(&mut self) -> Result<()>;

    /// Request an absolute position (best effort)
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Set playback rate multiplier
    fn set_rate(&mut self, rate: f32) -> Result<()>;

    /// Reported position, `None` while not yet determined
    fn position(&self) -> Option<Duration>;

    /// Media duration, `None` while not yet determined
    fn duration(&self) -> Option<Duration>;

    /// Last native state
    fn state(&self) -> StreamState;
}

/// Native pipeline state as observed by polling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StreamState {
    /// Nothing requested yet, or state unknown
    Idle,

    /// Media is being opened or buffered
    Opening,

    /// Frames are being presented
    Playing,

    /// Paused on a decoded frame
    Paused,

    /// End of media reached
    Ended,

    /// Pipeline failed
    Error,
}

/// Identifier of one output surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// Rectangular drawing target supplied by the presentation surface
#[derive(Clone)]
pub struct DrawingTarget {
    /// Surface identifier
    pub id: TargetId,

    /// Target size in pixels
    pub width: u32,
    pub height: u32,

    /// Receiver of decoded frames, if the surface displays pixels
    pub sink: Option<Arc<dyn FrameSink>>,
}

impl DrawingTarget {
    /// Target without a frame sink
    pub fn headless(id: u64, width: u32, height: u32) -> Self {
        Self {
            id: TargetId(id),
            width,
            height,
            sink: None,
        }
    }

    /// Target that receives decoded frames
    pub fn with_sink(id: u64, width: u32, height: u32, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            id: TargetId(id),
            width,
            height,
            sink: Some(sink),
        }
    }
}

impl fmt::Debug for DrawingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawingTarget")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drawing_target_debug_hides_sink() {
        let target = DrawingTarget::headless(3, 640, 360);
        let text = format!("{:?}", target);
        assert!(text.contains("has_sink: false"));
        assert_eq!(target.id.to_string(), "target#3");
    }
}
