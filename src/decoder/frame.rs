//! Decoded frames and the sinks that display them

use std::time::Duration;

/// Decoded video frame in packed RGB24
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Pixel data, `stride * height` bytes
    pub data: Vec<u8>,

    /// Bytes per row
    pub stride: usize,

    /// Frame width
    pub width: u32,

    /// Frame height
    pub height: u32,

    /// Presentation timestamp
    pub pts: Duration,
}

/// Receiver of decoded frames for one drawing target
///
/// Called from backend worker threads; implementations hand the frame to
/// whatever paints the surface.
pub trait FrameSink: Send + Sync {
    fn present(&self, frame: VideoFrame);
}
