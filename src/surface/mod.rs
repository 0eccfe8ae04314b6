//! Presentation surface for camsync
//!
//! The surface is whatever shows the camera tiles and the transport
//! controls. The engine only needs it to hand out one drawing target per
//! file and to reflect the transport state and time text back to the user.

mod console;

pub use console::{ConsoleSurface, FrameCounter};

use crate::decoder::DrawingTarget;
use crate::footage::Selection;
use crate::player::TransportState;
use crate::utils::error::Result;

/// Presentation surface trait
pub trait PresentationSurface: Send {
    /// Lay out one drawing target per file of `selection`, in file order
    ///
    /// # Returns
    ///
    /// Returns the targets, or a `Presentation` error that aborts the
    /// playback window
    fn drawing_targets(&mut self, selection: &Selection) -> Result<Vec<DrawingTarget>>;

    /// Enable or disable the transport controls
    fn set_controls_enabled(&mut self, enabled: bool);

    /// Show the "elapsed / duration" text and the footage time text
    fn show_time(&mut self, elapsed: &str, footage: &str);

    /// Show a status line (non-fatal errors, progress)
    fn show_status(&mut self, message: &str);

    /// Reflect transport state and speed on the controls
    fn show_transport(&mut self, state: TransportState, speed: f32);

    /// Close the playback window
    fn teardown(&mut self);
}

/// Grid of `count` tiles inside a `width` x `height` area
///
/// Columns are `sqrt(count)` rounded half up, so odd counts grow rows
/// before columns; every tile gets the same size.
pub fn tile_grid(count: usize, width: u32, height: u32) -> (u32, u32, u32, u32) {
    let count = count.max(1) as u32;
    let cols = ((count as f64).sqrt() + 0.5).floor().max(1.0) as u32;
    let rows = (count + cols - 1) / cols;
    (cols, rows, width / cols, height / rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_grid() {
        assert_eq!(tile_grid(1, 1280, 720), (1, 1, 1280, 720));
        assert_eq!(tile_grid(2, 1280, 720), (1, 2, 1280, 360));
        assert_eq!(tile_grid(3, 1280, 720), (2, 2, 640, 360));
        assert_eq!(tile_grid(4, 1280, 720), (2, 2, 640, 360));
        assert_eq!(tile_grid(5, 1200, 720), (2, 3, 600, 240));
        assert_eq!(tile_grid(7, 1200, 720), (3, 3, 400, 240));
    }
}
