//! camsync - synchronized playback of multi-camera surveillance footage
//!
//! One selection (the camera files of one timestamp bucket) is played as a
//! single transport: every camera is pre-buffered to a paused first frame,
//! then play, pause, skip, seek and speed changes fan out to all of them
//! while a logical clock keeps the authoritative position.

pub mod decoder;
pub mod footage;
pub mod player;
pub mod surface;
pub mod utils;

pub use footage::Selection;
pub use player::{PlayerEvent, PlayerEventHandler, TransportController, TransportState};
pub use utils::error::{CamSyncError, Result};
