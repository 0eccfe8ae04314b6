//! Error types for camsync
//!
//! This module defines the error taxonomy of the playback engine. We use
//! thiserror for the error enum; only the binary edge reaches for anyhow.

use crate::player::TransportState;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for camsync
#[derive(Error, Debug)]
pub enum CamSyncError {
    /// A file could not be opened by the decoding backend
    #[error("Media open error for {path:?}: {reason}")]
    MediaOpen {
        path: PathBuf,
        reason: String,
    },

    /// A session never reached a usable state within its polling budget
    #[error("Pre-buffer timeout for {path:?} after {attempts} attempts")]
    PreBufferTimeout {
        path: PathBuf,
        attempts: u32,
    },

    /// A skip was requested while another one is still settling
    #[error("Skip rejected: another skip is still settling")]
    SkipInFlight,

    /// Malformed user-entered jump target
    #[error("Invalid time input: {0}")]
    InvalidTimeInput(String),

    /// Playback rate outside the accepted range
    #[error("Invalid playback speed: {0}")]
    InvalidSpeed(f32),

    /// Console input that maps to no transport command
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Transport controls are disabled in the current state
    #[error("Controls disabled while {0:?}")]
    ControlsDisabled(TransportState),

    /// A selection must contain at least one file
    #[error("Selection contains no files")]
    EmptySelection,

    /// Command issued to a session that is flagged Error
    #[error("Session {index} is faulted")]
    SessionFaulted {
        index: usize,
    },

    /// The presentation surface could not be constructed
    #[error("Presentation error: {0}")]
    Presentation(String),

    /// Errors reported by a decoding backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File error: {0}")]
    FileIO(#[from] std::io::Error),
}

#[cfg(feature = "ffmpeg")]
impl From<ffmpeg_next::Error> for CamSyncError {
    fn from(err: ffmpeg_next::Error) -> Self {
        CamSyncError::Backend(format!("FFmpeg error: {}", err))
    }
}

impl CamSyncError {
    /// Create a backend error from string
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        CamSyncError::Backend(msg.into())
    }

    /// Whether this error must abort the playback window.
    ///
    /// Everything except a broken presentation surface degrades gracefully.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CamSyncError::Presentation(_))
    }
}

/// Convenience type alias for Results in camsync
pub type Result<T> = std::result::Result<T, CamSyncError>;

/// Extension trait for converting other errors to CamSyncError
pub trait IntoSyncError<T> {
    /// Convert this error into a CamSyncError with the given context
    fn backend_err(self, context: &str) -> Result<T>;
    fn config_err(self, context: &str) -> Result<T>;
}

impl<T, E: std::fmt::Display> IntoSyncError<T> for std::result::Result<T, E> {
    fn backend_err(self, context: &str) -> Result<T> {
        self.map_err(|e| CamSyncError::Backend(format!("{}: {}", context, e)))
    }

    fn config_err(self, context: &str) -> Result<T> {
        self.map_err(|e| CamSyncError::Config(format!("{}: {}", context, e)))
    }
}
