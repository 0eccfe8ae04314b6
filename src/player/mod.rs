//! Synchronized playback engine for camsync
//!
//! This module drives every camera of one selection as a single transport:
//! the stream pool fans commands out to the decoder sessions, the playback
//! clock tracks the logical position, and the transport controller owns the
//! state machine, the pre-buffer loop and the post-seek watchdog.

mod clock;
mod commands;
mod controller;
mod pool;
mod retry;
mod scheduler;

pub use clock::PlaybackClock;
pub use commands::{
    parse_console_input, CommandTable, ConsoleInput, ControlId, TransportCommand, CONSOLE_HELP,
};
pub use controller::{SessionStatus, TransportController, TransportStatus};
pub use pool::{PreBufferProgress, PreBufferReport, StreamPool};
pub use retry::{BoundedPoll, PollPolicy, PollStep};
pub use scheduler::{Scheduler, Task};

use serde::Serialize;

/// Aggregate transport state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransportState {
    /// No selection loaded
    Idle,

    /// Pool under construction or pre-buffering
    Buffering,

    /// Every healthy session paused
    Paused,

    /// Every healthy session playing
    Playing,

    /// A skip or seek is settling
    Skipping,
}

impl TransportState {
    /// Whether transport controls accept input in this state
    pub fn controls_enabled(self) -> bool {
        matches!(self, TransportState::Paused | TransportState::Playing)
    }

    /// Label for the play/pause control
    pub fn play_label(self) -> &'static str {
        match self {
            TransportState::Playing => "Pause",
            _ => "Play",
        }
    }
}

/// Player event for external event handling
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A selection was handed to the pool
    SelectionLoaded { name: String, sessions: usize },

    /// A session was flagged Error
    SessionFailed { index: usize, reason: String },

    /// Pre-buffering finished; the pool is paused at zero
    PreBufferComplete { healthy: usize, failed: usize },

    /// Playback started
    PlaybackStarted,

    /// Playback paused
    PlaybackPaused,

    /// A skip or seek began toward the given logical position
    SkipStarted { target_seconds: f64 },

    /// A skip or seek settled
    SkipSettled { position_seconds: f64 },

    /// The watchdog could not keep these sessions paused
    WatchdogGaveUp { sessions: Vec<usize> },

    /// Playback speed changed
    SpeedChanged { speed: f32 },

    /// A session moved outside the drift tolerance of the logical clock
    SessionDrifted {
        index: usize,
        position_ms: u64,
        logical_ms: u64,
    },

    /// A drifting session is back within tolerance
    SessionResynced { index: usize },

    /// The logical clock reached the end of the longest healthy stream
    EndOfFootage { position_seconds: f64 },

    /// Pool released and presentation torn down
    Stopped,
}

/// Player event handler trait
pub trait PlayerEventHandler: Send {
    /// Handle player event
    ///
    /// # Arguments
    ///
    /// * `event` - Player event
    fn handle_event(&mut self, event: PlayerEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_enabled() {
        assert!(!TransportState::Idle.controls_enabled());
        assert!(!TransportState::Buffering.controls_enabled());
        assert!(TransportState::Paused.controls_enabled());
        assert!(TransportState::Playing.controls_enabled());
        assert!(!TransportState::Skipping.controls_enabled());
    }

    #[test]
    fn test_play_label() {
        assert_eq!(TransportState::Playing.play_label(), "Pause");
        assert_eq!(TransportState::Paused.play_label(), "Play");
    }
}
