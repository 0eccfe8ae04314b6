//! Utility module for camsync
//!
//! This module provides common utilities used throughout the application:
//! - Error handling with custom error types
//! - Configuration management
//! - Time sources
//! - Time text formatting and parsing

pub mod config;
pub mod error;
pub mod time;

// Re-export commonly used items
pub use config::{BackendConfig, BackendKind, Config, PlaybackConfig, SyncConfig};
pub use error::{CamSyncError, Result};
pub use time::{ManualTimeSource, SharedTimeSource, SystemTimeSource, TimeSource};

use std::time::Duration;

const SECONDS_PER_DAY: u64 = 24 * 3600;

/// Format a duration for display
///
/// Formatted string in the format "HH:MM:SS", or "MM:SS" for durations
/// under an hour. Sub-second parts are truncated.
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Format a wall-clock time of day given in seconds since midnight
///
/// Wraps at 24 hours, so footage recorded just before midnight keeps
/// reading as a valid clock time.
pub fn format_time_of_day(seconds: u64) -> String {
    let seconds = seconds % SECONDS_PER_DAY;
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}

/// Parse a user-entered jump target into seconds
///
/// Accepts `HH:MM:SS`, `MM:SS` or plain seconds (fractions allowed in the
/// last field). Minutes and seconds fields must be below 60 when a larger
/// unit is present.
pub fn parse_time_input(input: &str) -> Result<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CamSyncError::InvalidTimeInput("empty time".to_string()));
    }

    let invalid = || CamSyncError::InvalidTimeInput(trimmed.to_string());
    let fields: Vec<&str> = trimmed.split(':').collect();
    if fields.len() > 3 || fields.iter().any(|f| f.is_empty()) {
        return Err(invalid());
    }

    let (last, leading) = fields.split_last().ok_or_else(invalid)?;
    let seconds: f64 = last.parse().map_err(|_| invalid())?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(invalid());
    }
    if !leading.is_empty() && seconds >= 60.0 {
        return Err(invalid());
    }

    let mut whole = Vec::with_capacity(leading.len());
    for field in leading {
        let value: u64 = field.parse().map_err(|_| invalid())?;
        whole.push(value);
    }

    let total = match whole.as_slice() {
        [] => seconds,
        [minutes] => *minutes as f64 * 60.0 + seconds,
        [hours, minutes] => {
            if *minutes >= 60 {
                return Err(invalid());
            }
            *hours as f64 * 3600.0 + *minutes as f64 * 60.0 + seconds
        }
        _ => return Err(invalid()),
    };

    Ok(total)
}
