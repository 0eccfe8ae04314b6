//! Command table
//!
//! Every transport control is bound once, when the table is built from the
//! configuration, to the command it triggers. The console front end parses
//! typed words onto the same commands.

use crate::utils::config::PlaybackConfig;
use crate::utils::error::{CamSyncError, Result};
use std::collections::HashMap;

/// Identifier of a transport control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    /// Play/pause button
    PlayPause,

    /// Return key, toggles like the play/pause button
    ReturnKey,

    /// Stop button
    Stop,

    /// Speed preset button, by position in the preset list
    Speed(usize),

    /// Skip button, by position in the skip step list
    Skip(usize),
}

/// What a control does
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCommand {
    TogglePlayPause,
    Stop,
    SetSpeed(f32),
    Skip(f64),
    JumpTo(String),
    SeekPercent(f64),
}

/// Controls bound to their commands
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    bindings: HashMap<ControlId, TransportCommand>,
}

impl CommandTable {
    /// Bind the fixed controls and one control per configured preset
    pub fn from_config(config: &PlaybackConfig) -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(ControlId::PlayPause, TransportCommand::TogglePlayPause);
        bindings.insert(ControlId::ReturnKey, TransportCommand::TogglePlayPause);
        bindings.insert(ControlId::Stop, TransportCommand::Stop);

        for (i, &speed) in config.speeds.iter().enumerate() {
            bindings.insert(ControlId::Speed(i), TransportCommand::SetSpeed(speed));
        }
        for (i, &step) in config.skip_steps.iter().enumerate() {
            bindings.insert(ControlId::Skip(i), TransportCommand::Skip(step));
        }

        Self { bindings }
    }

    /// Command bound to `control`
    pub fn command(&self, control: ControlId) -> Option<&TransportCommand> {
        self.bindings.get(&control)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One line of console input
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(TransportCommand),
    Status,
    Help,
    Quit,
}

/// Parse a typed line
///
/// An empty line acts as the Return key. Speeds are written `2x`, skips as
/// signed seconds (`+30`, `-0.25`), jumps as `jump 01:30` and seek-bar
/// moves as `seek 50%`.
pub fn parse_console_input(line: &str) -> Result<ConsoleInput> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let unknown = || CamSyncError::UnknownCommand(line.to_string());

    let input = match word.to_ascii_lowercase().as_str() {
        "" | "p" | "play" | "pause" => ConsoleInput::Command(TransportCommand::TogglePlayPause),
        "stop" => ConsoleInput::Command(TransportCommand::Stop),
        "status" | "s" => ConsoleInput::Status,
        "help" | "?" => ConsoleInput::Help,
        "quit" | "q" | "exit" => ConsoleInput::Quit,
        "jump" | "j" => {
            if rest.is_empty() {
                return Err(CamSyncError::InvalidTimeInput("missing time".to_string()));
            }
            ConsoleInput::Command(TransportCommand::JumpTo(rest.to_string()))
        }
        "seek" => {
            let value = rest.trim_end_matches('%');
            let percent: f64 = value
                .parse()
                .map_err(|_| CamSyncError::InvalidTimeInput(rest.to_string()))?;
            ConsoleInput::Command(TransportCommand::SeekPercent(percent))
        }
        other if other.ends_with('x') => {
            let speed: f32 = other.trim_end_matches('x').parse().map_err(|_| unknown())?;
            ConsoleInput::Command(TransportCommand::SetSpeed(speed))
        }
        other if other.starts_with('+') || other.starts_with('-') => {
            let delta: f64 = other.parse().map_err(|_| unknown())?;
            ConsoleInput::Command(TransportCommand::Skip(delta))
        }
        _ => return Err(unknown()),
    };

    if !rest.is_empty() && !matches!(word.to_ascii_lowercase().as_str(), "jump" | "j" | "seek") {
        return Err(unknown());
    }

    Ok(input)
}

/// Console help text
pub const CONSOLE_HELP: &str = "\
  <enter> | play | pause   toggle play/pause
  0.25x .. 4x              set speed
  +30 | -0.25              skip seconds
  jump HH:MM:SS            jump to a time
  seek 50%                 seek to a percentage
  status                   print status as JSON
  stop                     stop and close
  quit                     exit";
