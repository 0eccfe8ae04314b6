use anyhow::Result;
use camsync::decoder::{MediaBackend, SimulatedBackend, SimulatedMedia};
use camsync::player::{
    parse_console_input, CommandTable, ConsoleInput, ControlId, PlayerEvent, PlayerEventHandler,
    TransportController, TransportState, CONSOLE_HELP,
};
use camsync::surface::ConsoleSurface;
use camsync::utils::{BackendKind, Config, SharedTimeSource, SystemTimeSource};
use camsync::Selection;
use clap::Parser;
use env_logger::Env;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

/// camsync - synchronized multi-camera footage player
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera files of one timestamp bucket, or a directory holding them
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Decoding backend (simulated or ffmpeg)
    #[arg(short, long, value_name = "BACKEND")]
    backend: Option<String>,

    /// Initial playback speed
    #[arg(short, long, value_name = "SPEED")]
    speed: Option<f32>,

    /// Configuration file to use instead of the system/user files
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Canvas width the camera tiles are laid out on
    #[arg(long, default_value = "1280")]
    width: u32,

    /// Canvas height the camera tiles are laid out on
    #[arg(long, default_value = "720")]
    height: u32,

    /// Write the effective configuration to the user config file
    #[arg(long)]
    save_config: bool,
}

/// Most cameras one window shows
const MAX_TILES: usize = 16;

/// Upper bound on how long a due task waits for the loop
const LOOP_QUANTUM: Duration = Duration::from_millis(20);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(kind) = &args.backend {
        config.backend.kind = match kind.to_ascii_lowercase().as_str() {
            "simulated" => BackendKind::Simulated,
            "ffmpeg" => BackendKind::Ffmpeg,
            other => anyhow::bail!("Unknown backend '{}'", other),
        };
    }
    if let Some(speed) = args.speed {
        config.playback.initial_speed = speed;
    }
    config.validate()?;

    // Initialize logging
    let log_level = if args.debug { "debug" } else { config.general.log_level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting camsync v{}", env!("CARGO_PKG_VERSION"));

    if args.save_config {
        config.save()?;
        info!("Configuration saved");
    }

    let time: SharedTimeSource = Arc::new(SystemTimeSource);
    let backend = make_backend(&config, Arc::clone(&time))?;
    info!("Using the {} backend", backend.name());

    let selection = match args.files.as_slice() {
        [dir] if dir.is_dir() => Selection::from_dir(dir)?,
        files => Selection::from_files(files.to_vec())?,
    };

    let surface = ConsoleSurface::new(args.width, args.height, MAX_TILES);
    let mut controller = TransportController::new(&config, backend, time, Box::new(surface));
    controller.add_event_handler(Box::new(LoggingEventHandler));

    if let Err(e) = controller.load_selection(selection) {
        error!("Failed to open playback window: {}", e);
        return Err(e.into());
    }

    let table = CommandTable::from_config(&config.playback);
    println!("{}", CONSOLE_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(LOOP_QUANTUM.min(config.playback.tick_interval()));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => controller.poll(),
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if !handle_line(&mut controller, &table, &line) {
                        break;
                    }
                }
                Ok(None) => {
                    debug!("stdin closed");
                    break;
                }
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        if controller.state() == TransportState::Idle {
            break;
        }
    }

    if controller.state() != TransportState::Idle {
        controller.stop_app();
    }

    Ok(())
}

/// Handle one console line; returns false when the user quits
fn handle_line(controller: &mut TransportController, table: &CommandTable, line: &str) -> bool {
    // Bare preset numbers press the matching speed button
    if let Ok(n) = line.trim().parse::<usize>() {
        if let Some(command) = n.checked_sub(1).and_then(|i| table.command(ControlId::Speed(i))) {
            if let Err(e) = controller.execute(command) {
                warn!("{}", e);
            }
            return true;
        }
    }

    let input = if line.trim().is_empty() {
        table
            .command(ControlId::ReturnKey)
            .cloned()
            .map(ConsoleInput::Command)
            .ok_or_else(|| camsync::CamSyncError::UnknownCommand(String::new()))
    } else {
        parse_console_input(line)
    };

    match input {
        Ok(ConsoleInput::Command(command)) => match controller.execute(&command) {
            Ok(()) => {}
            Err(e) if e.is_fatal() => {
                error!("{}", e);
                return false;
            }
            Err(e) => warn!("{}", e),
        },
        Ok(ConsoleInput::Status) => match serde_json::to_string_pretty(&controller.status()) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize status: {}", e),
        },
        Ok(ConsoleInput::Help) => println!("{}", CONSOLE_HELP),
        Ok(ConsoleInput::Quit) => return false,
        Err(e) => warn!("{}", e),
    }
    true
}

fn make_backend(config: &Config, time: SharedTimeSource) -> Result<Arc<dyn MediaBackend>> {
    match config.backend.kind {
        BackendKind::Simulated => {
            let media = SimulatedMedia {
                duration: Duration::from_secs(config.backend.simulated_duration_secs),
                startup_latency: Duration::from_millis(config.backend.simulated_startup_ms),
                ..SimulatedMedia::default()
            };
            Ok(Arc::new(SimulatedBackend::new(time, media)))
        }
        BackendKind::Ffmpeg => ffmpeg_backend(),
    }
}

#[cfg(feature = "ffmpeg")]
fn ffmpeg_backend() -> Result<Arc<dyn MediaBackend>> {
    Ok(Arc::new(camsync::decoder::FfmpegBackend::new()?))
}

#[cfg(not(feature = "ffmpeg"))]
fn ffmpeg_backend() -> Result<Arc<dyn MediaBackend>> {
    anyhow::bail!("camsync was built without the `ffmpeg` feature")
}

/// Event handler that logs events
struct LoggingEventHandler;

impl PlayerEventHandler for LoggingEventHandler {
    fn handle_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::SelectionLoaded { name, sessions } => {
                info!("Now playing: {} ({} cameras)", name, sessions);
            }
            PlayerEvent::SessionFailed { index, reason } => {
                warn!("Camera {} failed: {}", index + 1, reason);
            }
            PlayerEvent::PreBufferComplete { healthy, failed } => {
                info!("Ready: {} cameras, {} unavailable", healthy, failed);
            }
            PlayerEvent::PlaybackStarted => info!("Playback started"),
            PlayerEvent::PlaybackPaused => info!("Playback paused"),
            PlayerEvent::SkipSettled { position_seconds } => {
                debug!("Skip settled at {:.2}s", position_seconds);
            }
            PlayerEvent::EndOfFootage { .. } => info!("End of footage reached"),
            PlayerEvent::Stopped => info!("Playback window closed"),
            _ => {
                // Other events are already logged by the controller
            }
        }
    }
}
