//! FFmpeg-based backend for camsync
//!
//! Each pipeline owns one worker thread that demuxes and decodes the best
//! video stream with ffmpeg-next, converts frames to RGB24 at the drawing
//! target's size and hands them to the target's [`FrameSink`], paced by the
//! wall clock scaled by the playback rate. The control side talks to the
//! worker over a crossbeam channel and reads its status from a shared slot,
//! so every command returns immediately.

use crate::decoder::{DrawingTarget, FrameSink, MediaBackend, MediaPipeline, StreamState, VideoFrame};
use crate::utils::error::{CamSyncError, IntoSyncError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use ffmpeg_next as ffmpeg;
use ffmpeg_next::{format, media};
use log::{debug, error};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

static FFMPEG_INIT: OnceCell<std::result::Result<(), String>> = OnceCell::new();

/// Initialize FFmpeg library once per process
fn init_ffmpeg() -> Result<()> {
    FFMPEG_INIT
        .get_or_init(|| {
            ffmpeg::init().map_err(|e| e.to_string())?;
            ffmpeg::log::set_level(ffmpeg::log::Level::Warning);
            Ok(())
        })
        .clone()
        .map_err(|e| CamSyncError::Backend(format!("FFmpeg init failed: {}", e)))
}

/// Backend that decodes with FFmpeg
pub struct FfmpegBackend;

impl FfmpegBackend {
    pub fn new() -> Result<Self> {
        init_ffmpeg()?;
        Ok(Self)
    }
}

impl MediaBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn open(&self, path: &Path, target: &DrawingTarget) -> Result<Box<dyn MediaPipeline>> {
        let open_error = |reason: String| CamSyncError::MediaOpen {
            path: path.to_path_buf(),
            reason,
        };

        // Probe on the caller's thread so unreadable files fail here
        let input = format::input(&path).map_err(|e| open_error(e.to_string()))?;
        if input.streams().best(media::Type::Video).is_none() {
            return Err(open_error("no video stream".to_string()));
        }
        let duration = (input.duration() > 0).then(|| Duration::from_micros(input.duration() as u64));
        drop(input);

        let status = Arc::new(Mutex::new(WorkerStatus {
            state: StreamState::Idle,
            position: None,
            duration,
        }));
        let (commands, receiver) = crossbeam_channel::unbounded();

        let worker = Worker {
            path: path.to_path_buf(),
            width: target.width,
            height: target.height,
            sink: target.sink.clone(),
            commands: receiver,
            status: Arc::clone(&status),
        };
        let handle = thread::Builder::new()
            .name(format!("decode-{}", target.id.0))
            .spawn(move || worker.run())
            .backend_err("Spawning decode worker")?;

        Ok(Box::new(FfmpegPipeline {
            commands,
            status,
            worker: Some(handle),
        }))
    }
}

#[derive(Debug, Clone, Copy)]
enum WorkerCommand {
    Play,
    Pause,
    Stop,
    Seek(Duration),
    SetRate(f32),
}

#[derive(Debug)]
struct WorkerStatus {
    state: StreamState,
    position: Option<Duration>,
    duration: Option<Duration>,
}

/// Control handle for one decode worker
struct FfmpegPipeline {
    commands: Sender<WorkerCommand>,
    status: Arc<Mutex<WorkerStatus>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl FfmpegPipeline {
    fn send(&self, command: WorkerCommand) -> Result<()> {
        self.commands
            .send(command)
            .backend_err("Decode worker is gone")
    }
}

impl MediaPipeline for FfmpegPipeline {
    fn play(&mut self) -> Result<()> {
        self.send(WorkerCommand::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.send(WorkerCommand::Pause)
    }

    fn stop(&mut self) -> Result<()> {
        let _ = self.commands.send(WorkerCommand::Stop);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                return Err(CamSyncError::backend("decode worker panicked"));
            }
        }
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.send(WorkerCommand::Seek(position))
    }

    fn set_rate(&mut self, rate: f32) -> Result<()> {
        if !(rate > 0.0) {
            return Err(CamSyncError::backend(format!("invalid rate {}", rate)));
        }
        self.send(WorkerCommand::SetRate(rate))
    }

    fn position(&self) -> Option<Duration> {
        self.status.lock().position
    }

    fn duration(&self) -> Option<Duration> {
        self.status.lock().duration
    }

    fn state(&self) -> StreamState {
        self.status.lock().state
    }
}

impl Drop for FfmpegPipeline {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Decode worker owned by one thread
struct Worker {
    path: PathBuf,
    width: u32,
    height: u32,
    sink: Option<Arc<dyn FrameSink>>,
    commands: Receiver<WorkerCommand>,
    status: Arc<Mutex<WorkerStatus>>,
}

impl Worker {
    fn run(self) {
        if let Err(e) = self.decode_loop() {
            error!("Decode worker for {:?} failed: {}", self.path, e);
            self.status.lock().state = StreamState::Error;
        }
    }

    fn set_state(&self, state: StreamState) {
        self.status.lock().state = state;
    }

    fn decode_loop(&self) -> Result<()> {
        let mut decoding: Option<Decoding> = None;
        let mut want_playing = false;
        let mut rate = 1.0f64;
        // (wall clock, pts) pair the pacing is measured from
        let mut anchor: Option<(Instant, Duration)> = None;
        let mut pending: Option<VideoFrame> = None;
        let mut preview = false;

        loop {
            let wait = if want_playing {
                match (&pending, anchor) {
                    (Some(frame), Some((wall, base))) => {
                        let due = wall + frame.pts.saturating_sub(base).div_f64(rate);
                        Some(due.saturating_duration_since(Instant::now()))
                    }
                    _ => Some(Duration::ZERO),
                }
            } else if preview {
                Some(Duration::ZERO)
            } else {
                None
            };

            let command = match wait {
                Some(timeout) => match self.commands.recv_timeout(timeout) {
                    Ok(command) => Some(command),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => return Ok(()),
                },
                None => match self.commands.recv() {
                    Ok(command) => Some(command),
                    Err(_) => return Ok(()),
                },
            };

            if let Some(command) = command {
                debug!("Worker {:?} <- {:?}", self.path, command);
                match command {
                    WorkerCommand::Play => {
                        if decoding.is_none() {
                            self.set_state(StreamState::Opening);
                            decoding = Some(Decoding::open(&self.path, self.width, self.height)?);
                        }
                        want_playing = true;
                        anchor = None;
                    }
                    WorkerCommand::Pause => {
                        want_playing = false;
                        if self.status.lock().position.is_some() {
                            self.set_state(StreamState::Paused);
                        }
                    }
                    WorkerCommand::Stop => {
                        self.set_state(StreamState::Idle);
                        return Ok(());
                    }
                    WorkerCommand::Seek(position) => {
                        if decoding.is_none() {
                            decoding = Some(Decoding::open(&self.path, self.width, self.height)?);
                        }
                        if let Some(decoding) = decoding.as_mut() {
                            decoding.seek(position)?;
                        }
                        pending = None;
                        anchor = None;
                        preview = !want_playing;
                        self.status.lock().position = Some(position);
                    }
                    WorkerCommand::SetRate(new_rate) => {
                        rate = new_rate as f64;
                        anchor = None;
                    }
                }
                continue;
            }

            let decoding = match decoding.as_mut() {
                Some(decoding) => decoding,
                None => continue,
            };

            if let Some(frame) = pending.take() {
                self.present(frame);
                self.set_state(StreamState::Playing);
                continue;
            }

            match decoding.next_frame()? {
                Some(frame) if preview => {
                    preview = false;
                    self.present(frame);
                }
                Some(frame) => {
                    if anchor.is_none() {
                        anchor = Some((Instant::now(), frame.pts));
                    }
                    pending = Some(frame);
                }
                None => {
                    preview = false;
                    want_playing = false;
                    self.set_state(StreamState::Ended);
                }
            }
        }
    }

    fn present(&self, frame: VideoFrame) {
        self.status.lock().position = Some(frame.pts);
        if let Some(sink) = &self.sink {
            sink.present(frame);
        }
    }
}

/// Demuxer, decoder and scaler for one file
struct Decoding {
    input: format::context::Input,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    time_base: ffmpeg::Rational,
    /// Stream start in `time_base` ticks; positions are relative to it
    start_ticks: i64,
    scaler: Option<ffmpeg::software::scaling::Context>,
    width: u32,
    height: u32,
    skip_until: Option<Duration>,
    eof: bool,
}

impl Decoding {
    fn open(path: &Path, width: u32, height: u32) -> Result<Self> {
        let input = format::input(&path)?;
        let stream = input
            .streams()
            .best(media::Type::Video)
            .ok_or_else(|| CamSyncError::backend("No video stream found"))?;

        let stream_index = stream.index();
        let time_base = stream.time_base();
        // AV_NOPTS_VALUE when the container has no start time
        let start_ticks = match stream.start_time() {
            i64::MIN => 0,
            ticks => ticks,
        };
        let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context.decoder().video()?;

        Ok(Self {
            input,
            decoder,
            stream_index,
            time_base,
            start_ticks,
            scaler: None,
            width,
            height,
            skip_until: None,
            eof: false,
        })
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let start = ticks_to_seconds(self.start_ticks, self.time_base);
        let ts = (position.as_secs_f64() + start) * 1_000_000.0;
        let ts = ts.round() as i64;
        self.input.seek(ts, ..ts)?;
        self.decoder.flush();
        self.eof = false;
        self.skip_until = Some(position);
        Ok(())
    }

    /// Decode the next frame at or after the last seek target
    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        let mut decoded = ffmpeg::frame::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let pts = self.pts_of(&decoded);
                if let Some(target) = self.skip_until {
                    if pts < target {
                        continue;
                    }
                    self.skip_until = None;
                }
                return self.convert(&decoded, pts).map(Some);
            }

            if self.eof {
                return Ok(None);
            }

            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() == self.stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                None => {
                    self.decoder.send_eof()?;
                    self.eof = true;
                }
            }
        }
    }

    fn pts_of(&self, frame: &ffmpeg::frame::Video) -> Duration {
        let ticks = frame
            .timestamp()
            .unwrap_or(self.start_ticks)
            .saturating_sub(self.start_ticks);
        let seconds = ticks_to_seconds(ticks, self.time_base);
        Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::ZERO)
    }

    fn convert(&mut self, frame: &ffmpeg::frame::Video, pts: Duration) -> Result<VideoFrame> {
        let out_width = if self.width > 0 { self.width } else { frame.width() };
        let out_height = if self.height > 0 { self.height } else { frame.height() };

        let scaler = match self.scaler.as_mut() {
            Some(scaler) => scaler,
            None => self.scaler.insert(ffmpeg::software::scaling::Context::get(
                frame.format(),
                frame.width(),
                frame.height(),
                ffmpeg::format::Pixel::RGB24,
                out_width,
                out_height,
                ffmpeg::software::scaling::Flags::BILINEAR,
            )?),
        };

        let mut rgb = ffmpeg::frame::Video::empty();
        scaler.run(frame, &mut rgb)?;

        Ok(VideoFrame {
            data: rgb.data(0).to_vec(),
            stride: rgb.stride(0),
            width: rgb.width(),
            height: rgb.height(),
            pts,
        })
    }
}

fn ticks_to_seconds(ticks: i64, time_base: ffmpeg::Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    ticks as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}
