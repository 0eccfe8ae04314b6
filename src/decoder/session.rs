//! Uniform control surface over one backend pipeline
//!
//! A session is bound to exactly one file and one drawing target for its
//! whole life. Once its last observed state is [`StreamState::Error`], every
//! command becomes a logged no-op that returns
//! [`CamSyncError::SessionFaulted`]; nothing here panics or tears down the
//! caller.

use crate::decoder::{DrawingTarget, MediaBackend, MediaPipeline, StreamState, TargetId};
use crate::utils::error::{CamSyncError, Result};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One decoding pipeline bound to one file and one output surface
pub struct DecoderSession {
    /// Position in the selection, stable for the session's lifetime
    index: usize,

    /// Source file
    path: PathBuf,

    /// Output surface
    target: DrawingTarget,

    /// Backend pipeline, absent when opening failed or after release
    pipeline: Option<Box<dyn MediaPipeline>>,

    /// Requested playback rate
    rate: f32,

    /// State seen on the last poll
    last_state: StreamState,

    /// Why the session is flagged Error
    fault: Option<String>,
}

impl DecoderSession {
    /// Open `path` on `backend`, bound to `target`. Does not start playback.
    pub fn open(
        index: usize,
        backend: &dyn MediaBackend,
        path: &Path,
        target: DrawingTarget,
    ) -> Result<Self> {
        let pipeline = backend.open(path, &target).map_err(|e| match e {
            CamSyncError::MediaOpen { .. } => e,
            other => CamSyncError::MediaOpen {
                path: path.to_path_buf(),
                reason: other.to_string(),
            },
        })?;

        debug!("Session {} opened {:?} on {}", index, path, target.id);

        Ok(Self {
            index,
            path: path.to_path_buf(),
            target,
            pipeline: Some(pipeline),
            rate: 1.0,
            last_state: StreamState::Idle,
            fault: None,
        })
    }

    /// Placeholder session for a file the backend refused
    ///
    /// Keeps pool indices aligned with the selection order.
    pub fn faulted(index: usize, path: &Path, target: DrawingTarget, reason: String) -> Self {
        Self {
            index,
            path: path.to_path_buf(),
            target,
            pipeline: None,
            rate: 1.0,
            last_state: StreamState::Error,
            fault: Some(reason),
        }
    }

    /// Stop the current pipeline (if any) and open the file again
    ///
    /// Clears a previous fault on success; the requested rate is reapplied.
    pub fn reopen(&mut self, backend: &dyn MediaBackend) -> Result<()> {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.stop() {
                debug!("Session {} stop before reopen failed: {}", self.index, e);
            }
        }

        match backend.open(&self.path, &self.target) {
            Ok(mut pipeline) => {
                if (self.rate - 1.0).abs() > f32::EPSILON {
                    if let Err(e) = pipeline.set_rate(self.rate) {
                        warn!("Session {} could not restore rate {}: {}", self.index, self.rate, e);
                    }
                }
                self.pipeline = Some(pipeline);
                self.fault = None;
                self.last_state = StreamState::Idle;
                info!("Session {} reopened {:?}", self.index, self.path);
                Ok(())
            }
            Err(e) => {
                let reason = e.to_string();
                self.mark_faulted(reason.clone());
                Err(CamSyncError::MediaOpen {
                    path: self.path.clone(),
                    reason,
                })
            }
        }
    }

    /// Request playback
    pub fn play(&mut self) -> Result<()> {
        self.command("play", |p| p.play())
    }

    /// Request pause
    pub fn pause(&mut self) -> Result<()> {
        self.command("pause", |p| p.pause())
    }

    /// Request an absolute position in milliseconds
    pub fn seek(&mut self, target_ms: u64) -> Result<()> {
        self.command("seek", |p| p.seek(Duration::from_millis(target_ms)))
    }

    /// Set the playback rate
    pub fn set_rate(&mut self, rate: f32) -> Result<()> {
        self.rate = rate;
        self.command("set_rate", |p| p.set_rate(rate))
    }

    /// Stop and release the pipeline
    ///
    /// Safe on faulted sessions; the session cannot be played afterwards.
    pub fn release(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.stop() {
                debug!("Session {} stop failed during release: {}", self.index, e);
            }
        }
        if self.fault.is_none() {
            self.last_state = StreamState::Idle;
        }
    }

    /// Reported position in milliseconds, `None` while unknown
    pub fn position_ms(&self) -> Option<u64> {
        self.pipeline
            .as_ref()
            .and_then(|p| p.position())
            .map(|d| d.as_millis() as u64)
    }

    /// Media duration in milliseconds, `None` while unknown
    pub fn duration_ms(&self) -> Option<u64> {
        self.pipeline
            .as_ref()
            .and_then(|p| p.duration())
            .map(|d| d.as_millis() as u64)
    }

    /// Poll the native state and remember it
    pub fn poll_state(&mut self) -> StreamState {
        if self.fault.is_some() {
            return StreamState::Error;
        }

        let state = match &self.pipeline {
            Some(pipeline) => pipeline.state(),
            None => StreamState::Idle,
        };

        if state == StreamState::Error {
            self.mark_faulted("pipeline reported error".to_string());
        } else {
            self.last_state = state;
        }

        self.last_state
    }

    /// State seen on the last poll
    pub fn last_state(&self) -> StreamState {
        self.last_state
    }

    /// Flag the session Error
    pub fn mark_faulted(&mut self, reason: String) {
        if self.fault.is_none() {
            warn!("Session {} ({:?}) flagged Error: {}", self.index, self.path, reason);
        }
        self.fault = Some(reason);
        self.last_state = StreamState::Error;
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target_id(&self) -> TargetId {
        self.target.id
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    fn command<F>(&mut self, name: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut dyn MediaPipeline) -> Result<()>,
    {
        if self.fault.is_some() {
            debug!("Session {} ignoring {} while faulted", self.index, name);
            return Err(CamSyncError::SessionFaulted { index: self.index });
        }

        let pipeline = match self.pipeline.as_mut() {
            Some(pipeline) => pipeline,
            None => {
                debug!("Session {} ignoring {} after release", self.index, name);
                return Err(CamSyncError::SessionFaulted { index: self.index });
            }
        };

        if let Err(e) = f(pipeline.as_mut()) {
            self.mark_faulted(format!("{} failed: {}", name, e));
            return Err(e);
        }

        Ok(())
    }
}

impl std::fmt::Debug for DecoderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderSession")
            .field("index", &self.index)
            .field("path", &self.path)
            .field("target", &self.target.id)
            .field("rate", &self.rate)
            .field("last_state", &self.last_state)
            .field("fault", &self.fault)
            .finish()
    }
}

impl Drop for DecoderSession {
    fn drop(&mut self) {
        self.release();
    }
}
