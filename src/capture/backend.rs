use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Snapshot of what the capture primitive reports about itself
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureStatus {
    /// Audio is actively flowing into the recording
    pub is_recording: bool,
    /// The recording has been stopped and unloaded
    pub is_done_recording: bool,
    /// The platform media services were reset underneath the recording
    pub media_services_reset: bool,
    /// Milliseconds of audio captured so far
    pub duration_ms: u64,
}

impl CaptureStatus {
    pub fn active(duration_ms: u64) -> Self {
        Self {
            is_recording: true,
            duration_ms,
            ..Self::default()
        }
    }

    /// Not recording, not reset, nothing captured yet
    pub fn stalled() -> Self {
        Self::default()
    }

    pub fn reset() -> Self {
        Self {
            media_services_reset: true,
            ..Self::default()
        }
    }

    pub fn finished(duration_ms: u64) -> Self {
        Self {
            is_done_recording: true,
            duration_ms,
            ..Self::default()
        }
    }

    /// Classify a status notification into the signal the session reacts to
    ///
    /// Reset and finished both end the session, so their relative order is
    /// irrelevant to callers.
    pub fn signal(&self) -> CaptureSignal {
        if self.is_recording {
            CaptureSignal::ActivelyRecording
        } else if self.media_services_reset {
            CaptureSignal::MediaServicesReset
        } else if self.is_done_recording {
            CaptureSignal::Finished
        } else if self.duration_ms == 0 {
            CaptureSignal::Stalled
        } else {
            CaptureSignal::Idle
        }
    }
}

/// Interpretation of a capture status notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSignal {
    /// Audio is flowing; clears any pending interruption
    ActivelyRecording,
    /// Fatal external reset
    MediaServicesReset,
    /// Device ended the recording on its own
    Finished,
    /// Not recording and nothing captured; may be a transient race or an interruption
    Stalled,
    /// Not recording after some audio was captured (e.g. paused)
    Idle,
}

/// Options for acquiring a capture handle
#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// Name for the recorded media (used for file names)
    pub label: String,
    /// Where file-backed devices write their output
    pub output_dir: PathBuf,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            label: "recording".to_string(),
            output_dir: PathBuf::from("recordings"),
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// Failures reported by the capture primitive
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// Device could not be acquired (permission denied, hardware busy)
    #[error("{0}")]
    Unavailable(String),
    /// The capture primitive rejected an operation
    #[error("{0}")]
    Device(String),
}

/// Source of capture handles
///
/// Implementations:
/// - `WavCaptureDevice`: synthesized tone written to WAV files
/// - `ScriptedCaptureDevice`: in-memory device driven by tests
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Acquire the device and start recording immediately
    async fn acquire_and_start(
        &self,
        options: &CaptureOptions,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError>;

    /// Get device name for logging
    fn name(&self) -> &str;
}

/// One physically active recording
#[async_trait::async_trait]
pub trait CaptureHandle: Send + Sync {
    async fn pause(&mut self) -> Result<(), CaptureError>;

    async fn resume(&mut self) -> Result<(), CaptureError>;

    /// Stop recording and flush the media, returning its URI
    ///
    /// The handle is unusable afterwards.
    async fn stop_and_finalize(&mut self) -> Result<String, CaptureError>;

    /// Query the current status
    async fn status(&self) -> Result<CaptureStatus, CaptureError>;

    /// Take the status-change notification channel
    ///
    /// Returns `None` once the receiver has been handed out.
    fn status_updates(&mut self) -> Option<mpsc::UnboundedReceiver<CaptureStatus>>;
}
