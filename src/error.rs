use thiserror::Error;

use crate::capture::CaptureError;
use crate::session::SessionStatus;

/// Failures surfaced to callers of the session API
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecorderError {
    #[error("Microphone unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("A recording session is already running")]
    AlreadyRunning,

    #[error("Cannot {operation} a recording that is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionStatus,
    },

    #[error("Please resume the recording to end it")]
    NotRecording,

    #[error("Recording device error: {0}")]
    DeviceError(String),

    #[error("Could not reopen the microphone for chunk {position}: {reason}")]
    ReacquireFailed { position: u32, reason: String },

    #[error("Recording session has shut down")]
    SessionClosed,

    #[error("Invalid recording configuration: {0}")]
    InvalidConfig(String),
}

impl RecorderError {
    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::CaptureUnavailable(_) => "CAPTURE_UNAVAILABLE",
            Self::AlreadyRunning => "ALREADY_RUNNING",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::NotRecording => "NOT_RECORDING",
            Self::DeviceError(_) => "DEVICE_ERROR",
            Self::ReacquireFailed { .. } => "REACQUIRE_FAILED",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}

impl From<CaptureError> for RecorderError {
    fn from(error: CaptureError) -> Self {
        match error {
            CaptureError::Unavailable(reason) => Self::CaptureUnavailable(reason),
            CaptureError::Device(reason) => Self::DeviceError(reason),
        }
    }
}

pub type RecorderResult<T> = Result<T, RecorderError>;
