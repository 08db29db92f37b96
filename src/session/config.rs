use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::capture::CaptureOptions;
use crate::error::{RecorderError, RecorderResult};

/// Configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Period of the chunk rotation timer
    /// Default: 15 seconds
    pub chunk_duration: Duration,

    /// How long a stalled capture may go without an "actively recording"
    /// status before it is treated as an interruption
    /// Default: 5 seconds
    pub interruption_grace: Duration,

    /// Where file-backed capture devices write chunks
    pub output_dir: PathBuf,

    /// Sample rate for capture
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_secs(15),
            interruption_grace: Duration::from_secs(5),
            output_dir: PathBuf::from("recordings"),
            sample_rate: 44100,
            channels: 1,
        }
    }
}

impl SessionConfig {
    /// Reject settings the timers or capture devices cannot run with
    pub fn validate(&self) -> RecorderResult<()> {
        if self.chunk_duration.is_zero() {
            return Err(RecorderError::InvalidConfig(
                "chunk_duration must be greater than zero".to_string(),
            ));
        }
        if self.interruption_grace.is_zero() {
            return Err(RecorderError::InvalidConfig(
                "interruption_grace must be greater than zero".to_string(),
            ));
        }
        if self.sample_rate == 0 || self.channels == 0 {
            return Err(RecorderError::InvalidConfig(
                "sample_rate and channels must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Capture options for the chunk at `position`
    pub fn capture_options(&self, appointment_id: &str, position: u32) -> CaptureOptions {
        CaptureOptions {
            label: format!("{}-chunk-{:03}", appointment_id, position),
            output_dir: self.output_dir.clone(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SessionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_durations_rejected() {
        let zero_chunk = SessionConfig {
            chunk_duration: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert!(matches!(
            zero_chunk.validate(),
            Err(RecorderError::InvalidConfig(msg)) if msg.contains("chunk_duration")
        ));

        let zero_grace = SessionConfig {
            interruption_grace: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert!(matches!(
            zero_grace.validate(),
            Err(RecorderError::InvalidConfig(msg)) if msg.contains("interruption_grace")
        ));
    }

    #[test]
    fn test_chunk_labels_are_zero_padded() {
        let options = SessionConfig::default().capture_options("A1", 7);
        assert_eq!(options.label, "A1-chunk-007");
    }
}
