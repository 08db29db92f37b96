use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub recording: RecordingConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct RecordingConfig {
    pub recordings_path: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_duration_secs: u64,
    pub interruption_grace_secs: u64,
}

impl Config {
    /// Load `path` (any format the `config` crate understands, extension
    /// optional) over built-in defaults, then apply
    /// `APPOINTMENT_RECORDER__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.name", "appointment-recorder")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8080)?
            .set_default("recording.recordings_path", "recordings")?
            .set_default("recording.sample_rate", 44100)?
            .set_default("recording.channels", 1)?
            .set_default("recording.chunk_duration_secs", 15)?
            .set_default("recording.interruption_grace_secs", 5)?
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("APPOINTMENT_RECORDER").separator("__"),
            )
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.session_config()
            .validate()
            .with_context(|| format!("Rejected config from {}", path))?;

        Ok(cfg)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            chunk_duration: Duration::from_secs(self.recording.chunk_duration_secs),
            interruption_grace: Duration::from_secs(self.recording.interruption_grace_secs),
            output_dir: PathBuf::from(&self.recording.recordings_path),
            sample_rate: self.recording.sample_rate,
            channels: self.recording.channels,
        }
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_without_file() -> Result<()> {
        let dir = TempDir::new()?;
        let missing = dir.path().join("absent");

        let cfg = Config::load(&missing.to_string_lossy())?;
        let session = cfg.session_config();

        assert_eq!(session.chunk_duration, Duration::from_secs(15));
        assert_eq!(session.interruption_grace, Duration::from_secs(5));
        assert_eq!(cfg.http_addr(), "127.0.0.1:8080");

        Ok(())
    }

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join("recorder.toml"),
            r#"
[service]
name = "clinic-recorder"

[service.http]
bind = "0.0.0.0"
port = 9000

[recording]
recordings_path = "/tmp/chunks"
sample_rate = 16000
channels = 1
chunk_duration_secs = 60
interruption_grace_secs = 3
"#,
        )?;

        let base = dir.path().join("recorder");
        let cfg = Config::load(&base.to_string_lossy())?;

        assert_eq!(cfg.service.name, "clinic-recorder");
        assert_eq!(cfg.http_addr(), "0.0.0.0:9000");

        let session = cfg.session_config();
        assert_eq!(session.chunk_duration, Duration::from_secs(60));
        assert_eq!(session.interruption_grace, Duration::from_secs(3));
        assert_eq!(session.output_dir, PathBuf::from("/tmp/chunks"));
        assert_eq!(session.sample_rate, 16000);

        Ok(())
    }

    #[test]
    fn test_zero_chunk_duration_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        fs::write(
            dir.path().join("recorder.toml"),
            r#"
[recording]
chunk_duration_secs = 0
"#,
        )?;

        let base = dir.path().join("recorder");
        let err = Config::load(&base.to_string_lossy()).expect_err("zero period must fail");
        assert!(
            format!("{:#}", err).contains("chunk_duration"),
            "unexpected error: {:#}",
            err
        );

        Ok(())
    }
}
