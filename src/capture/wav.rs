use anyhow::{Context, Result};
use std::f32::consts::TAU;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{CaptureDevice, CaptureError, CaptureHandle, CaptureOptions, CaptureStatus};

/// Length of each synthesized frame
const FRAME_DURATION_MS: u64 = 100;

/// Capture device that synthesizes a test tone into WAV files
///
/// Each acquisition writes `<output_dir>/<label>.wav` as 16-bit PCM and
/// returns the file path as the media URI.
pub struct WavCaptureDevice {
    tone_hz: f32,
}

impl WavCaptureDevice {
    pub fn new() -> Self {
        Self { tone_hz: 440.0 }
    }

    pub fn with_tone(tone_hz: f32) -> Self {
        Self { tone_hz }
    }
}

impl Default for WavCaptureDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CaptureDevice for WavCaptureDevice {
    async fn acquire_and_start(
        &self,
        options: &CaptureOptions,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let writer = ToneWriter::create(options, self.tone_hz)
            .map_err(|e| CaptureError::Unavailable(format!("{:#}", e)))?;

        Ok(Box::new(WavCaptureHandle::start(writer)))
    }

    fn name(&self) -> &str {
        "wav tone generator"
    }
}

/// Writes the synthesized tone to disk
struct ToneWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    file_path: PathBuf,
    sample_rate: u32,
    channels: u16,
    tone_hz: f32,
    phase: f32,
    frames_written: u64,
    paused: bool,
}

impl ToneWriter {
    fn create(options: &CaptureOptions, tone_hz: f32) -> Result<Self> {
        fs::create_dir_all(&options.output_dir)
            .context("Failed to create output directory")?;

        let file_path = options.output_dir.join(format!("{}.wav", options.label));

        let spec = hound::WavSpec {
            channels: options.channels,
            sample_rate: options.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&file_path, spec)
            .with_context(|| format!("Failed to create WAV file: {:?}", file_path))?;

        info!("Capturing to {}", file_path.display());

        Ok(Self {
            writer: Some(writer),
            file_path,
            sample_rate: options.sample_rate,
            channels: options.channels,
            tone_hz,
            phase: 0.0,
            frames_written: 0,
            paused: false,
        })
    }

    fn write_frame(&mut self) -> Result<()> {
        if self.paused {
            return Ok(());
        }

        let Some(writer) = &mut self.writer else {
            return Ok(());
        };

        let frames = self.sample_rate as u64 * FRAME_DURATION_MS / 1000;
        let step = TAU * self.tone_hz / self.sample_rate as f32;

        for _ in 0..frames {
            let sample = (self.phase.sin() * i16::MAX as f32 * 0.2) as i16;
            for _ in 0..self.channels {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            self.phase = (self.phase + step) % TAU;
        }

        self.frames_written += frames;

        Ok(())
    }

    fn duration_ms(&self) -> u64 {
        self.frames_written * 1000 / self.sample_rate.max(1) as u64
    }

    fn status(&self) -> CaptureStatus {
        CaptureStatus {
            is_recording: self.writer.is_some() && !self.paused,
            is_done_recording: self.writer.is_none(),
            media_services_reset: false,
            duration_ms: self.duration_ms(),
        }
    }

    fn finish(&mut self) -> Result<String> {
        let writer = self
            .writer
            .take()
            .context("Recording was already finalized")?;

        writer.finalize().context("Failed to finalize WAV file")?;

        Ok(self.file_path.display().to_string())
    }
}

impl Drop for ToneWriter {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize WAV writer on drop: {}", e);
            }
        }
    }
}

/// Handle for one WAV recording
pub struct WavCaptureHandle {
    writer: Arc<Mutex<ToneWriter>>,
    frame_task: Option<JoinHandle<()>>,
    status_tx: mpsc::UnboundedSender<CaptureStatus>,
    status_rx: Option<mpsc::UnboundedReceiver<CaptureStatus>>,
}

impl WavCaptureHandle {
    fn start(writer: ToneWriter) -> Self {
        let writer = Arc::new(Mutex::new(writer));
        let (status_tx, status_rx) = mpsc::unbounded_channel();

        let frame_writer = Arc::clone(&writer);
        let frame_status_tx = status_tx.clone();
        let frame_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));

            loop {
                ticker.tick().await;

                let result = match frame_writer.lock() {
                    Ok(mut writer) => writer.write_frame(),
                    Err(_) => break,
                };

                if let Err(e) = result {
                    warn!("Tone capture failed: {:#}", e);
                    let _ = frame_status_tx.send(CaptureStatus::reset());
                    break;
                }
            }

            debug!("Tone frame task stopped");
        });

        let _ = status_tx.send(CaptureStatus::active(0));

        Self {
            writer,
            frame_task: Some(frame_task),
            status_tx,
            status_rx: Some(status_rx),
        }
    }

    fn with_writer<T>(
        &self,
        f: impl FnOnce(&mut ToneWriter) -> Result<T, CaptureError>,
    ) -> Result<T, CaptureError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| CaptureError::Device("WAV writer lock poisoned".to_string()))?;
        f(&mut writer)
    }
}

#[async_trait::async_trait]
impl CaptureHandle for WavCaptureHandle {
    async fn pause(&mut self) -> Result<(), CaptureError> {
        let status = self.with_writer(|writer| {
            if writer.writer.is_none() {
                return Err(CaptureError::Device("Recording was already finalized".to_string()));
            }
            writer.paused = true;
            Ok(writer.status())
        })?;

        let _ = self.status_tx.send(status);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        let status = self.with_writer(|writer| {
            if writer.writer.is_none() {
                return Err(CaptureError::Device("Recording was already finalized".to_string()));
            }
            writer.paused = false;
            Ok(writer.status())
        })?;

        let _ = self.status_tx.send(status);
        Ok(())
    }

    async fn stop_and_finalize(&mut self) -> Result<String, CaptureError> {
        if let Some(task) = self.frame_task.take() {
            task.abort();
        }

        let (uri, status) = self.with_writer(|writer| {
            let uri = writer
                .finish()
                .map_err(|e| CaptureError::Device(format!("{:#}", e)))?;
            Ok((uri, writer.status()))
        })?;

        let _ = self.status_tx.send(status);
        Ok(uri)
    }

    async fn status(&self) -> Result<CaptureStatus, CaptureError> {
        self.with_writer(|writer| Ok(writer.status()))
    }

    fn status_updates(&mut self) -> Option<mpsc::UnboundedReceiver<CaptureStatus>> {
        self.status_rx.take()
    }
}

impl Drop for WavCaptureHandle {
    fn drop(&mut self) {
        if let Some(task) = self.frame_task.take() {
            task.abort();
        }
    }
}
