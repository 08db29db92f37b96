// Integration tests for the WAV tone capture device
//
// These tests verify that the device writes readable 16-bit PCM files, stops
// writing while paused, and that a full session produces one file per chunk.

use anyhow::Result;
use appointment_recorder::{
    CaptureDevice, CaptureOptions, CaptureSignal, Chunk, SessionConfig, SessionFactory,
    WavCaptureDevice,
};
use futures::StreamExt;
use hound::WavReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_wav_capture_writes_tone() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let device = WavCaptureDevice::new();

    let options = CaptureOptions {
        label: "tone".to_string(),
        output_dir: temp_dir.path().to_path_buf(),
        sample_rate: 16000,
        channels: 1,
    };

    let mut handle = device.acquire_and_start(&options).await?;
    let mut updates = handle.status_updates().expect("status channel");
    assert!(handle.status_updates().is_none(), "Channel is handed out once");

    let first = updates.recv().await.expect("initial status");
    assert_eq!(first.signal(), CaptureSignal::ActivelyRecording);

    sleep(Duration::from_millis(1050)).await;

    let status = handle.status().await?;
    assert!(status.is_recording);
    assert!(status.duration_ms >= 1000, "got {}ms", status.duration_ms);

    // Nothing is written while paused
    handle.pause().await?;
    let paused = handle.status().await?;
    assert!(!paused.is_recording);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(handle.status().await?.duration_ms, paused.duration_ms);

    handle.resume().await?;
    sleep(Duration::from_millis(500)).await;

    let uri = handle.stop_and_finalize().await?;
    let final_status = handle.status().await?;
    assert!(final_status.is_done_recording);
    assert!(handle.stop_and_finalize().await.is_err(), "Finalize only once");

    let path = PathBuf::from(&uri);
    assert_eq!(path, temp_dir.path().join("tone.wav"));

    let reader = WavReader::open(&path)?;
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().bits_per_sample, 16);
    assert_eq!(reader.len() as u64, final_status.duration_ms * 16);

    let samples: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert!(samples.iter().any(|&s| s != 0), "Tone should not be silence");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_session_writes_one_file_per_chunk() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let device: Arc<dyn CaptureDevice> = Arc::new(WavCaptureDevice::new());

    let config = SessionConfig {
        chunk_duration: Duration::from_secs(2),
        interruption_grace: Duration::from_secs(1),
        output_dir: temp_dir.path().to_path_buf(),
        sample_rate: 16000,
        channels: 1,
    };

    let (controller, chunks) = SessionFactory::new(device, config).create()?;

    controller.start_recording("wav-test").await?;
    sleep(Duration::from_millis(5000)).await;
    assert!(controller.stop_recording().await?);

    let chunks: Vec<Chunk> = chunks.collect().await;
    assert_eq!(chunks.len(), 3, "Rotations at 2s and 4s, then stop");

    for (index, chunk) in chunks.iter().enumerate() {
        let expected = temp_dir
            .path()
            .join(format!("wav-test-chunk-{:03}.wav", index));
        assert_eq!(chunk.uri.as_deref(), Some(&*expected.to_string_lossy()));

        let reader = WavReader::open(&expected)?;
        assert!(reader.len() > 0, "Chunk {} should not be empty", index);
    }
    assert!(chunks[2].is_last_chunk);

    Ok(())
}

#[tokio::test]
async fn test_unwritable_directory_is_unavailable() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let blocker = temp_dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file")?;

    let options = CaptureOptions {
        label: "x".to_string(),
        output_dir: blocker.join("nested"),
        ..CaptureOptions::default()
    };

    let result = WavCaptureDevice::new().acquire_and_start(&options).await;
    assert!(matches!(
        result,
        Err(appointment_recorder::CaptureError::Unavailable(_))
    ));

    Ok(())
}
