// Integration tests for interruption recovery
//
// A stalled capture status arms a grace-period watchdog. Recovery within the
// grace window cancels it; otherwise the session is force-paused and chunk
// rotation stops until the caller resumes.

use anyhow::Result;
use appointment_recorder::{
    CaptureDevice, CaptureStatus, ChunkStatus, ScriptedCaptureDevice, SessionConfig, SessionEvent,
    SessionFactory, SessionStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

const CHUNK: Duration = Duration::from_secs(15);
const GRACE: Duration = Duration::from_secs(5);

fn factory(device: &ScriptedCaptureDevice) -> SessionFactory {
    let device: Arc<dyn CaptureDevice> = Arc::new(device.clone());
    SessionFactory::new(
        device,
        SessionConfig {
            chunk_duration: CHUNK,
            interruption_grace: GRACE,
            ..SessionConfig::default()
        },
    )
}

fn pause_changes(events: &mut broadcast::Receiver<SessionEvent>) -> Vec<(bool, bool)> {
    let mut changes = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::PauseChanged { paused, forced } = event {
            changes.push((paused, forced));
        }
    }
    changes
}

#[tokio::test(start_paused = true)]
async fn test_unrecovered_stall_forces_exactly_one_pause() -> Result<()> {
    let device = ScriptedCaptureDevice::new();
    let (controller, _chunks) = factory(&device).create()?;
    let mut events = controller.subscribe();

    controller.start_recording("A1").await?;

    // Inject a stall and give no clearance for T_grace + 1s
    device.emit(CaptureStatus::stalled());
    sleep(GRACE + Duration::from_secs(1)).await;

    assert_eq!(pause_changes(&mut events), vec![(true, true)]);

    let snapshot = controller.snapshot().await?;
    assert_eq!(snapshot.status, SessionStatus::Paused);
    assert!(!snapshot.interruption_pending);

    // Rotation timer is disarmed while interrupted
    sleep(CHUNK * 3).await;
    let snapshot = controller.snapshot().await?;
    assert_eq!(snapshot.chunk_counter, 1);
    assert_eq!(snapshot.chunks[0].status, ChunkStatus::Pending);
    assert!(pause_changes(&mut events).is_empty());

    // Resume brings rotation back with a fresh period
    controller.resume_recording().await?;
    assert_eq!(pause_changes(&mut events), vec![(false, false)]);

    sleep(CHUNK + Duration::from_millis(100)).await;
    let snapshot = controller.snapshot().await?;
    assert_eq!(snapshot.status, SessionStatus::Recording);
    assert_eq!(snapshot.chunk_counter, 2);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_recovery_within_grace_cancels_watchdog() -> Result<()> {
    let device = ScriptedCaptureDevice::new();
    let (controller, _chunks) = factory(&device).create()?;
    let mut events = controller.subscribe();

    controller.start_recording("A1").await?;

    device.emit(CaptureStatus::stalled());
    sleep(Duration::from_secs(2)).await;
    assert!(controller.snapshot().await?.interruption_pending);

    device.emit(CaptureStatus::active(2000));
    sleep(GRACE * 3).await;

    let snapshot = controller.snapshot().await?;
    assert_eq!(snapshot.status, SessionStatus::Recording);
    assert!(!snapshot.interruption_pending);
    assert!(pause_changes(&mut events).is_empty(), "False alarm must not pause");

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_repeated_stalls_keep_original_deadline() -> Result<()> {
    let device = ScriptedCaptureDevice::new();
    let (controller, _chunks) = factory(&device).create()?;
    let mut events = controller.subscribe();

    controller.start_recording("A1").await?;

    device.emit(CaptureStatus::stalled());
    sleep(Duration::from_secs(3)).await;
    device.emit(CaptureStatus::stalled());
    sleep(Duration::from_secs(3)).await;

    // Fired at 5s from the first stall, not 5s from the second
    assert_eq!(pause_changes(&mut events), vec![(true, true)]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stall_while_paused_is_ignored() -> Result<()> {
    let device = ScriptedCaptureDevice::new();
    let (controller, _chunks) = factory(&device).create()?;

    controller.start_recording("A1").await?;
    controller.pause_recording().await?;

    let mut events = controller.subscribe();
    device.emit(CaptureStatus::stalled());
    sleep(GRACE * 2).await;

    assert!(pause_changes(&mut events).is_empty());
    assert!(!controller.snapshot().await?.interruption_pending);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_user_pause_cancels_pending_interruption() -> Result<()> {
    let device = ScriptedCaptureDevice::new();
    let (controller, _chunks) = factory(&device).create()?;
    let mut events = controller.subscribe();

    controller.start_recording("A1").await?;
    device.emit(CaptureStatus::stalled());
    sleep(Duration::from_secs(1)).await;

    controller.pause_recording().await?;
    sleep(GRACE * 2).await;

    // Only the caller's pause is observed
    assert_eq!(pause_changes(&mut events), vec![(true, false)]);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_stop_refused_while_not_actively_recording() -> Result<()> {
    let device = ScriptedCaptureDevice::new();
    let (controller, _chunks) = factory(&device).create()?;

    controller.start_recording("A1").await?;
    device.emit(CaptureStatus::stalled());

    assert!(!controller.stop_recording().await?);

    let snapshot = controller.snapshot().await?;
    assert_eq!(snapshot.status, SessionStatus::Recording);
    assert_eq!(snapshot.finalized_chunks().count(), 0, "No chunk finalized");
    assert_eq!(snapshot.pending_chunk().map(|c| c.position), Some(0));
    assert!(snapshot.end_time.is_none());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_rotation_skipped_while_stalled() -> Result<()> {
    let device = ScriptedCaptureDevice::new();
    let (controller, _chunks) = factory(&device).create()?;

    controller.start_recording("A1").await?;
    sleep(CHUNK - Duration::from_secs(2)).await;

    // Stall just before the boundary; the tick lands inside the grace window
    device.emit(CaptureStatus::stalled());
    sleep(Duration::from_secs(3)).await;

    let snapshot = controller.snapshot().await?;
    assert_eq!(snapshot.chunk_counter, 1, "Chunk is not closed under a stall");
    assert_eq!(device.acquisitions(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_media_services_reset_stops_session() -> Result<()> {
    let device = ScriptedCaptureDevice::new();
    let (controller, _chunks) = factory(&device).create()?;
    let mut events = controller.subscribe();

    controller.start_recording("A1").await?;
    sleep(Duration::from_secs(3)).await;

    device.emit(CaptureStatus::reset());
    sleep(Duration::from_millis(10)).await;

    let snapshot = controller.snapshot().await?;
    assert_eq!(snapshot.status, SessionStatus::Stopped);
    assert_eq!(snapshot.chunks.len(), 1);
    assert!(snapshot.chunks[0].is_last_chunk);

    let mut stopped = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Stopped { forced } = event {
            stopped.push(forced);
        }
    }
    assert_eq!(stopped, vec![true]);

    // Nothing left running
    sleep(CHUNK * 2).await;
    assert_eq!(device.acquisitions(), 1);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_forced_pause_survives_device_rejection() -> Result<()> {
    let device = ScriptedCaptureDevice::new();
    let (controller, _chunks) = factory(&device).create()?;

    controller.start_recording("A1").await?;
    device.set_fail_pause(true);
    device.emit(CaptureStatus::stalled());
    sleep(GRACE + Duration::from_secs(1)).await;

    assert_eq!(controller.snapshot().await?.status, SessionStatus::Paused);

    Ok(())
}
