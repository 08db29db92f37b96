//! Session state machine
//!
//! A single tokio task owns the session, the capture handle and both timers.
//! Caller commands, timer firings and capture status notifications all arrive
//! through one queue and are handled to completion one at a time.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::controller::SessionSlot;
use super::events::{Command, Event, SessionEvent};
use super::state::{Session, SessionSnapshot, SessionStatus};
use super::timer::{RotationTimer, WatchdogTimer};
use crate::capture::{CaptureDevice, CaptureError, CaptureHandle, CaptureSignal, CaptureStatus};
use crate::error::{RecorderError, RecorderResult};

/// The capture handle currently owned by the session
struct ActiveCapture {
    /// Distinguishes this acquisition's status notifications from earlier ones
    epoch: u64,
    handle: Box<dyn CaptureHandle>,
    forwarder: Option<JoinHandle<()>>,
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

pub(crate) struct SessionMachine {
    config: SessionConfig,
    device: Arc<dyn CaptureDevice>,
    session: Session,
    capture: Option<ActiveCapture>,
    next_epoch: u64,
    rotation: RotationTimer,
    watchdog: WatchdogTimer,
    events: broadcast::Sender<SessionEvent>,
    queue: mpsc::WeakSender<Event>,
    slot: Option<SessionSlot>,
    last_error: Option<String>,
}

impl SessionMachine {
    pub(crate) fn new(
        config: SessionConfig,
        device: Arc<dyn CaptureDevice>,
        session: Session,
        events: broadcast::Sender<SessionEvent>,
        queue: mpsc::WeakSender<Event>,
        slot: SessionSlot,
    ) -> Self {
        Self {
            rotation: RotationTimer::new(config.chunk_duration),
            watchdog: WatchdogTimer::new(config.interruption_grace),
            config,
            device,
            session,
            capture: None,
            next_epoch: 0,
            events,
            queue,
            slot: Some(slot),
            last_error: None,
        }
    }

    /// Process events until every sender is gone
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<Event>) {
        info!("Session {} ready (device: {})", self.session.id, self.device.name());

        while let Some(event) = rx.recv().await {
            self.handle(event).await;
        }

        if matches!(
            self.session.status,
            SessionStatus::Recording | SessionStatus::Paused
        ) {
            warn!(
                "Session {} abandoned while {}; stopping",
                self.session.id, self.session.status
            );
            self.force_stop().await;
        }

        info!("Session {} shut down", self.session.id);
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::Command(command) => self.handle_command(command).await,
            Event::RotationTick { generation } => self.on_rotation_tick(generation).await,
            Event::WatchdogFired { generation } => self.on_watchdog_fired(generation).await,
            Event::CaptureStatus { epoch, status } => self.on_capture_status(epoch, status).await,
            Event::Lifecycle(state) => {
                info!("App moved to {} (session {})", state, self.session.status);
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Start {
                appointment_id,
                reply,
            } => {
                let result = self.start(appointment_id).await;
                let _ = reply.send(result);
            }
            Command::Pause { reply } => {
                let result = self.pause().await;
                let _ = reply.send(result);
            }
            Command::Resume { reply } => {
                let result = self.resume().await;
                let _ = reply.send(result);
            }
            Command::Stop { reply } => {
                let result = self.stop().await;
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        self.session
            .snapshot(self.watchdog.is_armed(), self.last_error.clone())
    }

    fn invalid(&self, operation: &'static str) -> RecorderError {
        RecorderError::InvalidState {
            operation,
            state: self.session.status,
        }
    }

    fn publish(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ------------------------------------------------------------------
    // Caller operations
    // ------------------------------------------------------------------

    async fn start(&mut self, appointment_id: String) -> RecorderResult<()> {
        match self.session.status {
            SessionStatus::Idle => {}
            SessionStatus::Recording | SessionStatus::Paused => {
                return Err(RecorderError::AlreadyRunning)
            }
            SessionStatus::Stopped => return Err(self.invalid("start")),
        }

        info!("Starting recording for appointment {}", appointment_id);

        let options = self.config.capture_options(&appointment_id, 0);
        let handle = self
            .device
            .acquire_and_start(&options)
            .await
            .map_err(|e| {
                warn!("Failed to acquire capture device: {}", e);
                RecorderError::CaptureUnavailable(e.to_string())
            })?;

        let now = Utc::now();
        self.session.appointment_id = Some(appointment_id.clone());
        self.session.start_time = Some(now);
        self.install_capture(handle);
        self.session.ledger.open(now);
        self.rotation.arm(&self.queue);
        self.session.status = SessionStatus::Recording;

        info!("Recording started (chunks every {:?})", self.config.chunk_duration);
        self.publish(SessionEvent::Started { appointment_id });

        Ok(())
    }

    async fn pause(&mut self) -> RecorderResult<()> {
        match self.session.status {
            SessionStatus::Recording => {}
            SessionStatus::Paused => {
                debug!("Pause requested while already paused");
                return Ok(());
            }
            SessionStatus::Idle | SessionStatus::Stopped => return Err(self.invalid("pause")),
        }

        let Some(capture) = self.capture.as_mut() else {
            return Err(RecorderError::DeviceError("no active capture".to_string()));
        };

        capture.handle.pause().await?;

        self.rotation.disarm();
        self.watchdog.disarm();
        self.enter_paused(false);

        Ok(())
    }

    async fn resume(&mut self) -> RecorderResult<()> {
        match self.session.status {
            SessionStatus::Paused => {}
            SessionStatus::Recording => {
                debug!("Resume requested while already recording");
                return Ok(());
            }
            SessionStatus::Idle | SessionStatus::Stopped => return Err(self.invalid("resume")),
        }

        match self.capture.as_mut() {
            Some(capture) => capture.handle.resume().await?,
            None => {
                // Capture was lost during rotation; reopen into the next position
                let position = self
                    .open_next_chunk()
                    .await
                    .map_err(|e| RecorderError::CaptureUnavailable(e.to_string()))?;
                info!("Capture reacquired for chunk {}", position);
            }
        }

        // A fresh full period, not the remainder of the interrupted one
        self.rotation.arm(&self.queue);
        self.session.status = SessionStatus::Recording;

        info!("Recording resumed");
        self.publish(SessionEvent::PauseChanged {
            paused: false,
            forced: false,
        });

        Ok(())
    }

    async fn stop(&mut self) -> RecorderResult<()> {
        match self.session.status {
            SessionStatus::Recording => {}
            SessionStatus::Paused => return Err(RecorderError::NotRecording),
            SessionStatus::Stopped => {
                debug!("Stop requested on a stopped session");
                return Ok(());
            }
            SessionStatus::Idle => return Err(self.invalid("stop")),
        }

        match self.rotate_chunk(true).await {
            Ok(true) => {
                self.finish(false);
                Ok(())
            }
            Ok(false) => {
                info!("Stop refused: capture is not actively recording");
                Err(RecorderError::NotRecording)
            }
            Err(e) => {
                // The handle is released once finalization was attempted
                if self.capture.is_none() {
                    self.finish(false);
                }
                Err(e)
            }
        }
    }

    // ------------------------------------------------------------------
    // Chunk rotation
    // ------------------------------------------------------------------

    /// Close the current chunk and, unless `is_last`, open the next one
    ///
    /// Returns `Ok(false)` without touching anything when the device is not
    /// actively recording.
    async fn rotate_chunk(&mut self, is_last: bool) -> RecorderResult<bool> {
        let Some(capture) = self.capture.as_ref() else {
            return Ok(false);
        };

        let status = capture.handle.status().await?;
        if self.session.status != SessionStatus::Recording || !status.is_recording {
            return Ok(false);
        }

        let flushed = self.finalize_current(is_last).await;

        if !is_last {
            let position = self.session.chunk_counter();
            if let Err(e) = self.open_next_chunk().await {
                return Err(RecorderError::ReacquireFailed {
                    position,
                    reason: e.to_string(),
                });
            }
        }

        flushed?;
        Ok(true)
    }

    /// Stop the current handle and record the outcome in the ledger
    async fn finalize_current(&mut self, is_last: bool) -> Result<(), CaptureError> {
        let Some(mut capture) = self.capture.take() else {
            return Ok(());
        };

        let result = capture.handle.stop_and_finalize().await;
        drop(capture);

        let now = Utc::now();
        let chunk = match &result {
            Ok(uri) => self.session.ledger.finalize(uri.clone(), now, is_last),
            Err(e) => {
                error!("Failed to finalize chunk: {}", e);
                self.session.ledger.fail(now, is_last)
            }
        };

        if let Some(chunk) = chunk {
            info!(
                "Chunk {} {:?}: {} (last={})",
                chunk.position,
                chunk.status,
                chunk.uri.as_deref().unwrap_or("-"),
                chunk.is_last_chunk
            );
            self.publish(SessionEvent::ChunkFinalized(chunk));
        }

        result.map(|_| ())
    }

    /// Acquire a new handle and open the chunk at the next position
    async fn open_next_chunk(&mut self) -> Result<u32, CaptureError> {
        let appointment_id = self.session.appointment_id.clone().unwrap_or_default();
        let position = self.session.chunk_counter();
        let options = self.config.capture_options(&appointment_id, position);

        let handle = self.device.acquire_and_start(&options).await?;
        self.install_capture(handle);

        Ok(self.session.ledger.open(Utc::now()))
    }

    fn install_capture(&mut self, mut handle: Box<dyn CaptureHandle>) {
        let epoch = self.next_epoch;
        self.next_epoch += 1;

        let queue = self.queue.clone();
        let forwarder = handle.status_updates().map(|mut updates| {
            tokio::spawn(async move {
                while let Some(status) = updates.recv().await {
                    let Some(tx) = queue.upgrade() else {
                        break;
                    };
                    if tx.send(Event::CaptureStatus { epoch, status }).await.is_err() {
                        break;
                    }
                }
            })
        });

        self.capture = Some(ActiveCapture {
            epoch,
            handle,
            forwarder,
        });
    }

    async fn on_rotation_tick(&mut self, generation: u64) {
        if !self.rotation.is_current(generation) {
            debug!("Ignoring stale rotation tick");
            return;
        }

        match self.rotate_chunk(false).await {
            Ok(true) => {}
            Ok(false) => debug!("Capture not active; chunk boundary skipped"),
            Err(e) => {
                error!("Chunk rotation failed: {}", e);
                self.last_error = Some(e.to_string());
                self.publish(SessionEvent::RotationFailed {
                    message: e.to_string(),
                });

                if self.capture.is_none() {
                    self.rotation.disarm();
                    self.watchdog.disarm();
                    self.enter_paused(true);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Interruption recovery
    // ------------------------------------------------------------------

    async fn on_capture_status(&mut self, epoch: u64, status: CaptureStatus) {
        if self.capture.as_ref().map(|c| c.epoch) != Some(epoch) {
            debug!("Ignoring status from released capture (epoch {})", epoch);
            return;
        }

        match status.signal() {
            CaptureSignal::ActivelyRecording => {
                if self.watchdog.is_armed() {
                    info!("Capture recovered; interruption watchdog cancelled");
                    self.watchdog.disarm();
                }
            }
            signal @ (CaptureSignal::MediaServicesReset | CaptureSignal::Finished) => {
                warn!("Capture ended externally ({:?}); stopping session", signal);
                self.force_stop().await;
            }
            CaptureSignal::Stalled => {
                if self.session.status == SessionStatus::Recording && !self.watchdog.is_armed() {
                    warn!(
                        "Capture stalled; waiting {:?} for it to recover",
                        self.watchdog.grace()
                    );
                    self.watchdog.arm(&self.queue);
                }
            }
            CaptureSignal::Idle => {}
        }
    }

    async fn on_watchdog_fired(&mut self, generation: u64) {
        if !self.watchdog.fire(generation) {
            return;
        }

        if self.session.status != SessionStatus::Recording {
            return;
        }

        warn!(
            "No audio for {:?} after a stall; pausing for interruption",
            self.watchdog.grace()
        );

        if let Some(capture) = self.capture.as_mut() {
            if let Err(e) = capture.handle.pause().await {
                warn!("Device rejected interruption pause: {}", e);
            }
        }

        self.rotation.disarm();
        self.enter_paused(true);
    }

    async fn force_stop(&mut self) {
        if !matches!(
            self.session.status,
            SessionStatus::Recording | SessionStatus::Paused
        ) {
            return;
        }

        if let Err(e) = self.finalize_current(true).await {
            self.last_error = Some(e.to_string());
        }

        self.finish(true);
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    fn enter_paused(&mut self, forced: bool) {
        if self.session.status == SessionStatus::Paused {
            return;
        }

        self.session.status = SessionStatus::Paused;

        if forced {
            warn!("Recording paused by interruption");
        } else {
            info!("Recording paused");
        }

        self.publish(SessionEvent::PauseChanged {
            paused: true,
            forced,
        });
    }

    fn finish(&mut self, forced: bool) {
        self.rotation.disarm();
        self.watchdog.disarm();
        self.capture = None;

        self.session.end_time = Some(Utc::now());
        self.session.status = SessionStatus::Stopped;
        self.session.ledger.close();

        // Another session may acquire the device from here on
        self.slot = None;

        info!(
            "Recording stopped: {} chunks",
            self.session.chunk_counter()
        );
        self.publish(SessionEvent::Stopped { forced });
    }
}
