use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info};
use uuid::Uuid;

use super::config::SessionConfig;
use super::events::{Command, Event, Reply, SessionEvent};
use super::ledger::{ChunkLedger, ChunkStream};
use super::machine::SessionMachine;
use super::state::{Session, SessionSnapshot};
use super::stats::SessionStats;
use crate::capture::CaptureDevice;
use crate::error::{RecorderError, RecorderResult};
use crate::lifecycle::AppLifecycle;

const EVENT_QUEUE_CAPACITY: usize = 64;
const SUBSCRIBER_CAPACITY: usize = 64;

/// Exclusive claim on the capture device; released on drop
pub(crate) struct SessionSlot {
    active: Arc<AtomicBool>,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
        debug!("Capture slot released");
    }
}

/// Creates recording sessions, at most one live at a time
///
/// Clones share the same slot, so the guarantee holds for every clone of
/// one factory.
#[derive(Clone)]
pub struct SessionFactory {
    device: Arc<dyn CaptureDevice>,
    config: SessionConfig,
    active: Arc<AtomicBool>,
}

impl SessionFactory {
    pub fn new(device: Arc<dyn CaptureDevice>, config: SessionConfig) -> Self {
        Self {
            device,
            config,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Whether a session currently holds the capture device
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Spawn a new idle session
    ///
    /// Fails with `InvalidConfig` for unusable settings, and with
    /// `AlreadyRunning` until the previous session has stopped or every
    /// handle to it has been dropped. Must be called inside a tokio runtime.
    pub fn create(&self) -> RecorderResult<(RecordingController, ChunkStream)> {
        self.config.validate()?;

        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| RecorderError::AlreadyRunning)?;

        let slot = SessionSlot {
            active: Arc::clone(&self.active),
        };

        let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (events, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        let (ledger, chunks) = ChunkLedger::new();
        let session = Session::new(ledger);
        let session_id = session.id;

        let machine = SessionMachine::new(
            self.config.clone(),
            Arc::clone(&self.device),
            session,
            events.clone(),
            tx.downgrade(),
            slot,
        );
        tokio::spawn(machine.run(rx));

        info!("Created recording session {}", session_id);

        let controller = RecordingController {
            tx,
            events,
            session_id,
        };

        Ok((controller, chunks))
    }
}

/// Caller-facing handle to the session actor
#[derive(Clone)]
pub struct RecordingController {
    tx: mpsc::Sender<Event>,
    events: broadcast::Sender<SessionEvent>,
    session_id: Uuid,
}

impl RecordingController {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> RecorderResult<T> {
        let (reply, response) = oneshot::channel();

        self.tx
            .send(Event::Command(command(reply)))
            .await
            .map_err(|_| RecorderError::SessionClosed)?;

        response.await.map_err(|_| RecorderError::SessionClosed)?
    }

    /// Acquire the microphone and begin the first chunk
    pub async fn start_recording(&self, appointment_id: impl Into<String>) -> RecorderResult<()> {
        let appointment_id = appointment_id.into();
        self.request(|reply| Command::Start {
            appointment_id,
            reply,
        })
        .await
    }

    pub async fn pause_recording(&self) -> RecorderResult<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume_recording(&self) -> RecorderResult<()> {
        self.request(|reply| Command::Resume { reply }).await
    }

    /// End the session, finalizing the last chunk
    ///
    /// Returns `Ok(false)` when the device is not actively recording; the
    /// caller must resume first. Nothing is torn down in that case.
    pub async fn stop_recording(&self) -> RecorderResult<bool> {
        match self.request(|reply| Command::Stop { reply }).await {
            Ok(()) => Ok(true),
            Err(RecorderError::NotRecording) => {
                info!("{}", RecorderError::NotRecording);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn snapshot(&self) -> RecorderResult<SessionSnapshot> {
        let (reply, response) = oneshot::channel();

        self.tx
            .send(Event::Command(Command::Snapshot { reply }))
            .await
            .map_err(|_| RecorderError::SessionClosed)?;

        response.await.map_err(|_| RecorderError::SessionClosed)
    }

    pub async fn stats(&self) -> RecorderResult<SessionStats> {
        let snapshot = self.snapshot().await?;
        Ok(SessionStats::from(&snapshot))
    }

    /// Subscribe to pause-state changes and other session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Forward a foreground/background transition (logged only)
    pub async fn notify_app_lifecycle(&self, state: AppLifecycle) -> RecorderResult<()> {
        self.tx
            .send(Event::Lifecycle(state))
            .await
            .map_err(|_| RecorderError::SessionClosed)
    }
}
