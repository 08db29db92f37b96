use serde::Serialize;
use tokio::sync::oneshot;

use super::state::{Chunk, SessionSnapshot};
use crate::capture::CaptureStatus;
use crate::error::RecorderResult;
use crate::lifecycle::AppLifecycle;

/// Notifications published to session subscribers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started { appointment_id: String },
    /// Pause state changed; `forced` is set when an interruption or a
    /// capture failure paused the session rather than the caller
    PauseChanged { paused: bool, forced: bool },
    ChunkFinalized(Chunk),
    RotationFailed { message: String },
    Stopped { forced: bool },
}

/// Everything the session actor processes, in arrival order
#[derive(Debug)]
pub(crate) enum Event {
    Command(Command),
    RotationTick { generation: u64 },
    WatchdogFired { generation: u64 },
    CaptureStatus { epoch: u64, status: CaptureStatus },
    Lifecycle(AppLifecycle),
}

pub(crate) type Reply<T> = oneshot::Sender<RecorderResult<T>>;

#[derive(Debug)]
pub(crate) enum Command {
    Start {
        appointment_id: String,
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}
