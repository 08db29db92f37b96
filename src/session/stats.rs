use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::{ChunkStatus, SessionSnapshot, SessionStatus};

/// Statistics about a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: Uuid,

    pub appointment_id: Option<String>,

    pub status: SessionStatus,

    /// Whether audio is currently being captured
    pub is_recording: bool,

    /// Whether the session is paused (by the caller or an interruption)
    pub is_paused: bool,

    /// When the recording started
    pub started_at: Option<DateTime<Utc>>,

    /// Wall-clock duration in seconds, including paused time
    pub duration_secs: f64,

    /// Number of chunks opened so far
    pub chunks_count: u32,

    /// Number of chunks flushed successfully
    pub finalized_chunks: usize,

    /// Number of chunks the device failed to flush
    pub failed_chunks: usize,

    /// A stall is being watched for recovery
    pub interruption_pending: bool,

    pub last_error: Option<String>,
}

impl From<&SessionSnapshot> for SessionStats {
    fn from(snapshot: &SessionSnapshot) -> Self {
        let duration_secs = snapshot
            .start_time
            .map(|start| {
                let end = snapshot.end_time.unwrap_or_else(Utc::now);
                end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0
            })
            .unwrap_or(0.0);

        let count = |status: ChunkStatus| {
            snapshot
                .chunks
                .iter()
                .filter(|chunk| chunk.status == status)
                .count()
        };

        Self {
            session_id: snapshot.session_id,
            appointment_id: snapshot.appointment_id.clone(),
            status: snapshot.status,
            is_recording: snapshot.status == SessionStatus::Recording,
            is_paused: snapshot.status == SessionStatus::Paused,
            started_at: snapshot.start_time,
            duration_secs,
            chunks_count: snapshot.chunk_counter,
            finalized_chunks: count(ChunkStatus::Finalized),
            failed_chunks: count(ChunkStatus::Failed),
            interruption_pending: snapshot.interruption_pending,
            last_error: snapshot.last_error.clone(),
        }
    }
}
