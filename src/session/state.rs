use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::ledger::ChunkLedger;

/// Lifecycle state of a recording session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Idle,
    Recording,
    Paused,
    /// Terminal
    Stopped,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    /// Audio is still being captured into this chunk
    Pending,
    Finalized,
    /// The capture primitive could not flush the chunk
    Failed,
}

/// One bounded-duration segment of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// 0-based, gapless sequence index
    pub position: u32,
    pub is_last_chunk: bool,
    /// Reference to the recorded media, set once finalized
    pub uri: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: ChunkStatus,
    /// Upload attempts made by the persistence layer
    pub retry_count: u32,
}

impl Chunk {
    pub fn pending(position: u32, start_time: DateTime<Utc>) -> Self {
        Self {
            position,
            is_last_chunk: false,
            uri: None,
            start_time,
            end_time: None,
            status: ChunkStatus::Pending,
            retry_count: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == ChunkStatus::Pending
    }
}

/// One recording lifecycle, owned by the session actor
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    /// External correlation key supplied at start
    pub appointment_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub ledger: ChunkLedger,
}

impl Session {
    pub fn new(ledger: ChunkLedger) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id: None,
            start_time: None,
            end_time: None,
            status: SessionStatus::Idle,
            ledger,
        }
    }

    /// Number of chunks opened so far; the next chunk's position
    pub fn chunk_counter(&self) -> u32 {
        self.ledger.len() as u32
    }

    pub fn snapshot(&self, interruption_pending: bool, last_error: Option<String>) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            appointment_id: self.appointment_id.clone(),
            status: self.status,
            start_time: self.start_time,
            end_time: self.end_time,
            chunk_counter: self.chunk_counter(),
            chunks: self.ledger.chunks().to_vec(),
            interruption_pending,
            last_error,
        }
    }
}

/// Point-in-time copy of the session for callers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub appointment_id: Option<String>,
    pub status: SessionStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub chunk_counter: u32,
    pub chunks: Vec<Chunk>,
    /// A stall was reported and the watchdog is waiting for capture to recover
    pub interruption_pending: bool,
    /// Most recent internal failure (e.g. chunk rotation)
    pub last_error: Option<String>,
}

impl SessionSnapshot {
    pub fn finalized_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks
            .iter()
            .filter(|chunk| chunk.status == ChunkStatus::Finalized)
    }

    pub fn pending_chunk(&self) -> Option<&Chunk> {
        self.chunks.iter().find(|chunk| chunk.is_pending())
    }
}
