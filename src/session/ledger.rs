use chrono::{DateTime, Utc};
use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::state::{Chunk, ChunkStatus};

/// Append-only record of a session's chunks
///
/// Chunks are appended as `Pending` and finalized in place; nothing is ever
/// removed or reordered. Each chunk is handed to the [`ChunkStream`] exactly
/// once, when it reaches a terminal status.
#[derive(Debug)]
pub struct ChunkLedger {
    chunks: Vec<Chunk>,
    handoff: Option<mpsc::UnboundedSender<Chunk>>,
}

impl ChunkLedger {
    pub fn new() -> (Self, ChunkStream) {
        let (tx, rx) = mpsc::unbounded_channel();

        let ledger = Self {
            chunks: Vec::new(),
            handoff: Some(tx),
        };

        (ledger, ChunkStream { rx })
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The in-flight chunk, if any
    pub fn pending(&self) -> Option<&Chunk> {
        self.chunks.last().filter(|chunk| chunk.is_pending())
    }

    /// Append a new pending chunk at the next position
    ///
    /// At most one chunk is pending; if one already is, its position is
    /// returned and nothing is appended.
    pub fn open(&mut self, start_time: DateTime<Utc>) -> u32 {
        if let Some(pending) = self.pending() {
            warn!("Chunk {} is still pending; not opening another", pending.position);
            return pending.position;
        }

        let position = self.chunks.len() as u32;
        self.chunks.push(Chunk::pending(position, start_time));
        debug!("Opened chunk {}", position);
        position
    }

    /// Mark the pending chunk finalized with its media URI
    pub fn finalize(
        &mut self,
        uri: String,
        end_time: DateTime<Utc>,
        is_last: bool,
    ) -> Option<Chunk> {
        self.close_pending(ChunkStatus::Finalized, Some(uri), end_time, is_last)
    }

    /// Mark the pending chunk failed; it keeps its position
    pub fn fail(&mut self, end_time: DateTime<Utc>, is_last: bool) -> Option<Chunk> {
        self.close_pending(ChunkStatus::Failed, None, end_time, is_last)
    }

    /// End the hand-off stream; no further chunks will be produced
    pub fn close(&mut self) {
        self.handoff = None;
    }

    fn close_pending(
        &mut self,
        status: ChunkStatus,
        uri: Option<String>,
        end_time: DateTime<Utc>,
        is_last: bool,
    ) -> Option<Chunk> {
        let chunk = self.chunks.last_mut().filter(|chunk| chunk.is_pending())?;

        chunk.status = status;
        chunk.uri = uri;
        chunk.end_time = Some(end_time);
        chunk.is_last_chunk = is_last;

        let chunk = chunk.clone();

        if let Some(tx) = &self.handoff {
            if tx.send(chunk.clone()).is_err() {
                debug!("Chunk stream dropped; chunk {} not handed off", chunk.position);
            }
        }

        Some(chunk)
    }
}

/// Terminal chunks in position order, each yielded once
///
/// Ends after the session stops. Not restartable.
#[derive(Debug)]
pub struct ChunkStream {
    rx: mpsc::UnboundedReceiver<Chunk>,
}

impl ChunkStream {
    pub async fn next_chunk(&mut self) -> Option<Chunk> {
        self.rx.recv().await
    }
}

impl Stream for ChunkStream {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Chunk>> {
        self.rx.poll_recv(cx)
    }
}
