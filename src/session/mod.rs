//! Recording session management
//!
//! This module provides the session state machine that manages:
//! - The exclusive capture handle (start, pause, resume, stop)
//! - Periodic chunk rotation
//! - Interruption detection and forced pauses
//! - The chunk ledger and its hand-off stream

mod config;
mod controller;
mod events;
mod ledger;
mod machine;
mod state;
mod stats;
mod timer;

pub use config::SessionConfig;
pub use controller::{RecordingController, SessionFactory};
pub use events::SessionEvent;
pub use ledger::{ChunkLedger, ChunkStream};
pub use state::{Chunk, ChunkStatus, Session, SessionSnapshot, SessionStatus};
pub use stats::SessionStats;
