//! HTTP API server for external control (UI collaborator)
//!
//! This module provides a REST API over the single recording session:
//! - POST /recording/start - Start a new recording
//! - POST /recording/pause, /recording/resume - Pause state control
//! - POST /recording/stop - End the recording (may ask to resume first)
//! - GET /recording/status - Query session statistics
//! - GET /recording/chunks - List chunks recorded so far
//! - POST /app/lifecycle - Foreground/background notifications
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
