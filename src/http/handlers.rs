use super::state::AppState;
use crate::error::RecorderError;
use crate::lifecycle::AppLifecycle;
use crate::session::{Chunk, ChunkStream, RecordingController, SessionStats};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StartRecordingRequest {
    /// Appointment the recording belongs to (generated if absent)
    pub appointment_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub appointment_id: String,
    pub session_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    /// False when the recording must be resumed before it can end
    pub stopped: bool,
    pub message: String,
    pub stats: SessionStats,
}

#[derive(Debug, Deserialize)]
pub struct LifecycleRequest {
    pub state: AppLifecycle,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

fn error_response(error: RecorderError) -> Response {
    let status = match &error {
        RecorderError::CaptureUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        RecorderError::AlreadyRunning
        | RecorderError::InvalidState { .. }
        | RecorderError::NotRecording => StatusCode::CONFLICT,
        RecorderError::DeviceError(_)
        | RecorderError::ReacquireFailed { .. }
        | RecorderError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
        RecorderError::SessionClosed => StatusCode::GONE,
    };

    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            code: error.code().to_string(),
        }),
    )
        .into_response()
}

fn no_session() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "No recording session".to_string(),
            code: "NO_SESSION".to_string(),
        }),
    )
        .into_response()
}

async fn current(state: &AppState) -> Option<RecordingController> {
    state.recorder.read().await.clone()
}

/// Hand finalized chunks to persistence (logged until an uploader exists)
async fn forward_finalized_chunks(mut chunks: ChunkStream) {
    while let Some(chunk) = chunks.next().await {
        match &chunk.uri {
            Some(uri) => info!(
                "Chunk {} ready for upload: {} (last={})",
                chunk.position, uri, chunk.is_last_chunk
            ),
            None => warn!("Chunk {} failed to flush; nothing to upload", chunk.position),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recording/start
/// Start a new recording session
pub async fn start_recording(
    State(state): State<AppState>,
    Json(req): Json<StartRecordingRequest>,
) -> Response {
    let appointment_id = req
        .appointment_id
        .unwrap_or_else(|| format!("appointment-{}", Uuid::new_v4()));

    info!("Starting recording for appointment: {}", appointment_id);

    let mut recorder = state.recorder.write().await;

    let (controller, chunks) = match state.factory.create() {
        Ok(created) => created,
        Err(e) => {
            warn!("Refusing to start recording: {}", e);
            return error_response(e);
        }
    };

    if let Err(e) = controller.start_recording(appointment_id.clone()).await {
        error!("Failed to start recording: {}", e);
        return error_response(e);
    }

    tokio::spawn(forward_finalized_chunks(chunks));

    let session_id = controller.session_id();
    *recorder = Some(controller);

    (
        StatusCode::OK,
        Json(StartRecordingResponse {
            appointment_id: appointment_id.clone(),
            session_id,
            status: "recording".to_string(),
            message: format!("Recording started for appointment {}", appointment_id),
        }),
    )
        .into_response()
}

/// POST /recording/pause
pub async fn pause_recording(State(state): State<AppState>) -> Response {
    let Some(controller) = current(&state).await else {
        return no_session();
    };

    match controller.pause_recording().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusResponse {
                status: "paused".to_string(),
                message: "Recording paused".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to pause recording: {}", e);
            error_response(e)
        }
    }
}

/// POST /recording/resume
pub async fn resume_recording(State(state): State<AppState>) -> Response {
    let Some(controller) = current(&state).await else {
        return no_session();
    };

    match controller.resume_recording().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusResponse {
                status: "recording".to_string(),
                message: "Recording resumed".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            error!("Failed to resume recording: {}", e);
            error_response(e)
        }
    }
}

/// POST /recording/stop
/// End the recording; answers `stopped: false` when it must be resumed first
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    let Some(controller) = current(&state).await else {
        return no_session();
    };

    let stopped = match controller.stop_recording().await {
        Ok(stopped) => stopped,
        Err(e) => {
            error!("Failed to stop recording: {}", e);
            return error_response(e);
        }
    };

    let stats = match controller.stats().await {
        Ok(stats) => stats,
        Err(e) => return error_response(e),
    };

    let message = if stopped {
        "Recording stopped".to_string()
    } else {
        RecorderError::NotRecording.to_string()
    };

    (
        StatusCode::OK,
        Json(StopRecordingResponse {
            stopped,
            message,
            stats,
        }),
    )
        .into_response()
}

/// GET /recording/status
pub async fn get_recording_status(State(state): State<AppState>) -> Response {
    let Some(controller) = current(&state).await else {
        return no_session();
    };

    match controller.stats().await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => {
            error!("Failed to get stats: {}", e);
            error_response(e)
        }
    }
}

/// GET /recording/chunks
pub async fn get_recording_chunks(State(state): State<AppState>) -> Response {
    let Some(controller) = current(&state).await else {
        return no_session();
    };

    match controller.snapshot().await {
        Ok(snapshot) => {
            let chunks: Vec<Chunk> = snapshot.chunks;
            (StatusCode::OK, Json(chunks)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /app/lifecycle
pub async fn app_lifecycle(
    State(state): State<AppState>,
    Json(req): Json<LifecycleRequest>,
) -> Response {
    match current(&state).await {
        Some(controller) => {
            if let Err(e) = controller.notify_app_lifecycle(req.state).await {
                warn!("Session did not receive lifecycle change: {}", e);
            }
        }
        None => info!("App moved to {} (no session)", req.state),
    }

    StatusCode::NO_CONTENT.into_response()
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
