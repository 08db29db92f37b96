pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod session;

pub use capture::{
    CaptureDevice, CaptureError, CaptureHandle, CaptureOptions, CaptureSignal, CaptureStatus,
    ScriptedCaptureDevice, WavCaptureDevice,
};
pub use config::Config;
pub use error::{RecorderError, RecorderResult};
pub use http::{create_router, AppState};
pub use lifecycle::AppLifecycle;
pub use session::{
    Chunk, ChunkStatus, ChunkStream, RecordingController, SessionConfig, SessionEvent,
    SessionFactory, SessionSnapshot, SessionStats, SessionStatus,
};
