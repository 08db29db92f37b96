use crate::session::{RecordingController, SessionFactory};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Creates sessions; refuses while one holds the microphone
    pub factory: SessionFactory,

    /// Most recently started session, kept after it stops for status queries
    pub recorder: Arc<RwLock<Option<RecordingController>>>,
}

impl AppState {
    pub fn new(factory: SessionFactory) -> Self {
        Self {
            factory,
            recorder: Arc::new(RwLock::new(None)),
        }
    }
}
