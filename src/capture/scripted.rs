//! In-memory capture device for tests
//!
//! Every acquisition succeeds instantly unless a failure has been scripted.
//! Tests inject status notifications into the current handle with
//! [`ScriptedCaptureDevice::emit`], which also changes what the handle
//! reports from `status()`.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;

use super::backend::{CaptureDevice, CaptureError, CaptureHandle, CaptureOptions, CaptureStatus};

#[derive(Default)]
struct ScriptState {
    labels: Vec<String>,
    unavailable_acquires: usize,
    fail_pause: bool,
    fail_resume: bool,
    fail_finalize: bool,
    current: Option<Arc<Mutex<HandleState>>>,
    current_tx: Option<mpsc::UnboundedSender<CaptureStatus>>,
}

struct HandleState {
    status: CaptureStatus,
    finalized: bool,
}

/// Scriptable capture device
#[derive(Clone, Default)]
pub struct ScriptedCaptureDevice {
    state: Arc<Mutex<ScriptState>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedCaptureDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` acquisitions fail with `Unavailable`
    pub fn fail_next_acquires(&self, count: usize) {
        lock(&self.state).unavailable_acquires = count;
    }

    pub fn set_fail_pause(&self, fail: bool) {
        lock(&self.state).fail_pause = fail;
    }

    pub fn set_fail_resume(&self, fail: bool) {
        lock(&self.state).fail_resume = fail;
    }

    pub fn set_fail_finalize(&self, fail: bool) {
        lock(&self.state).fail_finalize = fail;
    }

    /// Number of successful acquisitions so far
    pub fn acquisitions(&self) -> usize {
        lock(&self.state).labels.len()
    }

    /// Labels of every successful acquisition, in order
    pub fn labels(&self) -> Vec<String> {
        lock(&self.state).labels.clone()
    }

    /// Status of the most recently acquired handle
    pub fn current_status(&self) -> Option<CaptureStatus> {
        let state = lock(&self.state);
        state.current.as_ref().map(|handle| lock(handle).status)
    }

    /// Set the current handle's status and notify its status channel
    pub fn emit(&self, status: CaptureStatus) {
        let state = lock(&self.state);

        if let Some(handle) = &state.current {
            lock(handle).status = status;
        }

        if let Some(tx) = &state.current_tx {
            let _ = tx.send(status);
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for ScriptedCaptureDevice {
    async fn acquire_and_start(
        &self,
        options: &CaptureOptions,
    ) -> Result<Box<dyn CaptureHandle>, CaptureError> {
        let mut state = lock(&self.state);

        if state.unavailable_acquires > 0 {
            state.unavailable_acquires -= 1;
            return Err(CaptureError::Unavailable(
                "microphone is in use by another application".to_string(),
            ));
        }

        let shared = Arc::new(Mutex::new(HandleState {
            status: CaptureStatus::active(0),
            finalized: false,
        }));
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let _ = status_tx.send(CaptureStatus::active(0));

        state.labels.push(options.label.clone());
        state.current = Some(Arc::clone(&shared));
        state.current_tx = Some(status_tx.clone());

        Ok(Box::new(ScriptedCaptureHandle {
            label: options.label.clone(),
            device: Arc::clone(&self.state),
            shared,
            status_tx,
            status_rx: Some(status_rx),
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct ScriptedCaptureHandle {
    label: String,
    device: Arc<Mutex<ScriptState>>,
    shared: Arc<Mutex<HandleState>>,
    status_tx: mpsc::UnboundedSender<CaptureStatus>,
    status_rx: Option<mpsc::UnboundedReceiver<CaptureStatus>>,
}

impl ScriptedCaptureHandle {
    fn update(&self, f: impl FnOnce(&mut CaptureStatus)) -> Result<(), CaptureError> {
        let status = {
            let mut shared = lock(&self.shared);
            if shared.finalized {
                return Err(CaptureError::Device(format!("{} was already finalized", self.label)));
            }
            f(&mut shared.status);
            shared.status
        };

        let _ = self.status_tx.send(status);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CaptureHandle for ScriptedCaptureHandle {
    async fn pause(&mut self) -> Result<(), CaptureError> {
        if lock(&self.device).fail_pause {
            return Err(CaptureError::Device("pause rejected by device".to_string()));
        }

        self.update(|status| {
            status.is_recording = false;
            status.duration_ms = status.duration_ms.max(1);
        })
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        if lock(&self.device).fail_resume {
            return Err(CaptureError::Device("resume rejected by device".to_string()));
        }

        self.update(|status| status.is_recording = true)
    }

    async fn stop_and_finalize(&mut self) -> Result<String, CaptureError> {
        if lock(&self.device).fail_finalize {
            return Err(CaptureError::Device(format!("could not flush {}", self.label)));
        }

        self.update(|status| *status = CaptureStatus::finished(status.duration_ms))?;
        lock(&self.shared).finalized = true;

        Ok(format!("memory://{}", self.label))
    }

    async fn status(&self) -> Result<CaptureStatus, CaptureError> {
        Ok(lock(&self.shared).status)
    }

    fn status_updates(&mut self) -> Option<mpsc::UnboundedReceiver<CaptureStatus>> {
        self.status_rx.take()
    }
}
