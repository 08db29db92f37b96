pub mod backend;
pub mod scripted;
pub mod wav;

pub use backend::{
    CaptureDevice, CaptureError, CaptureHandle, CaptureOptions, CaptureSignal, CaptureStatus,
};
pub use scripted::ScriptedCaptureDevice;
pub use wav::{WavCaptureDevice, WavCaptureHandle};
