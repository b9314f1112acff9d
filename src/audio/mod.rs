//! Single-slot microphone recorder with signal conditioning.

pub mod capture;
pub mod device;
pub mod format;

pub use capture::{preflight_guard, CaptureEngine, CapturedAudio, StartError};
pub use device::get_default_input_device;
pub use format::condition_signal;
