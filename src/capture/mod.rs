pub mod device;
pub mod host;
pub mod orchestrator;

pub use device::{AcquireError, CaptureError, DeviceBroker, MediaSourceHandle, VideoTrack};
pub use host::HostDevices;
pub use orchestrator::{CaptureEvent, CaptureOrchestrator, RunningCapture};
