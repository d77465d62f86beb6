pub mod device;
pub mod pipeline;

pub use device::{CameraDevice, DeviceState, Facing, FrameSource, VideoRecorder};
pub use pipeline::CapturePipeline;
