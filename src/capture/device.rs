use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum Facing {
    #[default]
    User,
    Environment,
}

/// A live video stream handle.
pub trait FrameSource: Send + Sync {
    /// Current frame, or `None` while the stream has nothing to show yet.
    fn current_frame(&self) -> Option<DynamicImage>;

    /// Stops the underlying tracks. Called on power-off and teardown.
    fn release(&self);
}

#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Requests a stream. An error means the user or platform refused access.
    async fn acquire(&self, facing: Facing, resolution: (u32, u32)) -> Result<Arc<dyn FrameSource>>;
}

#[async_trait]
pub trait VideoRecorder: Send + Sync {
    /// Records for exactly `duration` and returns the finished clip container.
    async fn record(&self, duration: Duration) -> Result<Vec<u8>>;
}

/// Camera power as the capture controls see it.
#[derive(Clone, Default)]
pub enum DeviceState {
    #[default]
    Off,
    Acquiring,
    On(Arc<dyn FrameSource>),
    /// Permission refused. Stays until the next explicit power toggle.
    Denied,
}

impl DeviceState {
    pub fn source(&self) -> Option<&Arc<dyn FrameSource>> {
        match self {
            DeviceState::On(source) => Some(source),
            _ => None,
        }
    }

    pub fn is_on(&self) -> bool {
        matches!(self, DeviceState::On(_))
    }

    pub fn is_denied(&self) -> bool {
        matches!(self, DeviceState::Denied)
    }

    pub fn label(&self) -> &'static str {
        match self {
            DeviceState::Off => "off",
            DeviceState::Acquiring => "acquiring",
            DeviceState::On(_) => "on",
            DeviceState::Denied => "denied",
        }
    }
}

impl std::fmt::Debug for DeviceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
