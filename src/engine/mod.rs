pub mod config;
pub mod controller;
pub mod effects;
pub mod state;

pub use config::EngineConfig;
pub use controller::{CameraController, Collaborators};
pub use effects::{Effect, EngineEvent, Notice, NoticeKind, Timer};
pub use state::{AppSnapshot, AppState};
