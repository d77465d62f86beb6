//! Instant-camera engine: captures become prints that eject, develop and get
//! pinned to a board, optionally shared live with everyone in the same room.

pub mod caption;
pub mod capture;
pub mod cards;
pub mod engine;
pub mod film;
pub mod models;
pub mod pending;
pub mod presence;
pub mod room;
pub mod settings;
pub mod utils;

pub use engine::{AppSnapshot, CameraController, Collaborators, EngineConfig, EngineEvent};
pub use models::{Capture, Identity};
pub use room::{RemoteStore, RoomError, SqliteRoomStore};
pub use settings::{CaptureMode, SettingsStore, UserSettings};
pub use utils::init_logging;
