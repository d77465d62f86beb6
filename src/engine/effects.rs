use std::time::Duration;

use serde::Serialize;

use crate::models::{CaptureId, Identity, NewCardRow};
use crate::room::RoomMessage;

/// Delayed transition, tagged with the identity it was armed for.
#[derive(Debug, Clone, PartialEq)]
pub enum Timer {
    EjectElapsed(CaptureId),
    DevelopElapsed(CaptureId),
    ReloadElapsed(u64),
    WarningExpired(u64),
}

/// Work a state transition asks the runtime to carry out.
#[derive(Debug, Clone)]
pub enum Effect {
    Schedule { after: Duration, timer: Timer },
    RequestCaption { id: CaptureId, payload: String },
    RecordVideo { duration: Duration },
    InsertRemote { identity: Identity, row: NewCardRow },
    Broadcast { room_id: String, message: RoomMessage },
    /// Bring the live subscription in line with the current session.
    SyncRoom,
    Notify(Notice),
    Flash { user_id: String },
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    RoomKeyRequired,
    ShareFailed,
    CameraDenied,
}

/// One-shot, non-blocking message for the user.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// What the controller publishes for the UI host.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EngineEvent {
    StateChanged,
    Notice(Notice),
    Flash { user_id: String },
}
