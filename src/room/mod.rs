//! Shared rooms: the remote store contract, its change feed, and the local
//! bookkeeping that keeps a client bound to exactly one room at a time.

pub mod db;
pub mod migrations;
pub mod session;
pub mod sqlite;
pub mod subscription;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::models::{CardRow, Identity, NewCardRow};
use crate::presence::CursorMessage;

pub use session::RoomSession;
pub use sqlite::SqliteRoomStore;
pub use subscription::{RoomDelivery, RoomSubscription};

const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Most recent cards fetched when joining a room.
pub const FETCH_LIMIT: usize = 50;

#[derive(Error, Debug)]
pub enum RoomError {
    #[error("sign in to share cards")]
    NotAuthenticated,

    #[error("room key must not be empty")]
    InvalidRoomKey,

    #[error("card {0} belongs to another user")]
    Forbidden(String),

    #[error("card {0} not found")]
    NotFound(String),

    #[error("card {0} already exists")]
    Duplicate(String),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Trims the user-supplied key. Empty keys are rejected.
pub fn validate_room_key(raw: &str) -> Result<String, RoomError> {
    let key = raw.trim();
    if key.is_empty() {
        return Err(RoomError::InvalidRoomKey);
    }
    Ok(key.to_string())
}

/// Everything a room subscription can deliver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum RoomMessage {
    /// Persisted: a row was inserted.
    Inserted(CardRow),
    /// Ephemeral: someone fired the shutter.
    Flash { user_id: String },
    /// Ephemeral: someone moved their pointer.
    Cursor(CursorMessage),
}

#[derive(Debug, Clone)]
pub struct RoomEnvelope {
    pub room_id: String,
    pub message: RoomMessage,
}

/// Live feed scoped to one room.
pub struct RoomFeed {
    room_id: String,
    rx: broadcast::Receiver<RoomEnvelope>,
}

impl RoomFeed {
    pub fn new(room_id: impl Into<String>, rx: broadcast::Receiver<RoomEnvelope>) -> Self {
        Self {
            room_id: room_id.into(),
            rx,
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Next message for this room, or `None` once the store shuts down.
    pub async fn next(&mut self) -> Option<RoomMessage> {
        loop {
            match self.rx.recv().await {
                Ok(envelope) if envelope.room_id == self.room_id => return Some(envelope.message),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log_warn!("room {} feed lagged, {} messages skipped", self.room_id, skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Authoritative shared card store with a per-room change feed.
///
/// Anyone may read and subscribe. Inserts need an identity and are attributed
/// to it; a row may only be updated by its owner.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Newest `limit` rows of the room, oldest first.
    async fn fetch_recent(&self, room_id: &str, limit: usize) -> Result<Vec<CardRow>, RoomError>;

    async fn insert_card(&self, identity: &Identity, row: NewCardRow) -> Result<CardRow, RoomError>;

    async fn update_position(
        &self,
        identity: &Identity,
        card_id: &str,
        x: f64,
        y: f64,
    ) -> Result<(), RoomError>;

    async fn subscribe(&self, room_id: &str) -> Result<RoomFeed, RoomError>;

    /// Fire-and-forget ephemeral message to everyone subscribed to the room.
    async fn broadcast(&self, room_id: &str, message: RoomMessage) -> Result<(), RoomError>;
}
