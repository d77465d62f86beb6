use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::CardRow;

use super::{RemoteStore, RoomMessage, FETCH_LIMIT};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// What a room subscription hands back to the engine, tagged with the session
/// epoch it was opened under.
#[derive(Debug, Clone)]
pub enum RoomDelivery {
    Fetched { epoch: u64, rows: Vec<CardRow> },
    Message { epoch: u64, message: RoomMessage },
}

/// Owns the background task that feeds one room into the engine.
pub struct RoomSubscription {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
    epoch: Option<u64>,
}

impl Default for RoomSubscription {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomSubscription {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            epoch: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }

    pub fn epoch(&self) -> Option<u64> {
        self.epoch
    }

    pub fn start(
        &mut self,
        store: Arc<dyn RemoteStore>,
        room_id: String,
        epoch: u64,
        sink: mpsc::UnboundedSender<RoomDelivery>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("room subscription already active");
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(room_loop(store, room_id, epoch, sink, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.epoch = Some(epoch);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.epoch = None;
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("room subscription task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

async fn room_loop(
    store: Arc<dyn RemoteStore>,
    room_id: String,
    epoch: u64,
    sink: mpsc::UnboundedSender<RoomDelivery>,
    cancel_token: CancellationToken,
) {
    // Subscribe before fetching so inserts landing in between are not missed.
    // The store dedupes on id, so seeing a row twice is harmless.
    let mut feed = match store.subscribe(&room_id).await {
        Ok(feed) => Some(feed),
        Err(err) => {
            log_warn!("subscribe to room {} failed: {}", room_id, err);
            None
        }
    };

    tokio::select! {
        fetched = store.fetch_recent(&room_id, FETCH_LIMIT) => match fetched {
            Ok(rows) => {
                log_info!("fetched {} cards for room {}", rows.len(), room_id);
                if sink.send(RoomDelivery::Fetched { epoch, rows }).is_err() {
                    return;
                }
            }
            Err(err) => log_warn!("fetch for room {} failed: {}", room_id, err),
        },
        _ = cancel_token.cancelled() => return,
    }

    let Some(feed) = feed.as_mut() else {
        return;
    };

    loop {
        tokio::select! {
            next = feed.next() => match next {
                Some(message) => {
                    if sink.send(RoomDelivery::Message { epoch, message }).is_err() {
                        break;
                    }
                }
                None => {
                    log_warn!("room {} feed closed", feed.room_id());
                    break;
                }
            },
            _ = cancel_token.cancelled() => {
                log_info!("room {} subscription shutting down", room_id);
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CoordinateSpace, Identity, NewCardRow};
    use crate::room::SqliteRoomStore;

    fn new_row(id: &str) -> NewCardRow {
        NewCardRow {
            id: id.into(),
            room_id: "demo".into(),
            media_payload: "data:image/jpeg;base64,AA".into(),
            caption: None,
            x: 0.5,
            y: 0.5,
            rotation: 0.0,
            stack_order: 1,
            coord_space: CoordinateSpace::Normalized,
        }
    }

    #[tokio::test]
    async fn test_fetch_then_live_messages_carry_epoch() {
        let store = Arc::new(SqliteRoomStore::in_memory().unwrap());
        store.insert_card(&Identity::new("a"), new_row("old")).await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut subscription = RoomSubscription::new();
        subscription
            .start(store.clone(), "demo".into(), 7, tx)
            .unwrap();
        assert!(subscription.start(store.clone(), "demo".into(), 8, mpsc::unbounded_channel().0).is_err());

        match rx.recv().await.unwrap() {
            RoomDelivery::Fetched { epoch, rows } => {
                assert_eq!(epoch, 7);
                assert_eq!(rows.len(), 1);
            }
            other => panic!("expected fetch first, got {other:?}"),
        }

        store.insert_card(&Identity::new("a"), new_row("new")).await.unwrap();
        match rx.recv().await.unwrap() {
            RoomDelivery::Message { epoch, message: RoomMessage::Inserted(row) } => {
                assert_eq!(epoch, 7);
                assert_eq!(row.id, "new");
            }
            other => panic!("expected insert, got {other:?}"),
        }

        subscription.stop().await.unwrap();
        assert!(!subscription.is_active());
        assert!(subscription.epoch().is_none());
    }
}
