use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rusqlite::{params, OptionalExtension, Row};
use tokio::sync::broadcast;

use crate::models::{CardRow, CoordinateSpace, Identity, NewCardRow};

use super::{db::Database, RemoteStore, RoomEnvelope, RoomError, RoomFeed, RoomMessage};

const FEED_CAPACITY: usize = 256;

const CARD_COLUMNS: &str =
    "id, created_at, owner_id, room_id, media_payload, caption, x, y, rotation, stack_order, coord_space";

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

fn format_datetime(value: &DateTime<Utc>) -> String {
    // Fixed width so lexical order matches time order.
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn row_to_card(row: &Row) -> Result<CardRow> {
    let created_at: String = row.get("created_at")?;
    let coord_space: Option<String> = row.get("coord_space")?;

    Ok(CardRow {
        id: row.get("id")?,
        created_at: parse_datetime(&created_at)?,
        owner_id: row.get("owner_id")?,
        room_id: row.get("room_id")?,
        media_payload: row.get("media_payload")?,
        caption: row.get("caption")?,
        x: row.get("x")?,
        y: row.get("y")?,
        rotation: row.get("rotation")?,
        stack_order: row.get("stack_order")?,
        coord_space: coord_space.as_deref().and_then(CoordinateSpace::parse),
    })
}

/// Remote store backed by SQLite, with an in-process change feed.
///
/// Several clients sharing one instance behave like browsers sharing a hosted
/// backend: inserts by one are echoed to every subscriber of the room.
#[derive(Clone)]
pub struct SqliteRoomStore {
    db: Database,
    feed: broadcast::Sender<RoomEnvelope>,
}

impl SqliteRoomStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        Ok(Self::with_database(Database::new(path)?))
    }

    pub fn in_memory() -> Result<Self> {
        Ok(Self::with_database(Database::in_memory()?))
    }

    fn with_database(db: Database) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self { db, feed }
    }

    fn publish(&self, room_id: &str, message: RoomMessage) {
        // No subscribers is not an error.
        let _ = self.feed.send(RoomEnvelope {
            room_id: room_id.to_string(),
            message,
        });
    }

    /// Writes a row exactly as given, bypassing identity checks. Used to seed
    /// rooms, including legacy rows without a coordinate tag.
    pub async fn import_row(&self, row: CardRow) -> Result<()> {
        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO cards (id, created_at, owner_id, room_id, media_payload, caption, x, y, rotation, stack_order, coord_space)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        row.id,
                        format_datetime(&row.created_at),
                        row.owner_id,
                        row.room_id,
                        row.media_payload,
                        row.caption,
                        row.x,
                        row.y,
                        row.rotation,
                        row.stack_order,
                        row.coord_space.map(|space| space.as_str()),
                    ],
                )
                .with_context(|| "failed to import card")?;
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl RemoteStore for SqliteRoomStore {
    async fn fetch_recent(&self, room_id: &str, limit: usize) -> Result<Vec<CardRow>, RoomError> {
        let room_id = room_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let cards = self
            .db
            .execute(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {CARD_COLUMNS} FROM (
                         SELECT {CARD_COLUMNS}, rowid AS seq FROM cards
                         WHERE room_id = ?1
                         ORDER BY created_at DESC, seq DESC
                         LIMIT ?2
                     )
                     ORDER BY created_at ASC, seq ASC"
                ))?;

                let mut rows = stmt.query(params![room_id, limit])?;
                let mut cards = Vec::new();
                while let Some(row) = rows.next()? {
                    cards.push(row_to_card(row)?);
                }
                Ok(cards)
            })
            .await?;
        Ok(cards)
    }

    async fn insert_card(&self, identity: &Identity, row: NewCardRow) -> Result<CardRow, RoomError> {
        if identity.user_id.trim().is_empty() {
            return Err(RoomError::NotAuthenticated);
        }

        let card = CardRow {
            id: row.id,
            created_at: Utc::now(),
            owner_id: identity.user_id.clone(),
            room_id: row.room_id,
            media_payload: row.media_payload,
            caption: row.caption,
            x: row.x,
            y: row.y,
            rotation: row.rotation,
            stack_order: row.stack_order,
            coord_space: Some(row.coord_space),
        };

        let record = card.clone();
        let inserted = self
            .db
            .execute(move |conn| {
                let exists = conn
                    .query_row("SELECT 1 FROM cards WHERE id = ?1", params![record.id], |_| Ok(()))
                    .optional()?
                    .is_some();
                if exists {
                    return Ok(false);
                }

                conn.execute(
                    "INSERT INTO cards (id, created_at, owner_id, room_id, media_payload, caption, x, y, rotation, stack_order, coord_space)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                    params![
                        record.id,
                        format_datetime(&record.created_at),
                        record.owner_id,
                        record.room_id,
                        record.media_payload,
                        record.caption,
                        record.x,
                        record.y,
                        record.rotation,
                        record.stack_order,
                        record.coord_space.map(|space| space.as_str()),
                    ],
                )
                .with_context(|| "failed to insert card")?;
                Ok(true)
            })
            .await?;

        if !inserted {
            return Err(RoomError::Duplicate(card.id));
        }

        debug!("card {} inserted into room {} by {}", card.id, card.room_id, card.owner_id);
        self.publish(&card.room_id, RoomMessage::Inserted(card.clone()));
        Ok(card)
    }

    async fn update_position(
        &self,
        identity: &Identity,
        card_id: &str,
        x: f64,
        y: f64,
    ) -> Result<(), RoomError> {
        if identity.user_id.trim().is_empty() {
            return Err(RoomError::NotAuthenticated);
        }

        let card_id = card_id.to_string();
        let user_id = identity.user_id.clone();
        let lookup_id = card_id.clone();
        let owner: Option<String> = self
            .db
            .execute(move |conn| {
                conn.query_row(
                    "SELECT owner_id FROM cards WHERE id = ?1",
                    params![lookup_id],
                    |row| row.get(0),
                )
                .optional()
                .context("failed to look up card owner")
            })
            .await?;

        match owner {
            None => return Err(RoomError::NotFound(card_id)),
            Some(owner) if owner != user_id => return Err(RoomError::Forbidden(card_id)),
            Some(_) => {}
        }

        self.db
            .execute(move |conn| {
                conn.execute(
                    "UPDATE cards SET x = ?1, y = ?2, coord_space = ?3 WHERE id = ?4 AND owner_id = ?5",
                    params![x, y, CoordinateSpace::Normalized.as_str(), card_id, user_id],
                )
                .with_context(|| "failed to update card position")?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    async fn subscribe(&self, room_id: &str) -> Result<RoomFeed, RoomError> {
        Ok(RoomFeed::new(room_id, self.feed.subscribe()))
    }

    async fn broadcast(&self, room_id: &str, message: RoomMessage) -> Result<(), RoomError> {
        self.publish(room_id, message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_row(id: &str, room: &str, stack_order: i64) -> NewCardRow {
        NewCardRow {
            id: id.into(),
            room_id: room.into(),
            media_payload: "data:image/jpeg;base64,AA".into(),
            caption: Some("cap".into()),
            x: 0.1,
            y: 0.2,
            rotation: 3.0,
            stack_order,
            coord_space: CoordinateSpace::Normalized,
        }
    }

    fn legacy_row(id: &str, room: &str, created_at: DateTime<Utc>) -> CardRow {
        CardRow {
            id: id.into(),
            created_at,
            owner_id: "legacy".into(),
            room_id: room.into(),
            media_payload: "data:image/jpeg;base64,AA".into(),
            caption: None,
            x: 120.0,
            y: 340.0,
            rotation: 0.0,
            stack_order: 1,
            coord_space: None,
        }
    }

    #[tokio::test]
    async fn test_insert_attributes_owner_and_echoes() {
        let store = SqliteRoomStore::in_memory().unwrap();
        let mut feed = store.subscribe("demo").await.unwrap();

        let card = store
            .insert_card(&Identity::new("alice"), new_row("c1", "demo", 5))
            .await
            .unwrap();
        assert_eq!(card.owner_id, "alice");
        assert_eq!(card.coord_space, Some(CoordinateSpace::Normalized));

        match feed.next().await {
            Some(RoomMessage::Inserted(echo)) => assert_eq!(echo, card),
            other => panic!("unexpected feed message {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_file_store_keeps_cards_across_reopen() {
        let dir = std::env::temp_dir().join(format!("retrocam-store-{}", uuid::Uuid::new_v4()));
        let path = dir.join("rooms.sqlite3");

        let store = SqliteRoomStore::open(path.clone()).unwrap();
        store
            .insert_card(&Identity::new("alice"), new_row("c1", "demo", 1))
            .await
            .unwrap();
        drop(store);

        let reopened = SqliteRoomStore::open(path).unwrap();
        let rows = reopened.fetch_recent("demo", 50).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "c1");
        assert_eq!(rows[0].owner_id, "alice");
        drop(reopened);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_insert_requires_identity() {
        let store = SqliteRoomStore::in_memory().unwrap();
        let result = store.insert_card(&Identity::new(" "), new_row("c1", "demo", 1)).await;
        assert!(matches!(result, Err(RoomError::NotAuthenticated)));
        assert!(store.fetch_recent("demo", 50).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let store = SqliteRoomStore::in_memory().unwrap();
        let alice = Identity::new("alice");
        store.insert_card(&alice, new_row("c1", "demo", 1)).await.unwrap();
        let again = store.insert_card(&alice, new_row("c1", "demo", 2)).await;
        assert!(matches!(again, Err(RoomError::Duplicate(id)) if id == "c1"));
    }

    #[tokio::test]
    async fn test_fetch_returns_newest_window_oldest_first() {
        let store = SqliteRoomStore::in_memory().unwrap();
        let base = Utc::now() - Duration::minutes(10);
        for i in 0..55 {
            store
                .import_row(legacy_row(&format!("c{i:02}"), "demo", base + Duration::seconds(i)))
                .await
                .unwrap();
        }
        store
            .import_row(legacy_row("elsewhere", "other", base))
            .await
            .unwrap();

        let rows = store.fetch_recent("demo", 50).await.unwrap();
        assert_eq!(rows.len(), 50);
        assert_eq!(rows.first().unwrap().id, "c05");
        assert_eq!(rows.last().unwrap().id, "c54");
        assert!(rows.windows(2).all(|w| w[0].created_at <= w[1].created_at));
        assert!(rows.iter().all(|row| row.room_id == "demo" && row.coord_space.is_none()));
    }

    #[tokio::test]
    async fn test_only_owner_may_update_position() {
        let store = SqliteRoomStore::in_memory().unwrap();
        let alice = Identity::new("alice");
        store.insert_card(&alice, new_row("c1", "demo", 1)).await.unwrap();

        let bob = store.update_position(&Identity::new("bob"), "c1", 0.5, 0.5).await;
        assert!(matches!(bob, Err(RoomError::Forbidden(_))));
        let missing = store.update_position(&alice, "nope", 0.5, 0.5).await;
        assert!(matches!(missing, Err(RoomError::NotFound(_))));

        store.update_position(&alice, "c1", 0.75, 0.5).await.unwrap();
        let rows = store.fetch_recent("demo", 50).await.unwrap();
        assert_eq!((rows[0].x, rows[0].y), (0.75, 0.5));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_room_subscribers_only() {
        let store = SqliteRoomStore::in_memory().unwrap();
        let mut other = store.subscribe("other").await.unwrap();
        let mut demo = store.subscribe("demo").await.unwrap();

        store
            .broadcast("demo", RoomMessage::Flash { user_id: "alice".into() })
            .await
            .unwrap();
        store
            .broadcast("other", RoomMessage::Flash { user_id: "bob".into() })
            .await
            .unwrap();

        assert_eq!(demo.next().await, Some(RoomMessage::Flash { user_id: "alice".into() }));
        assert_eq!(other.next().await, Some(RoomMessage::Flash { user_id: "bob".into() }));
    }
}
