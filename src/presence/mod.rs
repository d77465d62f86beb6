//! Ephemeral shared cursors.
//!
//! Entries live only in memory and expire on their own; there is no leave
//! message. Positions travel normalized so clients with different viewport
//! sizes agree on where a cursor is.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::models::{PresenceCursor, Viewport};

/// Wire form of a cursor broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CursorMessage {
    pub user_id: String,
    pub x: f64,
    pub y: f64,
    pub color: String,
}

/// Stable per-user color: the id is folded into a hue.
pub fn color_for(user_id: &str) -> String {
    let hash = user_id.chars().fold(0i32, |hash, ch| {
        (ch as i32).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash))
    });
    let hue = hash.unsigned_abs() % 360;
    format!("hsl({hue}, 70%, 60%)")
}

#[derive(Debug)]
pub struct PresenceLayer {
    cursors: HashMap<String, PresenceCursor>,
    throttle: Duration,
    stale_after: Duration,
    last_broadcast: Option<Instant>,
}

impl PresenceLayer {
    pub fn new(throttle: Duration, stale_after: Duration) -> Self {
        Self {
            cursors: HashMap::new(),
            throttle,
            stale_after,
            last_broadcast: None,
        }
    }

    /// Builds a broadcast for the local pointer unless one went out within the throttle window.
    pub fn local_move(
        &mut self,
        user_id: &str,
        x: f64,
        y: f64,
        viewport: &Viewport,
        now: Instant,
    ) -> Option<CursorMessage> {
        if let Some(last) = self.last_broadcast {
            if now.saturating_duration_since(last) < self.throttle {
                return None;
            }
        }
        self.last_broadcast = Some(now);

        let (nx, ny) = viewport.normalize(x, y);
        Some(CursorMessage {
            user_id: user_id.to_string(),
            x: nx,
            y: ny,
            color: color_for(user_id),
        })
    }

    /// Records a remote cursor. Our own echoes are dropped.
    pub fn apply_remote(&mut self, self_id: Option<&str>, message: CursorMessage, now: Instant) -> bool {
        if self_id == Some(message.user_id.as_str()) {
            return false;
        }
        self.cursors.insert(
            message.user_id.clone(),
            PresenceCursor {
                user_id: message.user_id,
                normalized_x: message.x,
                normalized_y: message.y,
                color: message.color,
                last_seen_at: now,
            },
        );
        true
    }

    /// Drops cursors not heard from within the staleness window. Returns how many went.
    pub fn sweep(&mut self, now: Instant) -> usize {
        let before = self.cursors.len();
        let stale_after = self.stale_after;
        self.cursors
            .retain(|_, cursor| now.saturating_duration_since(cursor.last_seen_at) <= stale_after);
        before - self.cursors.len()
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
        self.last_broadcast = None;
    }

    pub fn get(&self, user_id: &str) -> Option<&PresenceCursor> {
        self.cursors.get(user_id)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn cursors(&self) -> Vec<PresenceCursor> {
        let mut cursors: Vec<PresenceCursor> = self.cursors.values().cloned().collect();
        cursors.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        cursors
    }
}
