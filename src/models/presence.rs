use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Another user's pointer, positioned in normalized viewport space.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceCursor {
    pub user_id: String,
    pub normalized_x: f64,
    pub normalized_y: f64,
    pub color: String,
    #[serde(skip, default = "Instant::now")]
    pub last_seen_at: Instant,
}
