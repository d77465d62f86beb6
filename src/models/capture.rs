//! Capture records: one per shutter or record action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CaptureId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    /// Infers the kind from a data URI's mime prefix.
    pub fn from_payload(payload: &str) -> Self {
        if payload.starts_with("data:video/") {
            MediaKind::Video
        } else {
            MediaKind::Photo
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleState {
    Ejecting,
    AwaitingPlacement,
    Developing,
    Settled,
}

/// On-screen presence of a card, in viewport pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub x: f64,
    pub y: f64,
    pub rotation_degrees: f64,
    pub stack_order: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub id: CaptureId,
    pub media_payload: String,
    pub media_kind: MediaKind,
    pub created_at: DateTime<Utc>,
    pub caption: Option<String>,
    pub placement: Placement,
    /// Back-of-card note. Local only, never synchronized.
    pub annotation: Option<String>,
    pub lifecycle_state: LifecycleState,
}

impl Capture {
    /// Creates a freshly captured record in the `Ejecting` state.
    pub fn new(media_payload: String, media_kind: MediaKind, placement: Placement) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            media_payload,
            media_kind,
            created_at: Utc::now(),
            caption: None,
            placement,
            annotation: None,
            lifecycle_state: LifecycleState::Ejecting,
        }
    }

    /// Point-in-card test against the unrotated card rectangle.
    pub fn contains(&self, x: f64, y: f64, width: f64, height: f64) -> bool {
        x >= self.placement.x
            && x <= self.placement.x + width
            && y >= self.placement.y
            && y <= self.placement.y + height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn placement() -> Placement {
        Placement {
            x: 10.0,
            y: 20.0,
            rotation_degrees: 3.0,
            stack_order: 1,
        }
    }

    #[test]
    fn test_new_capture_is_ejecting_and_pending() {
        let capture = Capture::new("data:image/jpeg;base64,AAAA".into(), MediaKind::Photo, placement());
        assert_eq!(capture.lifecycle_state, LifecycleState::Ejecting);
        assert!(capture.caption.is_none());
        assert!(capture.annotation.is_none());
    }

    #[test]
    fn test_capture_ids_are_unique() {
        let a = Capture::new("a".into(), MediaKind::Photo, placement());
        let b = Capture::new("a".into(), MediaKind::Photo, placement());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_media_kind_from_payload() {
        assert_eq!(MediaKind::from_payload("data:video/webm;base64,AA"), MediaKind::Video);
        assert_eq!(MediaKind::from_payload("data:image/jpeg;base64,AA"), MediaKind::Photo);
    }

    #[test]
    fn test_contains_uses_card_rectangle() {
        let capture = Capture::new("a".into(), MediaKind::Photo, placement());
        assert!(capture.contains(15.0, 25.0, 100.0, 120.0));
        assert!(!capture.contains(5.0, 25.0, 100.0, 120.0));
        assert!(!capture.contains(15.0, 141.0, 100.0, 120.0));
    }
}
