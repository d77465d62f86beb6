//! Shared-room card rows and the coordinate mapping between clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capture::{Capture, CaptureId, LifecycleState, MediaKind, Placement};

/// Authenticated user of the remote store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum CoordinateSpace {
    /// Fractions of the viewport, 0..=1 on both axes.
    Normalized,
    /// Raw viewport pixels of whoever inserted the row.
    Pixels,
}

impl CoordinateSpace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoordinateSpace::Normalized => "normalized",
            CoordinateSpace::Pixels => "pixels",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normalized" => Some(CoordinateSpace::Normalized),
            "pixels" => Some(CoordinateSpace::Pixels),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn normalize(&self, x: f64, y: f64) -> (f64, f64) {
        let nx = if self.width > 0.0 { x / self.width } else { 0.0 };
        let ny = if self.height > 0.0 { y / self.height } else { 0.0 };
        (nx.clamp(0.0, 1.0), ny.clamp(0.0, 1.0))
    }

    pub fn denormalize(&self, nx: f64, ny: f64) -> (f64, f64) {
        (nx * self.width, ny * self.height)
    }

    /// Maps stored coordinates into this viewport's pixels.
    ///
    /// Untagged (legacy) rows are treated as normalized when both values fall
    /// inside [0, 1]. A pixel position that happens to land there is
    /// misread, which is why new rows always carry a tag.
    pub fn resolve(&self, x: f64, y: f64, space: Option<CoordinateSpace>) -> (f64, f64) {
        let space = space.unwrap_or_else(|| {
            if (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y) {
                CoordinateSpace::Normalized
            } else {
                CoordinateSpace::Pixels
            }
        });

        match space {
            CoordinateSpace::Normalized => self.denormalize(x, y),
            CoordinateSpace::Pixels => (x, y),
        }
    }
}

/// A persisted card as the remote store returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CardRow {
    pub id: CaptureId,
    pub created_at: DateTime<Utc>,
    pub owner_id: String,
    pub room_id: String,
    pub media_payload: String,
    pub caption: Option<String>,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub stack_order: i64,
    pub coord_space: Option<CoordinateSpace>,
}

impl CardRow {
    pub fn into_capture(self, viewport: &Viewport, state: LifecycleState) -> Capture {
        let (x, y) = viewport.resolve(self.x, self.y, self.coord_space);
        Capture {
            media_kind: MediaKind::from_payload(&self.media_payload),
            id: self.id,
            media_payload: self.media_payload,
            created_at: self.created_at,
            caption: self.caption,
            placement: Placement {
                x,
                y,
                rotation_degrees: self.rotation,
                stack_order: self.stack_order,
            },
            annotation: None,
            lifecycle_state: state,
        }
    }
}

/// Insert request for a kept card. Owner and timestamp are assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewCardRow {
    pub id: CaptureId,
    pub room_id: String,
    pub media_payload: String,
    pub caption: Option<String>,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub stack_order: i64,
    pub coord_space: CoordinateSpace,
}

impl NewCardRow {
    /// Builds a resolution-independent row from a placed capture.
    pub fn from_capture(capture: &Capture, room_id: &str, viewport: &Viewport) -> Self {
        let (x, y) = viewport.normalize(capture.placement.x, capture.placement.y);
        Self {
            id: capture.id.clone(),
            room_id: room_id.to_string(),
            media_payload: capture.media_payload.clone(),
            caption: capture.caption.clone(),
            x,
            y,
            rotation: capture.placement.rotation_degrees,
            stack_order: capture.placement.stack_order,
            coord_space: CoordinateSpace::Normalized,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(x: f64, y: f64, space: Option<CoordinateSpace>) -> CardRow {
        CardRow {
            id: "card-1".into(),
            created_at: Utc::now(),
            owner_id: "alice".into(),
            room_id: "demo".into(),
            media_payload: "data:image/jpeg;base64,AA".into(),
            caption: Some("hello".into()),
            x,
            y,
            rotation: -4.0,
            stack_order: 12,
            coord_space: space,
        }
    }

    #[test]
    fn test_tagged_normalized_scales_by_viewport() {
        let viewport = Viewport::new(1000.0, 500.0);
        assert_eq!(
            viewport.resolve(0.5, 0.2, Some(CoordinateSpace::Normalized)),
            (500.0, 100.0)
        );
    }

    #[test]
    fn test_tagged_pixels_pass_through_even_inside_unit_square() {
        let viewport = Viewport::new(1000.0, 500.0);
        assert_eq!(
            viewport.resolve(1.0, 0.5, Some(CoordinateSpace::Pixels)),
            (1.0, 0.5)
        );
    }

    #[test]
    fn test_untagged_rows_use_range_heuristic() {
        let viewport = Viewport::new(1000.0, 500.0);
        assert_eq!(viewport.resolve(0.25, 1.0, None), (250.0, 500.0));
        assert_eq!(viewport.resolve(120.0, 340.0, None), (120.0, 340.0));
        assert_eq!(viewport.resolve(0.5, 340.0, None), (0.5, 340.0));
    }

    #[test]
    fn test_normalize_clamps_to_unit_range() {
        let viewport = Viewport::new(400.0, 200.0);
        assert_eq!(viewport.normalize(120.0, 340.0), (0.3, 1.0));
        assert_eq!(viewport.normalize(-10.0, 50.0), (0.0, 0.25));
    }

    #[test]
    fn test_row_into_capture_keeps_identity_and_order() {
        let viewport = Viewport::new(1000.0, 1000.0);
        let capture = row(0.1, 0.2, Some(CoordinateSpace::Normalized))
            .into_capture(&viewport, LifecycleState::Settled);
        assert_eq!(capture.id, "card-1");
        assert_eq!(capture.placement.stack_order, 12);
        assert_eq!(capture.placement.x, 100.0);
        assert_eq!(capture.placement.y, 200.0);
        assert_eq!(capture.caption.as_deref(), Some("hello"));
        assert_eq!(capture.lifecycle_state, LifecycleState::Settled);
        assert!(capture.annotation.is_none());
    }

    #[test]
    fn test_new_row_is_normalized() {
        let viewport = Viewport::new(1200.0, 800.0);
        let capture = row(0.0, 0.0, None).into_capture(&viewport, LifecycleState::Developing);
        let mut placed = capture.clone();
        placed.placement.x = 120.0;
        placed.placement.y = 340.0;

        let new_row = NewCardRow::from_capture(&placed, "demo", &viewport);
        assert_eq!(new_row.coord_space, CoordinateSpace::Normalized);
        assert!((new_row.x - 0.1).abs() < 1e-9);
        assert!((new_row.y - 0.425).abs() < 1e-9);
        assert_eq!(new_row.room_id, "demo");
    }
}
