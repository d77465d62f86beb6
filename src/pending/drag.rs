use crate::models::CaptureId;

#[derive(Debug, Clone, PartialEq)]
pub enum DragTarget {
    /// The capture in the pending slot; releasing it is a Keep.
    Pending(CaptureId),
    /// A card already in the store; releasing it just drops it in place.
    Card(CaptureId),
}

/// Pointer gesture in progress. The grab offset keeps the card anchored
/// where the pointer first touched it.
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub target: DragTarget,
    pub grab_dx: f64,
    pub grab_dy: f64,
    pub moved: bool,
}

impl DragState {
    pub fn new(target: DragTarget, pointer: (f64, f64), card_origin: (f64, f64)) -> Self {
        Self {
            target,
            grab_dx: pointer.0 - card_origin.0,
            grab_dy: pointer.1 - card_origin.1,
            moved: false,
        }
    }

    /// Card origin for the given pointer position.
    pub fn origin_for(&self, x: f64, y: f64) -> (f64, f64) {
        (x - self.grab_dx, y - self.grab_dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_tracks_grab_offset() {
        let drag = DragState::new(DragTarget::Card("a".into()), (110.0, 70.0), (100.0, 50.0));
        assert_eq!(drag.origin_for(210.0, 170.0), (200.0, 150.0));
        assert!(!drag.moved);
    }
}
