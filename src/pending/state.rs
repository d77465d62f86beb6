use serde::Serialize;

use crate::models::{Capture, LifecycleState};

/// Single-item holding area for a capture that has not been placed yet.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "capture")]
pub enum PendingSlot {
    #[default]
    Idle,
    Ejecting(Capture),
    AwaitingPlacement(Capture),
}

impl PendingSlot {
    pub fn is_occupied(&self) -> bool {
        !matches!(self, PendingSlot::Idle)
    }

    pub fn capture(&self) -> Option<&Capture> {
        match self {
            PendingSlot::Idle => None,
            PendingSlot::Ejecting(capture) | PendingSlot::AwaitingPlacement(capture) => {
                Some(capture)
            }
        }
    }

    fn capture_mut(&mut self) -> Option<&mut Capture> {
        match self {
            PendingSlot::Idle => None,
            PendingSlot::Ejecting(capture) | PendingSlot::AwaitingPlacement(capture) => {
                Some(capture)
            }
        }
    }

    /// Idle -> Ejecting. Hands the capture back if the slot is taken.
    pub fn begin_eject(&mut self, mut capture: Capture) -> Result<(), Capture> {
        if self.is_occupied() {
            return Err(capture);
        }
        capture.lifecycle_state = LifecycleState::Ejecting;
        *self = PendingSlot::Ejecting(capture);
        Ok(())
    }

    /// Ejecting -> AwaitingPlacement, only for the capture the timer was armed for.
    pub fn finish_eject(&mut self, id: &str) -> bool {
        match std::mem::take(self) {
            PendingSlot::Ejecting(mut capture) if capture.id == id => {
                capture.lifecycle_state = LifecycleState::AwaitingPlacement;
                *self = PendingSlot::AwaitingPlacement(capture);
                true
            }
            other => {
                *self = other;
                false
            }
        }
    }

    pub fn is_awaiting(&self, id: &str) -> bool {
        matches!(self, PendingSlot::AwaitingPlacement(capture) if capture.id == id)
    }

    /// Moves the pending card while it is being dragged.
    pub fn move_to(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self {
            PendingSlot::AwaitingPlacement(capture) if capture.id == id => {
                capture.placement.x = x;
                capture.placement.y = y;
                true
            }
            _ => false,
        }
    }

    /// Keep: releases the capture placed at the destination, leaving the slot Idle.
    /// Does nothing unless the slot still holds `id` and it is interactive.
    pub fn take_for_keep(&mut self, id: &str, x: f64, y: f64) -> Option<Capture> {
        if !self.is_awaiting(id) {
            return None;
        }
        match std::mem::take(self) {
            PendingSlot::AwaitingPlacement(mut capture) => {
                capture.placement.x = x;
                capture.placement.y = y;
                capture.lifecycle_state = LifecycleState::Developing;
                Some(capture)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Fills an absent caption on the pending capture with this id.
    pub fn update_caption(&mut self, id: &str, caption: &str) -> bool {
        match self.capture_mut() {
            Some(capture) if capture.id == id && capture.caption.is_none() => {
                capture.caption = Some(caption.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn set_caption(&mut self, id: &str, caption: &str) -> bool {
        match self.capture_mut() {
            Some(capture) if capture.id == id => {
                capture.caption = Some(caption.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn set_stack_order(&mut self, id: &str, stack_order: i64) -> bool {
        match self.capture_mut() {
            Some(capture) if capture.id == id => {
                capture.placement.stack_order = stack_order;
                true
            }
            _ => false,
        }
    }
}
