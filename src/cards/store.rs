use std::collections::HashMap;

use crate::models::{Capture, CaptureId, LifecycleState};

/// Placed cards keyed by capture id, plus the stack-order counter shared with
/// the pending slot.
#[derive(Debug, Default)]
pub struct CardStore {
    cards: HashMap<CaptureId, Capture>,
    max_z: i64,
}

impl CardStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_z(&self) -> i64 {
        self.max_z
    }

    /// Issues `max_z + 1` and records it as the new maximum.
    pub fn next_stack_order(&mut self) -> i64 {
        self.max_z += 1;
        self.max_z
    }

    /// Raises the counter so later issues stay above `stack_order`. Never lowers it.
    pub fn observe_stack_order(&mut self, stack_order: i64) {
        self.max_z = self.max_z.max(stack_order);
    }

    /// Adds the capture unless its id is already present. An existing entry is
    /// left exactly as it was.
    pub fn insert(&mut self, capture: Capture) -> bool {
        if self.cards.contains_key(&capture.id) {
            return false;
        }
        self.cards.insert(capture.id.clone(), capture);
        true
    }

    /// Seeds from a fetch. Returns how many were new.
    pub fn seed(&mut self, captures: Vec<Capture>) -> usize {
        let highest = captures.iter().map(|c| c.placement.stack_order).max();
        let inserted = captures
            .into_iter()
            .filter(|capture| !self.cards.contains_key(&capture.id))
            .collect::<Vec<_>>();
        let count = inserted.len();
        for capture in inserted {
            self.cards.insert(capture.id.clone(), capture);
        }
        if let Some(highest) = highest {
            self.observe_stack_order(highest + 1);
        }
        count
    }

    pub fn bring_to_front(&mut self, id: &str) -> Option<i64> {
        if !self.cards.contains_key(id) {
            return None;
        }
        let next = self.next_stack_order();
        let card = self.cards.get_mut(id)?;
        card.placement.stack_order = next;
        Some(next)
    }

    pub fn move_to(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self.cards.get_mut(id) {
            Some(card) => {
                card.placement.x = x;
                card.placement.y = y;
                true
            }
            None => false,
        }
    }

    /// Fills an absent caption. Returns false if the card is unknown or already captioned.
    pub fn update_caption(&mut self, id: &str, caption: &str) -> bool {
        match self.cards.get_mut(id) {
            Some(card) if card.caption.is_none() => {
                card.caption = Some(caption.to_string());
                true
            }
            _ => false,
        }
    }

    /// User override: always replaces the caption.
    pub fn set_caption(&mut self, id: &str, caption: &str) -> bool {
        match self.cards.get_mut(id) {
            Some(card) => {
                card.caption = Some(caption.to_string());
                true
            }
            None => false,
        }
    }

    pub fn set_annotation(&mut self, id: &str, text: &str) -> bool {
        match self.cards.get_mut(id) {
            Some(card) => {
                card.annotation = if text.is_empty() {
                    None
                } else {
                    Some(text.to_string())
                };
                true
            }
            None => false,
        }
    }

    /// Developing -> Settled. No-op for cards in any other state.
    pub fn mark_settled(&mut self, id: &str) -> bool {
        match self.cards.get_mut(id) {
            Some(card) if card.lifecycle_state == LifecycleState::Developing => {
                card.lifecycle_state = LifecycleState::Settled;
                true
            }
            _ => false,
        }
    }

    /// Local view reset. The stack-order counter keeps its value.
    pub fn clear(&mut self) {
        self.cards.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Capture> {
        self.cards.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.cards.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Cards bottom to top.
    pub fn sorted(&self) -> Vec<&Capture> {
        let mut cards: Vec<&Capture> = self.cards.values().collect();
        cards.sort_by_key(|card| card.placement.stack_order);
        cards
    }

    /// Topmost card under the point, if any.
    pub fn hit_test(&self, x: f64, y: f64, width: f64, height: f64) -> Option<CaptureId> {
        self.sorted()
            .into_iter()
            .rev()
            .find(|card| card.contains(x, y, width, height))
            .map(|card| card.id.clone())
    }
}
