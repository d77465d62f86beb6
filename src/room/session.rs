use crate::models::Identity;

use super::validate_room_key;

/// Which room this client is bound to, as whom, and under which epoch.
///
/// Every join, leave, sign-in and sign-out bumps the epoch. Async results are
/// tagged with the epoch they were started under and dropped on mismatch, so
/// nothing from a room we left can land in the one we are in.
#[derive(Debug, Clone, Default)]
pub struct RoomSession {
    room_key: String,
    identity: Option<Identity>,
    epoch: u64,
}

impl RoomSession {
    pub fn new(room_key: impl Into<String>) -> Self {
        Self {
            room_key: room_key.into(),
            identity: None,
            epoch: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    pub fn room_key(&self) -> &str {
        &self.room_key
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// The room we should be subscribed to: signed in with a valid key.
    pub fn active_room(&self) -> Option<String> {
        self.identity.as_ref()?;
        validate_room_key(&self.room_key).ok()
    }

    /// Switches the room key. Returns the new epoch, or `None` if nothing changed.
    pub fn set_room_key(&mut self, raw: &str) -> Option<u64> {
        let key = raw.trim();
        if key == self.room_key {
            return None;
        }
        self.room_key = key.to_string();
        Some(self.advance())
    }

    pub fn sign_in(&mut self, identity: Identity) -> Option<u64> {
        if self.identity.as_ref() == Some(&identity) {
            return None;
        }
        self.identity = Some(identity);
        Some(self.advance())
    }

    pub fn sign_out(&mut self) -> Option<u64> {
        self.identity.take()?;
        Some(self.advance())
    }

    fn advance(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_is_active_only_when_signed_in_with_key() {
        let mut session = RoomSession::new("demo");
        assert!(session.active_room().is_none());
        session.sign_in(Identity::new("alice"));
        assert_eq!(session.active_room().as_deref(), Some("demo"));
        session.set_room_key("  ");
        assert!(session.active_room().is_none());
    }

    #[test]
    fn test_every_transition_advances_epoch() {
        let mut session = RoomSession::new("demo");
        let e1 = session.sign_in(Identity::new("alice")).unwrap();
        let e2 = session.set_room_key("party").unwrap();
        let e3 = session.sign_out().unwrap();
        assert!(e1 < e2 && e2 < e3);
        assert!(session.is_current(e3));
        assert!(!session.is_current(e1));
    }

    #[test]
    fn test_redundant_transitions_keep_epoch() {
        let mut session = RoomSession::new("demo");
        assert!(session.set_room_key(" demo ").is_none());
        assert!(session.sign_out().is_none());
        session.sign_in(Identity::new("alice"));
        assert!(session.sign_in(Identity::new("alice")).is_none());
        assert_eq!(session.epoch(), 1);
    }
}
