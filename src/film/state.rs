use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status", content = "count")]
pub enum FilmState {
    Ready(u32),
    Reloading,
}

/// Finite shot counter gating photo captures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmGovernor {
    pub capacity: u32,
    pub state: FilmState,
    /// Identifies the reload in flight so a delayed completion can be matched.
    #[serde(skip)]
    reload_epoch: u64,
}

impl FilmGovernor {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            state: FilmState::Ready(capacity),
            reload_epoch: 0,
        }
    }

    pub fn remaining(&self) -> u32 {
        match self.state {
            FilmState::Ready(count) => count,
            FilmState::Reloading => 0,
        }
    }

    pub fn is_reloading(&self) -> bool {
        self.state == FilmState::Reloading
    }

    pub fn can_shoot(&self) -> bool {
        matches!(self.state, FilmState::Ready(count) if count > 0)
    }

    /// Spends one shot. Returns false, leaving the count untouched, when empty or reloading.
    pub fn try_consume(&mut self) -> bool {
        match self.state {
            FilmState::Ready(count) if count > 0 => {
                self.state = FilmState::Ready(count - 1);
                true
            }
            _ => false,
        }
    }

    /// Enters `Reloading` and returns the epoch the completion must present.
    pub fn begin_reload(&mut self) -> Option<u64> {
        if self.is_reloading() {
            return None;
        }
        self.reload_epoch += 1;
        self.state = FilmState::Reloading;
        Some(self.reload_epoch)
    }

    pub fn finish_reload(&mut self, epoch: u64) -> bool {
        if !self.is_reloading() || epoch != self.reload_epoch {
            return false;
        }
        self.state = FilmState::Ready(self.capacity);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_shots_then_blocked() {
        let mut film = FilmGovernor::new(8);
        for expected in (0..8).rev() {
            assert!(film.try_consume());
            assert_eq!(film.remaining(), expected);
        }
        assert!(!film.can_shoot());
        assert!(!film.try_consume());
        assert_eq!(film.state, FilmState::Ready(0));
    }

    #[test]
    fn test_reload_restores_exact_capacity() {
        let mut film = FilmGovernor::new(8);
        for _ in 0..8 {
            film.try_consume();
        }
        let epoch = film.begin_reload().unwrap();
        assert!(!film.try_consume());
        assert!(film.finish_reload(epoch));
        assert_eq!(film.state, FilmState::Ready(8));
    }

    #[test]
    fn test_reload_is_guarded_while_reloading() {
        let mut film = FilmGovernor::new(3);
        let epoch = film.begin_reload().unwrap();
        assert!(film.begin_reload().is_none());
        assert!(!film.finish_reload(epoch + 1));
        assert!(film.is_reloading());
        assert!(film.finish_reload(epoch));
        assert!(!film.finish_reload(epoch));
    }

    #[test]
    fn test_serializes_with_status_tag() {
        let film = FilmGovernor::new(2);
        let json = serde_json::to_value(&film).unwrap();
        assert_eq!(json["state"]["status"], "ready");
        assert_eq!(json["state"]["count"], 2);
    }
}
