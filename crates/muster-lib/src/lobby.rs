use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Readiness of a participant for the upcoming round.
#[derive(Debug, Default, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PlayerGameStatus {
    #[default]
    NotReady,
    ReadyToPlay,
}

impl PlayerGameStatus {
    pub fn is_ready(self) -> bool {
        self == Self::ReadyToPlay
    }
}

impl From<bool> for PlayerGameStatus {
    fn from(ready: bool) -> Self {
        if ready {
            Self::ReadyToPlay
        } else {
            Self::NotReady
        }
    }
}

/// Personalized view of the lobby sent to a single participant.
///
/// Instants are offsets from the server's start-up, so clients should only compare them
/// against each other or against the server time they were given.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct LobbyStatus {
    pub lobby_active: bool,
    pub song: Option<String>,
    pub background: Option<String>,
    /// Readiness of the recipient, not of the lobby as a whole.
    pub self_ready: bool,
    pub scheduled_start: Duration,
    pub preload_lead: Duration,
    pub paused: bool,
}
