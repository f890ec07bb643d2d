use std::time::Duration;

use crate::lobby::LobbyStatus;
use crate::{ConnectionId, ParticipantId};
use serde::{Deserialize, Serialize};

use super::ProtocolError;

// TODO: Split into client-bound and server-bound enums so each side can only send what it should.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub enum Message {
    Error { error: ProtocolError },
    Version { version: String },
    ConnectionAccept { connection_id: ConnectionId },
    Login { participant_id: ParticipantId },
    Lobby(LobbyMessage),
    StatusSnapshot(LobbyStatus),
    InfoText { text: String },
    CountdownUpdate { scheduled_start: Duration, paused: bool },
    LateJoinStatus { disallowed: bool },
    Announcement { text: String },
}

impl From<LobbyMessage> for Message {
    fn from(msg: LobbyMessage) -> Self {
        Self::Lobby(msg)
    }
}

impl From<LobbyStatus> for Message {
    fn from(status: LobbyStatus) -> Self {
        Self::StatusSnapshot(status)
    }
}

/// Requests a participant makes while sitting in the lobby.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum LobbyMessage {
    /// The client finished loading everything it needs before it may ready up.
    LoadComplete,
    SetReady(bool),
}
