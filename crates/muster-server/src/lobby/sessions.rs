use std::collections::BTreeMap;

use muster_lib::net::{Message, ProtocolError};
use muster_lib::{ConnectionId, ParticipantId};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Participant {0:#} is not connected")]
    NotConnected(ParticipantId),
    #[error("Outbound queue for participant {0:#} is full")]
    QueueFull(ParticipantId),
    #[error("Connection for participant {0:#} has closed")]
    Closed(ParticipantId),
}

/// A live connection belonging to a participant.
#[derive(Debug)]
pub struct Session {
    pub connection_id: ConnectionId,
    outbound: mpsc::Sender<Message>,
    loaded: bool,
}

impl Session {
    pub fn new(connection_id: ConnectionId, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            connection_id,
            outbound,
            loaded: false,
        }
    }

    /// Tell the client why this session is being dropped. Best effort.
    pub fn close_with(self, error: ProtocolError) {
        let _ = self.outbound.try_send(Message::Error { error });
    }
}

/// Connected participants, keyed by their stable id.
///
/// Sends never wait: each connection has a bounded outbound queue drained by its own task, and
/// a message that doesn't fit is dropped for that recipient only.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<ParticipantId, Session>,
}

impl SessionRegistry {
    /// Register `session` for `id`, returning the session it replaced if the participant was
    /// already connected elsewhere.
    pub fn attach(&mut self, id: ParticipantId, session: Session) -> Option<Session> {
        self.sessions.insert(id, session)
    }

    /// Remove the session for `id`, but only if it still belongs to `connection_id`. A
    /// participant that reconnected keeps their newer session.
    pub fn detach(&mut self, id: ParticipantId, connection_id: ConnectionId) -> bool {
        match self.sessions.get(&id) {
            Some(session) if session.connection_id == connection_id => {
                self.sessions.remove(&id);
                true
            }
            _ => false,
        }
    }

    pub fn is_connected(&self, id: ParticipantId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Whether `connection_id` is the participant's current connection.
    pub fn is_current(&self, id: ParticipantId, connection_id: ConnectionId) -> bool {
        self.sessions
            .get(&id)
            .map_or(false, |s| s.connection_id == connection_id)
    }

    /// Mark the participant's session loaded, if `connection_id` is still the one it belongs to.
    pub fn mark_loaded(&mut self, id: ParticipantId, connection_id: ConnectionId) -> bool {
        match self.sessions.get_mut(&id) {
            Some(session) if session.connection_id == connection_id => {
                session.loaded = true;
                true
            }
            _ => false,
        }
    }

    /// Whether the participant's client finished loading and may ready up.
    pub fn is_load_complete(&self, id: ParticipantId) -> bool {
        self.sessions.get(&id).map_or(false, |s| s.loaded)
    }

    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.sessions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn send(&self, id: ParticipantId, msg: Message) -> Result<(), DeliveryError> {
        let session = self
            .sessions
            .get(&id)
            .ok_or(DeliveryError::NotConnected(id))?;
        session.outbound.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::QueueFull(id),
            TrySendError::Closed(_) => DeliveryError::Closed(id),
        })
    }

    /// Best-effort send of the same message to every connected participant. Returns how many
    /// recipients it was queued for.
    pub fn broadcast(&self, msg: &Message) -> usize {
        self.participants()
            .filter(|&id| match self.send(id, msg.clone()) {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(%e, "Dropped broadcast");
                    false
                }
            })
            .count()
    }
}
