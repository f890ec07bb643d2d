use muster_lib::ConnectionId;
use rand::{thread_rng, Rng};
use std::collections::HashSet;
use std::fmt::Display;
use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::lobby::LobbyControl;

#[derive(Clone, Debug)]
pub struct ServerState {
    connections: Arc<Mutex<HashSet<ConnectionId>>>,
    lobby: LobbyControl,
}

impl ServerState {
    pub fn new(lobby: LobbyControl) -> Self {
        Self {
            connections: Default::default(),
            lobby,
        }
    }

    pub fn lobby(&self) -> &LobbyControl {
        &self.lobby
    }

    /// Reserve a fresh id for a new connection. The id is released when the returned
    /// [`OwnedId`] is dropped.
    pub fn add_connection(&self) -> OwnedId<ConnectionId> {
        let mut connections = self.connections();
        let connection_id = loop {
            let id = ConnectionId(thread_rng().gen());
            if !connections.contains(&id) {
                break id;
            }
        };
        connections.insert(connection_id);
        OwnedId::<ConnectionId>::new(self.clone(), connection_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections().len()
    }

    fn connections(&self) -> MutexGuard<HashSet<ConnectionId>> {
        self.connections.lock().unwrap()
    }
}

/// Wrapper around Id types that is handed out when an Id is stored in the state
/// and when dropped will remove that id from the state.
#[derive(Debug)]
pub struct OwnedId<Id: Copy> {
    state: ServerState,
    id: Id,
    cleanup: fn(&ServerState, Id),
}

impl<Id: Display + Copy> Display for OwnedId<Id> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.id.fmt(f)
    }
}

impl OwnedId<ConnectionId> {
    fn new(state: ServerState, id: ConnectionId) -> Self {
        Self {
            state,
            id,
            cleanup: |state, id| {
                tracing::debug!(connection_id = %id, "Connection closed");
                state.connections().remove(&id);
            },
        }
    }
}

impl<Id: Copy> Deref for OwnedId<Id> {
    type Target = Id;

    fn deref(&self) -> &Self::Target {
        &self.id
    }
}

impl<Id: Copy> Drop for OwnedId<Id> {
    fn drop(&mut self) {
        // This will crash the program if we're dropping due to a previous panic caused by a poisoned lock,
        // and that's fine for now.
        (self.cleanup)(&self.state, self.id);
    }
}
