use std::collections::HashMap;

use muster_lib::{lobby::PlayerGameStatus, ParticipantId};

/// Readiness of every participant that entered the lobby this round.
///
/// Entries outlive the participant's connection: disconnecting does not remove a participant,
/// only a round transition does (see [`ReadinessTracker::clear`] and [`ReadinessTracker::reset`]).
#[derive(Debug, Default)]
pub struct ReadinessTracker {
    statuses: HashMap<ParticipantId, PlayerGameStatus>,
}

impl ReadinessTracker {
    /// Record that a participant entered the lobby. They always start out not ready.
    pub fn enter(&mut self, id: ParticipantId) {
        self.statuses.insert(id, PlayerGameStatus::NotReady);
    }

    pub fn contains(&self, id: ParticipantId) -> bool {
        self.statuses.contains_key(&id)
    }

    /// Overwrite the status of a known participant. Unknown participants are left alone.
    pub fn set(&mut self, id: ParticipantId, status: PlayerGameStatus) {
        if let Some(current) = self.statuses.get_mut(&id) {
            *current = status;
        }
    }

    pub fn set_all(&mut self, status: PlayerGameStatus) {
        self.statuses.values_mut().for_each(|s| *s = status);
    }

    pub fn status(&self, id: ParticipantId) -> PlayerGameStatus {
        self.statuses.get(&id).copied().unwrap_or_default()
    }

    pub fn ready_count(&self) -> usize {
        self.statuses.values().filter(|s| s.is_ready()).count()
    }

    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.statuses.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn clear(&mut self) {
        self.statuses.clear();
    }

    /// Start a fresh lobby containing exactly `ids`, none of them ready.
    pub fn reset(&mut self, ids: impl IntoIterator<Item = ParticipantId>) {
        self.statuses.clear();
        ids.into_iter().for_each(|id| self.enter(id));
    }
}
