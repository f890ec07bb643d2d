//! Outbound half of the lobby: turns lobby state into messages for connected participants.
//!
//! Delivery is best effort everywhere. A participant that can't be reached is skipped and
//! catches up with the next full snapshot.

use muster_lib::lobby::LobbyStatus;
use muster_lib::net::Message;
use muster_lib::ParticipantId;

use super::lobby_actor::LobbyActor;
use super::localization::LocArg;
use super::round::RunLevel;
use super::stations::{self, InfoContext};

impl LobbyActor {
    /// Lobby state as seen by `id`. Only `self_ready` differs between participants.
    pub(super) fn status_for(&self, id: ParticipantId) -> LobbyStatus {
        LobbyStatus {
            lobby_active: self.run_level == RunLevel::PreRoundLobby,
            song: self.media.song.clone(),
            background: self.media.background.clone(),
            self_ready: self.readiness.status(id).is_ready(),
            scheduled_start: self.clock.scheduled_start(),
            preload_lead: self.clock.preload_lead(),
            paused: self.clock.paused(),
        }
    }

    pub(super) fn send_status_to_one(&self, id: ParticipantId) {
        self.deliver(id, self.status_for(id).into());
    }

    pub(super) fn send_status_to_all(&self) {
        for id in self.sessions.participants() {
            self.send_status_to_one(id);
        }
    }

    pub(super) fn info_text(&self) -> String {
        let ctx = InfoContext {
            run_level: self.run_level,
            round_id: self.round_id,
            player_count: self.sessions.len(),
            ready_count: self.readiness.ready_count(),
            preset: self.config.preset,
        };
        stations::info_text(
            ctx,
            self.services.stations.as_ref(),
            self.services.localizer.as_ref(),
        )
    }

    pub(super) fn send_info_to_all(&self) {
        let text = self.info_text();
        self.sessions.broadcast(&Message::InfoText { text });
    }

    pub(super) fn send_countdown_to_all(&self) {
        self.sessions.broadcast(&Message::CountdownUpdate {
            scheduled_start: self.clock.scheduled_start(),
            paused: self.clock.paused(),
        });
    }

    pub(super) fn send_late_join_status(&self, disallowed: bool) {
        self.sessions
            .broadcast(&Message::LateJoinStatus { disallowed });
    }

    /// Server-wide chat announcement of a localized message.
    pub(super) fn announce(&self, key: &str, args: &[(&str, LocArg)]) {
        let text = self.services.localizer.get_string(key, args);
        tracing::info!(%text, "Announcement");
        self.sessions.broadcast(&Message::Announcement { text });
    }

    pub(super) fn deliver(&self, id: ParticipantId, msg: Message) {
        if let Err(e) = self.sessions.send(id, msg) {
            tracing::warn!(%e, "Dropped message");
        }
    }
}
