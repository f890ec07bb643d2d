use muster_lib::{lobby::PlayerGameStatus, net::Message, ConnectionId, ParticipantId};
use tokio::sync::{mpsc, oneshot};

use super::lobby_actor::LobbyAction;
use super::{LobbyError, LobbyResult};

/// Server-side access to the lobby: admitting connections and administrative overrides.
#[derive(Clone, Debug)]
pub struct LobbyControl {
    pub(crate) sender: mpsc::Sender<LobbyAction>,
}

impl LobbyControl {
    async fn execute<T>(&self, msg: LobbyAction, rx: oneshot::Receiver<T>) -> LobbyResult<T> {
        // Ignore first error, if there is an error, rx.await will fail as well since it's sender
        // will have been dropped
        let _ = self.sender.send(msg).await;
        rx.await.map_err(|_| LobbyError::HandleInvalid)
    }

    async fn notify(&self, msg: LobbyAction) -> LobbyResult<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| LobbyError::HandleInvalid)
    }

    /// Admit a connection for `participant_id` into the lobby. Everything the lobby has to
    /// say to this participant is queued on `outbound`.
    ///
    /// Dropping the returned handle detaches the connection again.
    pub async fn join(
        &self,
        participant_id: ParticipantId,
        connection_id: ConnectionId,
        outbound: mpsc::Sender<Message>,
    ) -> LobbyResult<LobbyHandle> {
        self.notify(LobbyAction::Join {
            participant_id,
            connection_id,
            outbound,
        })
        .await?;

        Ok(LobbyHandle {
            sender: self.sender.clone(),
            participant_id,
            connection_id,
        })
    }

    pub async fn status_of(&self, participant_id: ParticipantId) -> LobbyResult<PlayerGameStatus> {
        let (tx, rx) = oneshot::channel();
        let msg = LobbyAction::GetStatus {
            respond_to: tx,
            participant_id,
        };
        self.execute(msg, rx).await
    }

    pub async fn info_text(&self) -> LobbyResult<String> {
        let (tx, rx) = oneshot::channel();
        self.execute(LobbyAction::GetInfoText { respond_to: tx }, rx)
            .await
    }

    pub async fn set_all_ready(&self, ready: bool) -> LobbyResult<()> {
        self.notify(LobbyAction::SetAllReady { ready }).await
    }

    /// Returns whether the countdown changed state.
    pub async fn set_paused(&self, paused: bool) -> LobbyResult<bool> {
        let (tx, rx) = oneshot::channel();
        let msg = LobbyAction::SetPaused {
            respond_to: tx,
            paused,
        };
        self.execute(msg, rx).await
    }

    /// Returns whether the countdown is paused afterwards.
    pub async fn toggle_pause(&self) -> LobbyResult<bool> {
        let (tx, rx) = oneshot::channel();
        self.execute(LobbyAction::TogglePause { respond_to: tx }, rx)
            .await
    }

    pub async fn set_min_players(&self, min_players: u32) -> LobbyResult<()> {
        self.notify(LobbyAction::SetMinPlayers { min_players }).await
    }

    pub async fn set_disallow_late_join(&self, disallowed: bool) -> LobbyResult<()> {
        self.notify(LobbyAction::SetDisallowLateJoin { disallowed })
            .await
    }

    pub async fn restart_round(&self) -> LobbyResult<()> {
        self.notify(LobbyAction::RestartRound).await
    }

    pub async fn end_round(&self) -> LobbyResult<()> {
        self.notify(LobbyAction::EndRound).await
    }
}

/// A single connection's membership in the lobby.
#[derive(Debug)]
pub struct LobbyHandle {
    pub(super) sender: mpsc::Sender<LobbyAction>,
    pub(super) participant_id: ParticipantId,
    pub(super) connection_id: ConnectionId,
}

impl LobbyHandle {
    pub fn participant_id(&self) -> ParticipantId {
        self.participant_id
    }

    async fn notify(&self, msg: LobbyAction) -> LobbyResult<()> {
        self.sender
            .send(msg)
            .await
            .map_err(|_| LobbyError::HandleInvalid)
    }

    pub async fn load_complete(&self) -> LobbyResult<()> {
        self.notify(LobbyAction::LoadComplete {
            participant_id: self.participant_id,
            connection_id: self.connection_id,
        })
        .await
    }

    pub async fn set_ready(&self, ready: bool) -> LobbyResult<()> {
        self.notify(LobbyAction::SetReady {
            participant_id: self.participant_id,
            connection_id: self.connection_id,
            ready,
        })
        .await
    }
}

impl Drop for LobbyHandle {
    fn drop(&mut self) {
        let tx = self.sender.clone();
        let msg = LobbyAction::Detach {
            participant_id: self.participant_id,
            connection_id: self.connection_id,
        };
        tokio::spawn(async move {
            if let Err(e) = tx.send(msg).await {
                tracing::warn!(%e, "Failed to detach participant from the lobby.");
            }
        });
    }
}
