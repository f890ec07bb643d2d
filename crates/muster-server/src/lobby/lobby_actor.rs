use std::time::Duration;

use muster_lib::lobby::PlayerGameStatus;
use muster_lib::net::{Message, ProtocolError};
use muster_lib::{ConnectionId, ParticipantId};
use rand::{seq::SliceRandom, thread_rng};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::instrument;

use crate::config::LobbyConfig;

use super::min_players::{GateVerdict, MinPlayersGate};
use super::readiness::ReadinessTracker;
use super::round::{RoundClock, RunLevel};
use super::sessions::{Session, SessionRegistry};
use super::LobbyServices;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Owns all lobby state for the server. Every mutation arrives as a [`LobbyAction`] and is
/// applied one at a time, so readiness counts and the countdown can never be observed half
/// updated.
pub struct LobbyActor {
    receiver: mpsc::Receiver<LobbyAction>,
    pub(super) services: LobbyServices,
    pub(super) config: LobbyConfig,
    pub(super) sessions: SessionRegistry,
    pub(super) readiness: ReadinessTracker,
    pub(super) clock: RoundClock,
    pub(super) run_level: RunLevel,
    pub(super) round_id: u32,
    pub(super) media: LobbyMedia,
    gate: MinPlayersGate,
    preloading: bool,
}

/// Song and background shown to everyone waiting in the lobby.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LobbyMedia {
    pub song: Option<String>,
    pub background: Option<String>,
}

impl LobbyMedia {
    fn pick(config: &LobbyConfig) -> Self {
        let mut rng = thread_rng();
        Self {
            song: config.songs.choose(&mut rng).cloned(),
            background: config.backgrounds.choose(&mut rng).cloned(),
        }
    }
}

#[derive(Debug)]
pub enum LobbyAction {
    Join {
        participant_id: ParticipantId,
        connection_id: ConnectionId,
        outbound: mpsc::Sender<Message>,
    },
    Detach {
        participant_id: ParticipantId,
        connection_id: ConnectionId,
    },
    LoadComplete {
        participant_id: ParticipantId,
        connection_id: ConnectionId,
    },
    SetReady {
        participant_id: ParticipantId,
        connection_id: ConnectionId,
        ready: bool,
    },
    SetAllReady {
        ready: bool,
    },
    GetStatus {
        respond_to: oneshot::Sender<PlayerGameStatus>,
        participant_id: ParticipantId,
    },
    GetInfoText {
        respond_to: oneshot::Sender<String>,
    },
    SetPaused {
        respond_to: oneshot::Sender<bool>,
        paused: bool,
    },
    TogglePause {
        respond_to: oneshot::Sender<bool>,
    },
    SetMinPlayers {
        min_players: u32,
    },
    SetDisallowLateJoin {
        disallowed: bool,
    },
    RestartRound,
    EndRound,
}

impl LobbyActor {
    pub fn new(
        receiver: mpsc::Receiver<LobbyAction>,
        config: LobbyConfig,
        services: LobbyServices,
    ) -> Self {
        let clock = RoundClock::new(services.timing.now().saturating_add(config.lobby_duration));
        let media = LobbyMedia::pick(&config);

        Self {
            receiver,
            services,
            config,
            sessions: SessionRegistry::default(),
            readiness: ReadinessTracker::default(),
            clock,
            run_level: RunLevel::PreRoundLobby,
            round_id: 1,
            media,
            gate: MinPlayersGate::default(),
            preloading: false,
        }
    }

    #[instrument(skip_all)]
    pub async fn run(mut self) {
        tracing::info!("Lobby opened");
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                msg = self.receiver.recv() => match msg {
                    Some(msg) => self.handle(msg),
                    None => break,
                },
                _ = ticker.tick() => self.update(),
            }
        }

        tracing::info!("Closing lobby");
    }

    fn handle(&mut self, msg: LobbyAction) {
        match msg {
            LobbyAction::Join {
                participant_id,
                connection_id,
                outbound,
            } => self.join(participant_id, connection_id, outbound),
            LobbyAction::Detach {
                participant_id,
                connection_id,
            } => self.detach(participant_id, connection_id),
            LobbyAction::LoadComplete {
                participant_id,
                connection_id,
            } => self.load_complete(participant_id, connection_id),
            LobbyAction::SetReady {
                participant_id,
                connection_id,
                ready,
            } => self.set_ready(participant_id, connection_id, ready),
            LobbyAction::SetAllReady { ready } => self.set_all_ready(ready),
            LobbyAction::GetStatus {
                respond_to,
                participant_id,
            } => {
                let _ = respond_to.send(self.readiness.status(participant_id));
            }
            LobbyAction::GetInfoText { respond_to } => {
                let _ = respond_to.send(self.info_text());
            }
            LobbyAction::SetPaused { respond_to, paused } => {
                let _ = respond_to.send(self.set_paused(paused));
            }
            LobbyAction::TogglePause { respond_to } => {
                let _ = respond_to.send(self.toggle_pause());
            }
            LobbyAction::SetMinPlayers { min_players } => self.set_min_players(min_players),
            LobbyAction::SetDisallowLateJoin { disallowed } => {
                self.set_disallow_late_join(disallowed)
            }
            LobbyAction::RestartRound => self.restart_round(),
            LobbyAction::EndRound => self.end_round(),
        }
    }

    /// Advance the countdown, starting the round once its scheduled instant has passed.
    fn update(&mut self) {
        if self.run_level != RunLevel::PreRoundLobby || self.clock.paused() {
            return;
        }

        let now = self.services.timing.now();
        if !self.preloading && now >= self.clock.preload_at() {
            self.preloading = true;
            tracing::info!(round_id = self.round_id, "Preloading round");
        }
        if now >= self.clock.scheduled_start() {
            self.start_round();
        }
    }
}

// ----------------------------------------------------------------------------
// Participant events
// ----------------------------------------------------------------------------
impl LobbyActor {
    #[instrument(skip(self, outbound))]
    fn join(
        &mut self,
        participant_id: ParticipantId,
        connection_id: ConnectionId,
        outbound: mpsc::Sender<Message>,
    ) {
        let session = Session::new(connection_id, outbound);
        if let Some(previous) = self.sessions.attach(participant_id, session) {
            tracing::info!(previous = %previous.connection_id, "Replacing previous connection");
            previous.close_with(ProtocolError::Message(
                "Logged in from another connection".to_owned(),
            ));
        }

        if self.run_level == RunLevel::PreRoundLobby {
            self.readiness.enter(participant_id);
        }
        tracing::info!("Participant joined lobby");

        self.send_status_to_one(participant_id);
        self.deliver(
            participant_id,
            Message::LateJoinStatus {
                disallowed: self.config.disallow_late_join,
            },
        );
        self.send_info_to_all();
        self.check_min_players();
    }

    /// The participant's readiness entry is kept; only their connection goes away.
    #[instrument(skip(self))]
    fn detach(&mut self, participant_id: ParticipantId, connection_id: ConnectionId) {
        if !self.sessions.detach(participant_id, connection_id) {
            tracing::debug!("Ignoring detach for a connection that was already replaced");
            return;
        }
        tracing::info!("Participant left lobby");

        self.send_info_to_all();
        self.check_min_players();
    }

    #[instrument(skip(self))]
    fn load_complete(&mut self, participant_id: ParticipantId, connection_id: ConnectionId) {
        if self.sessions.mark_loaded(participant_id, connection_id) {
            tracing::debug!("Participant finished loading");
        } else {
            tracing::debug!("Ignoring load completion from a replaced connection");
        }
    }

    #[instrument(skip(self))]
    fn set_ready(
        &mut self,
        participant_id: ParticipantId,
        connection_id: ConnectionId,
        ready: bool,
    ) {
        if !self.readiness.contains(participant_id) {
            tracing::debug!("Ignoring readiness for a participant not in the lobby");
            return;
        }
        if !self.sessions.is_current(participant_id, connection_id) {
            tracing::debug!("Ignoring readiness from a replaced connection");
            return;
        }
        if !self.sessions.is_load_complete(participant_id) {
            tracing::debug!("Ignoring readiness before loading finished");
            return;
        }
        if self.run_level != RunLevel::PreRoundLobby {
            return;
        }

        self.readiness.set(participant_id, ready.into());
        tracing::info!(
            "Participant is {}ready to play",
            if ready { "" } else { "not " }
        );

        self.send_status_to_one(participant_id);
        // Ready count changed
        self.send_info_to_all();
        self.check_min_players();
    }
}

// ----------------------------------------------------------------------------
// Administration
// ----------------------------------------------------------------------------
impl LobbyActor {
    #[instrument(skip(self))]
    fn set_all_ready(&mut self, ready: bool) {
        if self.run_level != RunLevel::PreRoundLobby {
            return;
        }

        self.readiness.set_all(ready.into());
        tracing::info!("Set every participant's readiness");
        for id in self.readiness.participants() {
            // Disconnected participants stay in the map, they just can't be told
            if self.sessions.is_connected(id) {
                self.send_status_to_one(id);
            }
        }
    }

    /// Returns whether the countdown actually changed state.
    #[instrument(skip(self))]
    fn set_paused(&mut self, paused: bool) -> bool {
        if self.run_level != RunLevel::PreRoundLobby {
            return false;
        }

        let now = self.services.timing.now();
        if !self
            .clock
            .set_paused(paused, now, self.config.lobby_duration)
        {
            return false;
        }
        if !paused {
            self.preloading = false;
            self.gate.pause_released();
        }
        tracing::info!(
            scheduled_start = ?self.clock.scheduled_start(),
            "Round start {}",
            if paused { "paused" } else { "resumed" }
        );

        self.send_countdown_to_all();
        self.announce(
            if paused {
                "lobby-pause-start"
            } else {
                "lobby-pause-start-resumed"
            },
            &[],
        );
        true
    }

    fn toggle_pause(&mut self) -> bool {
        self.set_paused(!self.clock.paused());
        self.clock.paused()
    }

    #[instrument(skip(self))]
    fn set_min_players(&mut self, min_players: u32) {
        self.config.min_players = min_players;
        tracing::info!("Updated minimum player count");
        self.check_min_players();
    }

    #[instrument(skip(self))]
    fn set_disallow_late_join(&mut self, disallowed: bool) {
        self.config.disallow_late_join = disallowed;
        self.send_late_join_status(disallowed);
    }

    /// Hold or release the countdown depending on how many participants are ready.
    fn check_min_players(&mut self) {
        if self.run_level != RunLevel::PreRoundLobby {
            return;
        }

        let verdict = self
            .gate
            .evaluate(self.config.min_players, self.readiness.ready_count());
        match verdict {
            GateVerdict::Idle => {}
            GateVerdict::Hold {
                deficit,
                newly_held,
            } => {
                let paused = self.set_paused(true);
                if paused {
                    self.gate.pause_taken();
                }
                if paused || newly_held {
                    self.announce("lobby-min-players-required", &[("count", deficit.into())]);
                }
            }
            GateVerdict::Release => {
                self.set_paused(false);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Round lifecycle
// ----------------------------------------------------------------------------
impl LobbyActor {
    #[instrument(skip(self), fields(round_id = self.round_id))]
    fn start_round(&mut self) {
        let ready = self.readiness.ready_count();
        self.run_level = RunLevel::InRound;
        self.readiness.clear();
        tracing::info!(ready, players = self.sessions.len(), "Round started");

        self.send_status_to_all();
        self.send_info_to_all();
    }

    #[instrument(skip(self), fields(round_id = self.round_id))]
    fn end_round(&mut self) {
        if self.run_level != RunLevel::InRound {
            tracing::warn!("Attempted to end a round that isn't running");
            return;
        }
        self.run_level = RunLevel::PostRound;
        tracing::info!("Round ended");
        self.send_info_to_all();
    }

    /// Go back to the lobby with a fresh countdown. Readiness entries of participants that
    /// are no longer connected are dropped here.
    fn restart_round(&mut self) {
        self.round_id += 1;
        self.run_level = RunLevel::PreRoundLobby;
        self.media = LobbyMedia::pick(&self.config);
        self.readiness.reset(self.sessions.participants());
        self.clock = RoundClock::new(
            self.services
                .timing
                .now()
                .saturating_add(self.config.lobby_duration),
        );
        self.gate.reset();
        self.preloading = false;
        tracing::info!(round_id = self.round_id, "Restarted round");

        self.send_status_to_all();
        self.send_info_to_all();
        self.check_min_players();
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use muster_lib::lobby::{LobbyStatus, PlayerGameStatus};
    use muster_lib::net::{Message, ProtocolError};
    use tokio::{sync::mpsc, time::timeout};

    use super::LobbyActor;
    use crate::config::LobbyConfig;
    use crate::lobby::{
        localization::Catalog,
        round::{RunLevel, PRELOAD_LEAD},
        stations::StationList,
        timing::ManualTiming,
        LobbyServices,
    };

    const LOBBY: Duration = Duration::from_secs(60);

    fn config(min_players: u32) -> LobbyConfig {
        LobbyConfig {
            min_players,
            lobby_duration: LOBBY,
            ..Default::default()
        }
    }

    fn services(timing: &ManualTiming) -> LobbyServices {
        LobbyServices::new(
            StationList::from_names(["Bagel"]),
            Catalog::english(),
            timing.clone(),
        )
    }

    fn setup(config: LobbyConfig) -> (LobbyActor, ManualTiming) {
        let (_, rx) = mpsc::channel(2);
        let timing = ManualTiming::default();
        (LobbyActor::new(rx, config, services(&timing)), timing)
    }

    /// Join as a participant whose connection id matches their participant id and who has
    /// finished loading.
    fn connect(lobby: &mut LobbyActor, id: u32) -> mpsc::Receiver<Message> {
        let (tx, rx) = mpsc::channel(64);
        lobby.join(id.into(), id.into(), tx);
        lobby.load_complete(id.into(), id.into());
        rx
    }

    fn drain(rx: &mut mpsc::Receiver<Message>) -> Vec<Message> {
        let mut msgs = Vec::new();
        while let Ok(m) = rx.try_recv() {
            msgs.push(m);
        }
        msgs
    }

    fn snapshots(msgs: &[Message]) -> Vec<&LobbyStatus> {
        msgs.iter()
            .filter_map(|m| match m {
                Message::StatusSnapshot(s) => Some(s),
                _ => None,
            })
            .collect()
    }

    fn announcements(msgs: &[Message]) -> Vec<&str> {
        msgs.iter()
            .filter_map(|m| match m {
                Message::Announcement { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn countdowns(msgs: &[Message]) -> Vec<(Duration, bool)> {
        msgs.iter()
            .filter_map(|m| match *m {
                Message::CountdownUpdate {
                    scheduled_start,
                    paused,
                } => Some((scheduled_start, paused)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn join_sends_status_and_info() {
        let (mut lobby, _) = setup(config(0));
        let mut rx = connect(&mut lobby, 0);

        let msgs = drain(&mut rx);
        assert_eq!(
            snapshots(&msgs),
            [&LobbyStatus {
                lobby_active: true,
                song: None,
                background: None,
                self_ready: false,
                scheduled_start: LOBBY,
                preload_lead: PRELOAD_LEAD,
                paused: false,
            }]
        );
        assert!(msgs.contains(&Message::LateJoinStatus { disallowed: false }));
        assert!(msgs.iter().any(|m| matches!(
            m,
            Message::InfoText { text } if text.contains("Players: 1") && text.contains("Bagel")
        )));
        assert_eq!(lobby.readiness.status(0.into()), PlayerGameStatus::NotReady);
    }

    #[test]
    fn lobby_media_comes_from_config() {
        let (mut lobby, _) = setup(LobbyConfig {
            songs: vec!["title.ogg".to_owned()],
            backgrounds: vec!["nebula.png".to_owned()],
            ..config(0)
        });
        let mut rx = connect(&mut lobby, 0);

        let msgs = drain(&mut rx);
        let status = snapshots(&msgs)[0];
        assert_eq!(status.song.as_deref(), Some("title.ogg"));
        assert_eq!(status.background.as_deref(), Some("nebula.png"));
    }

    #[test]
    fn set_ready_ignores_unknown_participants() {
        let (mut lobby, _) = setup(config(0));
        let mut rx = connect(&mut lobby, 0);
        drain(&mut rx);

        lobby.set_ready(1337.into(), 1337.into(), true);
        assert_eq!(lobby.readiness.len(), 1);
        assert_eq!(lobby.readiness.ready_count(), 0);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn set_ready_waits_for_loading() {
        let (mut lobby, _) = setup(config(0));
        let (tx, mut rx) = mpsc::channel(64);
        lobby.join(0.into(), 0.into(), tx);
        drain(&mut rx);

        lobby.set_ready(0.into(), 0.into(), true);
        assert_eq!(lobby.readiness.status(0.into()), PlayerGameStatus::NotReady);
        assert!(drain(&mut rx).is_empty());

        lobby.load_complete(0.into(), 0.into());
        lobby.set_ready(0.into(), 0.into(), true);
        assert_eq!(
            lobby.readiness.status(0.into()),
            PlayerGameStatus::ReadyToPlay
        );
    }

    #[test]
    fn set_ready_outside_lobby_is_ignored() {
        let (mut lobby, _) = setup(config(0));
        let mut rx = connect(&mut lobby, 0);
        drain(&mut rx);

        lobby.run_level = RunLevel::InRound;
        lobby.set_ready(0.into(), 0.into(), true);
        assert_eq!(lobby.readiness.status(0.into()), PlayerGameStatus::NotReady);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn set_ready_personalizes_status() {
        let (mut lobby, _) = setup(config(0));
        let mut rx0 = connect(&mut lobby, 0);
        let mut rx1 = connect(&mut lobby, 1);
        drain(&mut rx0);
        drain(&mut rx1);

        lobby.set_ready(0.into(), 0.into(), true);

        let msgs0 = drain(&mut rx0);
        assert_eq!(snapshots(&msgs0).len(), 1);
        assert!(snapshots(&msgs0)[0].self_ready);
        assert!(msgs0.iter().any(|m| matches!(
            m,
            Message::InfoText { text } if text.contains("Ready: 1")
        )));

        // Everyone else only learns the new ready count
        let msgs1 = drain(&mut rx1);
        assert!(snapshots(&msgs1).is_empty());
        assert_eq!(msgs1.len(), 1);
        assert!(matches!(msgs1[0], Message::InfoText { .. }));
    }

    #[test]
    fn set_paused_twice() {
        let (mut lobby, timing) = setup(config(0));
        let mut rx = connect(&mut lobby, 0);
        drain(&mut rx);
        let start = lobby.clock.scheduled_start();

        timing.advance(Duration::from_secs(10));
        assert!(lobby.set_paused(true));
        timing.advance(Duration::from_secs(10));
        assert!(!lobby.set_paused(true));
        assert_eq!(lobby.clock.scheduled_start(), start);

        let msgs = drain(&mut rx);
        assert_eq!(countdowns(&msgs), [(start, true)]);
        assert_eq!(announcements(&msgs), ["Round start has been paused."]);
    }

    #[test]
    fn resume_restarts_lobby_duration() {
        let (mut lobby, timing) = setup(config(0));
        let mut rx = connect(&mut lobby, 0);

        lobby.set_paused(true);
        timing.advance(Duration::from_secs(500));
        drain(&mut rx);

        assert!(lobby.set_paused(false));
        let expected = Duration::from_secs(500) + LOBBY;
        assert_eq!(lobby.clock.scheduled_start(), expected);

        let msgs = drain(&mut rx);
        assert_eq!(countdowns(&msgs), [(expected, false)]);
        assert_eq!(
            announcements(&msgs),
            ["Round start countdown is now resumed."]
        );
    }

    #[test]
    fn toggle_pause() {
        let (mut lobby, _) = setup(config(0));
        assert!(lobby.toggle_pause());
        assert!(lobby.clock.paused());
        assert!(!lobby.toggle_pause());
        assert!(!lobby.clock.paused());
    }

    #[test]
    fn pausing_outside_lobby_is_ignored() {
        let (mut lobby, _) = setup(config(0));
        lobby.run_level = RunLevel::InRound;
        assert!(!lobby.set_paused(true));
        assert!(!lobby.clock.paused());
    }

    #[test]
    fn deficit_is_announced() {
        let (mut lobby, _) = setup(config(0));
        let mut rxs: Vec<_> = (0..3).map(|i| connect(&mut lobby, i)).collect();
        lobby.set_ready(0.into(), 0.into(), true);
        rxs.iter_mut().for_each(|rx| {
            drain(rx);
        });

        lobby.set_min_players(3);
        assert!(lobby.clock.paused());

        for rx in &mut rxs {
            let msgs = drain(rx);
            let texts = announcements(&msgs);
            assert_eq!(texts.len(), 2);
            assert!(texts[1].contains('2'));
            assert_eq!(countdowns(&msgs).len(), 1);
        }
    }

    #[test]
    fn repeated_evaluation_is_quiet() {
        let (mut lobby, _) = setup(config(3));
        let mut rx = connect(&mut lobby, 0);
        assert!(lobby.clock.paused());
        drain(&mut rx);

        lobby.check_min_players();
        lobby.check_min_players();
        assert!(drain(&mut rx).is_empty());

        // Still short, just by less. No new announcement either.
        connect(&mut lobby, 1);
        lobby.set_ready(0.into(), 0.into(), true);
        let msgs = drain(&mut rx);
        assert!(announcements(&msgs).is_empty());
        assert!(countdowns(&msgs).is_empty());
    }

    #[test]
    fn disabling_gate_releases_hold() {
        let (mut lobby, _) = setup(config(2));
        let _rx = connect(&mut lobby, 0);
        assert!(lobby.clock.paused());

        lobby.set_min_players(0);
        assert!(!lobby.clock.paused());
    }

    #[test]
    fn disabled_gate_leaves_manual_pause_alone() {
        let (mut lobby, _) = setup(config(0));
        let _rx = connect(&mut lobby, 0);
        lobby.set_paused(true);

        lobby.set_min_players(0);
        assert!(lobby.clock.paused());
    }

    #[test]
    fn disabled_gate_keeps_manual_pause_it_held_over() {
        let (mut lobby, _) = setup(config(0));
        let _rx = connect(&mut lobby, 0);
        lobby.set_paused(true);

        lobby.set_min_players(3);
        lobby.set_min_players(0);
        assert!(lobby.clock.paused());
    }

    #[test]
    fn first_hold_is_announced_during_manual_pause() {
        let (mut lobby, _) = setup(config(0));
        let mut rx = connect(&mut lobby, 0);
        lobby.set_paused(true);
        drain(&mut rx);

        lobby.set_min_players(3);
        let msgs = drain(&mut rx);
        let texts = announcements(&msgs);
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("At least 3 more"));
        assert!(countdowns(&msgs).is_empty());

        lobby.check_min_players();
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn gate_pause_released_by_admin_is_not_the_gates_anymore() {
        let (mut lobby, _) = setup(config(2));
        let _rx = connect(&mut lobby, 0);
        assert!(lobby.clock.paused());

        lobby.set_paused(false);
        lobby.config.min_players = 0;
        lobby.set_paused(true);
        lobby.check_min_players();
        assert!(lobby.clock.paused());
    }

    #[test]
    fn replaced_connection_is_ignored() {
        let (mut lobby, _) = setup(config(0));
        let _old_rx = connect(&mut lobby, 0);
        let (tx, mut new_rx) = mpsc::channel(64);
        lobby.join(0.into(), 7.into(), tx);
        drain(&mut new_rx);

        lobby.load_complete(0.into(), 0.into());
        assert!(!lobby.sessions.is_load_complete(0.into()));

        lobby.load_complete(0.into(), 7.into());
        lobby.set_ready(0.into(), 0.into(), true);
        assert_eq!(lobby.readiness.status(0.into()), PlayerGameStatus::NotReady);
        assert!(drain(&mut new_rx).is_empty());

        lobby.set_ready(0.into(), 7.into(), true);
        assert_eq!(
            lobby.readiness.status(0.into()),
            PlayerGameStatus::ReadyToPlay
        );
    }

    #[test]
    fn huge_lobby_duration_saturates() {
        let (mut lobby, timing) = setup(LobbyConfig {
            lobby_duration: Duration::MAX,
            ..config(0)
        });
        assert_eq!(lobby.clock.scheduled_start(), Duration::MAX);

        lobby.set_paused(true);
        timing.advance(Duration::from_secs(1));
        assert!(lobby.set_paused(false));
        assert_eq!(lobby.clock.scheduled_start(), Duration::MAX);

        lobby.restart_round();
        assert_eq!(lobby.clock.scheduled_start(), Duration::MAX);
    }

    #[test]
    fn set_all_ready() {
        let (mut lobby, _) = setup(config(0));
        let mut rx0 = connect(&mut lobby, 0);
        let mut rx1 = connect(&mut lobby, 1);
        let mut rx2 = connect(&mut lobby, 2);
        lobby.detach(2.into(), 2.into());
        drain(&mut rx0);
        drain(&mut rx1);
        drain(&mut rx2);

        lobby.set_all_ready(true);

        assert_eq!(lobby.readiness.ready_count(), 3);
        for rx in [&mut rx0, &mut rx1] {
            let msgs = drain(rx);
            assert_eq!(snapshots(&msgs).len(), 1);
            assert!(snapshots(&msgs)[0].self_ready);
        }
        assert!(drain(&mut rx2).is_empty());
    }

    #[test]
    fn detach_keeps_readiness() {
        let (mut lobby, _) = setup(config(0));
        let mut rx1 = connect(&mut lobby, 1);
        let _rx0 = connect(&mut lobby, 0);
        lobby.set_ready(0.into(), 0.into(), true);
        drain(&mut rx1);

        lobby.detach(0.into(), 0.into());
        assert!(!lobby.sessions.is_connected(0.into()));
        assert_eq!(
            lobby.readiness.status(0.into()),
            PlayerGameStatus::ReadyToPlay
        );
        assert!(drain(&mut rx1).iter().any(|m| matches!(
            m,
            Message::InfoText { text } if text.contains("Players: 1") && text.contains("Ready: 1")
        )));
    }

    #[test]
    fn reconnect_replaces_session() {
        let (mut lobby, _) = setup(config(0));
        let mut old_rx = connect(&mut lobby, 0);
        drain(&mut old_rx);

        let (tx, _new_rx) = mpsc::channel(64);
        lobby.join(0.into(), 7.into(), tx);
        assert!(drain(&mut old_rx).iter().any(|m| matches!(
            m,
            Message::Error {
                error: ProtocolError::Message(_)
            }
        )));

        // The old connection closing doesn't disconnect the new one
        lobby.detach(0.into(), 0.into());
        assert!(lobby.sessions.is_connected(0.into()));
    }

    #[test]
    fn min_players_scenario() {
        let (mut lobby, timing) = setup(config(2));
        let mut rxs: Vec<_> = (0..3).map(|i| connect(&mut lobby, i)).collect();

        assert!(lobby.clock.paused());
        let first = drain(&mut rxs[0]);
        assert!(announcements(&first)
            .iter()
            .any(|t| t.contains("At least 2 more")));
        rxs.iter_mut().skip(1).for_each(|rx| {
            drain(rx);
        });

        timing.advance(Duration::from_secs(42));
        lobby.set_ready(0.into(), 0.into(), true);
        assert!(lobby.clock.paused());
        lobby.set_ready(1.into(), 1.into(), true);
        assert!(!lobby.clock.paused());

        let expected = Duration::from_secs(42) + LOBBY;
        assert_eq!(lobby.clock.scheduled_start(), expected);
        for rx in &mut rxs {
            assert_eq!(countdowns(&drain(rx)), [(expected, false)]);
        }
    }

    #[test]
    fn countdown_starts_round() {
        let (mut lobby, timing) = setup(config(0));
        let mut rx = connect(&mut lobby, 0);
        lobby.set_ready(0.into(), 0.into(), true);

        timing.advance(LOBBY - Duration::from_secs(1));
        lobby.update();
        assert!(lobby.preloading);
        assert_eq!(lobby.run_level, RunLevel::PreRoundLobby);
        drain(&mut rx);

        timing.advance(Duration::from_secs(1));
        lobby.update();
        assert_eq!(lobby.run_level, RunLevel::InRound);
        assert_eq!(lobby.readiness.len(), 0);

        let msgs = drain(&mut rx);
        assert!(!snapshots(&msgs)[0].lobby_active);
        assert!(msgs.iter().any(|m| matches!(
            m,
            Message::InfoText { text } if text.starts_with("Round #1 is in progress.")
        )));
    }

    #[test]
    fn paused_countdown_never_starts_round() {
        let (mut lobby, timing) = setup(config(0));
        lobby.set_paused(true);

        timing.advance(LOBBY * 10);
        lobby.update();
        assert_eq!(lobby.run_level, RunLevel::PreRoundLobby);
        assert!(!lobby.preloading);
    }

    #[test]
    fn restart_round() {
        let (mut lobby, timing) = setup(config(0));
        let _rx0 = connect(&mut lobby, 0);
        let rx1 = connect(&mut lobby, 1);
        drop(rx1);
        lobby.detach(1.into(), 1.into());
        lobby.set_paused(true);

        lobby.run_level = RunLevel::InRound;
        lobby.end_round();
        assert_eq!(lobby.run_level, RunLevel::PostRound);

        timing.advance(Duration::from_secs(300));
        lobby.restart_round();

        assert_eq!(lobby.run_level, RunLevel::PreRoundLobby);
        assert_eq!(lobby.round_id, 2);
        assert!(lobby.readiness.contains(0.into()));
        // Stale entries don't survive into the next lobby
        assert!(!lobby.readiness.contains(1.into()));
        assert!(!lobby.clock.paused());
        assert_eq!(
            lobby.clock.scheduled_start(),
            Duration::from_secs(300) + LOBBY
        );
    }

    #[test]
    fn late_join_status_goes_to_everyone() {
        let (mut lobby, _) = setup(config(0));
        let mut rx0 = connect(&mut lobby, 0);
        let mut rx1 = connect(&mut lobby, 1);
        drain(&mut rx0);
        drain(&mut rx1);

        lobby.set_disallow_late_join(true);
        assert!(lobby.config.disallow_late_join);
        for rx in [&mut rx0, &mut rx1] {
            assert_eq!(drain(rx), [Message::LateJoinStatus { disallowed: true }]);
        }
    }

    #[tokio::test]
    async fn lobby_dies() {
        let timing = ManualTiming::default();

        // The lobby will run for as long as senders remain
        {
            let (tx, rx) = mpsc::channel(2);
            let actor = LobbyActor::new(rx, config(0), services(&timing));
            timeout(Duration::from_millis(50), actor.run())
                .await
                .expect_err("Lobby closed with senders still remaining");
            drop(tx);
        }

        // The lobby will die when the last sender is dropped
        {
            let (tx, rx) = mpsc::channel(2);
            let actor = LobbyActor::new(rx, config(0), services(&timing));
            drop(tx);
            timeout(Duration::from_millis(50), actor.run())
                .await
                .expect("Lobby failed to close");
        }
    }
}
