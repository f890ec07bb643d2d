use std::time::Duration;

/// How long before the scheduled start the round's maps begin loading.
pub const PRELOAD_LEAD: Duration = Duration::from_secs(15);

/// Phase of the round lifecycle. Lobby operations only have an effect in
/// [`RunLevel::PreRoundLobby`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunLevel {
    PreRoundLobby,
    InRound,
    PostRound,
}

/// Countdown to the start of the next round.
///
/// While paused the scheduled start is frozen. Resuming always restarts the full lobby
/// duration from the moment of resuming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundClock {
    scheduled_start: Duration,
    paused: bool,
}

impl RoundClock {
    pub fn new(scheduled_start: Duration) -> Self {
        Self {
            scheduled_start,
            paused: false,
        }
    }

    pub fn scheduled_start(&self) -> Duration {
        self.scheduled_start
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn preload_lead(&self) -> Duration {
        PRELOAD_LEAD
    }

    /// Instant at which the round should begin preloading.
    pub fn preload_at(&self) -> Duration {
        self.scheduled_start.saturating_sub(PRELOAD_LEAD)
    }

    /// Returns `false` without touching anything if the clock is already in the requested state.
    pub fn set_paused(&mut self, paused: bool, now: Duration, lobby_duration: Duration) -> bool {
        if self.paused == paused {
            return false;
        }

        self.paused = paused;
        if !paused {
            self.scheduled_start = now.saturating_add(lobby_duration);
        }
        true
    }
}
