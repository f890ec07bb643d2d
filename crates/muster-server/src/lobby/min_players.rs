/// What the lobby should do with its countdown after a readiness change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum GateVerdict {
    /// The gate is disabled and isn't holding the countdown.
    Idle,
    /// Too few participants are ready; `deficit` more are needed. `newly_held` is set only on
    /// the evaluation that started the hold.
    Hold { deficit: u32, newly_held: bool },
    Release,
}

/// Holds the round countdown until enough participants are ready.
///
/// Whether the gate wants the countdown held is tracked apart from whether the gate is the
/// reason the clock is paused, since an administrator may have paused it first.
#[derive(Debug, Default)]
pub struct MinPlayersGate {
    holding: bool,
    owns_pause: bool,
}

impl MinPlayersGate {
    /// `min_players == 0` disables the gate, releasing the countdown once if the gate paused
    /// it.
    pub fn evaluate(&mut self, min_players: u32, ready_count: usize) -> GateVerdict {
        if min_players == 0 {
            self.holding = false;
            return if std::mem::take(&mut self.owns_pause) {
                GateVerdict::Release
            } else {
                GateVerdict::Idle
            };
        }

        let ready = u32::try_from(ready_count).unwrap_or(u32::MAX);
        match min_players.checked_sub(ready) {
            Some(deficit) if deficit > 0 => GateVerdict::Hold {
                deficit,
                newly_held: !std::mem::replace(&mut self.holding, true),
            },
            _ => {
                self.reset();
                GateVerdict::Release
            }
        }
    }

    /// The clock was paused on behalf of the gate.
    pub fn pause_taken(&mut self) {
        self.owns_pause = true;
    }

    /// The clock resumed, whoever asked for it.
    pub fn pause_released(&mut self) {
        self.owns_pause = false;
    }

    pub fn reset(&mut self) {
        self.holding = false;
        self.owns_pause = false;
    }
}
