use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::LobbyConfig;

use self::{
    lobby_actor::LobbyActor, localization::Localizer, stations::StationQuery, timing::GameTiming,
};

mod broadcast;
mod lobby_actor;
pub mod lobby_handle;
pub mod localization;
mod min_players;
pub mod preset;
mod readiness;
pub mod round;
mod sessions;
pub mod stations;
pub mod timing;

pub use lobby_handle::{LobbyControl, LobbyHandle};

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum LobbyError {
    #[error("The Lobby Handle is no longer connected to a lobby.")]
    HandleInvalid,
}

pub type LobbyResult<T> = Result<T, LobbyError>;

/// Collaborators the lobby consults but doesn't own the state of.
pub struct LobbyServices {
    pub stations: Box<dyn StationQuery>,
    pub localizer: Box<dyn Localizer>,
    pub timing: Box<dyn GameTiming>,
}

impl LobbyServices {
    pub fn new(
        stations: impl StationQuery + 'static,
        localizer: impl Localizer + 'static,
        timing: impl GameTiming + 'static,
    ) -> Self {
        Self {
            stations: Box::new(stations),
            localizer: Box::new(localizer),
            timing: Box::new(timing),
        }
    }
}

/// Spawn the lobby actor for this server and return the control handle used to reach it.
///
/// The actor lives until every [`LobbyControl`] and [`LobbyHandle`] has been dropped.
pub fn start_lobby(config: LobbyConfig, services: LobbyServices) -> LobbyControl {
    let (sender, receiver) = mpsc::channel(64);
    let actor = LobbyActor::new(receiver, config, services);
    tokio::spawn(actor.run());

    LobbyControl { sender }
}
