use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::lobby::preset::{self, GamePreset};

pub const DEFAULT_PORT: u16 = 42933;
/// Longest countdown `MUSTER_LOBBY_DURATION` accepts.
pub const MAX_LOBBY_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Unknown game preset '{0}'")]
    UnknownPreset(String),
}

/// Settings the lobby reads while running. Some of them can be changed at runtime through
/// [`crate::lobby::LobbyControl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbyConfig {
    /// Ready participants needed before the countdown runs. `0` disables the check.
    pub min_players: u32,
    pub lobby_duration: Duration,
    pub disallow_late_join: bool,
    pub preset: Option<&'static GamePreset>,
    pub songs: Vec<String>,
    pub backgrounds: Vec<String>,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            min_players: 0,
            lobby_duration: Duration::from_secs(150),
            disallow_late_join: false,
            preset: preset::find("extended"),
            songs: Vec::new(),
            backgrounds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// Names of the stations available this round.
    pub stations: Vec<String>,
    pub lobby: LobbyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            stations: Vec::new(),
            lobby: LobbyConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from `lookup`, falling back to defaults for unset keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(port) = parse(&lookup, "PORT")? {
            config.port = port;
        }
        if let Some(min_players) = parse(&lookup, "MUSTER_MIN_PLAYERS")? {
            config.lobby.min_players = min_players;
        }
        if let Some(secs) = parse(&lookup, "MUSTER_LOBBY_DURATION")? {
            let duration = Duration::from_secs(secs);
            if duration > MAX_LOBBY_DURATION {
                return Err(ConfigError::InvalidValue {
                    key: "MUSTER_LOBBY_DURATION",
                    value: secs.to_string(),
                });
            }
            config.lobby.lobby_duration = duration;
        }
        if let Some(disallowed) = parse(&lookup, "MUSTER_DISALLOW_LATE_JOIN")? {
            config.lobby.disallow_late_join = disallowed;
        }
        if let Some(id) = lookup("MUSTER_PRESET") {
            let id = id.trim();
            config.lobby.preset = match id {
                "" => None,
                id => Some(preset::find(id).ok_or_else(|| ConfigError::UnknownPreset(id.to_owned()))?),
            };
        }
        if let Some(list) = lookup("MUSTER_STATIONS") {
            config.stations = split_list(&list);
        }
        if let Some(list) = lookup("MUSTER_LOBBY_SONGS") {
            config.lobby.songs = split_list(&list);
        }
        if let Some(list) = lookup("MUSTER_LOBBY_BACKGROUNDS") {
            config.lobby.backgrounds = split_list(&list);
        }

        Ok(config)
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(None);
    };
    let parsed = value.trim().parse();
    match parsed {
        Ok(v) => Ok(Some(v)),
        Err(_) => Err(ConfigError::InvalidValue { key, value }),
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
