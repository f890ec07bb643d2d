use super::localization::Localizer;
use super::preset::GamePreset;
use super::round::RunLevel;

/// A simulated entity as far as the lobby cares about it.
///
/// Only entities that host jobs, host spawn points *and* carry descriptive metadata count as
/// stations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationEntity {
    pub hosts_jobs: bool,
    pub hosts_spawning: bool,
    /// Display name from the entity's metadata, if it has any.
    pub metadata: Option<String>,
}

impl StationEntity {
    pub fn station(name: impl Into<String>) -> Self {
        Self {
            hosts_jobs: true,
            hosts_spawning: true,
            metadata: Some(name.into()),
        }
    }
}

/// Query over the simulation yielding the display names of all stations.
pub trait StationQuery: Send {
    /// Names in the order the simulation enumerates them.
    fn station_names(&self) -> Vec<String>;
}

/// Fixed set of entities, enumerated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct StationList {
    entities: Vec<StationEntity>,
}

impl StationList {
    pub fn new(entities: Vec<StationEntity>) -> Self {
        Self { entities }
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(names.into_iter().map(|n| StationEntity::station(n)).collect())
    }
}

impl StationQuery for StationList {
    fn station_names(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter(|e| e.hosts_jobs && e.hosts_spawning)
            .filter_map(|e| e.metadata.clone())
            .collect()
    }
}

/// One station name per line, or the localized placeholder if there are none.
pub fn station_summary(stations: &dyn StationQuery, loc: &dyn Localizer) -> String {
    let names = stations.station_names();
    if names.is_empty() {
        return loc.get_string("lobby-no-station-selected", &[]);
    }
    names.join("\n")
}

/// Everything the lobby info text is composed from.
#[derive(Debug, Clone, Copy)]
pub struct InfoContext<'a> {
    pub run_level: RunLevel,
    pub round_id: u32,
    pub player_count: usize,
    pub ready_count: usize,
    pub preset: Option<&'a GamePreset>,
}

/// Text shown in every participant's lobby info panel. Empty while no preset is selected.
pub fn info_text(ctx: InfoContext<'_>, stations: &dyn StationQuery, loc: &dyn Localizer) -> String {
    let Some(preset) = ctx.preset else {
        return String::new();
    };

    let key = match ctx.run_level {
        RunLevel::PreRoundLobby => "lobby-info-preround-text",
        RunLevel::InRound | RunLevel::PostRound => "lobby-info-text",
    };
    loc.get_string(
        key,
        &[
            ("roundId", ctx.round_id.into()),
            ("playerCount", ctx.player_count.into()),
            ("readyCount", ctx.ready_count.into()),
            ("stationNames", station_summary(stations, loc).into()),
            ("gmTitle", loc.get_string(preset.mode_title, &[]).into()),
            ("desc", loc.get_string(preset.description, &[]).into()),
        ],
    )
}
