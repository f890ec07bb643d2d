//! Message catalogue for everything the lobby says to participants.
//!
//! Templates reference named arguments as `{ $name }`.

use std::collections::HashMap;
use std::fmt::{self, Display, Write};

/// A named argument substituted into a localized template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocArg {
    Text(String),
    Number(i64),
}

impl Display for LocArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocArg::Text(t) => f.write_str(t),
            LocArg::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for LocArg {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for LocArg {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<u32> for LocArg {
    fn from(v: u32) -> Self {
        Self::Number(v.into())
    }
}

impl From<usize> for LocArg {
    fn from(v: usize) -> Self {
        Self::Number(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

/// Resolves a message key and its arguments to display text.
pub trait Localizer: Send {
    fn get_string(&self, key: &str, args: &[(&str, LocArg)]) -> String;
}

/// In-memory catalogue. Unknown keys resolve to the key itself so missing strings are
/// visible rather than silently empty.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    messages: HashMap<String, String>,
}

const EN_US: &[(&str, &str)] = &[
    ("lobby-no-station-selected", "No station selected"),
    (
        "lobby-info-preround-text",
        "Round #{ $roundId }\nPlayers: { $playerCount }\nReady: { $readyCount }\nStations:\n{ $stationNames }\nMode: { $gmTitle }\n{ $desc }",
    ),
    (
        "lobby-info-text",
        "Round #{ $roundId } is in progress.\nPlayers: { $playerCount }\nStations:\n{ $stationNames }\nMode: { $gmTitle }\n{ $desc }",
    ),
    ("lobby-pause-start", "Round start has been paused."),
    (
        "lobby-pause-start-resumed",
        "Round start countdown is now resumed.",
    ),
    (
        "lobby-min-players-required",
        "At least { $count } more readied players are required to start the round.",
    ),
    ("preset-extended-title", "Extended"),
    (
        "preset-extended-description",
        "No antagonists, just the crew and whatever the shift brings.",
    ),
    ("preset-secret-title", "Secret"),
    (
        "preset-secret-description",
        "The game mode is hidden until the round ends.",
    ),
    ("preset-survival-title", "Survival"),
    (
        "preset-survival-description",
        "Random events keep coming. Keep the station running for as long as you can.",
    ),
];

impl Catalog {
    pub fn english() -> Self {
        EN_US.iter().copied().collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Catalog {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            messages: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl Localizer for Catalog {
    fn get_string(&self, key: &str, args: &[(&str, LocArg)]) -> String {
        match self.messages.get(key) {
            Some(template) => format_template(template, args),
            None => {
                tracing::warn!(key, "Missing localization string");
                key.to_owned()
            }
        }
    }
}

/// Placeholders without a matching argument are kept verbatim.
fn format_template(template: &str, args: &[(&str, LocArg)]) -> String {
    const OPEN: &str = "{ $";
    const CLOSE: &str = " }";

    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        match args.iter().find(|(k, _)| *k == name) {
            Some((_, value)) => {
                let _ = write!(out, "{value}");
            }
            None => out.push_str(&rest[start..start + OPEN.len() + end + CLOSE.len()]),
        }
        rest = &after[end + CLOSE.len()..];
    }
    out.push_str(rest);
    out
}
