/// A selectable game mode, described by localization keys.
#[derive(Debug, PartialEq, Eq)]
pub struct GamePreset {
    pub id: &'static str,
    pub mode_title: &'static str,
    pub description: &'static str,
}

pub const PRESETS: &[GamePreset] = &[
    GamePreset {
        id: "extended",
        mode_title: "preset-extended-title",
        description: "preset-extended-description",
    },
    GamePreset {
        id: "secret",
        mode_title: "preset-secret-title",
        description: "preset-secret-description",
    },
    GamePreset {
        id: "survival",
        mode_title: "preset-survival-title",
        description: "preset-survival-description",
    },
];

pub fn find(id: &str) -> Option<&'static GamePreset> {
    PRESETS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

#[cfg(test)]
mod test {
    use super::find;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(find("Secret").map(|p| p.id), Some("secret"));
        assert!(find("nukeops").is_none());
    }
}
