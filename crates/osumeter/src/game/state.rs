use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

/// Coarse screen the game is showing.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, IntoStaticStr,
)]
pub enum GameState {
    #[default]
    Unknown,
    Menu,
    Editor,
    Playing,
    SongSelect,
    ResultsScreen,
    Multiplayer,
}

impl GameState {
    /// Map a stable client status value.
    pub fn from_stable_status(status: i32) -> Self {
        match status {
            0 => Self::Menu,
            1 | 4 => Self::Editor,
            2 => Self::Playing,
            5 | 13 => Self::SongSelect,
            7 | 14 | 17 | 18 => Self::ResultsScreen,
            11 | 12 => Self::Multiplayer,
            // exit, drawings, updater, busy, osu!direct, offset wizard,
            // import, package updater, benchmark, charts
            3 | 6 | 8 | 9 | 10 | 15 | 16 | 19 | 20 | 21 | 23 => Self::Menu,
            _ => Self::Unknown,
        }
    }

    pub fn is_playing(&self) -> bool {
        *self == Self::Playing
    }

    pub fn is_results(&self) -> bool {
        *self == Self::ResultsScreen
    }
}

impl std::fmt::Display for GameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}
