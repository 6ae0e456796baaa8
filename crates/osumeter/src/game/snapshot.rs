use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::game::{GameState, HitCounts, ModList, Ruleset};

/// Everything read from the game in one poll.
///
/// Only `state` is guaranteed; every other field is best effort and `None`
/// when it could not be read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: GameState,
    /// Name of the client reader that produced this snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruleset: Option<Ruleset>,

    // Map identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_file: Option<PathBuf>,

    // Map difficulty and structure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cs: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ar: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub od: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_max_combo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_length_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bpm: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_rating: Option<f64>,

    // Live progress
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub combo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_combo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<HitCounts>,
    /// Health normalized to `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mods: Option<ModList>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp: Option<f64>,

    // Flags
    #[serde(default)]
    pub is_replay: bool,
    #[serde(default)]
    pub is_paused: bool,
    #[serde(default)]
    pub results_ready: bool,
    #[serde(default)]
    pub is_preview: bool,
}

impl Snapshot {
    /// The sentinel returned while no client reader is connected.
    pub fn no_data() -> Self {
        Self::default()
    }

    pub fn with_state(state: GameState) -> Self {
        Self {
            state,
            ..Default::default()
        }
    }

    /// Ruleset, defaulting to osu! standard when unread.
    pub fn ruleset_or_default(&self) -> Ruleset {
        self.ruleset.unwrap_or_default()
    }

    /// Number of judged objects, 0 when counts are unread.
    pub fn judged(&self) -> u32 {
        self.hits
            .map(|h| h.judged(self.ruleset_or_default()))
            .unwrap_or(0)
    }

    pub fn has_map(&self) -> bool {
        self.map_hash.as_deref().is_some_and(|h| !h.is_empty())
    }
}
