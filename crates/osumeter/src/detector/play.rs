use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::detector::timeline::{ComboSample, PerformanceSample};
use crate::game::{HitCounts, ModList, Ruleset, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlayOutcome {
    Pass,
    Fail,
}

/// Map identity and metadata as seen during the attempt.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapIdentity {
    pub hash: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub difficulty_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_combo: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_ms: Option<f64>,
}

impl MapIdentity {
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        Self {
            hash: snapshot.map_hash.clone().unwrap_or_default(),
            title: snapshot.title.clone().unwrap_or_default(),
            artist: snapshot.artist.clone().unwrap_or_default(),
            difficulty_name: snapshot.difficulty_name.clone().unwrap_or_default(),
            star_rating: snapshot.star_rating,
            object_count: snapshot.object_count,
            max_combo: snapshot.map_max_combo,
            length_ms: snapshot.map_length_ms,
        }
    }

    /// `Artist - Title [Difficulty]`
    pub fn display_name(&self) -> String {
        let mut name = match (self.artist.is_empty(), self.title.is_empty()) {
            (false, false) => format!("{} - {}", self.artist, self.title),
            (true, false) => self.title.clone(),
            _ => self.hash.clone(),
        };
        if !self.difficulty_name.is_empty() {
            name.push_str(&format!(" [{}]", self.difficulty_name));
        }
        name
    }
}

/// Replay file matched to a recorded play after the fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLink {
    pub path: PathBuf,
    pub replay_hash: String,
    /// Header judgement counts agree with the recorded ones.
    pub counts_match: bool,
}

/// One finished attempt. Built once by the detector; only enrichment touches
/// it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedPlay {
    pub timestamp: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    pub ruleset: Ruleset,
    pub map: MapIdentity,
    pub mods: ModList,
    pub outcome: PlayOutcome,
    pub duration_ms: f64,
    pub hits: HitCounts,
    pub score: i64,
    pub accuracy: f64,
    pub max_combo: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pp: Option<f64>,
    #[serde(default)]
    pub combo_timeline: Vec<ComboSample>,
    #[serde(default)]
    pub performance_timeline: Vec<PerformanceSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay: Option<ReplayLink>,
}

impl CompletedPlay {
    pub fn is_pass(&self) -> bool {
        self.outcome == PlayOutcome::Pass
    }
}
