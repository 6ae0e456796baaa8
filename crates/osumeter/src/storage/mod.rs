//! Persistence of recorded plays.

mod console;
mod session;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use console::format_play_console;
pub use session::JsonSessionStore;

use crate::detector::{CompletedPlay, MapIdentity, PerformanceSample};
use crate::error::{Error, Result};

pub type PlayId = u64;

/// Where recorded plays end up.
pub trait PlayStore: Send {
    /// Insert or refresh a beatmap's metadata, keyed by hash.
    fn upsert_beatmap(&mut self, map: &MapIdentity) -> Result<()>;

    fn insert_play(&mut self, play: &CompletedPlay) -> Result<PlayId>;

    /// Replace a stored play, e.g. after enrichment.
    fn update_play(&mut self, id: PlayId, play: &CompletedPlay) -> Result<()>;

    fn query_performance_timeline(&self, id: PlayId) -> Result<Vec<PerformanceSample>>;
}

impl<S: PlayStore + ?Sized> PlayStore for Box<S> {
    fn upsert_beatmap(&mut self, map: &MapIdentity) -> Result<()> {
        (**self).upsert_beatmap(map)
    }

    fn insert_play(&mut self, play: &CompletedPlay) -> Result<PlayId> {
        (**self).insert_play(play)
    }

    fn update_play(&mut self, id: PlayId, play: &CompletedPlay) -> Result<()> {
        (**self).update_play(id, play)
    }

    fn query_performance_timeline(&self, id: PlayId) -> Result<Vec<PerformanceSample>> {
        (**self).query_performance_timeline(id)
    }
}

/// A play with its store id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPlay {
    pub id: PlayId,
    #[serde(flatten)]
    pub play: CompletedPlay,
}

/// Beatmaps and plays of one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayLog {
    pub beatmaps: BTreeMap<String, MapIdentity>,
    pub plays: Vec<StoredPlay>,
}

impl PlayLog {
    pub fn upsert_beatmap(&mut self, map: &MapIdentity) {
        self.beatmaps.insert(map.hash.clone(), map.clone());
    }

    pub fn insert_play(&mut self, play: &CompletedPlay) -> PlayId {
        let id = self.plays.last().map_or(1, |p| p.id + 1);
        self.plays.push(StoredPlay {
            id,
            play: play.clone(),
        });
        id
    }

    pub fn update_play(&mut self, id: PlayId, play: &CompletedPlay) -> Result<()> {
        let stored = self.find_mut(id)?;
        stored.play = play.clone();
        Ok(())
    }

    pub fn play(&self, id: PlayId) -> Result<&StoredPlay> {
        self.plays
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::Storage(format!("Play {} not found", id)))
    }

    fn find_mut(&mut self, id: PlayId) -> Result<&mut StoredPlay> {
        self.plays
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| Error::Storage(format!("Play {} not found", id)))
    }
}

/// Store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    log: PlayLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &PlayLog {
        &self.log
    }
}

impl PlayStore for MemoryStore {
    fn upsert_beatmap(&mut self, map: &MapIdentity) -> Result<()> {
        self.log.upsert_beatmap(map);
        Ok(())
    }

    fn insert_play(&mut self, play: &CompletedPlay) -> Result<PlayId> {
        Ok(self.log.insert_play(play))
    }

    fn update_play(&mut self, id: PlayId, play: &CompletedPlay) -> Result<()> {
        self.log.update_play(id, play)
    }

    fn query_performance_timeline(&self, id: PlayId) -> Result<Vec<PerformanceSample>> {
        Ok(self.log.play(id)?.play.performance_timeline.clone())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;

    use crate::detector::{CompletedPlay, MapIdentity, PerformanceSample, PlayOutcome};
    use crate::game::{HitCounts, ModList, Ruleset};

    pub fn play(hash: &str, score: i64) -> CompletedPlay {
        CompletedPlay {
            timestamp: Utc::now(),
            started_at: Utc::now(),
            client: Some("stable".to_string()),
            ruleset: Ruleset::Osu,
            map: MapIdentity {
                hash: hash.to_string(),
                title: "Song".to_string(),
                artist: "Artist".to_string(),
                difficulty_name: "Hard".to_string(),
                ..Default::default()
            },
            mods: ModList::new(["HD"]),
            outcome: PlayOutcome::Pass,
            duration_ms: 90_000.0,
            hits: HitCounts {
                great: 95,
                ok: 4,
                miss: 1,
                ..Default::default()
            },
            score,
            accuracy: 0.9633,
            max_combo: 80,
            pp: None,
            combo_timeline: Vec::new(),
            performance_timeline: vec![
                PerformanceSample::default(),
                PerformanceSample {
                    time_ms: 1000.0,
                    great: 1,
                    combo: 1,
                    ..Default::default()
                },
            ],
            replay: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_ids_increase() {
        let mut store = MemoryStore::new();
        let a = store.insert_play(&fixtures::play("a", 1)).unwrap();
        let b = store.insert_play(&fixtures::play("b", 2)).unwrap();
        assert_eq!((a, b), (1, 2));
    }

    #[test]
    fn test_update_and_query() {
        let mut store = MemoryStore::new();
        let play = fixtures::play("a", 1);
        store.upsert_beatmap(&play.map).unwrap();
        let id = store.insert_play(&play).unwrap();

        let mut updated = play.clone();
        updated.score = 99;
        store.update_play(id, &updated).unwrap();

        assert_eq!(store.log().play(id).unwrap().play.score, 99);
        assert_eq!(store.query_performance_timeline(id).unwrap().len(), 2);
        assert_eq!(store.log().beatmaps.len(), 1);
    }

    #[test]
    fn test_unknown_id_is_an_error() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.update_play(7, &fixtures::play("a", 1)),
            Err(Error::Storage(_))
        ));
        assert!(store.query_performance_timeline(7).is_err());
    }
}
