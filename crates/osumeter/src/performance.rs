//! Performance collaborator.
//!
//! The performance-score algorithm itself lives outside this crate; it plugs
//! in through [`PerformanceCalculator`]. [`StructuralCalculator`] is the
//! dependency-free default: it applies mod difficulty changes and reports
//! structure-derived values but no pp or star rating.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::game::{DifficultyOverrides, HitCounts, ModList, Ruleset};

/// Map-level inputs a calculator works from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapInfo {
    pub hash: String,
    pub ruleset: Ruleset,
    pub cs: f32,
    pub ar: f32,
    pub od: f32,
    pub hp: f32,
    pub max_combo: Option<u32>,
    pub object_count: Option<u32>,
    pub length_ms: Option<f64>,
    /// Star rating reported by the client, when it exposes one.
    pub star_rating: Option<f64>,
}

/// Live attempt inputs for [`PerformanceCalculator::compute`].
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceInput<'a> {
    pub mods: &'a ModList,
    pub hits: HitCounts,
    pub combo: u32,
    pub passed_objects: u32,
    pub clock_rate: f64,
    pub overrides: DifficultyOverrides,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceResult {
    pub pp: Option<f64>,
    pub star_rating: Option<f64>,
    pub max_combo: Option<u32>,
    pub map_length_ms: Option<f64>,
}

/// CS/AR/OD/HP after mods.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DifficultyAttributes {
    pub cs: f64,
    pub ar: f64,
    pub od: f64,
    pub hp: f64,
}

pub trait PerformanceCalculator: Send {
    fn compute(&self, map: &MapInfo, input: &PerformanceInput<'_>) -> PerformanceResult;

    fn difficulty_attributes(&self, map: &MapInfo, mods: &ModList) -> DifficultyAttributes;
}

/// Default calculator without a pp model.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralCalculator;

impl StructuralCalculator {
    pub fn new() -> Self {
        Self
    }
}

fn ar_to_ms(ar: f64) -> f64 {
    if ar < 5.0 {
        1800.0 - 120.0 * ar
    } else {
        1200.0 - 150.0 * (ar - 5.0)
    }
}

fn ms_to_ar(ms: f64) -> f64 {
    if ms > 1200.0 {
        (1800.0 - ms) / 120.0
    } else {
        5.0 + (1200.0 - ms) / 150.0
    }
}

impl PerformanceCalculator for StructuralCalculator {
    fn compute(&self, map: &MapInfo, input: &PerformanceInput<'_>) -> PerformanceResult {
        let rate = if input.clock_rate > 0.0 {
            input.clock_rate
        } else {
            1.0
        };
        PerformanceResult {
            pp: None,
            star_rating: map.star_rating,
            max_combo: map.max_combo,
            map_length_ms: map.length_ms.map(|ms| ms / rate),
        }
    }

    fn difficulty_attributes(&self, map: &MapInfo, mods: &ModList) -> DifficultyAttributes {
        let mut cs = f64::from(map.cs);
        let mut ar = f64::from(map.ar);
        let mut od = f64::from(map.od);
        let mut hp = f64::from(map.hp);

        if mods.contains("EZ") {
            cs *= 0.5;
            ar *= 0.5;
            od *= 0.5;
            hp *= 0.5;
        }
        if mods.contains("HR") {
            cs = (cs * 1.3).min(10.0);
            ar = (ar * 1.4).min(10.0);
            od = (od * 1.4).min(10.0);
            hp = (hp * 1.4).min(10.0);
        }

        let overrides = &mods.difficulty;
        if let Some(v) = overrides.cs {
            cs = f64::from(v);
        }
        if let Some(v) = overrides.ar {
            ar = f64::from(v);
        }
        if let Some(v) = overrides.od {
            od = f64::from(v);
        }
        if let Some(v) = overrides.hp {
            hp = f64::from(v);
        }

        let rate = mods.clock_rate();
        if (rate - 1.0).abs() > f64::EPSILON && rate > 0.0 {
            if matches!(map.ruleset, Ruleset::Osu | Ruleset::Catch) {
                ar = ms_to_ar(ar_to_ms(ar) / rate);
            }
            if map.ruleset == Ruleset::Osu {
                let great_window = (80.0 - 6.0 * od) / rate;
                od = (80.0 - great_window) / 6.0;
            }
        }

        DifficultyAttributes { cs, ar, od, hp }
    }
}

/// Per-map derived statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MapStats {
    pub attributes: DifficultyAttributes,
    pub star_rating: Option<f64>,
    pub max_combo: Option<u32>,
    pub length_ms: Option<f64>,
}

/// Single-entry cache of [`MapStats`] keyed by map hash and mod key.
///
/// Recomputed exactly when either key part changes.
#[derive(Debug, Default)]
pub struct MapStatsCache {
    key: Option<(String, String)>,
    stats: MapStats,
    computations: usize,
}

impl MapStatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(
        &mut self,
        calculator: &dyn PerformanceCalculator,
        map: &MapInfo,
        mods: &ModList,
    ) -> MapStats {
        let key = (map.hash.clone(), mods.cache_key());
        if self.key.as_ref() == Some(&key) {
            return self.stats;
        }

        let input = PerformanceInput {
            mods,
            hits: HitCounts::default(),
            combo: map.max_combo.unwrap_or(0),
            passed_objects: map.object_count.unwrap_or(0),
            clock_rate: mods.clock_rate(),
            overrides: mods.difficulty,
        };
        let result = calculator.compute(map, &input);
        self.stats = MapStats {
            attributes: calculator.difficulty_attributes(map, mods),
            star_rating: result.star_rating,
            max_combo: result.max_combo,
            length_ms: result.map_length_ms,
        };
        self.computations += 1;
        debug!("Map stats recomputed for {} [{}]", key.0, key.1);
        self.key = Some(key);
        self.stats
    }

    /// Number of recomputations so far.
    pub fn computations(&self) -> usize {
        self.computations
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }
}
