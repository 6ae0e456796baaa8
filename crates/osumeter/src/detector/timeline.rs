//! Per-attempt timelines.
//!
//! The performance timeline gets a sample whenever combo or any judgement
//! count moves; the combo timeline only when combo or misses move.

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::game::{HitCounts, Snapshot};

/// What caused a timeline sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TimelineEvent {
    #[default]
    Progress,
    Miss,
    /// Combo dropped without a miss (slider break, dropped tick).
    ComboBreak,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub time_ms: f64,
    pub pp: f64,
    pub max_combo: u32,
    pub accuracy: f64,
    pub great: u32,
    pub ok: u32,
    pub meh: u32,
    pub miss: u32,
    pub combo: u32,
    pub event: TimelineEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComboSample {
    pub time_ms: f64,
    pub combo: u32,
    pub miss: u32,
    pub event: TimelineEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct Sampled {
    combo: u32,
    hits: HitCounts,
}

#[derive(Debug, Clone, Default)]
pub struct TimelineRecorder {
    performance: Vec<PerformanceSample>,
    combo: Vec<ComboSample>,
    last: Sampled,
    max_combo: u32,
}

impl TimelineRecorder {
    /// Recorder seeded with the zero sample.
    pub fn new() -> Self {
        let mut recorder = Self::default();
        recorder.reset();
        recorder
    }

    pub fn reset(&mut self) {
        self.performance.clear();
        self.combo.clear();
        self.performance.push(PerformanceSample {
            accuracy: 1.0,
            ..Default::default()
        });
        self.last = Sampled::default();
        self.max_combo = 0;
    }

    /// Sample `snapshot` if anything moved since the last sample.
    ///
    /// Returns the event tag when a sample was appended.
    pub fn observe(&mut self, snapshot: &Snapshot) -> Option<TimelineEvent> {
        let hits = snapshot.hits?;
        let combo = snapshot.combo.unwrap_or(0);
        let current = Sampled { combo, hits };
        let last = self.last;
        if current == last {
            return None;
        }

        let event = if hits.miss > last.hits.miss {
            TimelineEvent::Miss
        } else if combo < last.combo {
            TimelineEvent::ComboBreak
        } else {
            TimelineEvent::Progress
        };

        self.max_combo = self
            .max_combo
            .max(combo)
            .max(snapshot.max_combo.unwrap_or(0));
        let time_ms = snapshot.time_ms.unwrap_or(0.0);
        let ruleset = snapshot.ruleset_or_default();

        self.performance.push(PerformanceSample {
            time_ms,
            pp: snapshot.pp.unwrap_or(0.0),
            max_combo: self.max_combo,
            accuracy: snapshot.accuracy.unwrap_or_else(|| hits.accuracy(ruleset)),
            great: hits.great,
            ok: hits.ok,
            meh: hits.meh,
            miss: hits.miss,
            combo,
            event,
        });

        if combo != last.combo || hits.miss != last.hits.miss {
            self.combo.push(ComboSample {
                time_ms,
                combo,
                miss: hits.miss,
                event,
            });
        }

        self.last = current;
        Some(event)
    }

    pub fn performance(&self) -> &[PerformanceSample] {
        &self.performance
    }

    pub fn combo(&self) -> &[ComboSample] {
        &self.combo
    }
}
