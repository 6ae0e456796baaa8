//! Gate every record must pass.
//!
//! A rejection never marks the attempt as recorded, so the next poll can try
//! again with fresher data.

use thiserror::Error;

use crate::config::DetectorConfig;
use crate::config::detector::{MAX_ACCURACY, MAX_SCORE};
use crate::game::{Ruleset, Snapshot};

/// Where the candidate snapshot was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capture {
    /// Health reached zero during play.
    Fail,
    /// A stabilized results screen.
    Results,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("map hash missing")]
    MissingMapHash,

    #[error("score {0} out of range")]
    ScoreOutOfRange(i64),

    #[error("accuracy {0} out of range")]
    AccuracyOutOfRange(f64),

    #[error("no objects judged")]
    NothingJudged,

    #[error("{judged} judged of {total} objects")]
    JudgedRatio { judged: u32, total: u32 },

    #[error("combo {combo} exceeds map max combo {max}")]
    ComboExceedsMap { combo: u32, max: u32 },
}

/// Check `snapshot` before it becomes a record.
pub fn validate(snapshot: &Snapshot, capture: Capture, config: &DetectorConfig) -> Result<(), Rejection> {
    if !snapshot.has_map() {
        return Err(Rejection::MissingMapHash);
    }

    let score = snapshot.score.unwrap_or(0);
    if !(0..=MAX_SCORE).contains(&score) {
        return Err(Rejection::ScoreOutOfRange(score));
    }

    if let Some(accuracy) = snapshot.accuracy
        && !(0.0..=MAX_ACCURACY).contains(&accuracy)
    {
        return Err(Rejection::AccuracyOutOfRange(accuracy));
    }

    let judged = snapshot.judged();
    if judged == 0 {
        return Err(Rejection::NothingJudged);
    }

    if capture == Capture::Results
        && let Some(total) = snapshot.object_count.filter(|&t| t > 0)
    {
        let ratio = f64::from(judged) / f64::from(total);
        let too_many = judgements_per_object(snapshot.ruleset_or_default())
            .is_some_and(|per_object| ratio > config.results_ratio_max * per_object);
        if ratio < config.results_ratio_min || too_many {
            return Err(Rejection::JudgedRatio { judged, total });
        }
    }

    if let Some(max) = snapshot.map_max_combo.filter(|&m| m > 0) {
        let combo = snapshot
            .max_combo
            .unwrap_or(0)
            .max(snapshot.combo.unwrap_or(0));
        if combo > max {
            return Err(Rejection::ComboExceedsMap { combo, max });
        }
    }

    Ok(())
}

/// Judgements a complete results screen carries per map object, `None` when
/// there is no fixed bound.
fn judgements_per_object(ruleset: Ruleset) -> Option<f64> {
    match ruleset {
        Ruleset::Osu | Ruleset::Taiko => Some(1.0),
        // hold head and tail
        Ruleset::Mania => Some(2.0),
        // droplets are judged but not counted as objects
        Ruleset::Catch => None,
    }
}
