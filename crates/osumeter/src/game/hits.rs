use serde::{Deserialize, Serialize};

use crate::game::Ruleset;

/// Judgement counters of one attempt.
///
/// `perfect` and `good` are the stable client's geki/katu slots (mania MAX/200,
/// catch missed droplets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct HitCounts {
    pub great: u32,
    pub ok: u32,
    pub meh: u32,
    pub miss: u32,
    #[serde(default)]
    pub perfect: u32,
    #[serde(default)]
    pub good: u32,
    /// Slider/drum-roll ticks (lazer only).
    #[serde(default)]
    pub ticks: u32,
}

impl HitCounts {
    /// Objects that received a judgement. Saturates on garbage counters.
    pub fn judged(&self, ruleset: Ruleset) -> u32 {
        match ruleset {
            Ruleset::Osu => saturating_sum(&[self.great, self.ok, self.meh, self.miss]),
            Ruleset::Taiko => saturating_sum(&[self.great, self.ok, self.miss]),
            Ruleset::Catch => {
                saturating_sum(&[self.great, self.ok, self.meh, self.miss, self.good])
            }
            Ruleset::Mania => saturating_sum(&[
                self.perfect,
                self.great,
                self.good,
                self.ok,
                self.meh,
                self.miss,
            ]),
        }
    }

    /// Accuracy in `[0, 1]`; 1.0 before anything was judged.
    pub fn accuracy(&self, ruleset: Ruleset) -> f64 {
        let total = self.judged(ruleset);
        if total == 0 {
            return 1.0;
        }
        let total = f64::from(total);
        let (great, ok, meh) = (f64::from(self.great), f64::from(self.ok), f64::from(self.meh));

        let acc = match ruleset {
            Ruleset::Osu => (300.0 * great + 100.0 * ok + 50.0 * meh) / (300.0 * total),
            Ruleset::Taiko => (great + 0.5 * ok) / total,
            Ruleset::Catch => (great + ok + meh) / total,
            Ruleset::Mania => {
                let perfect = f64::from(self.perfect);
                let good = f64::from(self.good);
                (300.0 * (perfect + great) + 200.0 * good + 100.0 * ok + 50.0 * meh)
                    / (300.0 * total)
            }
        };
        acc.clamp(0.0, 1.0)
    }

    /// The four counters shown everywhere: great, ok, meh, miss.
    pub fn core(&self) -> [u32; 4] {
        [self.great, self.ok, self.meh, self.miss]
    }
}

fn saturating_sum(counts: &[u32]) -> u32 {
    counts.iter().fold(0, |total, &n| total.saturating_add(n))
}
