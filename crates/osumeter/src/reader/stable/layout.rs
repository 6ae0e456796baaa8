//! Stable client object layout.
//!
//! Every value can be overridden from the offset registry; the defaults are
//! the last known-good layout.

use crate::offset::OffsetRegistry;

const ANCHORS: &str = "StableAnchors";

/// Signature plus the displacement from the match to the pointer slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub signature: String,
    pub delta: i64,
}

impl Anchor {
    fn load(registry: &OffsetRegistry, name: &str, signature: &str, delta: i64) -> Self {
        Self {
            signature: registry.get_string(ANCHORS, name, signature),
            delta: registry.get(ANCHORS, &format!("{}Delta", name), delta),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatmapOffsets {
    pub artist: i64,
    pub title: i64,
    pub md5: i64,
    pub folder: i64,
    pub file: i64,
    pub version: i64,
    pub ar: i64,
    pub cs: i64,
    pub hp: i64,
    pub od: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesetOffsets {
    /// Ruleset object inside the static rulesets slot.
    pub current: i64,
    pub gameplay: i64,
    pub results_score: i64,
    /// Gameplay -> live score object.
    pub gameplay_score: i64,
    /// Gameplay -> HP bar.
    pub hp_bar: i64,
    /// HP bar -> current value (f64, 0..200).
    pub hp_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreOffsets {
    pub mods: i64,
    pub mods_value: i64,
    pub mods_key: i64,
    pub mode: i64,
    pub max_combo: i64,
    pub score: i64,
    pub hit100: i64,
    pub hit300: i64,
    pub hit50: i64,
    pub geki: i64,
    pub katu: i64,
    pub miss: i64,
    pub combo: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StableLayout {
    pub status: Anchor,
    pub base: Anchor,
    pub rulesets: Anchor,
    pub play_time: Anchor,
    /// Replay flag; disabled when the registry has no signature for it.
    pub replay: Option<Anchor>,
    pub beatmap: BeatmapOffsets,
    pub ruleset: RulesetOffsets,
    pub score: ScoreOffsets,
}

impl Default for StableLayout {
    fn default() -> Self {
        Self::from_registry(&OffsetRegistry::builtin())
    }
}

impl StableLayout {
    pub fn from_registry(r: &OffsetRegistry) -> Self {
        let replay = r.contains(ANCHORS, "Replay").then(|| Anchor::load(r, "Replay", "", 0));

        let beatmap = |field: &str, default: i64| r.get("StableBeatmap", field, default);
        let ruleset = |field: &str, default: i64| r.get("StableRuleset", field, default);
        let score = |field: &str, default: i64| r.get("StableScore", field, default);

        Self {
            status: Anchor::load(r, "Status", "48 83 F8 04 73 1E", -0x4),
            base: Anchor::load(r, "Base", "F8 01 74 04 83 65", -0xC),
            rulesets: Anchor::load(r, "Rulesets", "7D 15 A1 ?? ?? ?? ?? 85 C0", -0xB),
            play_time: Anchor::load(r, "PlayTime", "5E 5F 5D C3 A1 ?? ?? ?? ?? 89 ?? 04", 0x5),
            replay,
            beatmap: BeatmapOffsets {
                artist: beatmap("Artist", 0x18),
                title: beatmap("Title", 0x24),
                ar: beatmap("ApproachRate", 0x2C),
                cs: beatmap("CircleSize", 0x30),
                hp: beatmap("HPDrainRate", 0x34),
                od: beatmap("OverallDifficulty", 0x38),
                md5: beatmap("BeatmapChecksum", 0x6C),
                folder: beatmap("ContainingFolder", 0x78),
                file: beatmap("Filename", 0x90),
                version: beatmap("Version", 0xB0),
            },
            ruleset: RulesetOffsets {
                current: ruleset("Current", 0x4),
                results_score: ruleset("ResultsScore", 0x38),
                gameplay: ruleset("Gameplay", 0x68),
                gameplay_score: ruleset("GameplayScore", 0x38),
                hp_bar: ruleset("HpBar", 0x40),
                hp_value: ruleset("HpValue", 0x1C),
            },
            score: ScoreOffsets {
                mods: score("Mods", 0x1C),
                mods_key: score("ModsKey", 0x8),
                mods_value: score("ModsValue", 0xC),
                mode: score("PlayMode", 0x64),
                max_combo: score("MaxCombo", 0x68),
                score: score("TotalScore", 0x78),
                hit100: score("Count100", 0x88),
                hit300: score("Count300", 0x8A),
                hit50: score("Count50", 0x8C),
                geki: score("CountGeki", 0x8E),
                katu: score("CountKatu", 0x90),
                miss: score("CountMiss", 0x92),
                combo: score("CurrentCombo", 0x94),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_registry() {
        let layout = StableLayout::default();
        assert_eq!(layout.status.delta, -0x4);
        assert_eq!(layout.rulesets.signature, "7D 15 A1 ?? ?? ?? ?? 85 C0");
        assert_eq!(layout.score.combo, 0x94);
        assert!(layout.replay.is_none());
    }

    #[test]
    fn test_registry_overrides() {
        let mut registry = OffsetRegistry::builtin();
        registry.insert("StableScore", "CurrentCombo", 0x98);
        registry.insert_string(ANCHORS, "Replay", "8B FA B8 01".to_string());
        registry.insert(ANCHORS, "ReplayDelta", 0x10);

        let layout = StableLayout::from_registry(&registry);
        assert_eq!(layout.score.combo, 0x98);
        assert_eq!(
            layout.replay,
            Some(Anchor {
                signature: "8B FA B8 01".to_string(),
                delta: 0x10
            })
        );
    }
}
