//! Gameplay modifiers.
//!
//! Mods are carried as acronyms plus the numeric settings that affect
//! difficulty: a speed-change rate and difficulty-adjust overrides.

use serde::{Deserialize, Serialize};

use crate::game::Ruleset;

/// Acronyms whose plays are never recorded.
pub const AUTOMATION_MODS: [&str; 4] = ["AT", "CN", "RX", "AP"];

/// Legacy bitmask values of the stable client, in display order.
///
/// NC and PF are listed before the mods they imply so decoding can skip DT/SD.
const LEGACY_BITS: &[(u32, &str)] = &[
    (1 << 1, "EZ"),
    (1, "NF"),
    (1 << 8, "HT"),
    (1 << 4, "HR"),
    (1 << 14, "PF"),
    (1 << 5, "SD"),
    (1 << 9, "NC"),
    (1 << 6, "DT"),
    (1 << 3, "HD"),
    (1 << 20, "FI"),
    (1 << 10, "FL"),
    (1 << 2, "TD"),
    (1 << 7, "RX"),
    (1 << 13, "AP"),
    (1 << 12, "SO"),
    (1 << 11, "AT"),
    (1 << 22, "CN"),
    (1 << 23, "TP"),
    (1 << 21, "RD"),
    (1 << 30, "MR"),
    (1 << 25, "CO"),
    (1 << 26, "1K"),
    (1 << 28, "2K"),
    (1 << 27, "3K"),
    (1 << 15, "4K"),
    (1 << 16, "5K"),
    (1 << 17, "6K"),
    (1 << 18, "7K"),
    (1 << 19, "8K"),
    (1 << 24, "9K"),
    (1 << 29, "SV2"),
];

/// Difficulty-adjust overrides. `None` leaves the map value alone.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DifficultyOverrides {
    pub cs: Option<f32>,
    pub ar: Option<f32>,
    pub od: Option<f32>,
    pub hp: Option<f32>,
}

impl DifficultyOverrides {
    pub fn is_empty(&self) -> bool {
        self.cs.is_none() && self.ar.is_none() && self.od.is_none() && self.hp.is_none()
    }
}

/// Active modifiers of an attempt.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModList {
    pub acronyms: Vec<String>,
    /// Custom rate from a speed-change mod's settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_change: Option<f64>,
    #[serde(default, skip_serializing_if = "DifficultyOverrides::is_empty")]
    pub difficulty: DifficultyOverrides,
}

impl ModList {
    pub fn new<I, S>(acronyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            acronyms: acronyms.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Decode a stable client bitmask. NC hides DT, PF hides SD.
    pub fn from_legacy_bits(bits: u32) -> Self {
        let mut acronyms = Vec::new();
        for &(bit, acronym) in LEGACY_BITS {
            if bits & bit == 0 {
                continue;
            }
            let implied = (acronym == "DT" && bits & (1 << 9) != 0)
                || (acronym == "SD" && bits & (1 << 14) != 0);
            if !implied {
                acronyms.push(acronym.to_string());
            }
        }
        Self::new(acronyms)
    }

    /// Encode back to a stable bitmask, setting implied bits. Unknown acronyms are dropped.
    pub fn legacy_bits(&self) -> u32 {
        let mut bits = 0;
        for acronym in &self.acronyms {
            if let Some(&(bit, _)) = LEGACY_BITS.iter().find(|(_, a)| *a == acronym.as_str()) {
                bits |= bit;
            }
        }
        if bits & (1 << 9) != 0 {
            bits |= 1 << 6;
        }
        if bits & (1 << 14) != 0 {
            bits |= 1 << 5;
        }
        bits
    }

    pub fn contains(&self, acronym: &str) -> bool {
        self.acronyms.iter().any(|a| a.eq_ignore_ascii_case(acronym))
    }

    pub fn is_empty(&self) -> bool {
        self.acronyms.is_empty()
    }

    /// Auto-play, cinema or relax-style assists.
    pub fn is_automation(&self) -> bool {
        AUTOMATION_MODS.iter().any(|a| self.contains(a))
    }

    pub fn has_no_fail(&self) -> bool {
        self.contains("NF")
    }

    /// Playback rate: speed-change settings win over DT/NC/HT/DC defaults.
    pub fn clock_rate(&self) -> f64 {
        if let Some(rate) = self.speed_change
            && rate > 0.0
        {
            return rate;
        }
        if self.contains("DT") || self.contains("NC") {
            1.5
        } else if self.contains("HT") || self.contains("DC") {
            0.75
        } else {
            1.0
        }
    }

    /// Key identifying this mod combination for caches.
    pub fn cache_key(&self) -> String {
        let mut key = self.acronyms.join(",");
        if let Some(rate) = self.speed_change {
            key.push_str(&format!("@{:.2}", rate));
        }
        let d = &self.difficulty;
        for (name, value) in [("cs", d.cs), ("ar", d.ar), ("od", d.od), ("hp", d.hp)] {
            if let Some(v) = value {
                key.push_str(&format!(";{}={:.1}", name, v));
            }
        }
        key
    }
}

impl std::fmt::Display for ModList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.acronyms.is_empty() {
            f.write_str("NM")
        } else {
            f.write_str(&self.acronyms.join(""))
        }
    }
}

/// Ordered acronyms of a ruleset's selectable mods, composite entries flattened.
///
/// Used to name mod instances by position when they carry no readable acronym.
pub fn expected_acronyms(ruleset: Ruleset) -> &'static [&'static str] {
    match ruleset {
        Ruleset::Osu => &[
            "EZ", "NF", "HT", "DC", "HR", "SD", "PF", "DT", "NC", "HD", "TC", "FL", "BL", "ST",
            "AC", "TP", "DA", "CL", "RD", "MR", "AL", "SG", "AT", "CN", "RX", "AP", "SO", "TR",
            "WG", "SI", "GR", "DF", "WU", "WD", "BR", "AD", "MU", "NS", "MG", "RP", "AS", "FR",
            "BU", "SY", "DP", "BM", "TD", "SV2",
        ],
        Ruleset::Taiko => &[
            "EZ", "NF", "HT", "DC", "SG", "HR", "SD", "PF", "DT", "NC", "HD", "FL", "AC", "RD",
            "DA", "CL", "SW", "CS", "AT", "CN", "RX", "WU", "WD", "MU", "AS", "SV2",
        ],
        Ruleset::Catch => &[
            "EZ", "NF", "HT", "DC", "HR", "SD", "PF", "DT", "NC", "HD", "FL", "AC", "DA", "CL",
            "MR", "AT", "CN", "RX", "WU", "WD", "FF", "MU", "NS", "MF", "SV2",
        ],
        Ruleset::Mania => &[
            "EZ", "NF", "HT", "DC", "NR", "HR", "SD", "PF", "DT", "NC", "FI", "HD", "CO", "FL",
            "AC", "RD", "DS", "MR", "DA", "CL", "IN", "CS", "HO", "1K", "2K", "3K", "4K", "5K",
            "6K", "7K", "8K", "9K", "10K", "AT", "CN", "WU", "WD", "MU", "AS", "SV2",
        ],
    }
}
