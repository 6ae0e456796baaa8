//! Lazer client object layout.
//!
//! Field offsets of the managed types the reader walks. Registry entries use
//! the managed type and field names, so `<Field>k__BackingField` spellings in
//! an offsets file resolve too.

use crate::offset::OffsetRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameOffsets {
    pub api: i64,
    pub beatmap: i64,
    pub ruleset: i64,
    pub selected_mods: i64,
    pub available_mods: i64,
    pub screen_stack: i64,
    /// `ScreenStack` -> its `Stack<IScreen>`.
    pub stack: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOffsets {
    /// `Bindable<T>` reference value.
    pub bindable_value: i64,
    /// Value slot of numeric bindables (`BindableNumber<T>`).
    pub number_value: i64,
    /// `Nullable<float>` slot of a difficulty bindable: `hasValue` byte, value 4 bytes later.
    pub nullable_value: i64,
    pub list_items: i64,
    pub list_size: i64,
    pub stack_array: i64,
    pub stack_size: i64,
    pub dictionary_entries: i64,
    pub dictionary_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeatmapOffsets {
    pub working_info: i64,
    pub hash: i64,
    pub md5: i64,
    pub difficulty_name: i64,
    pub metadata: i64,
    pub difficulty: i64,
    pub star_rating: i64,
    pub length: i64,
    pub object_count: i64,
    pub title: i64,
    pub artist: i64,
    pub drain_rate: i64,
    pub circle_size: i64,
    pub overall_difficulty: i64,
    pub approach_rate: i64,
    pub ruleset_online_id: i64,
}

/// The `API` field of each screen type the state is classified from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenOffsets {
    pub player: i64,
    pub results: i64,
    pub song_select: i64,
    pub editor: i64,
    pub multiplayer: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOffsets {
    pub score_processor: i64,
    pub health_processor: i64,
    pub clock_container: i64,
    pub drawable_ruleset: i64,
    pub total_score: i64,
    pub accuracy: i64,
    pub combo: i64,
    pub highest_combo: i64,
    pub statistics: i64,
    pub health: i64,
    pub current_time: i64,
    pub is_paused: i64,
    pub replay_score: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsOffsets {
    pub score: i64,
    pub total_score: i64,
    pub accuracy: i64,
    pub max_combo: i64,
    pub statistics: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModOffsets {
    /// Optional embedded acronym string; only read when the registry names it.
    pub acronym: Option<i64>,
    /// `MultiMod.Mods` array.
    pub multi_mods: i64,
    pub speed_change: i64,
    pub circle_size: i64,
    pub approach_rate: i64,
    pub overall_difficulty: i64,
    pub drain_rate: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazerLayout {
    pub game_signature: String,
    pub game_delta: i64,
    pub game: GameOffsets,
    pub collections: CollectionOffsets,
    pub beatmap: BeatmapOffsets,
    pub screens: ScreenOffsets,
    pub player: PlayerOffsets,
    pub results: ResultsOffsets,
    pub mods: ModOffsets,
}

impl Default for LazerLayout {
    fn default() -> Self {
        Self::from_registry(&OffsetRegistry::builtin())
    }
}

impl LazerLayout {
    pub fn from_registry(r: &OffsetRegistry) -> Self {
        let get = |type_name: &str, field: &str, default: i64| r.get(type_name, field, default);

        Self {
            game_signature: r.get_string(
                "LazerAnchors",
                "Game",
                "?? ?? ?? ?? ?? ?? 00 00 ?? ?? ?? ?? ?? ?? 00 00 00 00 00 00 00 00 00 00 \
                 ?? ?? ?? ?? ?? ?? 00 00 01 00 00 00",
            ),
            game_delta: get("LazerAnchors", "GameDelta", -0x8),
            game: GameOffsets {
                api: get("OsuGame", "API", 0x438),
                beatmap: get("OsuGame", "Beatmap", 0x450),
                ruleset: get("OsuGame", "Ruleset", 0x458),
                selected_mods: get("OsuGame", "SelectedMods", 0x460),
                available_mods: get("OsuGame", "AvailableMods", 0x468),
                screen_stack: get("OsuGame", "ScreenStack", 0x5F8),
                stack: get("ScreenStack", "stack", 0x320),
            },
            collections: CollectionOffsets {
                bindable_value: get("Bindable", "Value", 0x20),
                number_value: get("BindableNumber", "Value", 0x40),
                nullable_value: get("DifficultyBindable", "Value", 0x40),
                list_items: get("List", "_items", 0x8),
                list_size: get("List", "_size", 0x10),
                stack_array: get("Stack", "_array", 0x8),
                stack_size: get("Stack", "_size", 0x10),
                dictionary_entries: get("Dictionary", "_entries", 0x10),
                dictionary_count: get("Dictionary", "_count", 0x38),
            },
            beatmap: BeatmapOffsets {
                working_info: get("WorkingBeatmap", "BeatmapInfo", 0x8),
                hash: get("BeatmapInfo", "Hash", 0x50),
                md5: get("BeatmapInfo", "MD5Hash", 0x58),
                difficulty_name: get("BeatmapInfo", "DifficultyName", 0x18),
                metadata: get("BeatmapInfo", "Metadata", 0x30),
                difficulty: get("BeatmapInfo", "Difficulty", 0x28),
                star_rating: get("BeatmapInfo", "StarRating", 0x90),
                length: get("BeatmapInfo", "Length", 0x98),
                object_count: get("BeatmapInfo", "TotalObjectCount", 0xA0),
                title: get("BeatmapMetadata", "Title", 0x18),
                artist: get("BeatmapMetadata", "Artist", 0x28),
                drain_rate: get("BeatmapDifficulty", "DrainRate", 0x30),
                circle_size: get("BeatmapDifficulty", "CircleSize", 0x34),
                overall_difficulty: get("BeatmapDifficulty", "OverallDifficulty", 0x38),
                approach_rate: get("BeatmapDifficulty", "ApproachRate", 0x3C),
                ruleset_online_id: get("RulesetInfo", "OnlineID", 0x30),
            },
            screens: ScreenOffsets {
                player: get("Player", "API", 0x400),
                results: get("SoloResultsScreen", "API", 0x398),
                song_select: get("SongSelect", "API", 0x3A8),
                editor: get("Editor", "API", 0x3B8),
                multiplayer: get("Multiplayer", "API", 0x3C0),
            },
            player: PlayerOffsets {
                score_processor: get("Player", "ScoreProcessor", 0x440),
                health_processor: get("Player", "HealthProcessor", 0x448),
                clock_container: get("Player", "GameplayClockContainer", 0x450),
                drawable_ruleset: get("Player", "DrawableRuleset", 0x458),
                total_score: get("ScoreProcessor", "TotalScore", 0x238),
                accuracy: get("ScoreProcessor", "Accuracy", 0x240),
                combo: get("ScoreProcessor", "Combo", 0x248),
                highest_combo: get("ScoreProcessor", "HighestCombo", 0x250),
                statistics: get("ScoreProcessor", "scoreResultCounts", 0x258),
                health: get("HealthProcessor", "Health", 0x208),
                current_time: get("GameplayClockContainer", "CurrentTime", 0x2F0),
                is_paused: get("GameplayClockContainer", "isPaused", 0x300),
                replay_score: get("DrawableRuleset", "ReplayScore", 0x5A8),
            },
            results: ResultsOffsets {
                score: get("SoloResultsScreen", "Score", 0x3A0),
                total_score: get("ScoreInfo", "TotalScore", 0x98),
                accuracy: get("ScoreInfo", "Accuracy", 0xA0),
                max_combo: get("ScoreInfo", "MaxCombo", 0xA8),
                statistics: get("ScoreInfo", "Statistics", 0x48),
            },
            mods: ModOffsets {
                acronym: r
                    .contains("Mod", "Acronym")
                    .then(|| get("Mod", "Acronym", 0)),
                multi_mods: get("MultiMod", "Mods", 0x10),
                speed_change: get("ModRateAdjust", "SpeedChange", 0x10),
                circle_size: get("ModDifficultyAdjust", "CircleSize", 0x18),
                approach_rate: get("ModDifficultyAdjust", "ApproachRate", 0x20),
                overall_difficulty: get("ModDifficultyAdjust", "OverallDifficulty", 0x28),
                drain_rate: get("ModDifficultyAdjust", "DrainRate", 0x30),
            },
        }
    }
}
