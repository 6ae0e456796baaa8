//! `.osu` beatmap file parsing.
//!
//! Only the structure the trackers need is parsed: metadata, difficulty,
//! timing points and hit objects. Malformed lines are skipped.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use encoding_rs::{UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::game::Ruleset;

const TYPE_CIRCLE: u32 = 1;
const TYPE_SLIDER: u32 = 1 << 1;
const TYPE_SPINNER: u32 = 1 << 3;
const TYPE_HOLD: u32 = 1 << 7;

/// Repeat counts above this are treated as corrupt and clamped.
const MAX_SLIDES: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    pub time: f64,
    pub beat_length: f64,
    pub uninherited: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectCounts {
    pub circles: u32,
    pub sliders: u32,
    pub spinners: u32,
    pub holds: u32,
}

impl ObjectCounts {
    pub fn total(&self) -> u32 {
        [self.circles, self.sliders, self.spinners, self.holds]
            .into_iter()
            .fold(0u32, u32::saturating_add)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BpmStats {
    pub min: f64,
    pub max: f64,
    /// BPM held for the longest total duration.
    pub dominant: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatmapFile {
    pub format_version: u32,
    pub mode: Ruleset,
    pub title: String,
    pub artist: String,
    pub creator: String,
    pub version: String,
    pub cs: f32,
    pub ar: f32,
    pub od: f32,
    pub hp: f32,
    pub slider_multiplier: f64,
    pub slider_tick_rate: f64,
    pub timing_points: Vec<TimingPoint>,
    pub counts: ObjectCounts,
    pub object_times: Vec<f64>,
    pub max_combo: u32,
    pub bpm: Option<BpmStats>,
    pub drain_length_ms: f64,
    pub total_length_ms: f64,
}

struct RawObject {
    time: f64,
    kind: u32,
    slides: u32,
    length: f64,
    end_time: Option<f64>,
}

impl BeatmapFile {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(&path)?;
        Self::parse(&decode_map_text(&bytes))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut map = Self {
            format_version: 0,
            mode: Ruleset::Osu,
            title: String::new(),
            artist: String::new(),
            creator: String::new(),
            version: String::new(),
            cs: 5.0,
            ar: f32::NAN,
            od: 5.0,
            hp: 5.0,
            slider_multiplier: 1.4,
            slider_tick_rate: 1.0,
            timing_points: Vec::new(),
            counts: ObjectCounts::default(),
            object_times: Vec::new(),
            max_combo: 0,
            bpm: None,
            drain_length_ms: 0.0,
            total_length_ms: 0.0,
        };

        let mut section = String::new();
        let mut raw_objects = Vec::new();
        let mut saw_header = false;

        for line in content.lines() {
            let line = line.trim_start_matches('\u{feff}').trim();
            if line.is_empty() || line.starts_with("//") {
                continue;
            }
            if let Some(version) = line.strip_prefix("osu file format v") {
                map.format_version = version.trim().parse().unwrap_or(0);
                saw_header = true;
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                section = line[1..line.len() - 1].to_string();
                continue;
            }

            match section.as_str() {
                "General" | "Metadata" | "Difficulty" => map.apply_key_value(line),
                "TimingPoints" => {
                    if let Some(point) = parse_timing_point(line) {
                        map.timing_points.push(point);
                    }
                }
                "HitObjects" => {
                    if let Some(object) = parse_hit_object(line) {
                        raw_objects.push(object);
                    }
                }
                _ => {}
            }
        }

        if !saw_header && raw_objects.is_empty() {
            return Err(Error::BeatmapParse(
                "missing file format header and hit objects".to_string(),
            ));
        }

        if map.ar.is_nan() {
            // Old maps share one value for AR and OD
            map.ar = map.od;
        }
        map.timing_points
            .sort_by(|a, b| a.time.total_cmp(&b.time));
        map.build_structure(&raw_objects);
        Ok(map)
    }

    fn apply_key_value(&mut self, line: &str) {
        let Some((key, value)) = line.split_once(':') else {
            return;
        };
        let value = value.trim();
        let float = || value.parse::<f32>().ok();

        match key.trim() {
            "Mode" => {
                if let Some(mode) = value.parse().ok().and_then(Ruleset::from_id) {
                    self.mode = mode;
                }
            }
            "Title" => self.title = value.to_string(),
            "Artist" => self.artist = value.to_string(),
            "Creator" => self.creator = value.to_string(),
            "Version" => self.version = value.to_string(),
            "CircleSize" => self.cs = float().unwrap_or(self.cs),
            "ApproachRate" => self.ar = float().unwrap_or(self.ar),
            "OverallDifficulty" => self.od = float().unwrap_or(self.od),
            "HPDrainRate" => self.hp = float().unwrap_or(self.hp),
            "SliderMultiplier" => {
                self.slider_multiplier = value.parse().unwrap_or(self.slider_multiplier)
            }
            "SliderTickRate" => {
                self.slider_tick_rate = value.parse().unwrap_or(self.slider_tick_rate)
            }
            _ => {}
        }
    }

    fn build_structure(&mut self, objects: &[RawObject]) {
        let mut combo = 0u32;
        let mut last_end = 0.0f64;

        for object in objects {
            self.object_times.push(object.time);
            let mut end = object.end_time.unwrap_or(object.time);

            if object.kind & TYPE_SLIDER != 0 {
                self.counts.sliders += 1;
                let (slider_combo, duration) = self.slider_combo(object);
                end = object.time + duration;
                combo = combo.saturating_add(match self.mode {
                    Ruleset::Osu | Ruleset::Catch => slider_combo,
                    Ruleset::Taiko | Ruleset::Mania => 0,
                });
            } else if object.kind & TYPE_SPINNER != 0 {
                self.counts.spinners += 1;
                if self.mode == Ruleset::Osu {
                    combo = combo.saturating_add(1);
                }
            } else if object.kind & TYPE_HOLD != 0 {
                self.counts.holds += 1;
                combo = combo.saturating_add(2);
            } else if object.kind & TYPE_CIRCLE != 0 {
                self.counts.circles += 1;
                combo = combo.saturating_add(1);
            }
            last_end = last_end.max(end);
        }

        self.max_combo = combo;
        if let Some(first) = objects.first() {
            self.total_length_ms = last_end;
            self.drain_length_ms = (last_end - first.time).max(0.0);
        }
        self.bpm = self.bpm_stats(last_end);
    }

    /// Combo and duration of a slider: head, one end per span, ticks per span.
    fn slider_combo(&self, object: &RawObject) -> (u32, f64) {
        let beat_length = self.beat_length_at(object.time);
        let sv = self.slider_velocity_at(object.time);
        let px_per_beat = 100.0 * self.slider_multiplier * sv;
        if px_per_beat <= 0.0 || beat_length <= 0.0 {
            return (object.slides.saturating_add(1), 0.0);
        }

        let span_duration = object.length / px_per_beat * beat_length;
        let tick_distance = px_per_beat / self.slider_tick_rate.max(0.01);
        // Ticks closer than 10ms to the span end are dropped
        let min_distance_from_end = px_per_beat / beat_length * 10.0;

        let mut ticks_per_span = 0u32;
        let mut distance = tick_distance;
        while distance < object.length - min_distance_from_end && ticks_per_span < 10_000 {
            ticks_per_span += 1;
            distance += tick_distance;
        }

        let slides = object.slides.max(1);
        (
            slides
                .saturating_add(1)
                .saturating_add(ticks_per_span.saturating_mul(slides)),
            span_duration * f64::from(slides),
        )
    }

    fn beat_length_at(&self, time: f64) -> f64 {
        let mut uninherited = self.timing_points.iter().filter(|p| p.uninherited);
        let first = uninherited.clone().next().map(|p| p.beat_length);
        uninherited
            .rfind(|p| p.time <= time)
            .map(|p| p.beat_length)
            .or(first)
            .unwrap_or(500.0)
    }

    fn slider_velocity_at(&self, time: f64) -> f64 {
        match self.timing_points.iter().rfind(|p| p.time <= time) {
            Some(p) if !p.uninherited && p.beat_length < 0.0 => {
                (-100.0 / p.beat_length).clamp(0.1, 10.0)
            }
            _ => 1.0,
        }
    }

    fn bpm_stats(&self, end_time: f64) -> Option<BpmStats> {
        let points: Vec<&TimingPoint> = self
            .timing_points
            .iter()
            .filter(|p| p.uninherited && p.beat_length > 0.0)
            .collect();
        if points.is_empty() {
            return None;
        }

        let mut min = f64::MAX;
        let mut max = f64::MIN;
        let mut durations: Vec<(f64, f64)> = Vec::new();

        for (i, point) in points.iter().enumerate() {
            let bpm = 60000.0 / point.beat_length;
            min = min.min(bpm);
            max = max.max(bpm);

            let next = points
                .get(i + 1)
                .map(|p| p.time)
                .unwrap_or(end_time.max(point.time));
            let duration = (next - point.time).max(0.0);
            match durations.iter_mut().find(|(b, _)| (*b - bpm).abs() < 1e-3) {
                Some((_, total)) => *total += duration,
                None => durations.push((bpm, duration)),
            }
        }

        let dominant = durations
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(bpm, _)| *bpm)
            .unwrap_or(min);
        Some(BpmStats { min, max, dominant })
    }
}

fn parse_timing_point(line: &str) -> Option<TimingPoint> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 2 {
        return None;
    }
    let time = parts[0].parse::<f64>().ok()?;
    let beat_length = parts[1].parse::<f64>().ok()?;
    let uninherited = match parts.get(6) {
        Some(flag) => *flag == "1",
        None => beat_length > 0.0,
    };
    Some(TimingPoint {
        time,
        beat_length,
        uninherited,
    })
}

/// UTF-8 (BOM stripped), or Windows-1252 for legacy maps with non-UTF-8 metadata.
fn decode_map_text(bytes: &[u8]) -> Cow<'_, str> {
    let (text, _, malformed) = UTF_8.decode(bytes);
    if !malformed {
        return text;
    }
    debug!("Map file is not UTF-8, decoding as Windows-1252");
    let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
    text
}

fn parse_hit_object(line: &str) -> Option<RawObject> {
    let parts: Vec<&str> = line.split(',').map(str::trim).collect();
    if parts.len() < 5 {
        return None;
    }
    let time = parts[2].parse::<f64>().ok()?;
    let kind = parts[3].parse::<u32>().ok()?;

    let mut object = RawObject {
        time,
        kind,
        slides: 1,
        length: 0.0,
        end_time: None,
    };

    if kind & TYPE_SLIDER != 0 {
        object.slides = parts.get(6)?.parse::<u32>().ok()?.min(MAX_SLIDES);
        object.length = parts.get(7)?.parse().ok()?;
    } else if kind & TYPE_SPINNER != 0 {
        object.end_time = parts.get(5).and_then(|v| v.parse().ok());
    } else if kind & TYPE_HOLD != 0 {
        object.end_time = parts
            .get(5)
            .and_then(|v| v.split(':').next())
            .and_then(|v| v.parse().ok());
    }
    Some(object)
}

/// Single-entry cache of the parsed file for the current map.
///
/// The file is parsed again only when the resolved path changes; a parse
/// failure is remembered as `None` for that path.
#[derive(Debug, Default)]
pub struct MapFileCache {
    current: Option<(PathBuf, Option<Arc<BeatmapFile>>)>,
    parses: usize,
}

impl MapFileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, path: &Path) -> Option<Arc<BeatmapFile>> {
        if let Some((cached_path, parsed)) = &self.current
            && cached_path == path
        {
            return parsed.clone();
        }

        self.parses += 1;
        let parsed = match BeatmapFile::from_path(path) {
            Ok(map) => {
                debug!(
                    "Parsed {} ({} objects, max combo {})",
                    path.display(),
                    map.counts.total(),
                    map.max_combo
                );
                Some(Arc::new(map))
            }
            Err(e) => {
                warn!("Failed to parse beatmap {}: {}", path.display(), e);
                None
            }
        };
        self.current = Some((path.to_path_buf(), parsed.clone()));
        parsed
    }

    /// Number of parse attempts made so far.
    pub fn parse_count(&self) -> usize {
        self.parses
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) const SAMPLE_MAP: &str = "\u{feff}osu file format v14

[General]
AudioFilename: audio.mp3
Mode: 0

[Metadata]
Title:Test Song
Artist:Someone
Creator:Mapper
Version:Insane

[Difficulty]
HPDrainRate:5
CircleSize:4
OverallDifficulty:8
ApproachRate:9
SliderMultiplier:1.4
SliderTickRate:1

[TimingPoints]
0,500,4,2,0,60,1,0
10000,400,4,2,0,60,1,0

[HitObjects]
256,192,1000,1,0,0:0:0:0:
256,192,2000,5,0,0:0:0:0:
256,192,3000,2,0,B|356:192,1,100
256,192,11000,6,0,B|536:192,2,280
256,192,13000,12,0,14000,0:0:0:0:
";

    #[test]
    fn test_parse_metadata_and_difficulty() {
        let map = BeatmapFile::parse(SAMPLE_MAP).unwrap();

        assert_eq!(map.format_version, 14);
        assert_eq!(map.mode, Ruleset::Osu);
        assert_eq!(map.title, "Test Song");
        assert_eq!(map.version, "Insane");
        assert_eq!(map.cs, 4.0);
        assert_eq!(map.ar, 9.0);
        assert_eq!(map.od, 8.0);
    }

    #[test]
    fn test_object_counts_and_combo() {
        let map = BeatmapFile::parse(SAMPLE_MAP).unwrap();

        assert_eq!(
            map.counts,
            ObjectCounts {
                circles: 2,
                sliders: 2,
                spinners: 1,
                holds: 0
            }
        );
        // 2 circles + (head + tail) + (head + 2 ends + 1 tick per span * 2) + spinner
        assert_eq!(map.max_combo, 2 + 2 + 5 + 1);
        assert_eq!(map.object_times, vec![1000.0, 2000.0, 3000.0, 11000.0, 13000.0]);
    }

    #[test]
    fn test_lengths_and_bpm() {
        let map = BeatmapFile::parse(SAMPLE_MAP).unwrap();

        assert_eq!(map.total_length_ms, 14000.0);
        assert_eq!(map.drain_length_ms, 13000.0);
        let bpm = map.bpm.unwrap();
        assert!((bpm.min - 120.0).abs() < 1e-9);
        assert!((bpm.max - 150.0).abs() < 1e-9);
        assert!((bpm.dominant - 120.0).abs() < 1e-9);
    }

    #[test]
    fn test_inherited_points_speed_up_sliders() {
        let content = "osu file format v14
[Difficulty]
SliderMultiplier:1
SliderTickRate:1
[TimingPoints]
0,1000,4,2,0,60,1,0
0,-50,4,2,0,60,0,0
[HitObjects]
0,0,100,2,0,L|100:0,1,300
";
        let map = BeatmapFile::parse(content).unwrap();
        // 2x velocity: 200px per beat, ticks every 200px -> one tick in 300px
        assert_eq!(map.max_combo, 3);
    }

    #[test]
    fn test_missing_ar_falls_back_to_od() {
        let content = "osu file format v5\n[Difficulty]\nOverallDifficulty:6\n";
        let map = BeatmapFile::parse(content).unwrap();
        assert_eq!(map.ar, 6.0);
        assert!(map.bpm.is_none());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let content = "osu file format v14
[TimingPoints]
garbage
[HitObjects]
1,2
256,192,abc,1,0
256,192,500,1,0,0:0:0:0:
";
        let map = BeatmapFile::parse(content).unwrap();
        assert_eq!(map.counts.circles, 1);
    }

    #[test]
    fn test_rejects_non_beatmap() {
        assert!(BeatmapFile::parse("hello world").is_err());
    }

    #[test]
    fn test_mania_holds() {
        let content = "osu file format v14
[General]
Mode: 3
[HitObjects]
64,192,1000,1,0,0:0:0:0:
64,192,2000,128,0,2500:0:0:0:0:
";
        let map = BeatmapFile::parse(content).unwrap();
        assert_eq!(map.mode, Ruleset::Mania);
        assert_eq!(map.counts.holds, 1);
        assert_eq!(map.max_combo, 3);
        assert_eq!(map.total_length_ms, 2500.0);
    }

    #[test]
    fn test_cache_parses_once_per_path() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.osu");
        let b = dir.path().join("b.osu");
        fs::write(&a, SAMPLE_MAP).unwrap();
        fs::write(&b, "not a map").unwrap();
        let mut cache = MapFileCache::new();

        assert!(cache.get(&a).is_some());
        assert!(cache.get(&a).is_some());
        assert_eq!(cache.parse_count(), 1);

        assert!(cache.get(&b).is_none());
        assert!(cache.get(&b).is_none());
        assert_eq!(cache.parse_count(), 2);

        assert!(cache.get(&a).is_some());
        assert_eq!(cache.parse_count(), 3);
    }

    #[test]
    fn test_absurd_repeat_count_is_clamped() {
        let content = "osu file format v14
[TimingPoints]
0,500,4,2,0,60,1,0
[HitObjects]
0,0,1000,2,0,L|100:0,4294967295,300
";
        let map = BeatmapFile::parse(content).unwrap();
        assert_eq!(map.counts.sliders, 1);
        assert!(map.max_combo > MAX_SLIDES);
        assert!(map.max_combo < u32::MAX);
    }

    #[test]
    fn test_latin1_metadata_still_parses() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.osu");
        let mut bytes = b"osu file format v7\n[Metadata]\nTitle:Caf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b"\n[HitObjects]\n0,0,1000,1,0\n0,0,2000,1,0\n");
        fs::write(&path, bytes).unwrap();

        let map = BeatmapFile::from_path(&path).unwrap();
        assert_eq!(map.title, "Café");
        assert_eq!(map.counts.circles, 2);
        assert_eq!(map.max_combo, 2);
    }
}
