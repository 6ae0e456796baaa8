use std::path::PathBuf;
use std::time::Duration;

use super::{detector, offsets, polling};

/// Tunables for the play-completion detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub stabilization_polls: u32,
    pub retry_rewind_ms: f64,
    pub retry_min_progress_ms: f64,
    pub results_ratio_min: f64,
    pub results_ratio_max: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            stabilization_polls: detector::STABILIZATION_POLLS,
            retry_rewind_ms: detector::RETRY_REWIND_MS,
            retry_min_progress_ms: detector::RETRY_MIN_PROGRESS_MS,
            results_ratio_min: detector::RESULTS_RATIO_MIN,
            results_ratio_max: detector::RESULTS_RATIO_MAX,
        }
    }
}

/// Runtime configuration of a tracking session.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub poll_interval: Duration,
    pub reconnect_cooldown: Duration,
    pub detector: DetectorConfig,
    /// Offset files tried in order; a fetched file is written to the first one.
    pub offset_paths: Vec<PathBuf>,
    /// Remote offsets fallback, `None` disables fetching.
    pub remote_offsets_url: Option<String>,
    /// Directory for JSON session files, `None` keeps plays in memory only.
    pub session_dir: Option<PathBuf>,
    /// osu!stable install directory, otherwise derived from the running executable.
    pub stable_dir: Option<PathBuf>,
    /// osu!lazer data directory, otherwise the platform default.
    pub lazer_data_dir: Option<PathBuf>,
    /// Directory searched for freshly written replays.
    pub replay_dir: Option<PathBuf>,
    /// Print recorded plays to stdout.
    pub print_plays: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval: polling::POLL_INTERVAL,
            reconnect_cooldown: polling::RECONNECT_COOLDOWN,
            detector: DetectorConfig::default(),
            offset_paths: default_offset_paths(),
            remote_offsets_url: Some(offsets::DEFAULT_REMOTE_URL.to_string()),
            session_dir: Some(PathBuf::from("sessions")),
            stable_dir: None,
            lazer_data_dir: None,
            replay_dir: None,
            print_plays: true,
        }
    }
}

impl TrackerConfig {
    pub fn builder() -> TrackerConfigBuilder {
        TrackerConfigBuilder::default()
    }

    /// Lazer data directory: the override, else `%APPDATA%/osu`.
    pub fn resolved_lazer_data_dir(&self) -> Option<PathBuf> {
        self.lazer_data_dir
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("osu")))
    }
}

/// Offset file candidates: working directory first, then the user config directory.
pub fn default_offset_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(offsets::FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("osumeter").join(offsets::FILE_NAME));
    }
    paths
}

#[derive(Debug, Default)]
pub struct TrackerConfigBuilder {
    config: TrackerConfig,
}

impl TrackerConfigBuilder {
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.reconnect_cooldown = cooldown;
        self
    }

    pub fn detector(mut self, detector: DetectorConfig) -> Self {
        self.config.detector = detector;
        self
    }

    pub fn stabilization_polls(mut self, polls: u32) -> Self {
        self.config.detector.stabilization_polls = polls.max(1);
        self
    }

    /// Replace the offset candidates; an empty list keeps the defaults.
    pub fn offset_paths(mut self, paths: Vec<PathBuf>) -> Self {
        if !paths.is_empty() {
            self.config.offset_paths = paths;
        }
        self
    }

    pub fn remote_offsets_url(mut self, url: Option<String>) -> Self {
        self.config.remote_offsets_url = url;
        self
    }

    pub fn session_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.session_dir = dir;
        self
    }

    pub fn stable_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.stable_dir = dir;
        self
    }

    pub fn lazer_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.lazer_data_dir = dir;
        self
    }

    pub fn replay_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.config.replay_dir = dir;
        self
    }

    pub fn print_plays(mut self, print: bool) -> Self {
        self.config.print_plays = print;
        self
    }

    pub fn build(self) -> TrackerConfig {
        self.config
    }
}
