//! Configuration.
//!
//! Named constant groups used across the crate, plus the runtime
//! [`TrackerConfig`] / [`DetectorConfig`] assembled once at startup and passed
//! down by ownership.

mod settings;

pub use settings::*;

/// Memory access limits.
pub mod memory {
    /// Bytes read per signature-scan chunk (4MB).
    pub const SCAN_CHUNK_SIZE: usize = crate::process::DEFAULT_SCAN_CHUNK;

    /// Upper bound on characters read for one managed string.
    pub const MAX_STRING_CHARS: usize = 4096;

    /// Upper bound on elements read from one managed array, list or dictionary.
    pub const MAX_COLLECTION_ITEMS: usize = 16384;
}

/// Poll loop timing.
pub mod polling {
    use std::time::Duration;

    /// Interval between snapshot polls.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Minimum time between two connection attempts of the same client reader.
    /// Connecting walks the whole address space, so this stays in seconds.
    pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(3);

    /// Interval for `status --watch`.
    pub const STATUS_WATCH_INTERVAL: Duration = Duration::from_millis(500);
}

/// Play-completion detector thresholds.
pub mod detector {
    /// Consecutive polls showing the same nonzero results score before it is trusted.
    pub const STABILIZATION_POLLS: u32 = 5;

    /// Elapsed-time regression (ms) that counts as a retry.
    pub const RETRY_REWIND_MS: f64 = 1000.0;

    /// The previous sample must be at least this far into the map (ms) for a rewind
    /// to count as a retry.
    pub const RETRY_MIN_PROGRESS_MS: f64 = 1000.0;

    /// Judged/total object ratio band accepted on a results capture. The upper
    /// bound is per judgement slot and scales with the ruleset (mania holds
    /// judge head and tail, catch droplets are unbounded).
    pub const RESULTS_RATIO_MIN: f64 = 0.9;
    pub const RESULTS_RATIO_MAX: f64 = 1.05;

    /// Accuracy ceiling (float slack above 1.0).
    pub const MAX_ACCURACY: f64 = 1.0001;

    /// Largest score accepted by validation.
    pub const MAX_SCORE: i64 = i32::MAX as i64;
}

/// Offset registry sources.
pub mod offsets {
    use std::time::Duration;

    /// File name looked up in each candidate directory.
    pub const FILE_NAME: &str = "offsets.json";

    /// Remote fallback used when no populated local file exists.
    pub const DEFAULT_REMOTE_URL: &str =
        "https://raw.githubusercontent.com/osumeter/osumeter-offsets/main/offsets.json";

    pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Remote fetch retry configuration.
///
/// Exponential backoff: 500ms → 1000ms → 2000ms between four attempts.
pub mod retry {
    /// Maximum number of attempts for a remote offsets fetch.
    pub const MAX_FETCH_ATTEMPTS: u32 = 4;

    /// Delay (in ms) after each failed attempt.
    pub const RETRY_DELAYS_MS: [u64; 3] = [500, 1000, 2000];
}

/// Deferred replay enrichment.
pub mod enrichment {
    use std::time::Duration;

    /// Attempts made to find the replay written for a recorded play.
    pub const REPLAY_SEARCH_ATTEMPTS: u32 = 10;

    /// Delay between replay search attempts.
    pub const REPLAY_SEARCH_DELAY: Duration = Duration::from_secs(2);

    /// Replays modified earlier than the play end minus this slack are ignored.
    pub const REPLAY_MTIME_SLACK: Duration = Duration::from_secs(10);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_constants() {
        assert_eq!(detector::STABILIZATION_POLLS, 5);
        assert!(detector::RESULTS_RATIO_MIN < 1.0);
        assert!(detector::RESULTS_RATIO_MAX > 1.0);
    }

    #[test]
    fn test_enrichment_budget() {
        let total = enrichment::REPLAY_SEARCH_DELAY * enrichment::REPLAY_SEARCH_ATTEMPTS;
        assert_eq!(total.as_secs(), 20);
    }
}
