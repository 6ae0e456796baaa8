//! Client readers.
//!
//! The stable (32-bit) and lazer (64-bit) clients lay their objects out in
//! incompatible ways. Each gets one [`ClientReader`] implementation; the
//! [`ReaderSelector`] decides which one is live.

pub mod lazer;
mod selector;
pub mod stable;

use std::time::{Duration, Instant};

pub use lazer::LazerReader;
pub use selector::ReaderSelector;
pub use stable::StableReader;

use crate::game::{BeatmapFile, Snapshot};

/// Image name shared by both clients.
pub const CLIENT_IMAGE_NAMES: &[&str] = &["osu!.exe", "osu!"];

/// One way of turning a live game process into snapshots.
pub trait ClientReader {
    fn name(&self) -> &'static str;

    /// Try to attach to the game. Idempotent while connected; attempts made
    /// within the reconnect cooldown return `false` without touching the OS.
    fn initialize(&mut self) -> bool;

    fn is_connected(&self) -> bool;

    /// Read the current snapshot. Never fails: unreadable fields stay `None`
    /// and a lost process yields [`Snapshot::no_data`].
    fn snapshot(&mut self) -> Snapshot;
}

impl<T: ClientReader + ?Sized> ClientReader for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn initialize(&mut self) -> bool {
        (**self).initialize()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn snapshot(&mut self) -> Snapshot {
        (**self).snapshot()
    }
}

/// Gate limiting connection attempts to one per cooldown.
#[derive(Debug, Clone)]
pub struct ReconnectThrottle {
    cooldown: Duration,
    last_attempt: Option<Instant>,
}

impl ReconnectThrottle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_attempt: None,
        }
    }

    /// Returns true and starts a new cooldown when an attempt is allowed.
    pub fn try_begin(&mut self) -> bool {
        if let Some(last) = self.last_attempt
            && last.elapsed() < self.cooldown
        {
            return false;
        }
        self.last_attempt = Some(Instant::now());
        true
    }

    pub fn reset(&mut self) {
        self.last_attempt = None;
    }
}

/// Fill structural fields from a parsed map file.
pub(crate) fn apply_map_file(snapshot: &mut Snapshot, map: &BeatmapFile) {
    snapshot.object_count = Some(map.counts.total());
    snapshot.map_max_combo = Some(map.max_combo);
    snapshot.map_length_ms = Some(map.total_length_ms);
    if let Some(bpm) = map.bpm {
        snapshot.bpm = Some(bpm.dominant);
    }
    if snapshot.title.as_deref().is_none_or(str::is_empty) && !map.title.is_empty() {
        snapshot.title = Some(map.title.clone());
    }
    if snapshot.artist.as_deref().is_none_or(str::is_empty) && !map.artist.is_empty() {
        snapshot.artist = Some(map.artist.clone());
    }
}

/// Drop combo values the current map cannot produce.
///
/// A score object read during a screen transition can still belong to the
/// previous map.
pub(crate) fn discard_impossible_combo(snapshot: &mut Snapshot) {
    let Some(limit) = snapshot.map_max_combo.filter(|&m| m > 0) else {
        return;
    };
    if snapshot.combo.is_some_and(|c| c > limit) {
        snapshot.combo = None;
    }
    if snapshot.max_combo.is_some_and(|c| c > limit) {
        snapshot.max_combo = None;
    }
}

/// Empty strings read from memory mean "unknown".
pub(crate) fn non_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_blocks_within_cooldown() {
        let mut throttle = ReconnectThrottle::new(Duration::from_secs(60));
        assert!(throttle.try_begin());
        assert!(!throttle.try_begin());

        throttle.reset();
        assert!(throttle.try_begin());
    }

    #[test]
    fn test_throttle_zero_cooldown() {
        let mut throttle = ReconnectThrottle::new(Duration::ZERO);
        assert!(throttle.try_begin());
        assert!(throttle.try_begin());
    }

    #[test]
    fn test_discard_impossible_combo() {
        let mut snapshot = Snapshot {
            map_max_combo: Some(100),
            combo: Some(101),
            max_combo: Some(100),
            ..Default::default()
        };
        discard_impossible_combo(&mut snapshot);
        assert_eq!(snapshot.combo, None);
        assert_eq!(snapshot.max_combo, Some(100));
    }

    #[test]
    fn test_combo_kept_without_known_limit() {
        let mut snapshot = Snapshot {
            combo: Some(5000),
            ..Default::default()
        };
        discard_impossible_combo(&mut snapshot);
        assert_eq!(snapshot.combo, Some(5000));
    }
}
