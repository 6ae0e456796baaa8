use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, trace};

use crate::config::enrichment;
use crate::detector::{CompletedPlay, ReplayLink};
use crate::enrich::ReplayHeader;
use crate::retry::{FixedDelay, RetryStrategy};

/// Looks for the replay a client wrote for a recorded play.
#[derive(Debug, Clone)]
pub struct ReplaySearch {
    dir: PathBuf,
    retry: FixedDelay,
    slack: Duration,
}

impl ReplaySearch {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            retry: FixedDelay::new(
                enrichment::REPLAY_SEARCH_ATTEMPTS,
                enrichment::REPLAY_SEARCH_DELAY,
            ),
            slack: enrichment::REPLAY_MTIME_SLACK,
        }
    }

    pub fn with_retry(mut self, retry: FixedDelay) -> Self {
        self.retry = retry;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Poll the directory until a matching replay shows up or attempts run out.
    pub fn find(&self, play: &CompletedPlay) -> Option<ReplayLink> {
        let started = SystemTime::from(play.started_at);
        let not_before = started.checked_sub(self.slack).unwrap_or(started);

        self.retry
            .execute(|attempt| {
                trace!("Replay search attempt {} in {}", attempt + 1, self.dir.display());
                self.scan(play, not_before).ok_or(())
            })
            .ok()
    }

    /// Newest replays first; a header whose counts agree wins over one that
    /// only shares the beatmap hash.
    fn scan(&self, play: &CompletedPlay, not_before: SystemTime) -> Option<ReplayLink> {
        let entries = fs::read_dir(&self.dir).ok()?;

        let mut candidates: Vec<(SystemTime, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("osr"))
            })
            .filter_map(|path| {
                let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
                (modified >= not_before).then_some((modified, path))
            })
            .collect();
        candidates.sort_by(|a, b| b.0.cmp(&a.0));

        let mut fallback = None;
        for (_, path) in candidates {
            let header = match ReplayHeader::read(&path) {
                Ok(header) => header,
                Err(e) => {
                    debug!("Skipping replay {}: {}", path.display(), e);
                    continue;
                }
            };
            if !header.beatmap_hash.eq_ignore_ascii_case(&play.map.hash) {
                continue;
            }

            let link = ReplayLink {
                counts_match: header.counts_match(&play.hits),
                replay_hash: header.replay_hash,
                path,
            };
            if link.counts_match {
                return Some(link);
            }
            fallback.get_or_insert(link);
        }
        fallback
    }
}
