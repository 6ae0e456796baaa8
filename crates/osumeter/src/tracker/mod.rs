//! Poll loop tying a client reader to the play detector.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::config::TrackerConfig;
use crate::detector::{CompletedPlay, DetectorEvent, PlayDetector};
use crate::enrich::{EnrichmentWorker, ReplaySearch};
use crate::game::{GameState, ModList, Ruleset, Snapshot};
use crate::performance::{
    MapInfo, MapStats, MapStatsCache, PerformanceCalculator, PerformanceInput,
    StructuralCalculator,
};
use crate::reader::ClientReader;
use crate::storage::{PlayStore, format_play_console};

/// Called once per recorded play with whether it was handed to persistence.
pub type PlayCallback = Box<dyn FnMut(bool) + Send>;

pub struct Tracker<R> {
    reader: R,
    detector: PlayDetector,
    calculator: Box<dyn PerformanceCalculator>,
    stats_cache: MapStatsCache,
    stats: Option<MapStats>,
    ruleset: Option<Ruleset>,
    worker: EnrichmentWorker<Box<dyn PlayStore>>,
    on_play_recorded: Option<PlayCallback>,
    poll_interval: Duration,
    print_plays: bool,
    last_state: GameState,
    snapshot: Snapshot,
}

impl<R: ClientReader> Tracker<R> {
    /// Starts the background persistence worker for `store`.
    pub fn new(reader: R, store: Box<dyn PlayStore>, config: &TrackerConfig) -> Self {
        let search = config.replay_dir.clone().map(ReplaySearch::new);
        Self {
            reader,
            detector: PlayDetector::new(config.detector.clone()),
            calculator: Box::new(StructuralCalculator::new()),
            stats_cache: MapStatsCache::new(),
            stats: None,
            ruleset: None,
            worker: EnrichmentWorker::spawn(store, search),
            on_play_recorded: None,
            poll_interval: config.poll_interval,
            print_plays: config.print_plays,
            last_state: GameState::Unknown,
            snapshot: Snapshot::no_data(),
        }
    }

    pub fn with_calculator(mut self, calculator: Box<dyn PerformanceCalculator>) -> Self {
        self.calculator = calculator;
        self.stats_cache.invalidate();
        self
    }

    pub fn on_play_recorded<F>(mut self, callback: F) -> Self
    where
        F: FnMut(bool) + Send + 'static,
    {
        self.on_play_recorded = Some(Box::new(callback));
        self
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    pub fn detector(&self) -> &PlayDetector {
        &self.detector
    }

    /// Snapshot of the last poll, with derived values filled in.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Derived statistics of the current map and mods.
    pub fn map_stats(&self) -> Option<&MapStats> {
        self.stats.as_ref()
    }

    /// Run until `shutdown` is set.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        debug!("Starting tracker loop...");
        loop {
            if shutdown.load(Ordering::SeqCst) {
                debug!("Shutdown signal received, exiting tracker loop");
                break;
            }
            self.poll_once();
            thread::sleep(self.poll_interval);
        }
    }

    /// One select, read, detect cycle.
    pub fn poll_once(&mut self) -> Vec<DetectorEvent> {
        let mut snapshot = self.reader.snapshot();
        self.apply_performance(&mut snapshot);

        if snapshot.state != self.last_state {
            debug!("State changed: {:?} -> {:?}", self.last_state, snapshot.state);
            self.last_state = snapshot.state;
        }

        let events = self.detector.observe(&snapshot);
        for event in &events {
            if let DetectorEvent::Recorded(play) = event {
                self.dispatch(play);
            }
        }
        self.snapshot = snapshot;
        events
    }

    /// Wait for queued plays to be stored and return the store.
    pub fn finish(self) -> Option<Box<dyn PlayStore>> {
        info!("Waiting for pending plays to be saved...");
        self.worker.finish()
    }

    fn dispatch(&mut self, play: &CompletedPlay) {
        if self.print_plays {
            print!("{}", format_play_console(play));
        }
        let queued = self.worker.submit(play.clone());
        if !queued {
            error!("Persistence worker stopped, play on {} lost", play.map.hash);
        }
        if let Some(callback) = self.on_play_recorded.as_mut() {
            callback(queued);
        }
    }

    fn apply_performance(&mut self, snapshot: &mut Snapshot) {
        if snapshot.ruleset != self.ruleset {
            self.ruleset = snapshot.ruleset;
            self.stats_cache.invalidate();
        }
        let Some(hash) = snapshot.map_hash.clone().filter(|h| !h.is_empty()) else {
            self.stats = None;
            return;
        };

        let map = MapInfo {
            hash,
            ruleset: snapshot.ruleset_or_default(),
            cs: snapshot.cs.unwrap_or(5.0),
            ar: snapshot.ar.unwrap_or(5.0),
            od: snapshot.od.unwrap_or(5.0),
            hp: snapshot.hp.unwrap_or(5.0),
            max_combo: snapshot.map_max_combo,
            object_count: snapshot.object_count,
            length_ms: snapshot.map_length_ms,
            star_rating: snapshot.star_rating,
        };
        let no_mods = ModList::default();
        let mods = snapshot.mods.as_ref().unwrap_or(&no_mods);

        let stats = self.stats_cache.get(self.calculator.as_ref(), &map, mods);
        snapshot.star_rating = snapshot.star_rating.or(stats.star_rating);
        snapshot.map_max_combo = snapshot.map_max_combo.or(stats.max_combo);
        self.stats = Some(stats);

        if snapshot.pp.is_none()
            && let Some(hits) = snapshot.hits
        {
            let input = PerformanceInput {
                mods,
                hits,
                combo: snapshot.max_combo.unwrap_or(0),
                passed_objects: hits.judged(map.ruleset),
                clock_rate: mods.clock_rate(),
                overrides: mods.difficulty,
            };
            snapshot.pp = self.calculator.compute(&map, &input).pp;
        }
    }
}
