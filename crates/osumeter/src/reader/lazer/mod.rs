//! Lazer client reader (64-bit).
//!
//! One heap scan finds the game object; every poll then walks bindables
//! hanging off it. Map structure is not exposed in memory, so the `.osu` file
//! is read from the client's hashed file store.

mod layout;
mod mods;
mod screens;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

pub use layout::LazerLayout;
pub use mods::{ModHandle, ModIdentityMap};
pub use screens::ScreenKind;

use crate::config::polling::RECONNECT_COOLDOWN;
use crate::error::{Error, Result};
use crate::game::{HitCounts, MapFileCache, Ruleset, Snapshot};
use crate::offset::OffsetRegistry;
use crate::process::{
    Architecture, DictionaryEntry, MemoryEngine, ProcessInfo, ProcessProvider, ReadMemory,
    RegionFilter, Signature,
};
use crate::reader::{
    CLIENT_IMAGE_NAMES, ClientReader, ReconnectThrottle, apply_map_file, discard_impossible_combo,
    non_empty,
};

/// `HitResult` values used in statistics dictionaries.
mod hit_result {
    pub const MISS: i32 = 1;
    pub const MEH: i32 = 2;
    pub const OK: i32 = 3;
    pub const GOOD: i32 = 4;
    pub const GREAT: i32 = 5;
    pub const PERFECT: i32 = 6;
    pub const SMALL_TICK_MISS: i32 = 7;
    pub const SMALL_TICK_HIT: i32 = 8;
    pub const LARGE_TICK_MISS: i32 = 9;
    pub const LARGE_TICK_HIT: i32 = 10;
}

/// Map a statistics dictionary to counters.
///
/// Catch reuses the stable slots: fruits as great, drops as ok, droplets as
/// meh and missed droplets as good. Negative values are torn reads and count
/// as nothing.
pub fn hit_counts_from_statistics(ruleset: Ruleset, entries: &[DictionaryEntry]) -> HitCounts {
    use hit_result::*;

    let count = |key: i32| -> u32 {
        entries
            .iter()
            .filter(|e| e.key == key)
            .filter_map(|e| i32::try_from(e.value).ok())
            .fold(0u32, |total, n| total.saturating_add(n.unsigned_abs()))
    };

    match ruleset {
        Ruleset::Catch => HitCounts {
            great: count(GREAT),
            ok: count(LARGE_TICK_HIT),
            meh: count(SMALL_TICK_HIT),
            miss: count(MISS).saturating_add(count(LARGE_TICK_MISS)),
            perfect: 0,
            good: count(SMALL_TICK_MISS),
            ticks: 0,
        },
        _ => HitCounts {
            great: count(GREAT),
            ok: count(OK),
            meh: count(MEH),
            miss: count(MISS),
            perfect: count(PERFECT),
            good: count(GOOD),
            ticks: count(SMALL_TICK_HIT).saturating_add(count(LARGE_TICK_HIT)),
        },
    }
}

/// `<data>/files/<h0>/<h0h1>/<hash>`
pub fn hashed_file_path(data_dir: &Path, hash: &str) -> Option<PathBuf> {
    if hash.len() < 2 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(
        data_dir
            .join("files")
            .join(&hash[..1])
            .join(&hash[..2])
            .join(hash),
    )
}

struct Connection<R: ReadMemory> {
    engine: MemoryEngine<R>,
    game: u64,
    data_dir: Option<PathBuf>,
}

pub struct LazerReader<P: ProcessProvider> {
    provider: P,
    layout: LazerLayout,
    throttle: ReconnectThrottle,
    data_dir: Option<PathBuf>,
    connection: Option<Connection<P::Process>>,
    identities: ModIdentityMap,
    map_files: MapFileCache,
}

impl<P: ProcessProvider> LazerReader<P> {
    pub fn new(provider: P, registry: &OffsetRegistry) -> Self {
        Self {
            provider,
            layout: LazerLayout::from_registry(registry),
            throttle: ReconnectThrottle::new(RECONNECT_COOLDOWN),
            data_dir: None,
            connection: None,
            identities: ModIdentityMap::new(),
            map_files: MapFileCache::new(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.throttle = ReconnectThrottle::new(cooldown);
        self
    }

    /// Client data directory holding the hashed `files/` store.
    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir = dir;
        self
    }

    pub fn identities(&self) -> &ModIdentityMap {
        &self.identities
    }

    fn connect(&self) -> Result<Connection<P::Process>> {
        let process = self
            .provider
            .find_process(CLIENT_IMAGE_NAMES, Architecture::X64)?;
        let engine = MemoryEngine::new(process, Architecture::X64);

        let signature = Signature::parse(&self.layout.game_signature)?.with_nonzero_wildcards();
        let candidates = engine.scan_all(&signature, RegionFilter::Private);
        debug!("{} game anchor candidates", candidates.len());

        let game = candidates
            .into_iter()
            .map(|found| engine.read_ptr(found.wrapping_add_signed(self.layout.game_delta)))
            .find(|&game| self.looks_like_game(&engine, game))
            .ok_or_else(|| Error::SignatureNotFound(self.layout.game_signature.clone()))?;

        Ok(Connection {
            engine,
            game,
            data_dir: self.data_dir.clone(),
        })
    }

    /// The game object has a type, an API reference and a screen stack.
    fn looks_like_game(&self, engine: &MemoryEngine<P::Process>, game: u64) -> bool {
        engine.is_valid_pointer(game)
            && engine.is_valid_pointer(engine.read_ptr(game))
            && engine.is_valid_pointer(engine.read_ptr(game.wrapping_add_signed(self.layout.game.api)))
            && engine.is_valid_pointer(
                engine.read_ptr(game.wrapping_add_signed(self.layout.game.screen_stack)),
            )
    }
}

impl<P: ProcessProvider> ClientReader for LazerReader<P> {
    fn name(&self) -> &'static str {
        "lazer"
    }

    fn initialize(&mut self) -> bool {
        if self.is_connected() {
            return true;
        }
        self.connection = None;
        if !self.throttle.try_begin() {
            return false;
        }

        match self.connect() {
            Ok(connection) => {
                info!(
                    "Attached to lazer client (pid {}, game object {:#x})",
                    connection.engine.source().pid(),
                    connection.game
                );
                self.connection = Some(connection);
                self.identities.invalidate();
                self.map_files.clear();
                true
            }
            Err(e @ Error::ProcessNotFound(_)) => {
                debug!("{}", e);
                false
            }
            Err(e) => {
                warn!("Lazer client found but not readable: {}", e);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.engine.source().is_alive())
    }

    fn snapshot(&mut self) -> Snapshot {
        if !self.is_connected() {
            if self.connection.take().is_some() {
                info!("Lazer client exited");
            }
            return Snapshot::no_data();
        }
        let Some(connection) = &self.connection else {
            return Snapshot::no_data();
        };

        let mut snapshot = connection.read(&self.layout, &mut self.identities);
        if let Some(path) = &snapshot.map_file
            && let Some(map) = self.map_files.get(path)
        {
            apply_map_file(&mut snapshot, &map);
        }
        discard_impossible_combo(&mut snapshot);
        snapshot
    }
}

impl<R: ReadMemory> Connection<R> {
    fn bindable(&self, layout: &LazerLayout, owner: u64, field: i64) -> u64 {
        self.engine
            .follow(owner, &[field, layout.collections.bindable_value])
    }

    fn number_slot(&self, layout: &LazerLayout, owner: u64, field: i64) -> u64 {
        let bindable = self.engine.read_ptr(owner.wrapping_add_signed(field));
        if bindable == 0 {
            return 0;
        }
        bindable.wrapping_add_signed(layout.collections.number_value)
    }

    fn read(&self, layout: &LazerLayout, identities: &mut ModIdentityMap) -> Snapshot {
        let engine = &self.engine;
        let api = engine.read_ptr(self.game.wrapping_add_signed(layout.game.api));
        let screen = engine.current_screen(layout, self.game);
        let kind = if screen == 0 {
            None
        } else {
            Some(engine.classify_screen(layout, api, screen))
        };

        let mut snapshot = Snapshot::with_state(kind.map(|k| k.state()).unwrap_or_default());
        snapshot.client = Some("lazer".to_string());

        let ruleset_info = self.bindable(layout, self.game, layout.game.ruleset);
        let ruleset = Ruleset::from_id(
            engine.read_i32(ruleset_info.wrapping_add_signed(layout.beatmap.ruleset_online_id)),
        );
        snapshot.ruleset = ruleset.filter(|_| ruleset_info != 0);

        self.read_beatmap(layout, &mut snapshot);

        if let Some(ruleset) = snapshot.ruleset {
            if !identities.is_built_for(ruleset) {
                self.build_identities(layout, identities, ruleset);
            }
            let selected = self.bindable(layout, self.game, layout.game.selected_mods);
            let c = &layout.collections;
            let instances = engine.read_list(selected, c.list_items, c.list_size);
            snapshot.mods = Some(engine.read_mod_list(layout, identities, &instances));
        }

        match kind {
            Some(ScreenKind::Player) => self.read_player(layout, screen, &mut snapshot),
            Some(ScreenKind::Results) => self.read_results(layout, screen, &mut snapshot),
            Some(ScreenKind::SongSelect) => snapshot.is_preview = snapshot.has_map(),
            _ => {}
        }
        snapshot
    }

    fn build_identities(&self, layout: &LazerLayout, identities: &mut ModIdentityMap, ruleset: Ruleset) {
        let engine = &self.engine;
        let c = &layout.collections;
        let available = self.bindable(layout, self.game, layout.game.available_mods);
        let mut groups =
            engine.read_ref_dictionary(available, c.dictionary_entries, c.dictionary_count);
        if groups.is_empty() {
            // Not populated yet; retry on the next poll.
            identities.invalidate();
            return;
        }
        // Mod types in declaration order
        groups.sort_by_key(|g| g.key);

        let instances: Vec<u64> = groups
            .iter()
            .flat_map(|g| engine.read_list(g.value, c.list_items, c.list_size))
            .collect();
        let handles = engine.flatten_mods(layout, &instances);
        identities.build(ruleset, &handles);
    }

    fn read_beatmap(&self, layout: &LazerLayout, snapshot: &mut Snapshot) {
        let engine = &self.engine;
        let b = &layout.beatmap;
        let working = self.bindable(layout, self.game, layout.game.beatmap);
        let info = engine.read_ptr(working.wrapping_add_signed(b.working_info));
        if working == 0 || info == 0 {
            return;
        }
        let at = |base: u64, offset: i64| base.wrapping_add_signed(offset);

        snapshot.map_hash = non_empty(engine.read_string_field(at(info, b.md5)));
        if snapshot.map_hash.is_none() {
            return;
        }
        snapshot.difficulty_name = non_empty(engine.read_string_field(at(info, b.difficulty_name)));

        let metadata = engine.read_ptr(at(info, b.metadata));
        if metadata != 0 {
            snapshot.title = non_empty(engine.read_string_field(at(metadata, b.title)));
            snapshot.artist = non_empty(engine.read_string_field(at(metadata, b.artist)));
        }

        let difficulty = engine.read_ptr(at(info, b.difficulty));
        if difficulty != 0 {
            snapshot.hp = Some(engine.read_f32(at(difficulty, b.drain_rate)));
            snapshot.cs = Some(engine.read_f32(at(difficulty, b.circle_size)));
            snapshot.od = Some(engine.read_f32(at(difficulty, b.overall_difficulty)));
            snapshot.ar = Some(engine.read_f32(at(difficulty, b.approach_rate)));
        }

        let stars = engine.read_f64(at(info, b.star_rating));
        snapshot.star_rating = (stars > 0.0).then_some(stars);
        let length = engine.read_f64(at(info, b.length));
        snapshot.map_length_ms = (length > 0.0).then_some(length);
        let objects = engine.read_i32(at(info, b.object_count));
        snapshot.object_count = (objects > 0).then_some(objects as u32);

        let file_hash = engine.read_string_field(at(info, b.hash));
        snapshot.map_file = self
            .data_dir
            .as_deref()
            .and_then(|dir| hashed_file_path(dir, &file_hash));
    }

    fn read_player(&self, layout: &LazerLayout, player: u64, snapshot: &mut Snapshot) {
        let engine = &self.engine;
        let p = &layout.player;
        let at = |base: u64, offset: i64| base.wrapping_add_signed(offset);

        let processor = engine.read_ptr(at(player, p.score_processor));
        if processor != 0 {
            snapshot.score = Some(engine.read_i64(self.number_slot(layout, processor, p.total_score)));
            snapshot.accuracy = Some(engine.read_f64(self.number_slot(layout, processor, p.accuracy)));
            snapshot.combo =
                Some(engine.read_i32(self.number_slot(layout, processor, p.combo)).max(0) as u32);
            snapshot.max_combo = Some(
                engine
                    .read_i32(self.number_slot(layout, processor, p.highest_combo))
                    .max(0) as u32,
            );
            let statistics = engine.read_ptr(at(processor, p.statistics));
            snapshot.hits = Some(self.read_statistics(layout, statistics, snapshot.ruleset_or_default()));
        }

        // A missing bindable is unknown health, not an empty bar
        let health = engine.read_ptr(at(player, p.health_processor));
        let slot = self.number_slot(layout, health, p.health);
        if health != 0 && engine.is_valid_pointer(slot) {
            snapshot.health = engine.try_read_f64(slot).map(|v| v.clamp(0.0, 1.0));
        }

        let clock = engine.read_ptr(at(player, p.clock_container));
        if clock != 0 {
            snapshot.time_ms = Some(engine.read_f64(at(clock, p.current_time)));
            snapshot.is_paused = engine.read_bool(self.number_slot(layout, clock, p.is_paused));
        }

        let drawable = engine.read_ptr(at(player, p.drawable_ruleset));
        snapshot.is_replay = drawable != 0 && engine.read_ptr(at(drawable, p.replay_score)) != 0;
    }

    fn read_results(&self, layout: &LazerLayout, screen: u64, snapshot: &mut Snapshot) {
        let engine = &self.engine;
        let r = &layout.results;
        let score = engine.read_ptr(screen.wrapping_add_signed(r.score));
        if score == 0 {
            return;
        }
        let at = |offset: i64| score.wrapping_add_signed(offset);

        snapshot.results_ready = true;
        snapshot.score = Some(engine.read_i64(at(r.total_score)));
        snapshot.accuracy = Some(engine.read_f64(at(r.accuracy)));
        snapshot.max_combo = Some(engine.read_i32(at(r.max_combo)).max(0) as u32);
        let statistics = engine.read_ptr(at(r.statistics));
        snapshot.hits = Some(self.read_statistics(layout, statistics, snapshot.ruleset_or_default()));
    }

    fn read_statistics(&self, layout: &LazerLayout, dictionary: u64, ruleset: Ruleset) -> HitCounts {
        let c = &layout.collections;
        let entries =
            self.engine
                .read_int_dictionary(dictionary, c.dictionary_entries, c.dictionary_count);
        hit_counts_from_statistics(ruleset, &entries)
    }
}
