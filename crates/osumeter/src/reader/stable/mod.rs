//! Stable client reader (32-bit).
//!
//! Four signatures in JIT code anchor static slots for the client status, the
//! current beatmap, the ruleset and the audio clock. Everything else is a
//! pointer walk from those slots on each poll.

mod layout;

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info, warn};

pub use layout::{Anchor, BeatmapOffsets, RulesetOffsets, ScoreOffsets, StableLayout};

use crate::config::polling::RECONNECT_COOLDOWN;
use crate::error::{Error, Result};
use crate::game::{GameState, HitCounts, MapFileCache, ModList, Ruleset, Snapshot};
use crate::offset::OffsetRegistry;
use crate::process::{
    Architecture, MemoryEngine, ProcessInfo, ProcessProvider, ReadMemory, RegionFilter, Signature,
};
use crate::reader::{
    CLIENT_IMAGE_NAMES, ClientReader, ReconnectThrottle, apply_map_file, discard_impossible_combo,
    non_empty,
};

/// Maximum health value of the stable HP bar.
const MAX_HEALTH: f64 = 200.0;

/// Resolved static slots.
#[derive(Debug, Clone, Copy)]
struct Slots {
    status: u64,
    beatmap: u64,
    rulesets: u64,
    play_time: Option<u64>,
    replay: Option<u64>,
}

struct Connection<R: ReadMemory> {
    engine: MemoryEngine<R>,
    slots: Slots,
    songs_dir: Option<PathBuf>,
}

pub struct StableReader<P: ProcessProvider> {
    provider: P,
    layout: StableLayout,
    throttle: ReconnectThrottle,
    songs_dir: Option<PathBuf>,
    connection: Option<Connection<P::Process>>,
    map_files: MapFileCache,
}

impl<P: ProcessProvider> StableReader<P> {
    pub fn new(provider: P, registry: &OffsetRegistry) -> Self {
        Self {
            provider,
            layout: StableLayout::from_registry(registry),
            throttle: ReconnectThrottle::new(RECONNECT_COOLDOWN),
            songs_dir: None,
            connection: None,
            map_files: MapFileCache::new(),
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.throttle = ReconnectThrottle::new(cooldown);
        self
    }

    /// Songs folder override. Defaults to `Songs` next to the executable.
    pub fn with_songs_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.songs_dir = dir;
        self
    }

    fn connect(&self) -> Result<Connection<P::Process>> {
        let process = self
            .provider
            .find_process(CLIENT_IMAGE_NAMES, Architecture::X86)?;
        let songs_dir = self.songs_dir.clone().or_else(|| {
            process
                .executable_path()
                .and_then(|exe| exe.parent().map(|dir| dir.join("Songs")))
        });
        let engine = MemoryEngine::new(process, Architecture::X86);

        let resolve = |anchor: &Anchor| -> Result<u64> {
            let signature = Signature::parse(&anchor.signature)?;
            engine
                .scan_first(&signature, RegionFilter::Executable)
                .map(|found| engine.read_ptr(found.wrapping_add_signed(anchor.delta)))
                .filter(|&slot| slot != 0)
                .ok_or_else(|| Error::SignatureNotFound(anchor.signature.clone()))
        };

        let slots = Slots {
            status: resolve(&self.layout.status)?,
            beatmap: resolve(&self.layout.base)?,
            rulesets: resolve(&self.layout.rulesets)?,
            play_time: resolve(&self.layout.play_time).ok(),
            replay: self.layout.replay.as_ref().and_then(|a| resolve(a).ok()),
        };
        debug!("Stable slots: {:X?}", slots);

        Ok(Connection {
            engine,
            slots,
            songs_dir,
        })
    }
}

impl<P: ProcessProvider> ClientReader for StableReader<P> {
    fn name(&self) -> &'static str {
        "stable"
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
                    "Attached to stable client (pid {})",
                    connection.engine.source().pid()
                );
                self.connection = Some(connection);
                self.map_files.clear();
                true
            }
            Err(e @ Error::ProcessNotFound(_)) => {
                debug!("{}", e);
                false
            }
            Err(e) => {
                warn!("Stable client found but not readable: {}", e);
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
                info!("Stable client exited");
            }
            return Snapshot::no_data();
        }
        let Some(connection) = &self.connection else {
            return Snapshot::no_data();
        };

        let mut snapshot = connection.read(&self.layout);
        if let Some(path) = &snapshot.map_file
            && let Some(map) = self.map_files.get(path)
        {
            apply_map_file(&mut snapshot, &map);
        }
        discard_impossible_combo(&mut snapshot);
        snapshot
    }
}

impl<R: ReadMemory + ProcessInfo> Connection<R> {
    fn read(&self, layout: &StableLayout) -> Snapshot {
        let engine = &self.engine;
        let status = engine.read_i32(self.slots.status);
        let mut snapshot = Snapshot::with_state(GameState::from_stable_status(status));
        snapshot.client = Some("stable".to_string());

        self.read_beatmap(layout, &mut snapshot);

        if let Some(time) = self.slots.play_time {
            snapshot.time_ms = Some(f64::from(engine.read_i32(time)));
        }
        if let Some(replay) = self.slots.replay {
            snapshot.is_replay = engine.read_bool(replay);
        }

        let ruleset = engine.read_ptr(self.slots.rulesets.wrapping_add_signed(layout.ruleset.current));
        if ruleset == 0 {
            return snapshot;
        }

        match snapshot.state {
            GameState::Playing => {
                let gameplay = engine.read_ptr(ruleset.wrapping_add_signed(layout.ruleset.gameplay));
                if gameplay == 0 {
                    return snapshot;
                }
                let score = engine.read_ptr(gameplay.wrapping_add_signed(layout.ruleset.gameplay_score));
                self.read_score(layout, score, &mut snapshot);

                let hp_bar = engine.read_ptr(gameplay.wrapping_add_signed(layout.ruleset.hp_bar));
                if engine.is_valid_pointer(hp_bar) {
                    snapshot.health = engine
                        .try_read_f64(hp_bar.wrapping_add_signed(layout.ruleset.hp_value))
                        .map(|hp| (hp / MAX_HEALTH).clamp(0.0, 1.0));
                }
            }
            GameState::ResultsScreen => {
                let score =
                    engine.read_ptr(ruleset.wrapping_add_signed(layout.ruleset.results_score));
                self.read_score(layout, score, &mut snapshot);
                snapshot.results_ready = score != 0;
            }
            _ => {}
        }
        snapshot
    }

    fn read_beatmap(&self, layout: &StableLayout, snapshot: &mut Snapshot) {
        let engine = &self.engine;
        let offsets = &layout.beatmap;
        let beatmap = engine.read_ptr(self.slots.beatmap);
        if beatmap == 0 {
            return;
        }
        let string = |offset: i64| non_empty(engine.read_string_field(beatmap.wrapping_add_signed(offset)));
        let float = |offset: i64| Some(engine.read_f32(beatmap.wrapping_add_signed(offset)));

        snapshot.map_hash = string(offsets.md5);
        if snapshot.map_hash.is_none() {
            return;
        }
        snapshot.title = string(offsets.title);
        snapshot.artist = string(offsets.artist);
        snapshot.difficulty_name = string(offsets.version);
        snapshot.ar = float(offsets.ar);
        snapshot.cs = float(offsets.cs);
        snapshot.hp = float(offsets.hp);
        snapshot.od = float(offsets.od);

        if let (Some(songs), Some(folder), Some(file)) = (
            &self.songs_dir,
            string(offsets.folder),
            string(offsets.file),
        ) {
            snapshot.map_file = Some(songs.join(folder).join(file));
        }
    }

    fn read_score(&self, layout: &StableLayout, score: u64, snapshot: &mut Snapshot) {
        if score == 0 {
            return;
        }
        let engine = &self.engine;
        let o = &layout.score;
        let at = |offset: i64| score.wrapping_add_signed(offset);
        let count = |offset: i64| u32::from(engine.read_u16(at(offset)));

        let mods = engine.read_ptr(at(o.mods));
        if mods != 0 {
            let bits = engine.read_i32(mods.wrapping_add_signed(o.mods_value))
                ^ engine.read_i32(mods.wrapping_add_signed(o.mods_key));
            snapshot.mods = Some(ModList::from_legacy_bits(bits as u32));
        }

        let ruleset = Ruleset::from_id(engine.read_i32(at(o.mode))).unwrap_or_default();
        let hits = HitCounts {
            great: count(o.hit300),
            ok: count(o.hit100),
            meh: count(o.hit50),
            miss: count(o.miss),
            perfect: count(o.geki),
            good: count(o.katu),
            ticks: 0,
        };

        snapshot.ruleset = Some(ruleset);
        snapshot.accuracy = Some(hits.accuracy(ruleset));
        snapshot.hits = Some(hits);
        snapshot.score = Some(i64::from(engine.read_i32(at(o.score))));
        snapshot.combo = Some(engine.read_i16(at(o.combo)).max(0) as u32);
        snapshot.max_combo = Some(engine.read_i16(at(o.max_combo)).max(0) as u32);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{MockMemoryBuilder, MockProvider};
    use tempfile::TempDir;

    const BASE: u64 = 0x40_0000;

    /// A 32-bit address space with all four anchors, a beatmap, a ruleset,
    /// a live score and a results score.
    fn stable_memory(status: i32) -> MockMemoryBuilder {
        MockMemoryBuilder::new()
            .base(BASE)
            .architecture(Architecture::X86)
            .with_size(0x2000)
            // status
            .write_ref(0x100, 0x800)
            .write_bytes(0x104, &[0x48, 0x83, 0xF8, 0x04, 0x73, 0x1E])
            .write_i32(0x800, status)
            // beatmap slot
            .write_ref(0x200, 0x810)
            .write_bytes(0x20C, &[0xF8, 0x01, 0x74, 0x04, 0x83, 0x65])
            .write_ref(0x810, 0x1000)
            // rulesets slot
            .write_ref(0x300, 0x820)
            .write_bytes(0x30B, &[0x7D, 0x15, 0xA1, 0x11, 0x22, 0x33, 0x44, 0x85, 0xC0])
            .write_ref(0x824, 0x1200)
            // audio time
            .write_bytes(0x400, &[0x5E, 0x5F, 0x5D, 0xC3, 0xA1])
            .write_ref(0x405, 0x830)
            .write_bytes(0x409, &[0x89, 0x00, 0x04])
            .write_i32(0x830, 45_000)
            // beatmap
            .write_ref(0x1000 + 0x6C, 0x1400)
            .write_dotnet_string(0x1400, "d41d8cd98f00b204e9800998ecf8427e")
            .write_ref(0x1000 + 0x24, 0x1480)
            .write_dotnet_string(0x1480, "Test Song")
            .write_ref(0x1000 + 0x18, 0x14C0)
            .write_dotnet_string(0x14C0, "Someone")
            .write_ref(0x1000 + 0xB0, 0x1500)
            .write_dotnet_string(0x1500, "Insane")
            .write_ref(0x1000 + 0x78, 0x1540)
            .write_dotnet_string(0x1540, "1 Someone - Test Song")
            .write_ref(0x1000 + 0x90, 0x1580)
            .write_dotnet_string(0x1580, "test.osu")
            .write_f32(0x1000 + 0x2C, 9.0)
            .write_f32(0x1000 + 0x30, 4.0)
            .write_f32(0x1000 + 0x34, 5.0)
            .write_f32(0x1000 + 0x38, 8.0)
            // ruleset -> gameplay, results
            .write_ref(0x1200 + 0x68, 0x1300)
            .write_ref(0x1200 + 0x38, 0x1700)
            // gameplay -> score, hp bar
            .write_ref(0x1300 + 0x38, 0x1600)
            .write_ref(0x1300 + 0x40, 0x1380)
            .write_f64(0x1380 + 0x1C, 100.0)
    }

    /// Score object at `offset`: HD|DT (xor-encoded), osu!, 90/8/1/1, combo 7/42.
    fn with_score(builder: MockMemoryBuilder, offset: usize, total: i32) -> MockMemoryBuilder {
        let key = 0x5A5A_1234;
        builder
            .write_ref(offset + 0x1C, 0x13C0)
            .write_i32(0x13C8, key)
            .write_i32(0x13CC, (8 | 64) ^ key)
            .write_i32(offset + 0x64, 0)
            .write_i16(offset + 0x68, 42)
            .write_i32(offset + 0x78, total)
            .write_u16(offset + 0x88, 8)
            .write_u16(offset + 0x8A, 90)
            .write_u16(offset + 0x8C, 1)
            .write_u16(offset + 0x92, 1)
            .write_i16(offset + 0x94, 7)
    }

    fn reader(builder: MockMemoryBuilder) -> (StableReader<MockProvider>, MockProvider) {
        let provider = MockProvider::new().with_process(builder.build_process());
        let reader = StableReader::new(provider.clone(), &OffsetRegistry::builtin())
            .with_cooldown(Duration::ZERO);
        (reader, provider)
    }

    #[test]
    fn test_playing_snapshot() {
        let (mut reader, _) = reader(with_score(stable_memory(2), 0x1600, 123_456));

        assert!(reader.initialize());
        let snapshot = reader.snapshot();

        assert_eq!(snapshot.state, GameState::Playing);
        assert_eq!(snapshot.client.as_deref(), Some("stable"));
        assert_eq!(
            snapshot.map_hash.as_deref(),
            Some("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert_eq!(snapshot.title.as_deref(), Some("Test Song"));
        assert_eq!(snapshot.difficulty_name.as_deref(), Some("Insane"));
        assert_eq!(snapshot.ar, Some(9.0));
        assert_eq!(snapshot.od, Some(8.0));
        assert_eq!(snapshot.time_ms, Some(45_000.0));
        assert_eq!(snapshot.score, Some(123_456));
        assert_eq!(snapshot.combo, Some(7));
        assert_eq!(snapshot.max_combo, Some(42));
        assert_eq!(snapshot.health, Some(0.5));
        assert_eq!(snapshot.ruleset, Some(Ruleset::Osu));

        let hits = snapshot.hits.unwrap();
        assert_eq!(hits.core(), [90, 8, 1, 1]);
        let mods = snapshot.mods.unwrap();
        assert_eq!(mods.acronyms, vec!["DT", "HD"]);
    }

    #[test]
    fn test_results_snapshot_uses_results_score() {
        let builder = with_score(stable_memory(7), 0x1700, 777_000);
        let (mut reader, _) = reader(builder);

        assert!(reader.initialize());
        let snapshot = reader.snapshot();

        assert_eq!(snapshot.state, GameState::ResultsScreen);
        assert!(snapshot.results_ready);
        assert_eq!(snapshot.score, Some(777_000));
        assert!(snapshot.health.is_none());
    }

    #[test]
    fn test_unreadable_hp_bar_is_unknown_health() {
        for hp_bar in [0, 0x20] {
            let builder = with_score(stable_memory(2), 0x1600, 1_000).write_ptr(0x1340, hp_bar);
            let (mut reader, _) = reader(builder);

            assert!(reader.initialize());
            let snapshot = reader.snapshot();
            assert_eq!(snapshot.state, GameState::Playing);
            assert!(snapshot.health.is_none());
            assert_eq!(snapshot.hits.unwrap().judged(snapshot.ruleset_or_default()), 100);
        }
    }

    #[test]
    fn test_menu_snapshot_has_no_score() {
        let (mut reader, _) = reader(stable_memory(0));

        assert!(reader.initialize());
        let snapshot = reader.snapshot();
        assert_eq!(snapshot.state, GameState::Menu);
        assert!(snapshot.score.is_none());
        assert!(snapshot.has_map());
    }

    #[test]
    fn test_missing_signature_fails_to_connect() {
        let builder = MockMemoryBuilder::new()
            .base(BASE)
            .architecture(Architecture::X86)
            .with_size(0x1000);
        let (mut reader, _) = reader(builder);

        assert!(!reader.initialize());
        assert!(!reader.is_connected());
        assert_eq!(reader.snapshot(), Snapshot::no_data());
    }

    #[test]
    fn test_ignores_64bit_process() {
        let provider = MockProvider::new().with_process(
            stable_memory(2)
                .architecture(Architecture::X64)
                .build_process(),
        );
        let mut reader = StableReader::new(provider, &OffsetRegistry::builtin())
            .with_cooldown(Duration::ZERO);
        assert!(!reader.initialize());
    }

    #[test]
    fn test_process_exit_disconnects() {
        let process = stable_memory(2).build_process();
        let provider = MockProvider::new().with_process(process.clone());
        let mut reader = StableReader::new(provider, &OffsetRegistry::builtin())
            .with_cooldown(Duration::ZERO);

        assert!(reader.initialize());
        process.kill();
        assert!(!reader.is_connected());
        assert_eq!(reader.snapshot(), Snapshot::no_data());
    }

    #[test]
    fn test_reconnect_is_throttled() {
        let provider = MockProvider::new();
        let mut reader = StableReader::new(provider.clone(), &OffsetRegistry::builtin())
            .with_cooldown(Duration::from_secs(60));

        assert!(!reader.initialize());
        assert!(!reader.initialize());
        assert_eq!(provider.lookups(), 1);
    }

    #[test]
    fn test_map_file_fills_structure_and_guards_combo() {
        let songs = TempDir::new().unwrap();
        let folder = songs.path().join("1 Someone - Test Song");
        std::fs::create_dir_all(&folder).unwrap();
        // Two circles: max combo 2
        std::fs::write(
            folder.join("test.osu"),
            "osu file format v14\n[HitObjects]\n0,0,1000,1,0\n0,0,2000,1,0\n",
        )
        .unwrap();

        let builder = with_score(stable_memory(2), 0x1600, 1000);
        let provider = MockProvider::new().with_process(builder.build_process());
        let mut reader = StableReader::new(provider, &OffsetRegistry::builtin())
            .with_cooldown(Duration::ZERO)
            .with_songs_dir(Some(songs.path().to_path_buf()));

        assert!(reader.initialize());
        let snapshot = reader.snapshot();

        assert_eq!(snapshot.map_file, Some(folder.join("test.osu")));
        assert_eq!(snapshot.object_count, Some(2));
        assert_eq!(snapshot.map_max_combo, Some(2));
        // Combo 7 / max 42 cannot happen on a 2-object map
        assert_eq!(snapshot.combo, None);
        assert_eq!(snapshot.max_combo, None);
    }
}
