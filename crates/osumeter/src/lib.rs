//! # osumeter
//!
//! Live telemetry for osu! clients read straight from process memory.
//!
//! This crate provides:
//! - A versioned offset registry with file and remote sources
//! - A typed memory engine over a foreign process (pointer chains, signature
//!   scans, .NET strings and collections)
//! - Client readers for the 32-bit stable and 64-bit lazer builds, and a
//!   selector picking whichever is running
//! - A play-completion detector that turns snapshots into recorded plays
//! - Session storage and background replay enrichment
//!
//! ## Feature Flags
//!
//! - `remote`: fetch offset documents over HTTP when no local file is usable
//!   (on by default).

pub mod config;
pub mod detector;
pub mod enrich;
pub mod error;
pub mod game;
pub mod offset;
pub mod performance;
pub mod process;
pub mod reader;
pub mod retry;
pub mod storage;
pub mod tracker;

// Re-export from config module
pub use config::{DetectorConfig, TrackerConfig, TrackerConfigBuilder};

// Re-export from error module
pub use error::{Error, Result};

// Re-export from detector module
pub use detector::{
    CompletedPlay, DetectorEvent, MapIdentity, Phase, PlayDetector, PlayOutcome, Rejection,
    ReplayLink,
};

// Re-export from game module
pub use game::{GameState, HitCounts, ModList, Ruleset, Snapshot};

// Re-export from offset module
#[cfg(feature = "remote")]
pub use offset::HttpOffsets;
pub use offset::{OffsetRegistry, OffsetSource, RemoteOffsets};

// Re-export from process module
pub use process::{ByteBuffer, MemoryEngine, ProcessInfo, ProcessProvider, ReadMemory};

// Re-export from reader module
pub use reader::{ClientReader, LazerReader, ReaderSelector, StableReader};

// Re-export from retry module
pub use retry::{ExponentialBackoff, FixedDelay, RetryStrategy};

// Re-export from storage module
pub use storage::{JsonSessionStore, MemoryStore, PlayStore, format_play_console};

// Re-export from performance module
pub use performance::{PerformanceCalculator, StructuralCalculator};

// Re-export from tracker module
pub use tracker::Tracker;
