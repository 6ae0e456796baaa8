//! CLI argument definitions for osumeter.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use osumeter::TrackerConfig;
use osumeter::config::default_offset_paths;

#[derive(Parser)]
#[command(name = "osumeter")]
#[command(about = "osu! live play tracker", version)]
pub struct Args {
    /// Offset file tried before the default locations
    #[arg(long, value_name = "FILE", env = "OSUMETER_OFFSETS_FILE", global = true)]
    pub offsets_file: Option<PathBuf>,

    /// Remote offsets URL used when no local file is usable
    #[arg(long, env = "OSUMETER_OFFSETS_URL", global = true)]
    pub offsets_url: Option<String>,

    /// Never fetch offsets over the network
    #[arg(long, global = true)]
    pub offline: bool,

    /// osu!stable install directory
    #[arg(long, value_name = "DIR", env = "OSUMETER_STABLE_DIR", global = true)]
    pub stable_dir: Option<PathBuf>,

    /// osu!lazer data directory
    #[arg(long, value_name = "DIR", env = "OSUMETER_LAZER_DIR", global = true)]
    pub lazer_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Track plays until Ctrl+C (default)
    Track(TrackArgs),
    /// Print the current snapshot as JSON
    Status {
        /// Keep printing until Ctrl+C
        #[arg(long)]
        watch: bool,
    },
    /// Load the offset registry and show where it came from
    Offsets,
}

#[derive(clap::Args, Default)]
pub struct TrackArgs {
    /// Directory for session files
    #[arg(long, value_name = "DIR", env = "OSUMETER_SESSION_DIR")]
    pub session_dir: Option<PathBuf>,

    /// Keep plays in memory only
    #[arg(long)]
    pub no_save: bool,

    /// Directory searched for replays of recorded plays
    #[arg(long, value_name = "DIR", env = "OSUMETER_REPLAY_DIR")]
    pub replay_dir: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(long, value_name = "MS", env = "OSUMETER_POLL_MS")]
    pub poll_ms: Option<u64>,

    /// Do not print recorded plays
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Config shared by every subcommand.
    pub fn tracker_config(&self) -> TrackerConfig {
        let mut offset_paths = Vec::new();
        if let Some(path) = &self.offsets_file {
            offset_paths.push(path.clone());
        }
        offset_paths.extend(default_offset_paths());

        let mut builder = TrackerConfig::builder()
            .offset_paths(offset_paths)
            .stable_dir(self.stable_dir.clone())
            .lazer_data_dir(self.lazer_dir.clone());
        if self.offline {
            builder = builder.remote_offsets_url(None);
        } else if let Some(url) = &self.offsets_url {
            builder = builder.remote_offsets_url(Some(url.clone()));
        }
        builder.build()
    }
}

impl TrackArgs {
    pub fn apply(&self, mut config: TrackerConfig) -> TrackerConfig {
        if self.no_save {
            config.session_dir = None;
        } else if let Some(dir) = &self.session_dir {
            config.session_dir = Some(dir.clone());
        }
        config.replay_dir = self
            .replay_dir
            .clone()
            .or_else(|| config.stable_dir.as_ref().map(|d| d.join("Data").join("r")));
        if let Some(ms) = self.poll_ms {
            config.poll_interval = Duration::from_millis(ms.max(1));
        }
        config.print_plays = !self.quiet;
        config
    }
}
