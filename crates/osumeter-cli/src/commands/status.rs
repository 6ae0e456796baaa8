//! One-shot or continuous snapshot output.

use std::sync::Arc;

use anyhow::Result;
use osumeter::config::polling;
use osumeter::{ClientReader, MemoryStore, ReaderSelector, Tracker, TrackerConfig};

use crate::shutdown::ShutdownSignal;

pub fn run(config: TrackerConfig, watch: bool, shutdown: Arc<ShutdownSignal>) -> Result<()> {
    let config = TrackerConfig {
        session_dir: None,
        print_plays: false,
        ..config
    };
    let registry = super::load_registry(&config);
    let selector = ReaderSelector::system(&registry, &config);
    let mut tracker = Tracker::new(selector, Box::new(MemoryStore::new()), &config);

    loop {
        tracker.poll_once();
        if !tracker.reader().is_connected() {
            eprintln!("osu! is not running");
        }
        println!("{}", serde_json::to_string_pretty(tracker.snapshot())?);

        if !watch || shutdown.wait(polling::STATUS_WATCH_INTERVAL) {
            break;
        }
    }
    Ok(())
}
