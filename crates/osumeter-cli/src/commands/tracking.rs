//! Main tracking mode command.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use osumeter::{JsonSessionStore, MemoryStore, PlayStore, ReaderSelector, Tracker, TrackerConfig};
use tracing::{debug, info, warn};

use crate::shutdown::ShutdownSignal;

/// Run the main tracking mode
pub fn run(config: TrackerConfig, shutdown: Arc<ShutdownSignal>) -> Result<()> {
    println!("osumeter v{}", env!("CARGO_PKG_VERSION"));

    let registry = super::load_registry(&config);
    let selector = ReaderSelector::system(&registry, &config);
    let store = open_store(&config)?;
    if let Some(dir) = &config.replay_dir {
        info!("Linking replays from {}", dir.display());
    }

    let recorded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&recorded);
    let mut tracker = Tracker::new(selector, store, &config).on_play_recorded(move |queued| {
        if queued {
            counter.fetch_add(1, Ordering::SeqCst);
        } else {
            warn!("Recorded play could not be queued for saving");
        }
    });

    println!("Waiting for osu!... (Press Ctrl+C to quit)");
    tracker.run(shutdown.flag());

    if tracker.finish().is_none() {
        warn!("Persistence worker exited abnormally");
    }
    println!(
        "Recorded {} play(s). Shutdown complete.",
        recorded.load(Ordering::SeqCst)
    );
    Ok(())
}

/// Session file store, or memory when saving is disabled.
fn open_store(config: &TrackerConfig) -> Result<Box<dyn PlayStore>> {
    match &config.session_dir {
        Some(dir) => {
            let store = JsonSessionStore::start(dir)
                .with_context(|| format!("Failed to start session in {}", dir.display()))?;
            println!("Session file: {}", store.path().display());
            Ok(Box::new(store))
        }
        None => {
            debug!("Session saving disabled");
            Ok(Box::new(MemoryStore::new()))
        }
    }
}
