//! Background persistence and replay enrichment of recorded plays.
//!
//! The poll loop hands each play to [`EnrichmentWorker::submit`] and moves on.
//! The worker thread stores the play, then waits for the client to write the
//! replay and links it to the stored row.

mod discovery;
mod replay;

use std::sync::mpsc::{self, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, info, warn};

pub use discovery::ReplaySearch;
pub use replay::ReplayHeader;

use crate::detector::CompletedPlay;
use crate::storage::PlayStore;

pub struct EnrichmentWorker<S> {
    sender: Option<Sender<CompletedPlay>>,
    handle: Option<JoinHandle<S>>,
}

impl<S: PlayStore + 'static> EnrichmentWorker<S> {
    /// Start the worker thread. Without `search`, plays are only stored.
    pub fn spawn(store: S, search: Option<ReplaySearch>) -> Self {
        let (sender, receiver) = mpsc::channel::<CompletedPlay>();
        let handle = thread::spawn(move || {
            let mut store = store;
            for play in receiver {
                process(&mut store, search.as_ref(), play);
            }
            store
        });

        Self {
            sender: Some(sender),
            handle: Some(handle),
        }
    }

    /// Queue a play. Returns false if the worker is gone.
    pub fn submit(&self, play: CompletedPlay) -> bool {
        match &self.sender {
            Some(sender) => sender.send(play).is_ok(),
            None => false,
        }
    }

    /// Drain the queue and return the store.
    pub fn finish(mut self) -> Option<S> {
        self.sender.take();
        self.handle.take()?.join().ok()
    }
}

fn process<S: PlayStore>(store: &mut S, search: Option<&ReplaySearch>, mut play: CompletedPlay) {
    if let Err(e) = store.upsert_beatmap(&play.map) {
        warn!("Failed to save beatmap {}: {}", play.map.hash, e);
    }

    let id = match store.insert_play(&play) {
        Ok(id) => id,
        Err(e) => {
            warn!("Failed to save play on {}: {}", play.map.display_name(), e);
            return;
        }
    };
    info!("Saved play #{} ({} {})", id, play.outcome, play.map.display_name());

    let Some(search) = search else {
        return;
    };
    if !play.is_pass() {
        return;
    }

    match search.find(&play) {
        Some(link) => {
            info!("Linked replay {} to play #{}", link.path.display(), id);
            if !link.counts_match {
                debug!("Replay judgement counts differ from play #{}", id);
            }
            play.replay = Some(link);
            if let Err(e) = store.update_play(id, &play) {
                warn!("Failed to update play #{}: {}", id, e);
            }
        }
        None => debug!(
            "No replay found for play #{} in {}",
            id,
            search.dir().display()
        ),
    }
}
