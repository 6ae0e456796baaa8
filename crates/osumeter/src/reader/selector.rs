use std::path::PathBuf;

use tracing::info;

use crate::config::TrackerConfig;
use crate::game::Snapshot;
use crate::offset::OffsetRegistry;
use crate::process::SystemProcessProvider;
use crate::reader::{ClientReader, LazerReader, StableReader};

/// Picks the live client reader.
///
/// Readers are tried in order while none is bound. The first one that
/// connects stays bound until it reports disconnected, after which selection
/// starts over on the next poll.
pub struct ReaderSelector {
    readers: Vec<Box<dyn ClientReader>>,
    bound: Option<usize>,
}

impl ReaderSelector {
    pub fn new(readers: Vec<Box<dyn ClientReader>>) -> Self {
        Self {
            readers,
            bound: None,
        }
    }

    /// Stable first, then lazer, both on the local process table.
    pub fn system(registry: &OffsetRegistry, config: &TrackerConfig) -> Self {
        let stable = StableReader::new(SystemProcessProvider, registry)
            .with_cooldown(config.reconnect_cooldown)
            .with_songs_dir(stable_songs_dir(config.stable_dir.clone()));
        let lazer = LazerReader::new(SystemProcessProvider, registry)
            .with_cooldown(config.reconnect_cooldown)
            .with_data_dir(config.resolved_lazer_data_dir());
        Self::new(vec![Box::new(stable), Box::new(lazer)])
    }

    /// Name of the bound reader.
    pub fn bound_name(&self) -> Option<&'static str> {
        self.bound.map(|i| self.readers[i].name())
    }

    fn select(&mut self) {
        if let Some(i) = self.bound {
            if self.readers[i].is_connected() {
                return;
            }
            info!("{} client disconnected", self.readers[i].name());
            self.bound = None;
        }

        self.bound = self.readers.iter_mut().position(|r| r.initialize());
        if let Some(name) = self.bound_name() {
            info!("Reading from {} client", name);
        }
    }
}

impl ClientReader for ReaderSelector {
    fn name(&self) -> &'static str {
        self.bound_name().unwrap_or("none")
    }

    fn initialize(&mut self) -> bool {
        self.select();
        self.bound.is_some()
    }

    fn is_connected(&self) -> bool {
        self.bound.is_some_and(|i| self.readers[i].is_connected())
    }

    fn snapshot(&mut self) -> Snapshot {
        self.select();
        match self.bound {
            Some(i) => self.readers[i].snapshot(),
            None => Snapshot::no_data(),
        }
    }
}

/// Songs folder for a stable install directory.
pub fn stable_songs_dir(install_dir: Option<PathBuf>) -> Option<PathBuf> {
    install_dir.map(|dir| dir.join("Songs"))
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    use super::*;
    use crate::game::GameState;
    use crate::process::{Architecture, MockMemoryBuilder, MockProvider};

    type Flag = Rc<Cell<bool>>;
    type Counter = Rc<Cell<u32>>;

    /// Scripted reader: connects while `alive`, counts attempts.
    struct FakeReader {
        name: &'static str,
        alive: Flag,
        attempts: Counter,
        connected: bool,
    }

    fn fake(name: &'static str, alive: bool) -> (FakeReader, Flag, Counter) {
        let flag = Flag::new(Cell::new(alive));
        let attempts = Counter::default();
        let reader = FakeReader {
            name,
            alive: flag.clone(),
            attempts: attempts.clone(),
            connected: false,
        };
        (reader, flag, attempts)
    }

    impl ClientReader for FakeReader {
        fn name(&self) -> &'static str {
            self.name
        }

        fn initialize(&mut self) -> bool {
            self.attempts.set(self.attempts.get() + 1);
            self.connected = self.alive.get();
            self.connected
        }

        fn is_connected(&self) -> bool {
            self.connected && self.alive.get()
        }

        fn snapshot(&mut self) -> Snapshot {
            Snapshot {
                client: Some(self.name.to_string()),
                ..Snapshot::with_state(GameState::Menu)
            }
        }
    }

    #[test]
    fn test_prefers_first_reader() {
        let (a, _, _) = fake("stable", true);
        let (b, _, b_attempts) = fake("lazer", true);
        let mut selector = ReaderSelector::new(vec![Box::new(a), Box::new(b)]);

        let snapshot = selector.snapshot();
        assert_eq!(snapshot.client.as_deref(), Some("stable"));
        assert_eq!(b_attempts.get(), 0);
    }

    #[test]
    fn test_falls_through_to_second_reader() {
        let (a, _, _) = fake("stable", false);
        let (b, _, _) = fake("lazer", true);
        let mut selector = ReaderSelector::new(vec![Box::new(a), Box::new(b)]);

        assert_eq!(selector.snapshot().client.as_deref(), Some("lazer"));
        assert_eq!(selector.bound_name(), Some("lazer"));
    }

    #[test]
    fn test_unbound_yields_no_data() {
        let (a, _, _) = fake("stable", false);
        let (b, _, _) = fake("lazer", false);
        let mut selector = ReaderSelector::new(vec![Box::new(a), Box::new(b)]);

        assert_eq!(selector.snapshot(), Snapshot::no_data());
        assert!(!selector.is_connected());
        assert_eq!(selector.name(), "none");
    }

    #[test]
    fn test_stays_bound_then_rearms() {
        let (a, a_alive, a_attempts) = fake("stable", false);
        let (b, b_alive, _) = fake("lazer", true);
        let mut selector = ReaderSelector::new(vec![Box::new(a), Box::new(b)]);

        selector.snapshot();
        a_alive.set(true);
        // Bound to lazer: stable is not retried while lazer lives.
        selector.snapshot();
        selector.snapshot();
        assert_eq!(a_attempts.get(), 1);
        assert_eq!(selector.bound_name(), Some("lazer"));

        b_alive.set(false);
        assert_eq!(selector.snapshot().client.as_deref(), Some("stable"));
        assert_eq!(a_attempts.get(), 2);
    }

    #[test]
    fn test_system_style_wiring_with_mocks() {
        // A 64-bit process only: the stable reader never matches it.
        let process = MockMemoryBuilder::new()
            .base(0x20_0000)
            .architecture(Architecture::X64)
            .with_size(0x100)
            .build_process();
        let provider = MockProvider::new().with_process(process);
        let registry = OffsetRegistry::builtin();

        let stable = StableReader::new(provider.clone(), &registry).with_cooldown(Duration::ZERO);
        let lazer = LazerReader::new(provider.clone(), &registry).with_cooldown(Duration::ZERO);
        let mut selector = ReaderSelector::new(vec![Box::new(stable), Box::new(lazer)]);

        // The lazer anchor is absent from this memory, so nothing binds.
        assert_eq!(selector.snapshot(), Snapshot::no_data());
        assert_eq!(provider.lookups(), 2);
    }

    #[test]
    fn test_stable_songs_dir() {
        assert_eq!(
            stable_songs_dir(Some(PathBuf::from("/games/osu"))),
            Some(PathBuf::from("/games/osu/Songs"))
        );
        assert_eq!(stable_songs_dir(None), None);
    }
}
