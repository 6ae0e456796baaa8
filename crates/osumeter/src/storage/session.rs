use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::detector::{CompletedPlay, MapIdentity, PerformanceSample};
use crate::error::Result;
use crate::storage::{PlayId, PlayLog, PlayStore};

/// One JSON document per tracking session, rewritten on every change.
pub struct JsonSessionStore {
    path: PathBuf,
    log: PlayLog,
}

impl JsonSessionStore {
    /// Start a session file `Session_YYYY_MM_DD_HH_MM_SS.json` under `base_dir`.
    pub fn start<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let now: DateTime<Local> = Local::now();
        let base_dir = base_dir.as_ref();
        fs::create_dir_all(base_dir)?;

        let path = base_dir.join(format!("Session_{}.json", now.format("%Y_%m_%d_%H_%M_%S")));
        let store = Self {
            path,
            log: PlayLog::default(),
        };
        store.flush()?;
        Ok(store)
    }

    /// Reopen an existing session file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path)?;
        let log = serde_json::from_str(&content)?;
        Ok(Self { path, log })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self) -> &PlayLog {
        &self.log
    }

    fn flush(&self) -> Result<()> {
        fs::write(&self.path, serde_json::to_string_pretty(&self.log)?)?;
        Ok(())
    }
}

impl PlayStore for JsonSessionStore {
    fn upsert_beatmap(&mut self, map: &MapIdentity) -> Result<()> {
        self.log.upsert_beatmap(map);
        self.flush()
    }

    fn insert_play(&mut self, play: &CompletedPlay) -> Result<PlayId> {
        let id = self.log.insert_play(play);
        self.flush()?;
        Ok(id)
    }

    fn update_play(&mut self, id: PlayId, play: &CompletedPlay) -> Result<()> {
        self.log.update_play(id, play)?;
        self.flush()
    }

    fn query_performance_timeline(&self, id: PlayId) -> Result<Vec<PerformanceSample>> {
        Ok(self.log.play(id)?.play.performance_timeline.clone())
    }
}
