//! Durable streak store.
//!
//! The streak record is the only state that must survive across separate
//! gate-run invocations. Records live in one JSON file under the state
//! directory, keyed by task key, and every mutation is a read-modify-write
//! under an exclusive file lock so sequential runs never lose updates. The
//! write itself goes through a temp file and rename.

use crate::breaker::{BreakerSnapshot, FailureStreak};
use crate::errors::GateError;
use crate::policy::GateStatus;
use fs2::FileExt;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::warn;

const STREAKS_FILE: &str = "streaks.json";
const LOCK_FILE: &str = "streaks.lock";

/// Keyed streak records with durable read-modify-write semantics.
pub struct StreakStore {
    state_dir: PathBuf,
    threshold: u32,
}

impl StreakStore {
    pub fn new(state_dir: impl Into<PathBuf>, threshold: u32) -> Self {
        Self {
            state_dir: state_dir.into(),
            threshold,
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Current streak for a task key; a fresh zero record if none is stored.
    pub fn get(&self, task_key: &str) -> Result<FailureStreak, GateError> {
        let records = self.load()?;
        Ok(records
            .get(task_key)
            .cloned()
            .unwrap_or_else(|| FailureStreak::new(task_key)))
    }

    pub fn snapshot(&self, task_key: &str) -> Result<BreakerSnapshot, GateError> {
        Ok(self.get(task_key)?.snapshot(self.threshold))
    }

    /// Apply one gate decision to the key's streak and persist the result.
    pub fn record_decision(
        &self,
        task_key: &str,
        status: GateStatus,
    ) -> Result<FailureStreak, GateError> {
        self.update(task_key, |streak| streak.apply(status, self.threshold))
    }

    /// Explicit user override: clear the streak and any trip.
    pub fn reset(&self, task_key: &str) -> Result<FailureStreak, GateError> {
        self.update(task_key, |streak| streak.reset())
    }

    /// All stored streaks, for status listings.
    pub fn all(&self) -> Result<Vec<FailureStreak>, GateError> {
        Ok(self.load()?.into_values().collect())
    }

    fn update(
        &self,
        task_key: &str,
        mutate: impl FnOnce(&mut FailureStreak),
    ) -> Result<FailureStreak, GateError> {
        let _lock = self.acquire_lock()?;
        let mut records = self.load()?;
        let mut streak = records
            .remove(task_key)
            .unwrap_or_else(|| FailureStreak::new(task_key));
        mutate(&mut streak);
        records.insert(task_key.to_string(), streak.clone());
        self.save(&records)?;
        Ok(streak)
    }

    /// Exclusive advisory lock; released when the returned handle drops.
    fn acquire_lock(&self) -> Result<File, GateError> {
        fs::create_dir_all(&self.state_dir).map_err(|source| GateError::StreakStore {
            path: self.state_dir.clone(),
            source,
        })?;
        let lock_path = self.state_dir.join(LOCK_FILE);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .and_then(|file| {
                file.lock_exclusive()?;
                Ok(file)
            })
            .map_err(|source| GateError::StreakStore {
                path: lock_path,
                source,
            })?;
        Ok(lock)
    }

    fn streaks_path(&self) -> PathBuf {
        self.state_dir.join(STREAKS_FILE)
    }

    fn load(&self) -> Result<BTreeMap<String, FailureStreak>, GateError> {
        let path = self.streaks_path();
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let text = fs::read_to_string(&path).map_err(|source| GateError::StreakStore {
            path: path.clone(),
            source,
        })?;
        match serde_json::from_str(&text) {
            Ok(records) => Ok(records),
            Err(e) => {
                // A corrupt state file should not wedge every future gate
                // run; start over and let the streak rebuild.
                warn!(path = %path.display(), error = %e, "streak store corrupt, starting fresh");
                Ok(BTreeMap::new())
            }
        }
    }

    fn save(&self, records: &BTreeMap<String, FailureStreak>) -> Result<(), GateError> {
        let path = self.streaks_path();
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| GateError::Other(anyhow::Error::new(e)))?;
        let tmp = path.with_extension("json.tmp");
        write_atomic(&tmp, &path, &json).map_err(|source| GateError::StreakStore {
            path,
            source,
        })
    }
}

fn write_atomic(tmp: &Path, path: &Path, contents: &str) -> std::io::Result<()> {
    fs::write(tmp, contents)?;
    fs::rename(tmp, path)
}
