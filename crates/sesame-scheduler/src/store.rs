//! Day-scoped flag stores.
//! Flags are saved as a small JSON file: human-readable, rewritten only
//! when a flag is set. Flags from an earlier day are dropped on access.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sesame_core::error::Result;
use sesame_core::traits::FlagStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DayFlags {
    date: Option<NaiveDate>,
    flags: BTreeSet<String>,
}

impl DayFlags {
    /// Forget everything recorded for a day other than `day`.
    fn roll(&mut self, day: NaiveDate) {
        if self.date != Some(day) {
            self.date = Some(day);
            self.flags.clear();
        }
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn lock(state: &Mutex<DayFlags>) -> MutexGuard<'_, DayFlags> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

/// File-backed flag store (~/.sesame/status.json).
pub struct DailyFlagStore {
    path: PathBuf,
    state: Mutex<DayFlags>,
}

impl DailyFlagStore {
    /// Open the store in `dir`, loading any flags saved earlier.
    pub fn new(dir: &Path) -> Self {
        std::fs::create_dir_all(dir).ok();
        let path = dir.join("status.json");
        let state = Self::load(&path);
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    /// Default store directory (~/.sesame).
    pub fn default_path() -> PathBuf {
        sesame_core::SesameConfig::home_dir()
    }

    fn load(file: &Path) -> DayFlags {
        if !file.exists() {
            return DayFlags::default();
        }
        match std::fs::read_to_string(file) {
            Ok(json) => serde_json::from_str(&json).unwrap_or_else(|e| {
                tracing::warn!("⚠️ Failed to parse {}: {e}", file.display());
                DayFlags::default()
            }),
            Err(e) => {
                tracing::warn!("⚠️ Failed to read {}: {e}", file.display());
                DayFlags::default()
            }
        }
    }

    fn save(&self, state: &DayFlags) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, json)?;
        tracing::debug!("💾 Saved {} day flags to {}", state.flags.len(), self.path.display());
        Ok(())
    }

    /// Read-only: asking about another day never clears the stored flags.
    pub fn has_flag_on(&self, key: &str, day: NaiveDate) -> bool {
        let state = lock(&self.state);
        state.date == Some(day) && state.flags.contains(key)
    }

    pub fn set_flag_on(&self, key: &str, day: NaiveDate) -> Result<()> {
        let mut state = lock(&self.state);
        state.roll(day);
        if state.flags.insert(key.to_string()) {
            self.save(&state)?;
        }
        Ok(())
    }
}

impl FlagStore for DailyFlagStore {
    fn has_flag_today(&self, key: &str) -> bool {
        self.has_flag_on(key, today())
    }

    fn set_flag_today(&self, key: &str) -> Result<()> {
        self.set_flag_on(key, today())
    }
}

/// In-memory flag store for dry runs and tests.
#[derive(Default)]
pub struct MemoryFlagStore {
    state: Mutex<DayFlags>,
}

impl MemoryFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with `keys` already set for today.
    pub fn with_flags(keys: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut state = lock(&store.state);
            state.roll(today());
            state.flags.extend(keys.iter().map(|k| k.to_string()));
        }
        store
    }
}

impl FlagStore for MemoryFlagStore {
    fn has_flag_today(&self, key: &str) -> bool {
        let state = lock(&self.state);
        state.date == Some(today()) && state.flags.contains(key)
    }

    fn set_flag_today(&self, key: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.roll(today());
        state.flags.insert(key.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sesame_core::traits::ONCE_DAILY_FINISHED;

    #[test]
    fn test_flag_persists_across_reopen() {
        let dir = std::env::temp_dir().join("sesame-test-flags-reopen");
        std::fs::remove_dir_all(&dir).ok();
        {
            let store = DailyFlagStore::new(&dir);
            assert!(!store.has_flag_today(ONCE_DAILY_FINISHED));
            store.set_flag_today(ONCE_DAILY_FINISHED).unwrap();
        }
        let store = DailyFlagStore::new(&dir);
        assert!(store.has_flag_today(ONCE_DAILY_FINISHED));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_flag_expires_next_day() {
        let dir = std::env::temp_dir().join("sesame-test-flags-rollover");
        std::fs::remove_dir_all(&dir).ok();
        let store = DailyFlagStore::new(&dir);
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        store.set_flag_on("k", day).unwrap();
        assert!(store.has_flag_on("k", day));
        assert!(!store.has_flag_on("k", day.succ_opt().unwrap()));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_reading_other_day_keeps_flags() {
        let dir = std::env::temp_dir().join("sesame-test-flags-read-other-day");
        std::fs::remove_dir_all(&dir).ok();
        let store = DailyFlagStore::new(&dir);
        let day = NaiveDate::from_ymd_opt(2026, 5, 2).unwrap();
        store.set_flag_on("k", day).unwrap();

        assert!(!store.has_flag_on("k", day.pred_opt().unwrap()));
        assert!(store.has_flag_on("k", day));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = std::env::temp_dir().join("sesame-test-flags-corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("status.json"), "{not json").unwrap();
        let store = DailyFlagStore::new(&dir);
        assert!(!store.has_flag_today("anything"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryFlagStore::with_flags(&[ONCE_DAILY_FINISHED]);
        assert!(store.has_flag_today(ONCE_DAILY_FINISHED));
        assert!(!store.has_flag_today("other"));
        store.set_flag_today("other").unwrap();
        assert!(store.has_flag_today("other"));
    }
}
