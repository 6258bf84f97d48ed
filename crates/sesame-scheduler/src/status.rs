//! In-memory status board: short per-account lines with an expiry.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local};
use sesame_core::traits::StatusLog;

#[derive(Debug, Clone)]
pub struct StatusEntry {
    pub message: String,
    pub expires_at: DateTime<Local>,
}

#[derive(Default)]
pub struct StatusBoard {
    entries: Mutex<Vec<StatusEntry>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unexpired entries, oldest first.
    pub fn entries(&self) -> Vec<StatusEntry> {
        let now = Local::now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|e| e.expires_at > now);
        entries.clone()
    }
}

impl StatusLog for StatusBoard {
    fn post(&self, message: &str, expiry: Duration) {
        let expires_at = Local::now()
            + chrono::Duration::from_std(expiry).unwrap_or(chrono::Duration::hours(1));
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(StatusEntry {
            message: message.to_string(),
            expires_at,
        });
    }

    fn remove(&self, identity: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let prefix = format!("{identity}📅");
        entries.retain(|e| !e.message.starts_with(&prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_and_remove_by_identity() {
        let board = StatusBoard::new();
        board.post("alice📅 下次运行: 12:00", Duration::from_secs(3600));
        board.post("bob📅 下次运行: 12:30", Duration::from_secs(3600));
        assert_eq!(board.entries().len(), 2);

        board.remove("alice");
        let left = board.entries();
        assert_eq!(left.len(), 1);
        assert!(left[0].message.starts_with("bob"));
    }

    #[test]
    fn test_remove_matches_whole_identity() {
        let board = StatusBoard::new();
        board.post("alice📅 下次运行: 12:00", Duration::from_secs(3600));
        board.post("ali📅 下次运行: 12:30", Duration::from_secs(3600));

        board.remove("ali");
        let left = board.entries();
        assert_eq!(left.len(), 1);
        assert!(left[0].message.starts_with("alice📅"));
    }

    #[test]
    fn test_expired_entries_dropped() {
        let board = StatusBoard::new();
        board.post("stale", Duration::ZERO);
        assert!(board.entries().is_empty());
    }
}
