//! Cycle statistics, updated concurrently by the tasks of a round.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::tasks::TaskOutcome;

#[derive(Debug, Default)]
pub struct DispatchStats {
    success: AtomicUsize,
    failure: AtomicUsize,
    skipped: AtomicUsize,
    durations: Mutex<HashMap<String, Duration>>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub average: Option<Duration>,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.success.store(0, Ordering::Relaxed);
        self.failure.store(0, Ordering::Relaxed);
        self.skipped.store(0, Ordering::Relaxed);
        self.durations.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Fold one outcome into the counters. Timeouts count as failures;
    /// cancelled tasks are not counted.
    pub fn record(&self, name: &str, outcome: &TaskOutcome) {
        match outcome {
            TaskOutcome::Success { duration, .. } => {
                self.success.fetch_add(1, Ordering::Relaxed);
                self.durations
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(name.to_string(), *duration);
            }
            TaskOutcome::Failure { .. } | TaskOutcome::Timeout { .. } => {
                self.failure.fetch_add(1, Ordering::Relaxed);
            }
            TaskOutcome::Skipped { .. } => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
            }
            TaskOutcome::Cancelled => {}
        }
    }

    pub fn add_skipped(&self, n: usize) {
        self.skipped.fetch_add(n, Ordering::Relaxed);
    }

    /// Mean of the recorded success durations (latest per task).
    pub fn average(&self) -> Option<Duration> {
        let durations = self.durations.lock().unwrap_or_else(|e| e.into_inner());
        if durations.is_empty() {
            return None;
        }
        let total: Duration = durations.values().sum();
        Some(total / durations.len() as u32)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            success: self.success.load(Ordering::Relaxed),
            failure: self.failure.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            average: self.average(),
        }
    }
}
