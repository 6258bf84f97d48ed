//! Fixed-delay cycle scheduler: the next cycle starts one check interval
//! after the last one, never in the past.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Local};
use sesame_core::error::{Result, SesameError};
use sesame_core::traits::{CycleScheduler, PendingTask};

pub struct FixedDelayScheduler {
    interval: Duration,
    next: Mutex<Option<DateTime<Local>>>,
    pending: Mutex<Vec<PendingTask>>,
}

impl FixedDelayScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Mutex::new(None),
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Register a timed sub-task so it shows up in the run summary.
    pub fn add_pending(&self, task: PendingTask) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.push(task);
        pending.sort_by_key(|t| t.exec_time);
    }

    /// Drop sub-tasks whose time has passed.
    pub fn prune(&self, now: DateTime<Local>) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|t| t.exec_time > now);
    }

    /// Time left until the scheduled cycle, zero when due or unscheduled.
    pub fn until_next(&self, now: DateTime<Local>) -> Duration {
        self.next_execution()
            .and_then(|next| (next - now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }
}

impl CycleScheduler for FixedDelayScheduler {
    fn schedule_next(&self, last_exec: DateTime<Local>) -> Result<()> {
        let interval = chrono::Duration::from_std(self.interval)
            .map_err(|e| SesameError::Schedule(format!("interval out of range: {e}")))?;
        let next = (last_exec + interval).max(Local::now());
        *self.next.lock().unwrap_or_else(|e| e.into_inner()) = Some(next);
        tracing::debug!("📅 Next cycle at {}", next.format("%Y-%m-%d %H:%M:%S"));
        Ok(())
    }

    fn next_execution(&self) -> Option<DateTime<Local>> {
        *self.next.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn pending_tasks(&self) -> Vec<PendingTask> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_next_adds_interval() {
        let sched = FixedDelayScheduler::new(Duration::from_secs(1800));
        assert!(sched.next_execution().is_none());

        let last = Local::now();
        sched.schedule_next(last).unwrap();
        let next = sched.next_execution().unwrap();
        assert_eq!((next - last).num_seconds(), 1800);
        assert!(sched.until_next(last) > Duration::from_secs(1790));
    }

    #[test]
    fn test_schedule_next_never_in_past() {
        let sched = FixedDelayScheduler::new(Duration::from_secs(60));
        let long_ago = Local::now() - chrono::Duration::hours(5);
        sched.schedule_next(long_ago).unwrap();
        assert!(sched.next_execution().unwrap() > long_ago + chrono::Duration::hours(4));
    }

    #[test]
    fn test_pending_sorted_and_pruned() {
        let sched = FixedDelayScheduler::new(Duration::from_secs(60));
        let now = Local::now();
        sched.add_pending(PendingTask {
            id: "FA|late".into(),
            group: "FA".into(),
            exec_time: now + chrono::Duration::hours(2),
        });
        sched.add_pending(PendingTask {
            id: "AW|early".into(),
            group: "AW".into(),
            exec_time: now + chrono::Duration::hours(1),
        });
        sched.add_pending(PendingTask {
            id: "KC|gone".into(),
            group: "KC".into(),
            exec_time: now - chrono::Duration::minutes(1),
        });

        sched.prune(now);
        let pending = sched.pending_tasks();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, "AW|early");
    }
}
