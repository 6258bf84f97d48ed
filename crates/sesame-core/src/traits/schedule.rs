//! Next-cycle scheduling and the per-identity status board.

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::error::Result;

/// A timed sub-task waiting to fire (e.g. a farm feeding at a fixed time).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTask {
    pub id: String,
    pub group: String,
    pub exec_time: DateTime<Local>,
}

impl PendingTask {
    /// Human-readable name for the summary, derived from the group or the
    /// `GROUP|...` id prefix.
    pub fn display_name(&self) -> String {
        let is = |code: &str| self.group == code || self.id.starts_with(&format!("{code}|"));
        if is("FA") {
            "庄园蹲点喂小鸡".into()
        } else if is("AW") {
            "小鸡定时起床".into()
        } else if is("AS") {
            "小鸡定时睡觉".into()
        } else if is("KC") {
            "小鸡蹲点驱赶偷吃".into()
        } else {
            self.id.clone()
        }
    }
}

/// Decides when the next cycle runs.
pub trait CycleScheduler: Send + Sync {
    fn schedule_next(&self, last_exec: DateTime<Local>) -> Result<()>;
    fn next_execution(&self) -> Option<DateTime<Local>>;
    fn pending_tasks(&self) -> Vec<PendingTask>;
}

/// Short status lines shown per account in the UI.
pub trait StatusLog: Send + Sync {
    fn post(&self, message: &str, expiry: Duration);
    /// Drop every line posted for `identity` (`"{identity}📅..."`).
    fn remove(&self, identity: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending(id: &str, group: &str) -> PendingTask {
        PendingTask {
            id: id.into(),
            group: group.into(),
            exec_time: Local::now(),
        }
    }

    #[test]
    fn test_display_name_by_group_or_prefix() {
        assert_eq!(pending("x", "FA").display_name(), "庄园蹲点喂小鸡");
        assert_eq!(pending("AW|uid", "").display_name(), "小鸡定时起床");
        assert_eq!(pending("AS|1", "other").display_name(), "小鸡定时睡觉");
        assert_eq!(pending("k", "KC").display_name(), "小鸡蹲点驱赶偷吃");
        assert_eq!(pending("custom-7", "ZZ").display_name(), "custom-7");
    }
}
