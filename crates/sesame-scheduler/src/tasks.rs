//! Per-task outcomes and task classification.

use std::fmt;
use std::time::Duration;

/// Timeout class of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Long-running background module: success once it is up and running.
    Whitelisted,
    /// Success requires completion within the long timeout.
    Normal,
}

impl TaskKind {
    /// Classify by substring against the configured whitelist.
    pub fn classify(name: &str, whitelist: &[String]) -> Self {
        if whitelist.iter().any(|w| !w.is_empty() && name.contains(w.as_str())) {
            TaskKind::Whitelisted
        } else {
            TaskKind::Normal
        }
    }
}

/// Result of one task in one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// `background` is true when the task was still running when success
    /// was declared.
    Success { duration: Duration, background: bool },
    Failure { reason: String },
    Timeout { elapsed: Duration },
    Skipped { reason: String },
    Cancelled,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success { .. })
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Success { duration, background: false } => {
                write!(f, "成功 ({}ms)", duration.as_millis())
            }
            TaskOutcome::Success { duration, background: true } => {
                write!(f, "成功，后台运行中 ({}ms)", duration.as_millis())
            }
            TaskOutcome::Failure { reason } => write!(f, "失败: {reason}"),
            TaskOutcome::Timeout { elapsed } => write!(f, "超时 ({}s)", elapsed.as_secs()),
            TaskOutcome::Skipped { reason } => write!(f, "跳过: {reason}"),
            TaskOutcome::Cancelled => write!(f, "已取消"),
        }
    }
}
