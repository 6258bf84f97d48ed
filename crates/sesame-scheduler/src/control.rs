//! Run control: the cancellation scope of a dispatch session and the
//! "manual run in progress" flag.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

/// Shared between the dispatcher, the CLI and anything that may stop work.
#[derive(Debug, Default)]
pub struct RunControl {
    token: Mutex<CancellationToken>,
    manual_running: AtomicBool,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a fresh token. A stop from an earlier session must not leak
    /// into the next one.
    pub fn reset(&self) {
        let mut token = self.token.lock().unwrap_or_else(|e| e.into_inner());
        if token.is_cancelled() {
            tracing::debug!("🔁 Clearing stale stop request");
        }
        *token = CancellationToken::new();
    }

    /// Cancel the current session. Running tasks observe it through their
    /// child tokens and stop cooperatively.
    pub fn stop_all(&self) {
        tracing::info!("🛑 收到停止请求，正在停止所有任务");
        self.token().cancel();
    }

    /// Current session token.
    pub fn token(&self) -> CancellationToken {
        self.token.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token().is_cancelled()
    }

    pub fn set_manual_running(&self, running: bool) {
        self.manual_running.store(running, Ordering::Relaxed);
    }

    pub fn is_manual_running(&self) -> bool {
        self.manual_running.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_then_reset() {
        let control = RunControl::new();
        let child = control.token().child_token();
        assert!(!control.is_cancelled());

        control.stop_all();
        assert!(control.is_cancelled());
        assert!(child.is_cancelled());

        control.reset();
        assert!(!control.is_cancelled());
        assert!(!control.token().child_token().is_cancelled());
    }

    #[test]
    fn test_manual_running_flag() {
        let control = RunControl::new();
        assert!(!control.is_manual_running());
        control.set_manual_running(true);
        assert!(control.is_manual_running());
    }
}
