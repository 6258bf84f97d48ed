//! Task capability: one independently runnable module.

use std::future::Future;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SesameError};

/// Handle to work started by [`Task::start`].
///
/// The work runs on the shared tokio pool. A handle can be polled for
/// liveness or awaited for completion; dropping it detaches the work.
#[derive(Debug)]
pub struct TaskHandle {
    join: JoinHandle<Result<()>>,
}

impl TaskHandle {
    /// Spawn `work` onto the runtime and return its handle.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            join: tokio::spawn(work),
        }
    }

    /// Wrap an existing join handle.
    pub fn from_join(join: JoinHandle<Result<()>>) -> Self {
        Self { join }
    }

    /// True while the work has not finished.
    pub fn is_active(&self) -> bool {
        !self.join.is_finished()
    }

    /// Forcefully abort the work. Cooperative stop through the
    /// cancellation token should be preferred.
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Wait for the work to finish and surface its result.
    pub async fn join(self) -> Result<()> {
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(SesameError::Cancelled("task aborted".into())),
            Err(e) => Err(SesameError::Task(format!("task panicked: {e}"))),
        }
    }
}

/// A named, independently runnable unit of work.
#[async_trait]
pub trait Task: Send + Sync {
    /// Display name, used for logging and once-daily matching.
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Count one more invocation of this task.
    fn add_run_cents(&self) {}

    /// Start the work. `cancel` is scoped to this invocation and is
    /// cancelled when the dispatcher gives up on it.
    async fn start(&self, force: bool, rounds: u32, cancel: CancellationToken) -> Result<TaskHandle>;

    /// Ask in-flight work to stop. Never forceful.
    async fn stop(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_handle_join_success() {
        let handle = TaskHandle::spawn(async { Ok(()) });
        assert!(handle.join().await.is_ok());
    }

    #[tokio::test]
    async fn test_handle_join_error() {
        let handle = TaskHandle::spawn(async { Err(SesameError::Task("nope".into())) });
        let err = handle.join().await.unwrap_err();
        assert!(matches!(err, SesameError::Task(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_active_then_aborted() {
        let handle = TaskHandle::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        assert!(handle.is_active());
        handle.abort();
        let err = handle.join().await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
