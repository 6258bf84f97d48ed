//! Task dispatch engine: runs the registered tasks round by round under a
//! small concurrency gate, then schedules the next cycle and prints a
//! summary.
//!
//! ```text
//! run(is_first, rounds)
//!   ├─ resolve eligibility once
//!   ├─ round 1..=N (sequential)
//!   │    ├─ filter enabled + not excluded
//!   │    └─ Semaphore(max_concurrency) + JoinSet → TaskOutcome → stats
//!   ├─ set once-daily flag (outside sleep window)
//!   └─ finalize: schedule next (unless cancelled), summary
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local};
use sesame_core::config::SesameConfig;
use sesame_core::error::{Result, SesameError};
use sesame_core::traits::{CycleScheduler, FlagStore, ONCE_DAILY_FINISHED, StatusLog, Task, TaskHandle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::clock::SleepWindow;
use crate::control::RunControl;
use crate::eligibility::{EligibilityPolicy, EligibilityStatus};
use crate::stats::{DispatchStats, StatsSnapshot};
use crate::tasks::{TaskKind, TaskOutcome};

/// Status board entries about the next run live this long.
const NEXT_RUN_NOTICE_TTL: Duration = Duration::from_secs(5 * 60 * 60);

/// Banner logged at the start of every round.
pub fn round_banner(round: u32, total: u32, task_count: usize) -> String {
    format!("🔄 [第 {round}/{total} 轮] 开始，共 {task_count} 个任务")
}

/// What one `run` call did.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub elapsed: Duration,
    pub stats: StatsSnapshot,
    pub cancelled: bool,
    pub next_execution: Option<DateTime<Local>>,
}

pub struct TaskDispatcher {
    tasks: Vec<Arc<dyn Task>>,
    policy: EligibilityPolicy,
    once_daily_enabled: bool,
    sleep_window: Option<SleepWindow>,
    identity: Option<String>,
    runner: TaskRunner,
    max_concurrency: usize,
    flags: Arc<dyn FlagStore>,
    scheduler: Arc<dyn CycleScheduler>,
    status: Arc<dyn StatusLog>,
}

impl TaskDispatcher {
    pub fn new(
        config: &SesameConfig,
        flags: Arc<dyn FlagStore>,
        scheduler: Arc<dyn CycleScheduler>,
        status: Arc<dyn StatusLog>,
    ) -> Self {
        let dispatch = &config.dispatch;
        let sleep_window = dispatch.sleep_window.as_deref().and_then(|s| {
            let window = SleepWindow::parse(s);
            if window.is_none() {
                tracing::warn!("⚠️ Ignoring malformed sleep window '{}'", s);
            }
            window
        });
        Self {
            tasks: Vec::new(),
            policy: EligibilityPolicy::new(&config.once_daily, dispatch.check_interval()),
            once_daily_enabled: config.once_daily.enabled,
            sleep_window,
            identity: config.identity.clone(),
            runner: TaskRunner {
                control: Arc::new(RunControl::new()),
                stats: Arc::new(DispatchStats::new()),
                whitelist: Arc::new(dispatch.whitelist.clone()),
                task_timeout: dispatch.task_timeout(),
                whitelist_timeout: dispatch.whitelist_timeout(),
            },
            max_concurrency: dispatch.max_concurrency.max(1),
            flags,
            scheduler,
            status,
        }
    }

    /// Share a run control owned elsewhere (e.g. the Ctrl-C handler).
    pub fn with_control(mut self, control: Arc<RunControl>) -> Self {
        self.runner.control = control;
        self
    }

    pub fn register(&mut self, task: Arc<dyn Task>) {
        tracing::debug!("📅 Task registered: '{}'", task.name());
        self.tasks.push(task);
    }

    pub fn tasks(&self) -> &[Arc<dyn Task>] {
        &self.tasks
    }

    pub fn control(&self) -> Arc<RunControl> {
        self.runner.control.clone()
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        self.runner.stats.clone()
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Run one cycle of `rounds` rounds. Returns `None` when a manual run
    /// holds the dispatcher.
    pub async fn run(&self, is_first: bool, rounds: u32) -> Option<CycleSummary> {
        let control = &self.runner.control;
        if control.is_manual_running() {
            tracing::info!("⏸️ 手动任务运行中，跳过本次执行");
            return None;
        }
        if is_first {
            self.runner.stats.reset();
            if let Some(identity) = &self.identity {
                self.status.remove(identity);
            }
            control.reset();
        }

        let started = Instant::now();
        let started_at = Local::now();
        match self.run_rounds(rounds).await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => tracing::info!("🛑 执行已取消: {e}"),
            Err(e) => tracing::error!("❌ 执行异常: {e}"),
        }
        Some(self.finalize(started, started_at))
    }

    async fn run_rounds(&self, rounds: u32) -> Result<()> {
        let now = Local::now().naive_local();
        let status = self.policy.resolve(now, self.flags.as_ref());

        for round in 1..=rounds {
            self.execute_round(round, rounds, &status).await?;
        }

        if self.once_daily_enabled {
            if self.in_sleep_window() {
                tracing::debug!("Inside module sleep window; not marking today's pass finished");
            } else if let Err(e) = self.flags.set_flag_today(ONCE_DAILY_FINISHED) {
                tracing::warn!("⚠️ Failed to record once-daily flag: {e}");
            }
        }
        Ok(())
    }

    async fn execute_round(&self, round: u32, total: u32, status: &EligibilityStatus) -> Result<()> {
        let (excluded, eligible): (Vec<_>, Vec<_>) = self
            .tasks
            .iter()
            .filter(|t| t.is_enabled())
            .cloned()
            .partition(|t| self.policy.is_excluded(t.name(), status));

        if !excluded.is_empty() {
            let names: Vec<&str> = excluded.iter().map(|t| t.name()).collect();
            tracing::info!("⏭️ 今日已完成，跳过单次任务: {}", names.join(", "));
            self.runner.stats.add_skipped(excluded.len());
        }

        let control = &self.runner.control;
        if control.is_cancelled() {
            return Err(SesameError::Cancelled(format!("round {round} not started")));
        }

        tracing::info!("{}", round_banner(round, total, eligible.len()));
        let round_started = Instant::now();
        let gate = Arc::new(Semaphore::new(self.max_concurrency));
        let mut running = JoinSet::new();

        for task in eligible {
            let gate = gate.clone();
            let runner = self.runner.clone();
            running.spawn(async move {
                let Ok(_permit) = gate.acquire_owned().await else {
                    return;
                };
                runner.run_task(task).await;
            });
        }

        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                tracing::error!("❌ Task panicked: {e}");
                self.runner
                    .stats
                    .record("<panicked>", &TaskOutcome::Failure { reason: e.to_string() });
            }
        }
        tracing::info!(
            "🔄 [第 {}/{} 轮] 结束，用时 {}ms",
            round,
            total,
            round_started.elapsed().as_millis()
        );

        if control.is_cancelled() {
            return Err(SesameError::Cancelled(format!("stopped during round {round}")));
        }
        Ok(())
    }

    fn in_sleep_window(&self) -> bool {
        self.sleep_window
            .is_some_and(|w| w.contains(Local::now().time()))
    }

    fn finalize(&self, started: Instant, started_at: DateTime<Local>) -> CycleSummary {
        let cancelled = self.runner.control.is_cancelled();
        if cancelled {
            tracing::info!("🛑 已停止，不再调度下次执行");
        } else if let Err(e) = self.scheduler.schedule_next(started_at) {
            tracing::error!("❌ 调度下次执行失败: {e}");
        }

        let summary = CycleSummary {
            elapsed: started.elapsed(),
            stats: self.runner.stats.snapshot(),
            cancelled,
            next_execution: self.scheduler.next_execution(),
        };
        self.print_summary(&summary);
        summary
    }

    fn print_summary(&self, summary: &CycleSummary) {
        let stats = &summary.stats;
        let average = stats
            .average
            .map(|d| format!("{}ms", d.as_millis()))
            .unwrap_or_else(|| "-".into());
        tracing::info!(
            "📊 执行完成 | 用时 {:.1}s | 成功 {} | 失败 {} | 跳过 {} | 平均耗时 {}",
            summary.elapsed.as_secs_f64(),
            stats.success,
            stats.failure,
            stats.skipped,
            average
        );

        match summary.next_execution {
            Some(next) => {
                let when = next.format("%Y-%m-%d %H:%M:%S");
                tracing::info!("📅 下次执行: {}", when);
                if let Some(identity) = &self.identity {
                    self.status
                        .post(&format!("{identity}📅 下次运行: {when}"), NEXT_RUN_NOTICE_TTL);
                }
            }
            None => tracing::info!("📅 下次执行: 未调度"),
        }

        let pending = self.scheduler.pending_tasks();
        if !pending.is_empty() {
            tracing::info!("⏰ 待执行子任务 {} 个:", pending.len());
            for task in &pending {
                tracing::info!("   • {} @ {}", task.display_name(), task.exec_time.format("%H:%M:%S"));
            }
        }
    }
}

/// Everything a spawned task invocation needs.
#[derive(Clone)]
struct TaskRunner {
    control: Arc<RunControl>,
    stats: Arc<DispatchStats>,
    whitelist: Arc<Vec<String>>,
    task_timeout: Duration,
    whitelist_timeout: Duration,
}

impl TaskRunner {
    async fn run_task(&self, task: Arc<dyn Task>) {
        let name = task.name().to_string();
        let outcome = self.execute(task.as_ref()).await;
        match &outcome {
            TaskOutcome::Success { .. } => tracing::info!("✅ {} {}", name, outcome),
            TaskOutcome::Skipped { .. } | TaskOutcome::Cancelled => {
                tracing::info!("⏭️ {} {}", name, outcome)
            }
            TaskOutcome::Failure { .. } | TaskOutcome::Timeout { .. } => {
                tracing::warn!("❌ {} {}", name, outcome)
            }
        }
        self.stats.record(&name, &outcome);
    }

    /// Each invocation is a single pass; the dispatcher repeats rounds.
    async fn execute(&self, task: &dyn Task) -> TaskOutcome {
        if self.control.is_cancelled() {
            return TaskOutcome::Cancelled;
        }
        if self.control.is_manual_running() {
            return TaskOutcome::Skipped { reason: "手动任务运行中".into() };
        }

        let kind = TaskKind::classify(task.name(), &self.whitelist);
        let cancel = self.control.token().child_token();
        let started = Instant::now();
        task.add_run_cents();
        tracing::info!("▶️ 开始执行: {}", task.name());

        let outcome = match kind {
            TaskKind::Whitelisted => {
                let attempt = tokio::time::timeout(
                    self.whitelist_timeout,
                    task.start(false, 1, cancel.clone()),
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    res = attempt => Some(match res {
                        Ok(Ok(handle)) if handle.is_active() => {
                            track_background(task.name(), handle);
                            TaskOutcome::Success { duration: started.elapsed(), background: true }
                        }
                        Ok(Ok(handle)) => completion(handle.join().await, started),
                        Ok(Err(e)) => completion(Err(e), started),
                        Err(_) => {
                            tracing::info!("⏱️ {} 启动超时，视为后台运行", task.name());
                            TaskOutcome::Success { duration: started.elapsed(), background: true }
                        }
                    }),
                }
            }
            TaskKind::Normal => {
                let attempt = tokio::time::timeout(self.task_timeout, async {
                    task.start(false, 1, cancel.clone()).await?.join().await
                });
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    res = attempt => Some(match res {
                        Ok(result) => completion(result, started),
                        Err(_) => {
                            cancel.cancel();
                            task.stop().await;
                            TaskOutcome::Timeout { elapsed: started.elapsed() }
                        }
                    }),
                }
            }
        };

        match outcome {
            Some(outcome) => outcome,
            None => {
                // stop requested while the task was running
                task.stop().await;
                TaskOutcome::Cancelled
            }
        }
    }
}

fn completion(result: Result<()>, started: Instant) -> TaskOutcome {
    match result {
        Ok(()) => TaskOutcome::Success { duration: started.elapsed(), background: false },
        Err(e) if e.is_cancelled() => TaskOutcome::Cancelled,
        Err(e) => TaskOutcome::Failure { reason: e.to_string() },
    }
}

/// Detach a still-running handle; its end is only logged.
fn track_background(name: &str, handle: TaskHandle) {
    let name = name.to_string();
    tokio::spawn(async move {
        match handle.join().await {
            Ok(()) => tracing::debug!("🌙 后台任务 {} 已结束", name),
            Err(e) => tracing::debug!("🌙 后台任务 {} 结束: {e}", name),
        }
    });
}
