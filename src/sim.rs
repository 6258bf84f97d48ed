//! Simulated task modules and game service for dry runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use rand::Rng;
use sesame_core::error::{Result, SesameError};
use sesame_core::traits::{GameService, LegacyGame, Mole, PendingTask, RoundStart, Task, TaskHandle};
use sesame_scheduler::FixedDelayScheduler;
use tokio_util::sync::CancellationToken;

/// Display names of the simulated modules.
const MODULE_NAMES: &[&str] = &[
    "蚂蚁森林",
    "蚂蚁庄园",
    "海洋",
    "农场",
    "新村",
    "神奇物种",
    "运动",
    "会员",
    "蚂蚁森林合种",
    "绿色经营",
];

/// A module that sleeps a random while; fails now and then.
pub struct SimulatedTask {
    name: String,
    runs: AtomicU32,
}

impl SimulatedTask {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            runs: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Task for SimulatedTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn add_run_cents(&self) {
        self.runs.fetch_add(1, Ordering::Relaxed);
    }

    async fn start(&self, _force: bool, _rounds: u32, cancel: CancellationToken) -> Result<TaskHandle> {
        let (work_ms, fails) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(200..=1_500), rng.gen_bool(0.05))
        };
        let name = self.name.clone();
        Ok(TaskHandle::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(SesameError::Cancelled(name)),
                _ = tokio::time::sleep(Duration::from_millis(work_ms)) => {
                    if fails {
                        Err(SesameError::Task(format!("{name}: simulated failure")))
                    } else {
                        Ok(())
                    }
                }
            }
        }))
    }

    async fn stop(&self) {
        tracing::debug!("Stop requested for {}", self.name);
    }
}

pub fn simulated_tasks() -> Vec<Arc<dyn Task>> {
    MODULE_NAMES
        .iter()
        .map(|name| Arc::new(SimulatedTask::new(name)) as Arc<dyn Task>)
        .collect()
}

/// Demo sub-tasks so the summary has something to list.
pub fn seed_pending(scheduler: &FixedDelayScheduler) {
    let now = Local::now();
    for (offset_min, group) in [(45, "AW"), (90, "FA"), (600, "AS")] {
        scheduler.add_pending(PendingTask {
            id: format!("{group}|demo"),
            group: group.to_string(),
            exec_time: now + chrono::Duration::minutes(offset_min),
        });
    }
}

/// In-process stand-in for the remote game RPCs.
pub struct SimulatedGame {
    daily_limit: u32,
    played: AtomicU32,
}

impl SimulatedGame {
    pub fn new(daily_limit: u32) -> Self {
        Self {
            daily_limit,
            played: AtomicU32::new(0),
        }
    }

    async fn latency(&self) {
        let ms = rand::thread_rng().gen_range(40..=160);
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl GameService for SimulatedGame {
    async fn start_round(&self) -> Result<RoundStart> {
        self.latency().await;
        let n = self.played.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(RoundStart {
            token: format!("round-{n}"),
            can_play_today: n <= self.daily_limit,
        })
    }

    async fn enter_hub(&self) -> Result<()> {
        self.latency().await;
        Ok(())
    }

    async fn settle_round(&self, token: &str) -> Result<u64> {
        self.latency().await;
        if token.is_empty() {
            return Err(SesameError::Rpc("empty token".into()));
        }
        Ok(rand::thread_rng().gen_range(5..=30))
    }

    async fn start_legacy(&self) -> Result<LegacyGame> {
        self.latency().await;
        let moles = {
            let mut rng = rand::thread_rng();
            (1..=12).map(|id| Mole { id, has_bubble: rng.gen_bool(0.4) }).collect()
        };
        Ok(LegacyGame {
            token: "legacy".into(),
            moles,
        })
    }

    async fn whack(&self, _mole_id: u64, _token: &str) -> Result<u64> {
        self.latency().await;
        Ok(rand::thread_rng().gen_range(1..=5))
    }

    async fn settle_legacy(&self, _token: &str, remaining: &[u64]) -> Result<u64> {
        self.latency().await;
        Ok(remaining.len() as u64 * 2)
    }
}
