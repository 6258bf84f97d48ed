//! Session orchestrator for the time-boxed mini-game.
//!
//! One window: launch up to N games spread over `budget - margin`, wait
//! until the whole budget has elapsed from window start, then settle every
//! started game in launch order with a short jittered pause between
//! settlements.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use sesame_core::config::LaunchStrategy;
use sesame_core::error::{Result, SesameError};
use sesame_core::traits::{FlagStore, GameService};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::interval::IntervalScheduler;

/// Day flag set once the game is done for today (or the limit was hit).
pub const WHACK_MOLE_EXECUTED: &str = "forest::whackMole::executed";

/// Pause after a successful start, before the entrance ping.
const POST_START_PAUSE_MS: RangeInclusive<u64> = 10..=15;

/// One started game round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub token: String,
    pub round_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowReport {
    /// Start requests issued.
    pub launched: u32,
    /// Games that actually started.
    pub started: usize,
    pub total_reward: u64,
}

pub struct SessionOrchestrator {
    service: Arc<dyn GameService>,
    margin: Duration,
    settle_jitter: RangeInclusive<u64>,
    strategy: LaunchStrategy,
    rng: StdRng,
    flags: Option<Arc<dyn FlagStore>>,
    cancel: CancellationToken,
}

impl SessionOrchestrator {
    /// `settle_jitter_ms` holds the inclusive bounds of the pause between
    /// two settlements; the order of the bounds does not matter.
    pub fn new(
        service: Arc<dyn GameService>,
        margin: Duration,
        settle_jitter_ms: [u64; 2],
        strategy: LaunchStrategy,
        rng: StdRng,
    ) -> Self {
        let [a, b] = settle_jitter_ms;
        Self {
            service,
            margin,
            settle_jitter: a.min(b)..=a.max(b),
            strategy,
            rng,
            flags: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Day flags used to record that today's play limit was reached.
    pub fn with_flags(mut self, flags: Arc<dyn FlagStore>) -> Self {
        self.flags = Some(flags);
        self
    }

    /// Stop launching and abandon the window once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run one window of `session_count` games inside `budget`.
    pub async fn run_window(&mut self, budget: Duration, session_count: u32) -> Result<WindowReport> {
        let window_start = Instant::now();
        let scheduler = IntervalScheduler::new(budget, self.margin);
        let plan = scheduler.plan(session_count, &mut self.rng);
        tracing::debug!(
            "🎯 Window plan: {} games, baseline {}ms, delays {:?}",
            session_count,
            plan.baseline().as_millis(),
            plan.delays()
        );

        let mut sessions = Vec::new();
        let mut launches = JoinSet::new();
        let mut launched = 0u32;

        for round in 1..=session_count {
            if self.cancel.is_cancelled() {
                break;
            }
            let elapsed = window_start.elapsed();
            if !scheduler.may_launch(elapsed) {
                tracing::info!(
                    "⏱️ 剩余时间不足，停止开局 (已开 {} 局，用时 {}ms)",
                    launched,
                    elapsed.as_millis()
                );
                break;
            }

            let pause = Duration::from_millis(self.rng.gen_range(POST_START_PAUSE_MS));
            let launch = launch_session(self.service.clone(), self.flags.clone(), round, pause);
            launched += 1;
            match self.strategy {
                LaunchStrategy::Concurrent => {
                    launches.spawn(launch);
                }
                LaunchStrategy::Sequential => match launch.await {
                    Some(session) => sessions.push(session),
                    None => break,
                },
            }

            let remaining = budget.saturating_sub(window_start.elapsed());
            let delay = scheduler.next_delay(&plan, round, session_count, remaining);
            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        while let Some(joined) = launches.join_next().await {
            match joined {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => tracing::warn!("⚠️ Launch task failed: {e}"),
            }
        }

        if self.cancel.is_cancelled() {
            return Err(SesameError::Cancelled(format!(
                "game window stopped with {} started",
                sessions.len()
            )));
        }
        if sessions.is_empty() {
            tracing::info!("🎮 没有成功开始的游戏，跳过结算");
            return Ok(WindowReport { launched, ..Default::default() });
        }

        sessions.sort_by_key(|s| s.round_number);
        tracing::info!(
            "⏳ 已开始 {} 局，等待窗口结束 ({}ms)",
            sessions.len(),
            budget.as_millis()
        );
        tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(SesameError::Cancelled("game window stopped before settlement".into()));
            }
            _ = tokio::time::sleep_until(window_start + budget) => {}
        }

        let total_reward = self.settle_all(&sessions).await;
        tracing::info!(
            "💰 打地鼠结算完成: {} 局，共获得 {}g 能量",
            sessions.len(),
            total_reward
        );
        Ok(WindowReport {
            launched,
            started: sessions.len(),
            total_reward,
        })
    }

    async fn settle_all(&mut self, sessions: &[GameSession]) -> u64 {
        let mut total = 0;
        for (i, session) in sessions.iter().enumerate() {
            if i > 0 {
                let pause = self.rng.gen_range(self.settle_jitter.clone());
                tokio::time::sleep(Duration::from_millis(pause)).await;
            }
            match self.service.settle_round(&session.token).await {
                Ok(reward) => {
                    tracing::debug!("第 {} 局结算: +{}g", session.round_number, reward);
                    total += reward;
                }
                Err(e) => {
                    tracing::warn!("⚠️ 第 {} 局结算失败: {e}", session.round_number);
                }
            }
        }
        total
    }
}

/// Start one game. `None` when it did not start.
async fn launch_session(
    service: Arc<dyn GameService>,
    flags: Option<Arc<dyn FlagStore>>,
    round: u32,
    pause: Duration,
) -> Option<GameSession> {
    match service.start_round().await {
        Ok(start) if !start.can_play_today => {
            tracing::info!("🎮 今日打地鼠次数已用完");
            if let Some(flags) = flags {
                if let Err(e) = flags.set_flag_today(WHACK_MOLE_EXECUTED) {
                    tracing::warn!("⚠️ Failed to record whack-mole flag: {e}");
                }
            }
            None
        }
        Ok(start) => {
            tokio::time::sleep(pause).await;
            if let Err(e) = service.enter_hub().await {
                tracing::debug!("Entrance ping failed after round {round}: {e}");
            }
            tracing::debug!("🎮 第 {} 局已开始", round);
            Some(GameSession {
                token: start.token,
                round_number: round,
            })
        }
        Err(e) => {
            tracing::warn!("⚠️ 第 {} 局开局失败: {e}", round);
            None
        }
    }
}
