//! Whack-mole mini-game as a dispatchable task.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sesame_core::config::{WhackMode, WhackMoleConfig};
use sesame_core::error::{Result, SesameError};
use sesame_core::traits::{FlagStore, GameService, Task, TaskHandle};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::session::{SessionOrchestrator, WHACK_MOLE_EXECUTED};

pub const WHACK_MOLE_NAME: &str = "森林打地鼠";

/// Length of a legacy game.
const LEGACY_GAME: Duration = Duration::from_millis(6_000);
/// Settle this long before the legacy game ends.
const LEGACY_SETTLE_LEAD: Duration = Duration::from_millis(200);
const WHACK_JITTER_MS: std::ops::RangeInclusive<u64> = 100..=300;

pub struct WhackMoleTask {
    config: WhackMoleConfig,
    service: Arc<dyn GameService>,
    flags: Arc<dyn FlagStore>,
    running: Arc<AtomicBool>,
    current: Mutex<Option<CancellationToken>>,
    run_count: AtomicU32,
    seed: Option<u64>,
}

/// Clears the running flag when the game ends, aborted or not.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl WhackMoleTask {
    pub fn new(config: WhackMoleConfig, service: Arc<dyn GameService>, flags: Arc<dyn FlagStore>) -> Self {
        Self {
            config,
            service,
            flags,
            running: Arc::new(AtomicBool::new(false)),
            current: Mutex::new(None),
            run_count: AtomicU32::new(0),
            seed: None,
        }
    }

    /// Deterministic jitter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> u32 {
        self.run_count.load(Ordering::Relaxed)
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

#[async_trait]
impl Task for WhackMoleTask {
    fn name(&self) -> &str {
        WHACK_MOLE_NAME
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn add_run_cents(&self) {
        self.run_count.fetch_add(1, Ordering::Relaxed);
    }

    async fn start(&self, force: bool, _rounds: u32, cancel: CancellationToken) -> Result<TaskHandle> {
        if !force && self.flags.has_flag_today(WHACK_MOLE_EXECUTED) {
            tracing::info!("🎮 今日打地鼠已完成，跳过");
            return Ok(TaskHandle::spawn(async { Ok(()) }));
        }
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::info!("🎮 打地鼠仍在进行中，跳过本次启动");
            return Ok(TaskHandle::spawn(async { Ok(()) }));
        }
        let guard = RunningGuard(self.running.clone());
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = Some(cancel.clone());

        let service = self.service.clone();
        let flags = self.flags.clone();
        let config = self.config.clone();
        let mut rng = self.rng();

        Ok(TaskHandle::spawn(async move {
            let _guard = guard;
            let reward = match config.mode {
                WhackMode::Compatible => play_legacy(service.as_ref(), &mut rng, &cancel).await?,
                WhackMode::Aggressive => {
                    let mut orchestrator = SessionOrchestrator::new(
                        service,
                        config.margin(),
                        config.settle_jitter_ms,
                        config.launch_strategy,
                        rng,
                    )
                    .with_flags(flags.clone())
                    .with_cancel(cancel);
                    orchestrator.run_window(config.budget(), config.total_games).await?.total_reward
                }
            };
            tracing::info!("🎮 打地鼠完成，获得 {}g 能量", reward);
            flags.set_flag_today(WHACK_MOLE_EXECUTED)?;
            Ok(())
        }))
    }

    async fn stop(&self) {
        let token = self.current.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(token) = token {
            tracing::info!("🛑 停止打地鼠");
            token.cancel();
        }
    }
}

/// One game over the legacy RPCs: hit every bubble mole, wait out most of
/// the game, then settle the rest in one call. RPC failures end the game
/// with whatever was gathered; only cancellation is an error.
async fn play_legacy(service: &dyn GameService, rng: &mut StdRng, cancel: &CancellationToken) -> Result<u64> {
    let started = Instant::now();
    let game = match service.start_legacy().await {
        Ok(game) => game,
        Err(e) => {
            tracing::warn!("⚠️ 打地鼠开局失败: {e}");
            return Ok(0);
        }
    };
    let mut reward = 0;
    let mut hit = HashSet::new();

    let bubbles: Vec<u64> = game.moles.iter().filter(|m| m.has_bubble).map(|m| m.id).collect();
    for (i, &id) in bubbles.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(SesameError::Cancelled("legacy game stopped".into()));
        }
        match service.whack(id, &game.token).await {
            Ok(energy) => {
                reward += energy;
                hit.insert(id);
                // pause only between hits
                if i + 1 < bubbles.len() {
                    tokio::time::sleep(Duration::from_millis(rng.gen_range(WHACK_JITTER_MS))).await;
                }
            }
            Err(e) => tracing::warn!("⚠️ 打地鼠 {} 失败: {e}", id),
        }
    }

    let wait = LEGACY_GAME
        .saturating_sub(started.elapsed())
        .saturating_sub(LEGACY_SETTLE_LEAD);
    tokio::select! {
        _ = cancel.cancelled() => {
            return Err(SesameError::Cancelled("legacy game stopped".into()));
        }
        _ = tokio::time::sleep(wait) => {}
    }

    let remaining: Vec<u64> = game
        .moles
        .iter()
        .map(|m| m.id)
        .filter(|id| !hit.contains(id))
        .collect();
    match service.settle_legacy(&game.token, &remaining).await {
        Ok(energy) => reward += energy,
        Err(e) => tracing::warn!("⚠️ 打地鼠结算失败: {e}"),
    }
    Ok(reward)
}
