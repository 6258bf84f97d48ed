//! # Sesame: round-based task runner
//!
//! Usage:
//!   sesame run                 # Dispatch cycles until Ctrl-C
//!   sesame run --once -r 2     # One cycle of two rounds
//!   sesame status              # Once-daily mode and today's status
//!   sesame toggle              # Advance the once-daily mode

mod sim;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use sesame_core::SesameConfig;
use sesame_core::traits::{CycleScheduler, FlagStore, ONCE_DAILY_FINISHED};
use sesame_scheduler::eligibility;
use sesame_scheduler::{
    DailyFlagStore, EligibilityPolicy, FixedDelayScheduler, SleepWindow, StatusBoard, TaskDispatcher,
    WHACK_MOLE_EXECUTED, WhackMoleTask,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sesame", version, about = "🌱 Sesame — round-based task runner")]
struct Cli {
    /// Config file
    #[arg(short, long, default_value = "~/.sesame/config.toml")]
    config: String,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Dispatch the task modules (simulated), cycle after cycle
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Rounds per cycle (defaults to [dispatch].rounds)
        #[arg(short, long)]
        rounds: Option<u32>,
    },
    /// Show the once-daily mode and today's eligibility
    Status,
    /// Advance the once-daily mode: off → enabled → auto → off
    Toggle,
}

fn config_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn load_config(path: &Path) -> Result<SesameConfig> {
    if path.exists() {
        Ok(SesameConfig::load_from(path)?)
    } else {
        tracing::debug!("No config at {}, using defaults", path.display());
        Ok(SesameConfig::default())
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default = if verbose {
        "sesame=debug,sesame_scheduler=debug,sesame_core=debug"
    } else {
        "sesame=info,sesame_scheduler=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let path = config_path(&cli.config);
    let config = load_config(&path)?;

    match cli.command {
        Command::Run { once, rounds } => run(config, once, rounds).await,
        Command::Status => status(&config),
        Command::Toggle => toggle(config, &path),
    }
}

async fn run(config: SesameConfig, once: bool, rounds: Option<u32>) -> Result<()> {
    let flags: Arc<dyn FlagStore> = Arc::new(DailyFlagStore::new(&DailyFlagStore::default_path()));
    let scheduler = Arc::new(FixedDelayScheduler::new(config.dispatch.check_interval()));
    let status = Arc::new(StatusBoard::new());
    sim::seed_pending(&scheduler);

    let mut dispatcher = TaskDispatcher::new(&config, flags.clone(), scheduler.clone(), status);
    for task in sim::simulated_tasks() {
        dispatcher.register(task);
    }
    let game = Arc::new(sim::SimulatedGame::new(config.whack_mole.total_games * 2));
    dispatcher.register(Arc::new(WhackMoleTask::new(config.whack_mole.clone(), game, flags)));

    let control = dispatcher.control();
    {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                control.stop_all();
            }
        });
    }

    let rounds = rounds.unwrap_or(config.dispatch.rounds).max(1);
    println!("🌱 Sesame v{}", env!("CARGO_PKG_VERSION"));
    println!("   📋 Tasks:  {}", dispatcher.tasks().len());
    println!("   🔁 Rounds: {rounds}");
    println!("   ⏰ Every:  {}s", config.dispatch.check_interval_secs);
    println!();

    let mut is_first = true;
    loop {
        dispatcher.run(is_first, rounds).await;
        is_first = false;
        if once || control.is_cancelled() {
            break;
        }

        let wait = scheduler.until_next(Local::now());
        tracing::info!("💤 等待下次执行 ({}s)", wait.as_secs());
        let token = control.token();
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
        scheduler.prune(Local::now());
    }

    if let Some(next) = scheduler.next_execution() {
        tracing::debug!("Exiting; next run would have been {}", next.format("%H:%M:%S"));
    }
    Ok(())
}

fn status(config: &SesameConfig) -> Result<()> {
    let flags = DailyFlagStore::new(&DailyFlagStore::default_path());
    let policy = EligibilityPolicy::new(&config.once_daily, config.dispatch.check_interval());
    let now = Local::now().naive_local();
    let finished = flags.has_flag_today(ONCE_DAILY_FINISHED);
    let status = policy.evaluate(now, finished);
    let badge = policy.mode().badge(finished);

    println!("🌱 Sesame status — {}", now.format("%Y-%m-%d %H:%M"));
    println!("   🎛️  Mode:          {} (#{:06X})", badge.label, badge.color);
    println!("   ✅ Finished today: {}", status.is_finished_today);
    println!("   ⏭️  Suppressing:   {}", status.suppression_active());
    if config.once_daily.auto {
        let windows = policy.describe_windows(now);
        let active = if policy.is_special_time(now) { " (active)" } else { "" };
        println!("   🕒 Auto windows:  {}{}", windows.join(", "), active);
    }
    if let Some(raw) = &config.dispatch.sleep_window {
        match SleepWindow::parse(raw) {
            Some(w) => println!("   😴 Sleep window:  {raw} (now {})", if w.contains(now.time()) { "sleeping" } else { "awake" }),
            None => println!("   ⚠️  Sleep window '{raw}' is malformed"),
        }
    }
    println!("   🎮 Whack-mole:    {}", if flags.has_flag_today(WHACK_MOLE_EXECUTED) { "done" } else { "pending" });
    if !config.once_daily.modules.is_empty() {
        let labels: Vec<&str> = config
            .once_daily
            .modules
            .iter()
            .map(|m| eligibility::module_label(m).unwrap_or(m.as_str()))
            .collect();
        println!("   📦 Once-daily:    {}", labels.join(", "));
    }
    Ok(())
}

fn toggle(mut config: SesameConfig, path: &Path) -> Result<()> {
    let mode = eligibility::toggle(&mut config.once_daily);
    config.save_to(path)?;
    let flags = DailyFlagStore::new(&DailyFlagStore::default_path());
    let badge = mode.badge(flags.has_flag_today(ONCE_DAILY_FINISHED));
    println!("🎛️  Once-daily mode: {} (#{:06X})", badge.label, badge.color);
    println!("   💾 Saved to {}", path.display());
    Ok(())
}
