//! # Sesame Scheduler
//!
//! Round-based dispatcher for independently runnable task modules, the
//! once-daily eligibility policy, and the time-boxed whack-mole game.
//!
//! ## Architecture
//! ```text
//! TaskDispatcher::run(is_first, rounds)
//!   ├── EligibilityPolicy ── FlagStore ("OnceDaily::Finished")
//!   ├── round 1..=N ── Semaphore(2) + JoinSet
//!   │     ├── whitelisted task: 30s, success once running
//!   │     └── normal task:     10min, success on completion
//!   ├── RunControl (CancellationToken, manual-run flag)
//!   └── finalize ── CycleScheduler::schedule_next + summary + StatusLog
//!
//! WhackMoleTask (森林打地鼠)
//!   └── SessionOrchestrator::run_window(12000ms)
//!         ├── IntervalScheduler: jittered launches, 2200ms margin
//!         └── settle in launch order, 200-250ms apart
//! ```

pub mod clock;
pub mod control;
pub mod cycle;
pub mod eligibility;
pub mod engine;
pub mod interval;
pub mod session;
pub mod stats;
pub mod status;
pub mod store;
pub mod tasks;
pub mod whack;

pub use clock::SleepWindow;
pub use control::RunControl;
pub use cycle::FixedDelayScheduler;
pub use eligibility::{EligibilityPolicy, EligibilityStatus, ModeBadge, OnceDailyMode};
pub use engine::{CycleSummary, TaskDispatcher};
pub use interval::{IntervalPlan, IntervalScheduler};
pub use session::{GameSession, SessionOrchestrator, WHACK_MOLE_EXECUTED, WindowReport};
pub use stats::{DispatchStats, StatsSnapshot};
pub use status::StatusBoard;
pub use store::{DailyFlagStore, MemoryFlagStore};
pub use tasks::{TaskKind, TaskOutcome};
pub use whack::WhackMoleTask;
