//! Collaborator traits consumed by the scheduler.

pub mod flags;
pub mod game;
pub mod schedule;
pub mod task;

pub use flags::{FlagStore, ONCE_DAILY_FINISHED};
pub use game::{GameService, LegacyGame, Mole, RoundStart};
pub use schedule::{CycleScheduler, PendingTask, StatusLog};
pub use task::{Task, TaskHandle};
