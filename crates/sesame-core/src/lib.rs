//! # Sesame Core
//!
//! Shared vocabulary for the Sesame task runner: configuration, the error
//! type, and the narrow collaborator traits the scheduler consumes.
//!
//! ## Collaborators
//! ```text
//! Dispatcher
//!   ├── Task            : one runnable module (forest, farm, sports, ...)
//!   ├── FlagStore       : "done today" flags (OnceDaily::Finished)
//!   ├── CycleScheduler  : decides when the next cycle starts
//!   └── StatusLog       : short per-identity status lines for the UI
//! WhackMoleTask
//!   └── GameService     : start / whack / settle RPCs of the mini-game
//! ```

pub mod config;
pub mod error;
pub mod traits;

pub use config::SesameConfig;
pub use error::{Result, SesameError};
