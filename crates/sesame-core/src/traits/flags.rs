//! Persisted "done today" flags.

use crate::error::Result;

/// Flag set once the first full pass of the day has completed.
pub const ONCE_DAILY_FINISHED: &str = "OnceDaily::Finished";

/// Day-scoped boolean flags. A flag set today reads as unset tomorrow.
pub trait FlagStore: Send + Sync {
    fn has_flag_today(&self, key: &str) -> bool;
    fn set_flag_today(&self, key: &str) -> Result<()>;
}
