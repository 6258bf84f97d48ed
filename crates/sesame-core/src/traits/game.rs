//! Remote service of the whack-mole mini-game. Wire format is opaque here.

use async_trait::async_trait;

use crate::error::Result;

/// Response to a standard start-round request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStart {
    pub token: String,
    /// False once the daily play limit is reached.
    pub can_play_today: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mole {
    pub id: u64,
    /// Moles carrying an energy bubble are worth hitting individually.
    pub has_bubble: bool,
}

/// A legacy single game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyGame {
    pub token: String,
    pub moles: Vec<Mole>,
}

#[async_trait]
pub trait GameService: Send + Sync {
    async fn start_round(&self) -> Result<RoundStart>;
    /// Entrance ping sent after a start. Best effort.
    async fn enter_hub(&self) -> Result<()>;
    /// Settle a standard round; returns the energy it yielded.
    async fn settle_round(&self, token: &str) -> Result<u64>;

    async fn start_legacy(&self) -> Result<LegacyGame>;
    async fn whack(&self, mole_id: u64, token: &str) -> Result<u64>;
    async fn settle_legacy(&self, token: &str, remaining: &[u64]) -> Result<u64>;
}
