//! Sesame configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SesameError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SesameConfig {
    /// Display name of the active account, used as the status-board key.
    #[serde(default)]
    pub identity: Option<String>,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub once_daily: OnceDailyConfig,
    #[serde(default)]
    pub whack_mole: WhackMoleConfig,
}

impl Default for SesameConfig {
    fn default() -> Self {
        Self {
            identity: None,
            dispatch: DispatchConfig::default(),
            once_daily: OnceDailyConfig::default(),
            whack_mole: WhackMoleConfig::default(),
        }
    }
}

impl SesameConfig {
    /// Load config from the default path (~/.sesame/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SesameError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| SesameError::Config(format!("Failed to parse config: {e}")))?;
        tracing::debug!("📂 Loaded config from {}", path.display());
        Ok(config)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| SesameError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Sesame home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sesame")
    }
}

/// Dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Rounds per cycle.
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    /// Tasks running at once inside a round. Kept low so the remote
    /// service does not rate-limit the account.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    #[serde(default = "default_whitelist_timeout")]
    pub whitelist_timeout_secs: u64,
    /// Name fragments of long-running tasks that count as successful once
    /// they are up and running.
    #[serde(default = "default_whitelist")]
    pub whitelist: Vec<String>,
    /// Delay between cycles; also the length of each auto full-run window.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Module sleep window as "HHmm-HHmm", e.g. "0100-0600".
    #[serde(default)]
    pub sleep_window: Option<String>,
}

fn default_rounds() -> u32 { 1 }
fn default_max_concurrency() -> usize { 2 }
fn default_task_timeout() -> u64 { 600 }
fn default_whitelist_timeout() -> u64 { 30 }
fn default_whitelist() -> Vec<String> {
    vec!["森林", "庄园", "运动"]
        .into_iter().map(String::from).collect()
}
fn default_check_interval() -> u64 { 1800 }

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rounds: default_rounds(),
            max_concurrency: default_max_concurrency(),
            task_timeout_secs: default_task_timeout(),
            whitelist_timeout_secs: default_whitelist_timeout(),
            whitelist: default_whitelist(),
            check_interval_secs: default_check_interval(),
            sleep_window: None,
        }
    }
}

impl DispatchConfig {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_secs(self.task_timeout_secs)
    }

    pub fn whitelist_timeout(&self) -> Duration {
        Duration::from_secs(self.whitelist_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// "Run once per day" settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnceDailyConfig {
    /// Skip the selected modules once today's full pass is done.
    #[serde(default = "bool_true")]
    pub enabled: bool,
    /// Force a full pass inside the `auto_times` windows.
    #[serde(default)]
    pub auto: bool,
    /// Start markers of the auto full-run windows, "HHmm".
    #[serde(default = "default_auto_times")]
    pub auto_times: Vec<String>,
    /// Module ids skipped after the first full pass.
    #[serde(default = "default_once_daily_modules")]
    pub modules: Vec<String>,
}

fn bool_true() -> bool { true }
fn default_auto_times() -> Vec<String> {
    vec!["0600", "2000"]
        .into_iter().map(String::from).collect()
}
fn default_once_daily_modules() -> Vec<String> {
    vec![
        "antOrchard",
        "antCooperate",
        "antSports",
        "antMember",
        "EcoProtection",
        "greenFinance",
        "reserve",
    ]
    .into_iter().map(String::from).collect()
}

impl Default for OnceDailyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto: false,
            auto_times: default_auto_times(),
            modules: default_once_daily_modules(),
        }
    }
}

/// Which RPC family the mini-game uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhackMode {
    /// Single game over the legacy RPCs.
    Compatible,
    /// Many staggered games inside one window.
    Aggressive,
}

/// How launches are issued inside a mini-game window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchStrategy {
    /// Fire each start without waiting for its response.
    Concurrent,
    /// Await each start; the first failure stops launching.
    Sequential,
}

/// Whack-mole mini-game settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhackMoleConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_whack_mode")]
    pub mode: WhackMode,
    #[serde(default = "default_total_games")]
    pub total_games: u32,
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
    #[serde(default = "default_margin_ms")]
    pub margin_ms: u64,
    /// Inclusive bounds of the pause between two settlements.
    #[serde(default = "default_settle_jitter")]
    pub settle_jitter_ms: [u64; 2],
    #[serde(default = "default_launch_strategy")]
    pub launch_strategy: LaunchStrategy,
}

fn default_whack_mode() -> WhackMode { WhackMode::Aggressive }
fn default_total_games() -> u32 { 5 }
fn default_budget_ms() -> u64 { 12_000 }
fn default_margin_ms() -> u64 { 2_200 }
fn default_settle_jitter() -> [u64; 2] { [200, 250] }
fn default_launch_strategy() -> LaunchStrategy { LaunchStrategy::Concurrent }

impl Default for WhackMoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: default_whack_mode(),
            total_games: default_total_games(),
            budget_ms: default_budget_ms(),
            margin_ms: default_margin_ms(),
            settle_jitter_ms: default_settle_jitter(),
            launch_strategy: default_launch_strategy(),
        }
    }
}

impl WhackMoleConfig {
    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn margin(&self) -> Duration {
        Duration::from_millis(self.margin_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SesameConfig::default();
        assert_eq!(config.dispatch.rounds, 1);
        assert_eq!(config.dispatch.max_concurrency, 2);
        assert_eq!(config.dispatch.task_timeout(), Duration::from_secs(600));
        assert_eq!(config.dispatch.whitelist_timeout(), Duration::from_secs(30));
        assert!(config.once_daily.enabled);
        assert!(!config.once_daily.auto);
        assert_eq!(config.whack_mole.budget_ms, 12_000);
        assert_eq!(config.whack_mole.margin_ms, 2_200);
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            identity = "tester"

            [dispatch]
            rounds = 3
            max_concurrency = 4
            sleep_window = "0100-0600"

            [once_daily]
            auto = true
            auto_times = ["0700"]

            [whack_mole]
            mode = "compatible"
            launch_strategy = "sequential"
        "#;

        let config: SesameConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.identity.as_deref(), Some("tester"));
        assert_eq!(config.dispatch.rounds, 3);
        assert_eq!(config.dispatch.max_concurrency, 4);
        assert_eq!(config.dispatch.sleep_window.as_deref(), Some("0100-0600"));
        assert!(config.once_daily.enabled);
        assert!(config.once_daily.auto);
        assert_eq!(config.once_daily.auto_times, vec!["0700".to_string()]);
        assert_eq!(config.whack_mole.mode, WhackMode::Compatible);
        assert_eq!(config.whack_mole.launch_strategy, LaunchStrategy::Sequential);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let config: SesameConfig = toml::from_str("").unwrap();
        assert_eq!(config.dispatch.whitelist.len(), 3);
        assert_eq!(config.once_daily.modules.len(), 7);
        assert_eq!(config.whack_mole.total_games, 5);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = std::env::temp_dir().join("sesame-test-config");
        let path = dir.join("config.toml");
        let mut config = SesameConfig::default();
        config.once_daily.auto = true;
        config.save_to(&path).unwrap();

        let loaded = SesameConfig::load_from(&path).unwrap();
        assert!(loaded.once_daily.auto);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_home_dir() {
        let home = SesameConfig::home_dir();
        assert!(home.to_string_lossy().contains("sesame"));
    }
}
