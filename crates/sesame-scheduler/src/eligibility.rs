//! Once-daily eligibility policy.
//!
//! After the first full pass of a day has finished, modules selected in
//! `[once_daily].modules` are skipped by later rounds. Auto mode forces a
//! full pass again inside the configured windows.
//!
//! ```text
//! toggle():  Off ──▶ Enabled ──▶ Auto ──▶ Off
//! ```

use std::collections::HashSet;
use std::time::Duration;

use chrono::NaiveDateTime;
use sesame_core::config::OnceDailyConfig;
use sesame_core::traits::{FlagStore, ONCE_DAILY_FINISHED};

use crate::clock;

/// Fixed module table: (module id, localized display fragment).
/// Order matters: "蚂蚁森林合种" must resolve to antCooperate, not antForest.
const MODULES: &[(&str, &str)] = &[
    ("antCooperate", "合种"),
    ("antForest", "蚂蚁森林"),
    ("antFarm", "蚂蚁庄园"),
    ("antOcean", "海洋"),
    ("antOrchard", "农场"),
    ("antStall", "新村"),
    ("antDodo", "神奇物种"),
    ("antSports", "运动"),
    ("antMember", "会员"),
    ("EcoProtection", "生态保护"),
    ("greenFinance", "绿色经营"),
    ("reserve", "保护地"),
    ("other", "其他任务"),
];

/// Map a task's display name (or module id) to its module id.
pub fn module_id(task_info: &str) -> Option<&'static str> {
    MODULES
        .iter()
        .find(|(id, label)| task_info.contains(label) || task_info.contains(id))
        .map(|(id, _)| *id)
}

/// Localized label of a module id.
pub fn module_label(id: &str) -> Option<&'static str> {
    MODULES.iter().find(|(m, _)| *m == id).map(|(_, label)| *label)
}

/// Result of one eligibility evaluation. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EligibilityStatus {
    /// Final suppression decision. Only ever true when `is_finished_today`.
    pub is_enabled_override: bool,
    /// Raw persisted "finished today" flag.
    pub is_finished_today: bool,
}

impl EligibilityStatus {
    /// True when selected modules are being skipped.
    pub fn suppression_active(&self) -> bool {
        self.is_enabled_override && self.is_finished_today
    }
}

/// Evaluates the once-daily settings against the clock.
#[derive(Debug, Clone)]
pub struct EligibilityPolicy {
    enabled: bool,
    auto: bool,
    auto_times: Vec<String>,
    window: Duration,
    modules: HashSet<String>,
}

impl EligibilityPolicy {
    /// `window` is the length of each auto full-run window (the check interval).
    pub fn new(config: &OnceDailyConfig, window: Duration) -> Self {
        Self {
            enabled: config.enabled,
            auto: config.auto,
            auto_times: config.auto_times.clone(),
            window,
            modules: config.modules.iter().cloned().collect(),
        }
    }

    pub fn mode(&self) -> OnceDailyMode {
        OnceDailyMode::from_flags(self.enabled, self.auto)
    }

    /// True when `now` lies in `[marker, marker + window]` for any marker
    /// anchored on `now`'s calendar day.
    pub fn is_special_time(&self, now: NaiveDateTime) -> bool {
        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::zero());
        self.auto_times.iter().any(|marker| match clock::marker_on(now.date(), marker) {
            Some(start) => now >= start && now <= start + window,
            None => {
                tracing::debug!("Ignoring malformed auto time marker '{}'", marker);
                false
            }
        })
    }

    /// Pure decision for `now` given the persisted flag.
    pub fn evaluate(&self, now: NaiveDateTime, finished_today: bool) -> EligibilityStatus {
        let forced_full_run = self.auto && self.is_special_time(now);
        let is_enabled_override = self.enabled && !forced_full_run && finished_today;
        EligibilityStatus {
            is_enabled_override,
            is_finished_today: finished_today,
        }
    }

    /// Read the persisted flag, evaluate, and log which branch was taken.
    pub fn resolve(&self, now: NaiveDateTime, flags: &dyn FlagStore) -> EligibilityStatus {
        let finished = flags.has_flag_today(ONCE_DAILY_FINISHED);
        let status = self.evaluate(now, finished);

        if self.auto && self.is_special_time(now) {
            tracing::info!("自动单次运行触发: 现在处于自动全量运行时段，本次将运行所有已开启的任务");
        } else if self.auto {
            tracing::info!("已设置自动全量运行，时段为：{}", self.describe_windows(now).join(", "));
        }

        if self.enabled && !(self.auto && self.is_special_time(now)) {
            if finished {
                tracing::info!("当日单次运行模式生效: 今日已完成全量运行，已启用跳过黑名单任务");
            } else {
                tracing::info!("当日单次运行模式生效: 今日尚未完成首次全量运行，本次将运行所有任务");
            }
        }
        status
    }

    /// Auto windows of `now`'s day as "HHmm-HHmm".
    pub fn describe_windows(&self, now: NaiveDateTime) -> Vec<String> {
        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::zero());
        self.auto_times
            .iter()
            .filter_map(|marker| {
                let start = clock::marker_on(now.date(), marker)?;
                Some(format!("{}-{}", marker.trim(), (start + window).format("%H%M")))
            })
            .collect()
    }

    /// True when `task_name` must be skipped under `status`.
    /// Names that map to no known module are never excluded.
    pub fn is_excluded(&self, task_name: &str, status: &EligibilityStatus) -> bool {
        if !status.suppression_active() {
            return false;
        }
        module_id(task_name).is_some_and(|id| self.modules.contains(id))
    }
}

/// User-facing once-daily mode, derived from (enabled, auto).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnceDailyMode {
    Off,
    Enabled,
    Auto,
}

/// Label and indicator colour (0xRRGGBB) of the mode toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeBadge {
    pub label: &'static str,
    pub color: u32,
}

const RED: u32 = 0xF44336;
const GREEN: u32 = 0x4CAF50;
const ORANGE: u32 = 0xFF9800;

impl OnceDailyMode {
    pub fn from_flags(enabled: bool, auto: bool) -> Self {
        match (enabled, auto) {
            (false, _) => OnceDailyMode::Off,
            (true, false) => OnceDailyMode::Enabled,
            (true, true) => OnceDailyMode::Auto,
        }
    }

    /// (enabled, auto) pair stored in the config.
    pub fn flags(self) -> (bool, bool) {
        match self {
            OnceDailyMode::Off => (false, false),
            OnceDailyMode::Enabled => (true, false),
            OnceDailyMode::Auto => (true, true),
        }
    }

    pub fn next(self) -> Self {
        match self {
            OnceDailyMode::Off => OnceDailyMode::Enabled,
            OnceDailyMode::Enabled => OnceDailyMode::Auto,
            OnceDailyMode::Auto => OnceDailyMode::Off,
        }
    }

    /// Red when off; green once today's pass is finished, orange before.
    pub fn badge(self, finished_today: bool) -> ModeBadge {
        let progress = if finished_today { GREEN } else { ORANGE };
        match self {
            OnceDailyMode::Off => ModeBadge { label: "单次已关闭", color: RED },
            OnceDailyMode::Enabled => ModeBadge { label: "单次已启用", color: progress },
            OnceDailyMode::Auto => ModeBadge { label: "自动单次", color: progress },
        }
    }
}

/// Advance the config by exactly one mode and return the new mode.
pub fn toggle(config: &mut OnceDailyConfig) -> OnceDailyMode {
    let next = OnceDailyMode::from_flags(config.enabled, config.auto).next();
    (config.enabled, config.auto) = next.flags();
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn policy(enabled: bool, auto: bool) -> EligibilityPolicy {
        let config = OnceDailyConfig {
            enabled,
            auto,
            ..OnceDailyConfig::default()
        };
        EligibilityPolicy::new(&config, Duration::from_secs(30 * 60))
    }

    #[test]
    fn test_first_run_of_day_never_suppressed() {
        for (enabled, auto) in [(true, false), (true, true), (false, false), (false, true)] {
            for hour in [0, 6, 12, 20, 23] {
                let status = policy(enabled, auto).evaluate(at(hour, 10), false);
                assert!(!status.is_enabled_override);
                assert!(!status.is_finished_today);
            }
        }
    }

    #[test]
    fn test_auto_window_forces_full_run() {
        let p = policy(true, true);
        for now in [at(6, 0), at(6, 15), at(6, 30), at(20, 0), at(20, 29)] {
            assert!(p.is_special_time(now));
            assert!(!p.evaluate(now, true).is_enabled_override);
        }
    }

    #[test]
    fn test_outside_window_follows_setting() {
        let p = policy(true, true);
        assert!(!p.is_special_time(at(6, 31)));
        assert!(p.evaluate(at(12, 0), true).is_enabled_override);
        assert!(!policy(false, false).evaluate(at(12, 0), true).is_enabled_override);
    }

    #[test]
    fn test_window_ignored_without_auto() {
        let p = policy(true, false);
        assert!(p.evaluate(at(6, 10), true).is_enabled_override);
    }

    #[test]
    fn test_module_id_mapping() {
        assert_eq!(module_id("蚂蚁森林合种"), Some("antCooperate"));
        assert_eq!(module_id("蚂蚁森林"), Some("antForest"));
        assert_eq!(module_id("运动"), Some("antSports"));
        assert_eq!(module_id("antMember"), Some("antMember"));
        assert_eq!(module_id("神秘任务"), None);
        assert_eq!(module_label("reserve"), Some("保护地"));
    }

    #[test]
    fn test_is_excluded_requires_active_suppression() {
        let p = policy(true, false);
        let active = EligibilityStatus { is_enabled_override: true, is_finished_today: true };
        let inactive = EligibilityStatus { is_enabled_override: false, is_finished_today: true };

        assert!(p.is_excluded("运动", &active));
        assert!(!p.is_excluded("运动", &inactive));
        // antForest is not in the default exclusion set
        assert!(!p.is_excluded("蚂蚁森林", &active));
        assert!(!p.is_excluded("未知模块", &active));
    }

    #[test]
    fn test_describe_windows() {
        let p = policy(true, true);
        assert_eq!(p.describe_windows(at(12, 0)), vec!["0600-0630", "2000-2030"]);
    }

    #[test]
    fn test_toggle_cycles_through_three_states() {
        let mut config = OnceDailyConfig { enabled: false, auto: false, ..Default::default() };
        assert_eq!(toggle(&mut config), OnceDailyMode::Enabled);
        assert_eq!((config.enabled, config.auto), (true, false));
        assert_eq!(toggle(&mut config), OnceDailyMode::Auto);
        assert_eq!((config.enabled, config.auto), (true, true));
        assert_eq!(toggle(&mut config), OnceDailyMode::Off);
        assert_eq!((config.enabled, config.auto), (false, false));
    }

    #[test]
    fn test_toggle_from_inconsistent_flags() {
        let mut config = OnceDailyConfig { enabled: false, auto: true, ..Default::default() };
        assert_eq!(toggle(&mut config), OnceDailyMode::Enabled);
        assert!(!config.auto);
    }

    #[test]
    fn test_badge_colors() {
        assert_eq!(OnceDailyMode::Off.badge(true).color, RED);
        assert_eq!(OnceDailyMode::Enabled.badge(true).color, GREEN);
        assert_eq!(OnceDailyMode::Auto.badge(false).color, ORANGE);
        assert_eq!(OnceDailyMode::Auto.badge(false).label, "自动单次");
    }
}
