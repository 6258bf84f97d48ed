//! Time-of-day helpers: "HHmm" markers and the module sleep window.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Parse an "HHmm" marker ("0600", "2000") into a time of day.
pub fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    if s.len() != 4 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = s[..2].parse().ok()?;
    let minute: u32 = s[2..].parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Anchor an "HHmm" marker on `day`.
pub fn marker_on(day: NaiveDate, marker: &str) -> Option<NaiveDateTime> {
    parse_hhmm(marker).map(|t| day.and_time(t))
}

/// Daily window during which modules sleep, e.g. "2330-0600".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl SleepWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse "HHmm-HHmm". Returns `None` for malformed input.
    pub fn parse(s: &str) -> Option<Self> {
        let (start, end) = s.split_once('-')?;
        Some(Self::new(parse_hhmm(start)?, parse_hhmm(end)?))
    }

    /// Start inclusive, end exclusive. Windows may wrap past midnight.
    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}
