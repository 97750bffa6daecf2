// src/schedule/cadence.rs

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;

/// Fixed distance between the starts of two consecutive intervals.
///
/// Always at least one millisecond long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cadence(TimeDelta);

impl Cadence {
    pub fn from_std(duration: Duration) -> Result<Self, String> {
        let delta = TimeDelta::from_std(duration)
            .map_err(|e| format!("cadence out of range: {e}"))?;
        if delta.num_milliseconds() < 1 {
            return Err("cadence must be at least 1ms".to_string());
        }
        Ok(Self(delta))
    }

    /// An `n`-hour cadence. `0` is clamped to one hour.
    pub fn hours(n: u32) -> Self {
        Self(TimeDelta::hours(i64::from(n.max(1))))
    }

    /// An `n`-day cadence. `0` is clamped to one day.
    pub fn days(n: u32) -> Self {
        Self(TimeDelta::days(i64::from(n.max(1))))
    }

    pub fn as_delta(&self) -> TimeDelta {
        self.0
    }

    pub(crate) fn as_millis(&self) -> i64 {
        self.0.num_milliseconds()
    }
}

impl FromStr for Cadence {
    type Err = String;

    /// Accepts `@hourly`, `@daily`, `@weekly` or a duration such as `"1d"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "@hourly" => Ok(Self::hours(1)),
            "@daily" => Ok(Self::days(1)),
            "@weekly" => Ok(Self::days(7)),
            other if other.starts_with('@') => Err(format!(
                "unsupported schedule preset '{other}'; expected @hourly, @daily or @weekly"
            )),
            other => Self::from_std(parse_duration(other)?),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.0.num_milliseconds();
        const UNITS: [(i64, &str); 5] = [
            (7 * 24 * 60 * 60 * 1000, "w"),
            (24 * 60 * 60 * 1000, "d"),
            (60 * 60 * 1000, "h"),
            (60 * 1000, "m"),
            (1000, "s"),
        ];
        for (size, suffix) in UNITS {
            if ms % size == 0 {
                return write!(f, "{}{}", ms / size, suffix);
            }
        }
        write!(f, "{ms}ms")
    }
}

/// Parse a duration string like `"500ms"`, `"30s"`, `"5m"`, `"2h"`, `"1d"`
/// or `"1w"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs = |mult: u64| {
        value
            .checked_mul(mult)
            .map(Duration::from_secs)
            .ok_or_else(|| format!("duration '{s}' is too large"))
    };

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => secs(1),
        "m" => secs(60),
        "h" => secs(60 * 60),
        "d" => secs(24 * 60 * 60),
        "w" => secs(7 * 24 * 60 * 60),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, h, d or w",
            unit
        )),
    }
}
