use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Size of an aggregation window.
///
/// A window is identified by its size together with its UTC-truncated start
/// instant. Two derived keys matter downstream: `window_start_key` names the
/// stored aggregate, `bucket_id` routes events to a queue partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowSize {
    Minute,
    Hour,
}

impl WindowSize {
    pub fn duration(&self) -> Duration {
        match self {
            WindowSize::Minute => Duration::minutes(1),
            WindowSize::Hour => Duration::hours(1),
        }
    }

    /// Truncates `t` down to the start of its window in UTC.
    pub fn truncate(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let t = t
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(t);
        match self {
            WindowSize::Minute => t,
            WindowSize::Hour => t.with_minute(0).unwrap_or(t),
        }
    }

    /// Storage key component for the window containing `t`:
    /// `YYYYMMDDThhmmZ` for minute windows, `YYYYMMDDThhZ` for hour windows.
    pub fn window_start_key(&self, t: DateTime<Utc>) -> String {
        let start = self.truncate(t);
        match self {
            WindowSize::Minute => start.format("%Y%m%dT%H%MZ").to_string(),
            WindowSize::Hour => start.format("%Y%m%dT%HZ").to_string(),
        }
    }

    /// Partition-routing key for the window containing `t`: `minute-NN`
    /// (00-59) or `hour-NN` (00-23). Depends only on the wall-clock
    /// minute-of-hour / hour-of-day, so every event targeting the same
    /// window lands in the same queue lane.
    pub fn bucket_id(&self, t: DateTime<Utc>) -> String {
        match self {
            WindowSize::Minute => format!("minute-{:02}", t.minute()),
            WindowSize::Hour => format!("hour-{:02}", t.hour()),
        }
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowSize::Minute => write!(f, "minute"),
            WindowSize::Hour => write!(f, "hour"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid window size {0:?}: expected \"minute\" or \"hour\"")]
pub struct ParseWindowSizeError(String);

impl FromStr for WindowSize {
    type Err = ParseWindowSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minute" => Ok(WindowSize::Minute),
            "hour" => Ok(WindowSize::Hour),
            other => Err(ParseWindowSizeError(other.to_string())),
        }
    }
}
