use std::fmt::Display;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Dedicated struct for header timestamps. Counts the number of milliseconds
/// elapsed since the Unix epoch (00:00 UTC on 1 Jan 1970).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn now() -> Timestamp {
        // a clock set before 1970 reads as the epoch
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        Timestamp(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    pub fn millis(num: u64) -> Timestamp {
        Timestamp(num)
    }

    pub fn seconds(num: u64) -> Timestamp {
        Timestamp(num.saturating_mul(1000))
    }

    /// The current time, or `previous` if the wall clock has gone backwards.
    ///
    /// Header fields are non-decreasing, so every update goes through here.
    pub fn now_after(previous: Option<Timestamp>) -> Timestamp {
        let now = Self::now();
        match previous {
            Some(previous) => now.max(previous),
            None => now,
        }
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn format(&self, format_descriptor: &str) -> String {
        match i64::try_from(self.0)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
        {
            Some(dt) => dt.format(format_descriptor).to_string(),
            None => "".to_string(),
        }
    }

    pub fn standard_format(&self) -> String {
        i64::try_from(self.0)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default()
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
