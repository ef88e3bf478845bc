//! Timestamp and result-file format normalization.
//!
//! JMeter writes epoch milliseconds by default, but logs post-processed by
//! other tools sometimes carry epoch seconds or formatted dates. The unit is
//! decided once per file from the full set of timestamps, never per record.

use chrono::{Local, NaiveDateTime, TimeZone};
use serde::Serialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::error::{Error, Result};

/// Number of leading bytes inspected when sniffing a file's format
const SNIFF_LEN: usize = 1000;

/// Largest raw value still accepted as epoch seconds (year 5138)
const MAX_EPOCH_SECONDS: i64 = 100_000_000_000;

/// Largest raw integer accepted at all; anything above is not a timestamp
/// in either unit
const MAX_RAW_TIMESTAMP: i64 = MAX_EPOCH_SECONDS * 1000;

const TEXT_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S%.3f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.3f",
    "%Y-%m-%d %H:%M:%S",
];

/// On-disk layout of a result log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Csv,
    Xml,
}

/// Unit of the raw timestamps in one result log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Milliseconds,
}

impl TimeUnit {
    /// Convert a raw timestamp in this unit to epoch milliseconds
    pub fn to_millis(self, raw: i64) -> i64 {
        match self {
            Self::Seconds => raw.saturating_mul(1000),
            Self::Milliseconds => raw,
        }
    }

    /// Express epoch milliseconds as a raw timestamp in this unit
    pub fn from_millis(self, millis: i64) -> i64 {
        match self {
            Self::Seconds => millis.div_euclid(1000),
            Self::Milliseconds => millis,
        }
    }
}

/// Guess a result log's format from its first bytes
pub fn detect_format(head: &str) -> LogFormat {
    let head = head.trim_start_matches('\u{feff}').trim_start();
    if head.starts_with("<?xml") || head.contains("<testResults") {
        LogFormat::Xml
    } else {
        LogFormat::Csv
    }
}

/// Read the start of `path` and guess its format
pub fn sniff_format(path: &Path) -> Result<LogFormat> {
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.by_ref()
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut head)
        .map_err(|e| Error::io(path, e))?;
    Ok(detect_format(&String::from_utf8_lossy(&head)))
}

/// Parse one timestamp token into a raw integer.
///
/// Bare positive integers up to the epoch-millisecond range are returned
/// unchanged (their unit is resolved later by [`detect_unit`]). `YYYY/MM/DD HH:MM:SS` and `YYYY-MM-DD HH:MM:SS`, with
/// optional milliseconds, are read as local time and returned as epoch
/// milliseconds. Anything else yields `None`.
pub fn parse_timestamp(token: &str) -> Option<i64> {
    let token = token.trim().trim_matches('"');
    if token.is_empty() {
        return None;
    }

    if let Ok(raw) = token.parse::<i64>() {
        return (1..=MAX_RAW_TIMESTAMP).contains(&raw).then_some(raw);
    }

    TEXT_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(token, format).ok()?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.timestamp_millis())
    })
}

/// Decide the unit of a file's timestamps from their minimum and maximum.
///
/// Milliseconds is the tool's native unit and wins whenever the span looks
/// like a plausible test (one second to one hour). Seconds is chosen only
/// when the span is plausible in seconds and the values are small enough
/// to be epoch seconds. Every other case falls back to milliseconds with a
/// warning, since the resulting durations may be wrong.
pub fn detect_unit(min: i64, max: i64) -> TimeUnit {
    let range = max.saturating_sub(min);

    if min < 100 {
        warn!(min, max, "Timestamps implausibly small, assuming milliseconds");
        return TimeUnit::Milliseconds;
    }

    if (1_000..=3_600_000).contains(&range) {
        return TimeUnit::Milliseconds;
    }

    if (1..=3_600).contains(&range) && max < MAX_EPOCH_SECONDS {
        return TimeUnit::Seconds;
    }

    warn!(
        min,
        max,
        range,
        "Timestamp span outside the plausible range, assuming milliseconds"
    );
    TimeUnit::Milliseconds
}
