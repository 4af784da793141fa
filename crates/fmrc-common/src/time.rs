//! Time handling utilities for forecast model runs.

use chrono::{DateTime, NaiveDateTime, TimeDelta, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// A forecast valid time expressed relative to its model run.
///
/// Combines reference time (model run time) and a fractional forecast offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidTime {
    /// Model run/reference time
    pub reference_time: DateTime<Utc>,
    /// Hours from reference time to valid time
    pub offset_hours: f64,
}

impl ValidTime {
    pub fn new(reference_time: DateTime<Utc>, offset_hours: f64) -> Self {
        Self {
            reference_time,
            offset_hours,
        }
    }

    /// Create from analysis time (offset 0)
    pub fn analysis(reference_time: DateTime<Utc>) -> Self {
        Self::new(reference_time, 0.0)
    }

    /// Calculate the actual valid time (reference + forecast offset), if it
    /// is representable.
    pub fn valid_datetime(&self) -> Option<DateTime<Utc>> {
        checked_add_offset_hours(self.reference_time, self.offset_hours)
    }

    /// Parse from ISO 8601 string.
    pub fn from_iso8601(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
        // Try full datetime with timezone
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.with_timezone(&Utc));
        }

        // Minutes only, trailing Z (the form used in reports)
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%MZ") {
            return Ok(Utc.from_utc_datetime(&ndt));
        }

        // Try without timezone (assume UTC)
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
            return Ok(Utc.from_utc_datetime(&ndt));
        }

        // Try date only
        if let Ok(ndt) =
            NaiveDateTime::parse_from_str(&format!("{}T00:00:00", s), "%Y-%m-%dT%H:%M:%S")
        {
            return Ok(Utc.from_utc_datetime(&ndt));
        }

        Err(TimeParseError::InvalidFormat(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),
}

/// A fractional number of hours as a duration, rounded to whole
/// milliseconds so that equal offsets always produce equal instants.
///
/// `None` if the offset is not finite or does not fit a duration.
pub fn offset_duration(hours: f64) -> Option<TimeDelta> {
    let millis = (hours * MILLIS_PER_HOUR).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(millis as i64)
}

/// Add a fractional number of hours to a run time.
///
/// `None` if the result falls outside the representable date range.
pub fn checked_add_offset_hours(run_time: DateTime<Utc>, hours: f64) -> Option<DateTime<Utc>> {
    run_time.checked_add_signed(offset_duration(hours)?)
}

/// Hours elapsed from `run_time` to `forecast_time` (negative if earlier).
pub fn offset_hours_between(run_time: DateTime<Utc>, forecast_time: DateTime<Utc>) -> f64 {
    let diff = forecast_time - run_time;
    diff.num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Fractional hour of the UTC day, e.g. 06:30Z -> 6.5.
pub fn hour_of_day(run_time: DateTime<Utc>) -> f64 {
    run_time.hour() as f64 + run_time.minute() as f64 / 60.0 + run_time.second() as f64 / 3600.0
}

/// Compact UTC rendering used in reports, e.g. `2024-01-15T12:00Z`.
pub fn format_run_time(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%MZ").to_string()
}
