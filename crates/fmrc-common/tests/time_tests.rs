//! Tests for run-time arithmetic used by the inventory engine.

use chrono::{TimeZone, Utc};
use fmrc_common::{
    checked_add_offset_hours, close_enough, format_run_time, hour_of_day, offset_hours_between,
    FmrcError, ValidTime,
};

// ============================================================================
// Offset arithmetic
// ============================================================================

#[test]
fn test_add_offset_crosses_day_boundary() {
    let run = Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap();
    let ft = checked_add_offset_hours(run, 12.0).unwrap();
    assert_eq!(ft, Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap());
}

#[test]
fn test_add_negative_offset() {
    let run = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let ft = checked_add_offset_hours(run, -3.0).unwrap();
    assert_eq!(ft, Utc.with_ymd_and_hms(2023, 12, 31, 21, 0, 0).unwrap());
}

#[test]
fn test_offset_round_trip_for_schedule() {
    let run = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
    for hour in [0.0, 3.0, 6.0, 84.0, 240.0] {
        let ft = checked_add_offset_hours(run, hour).unwrap();
        assert!(close_enough(hour, offset_hours_between(run, ft)));
    }
}

#[test]
fn test_near_equal_offsets_map_to_same_instant() {
    let run = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(
        checked_add_offset_hours(run, 6.0),
        checked_add_offset_hours(run, 6.0 + 1.0e-10)
    );
}

#[test]
fn test_offset_beyond_date_range_is_none() {
    let run = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert!(checked_add_offset_hours(run, 1.0e10).is_none());
    assert!(checked_add_offset_hours(run, 1.0e6).is_some());
}

// ============================================================================
// Hour of day
// ============================================================================

#[test]
fn test_hour_of_day() {
    assert_eq!(hour_of_day(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()), 0.0);
    assert_eq!(hour_of_day(Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap()), 18.0);
    assert_eq!(hour_of_day(Utc.with_ymd_and_hms(2024, 1, 1, 6, 30, 0).unwrap()), 6.5);
}

// ============================================================================
// Formatting and parsing
// ============================================================================

#[test]
fn test_format_run_time() {
    let run = Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap();
    assert_eq!(format_run_time(run), "2024-01-02T06:00Z");
}

#[test]
fn test_format_parse_round_trip() {
    let run = Utc.with_ymd_and_hms(2024, 7, 4, 18, 0, 0).unwrap();
    let parsed = ValidTime::from_iso8601(&format_run_time(run)).unwrap();
    assert_eq!(parsed, run);
}

#[test]
fn test_parse_date_only() {
    let dt = ValidTime::from_iso8601("2024-01-15").unwrap();
    assert_eq!(dt, Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap());
}

#[test]
fn test_parse_invalid_time_converts_to_fmrc_error() {
    let err: FmrcError = ValidTime::from_iso8601("yesterday").unwrap_err().into();
    assert!(matches!(err, FmrcError::InvalidTime(_)));
    assert!(err.is_recoverable());
}
