//! Common types and utilities shared across the FMRC inventory crates.

pub mod epsilon;
pub mod error;
pub mod time;

pub use epsilon::{close_enough, slices_close_enough, EPSILON};
pub use error::{FmrcError, FmrcResult};
pub use time::{
    checked_add_offset_hours, format_run_time, hour_of_day, offset_duration, offset_hours_between,
    TimeParseError, ValidTime,
};
