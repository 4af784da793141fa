//! Generators for synthetic run summaries.
//!
//! These create predictable collections that can be checked by hand.

use chrono::{DateTime, Duration, Utc};
use fmrc_inventory::{GridSummary, RunSummary};

use crate::fixtures::run_time;

/// A run whose variables are all scalar and complete.
pub fn scalar_run(run_time: DateTime<Utc>, offsets: &[f64], variables: &[&str]) -> RunSummary {
    variables
        .iter()
        .fold(RunSummary::new(run_time, offsets.to_vec()), |s, name| {
            s.with_variable(GridSummary::scalar(*name))
        })
}

/// A run with one variable on `levels`.
pub fn level_run(
    run_time: DateTime<Utc>,
    offsets: &[f64],
    variable: &str,
    levels: &[f64],
) -> RunSummary {
    RunSummary::new(run_time, offsets.to_vec()).with_variable(GridSummary::with_levels(
        variable,
        "isobaric",
        Some("hPa"),
        levels.to_vec(),
    ))
}

/// Scalar runs at each of `hours` for `days` consecutive days starting
/// January `first_day` 2024, in chronological order.
pub fn daily_runs(
    first_day: u32,
    days: u32,
    hours: &[u32],
    offsets: &[f64],
    variables: &[&str],
) -> Vec<RunSummary> {
    let start = run_time(first_day, 0);
    (0..days)
        .flat_map(|d| {
            hours.iter().map(move |&h| {
                start + Duration::days(i64::from(d)) + Duration::hours(i64::from(h))
            })
        })
        .map(|t| scalar_run(t, offsets, variables))
        .collect()
}

/// Mark a slot missing for `variable` in `summary`.
pub fn with_missing(
    mut summary: RunSummary,
    variable: &str,
    time_index: usize,
    vert_index: usize,
) -> RunSummary {
    if let Some(grid) = summary.variables.iter_mut().find(|g| g.name == variable) {
        *grid = grid.clone().with_missing(time_index, vert_index);
    }
    summary
}
