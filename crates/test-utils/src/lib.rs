//! Shared test utilities for the fmrc workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Run time and schedule fixtures
//! - Synthetic run summary generators
//! - Helpers that persist summaries into temporary directories
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in integration tests:
//!
//! ```ignore
//! use test_utils::{daily_runs, fixtures};
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Asserts two offsets or levels agree within a tolerance.
///
/// Without a tolerance, uses the absolute 1e-8 the collection compares
/// coordinates with.
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(collection.axes().offsets()[1], 6.0);
/// assert_approx_eq!(union.values()[0], 500.0, 1.0e-6);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr) => {
        $crate::assert_approx_eq!($left, $right, 1.0e-8)
    };
    ($left:expr, $right:expr, $tolerance:expr) => {{
        let left: f64 = $left;
        let right: f64 = $right;
        let tolerance: f64 = $tolerance;
        let diff = (left - right).abs();
        assert!(
            diff <= tolerance,
            "values differ by {:e} (tolerance {:e}): {} vs {}",
            diff,
            tolerance,
            left,
            right
        );
    }};
}

/// Asserts actual and expected counts of a completeness value.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_completeness;
///
/// assert_completeness!(collection.completeness_by_variable("T").unwrap(), 5, 6);
/// ```
#[macro_export]
macro_rules! assert_completeness {
    ($cell:expr, $actual:expr, $expected:expr) => {{
        let cell = $cell;
        assert_eq!(
            (cell.actual, cell.expected),
            ($actual, $expected),
            "completeness (actual, expected) mismatch"
        );
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_assert_approx_eq_default_tolerance() {
        assert_approx_eq!(6.0 + 1.0e-10, 6.0);
        assert_approx_eq!(850.0, 850.0005, 1.0e-3);
    }

    #[test]
    #[should_panic(expected = "values differ")]
    fn test_assert_approx_eq_fails_outside_tolerance() {
        assert_approx_eq!(6.0, 6.001);
    }
}
