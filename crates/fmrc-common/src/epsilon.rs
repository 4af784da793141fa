//! Floating point comparison policy for coordinate values.
//!
//! Offsets and levels are compared with a fixed tolerance: absolute when the
//! reference value is close to zero, relative otherwise. The tolerance is a
//! collection-wide constant and is not configurable per instance.

/// Tolerance used for both the absolute and the relative comparison.
pub const EPSILON: f64 = 1.0e-8;

/// Returns true if `v2` is within [`EPSILON`] of `v1`.
///
/// Uses an absolute difference when `|v1| < EPSILON`, a relative one otherwise.
pub fn close_enough(v1: f64, v2: f64) -> bool {
    if v1.abs() < EPSILON {
        return (v1 - v2).abs() < EPSILON;
    }
    ((v1 - v2) / v1).abs() < EPSILON
}

/// Element-wise [`close_enough`] over two slices of equal length.
pub fn slices_close_enough(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| close_enough(*x, *y))
}
