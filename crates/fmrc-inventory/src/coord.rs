//! Time and vertical coordinates.
//!
//! Coordinates are immutable once created. Collection-side coordinates are
//! interned (see [`crate::CoordInterner`]) so two coordinates with equal data
//! always share one id; comparing ids is then equivalent to comparing values.

use std::collections::BTreeMap;
use std::fmt;

use fmrc_common::{close_enough, slices_close_enough};
use serde::{Deserialize, Serialize};

/// Identifier of an interned [`TimeCoord`], assigned in order of first appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeCoordId(pub u32);

/// Identifier of an interned [`VertCoord`], assigned in order of first appearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertCoordId(pub u32);

impl fmt::Display for TimeCoordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for VertCoordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the index of `value` in `values` under the epsilon policy.
pub(crate) fn find_close(values: &[f64], value: f64) -> Option<usize> {
    values.iter().position(|v| close_enough(*v, value))
}

/// An ordered list of forecast offsets, in hours since the run time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeCoord {
    id: TimeCoordId,
    offsets: Vec<f64>,
}

impl TimeCoord {
    pub(crate) fn new(id: TimeCoordId, offsets: Vec<f64>) -> Self {
        Self { id, offsets }
    }

    pub fn id(&self) -> TimeCoordId {
        self.id
    }

    /// Name used when the coordinate is exposed as a dimension.
    pub fn name(&self) -> String {
        if self.id.0 == 0 {
            "time".to_string()
        } else {
            format!("time{}", self.id.0)
        }
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Index of an offset hour, if this coordinate contains it.
    pub fn find_index(&self, offset_hour: f64) -> Option<usize> {
        find_close(&self.offsets, offset_hour)
    }

    pub fn contains(&self, offset_hour: f64) -> bool {
        self.find_index(offset_hour).is_some()
    }

    /// Data equality: same length and element-wise within epsilon.
    pub fn equals_data(&self, offsets: &[f64]) -> bool {
        slices_close_enough(&self.offsets, offsets)
    }
}

/// A named, unit-tagged ordered list of vertical levels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VertCoord {
    id: VertCoordId,
    name: String,
    units: Option<String>,
    values: Vec<f64>,
}

impl VertCoord {
    pub(crate) fn new(
        id: VertCoordId,
        name: impl Into<String>,
        units: Option<String>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            units,
            values,
        }
    }

    pub fn id(&self) -> VertCoordId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn find_index(&self, level: f64) -> Option<usize> {
        find_close(&self.values, level)
    }

    /// Data equality: same length and element-wise within epsilon.
    /// Name and units do not take part.
    pub fn equals_data(&self, values: &[f64]) -> bool {
        slices_close_enough(&self.values, values)
    }
}

/// Expected vertical levels of a variable, possibly varying by forecast offset.
#[derive(Debug, Clone, PartialEq)]
pub enum LevelSchedule {
    /// The same levels at every offset.
    Fixed(Vec<f64>),
    /// Base levels plus per-time-index overrides.
    TimeVarying {
        levels: Vec<f64>,
        /// Time coordinate the override indices refer to.
        offsets: Vec<f64>,
        overrides: BTreeMap<usize, Vec<f64>>,
    },
}

impl LevelSchedule {
    /// The unrestricted levels.
    pub fn base_levels(&self) -> &[f64] {
        match self {
            LevelSchedule::Fixed(levels) => levels,
            LevelSchedule::TimeVarying { levels, .. } => levels,
        }
    }

    /// Levels expected at `offset_hour`.
    ///
    /// For a time-varying schedule an offset outside its time coordinate
    /// expects nothing.
    pub fn values_at(&self, offset_hour: f64) -> &[f64] {
        match self {
            LevelSchedule::Fixed(levels) => levels,
            LevelSchedule::TimeVarying {
                levels,
                offsets,
                overrides,
            } => match find_close(offsets, offset_hour) {
                None => &[],
                Some(index) => overrides.get(&index).map(Vec::as_slice).unwrap_or(levels),
            },
        }
    }

    pub fn count_at(&self, offset_hour: f64) -> usize {
        self.values_at(offset_hour).len()
    }

    pub fn is_time_varying(&self) -> bool {
        matches!(self, LevelSchedule::TimeVarying { .. })
    }
}
