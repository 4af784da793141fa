//! Per-run summaries handed to the collection builder.
//!
//! A summary is the lightweight description of one run file: its run time,
//! forecast offsets and the variables it holds. Summaries are serde types so
//! they can be persisted next to the data files and re-read without opening
//! the grids again.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use fmrc_common::checked_add_offset_hours;
use serde::{Deserialize, Serialize};

use crate::error::SummaryError;

/// One run file's contribution to a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Model run (reference) time.
    pub run_time: DateTime<Utc>,

    /// Forecast offsets in hours since `run_time`, strictly increasing.
    #[serde(default)]
    pub offsets: Vec<f64>,

    #[serde(default)]
    pub variables: Vec<GridSummary>,

    /// Where the summary came from, used in log messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// One variable inside a run summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSummary {
    pub name: String,

    /// Offsets for this variable when it does not use the run-level list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vert_coord: Option<VertSummary>,

    /// Holes in the otherwise dense time x level coverage.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<MissingSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    pub levels: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MissingSlot {
    pub time_index: usize,
    pub vert_index: usize,
}

impl MissingSlot {
    pub fn new(time_index: usize, vert_index: usize) -> Self {
        Self {
            time_index,
            vert_index,
        }
    }
}

impl RunSummary {
    pub fn new(run_time: DateTime<Utc>, offsets: impl Into<Vec<f64>>) -> Self {
        Self {
            run_time,
            offsets: offsets.into(),
            variables: Vec::new(),
            source: None,
        }
    }

    pub fn with_variable(mut self, grid: GridSummary) -> Self {
        self.variables.push(grid);
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Name used in log messages: the source if known, else the run time.
    pub fn source_name(&self) -> String {
        match &self.source {
            Some(s) => s.clone(),
            None => fmrc_common::format_run_time(self.run_time),
        }
    }

    /// Offsets that apply to `grid`.
    pub fn offsets_for<'a>(&'a self, grid: &'a GridSummary) -> &'a [f64] {
        grid.offsets.as_deref().unwrap_or(&self.offsets)
    }

    /// Check the summary is usable before any of it is ingested.
    pub fn validate(&self) -> Result<(), SummaryError> {
        if self.offsets.is_empty() && self.variables.is_empty() {
            return Err(SummaryError::NoOffsets);
        }
        check_offsets(self.run_time, &self.offsets)?;

        let mut seen = HashSet::new();
        for grid in &self.variables {
            if grid.name.trim().is_empty() {
                return Err(SummaryError::EmptyVariableName);
            }
            if !seen.insert(grid.name.as_str()) {
                return Err(SummaryError::DuplicateVariable(grid.name.clone()));
            }

            let offsets = self.offsets_for(grid);
            if offsets.is_empty() {
                return Err(SummaryError::NoVariableOffsets(grid.name.clone()));
            }
            if grid.offsets.is_some() {
                check_offsets(self.run_time, offsets)?;
            }

            let nverts = match &grid.vert_coord {
                Some(vc) => {
                    if let Some(index) = vc.levels.iter().position(|v| !v.is_finite()) {
                        return Err(SummaryError::NonFiniteLevel {
                            variable: grid.name.clone(),
                            index,
                        });
                    }
                    vc.levels.len().max(1)
                }
                None => 1,
            };

            let ntimes = offsets.len();
            for slot in &grid.missing {
                if slot.time_index >= ntimes || slot.vert_index >= nverts {
                    return Err(SummaryError::MissingSlotOutOfRange {
                        variable: grid.name.clone(),
                        time_index: slot.time_index,
                        vert_index: slot.vert_index,
                        ntimes,
                        nverts,
                    });
                }
            }
        }
        Ok(())
    }
}

fn check_offsets(run_time: DateTime<Utc>, offsets: &[f64]) -> Result<(), SummaryError> {
    for (index, &value) in offsets.iter().enumerate() {
        if !value.is_finite() {
            return Err(SummaryError::NonFiniteOffset { index, value });
        }
        if checked_add_offset_hours(run_time, value).is_none() {
            return Err(SummaryError::OffsetOutOfRange { index, value });
        }
        if index > 0 && value <= offsets[index - 1] {
            return Err(SummaryError::UnorderedOffsets { index });
        }
    }
    Ok(())
}

impl GridSummary {
    /// A variable without a vertical coordinate.
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            offsets: None,
            vert_coord: None,
            missing: Vec::new(),
        }
    }

    pub fn with_levels(
        name: impl Into<String>,
        vert_name: impl Into<String>,
        units: Option<&str>,
        levels: impl Into<Vec<f64>>,
    ) -> Self {
        Self {
            vert_coord: Some(VertSummary {
                name: vert_name.into(),
                units: units.map(str::to_string),
                levels: levels.into(),
            }),
            ..Self::scalar(name)
        }
    }

    pub fn with_offsets(mut self, offsets: impl Into<Vec<f64>>) -> Self {
        self.offsets = Some(offsets.into());
        self
    }

    pub fn with_missing(mut self, time_index: usize, vert_index: usize) -> Self {
        self.missing.push(MissingSlot::new(time_index, vert_index));
        self
    }

    /// Levels of the vertical coordinate; empty for a scalar variable.
    pub fn levels(&self) -> &[f64] {
        self.vert_coord.as_ref().map(|v| v.levels.as_slice()).unwrap_or(&[])
    }
}
