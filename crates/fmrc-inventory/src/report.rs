//! Serializable completeness reports.
//!
//! Rows are ordered newest first (latest run, latest forecast time), which
//! is how operators read them.

use std::fmt;

use fmrc_common::format_run_time;
use serde::Serialize;

use crate::collection::FmrcCollection;
use crate::matrix::{Completeness, TimeMatrixDataset};

/// One cell as presented to a reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellSummary {
    pub actual: usize,
    pub expected: usize,
    /// `floor(100 * actual / expected)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u32>,
    /// `"a/e"`, or `"a"` when nothing is missing or nothing was expected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<String>,
}

impl CellSummary {
    pub fn new(cell: Completeness) -> Self {
        let Completeness { actual, expected } = cell;
        let (count, percent) = if cell.is_empty() {
            (None, None)
        } else if actual == expected {
            (Some(actual.to_string()), Some(100))
        } else if expected == 0 {
            (Some(actual.to_string()), None)
        } else {
            (Some(format!("{}/{}", actual, expected)), cell.percent())
        };
        Self {
            actual,
            expected,
            percent,
            count,
        }
    }

    /// Raw counts only.
    pub fn counts_only(cell: Completeness) -> Self {
        Self {
            percent: None,
            ..Self::new(cell)
        }
    }

    fn build(cell: Completeness, with_percent: bool) -> Self {
        if with_percent {
            Self::new(cell)
        } else {
            Self::counts_only(cell)
        }
    }
}

/// One run: a cell per offset hour.
#[derive(Debug, Clone, Serialize)]
pub struct RunRow {
    pub run_time: String,
    pub cells: Vec<CellSummary>,
    pub total: CellSummary,
}

/// One forecast (valid) time: a cell per run, newest run first.
#[derive(Debug, Clone, Serialize)]
pub struct ForecastRow {
    pub forecast_time: String,
    pub cells: Vec<CellSummary>,
    pub total: CellSummary,
}

/// Matrix sections shared by the collection and variable reports.
#[derive(Debug, Clone, Serialize)]
pub struct MatrixReport {
    /// Column headers of `by_run`.
    pub offsets: Vec<f64>,
    /// Column headers of `by_forecast_time`, newest first.
    pub run_times: Vec<String>,
    pub by_run: Vec<RunRow>,
    pub by_forecast_time: Vec<ForecastRow>,
    pub total: CellSummary,
}

impl MatrixReport {
    fn new(matrix: &TimeMatrixDataset, with_percent: bool) -> Self {
        let axes = matrix.axes();
        let nruns = axes.run_times().len();
        let cell = |c: Completeness| CellSummary::build(c, with_percent);

        let by_run = (0..nruns)
            .rev()
            .map(|run| RunRow {
                run_time: format_run_time(axes.run_times()[run]),
                cells: matrix.by_offset().row(run).iter().copied().map(cell).collect(),
                total: cell(matrix.by_offset().row_total(run)),
            })
            .collect();

        let by_forecast_time = (0..axes.forecast_times().len())
            .rev()
            .map(|time| ForecastRow {
                forecast_time: format_run_time(axes.forecast_times()[time]),
                cells: matrix.by_forecast().row(time).iter().rev().copied().map(cell).collect(),
                total: cell(matrix.by_forecast().row_total(time)),
            })
            .collect();

        Self {
            offsets: axes.offsets().to_vec(),
            run_times: axes.run_times().iter().rev().map(|t| format_run_time(*t)).collect(),
            by_run,
            by_forecast_time,
            total: cell(matrix.total()),
        }
    }
}

/// Per-variable line of the collection report.
#[derive(Debug, Clone, Serialize)]
pub struct VariableRow {
    pub name: String,
    pub run_seq: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vert_coord: Option<String>,
    pub in_definition: bool,
    pub total: CellSummary,
}

/// Completeness of the whole collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub name: String,
    pub has_definition: bool,
    pub stats: crate::builder::IngestStats,
    pub variables: Vec<VariableRow>,
    #[serde(flatten)]
    pub matrix: MatrixReport,
}

impl CollectionReport {
    pub(crate) fn new(collection: &FmrcCollection) -> Self {
        let variables = collection
            .grids()
            .iter()
            .map(|g| VariableRow {
                name: g.name().to_string(),
                run_seq: g.run_seq().to_string(),
                vert_coord: g.vert_coord_union().map(|vc| vc.name().to_string()),
                in_definition: g.in_definition(),
                total: CellSummary::build(g.totals(), collection.counts_toward_completeness(g)),
            })
            .collect();

        Self {
            name: collection.name().to_string(),
            has_definition: collection.definition().is_some(),
            stats: collection.stats().clone(),
            variables,
            matrix: MatrixReport::new(collection.matrix(), true),
        }
    }
}

/// Completeness of one variable.
#[derive(Debug, Clone, Serialize)]
pub struct VariableReport {
    pub name: String,
    pub run_seq: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vert_coord: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub levels: Vec<f64>,
    pub in_definition: bool,
    pub definition_only: bool,
    #[serde(flatten)]
    pub matrix: MatrixReport,
}

impl VariableReport {
    pub(crate) fn new(collection: &FmrcCollection, variable: &str) -> Option<Self> {
        let grid = collection.grid(variable)?;
        let matrix = collection.variable_matrix(variable)?;
        let union = grid.vert_coord_union();
        Some(Self {
            name: grid.name().to_string(),
            run_seq: grid.run_seq().to_string(),
            vert_coord: union.map(|vc| vc.name().to_string()),
            levels: union.map(|vc| vc.values().to_vec()).unwrap_or_default(),
            in_definition: grid.in_definition(),
            definition_only: grid.is_definition_only(),
            matrix: MatrixReport::new(&matrix, collection.counts_toward_completeness(grid)),
        })
    }
}

/// One run's levels at the reported offset.
#[derive(Debug, Clone, Serialize)]
pub struct OffsetHourRow {
    pub run_time: String,
    /// Level values, `"scalar"`, or `"missing"` per slot; empty if the run
    /// does not have the offset.
    pub actual: Vec<String>,
    /// `None` when the definition has nothing to say about this run.
    pub expected: Option<Vec<f64>>,
}

/// Actual vs expected levels of one variable at one offset hour.
#[derive(Debug, Clone, Serialize)]
pub struct OffsetHourReport {
    pub variable: String,
    pub offset_hour: f64,
    pub rows: Vec<OffsetHourRow>,
}

impl OffsetHourReport {
    pub(crate) fn new(collection: &FmrcCollection, variable: &str, offset_hour: f64) -> Option<Self> {
        let grid = collection.grid(variable)?;
        let rows = grid
            .runs()
            .iter()
            .map(|re| OffsetHourRow {
                run_time: format_run_time(re.run_time()),
                actual: re
                    .actual()
                    .map(|a| a.levels_at(offset_hour).iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default(),
                expected: re.expected_levels_at(offset_hour),
            })
            .collect();
        Some(Self {
            variable: grid.name().to_string(),
            offset_hour,
            rows,
        })
    }
}

impl fmt::Display for OffsetHourReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Inventory for {} at offset {} hours", self.variable, self.offset_hour)?;
        for row in &self.rows {
            write!(f, "  {}  actual: ", row.run_time)?;
            if row.actual.is_empty() {
                f.write_str("-")?;
            } else {
                f.write_str(&row.actual.join(" "))?;
            }
            if let Some(expected) = &row.expected {
                let levels: Vec<String> = expected.iter().map(|v| v.to_string()).collect();
                write!(f, "  expected: {}", if levels.is_empty() { "-".to_string() } else { levels.join(" ") })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_not_applicable() {
        let cell = CellSummary::new(Completeness::new(0, 0));
        assert_eq!(cell.count, None);
        assert_eq!(cell.percent, None);
    }

    #[test]
    fn test_cell_complete() {
        let cell = CellSummary::new(Completeness::new(3, 3));
        assert_eq!(cell.count.as_deref(), Some("3"));
        assert_eq!(cell.percent, Some(100));
    }

    #[test]
    fn test_cell_partial() {
        let cell = CellSummary::new(Completeness::new(2, 3));
        assert_eq!(cell.count.as_deref(), Some("2/3"));
        assert_eq!(cell.percent, Some(66));
    }

    #[test]
    fn test_cell_unexpected_data() {
        let cell = CellSummary::new(Completeness::new(4, 0));
        assert_eq!(cell.count.as_deref(), Some("4"));
        assert_eq!(cell.percent, None);
    }

    #[test]
    fn test_cell_counts_only() {
        let cell = CellSummary::counts_only(Completeness::new(2, 3));
        assert_eq!(cell.count.as_deref(), Some("2/3"));
        assert_eq!(cell.percent, None);
    }
}
