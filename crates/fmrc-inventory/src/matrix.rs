//! Dense actual-vs-expected summaries over the collection axes.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use chrono::{DateTime, Utc};
use fmrc_common::checked_add_offset_hours;
use serde::Serialize;

use crate::collection::Axes;
use crate::grid::UberGrid;

/// Actual and expected slot counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Completeness {
    pub actual: usize,
    pub expected: usize,
}

impl Completeness {
    pub fn new(actual: usize, expected: usize) -> Self {
        Self { actual, expected }
    }

    /// Nothing present and nothing expected.
    pub fn is_empty(&self) -> bool {
        self.actual == 0 && self.expected == 0
    }

    /// `floor(100 * actual / expected)`, or `None` when nothing is expected.
    pub fn percent(&self) -> Option<u32> {
        if self.expected == 0 {
            None
        } else {
            Some((100 * self.actual / self.expected) as u32)
        }
    }
}

impl Add for Completeness {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.actual + rhs.actual, self.expected + rhs.expected)
    }
}

impl AddAssign for Completeness {
    fn add_assign(&mut self, rhs: Self) {
        self.actual += rhs.actual;
        self.expected += rhs.expected;
    }
}

impl Sum for Completeness {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Row-major matrix of [`Completeness`] cells.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountMatrix {
    nrows: usize,
    ncols: usize,
    cells: Vec<Completeness>,
}

impl CountMatrix {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            cells: vec![Completeness::default(); nrows * ncols],
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn get(&self, row: usize, col: usize) -> Completeness {
        if row < self.nrows && col < self.ncols {
            self.cells[row * self.ncols + col]
        } else {
            Completeness::default()
        }
    }

    fn add(&mut self, row: usize, col: usize, value: Completeness) {
        self.cells[row * self.ncols + col] += value;
    }

    pub fn row(&self, row: usize) -> &[Completeness] {
        &self.cells[row * self.ncols..(row + 1) * self.ncols]
    }

    pub fn row_total(&self, row: usize) -> Completeness {
        self.row(row).iter().copied().sum()
    }

    pub fn col_total(&self, col: usize) -> Completeness {
        (0..self.nrows).map(|row| self.get(row, col)).sum()
    }

    pub fn total(&self) -> Completeness {
        self.cells.iter().copied().sum()
    }
}

/// Inventory counts re-indexed along the three collection axes.
///
/// Every (run, offset) contribution lands once in `by_offset` and once in
/// `by_forecast` (at `run_time + offset`), so both matrices have the same
/// total.
#[derive(Debug, Clone, Serialize)]
pub struct TimeMatrixDataset {
    axes: Axes,
    /// forecast time x run time
    by_forecast: CountMatrix,
    /// run time x offset hour
    by_offset: CountMatrix,
}

impl TimeMatrixDataset {
    pub fn build<'a>(axes: &Axes, grids: impl IntoIterator<Item = &'a UberGrid>) -> Self {
        let nruns = axes.run_times().len();
        let mut by_forecast = CountMatrix::new(axes.forecast_times().len(), nruns);
        let mut by_offset = CountMatrix::new(nruns, axes.offsets().len());

        for grid in grids {
            for re in grid.runs() {
                let Some(run_index) = axes.run_index(re.run_time()) else {
                    continue;
                };
                for offset in re.offsets() {
                    let cell = Completeness::new(re.count_inventory(offset), re.count_expected(offset));
                    if cell.is_empty() {
                        continue;
                    }
                    let forecast_time = checked_add_offset_hours(re.run_time(), offset);
                    let (Some(offset_index), Some(time_index)) = (
                        axes.offset_index(offset),
                        forecast_time.and_then(|t| axes.forecast_index(t)),
                    ) else {
                        continue;
                    };
                    by_offset.add(run_index, offset_index, cell);
                    by_forecast.add(time_index, run_index, cell);
                }
            }
        }

        Self {
            axes: axes.clone(),
            by_forecast,
            by_offset,
        }
    }

    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    pub fn by_forecast(&self) -> &CountMatrix {
        &self.by_forecast
    }

    pub fn by_offset(&self) -> &CountMatrix {
        &self.by_offset
    }

    /// Cell for a run at an offset hour.
    pub fn offset_cell(&self, run_time: DateTime<Utc>, offset_hour: f64) -> Option<Completeness> {
        let run = self.axes.run_index(run_time)?;
        let offset = self.axes.offset_index(offset_hour)?;
        Some(self.by_offset.get(run, offset))
    }

    /// Cell for a run at a forecast (valid) time.
    pub fn forecast_cell(
        &self,
        forecast_time: DateTime<Utc>,
        run_time: DateTime<Utc>,
    ) -> Option<Completeness> {
        let time = self.axes.forecast_index(forecast_time)?;
        let run = self.axes.run_index(run_time)?;
        Some(self.by_forecast.get(time, run))
    }

    /// Totals per run, summed over offsets.
    pub fn run_totals(&self) -> Vec<Completeness> {
        (0..self.by_offset.nrows())
            .map(|run| self.by_offset.row_total(run))
            .collect()
    }

    pub fn total(&self) -> Completeness {
        self.by_offset.total()
    }
}
