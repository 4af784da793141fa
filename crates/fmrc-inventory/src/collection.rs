//! The finished, read-only collection.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::builder::IngestStats;
use crate::config::InventoryConfig;
use crate::coord::{find_close, TimeCoord, TimeCoordId, VertCoord};
use crate::definition::FmrcDefinition;
use crate::grid::{RunExpected, UberGrid};
use crate::matrix::{Completeness, TimeMatrixDataset};
use crate::report::{CollectionReport, OffsetHourReport, VariableReport};
use crate::run::{Run, RunId, RunSeq, RunSeqId};

/// Sorted unique run times, forecast times and offset hours across every
/// variable. These are the axes of the summary matrices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Axes {
    run_times: Vec<DateTime<Utc>>,
    forecast_times: Vec<DateTime<Utc>>,
    offsets: Vec<f64>,
}

impl Axes {
    pub(crate) fn new(
        run_times: Vec<DateTime<Utc>>,
        forecast_times: Vec<DateTime<Utc>>,
        offsets: Vec<f64>,
    ) -> Self {
        Self {
            run_times,
            forecast_times,
            offsets,
        }
    }

    pub fn run_times(&self) -> &[DateTime<Utc>] {
        &self.run_times
    }

    pub fn forecast_times(&self) -> &[DateTime<Utc>] {
        &self.forecast_times
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub fn run_index(&self, run_time: DateTime<Utc>) -> Option<usize> {
        self.run_times.binary_search(&run_time).ok()
    }

    pub fn forecast_index(&self, forecast_time: DateTime<Utc>) -> Option<usize> {
        self.forecast_times.binary_search(&forecast_time).ok()
    }

    pub fn offset_index(&self, offset_hour: f64) -> Option<usize> {
        find_close(&self.offsets, offset_hour)
    }
}

/// An immutable forecast model run collection.
///
/// Produced by [`crate::CollectionBuilder::finish`]. All queries take `&self`
/// and the collection is `Send + Sync`, so it can be shared across threads.
#[derive(Debug)]
pub struct FmrcCollection {
    name: String,
    definition: Option<Arc<FmrcDefinition>>,
    config: InventoryConfig,
    time_coords: Vec<Arc<TimeCoord>>,
    vert_coords: Vec<Arc<VertCoord>>,
    runs: Vec<Run>,
    run_seqs: Vec<RunSeq>,
    /// Sorted by name.
    grids: Vec<UberGrid>,
    axes: Axes,
    stats: IngestStats,
    matrix: OnceLock<TimeMatrixDataset>,
}

impl FmrcCollection {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        definition: Option<Arc<FmrcDefinition>>,
        config: InventoryConfig,
        time_coords: Vec<Arc<TimeCoord>>,
        vert_coords: Vec<Arc<VertCoord>>,
        runs: Vec<Run>,
        run_seqs: Vec<RunSeq>,
        grids: Vec<UberGrid>,
        axes: Axes,
        stats: IngestStats,
    ) -> Self {
        Self {
            name,
            definition,
            config,
            time_coords,
            vert_coords,
            runs,
            run_seqs,
            grids,
            axes,
            stats,
            matrix: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> Option<&Arc<FmrcDefinition>> {
        self.definition.as_ref()
    }

    pub fn config(&self) -> &InventoryConfig {
        &self.config
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub fn axes(&self) -> &Axes {
        &self.axes
    }

    /// Distinct time coordinates, indexed by id.
    pub fn time_coords(&self) -> &[Arc<TimeCoord>] {
        &self.time_coords
    }

    /// Distinct vertical coordinates (including unions), indexed by id.
    pub fn vert_coords(&self) -> &[Arc<VertCoord>] {
        &self.vert_coords
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn run(&self, id: RunId) -> Option<&Run> {
        self.runs.get(id.0 as usize)
    }

    pub fn run_seqs(&self) -> &[RunSeq] {
        &self.run_seqs
    }

    pub fn run_seq(&self, id: RunSeqId) -> Option<&RunSeq> {
        self.run_seqs.get(id.0 as usize)
    }

    pub fn grids(&self) -> &[UberGrid] {
        &self.grids
    }

    pub fn grid(&self, name: &str) -> Option<&UberGrid> {
        self.grids
            .binary_search_by(|g| g.name().cmp(name))
            .ok()
            .map(|i| &self.grids[i])
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.grids.iter().map(UberGrid::name)
    }

    /// Whether `grid` counts toward completeness figures. With a definition
    /// loaded, tracked variables it does not list only report raw counts.
    pub fn counts_toward_completeness(&self, grid: &UberGrid) -> bool {
        self.definition.is_none() || grid.in_definition()
    }

    /// What `variable` has (and was expected to have) for the run at `run_time`.
    pub fn inventory(&self, variable: &str, run_time: DateTime<Utc>) -> Option<&RunExpected> {
        self.grid(variable)?.find_run(run_time)
    }

    /// Variables with at least one run on time coordinate `id`.
    pub fn variables_using_time_coord(&self, id: TimeCoordId) -> Vec<&str> {
        self.grids
            .iter()
            .filter(|g| {
                g.runs()
                    .iter()
                    .filter_map(RunExpected::actual)
                    .any(|a| a.time_coord().id() == id)
            })
            .map(UberGrid::name)
            .collect()
    }

    /// Counts over every variable that contributes to completeness, built on
    /// first use.
    pub fn matrix(&self) -> &TimeMatrixDataset {
        self.matrix.get_or_init(|| {
            TimeMatrixDataset::build(
                &self.axes,
                self.grids.iter().filter(|g| self.counts_toward_completeness(g)),
            )
        })
    }

    /// Counts for one variable.
    pub fn variable_matrix(&self, variable: &str) -> Option<TimeMatrixDataset> {
        let grid = self.grid(variable)?;
        Some(TimeMatrixDataset::build(&self.axes, std::iter::once(grid)))
    }

    pub fn completeness_by_run(&self, run_time: DateTime<Utc>) -> Option<Completeness> {
        let run = self.axes.run_index(run_time)?;
        Some(self.matrix().by_offset().row_total(run))
    }

    pub fn completeness_by_forecast_time(
        &self,
        forecast_time: DateTime<Utc>,
    ) -> Option<Completeness> {
        let time = self.axes.forecast_index(forecast_time)?;
        Some(self.matrix().by_forecast().row_total(time))
    }

    pub fn completeness_by_offset(&self, offset_hour: f64) -> Option<Completeness> {
        let offset = self.axes.offset_index(offset_hour)?;
        Some(self.matrix().by_offset().col_total(offset))
    }

    pub fn completeness_by_variable(&self, variable: &str) -> Option<Completeness> {
        self.grid(variable).map(UberGrid::totals)
    }

    /// Summary over all variables.
    pub fn report(&self) -> CollectionReport {
        CollectionReport::new(self)
    }

    pub fn variable_report(&self, variable: &str) -> Option<VariableReport> {
        VariableReport::new(self, variable)
    }

    /// Actual and expected levels of `variable` at `offset_hour`, per run.
    pub fn offset_hour_report(&self, variable: &str, offset_hour: f64) -> Option<OffsetHourReport> {
        OffsetHourReport::new(self, variable, offset_hour)
    }

    /// A definition that expects exactly what this collection holds.
    pub fn derive_definition(&self) -> FmrcDefinition {
        FmrcDefinition::from_collection(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_axes_lookup() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let axes = Axes::new(vec![t0, t1], vec![t0], vec![0.0, 6.0]);
        assert_eq!(axes.run_index(t1), Some(1));
        assert_eq!(axes.forecast_index(t1), None);
        assert_eq!(axes.offset_index(6.0 + 1.0e-12), Some(1));
    }

    #[test]
    fn test_collection_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FmrcCollection>();
    }
}
