//! Collection construction.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fmrc_common::{checked_add_offset_hours, format_run_time};
use serde::Serialize;
use tracing::{debug, info, info_span, warn, Span};

use crate::collection::{Axes, FmrcCollection};
use crate::config::{InventoryConfig, UnknownVariablePolicy};
use crate::coord::{find_close, TimeCoord, TimeCoordId, VertCoord};
use crate::definition::FmrcDefinition;
use crate::error::SummaryError;
use crate::grid::{ActualGrid, RunExpected, UberGrid};
use crate::interner::CoordInterner;
use crate::run::{Run, RunId, RunSeqGrouper};
use crate::summary::RunSummary;

/// Counters kept while ingesting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Summaries accepted.
    pub runs_added: usize,
    /// Summaries rejected as malformed.
    pub runs_skipped: usize,
    /// Variable contributions dropped because the definition lacks them.
    pub variables_skipped: usize,
    /// Second contributions of a variable for a run time already seen.
    pub duplicate_contributions: usize,
    /// Definition variables no run produced.
    pub definition_only_variables: usize,
}

/// Result of ingesting one summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutcome {
    /// Runs the summary contributed to, one per distinct offset pattern.
    pub runs: Vec<RunId>,
    pub variables_added: usize,
    pub variables_skipped: usize,
    pub duplicate_contributions: usize,
}

#[derive(Debug)]
struct GridBuilder {
    runs: Vec<RunExpected>,
    seen: HashSet<DateTime<Utc>>,
    in_definition: bool,
}

impl GridBuilder {
    fn new(in_definition: bool) -> Self {
        Self {
            runs: Vec::new(),
            seen: HashSet::new(),
            in_definition,
        }
    }
}

/// Ingests run summaries one at a time, then [`finish`](Self::finish)es into
/// an immutable [`FmrcCollection`].
///
/// Ingestion order only affects coordinate id assignment.
#[derive(Debug)]
pub struct CollectionBuilder {
    name: String,
    definition: Option<Arc<FmrcDefinition>>,
    config: InventoryConfig,
    span: Span,

    interner: CoordInterner,
    runs: Vec<Run>,
    run_index: HashMap<(DateTime<Utc>, TimeCoordId), RunId>,
    grids: BTreeMap<String, GridBuilder>,

    run_times: BTreeSet<DateTime<Utc>>,
    forecast_times: BTreeSet<DateTime<Utc>>,
    offsets: Vec<f64>,

    warned_unknown: HashSet<String>,
    stats: IngestStats,
}

impl CollectionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let span = info_span!("fmrc_collection", collection = %name);
        Self {
            name,
            definition: None,
            config: InventoryConfig::default(),
            span,
            interner: CoordInterner::new(),
            runs: Vec::new(),
            run_index: HashMap::new(),
            grids: BTreeMap::new(),
            run_times: BTreeSet::new(),
            forecast_times: BTreeSet::new(),
            offsets: Vec::new(),
            warned_unknown: HashSet::new(),
            stats: IngestStats::default(),
        }
    }

    /// Compare every run against `definition`.
    pub fn with_definition(mut self, definition: Arc<FmrcDefinition>) -> Self {
        self.definition = Some(definition);
        self
    }

    pub fn with_config(mut self, config: InventoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Span all ingestion and finish events are recorded under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Ingest one run summary.
    ///
    /// A malformed summary is rejected as a whole before anything is
    /// recorded; the builder stays usable.
    pub fn add_run(&mut self, summary: &RunSummary) -> Result<RunOutcome, SummaryError> {
        let span = self.span.clone();
        let _guard = span.enter();

        if let Err(e) = summary.validate() {
            warn!(source = %summary.source_name(), error = %e, "Skipping malformed run summary");
            self.stats.runs_skipped += 1;
            return Err(e);
        }

        let run_time = summary.run_time;
        let mut outcome = RunOutcome::default();

        if summary.variables.is_empty() {
            if let Some(tc) = self.interner.intern_time(&summary.offsets) {
                let run = self.run_for(run_time, tc);
                outcome.runs.push(run);
            }
        }

        for grid in &summary.variables {
            let in_definition = match &self.definition {
                Some(def) if !def.has_variable(&grid.name) => {
                    match self.config.unknown_variables {
                        UnknownVariablePolicy::Skip => {
                            if self.warned_unknown.insert(grid.name.clone()) {
                                warn!(variable = %grid.name, "Variable not in definition, skipping");
                            }
                            self.stats.variables_skipped += 1;
                            outcome.variables_skipped += 1;
                            continue;
                        }
                        UnknownVariablePolicy::Track => false,
                    }
                }
                _ => true,
            };

            let entry = self
                .grids
                .entry(grid.name.clone())
                .or_insert_with(|| GridBuilder::new(in_definition));
            if !entry.seen.insert(run_time) {
                warn!(
                    variable = %grid.name,
                    run_time = %format_run_time(run_time),
                    source = %summary.source_name(),
                    "Duplicate contribution for run, ignoring"
                );
                self.stats.duplicate_contributions += 1;
                outcome.duplicate_contributions += 1;
                continue;
            }

            let Some(tc) = self.interner.intern_time(summary.offsets_for(grid)) else {
                continue;
            };
            let vert_coord = grid.vert_coord.as_ref().and_then(|vc| {
                self.interner
                    .intern_vert(&vc.levels, &vc.name, vc.units.as_deref())
            });

            let run = self.run_for(run_time, Arc::clone(&tc));
            if !outcome.runs.contains(&run) {
                outcome.runs.push(run);
            }

            let (expected_time, expected_grid) = match &self.definition {
                Some(def) if in_definition => (
                    def.expected_time_coord(&grid.name, run_time).cloned(),
                    def.find_grid(&grid.name).cloned(),
                ),
                _ => (None, None),
            };

            let re = RunExpected::new(
                run_time,
                Some(run),
                Some(ActualGrid::new(tc, vert_coord, grid.missing.clone())),
                expected_time,
                expected_grid,
            );
            if in_definition && self.definition.is_some() && !re.has_expectation() {
                debug!(
                    variable = %grid.name,
                    run_time = %format_run_time(run_time),
                    "No usable expectation for run, measuring against actual"
                );
            }
            self.register_offsets(run_time, &re.offsets());

            if let Some(entry) = self.grids.get_mut(&grid.name) {
                entry.runs.push(re);
            }
            outcome.variables_added += 1;
        }

        self.stats.runs_added += 1;
        debug!(
            source = %summary.source_name(),
            runs = outcome.runs.len(),
            variables = outcome.variables_added,
            "Added run"
        );
        Ok(outcome)
    }

    /// Ingest many summaries, skipping malformed ones.
    pub fn add_runs<'a>(&mut self, summaries: impl IntoIterator<Item = &'a RunSummary>) -> usize {
        summaries
            .into_iter()
            .filter(|s| self.add_run(s).is_ok())
            .count()
    }

    fn run_for(&mut self, run_time: DateTime<Utc>, tc: Arc<TimeCoord>) -> RunId {
        if let Some(&id) = self.run_index.get(&(run_time, tc.id())) {
            return id;
        }
        let id = RunId(self.runs.len() as u32);
        let run = Run::new(id, run_time, tc);
        self.run_times.insert(run_time);
        for entry in run.inventory() {
            self.forecast_times.insert(entry.forecast_time);
            if find_close(&self.offsets, entry.offset_hours).is_none() {
                self.offsets.push(entry.offset_hours);
            }
        }
        self.run_index.insert((run_time, run.time_coord().id()), id);
        self.runs.push(run);
        id
    }

    fn register_offsets(&mut self, run_time: DateTime<Utc>, offsets: &[f64]) {
        for &h in offsets {
            let Some(forecast_time) = checked_add_offset_hours(run_time, h) else {
                warn!(
                    run_time = %format_run_time(run_time),
                    offset_hour = h,
                    "Expected offset is outside the supported date range, ignoring"
                );
                continue;
            };
            if find_close(&self.offsets, h).is_none() {
                self.offsets.push(h);
            }
            self.forecast_times.insert(forecast_time);
        }
    }

    /// Group runs, compute vertical unions and freeze the collection.
    pub fn finish(mut self) -> FmrcCollection {
        let span = self.span.clone();
        let _guard = span.enter();

        self.add_definition_only_variables();

        let mut offsets = std::mem::take(&mut self.offsets);
        offsets.sort_by(f64::total_cmp);
        let axes = Axes::new(
            self.run_times.iter().copied().collect(),
            self.forecast_times.iter().copied().collect(),
            offsets,
        );

        let mut grouper = RunSeqGrouper::new();
        let mut grids = Vec::with_capacity(self.grids.len());
        for (name, mut gb) in std::mem::take(&mut self.grids) {
            gb.runs.sort_by_key(RunExpected::run_time);
            let union = union_vert_coord(&mut self.interner, &gb.runs);
            let run_ids: Vec<RunId> = gb.runs.iter().filter_map(RunExpected::run).collect();
            let seq = grouper.find_or_create(&run_ids, &self.runs);
            grouper.add_variable(seq, &name);
            grids.push(UberGrid::new(name, gb.runs, seq, union, gb.in_definition));
        }

        let (time_coords, vert_coords) = self.interner.into_parts();
        info!(
            runs = self.runs.len(),
            variables = grids.len(),
            run_seqs = grouper.len(),
            time_coords = time_coords.len(),
            vert_coords = vert_coords.len(),
            runs_skipped = self.stats.runs_skipped,
            variables_skipped = self.stats.variables_skipped,
            duplicates = self.stats.duplicate_contributions,
            "Collection finished"
        );

        FmrcCollection::new(
            self.name,
            self.definition,
            self.config,
            time_coords,
            vert_coords,
            self.runs,
            grouper.into_seqs(),
            grids,
            axes,
            self.stats,
        )
    }

    /// Zero-inventory grids for definition variables no run produced.
    fn add_definition_only_variables(&mut self) {
        let Some(def) = self.definition.clone() else {
            return;
        };
        if !self.config.include_definition_only_variables {
            return;
        }

        let run_times: Vec<DateTime<Utc>> = self.run_times.iter().copied().collect();
        for name in def.variables() {
            if self.grids.contains_key(name) {
                continue;
            }
            let expected_grid = def.find_grid(name).cloned();
            let mut gb = GridBuilder::new(true);
            for &run_time in &run_times {
                let re = RunExpected::new(
                    run_time,
                    None,
                    None,
                    def.expected_time_coord(name, run_time).cloned(),
                    expected_grid.clone(),
                );
                self.register_offsets(run_time, &re.offsets());
                gb.runs.push(re);
            }
            debug!(variable = %name, "Variable in definition but not in any run");
            self.stats.definition_only_variables += 1;
            self.grids.insert(name.to_string(), gb);
        }
    }
}

/// Union of the levels of every contributing run, or the shared coordinate
/// when all runs agree.
fn union_vert_coord(interner: &mut CoordInterner, runs: &[RunExpected]) -> Option<Arc<VertCoord>> {
    let coords: Vec<&Arc<VertCoord>> = runs
        .iter()
        .filter_map(RunExpected::actual)
        .filter_map(ActualGrid::vert_coord)
        .collect();
    let first = *coords.first()?;
    if coords.iter().all(|vc| vc.id() == first.id()) {
        return Some(Arc::clone(first));
    }

    let mut levels: Vec<f64> = Vec::new();
    for vc in &coords {
        for &v in vc.values() {
            if find_close(&levels, v).is_none() {
                levels.push(v);
            }
        }
    }
    levels.sort_by(f64::total_cmp);
    interner.intern_vert(&levels, first.name(), first.units())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::GridSummary;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_malformed_run_leaves_builder_unchanged() {
        let mut builder = CollectionBuilder::new("test");
        let good = RunSummary::new(day(1), vec![0.0, 6.0]).with_variable(GridSummary::scalar("T"));
        let bad = RunSummary::new(day(2), vec![6.0, 0.0]).with_variable(GridSummary::scalar("T"));
        assert!(builder.add_run(&good).is_ok());
        assert!(builder.add_run(&bad).is_err());
        assert_eq!(builder.stats().runs_added, 1);
        assert_eq!(builder.stats().runs_skipped, 1);
        let collection = builder.finish();
        assert_eq!(collection.runs().len(), 1);
        assert_eq!(collection.axes().run_times(), &[day(1)]);
    }

    #[test]
    fn test_offset_beyond_date_range_is_rejected_not_fatal() {
        let mut builder = CollectionBuilder::new("test");
        let good = RunSummary::new(day(1), vec![0.0, 6.0]).with_variable(GridSummary::scalar("T"));
        let huge = RunSummary::new(day(2), vec![0.0, 1.0e10]).with_variable(GridSummary::scalar("T"));
        assert!(builder.add_run(&good).is_ok());
        assert!(matches!(
            builder.add_run(&huge),
            Err(SummaryError::OffsetOutOfRange { index: 1, .. })
        ));
        assert_eq!(builder.stats().runs_skipped, 1);
        let collection = builder.finish();
        assert_eq!(collection.axes().run_times(), &[day(1)]);
        assert_eq!(collection.axes().offsets(), &[0.0, 6.0]);
    }

    #[test]
    fn test_duplicate_contribution_is_ignored() {
        let mut builder = CollectionBuilder::new("test");
        let a = RunSummary::new(day(1), vec![0.0, 6.0]).with_variable(GridSummary::scalar("T"));
        let b = RunSummary::new(day(1), vec![0.0, 6.0, 12.0]).with_variable(GridSummary::scalar("T"));
        builder.add_run(&a).unwrap();
        let outcome = builder.add_run(&b).unwrap();
        assert_eq!(outcome.duplicate_contributions, 1);
        let collection = builder.finish();
        assert_eq!(collection.grid("T").unwrap().runs().len(), 1);
    }

    #[test]
    fn test_variable_offsets_make_separate_runs() {
        let mut builder = CollectionBuilder::new("test");
        let s = RunSummary::new(day(1), vec![0.0, 6.0])
            .with_variable(GridSummary::scalar("T"))
            .with_variable(GridSummary::scalar("P").with_offsets(vec![0.0, 3.0, 6.0]))
            .with_variable(GridSummary::scalar("U"));
        let outcome = builder.add_run(&s).unwrap();
        assert_eq!(outcome.runs.len(), 2);
        let collection = builder.finish();
        assert_eq!(collection.runs().len(), 2);
        assert_eq!(collection.time_coords().len(), 2);
        assert_eq!(collection.axes().offsets(), &[0.0, 3.0, 6.0]);
    }

    #[test]
    fn test_union_of_differing_levels() {
        let mut builder = CollectionBuilder::new("test");
        builder
            .add_run(&RunSummary::new(day(1), vec![0.0]).with_variable(GridSummary::with_levels(
                "T",
                "isobaric",
                Some("hPa"),
                vec![1000.0, 500.0],
            )))
            .unwrap();
        builder
            .add_run(&RunSummary::new(day(2), vec![0.0]).with_variable(GridSummary::with_levels(
                "T",
                "isobaric",
                Some("hPa"),
                vec![850.0, 500.0],
            )))
            .unwrap();
        let collection = builder.finish();
        let union = collection.grid("T").unwrap().vert_coord_union().unwrap();
        assert_eq!(union.values(), &[500.0, 850.0, 1000.0]);
        assert_eq!(union.name(), "isobaric");
        assert_eq!(collection.vert_coords().len(), 3);
    }
}
