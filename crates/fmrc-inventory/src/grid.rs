//! Per-variable inventory: actual grids, per-run expectations and the
//! [`UberGrid`] aggregate.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::coord::{find_close, TimeCoord, VertCoord};
use crate::definition::{DefGrid, DefTimeCoord};
use crate::matrix::Completeness;
use crate::run::{RunId, RunSeqId};
use crate::summary::MissingSlot;

/// What one run actually produced for one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ActualGrid {
    time_coord: Arc<TimeCoord>,
    vert_coord: Option<Arc<VertCoord>>,
    /// Sorted and deduplicated.
    missing: Vec<MissingSlot>,
}

impl ActualGrid {
    pub(crate) fn new(
        time_coord: Arc<TimeCoord>,
        vert_coord: Option<Arc<VertCoord>>,
        mut missing: Vec<MissingSlot>,
    ) -> Self {
        missing.sort_by_key(|m| (m.time_index, m.vert_index));
        missing.dedup();
        Self {
            time_coord,
            vert_coord,
            missing,
        }
    }

    pub fn time_coord(&self) -> &Arc<TimeCoord> {
        &self.time_coord
    }

    pub fn vert_coord(&self) -> Option<&Arc<VertCoord>> {
        self.vert_coord.as_ref()
    }

    pub fn missing(&self) -> &[MissingSlot] {
        &self.missing
    }

    /// Levels per time step; 1 for a scalar variable.
    pub fn vert_len(&self) -> usize {
        self.vert_coord.as_ref().map(|vc| vc.len()).unwrap_or(1)
    }

    /// Scheduled slots: time steps times levels.
    pub fn total_slots(&self) -> usize {
        self.time_coord.len() * self.vert_len()
    }

    pub fn count_total(&self) -> usize {
        self.total_slots() - self.missing.len()
    }

    fn missing_at(&self, time_index: usize) -> impl Iterator<Item = &MissingSlot> {
        self.missing.iter().filter(move |m| m.time_index == time_index)
    }

    pub fn count_inventory_at(&self, offset_hour: f64) -> usize {
        match self.time_coord.find_index(offset_hour) {
            None => 0,
            Some(index) => self.vert_len() - self.missing_at(index).count(),
        }
    }

    /// Level slots at `offset_hour`, empty if the run has no such offset.
    pub fn levels_at(&self, offset_hour: f64) -> Vec<LevelSlot> {
        let Some(index) = self.time_coord.find_index(offset_hour) else {
            return Vec::new();
        };
        let is_missing = |v: usize| self.missing_at(index).any(|m| m.vert_index == v);
        match &self.vert_coord {
            None => vec![LevelSlot {
                level: None,
                present: !is_missing(0),
            }],
            Some(vc) => vc
                .values()
                .iter()
                .enumerate()
                .map(|(v, &level)| LevelSlot {
                    level: Some(level),
                    present: !is_missing(v),
                })
                .collect(),
        }
    }
}

/// One vertical slot at a given offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSlot {
    /// `None` for a variable without a vertical coordinate.
    pub level: Option<f64>,
    pub present: bool,
}

impl fmt::Display for LevelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.present, self.level) {
            (false, _) => f.write_str("missing"),
            (true, Some(level)) => write!(f, "{}", level),
            (true, None) => f.write_str("scalar"),
        }
    }
}

/// One run's actual contribution to a variable, paired with what the
/// definition expected of that run.
#[derive(Debug, Clone)]
pub struct RunExpected {
    run_time: DateTime<Utc>,
    /// `None` for definition-only variables.
    run: Option<RunId>,
    actual: Option<ActualGrid>,
    expected_time: Option<Arc<DefTimeCoord>>,
    expected_grid: Option<Arc<DefGrid>>,
}

impl RunExpected {
    pub(crate) fn new(
        run_time: DateTime<Utc>,
        run: Option<RunId>,
        actual: Option<ActualGrid>,
        expected_time: Option<Arc<DefTimeCoord>>,
        expected_grid: Option<Arc<DefGrid>>,
    ) -> Self {
        Self {
            run_time,
            run,
            actual,
            expected_time,
            expected_grid,
        }
    }

    pub fn run_time(&self) -> DateTime<Utc> {
        self.run_time
    }

    pub fn run(&self) -> Option<RunId> {
        self.run
    }

    pub fn actual(&self) -> Option<&ActualGrid> {
        self.actual.as_ref()
    }

    pub fn expected_time(&self) -> Option<&Arc<DefTimeCoord>> {
        self.expected_time.as_ref()
    }

    pub fn expected_grid(&self) -> Option<&Arc<DefGrid>> {
        self.expected_grid.as_ref()
    }

    /// True when the definition supplies usable offsets and levels.
    pub fn has_expectation(&self) -> bool {
        self.expected_time.is_some() && self.expected_grid.as_ref().is_some_and(|g| g.is_resolved())
    }

    pub fn count_inventory(&self, offset_hour: f64) -> usize {
        self.actual
            .as_ref()
            .map(|a| a.count_inventory_at(offset_hour))
            .unwrap_or(0)
    }

    /// Slots expected at `offset_hour`.
    ///
    /// Without a usable expectation this is the slots the run scheduled at
    /// that offset, so the run is measured against itself.
    pub fn count_expected(&self, offset_hour: f64) -> usize {
        match (&self.expected_time, &self.expected_grid) {
            (Some(tc), Some(grid)) if grid.is_resolved() => {
                if tc.contains(offset_hour) {
                    grid.count_levels_at(offset_hour)
                } else {
                    0
                }
            }
            _ => match &self.actual {
                Some(a) if a.time_coord.contains(offset_hour) => a.vert_len(),
                _ => 0,
            },
        }
    }

    /// Every offset this entry has an actual or expected count at: actual
    /// offsets first, then expected-only offsets.
    pub fn offsets(&self) -> Vec<f64> {
        let mut offsets: Vec<f64> = self
            .actual
            .as_ref()
            .map(|a| a.time_coord.offsets().to_vec())
            .unwrap_or_default();
        if self.has_expectation() {
            if let Some(tc) = &self.expected_time {
                for &h in tc.offsets() {
                    if find_close(&offsets, h).is_none() {
                        offsets.push(h);
                    }
                }
            }
        }
        offsets
    }

    pub fn total_slots(&self) -> usize {
        self.actual.as_ref().map(ActualGrid::total_slots).unwrap_or(0)
    }

    /// Summed over [`Self::offsets`].
    pub fn completeness(&self) -> Completeness {
        self.offsets()
            .into_iter()
            .map(|h| Completeness::new(self.count_inventory(h), self.count_expected(h)))
            .sum()
    }

    /// Levels expected at `offset_hour`, if the definition says.
    pub fn expected_levels_at(&self, offset_hour: f64) -> Option<Vec<f64>> {
        if !self.has_expectation() {
            return None;
        }
        let tc = self.expected_time.as_ref()?;
        let grid = self.expected_grid.as_ref()?;
        if !tc.contains(offset_hour) {
            return Some(Vec::new());
        }
        Some(grid.levels_at(offset_hour).to_vec())
    }
}

/// Everything the collection knows about one variable.
#[derive(Debug, Clone)]
pub struct UberGrid {
    name: String,
    /// Ordered by run time.
    runs: Vec<RunExpected>,
    run_seq: RunSeqId,
    vert_coord_union: Option<Arc<VertCoord>>,
    in_definition: bool,
    totals: Completeness,
}

impl UberGrid {
    pub(crate) fn new(
        name: String,
        runs: Vec<RunExpected>,
        run_seq: RunSeqId,
        vert_coord_union: Option<Arc<VertCoord>>,
        in_definition: bool,
    ) -> Self {
        let totals = runs.iter().map(RunExpected::completeness).sum();
        Self {
            name,
            runs,
            run_seq,
            vert_coord_union,
            in_definition,
            totals,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runs(&self) -> &[RunExpected] {
        &self.runs
    }

    pub fn run_seq(&self) -> RunSeqId {
        self.run_seq
    }

    /// Union of the levels seen across runs; `None` for a scalar variable.
    pub fn vert_coord_union(&self) -> Option<&Arc<VertCoord>> {
        self.vert_coord_union.as_ref()
    }

    /// Whether the loaded definition lists this variable.
    pub fn in_definition(&self) -> bool {
        self.in_definition
    }

    /// True if no run produced this variable.
    pub fn is_definition_only(&self) -> bool {
        self.runs.iter().all(|r| r.actual.is_none())
    }

    pub fn totals(&self) -> Completeness {
        self.totals
    }

    pub fn find_run(&self, run_time: DateTime<Utc>) -> Option<&RunExpected> {
        self.runs
            .binary_search_by(|r| r.run_time.cmp(&run_time))
            .ok()
            .map(|i| &self.runs[i])
    }
}
