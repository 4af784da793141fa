//! Runs and run sequences.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fmrc_common::checked_add_offset_hours;
use serde::Serialize;

use crate::coord::TimeCoord;

/// Index of a [`Run`] within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunId(pub u32);

/// Index of a [`RunSeq`] within a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunSeqId(pub u32);

impl fmt::Display for RunSeqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RunSeq{}", self.0)
    }
}

/// A forecast time produced by a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InventoryEntry {
    pub forecast_time: DateTime<Utc>,
    pub offset_hours: f64,
}

/// One model run bound to a canonical time coordinate.
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    id: RunId,
    run_time: DateTime<Utc>,
    #[serde(skip)]
    time_coord: Arc<TimeCoord>,
    inventory: Vec<InventoryEntry>,
}

impl Run {
    pub(crate) fn new(id: RunId, run_time: DateTime<Utc>, time_coord: Arc<TimeCoord>) -> Self {
        // Summaries are validated against the date range before they get here
        let inventory = time_coord
            .offsets()
            .iter()
            .filter_map(|&offset_hours| {
                Some(InventoryEntry {
                    forecast_time: checked_add_offset_hours(run_time, offset_hours)?,
                    offset_hours,
                })
            })
            .collect();
        Self {
            id,
            run_time,
            time_coord,
            inventory,
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn run_time(&self) -> DateTime<Utc> {
        self.run_time
    }

    pub fn time_coord(&self) -> &Arc<TimeCoord> {
        &self.time_coord
    }

    /// `(forecast time, offset)` for every offset of the run, in offset order.
    pub fn inventory(&self) -> &[InventoryEntry] {
        &self.inventory
    }

    /// Same run time and same interned time coordinate.
    pub fn same_schedule(&self, other: &Run) -> bool {
        self.run_time == other.run_time && self.time_coord.id() == other.time_coord.id()
    }
}

/// An ordered run pattern shared by a set of variables.
#[derive(Debug, Clone, Serialize)]
pub struct RunSeq {
    id: RunSeqId,
    runs: Vec<RunId>,
    variables: BTreeSet<String>,
}

impl RunSeq {
    pub fn id(&self) -> RunSeqId {
        self.id
    }

    pub fn name(&self) -> String {
        self.id.to_string()
    }

    /// Runs in run-time order.
    pub fn runs(&self) -> &[RunId] {
        &self.runs
    }

    /// Names of the variables following this pattern, sorted.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }
}

/// Partitions per-variable run lists into [`RunSeq`] equivalence classes.
///
/// The number of distinct sequences is bounded by the number of operational
/// schedules, so matching scans the existing sequences.
#[derive(Debug, Default)]
pub struct RunSeqGrouper {
    seqs: Vec<RunSeq>,
}

impl RunSeqGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the sequence whose runs match `runs` pairwise, creating it if
    /// none does. `runs` must be ordered by run time; `all_runs` is indexed
    /// by [`RunId`].
    pub fn find_or_create(&mut self, runs: &[RunId], all_runs: &[Run]) -> RunSeqId {
        let matches = |seq: &RunSeq| {
            seq.runs.len() == runs.len()
                && seq.runs.iter().zip(runs).all(|(a, b)| {
                    let a = &all_runs[a.0 as usize];
                    let b = &all_runs[b.0 as usize];
                    a.same_schedule(b)
                })
        };

        if let Some(seq) = self.seqs.iter().find(|s| matches(s)) {
            return seq.id;
        }

        let id = RunSeqId(self.seqs.len() as u32);
        self.seqs.push(RunSeq {
            id,
            runs: runs.to_vec(),
            variables: BTreeSet::new(),
        });
        id
    }

    pub fn add_variable(&mut self, seq: RunSeqId, name: &str) {
        if let Some(seq) = self.seqs.get_mut(seq.0 as usize) {
            seq.variables.insert(name.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.seqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
    }

    pub fn into_seqs(self) -> Vec<RunSeq> {
        self.seqs
    }
}
