//! Expected-inventory definitions.
//!
//! A definition lists, per variable, the offset hours each run is expected to
//! produce and the vertical levels expected at each of those offsets. It is
//! loaded once (usually from XML, see [`xml`]) and shared read-only by every
//! collection built against it.
//!
//! Resolution is lenient: an unparsable coordinate, an unknown reference or a
//! bad restriction costs only the variables that use it their expectation.
//! Those variables fall back to "expect what was produced".

mod derive;
pub mod xml;

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fmrc_common::{close_enough, hour_of_day, offset_duration};
use tracing::warn;

use crate::coord::{find_close, LevelSchedule};
use crate::error::{DefinitionError, DefinitionResult};

pub use xml::{
    DefinitionDocument, OffsetHoursElement, RestrictionElement, RunElement, RunSequenceElement,
    VariableElement, VertCoordElement,
};

use xml::{format_levels, format_numbers, parse_levels, parse_numbers};

/// A named list of expected offset hours.
#[derive(Debug, Clone, PartialEq)]
pub struct DefTimeCoord {
    id: String,
    offsets: Vec<f64>,
}

impl DefTimeCoord {
    pub fn new(id: impl Into<String>, offsets: Vec<f64>) -> Self {
        Self {
            id: id.into(),
            offsets,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn offsets(&self) -> &[f64] {
        &self.offsets
    }

    pub fn find_index(&self, offset_hour: f64) -> Option<usize> {
        find_close(&self.offsets, offset_hour)
    }

    pub fn contains(&self, offset_hour: f64) -> bool {
        self.find_index(offset_hour).is_some()
    }
}

/// A named list of expected vertical levels. Layers keep their lower bound
/// in `values` and their upper bound alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct DefVertCoord {
    id: String,
    name: String,
    units: Option<String>,
    values: Vec<f64>,
    upper: Option<Vec<f64>>,
}

impl DefVertCoord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        units: Option<String>,
        values: Vec<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            units,
            values,
            upper: None,
        }
    }

    pub fn with_upper_bounds(mut self, upper: Vec<f64>) -> Self {
        self.upper = Some(upper);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
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

    pub fn upper_bounds(&self) -> Option<&[f64]> {
        self.upper.as_deref()
    }

    pub fn is_layer(&self) -> bool {
        self.upper.is_some()
    }
}

/// A run hour of day and the offsets expected from runs at that hour.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledRun {
    pub run_hour: f64,
    pub time_coord_id: String,
    /// `None` when `time_coord_id` does not resolve.
    pub time_coord: Option<Arc<DefTimeCoord>>,
}

/// How a run sequence chooses the expected offsets for a run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunSchedule {
    /// Every run uses the same offsets.
    AllUse {
        time_coord_id: String,
        time_coord: Option<Arc<DefTimeCoord>>,
    },
    /// Offsets depend on the run's hour of day, as declared.
    ByRunHour(Vec<ScheduledRun>),
}

/// Level restriction as written in the document: `levels` are only
/// expected at `hours`.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelRestriction {
    pub levels: String,
    pub hours: String,
}

/// Expected vertical structure of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct DefGrid {
    name: String,
    vert_coord_id: Option<String>,
    levels: Option<LevelSchedule>,
    restrictions: Vec<LevelRestriction>,
    resolved: bool,
}

impl DefGrid {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vert_coord_id(&self) -> Option<&str> {
        self.vert_coord_id.as_deref()
    }

    /// `None` for a variable without a vertical coordinate.
    pub fn levels(&self) -> Option<&LevelSchedule> {
        self.levels.as_ref()
    }

    pub fn restrictions(&self) -> &[LevelRestriction] {
        &self.restrictions
    }

    /// False when a reference or restriction of this variable could not be
    /// resolved; such a variable carries no expectation.
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Number of levels expected at `offset_hour`; a scalar variable
    /// expects one.
    pub fn count_levels_at(&self, offset_hour: f64) -> usize {
        match &self.levels {
            None => 1,
            Some(schedule) => schedule.count_at(offset_hour),
        }
    }

    /// Levels expected at `offset_hour`; empty for a scalar variable.
    pub fn levels_at(&self, offset_hour: f64) -> &[f64] {
        match &self.levels {
            None => &[],
            Some(schedule) => schedule.values_at(offset_hour),
        }
    }
}

/// A run-sequence template and the variables that follow it.
#[derive(Debug, Clone)]
pub struct DefRunSeq {
    index: usize,
    schedule: RunSchedule,
    /// Declared runs repeated over a full day; empty for `AllUse`.
    cycle: Vec<ScheduledRun>,
    grids: Vec<Arc<DefGrid>>,
}

impl DefRunSeq {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn schedule(&self) -> &RunSchedule {
        &self.schedule
    }

    /// Runs covering the 24-hour cycle, hours in `[0, 24)`.
    pub fn cycle(&self) -> &[ScheduledRun] {
        &self.cycle
    }

    pub fn grids(&self) -> &[Arc<DefGrid>] {
        &self.grids
    }

    /// Expected offsets for a run at `run_time`, if the template covers it.
    pub fn time_coord_for(&self, run_time: DateTime<Utc>) -> Option<&Arc<DefTimeCoord>> {
        match &self.schedule {
            RunSchedule::AllUse { time_coord, .. } => time_coord.as_ref(),
            RunSchedule::ByRunHour(_) => {
                let hour = hour_of_day(run_time);
                self.cycle
                    .iter()
                    .find(|r| close_enough(r.run_hour, hour))
                    .and_then(|r| r.time_coord.as_ref())
            }
        }
    }

    /// Every resolvable offset the template can expect, sorted.
    fn offset_union(&self) -> Option<Vec<f64>> {
        match &self.schedule {
            RunSchedule::AllUse { time_coord, .. } => time_coord.as_ref().map(|tc| tc.offsets.clone()),
            RunSchedule::ByRunHour(runs) => {
                let mut union: Vec<f64> = Vec::new();
                for tc in runs.iter().filter_map(|r| r.time_coord.as_ref()) {
                    for &h in &tc.offsets {
                        if find_close(&union, h).is_none() {
                            union.push(h);
                        }
                    }
                }
                union.sort_by(f64::total_cmp);
                Some(union)
            }
        }
    }
}

/// Repeat the declared runs over a day.
///
/// The pattern period is the declared span plus one step (the spacing of the
/// first two entries). A single entry covers only its own hour.
fn extend_cycle(declared: &[ScheduledRun]) -> Vec<ScheduledRun> {
    let mut cycle: Vec<ScheduledRun> = declared
        .iter()
        .map(|r| ScheduledRun {
            run_hour: r.run_hour.rem_euclid(24.0),
            ..r.clone()
        })
        .collect();

    if declared.len() < 2 {
        return cycle;
    }

    let first = declared[0].run_hour;
    let last = declared[declared.len() - 1].run_hour;
    let spacing = declared[1].run_hour - first;
    let period = last - first + spacing;
    if spacing <= 0.0 || period <= 0.0 {
        return cycle;
    }

    let mut k = 1.0;
    'outer: while first + k * period < first + 24.0 {
        for run in declared {
            let hour = run.run_hour + k * period;
            if hour >= first + 24.0 {
                break 'outer;
            }
            let hour = hour.rem_euclid(24.0);
            if cycle.iter().any(|r| close_enough(r.run_hour, hour)) {
                continue;
            }
            cycle.push(ScheduledRun {
                run_hour: hour,
                ..run.clone()
            });
        }
        k += 1.0;
    }
    cycle
}

/// An expected-inventory definition.
#[derive(Debug, Clone, Default)]
pub struct FmrcDefinition {
    name: Option<String>,
    suffix_filter: Option<String>,
    time_coords: Vec<Arc<DefTimeCoord>>,
    vert_coords: Vec<Arc<DefVertCoord>>,
    run_seqs: Vec<DefRunSeq>,
    /// variable name -> (run seq index, grid index)
    by_variable: HashMap<String, (usize, usize)>,
}

impl FmrcDefinition {
    pub fn from_xml_str(xml: &str) -> DefinitionResult<Self> {
        Ok(Self::from_document(DefinitionDocument::from_xml_str(xml)?))
    }

    pub fn read_xml(path: impl AsRef<Path>) -> DefinitionResult<Self> {
        Ok(Self::from_document(DefinitionDocument::read_xml(path)?))
    }

    pub fn to_xml_string(&self) -> DefinitionResult<String> {
        self.to_document().to_xml_string()
    }

    pub fn write_xml(&self, path: impl AsRef<Path>) -> DefinitionResult<()> {
        self.to_document().write_xml(path)
    }

    /// Resolve a parsed document. Problems are logged and degrade only the
    /// affected entries.
    pub fn from_document(doc: DefinitionDocument) -> Self {
        let mut time_coords = Vec::new();
        for elem in &doc.offset_hours {
            let context = format!("offsetHours '{}'", elem.id);
            let parsed = parse_numbers(&elem.values, &context).and_then(|offsets| {
                match offsets.iter().find(|&&h| offset_duration(h).is_none()) {
                    Some(&value) => Err(DefinitionError::OffsetOutOfRange { context, value }),
                    None => Ok(offsets),
                }
            });
            match parsed {
                Ok(offsets) => time_coords.push(Arc::new(DefTimeCoord::new(&elem.id, offsets))),
                Err(e) => warn!(id = %elem.id, error = %e, "Skipping offsetHours"),
            }
        }

        let mut vert_coords = Vec::new();
        for elem in &doc.vert_coords {
            match parse_levels(&elem.values, &format!("vertCoord '{}'", elem.id)) {
                Ok((values, upper)) => {
                    let vc = DefVertCoord::new(&elem.id, &elem.name, elem.units.clone(), values);
                    vert_coords.push(Arc::new(match upper {
                        Some(upper) => vc.with_upper_bounds(upper),
                        None => vc,
                    }));
                }
                Err(e) => warn!(id = %elem.id, error = %e, "Skipping vertCoord"),
            }
        }

        let find_time = |id: &str| time_coords.iter().find(|tc| tc.id == id).cloned();

        let mut run_seqs = Vec::new();
        let mut by_variable = HashMap::new();

        for (index, seq_elem) in doc.run_sequences.iter().enumerate() {
            let schedule = match &seq_elem.all_use_seq {
                Some(id) => {
                    let time_coord = find_time(id);
                    if time_coord.is_none() {
                        warn!(
                            run_sequence = index,
                            error = %DefinitionError::UnknownTimeCoord(id.clone()),
                            "Run sequence has no expected offsets"
                        );
                    }
                    RunSchedule::AllUse {
                        time_coord_id: id.clone(),
                        time_coord,
                    }
                }
                None => {
                    let mut runs = Vec::new();
                    for run in &seq_elem.runs {
                        let hour = match parse_numbers(&run.run_hour, "runHour") {
                            Ok(v) if v.len() == 1 => v[0],
                            _ => {
                                warn!(run_sequence = index, run_hour = %run.run_hour, "Skipping run with invalid runHour");
                                continue;
                            }
                        };
                        let time_coord = find_time(&run.offset_hour_seq);
                        if time_coord.is_none() {
                            warn!(
                                run_sequence = index,
                                run_hour = hour,
                                error = %DefinitionError::UnknownTimeCoord(run.offset_hour_seq.clone()),
                                "Runs at this hour have no expected offsets"
                            );
                        }
                        runs.push(ScheduledRun {
                            run_hour: hour,
                            time_coord_id: run.offset_hour_seq.clone(),
                            time_coord,
                        });
                    }
                    RunSchedule::ByRunHour(runs)
                }
            };

            let cycle = match &schedule {
                RunSchedule::AllUse { .. } => Vec::new(),
                RunSchedule::ByRunHour(runs) => extend_cycle(runs),
            };

            let mut seq = DefRunSeq {
                index,
                schedule,
                cycle,
                grids: Vec::new(),
            };

            for var in &seq_elem.variables {
                if by_variable.contains_key(&var.name) {
                    warn!(variable = %var.name, "Variable listed twice in definition, keeping the first");
                    continue;
                }
                let restrictions: Vec<LevelRestriction> = var
                    .restrictions
                    .iter()
                    .map(|r| LevelRestriction {
                        levels: r.levels.clone(),
                        hours: r.hours.clone(),
                    })
                    .collect();

                let resolved = resolve_levels(var, &restrictions, &vert_coords, &seq);
                let (levels, resolved) = match resolved {
                    Ok(levels) => (levels, true),
                    Err(e) => {
                        warn!(variable = %var.name, error = %e, "Variable has no usable expectation");
                        (None, false)
                    }
                };

                by_variable.insert(var.name.clone(), (index, seq.grids.len()));
                seq.grids.push(Arc::new(DefGrid {
                    name: var.name.clone(),
                    vert_coord_id: var.vert_coord.clone(),
                    levels,
                    restrictions,
                    resolved,
                }));
            }
            run_seqs.push(seq);
        }

        Self {
            name: doc.dataset,
            suffix_filter: doc.suffix_filter,
            time_coords,
            vert_coords,
            run_seqs,
            by_variable,
        }
    }

    /// Rebuild the document form.
    pub fn to_document(&self) -> DefinitionDocument {
        DefinitionDocument {
            dataset: self.name.clone(),
            suffix_filter: self.suffix_filter.clone(),
            vert_coords: self
                .vert_coords
                .iter()
                .map(|vc| VertCoordElement {
                    id: vc.id.clone(),
                    name: vc.name.clone(),
                    units: vc.units.clone(),
                    values: format_levels(&vc.values, vc.upper.as_deref()),
                })
                .collect(),
            offset_hours: self
                .time_coords
                .iter()
                .map(|tc| OffsetHoursElement {
                    id: tc.id.clone(),
                    values: format_numbers(&tc.offsets),
                })
                .collect(),
            run_sequences: self
                .run_seqs
                .iter()
                .map(|seq| {
                    let (all_use_seq, runs) = match &seq.schedule {
                        RunSchedule::AllUse { time_coord_id, .. } => {
                            (Some(time_coord_id.clone()), Vec::new())
                        }
                        RunSchedule::ByRunHour(runs) => (
                            None,
                            runs.iter()
                                .map(|r| RunElement {
                                    run_hour: format!("{:?}", r.run_hour),
                                    offset_hour_seq: r.time_coord_id.clone(),
                                })
                                .collect(),
                        ),
                    };
                    RunSequenceElement {
                        all_use_seq,
                        runs,
                        variables: seq
                            .grids
                            .iter()
                            .map(|g| VariableElement {
                                name: g.name.clone(),
                                vert_coord: g.vert_coord_id.clone(),
                                restrictions: g
                                    .restrictions
                                    .iter()
                                    .map(|r| RestrictionElement {
                                        levels: r.levels.clone(),
                                        hours: r.hours.clone(),
                                    })
                                    .collect(),
                            })
                            .collect(),
                    }
                })
                .collect(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// File suffix the scanner should match instead of its own default.
    pub fn suffix_filter(&self) -> Option<&str> {
        self.suffix_filter.as_deref()
    }

    pub fn time_coords(&self) -> &[Arc<DefTimeCoord>] {
        &self.time_coords
    }

    pub fn vert_coords(&self) -> &[Arc<DefVertCoord>] {
        &self.vert_coords
    }

    pub fn run_seqs(&self) -> &[DefRunSeq] {
        &self.run_seqs
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.by_variable.contains_key(name)
    }

    /// Variable names in document order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.run_seqs
            .iter()
            .flat_map(|seq| seq.grids.iter().map(|g| g.name.as_str()))
    }

    pub fn find_seq_for_variable(&self, name: &str) -> Option<&DefRunSeq> {
        self.by_variable.get(name).map(|&(seq, _)| &self.run_seqs[seq])
    }

    pub fn find_grid(&self, name: &str) -> Option<&Arc<DefGrid>> {
        self.by_variable
            .get(name)
            .map(|&(seq, grid)| &self.run_seqs[seq].grids[grid])
    }

    /// Expected offsets of `variable` for a run at `run_time`.
    pub fn expected_time_coord(
        &self,
        variable: &str,
        run_time: DateTime<Utc>,
    ) -> Option<&Arc<DefTimeCoord>> {
        self.find_seq_for_variable(variable)?.time_coord_for(run_time)
    }
}

fn resolve_levels(
    var: &VariableElement,
    restrictions: &[LevelRestriction],
    vert_coords: &[Arc<DefVertCoord>],
    seq: &DefRunSeq,
) -> DefinitionResult<Option<LevelSchedule>> {
    let base = match &var.vert_coord {
        None if restrictions.is_empty() => return Ok(None),
        None => return Err(DefinitionError::RestrictionWithoutVertCoord(var.name.clone())),
        Some(id) => vert_coords
            .iter()
            .find(|vc| &vc.id == id)
            .ok_or_else(|| DefinitionError::UnknownVertCoord(id.clone()))?,
    };

    if restrictions.is_empty() {
        return Ok(Some(LevelSchedule::Fixed(base.values.clone())));
    }

    let offsets = match seq.offset_union() {
        Some(offsets) => offsets,
        None => match &seq.schedule {
            RunSchedule::AllUse { time_coord_id, .. } => {
                return Err(DefinitionError::UnknownTimeCoord(time_coord_id.clone()))
            }
            RunSchedule::ByRunHour(_) => Vec::new(),
        },
    };

    let mut overrides = BTreeMap::new();
    for r in restrictions {
        let context = format!("restriction of '{}'", var.name);
        let (levels, _) = parse_levels(&r.levels, &context)?;
        for hour in parse_numbers(&r.hours, &context)? {
            let index = find_close(&offsets, hour).ok_or_else(|| DefinitionError::RestrictionHour {
                variable: var.name.clone(),
                hour,
            })?;
            overrides.insert(index, levels.clone());
        }
    }

    Ok(Some(LevelSchedule::TimeVarying {
        levels: base.values.clone(),
        offsets,
        overrides,
    }))
}
