//! Deriving a definition from an existing collection.

use std::collections::HashMap;

use fmrc_common::{close_enough, hour_of_day};

use super::xml::{
    format_numbers, DefinitionDocument, OffsetHoursElement, RunElement, RunSequenceElement,
    VariableElement, VertCoordElement,
};
use super::FmrcDefinition;
use crate::collection::FmrcCollection;
use crate::coord::VertCoordId;

impl FmrcDefinition {
    /// A definition expecting exactly what `collection` holds: its time
    /// coordinates, each variable's union vertical coordinate and one
    /// run-sequence template per run sequence.
    ///
    /// Run sequences without runs (definition-only variables) are left out.
    pub fn from_collection(collection: &FmrcCollection) -> Self {
        let mut vert_ids: HashMap<VertCoordId, String> = HashMap::new();
        let mut vert_coords = Vec::new();
        for grid in collection.grids() {
            let Some(vc) = grid.vert_coord_union() else {
                continue;
            };
            if vert_ids.contains_key(&vc.id()) {
                continue;
            }
            let name_taken = vert_coords.iter().any(|e: &VertCoordElement| e.id == vc.name());
            let id = if name_taken {
                format!("{}{}", vc.name(), vc.id())
            } else {
                vc.name().to_string()
            };
            vert_ids.insert(vc.id(), id.clone());
            vert_coords.push(VertCoordElement {
                id,
                name: vc.name().to_string(),
                units: vc.units().map(str::to_string),
                values: format_numbers(vc.values()),
            });
        }

        let offset_hours = collection
            .time_coords()
            .iter()
            .map(|tc| OffsetHoursElement {
                id: tc.name(),
                values: format_numbers(tc.offsets()),
            })
            .collect();

        let mut run_sequences = Vec::new();
        for seq in collection.run_seqs() {
            let runs: Vec<_> = seq.runs().iter().filter_map(|&id| collection.run(id)).collect();
            let Some(first) = runs.first() else {
                continue;
            };

            let all_same = runs
                .iter()
                .all(|r| r.time_coord().id() == first.time_coord().id());
            let (all_use_seq, run_elems) = if all_same {
                (Some(first.time_coord().name()), Vec::new())
            } else {
                let mut by_hour: Vec<(f64, String)> = Vec::new();
                for run in &runs {
                    let hour = hour_of_day(run.run_time());
                    if !by_hour.iter().any(|(h, _)| close_enough(*h, hour)) {
                        by_hour.push((hour, run.time_coord().name()));
                    }
                }
                by_hour.sort_by(|a, b| a.0.total_cmp(&b.0));
                let elems = by_hour
                    .into_iter()
                    .map(|(hour, id)| RunElement {
                        run_hour: format!("{:?}", hour),
                        offset_hour_seq: id,
                    })
                    .collect();
                (None, elems)
            };

            let variables = seq
                .variables()
                .filter_map(|name| collection.grid(name))
                .map(|grid| VariableElement {
                    name: grid.name().to_string(),
                    vert_coord: grid
                        .vert_coord_union()
                        .and_then(|vc| vert_ids.get(&vc.id()).cloned()),
                    restrictions: Vec::new(),
                })
                .collect();

            run_sequences.push(RunSequenceElement {
                all_use_seq,
                runs: run_elems,
                variables,
            });
        }

        let suffix_filter = collection
            .definition()
            .and_then(|d| d.suffix_filter().map(str::to_string));

        Self::from_document(DefinitionDocument {
            dataset: Some(collection.name().to_string()),
            suffix_filter,
            vert_coords,
            offset_hours,
            run_sequences,
        })
    }
}
