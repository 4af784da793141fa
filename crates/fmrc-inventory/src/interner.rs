//! Value-equality interning of coordinates.
//!
//! Each distinct offset or level array is stored once and given the next
//! sequential id. Lookups hash a quantized copy of the values and confirm
//! the candidate with the epsilon comparison. A miss falls back to entries of
//! the same length whose value sum lies within tolerance, kept sorted so that
//! values straddling a rounding boundary still match without a full scan.

use std::collections::HashMap;
use std::sync::Arc;

use fmrc_common::{slices_close_enough, EPSILON};

use crate::coord::{TimeCoord, TimeCoordId, VertCoord, VertCoordId};

/// Quantization step for hash keys. Coarser than the comparison epsilon so
/// near-equal arrays usually share a key.
const KEY_SCALE: f64 = 1.0e6;

type CoordKey = Vec<i64>;

fn canonical_key(values: &[f64]) -> CoordKey {
    values.iter().map(|v| (v * KEY_SCALE).round() as i64).collect()
}

fn value_sum(values: &[f64]) -> f64 {
    values.iter().sum()
}

/// Widest gap between the sum of `values` and the sum of any array that
/// compares close to it.
fn search_radius(values: &[f64]) -> f64 {
    2.0 * EPSILON * values.iter().map(|v| v.abs().max(1.0)).sum::<f64>()
}

trait CoordValues {
    fn coord_values(&self) -> &[f64];
}

impl CoordValues for TimeCoord {
    fn coord_values(&self) -> &[f64] {
        self.offsets()
    }
}

impl CoordValues for VertCoord {
    fn coord_values(&self) -> &[f64] {
        self.values()
    }
}

#[derive(Debug)]
struct Registry<T> {
    entries: Vec<Arc<T>>,
    index: HashMap<CoordKey, Vec<usize>>,
    /// length -> (value sum, position), sorted by sum
    by_sum: HashMap<usize, Vec<(f64, usize)>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            by_sum: HashMap::new(),
        }
    }
}

impl<T: CoordValues> Registry<T> {
    fn find(&self, values: &[f64]) -> Option<usize> {
        let hit = self.index.get(&canonical_key(values)).and_then(|candidates| {
            candidates
                .iter()
                .copied()
                .find(|&i| slices_close_enough(self.entries[i].coord_values(), values))
        });

        hit.or_else(|| self.find_near(values))
    }

    fn find_near(&self, values: &[f64]) -> Option<usize> {
        let sorted = self.by_sum.get(&values.len())?;
        let sum = value_sum(values);
        let radius = search_radius(values);
        let start = sorted.partition_point(|(s, _)| *s < sum - radius);
        sorted[start..]
            .iter()
            .take_while(|(s, _)| *s <= sum + radius)
            .map(|&(_, i)| i)
            .find(|&i| slices_close_enough(self.entries[i].coord_values(), values))
    }

    fn next_id(&self) -> u32 {
        self.entries.len() as u32
    }

    fn insert(&mut self, entry: T) -> Arc<T> {
        let position = self.entries.len();
        let values = entry.coord_values();
        let key = canonical_key(values);
        let sum = value_sum(values);
        let sorted = self.by_sum.entry(values.len()).or_default();
        let at = sorted.partition_point(|(s, _)| s.total_cmp(&sum).is_lt());
        sorted.insert(at, (sum, position));
        let entry = Arc::new(entry);
        self.entries.push(Arc::clone(&entry));
        self.index.entry(key).or_default().push(position);
        entry
    }
}

/// Registry of distinct time and vertical coordinates.
#[derive(Debug, Default)]
pub struct CoordInterner {
    times: Registry<TimeCoord>,
    verts: Registry<VertCoord>,
}

impl CoordInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the canonical time coordinate data-equal to `offsets`,
    /// registering a new one if none exists.
    ///
    /// An empty input is not interned and yields `None`.
    pub fn intern_time(&mut self, offsets: &[f64]) -> Option<Arc<TimeCoord>> {
        if offsets.is_empty() {
            return None;
        }
        if let Some(i) = self.times.find(offsets) {
            return Some(Arc::clone(&self.times.entries[i]));
        }
        let id = TimeCoordId(self.times.next_id());
        Some(self.times.insert(TimeCoord::new(id, offsets.to_vec())))
    }

    /// Return the canonical vertical coordinate data-equal to `values`,
    /// registering a new one if none exists. When an equal coordinate is
    /// already registered, the caller's name and units are ignored.
    ///
    /// An empty input is not interned and yields `None`.
    pub fn intern_vert(
        &mut self,
        values: &[f64],
        name: &str,
        units: Option<&str>,
    ) -> Option<Arc<VertCoord>> {
        if values.is_empty() {
            return None;
        }
        if let Some(i) = self.verts.find(values) {
            return Some(Arc::clone(&self.verts.entries[i]));
        }
        let id = VertCoordId(self.verts.next_id());
        let vc = VertCoord::new(id, name, units.map(str::to_string), values.to_vec());
        Some(self.verts.insert(vc))
    }

    pub fn time_coord(&self, id: TimeCoordId) -> Option<&Arc<TimeCoord>> {
        self.times.entries.get(id.0 as usize)
    }

    pub fn vert_coord(&self, id: VertCoordId) -> Option<&Arc<VertCoord>> {
        self.verts.entries.get(id.0 as usize)
    }

    pub fn time_coords(&self) -> &[Arc<TimeCoord>] {
        &self.times.entries
    }

    pub fn vert_coords(&self) -> &[Arc<VertCoord>] {
        &self.verts.entries
    }

    pub(crate) fn into_parts(self) -> (Vec<Arc<TimeCoord>>, Vec<Arc<VertCoord>>) {
        (self.times.entries, self.verts.entries)
    }
}
