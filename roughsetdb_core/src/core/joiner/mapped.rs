use std::{collections::HashMap, sync::Arc};

use ahash::RandomState;
use log::debug;
use stopwatch::Stopwatch;

use crate::core::{
    descriptor::Condition,
    error::Result,
    multi_index::{MIIterator, MultiIndex, TuplePosition},
    types::{ColumnType, DimensionVector, Operator},
    vc::VirtualColumn,
};

use super::{side_index, JoinAlgType, JoinFailure, JoinOutput, JoinTips, SideTuples, TwoDimensionalJoiner};

/// One-to-many equality join over integer keys: every key of the traversed
/// (dimension) side must be unique, the matched side is scanned once.
pub struct JoinerMapped {
    tips: JoinTips,
    why_failed: JoinFailure,
    switched: bool,
}

struct KeyMap {
    rows: HashMap<i64, u32, RandomState>,
    min: i64,
    max: i64,
}

enum MapBuild {
    Built(KeyMap),
    DuplicateKey,
    TooManyRows,
}

impl JoinerMapped {
    pub fn new(tips: JoinTips) -> Self {
        Self {
            tips,
            why_failed: JoinFailure::NotFailed,
            switched: false,
        }
    }

    fn build_map(mind: &MultiIndex, side: &SideTuples, key: &Arc<VirtualColumn>) -> Result<MapBuild> {
        let mut map = KeyMap {
            rows: HashMap::with_capacity_and_hasher(side.len(), RandomState::new()),
            min: i64::MAX,
            max: i64::MIN,
        };
        let mut pos = TuplePosition::new(mind.num_of_dimensions(), mind.pack_power());
        for i in 0..side.len() {
            side.write(i, &mut pos);
            let Some(index) = side_index(i) else {
                return Ok(MapBuild::TooManyRows);
            };
            let Some(v) = key.value(&pos)?.as_i64() else {
                continue;
            };
            if map.rows.insert(v, index).is_some() {
                return Ok(MapBuild::DuplicateKey);
            }
            map.min = map.min.min(v);
            map.max = map.max.max(v);
        }
        Ok(MapBuild::Built(map))
    }
}

impl TwoDimensionalJoiner for JoinerMapped {
    fn execute_join_conditions(&mut self, mind: &mut MultiIndex, cond: &mut Condition) -> Result<()> {
        self.why_failed = JoinFailure::Fail1nTooHard;
        if cond.len() != 1 {
            return Ok(());
        }
        let d = &cond[0];
        if d.op != Operator::Eq || !d.is_type_join_simple() || d.is_outer() {
            return Ok(());
        }
        let (Some(a), Some(v)) = (d.attr.vc(), d.val1.vc()) else {
            return Ok(());
        };
        if a.column_type() != ColumnType::Int || v.column_type() != ColumnType::Int {
            return Ok(());
        }
        let no_dims = mind.num_of_dimensions();
        let mut traversed = d.attr.dims(no_dims);
        let mut matched = d.val1.dims(no_dims);
        mind.mark_involved_dim_groups(&mut traversed);
        mind.mark_involved_dim_groups(&mut matched);
        if traversed.intersects(&matched) {
            return Ok(());
        }
        let (mut key_t, mut key_m) = (Arc::clone(a), Arc::clone(v));

        let size_of = |side: &DimensionVector| mind.num_of_tuples_in(&mind.groups_for_dims(side));
        let mut switch = size_of(&matched) < size_of(&traversed);
        if self.switched {
            switch = !switch;
        }
        if switch {
            std::mem::swap(&mut traversed, &mut matched);
            std::mem::swap(&mut key_t, &mut key_m);
        }

        let sw = Stopwatch::start_new();
        let side = SideTuples::collect(mind, &traversed)?;
        let map = match Self::build_map(mind, &side, &key_t)? {
            MapBuild::Built(map) => map,
            MapBuild::DuplicateKey => {
                self.why_failed = if self.switched {
                    JoinFailure::Fail1nTooHard
                } else {
                    JoinFailure::FailWrongSides
                };
                debug!("Mapped join: keys of {} are not unique", key_t);
                return Ok(());
            }
            MapBuild::TooManyRows => {
                self.why_failed = JoinFailure::Fail1nTooHard;
                debug!("Mapped join: {} rows do not fit the key map", side.len());
                return Ok(());
            }
        };

        let mut all_dims = traversed.clone();
        all_dims.plus(&matched);
        let mut out = JoinOutput::new(mind, &all_dims, &self.tips);
        let mut omitted = 0u64;
        let mut it = MIIterator::new(mind, &matched);
        'scan: while it.is_valid() {
            if it.packrow_started() {
                mind.check_killed()?;
                let outside = it
                    .position()
                    .pack(key_m.dim().unwrap_or(usize::MAX))
                    .and_then(|p| key_m.pack_range(p))
                    .and_then(|(lo, hi)| Some((lo.as_i64()?, hi.as_i64()?)))
                    .is_some_and(|(lo, hi)| hi < map.min || lo > map.max);
                if outside || map.rows.is_empty() {
                    omitted += 1;
                    it.next_packrow();
                    continue;
                }
            }
            let mut pos = it.position().clone();
            if let Some(i) = key_m.value(&pos)?.as_i64().and_then(|v| map.rows.get(&v)) {
                side.write(*i as usize, &mut pos);
                if !out.push(&pos)? {
                    break 'scan;
                }
            }
            it.advance();
        }

        drop(it);
        let tuples = out.commit(mind)?;
        mind.update_num_of_tuples();
        cond[0].done = true;
        self.why_failed = JoinFailure::NotFailed;
        debug!(
            "Tuples after join {} 1: {} ({} packrows omitted, {} ms)",
            self.algorithm().tag(),
            tuples,
            omitted,
            sw.elapsed_ms()
        );
        Ok(())
    }

    fn why_failed(&self) -> JoinFailure {
        self.why_failed
    }

    fn algorithm(&self) -> JoinAlgType {
        JoinAlgType::Map
    }

    fn force_switching_sides(&mut self) {
        self.switched = !self.switched;
    }
}
