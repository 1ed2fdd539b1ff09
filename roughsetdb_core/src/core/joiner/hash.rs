use std::{collections::HashMap, sync::Arc};

use ahash::RandomState;
use log::debug;
use smallvec::SmallVec;
use stopwatch::Stopwatch;

use crate::core::{
    descriptor::{Condition, Descriptor},
    error::Result,
    multi_index::{MIIterator, MultiIndex, TuplePosition},
    types::{ColumnType, DimensionVector, Operator, ValueKey},
    vc::VirtualColumn,
};

use super::{check_all, side_index, JoinAlgType, JoinFailure, JoinOutput, JoinTips, SideTuples, TwoDimensionalJoiner};

type JoinKey = SmallVec<[ValueKey; 2]>;

/// Average bucket length above which building on the other side is tried first.
const MAX_AVERAGE_CONFLICTS: usize = 64;

/// Equality columns of one side of the join, ordered like the other side's.
struct KeyColumns {
    build: Vec<Arc<VirtualColumn>>,
    probe: Vec<Arc<VirtualColumn>>,
}

impl KeyColumns {
    fn key(columns: &[Arc<VirtualColumn>], pos: &TuplePosition) -> Result<Option<JoinKey>> {
        let mut key = JoinKey::with_capacity(columns.len());
        for vc in columns {
            match ValueKey::from_value(&vc.value(pos)?) {
                Some(k) => key.push(k),
                None => return Ok(None),
            }
        }
        Ok(Some(key))
    }
}

/// Equality join through a hash table built on the smaller side.
pub struct JoinerHash {
    tips: JoinTips,
    why_failed: JoinFailure,
    switched: bool,
}

impl JoinerHash {
    pub fn new(tips: JoinTips) -> Self {
        Self {
            tips,
            why_failed: JoinFailure::NotFailed,
            switched: false,
        }
    }

    fn comparable(a: ColumnType, b: ColumnType) -> bool {
        (a.is_numeric() && b.is_numeric()) || (!a.is_numeric() && !b.is_numeric())
    }

    /// Key pair of a condition usable as a hash key, oriented as (side1, side2).
    fn key_pair(
        d: &Descriptor,
        side1: &DimensionVector,
        side2: &DimensionVector,
        no_dims: usize,
    ) -> Option<(Arc<VirtualColumn>, Arc<VirtualColumn>)> {
        if d.op != Operator::Eq || !d.is_type_join_simple() || !d.is_inner() || !d.collation.is_binary() {
            return None;
        }
        let (a, v) = (d.attr.vc()?, d.val1.vc()?);
        if !Self::comparable(a.column_type(), v.column_type()) {
            return None;
        }
        let (da, dv) = (d.attr.dims(no_dims), d.val1.dims(no_dims));
        if side1.includes(&da) && side2.includes(&dv) {
            Some((Arc::clone(a), Arc::clone(v)))
        } else if side2.includes(&da) && side1.includes(&dv) {
            Some((Arc::clone(v), Arc::clone(a)))
        } else {
            None
        }
    }
}

impl TwoDimensionalJoiner for JoinerHash {
    fn execute_join_conditions(&mut self, mind: &mut MultiIndex, cond: &mut Condition) -> Result<()> {
        self.why_failed = JoinFailure::FailComplex;
        let no_dims = mind.num_of_dimensions();
        let Some(first) = cond.iter().next() else {
            return Ok(());
        };
        if cond.iter().any(|d| d.is_outer()) {
            return Ok(());
        }
        let mut side1 = first.attr.dims(no_dims);
        let mut side2 = first.val1.dims(no_dims);
        mind.mark_involved_dim_groups(&mut side1);
        mind.mark_involved_dim_groups(&mut side2);
        if side1.is_empty() || side2.is_empty() || side1.intersects(&side2) {
            return Ok(());
        }
        let mut all_dims = side1.clone();
        all_dims.plus(&side2);

        let mut keys1 = Vec::new();
        let mut keys2 = Vec::new();
        let mut others: Vec<&Descriptor> = Vec::new();
        for d in cond.iter() {
            if !all_dims.includes(&d.used_dims()) {
                return Ok(());
            }
            match Self::key_pair(d, &side1, &side2, no_dims) {
                Some((k1, k2)) => {
                    keys1.push(k1);
                    keys2.push(k2);
                }
                None => others.push(d),
            }
        }
        if keys1.is_empty() {
            return Ok(());
        }

        let size_of = |side: &DimensionVector| mind.num_of_tuples_in(&mind.groups_for_dims(side));
        let mut build_first = size_of(&side1) <= size_of(&side2);
        if self.switched {
            build_first = !build_first;
        }
        let (build_dims, probe_dims, keys) = if build_first {
            (&side1, &side2, KeyColumns { build: keys1, probe: keys2 })
        } else {
            (&side2, &side1, KeyColumns { build: keys2, probe: keys1 })
        };

        let sw = Stopwatch::start_new();
        let build = SideTuples::collect(mind, build_dims)?;
        let mut table: HashMap<JoinKey, Vec<u32>, RandomState> =
            HashMap::with_capacity_and_hasher(build.len(), RandomState::new());
        let mut pos = TuplePosition::new(no_dims, mind.pack_power());
        for i in 0..build.len() {
            build.write(i, &mut pos);
            let Some(index) = side_index(i) else {
                self.why_failed = JoinFailure::FailHash;
                return Ok(());
            };
            if let Some(key) = KeyColumns::key(&keys.build, &pos)? {
                table.entry(key).or_default().push(index);
            }
        }
        if !self.switched && !table.is_empty() && build.len() / table.len() > MAX_AVERAGE_CONFLICTS {
            self.why_failed = JoinFailure::FailWrongSides;
            return Ok(());
        }

        let mut out = JoinOutput::new(mind, &all_dims, &self.tips);
        let mut it = MIIterator::new(mind, probe_dims);
        'probe: while it.is_valid() {
            if it.packrow_started() {
                mind.check_killed()?;
            }
            let mut pos = it.position().clone();
            if let Some(matches) = KeyColumns::key(&keys.probe, &pos)?.and_then(|k| table.get(&k)) {
                for i in matches {
                    build.write(*i as usize, &mut pos);
                    if check_all(others.iter().copied(), &pos)? && !out.push(&pos)? {
                        break 'probe;
                    }
                }
            }
            it.advance();
        }

        drop(it);
        let tuples = out.commit(mind)?;
        mind.update_num_of_tuples();
        cond.iter_mut().for_each(|d| d.done = true);
        self.why_failed = JoinFailure::NotFailed;
        debug!(
            "Tuples after join {} {}: {} ({} keys, {} ms)",
            self.algorithm().tag(),
            cond.len(),
            tuples,
            table.len(),
            sw.elapsed_ms()
        );
        Ok(())
    }

    fn why_failed(&self) -> JoinFailure {
        self.why_failed
    }

    fn algorithm(&self) -> JoinAlgType {
        JoinAlgType::Hash
    }

    fn force_switching_sides(&mut self) {
        self.switched = !self.switched;
    }
}
