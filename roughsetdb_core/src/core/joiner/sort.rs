use std::{cmp::Ordering, sync::Arc};

use log::debug;
use stopwatch::Stopwatch;

use crate::core::{
    descriptor::{Condition, Descriptor},
    error::Result,
    multi_index::{MIIterator, MultiIndex, TuplePosition},
    types::{DimensionVector, Operator, TypedValue},
    vc::VirtualColumn,
};

use super::{check_all, side_index, JoinAlgType, JoinFailure, JoinOutput, JoinTips, SideTuples, TwoDimensionalJoiner};

/// Inequality join: one side is sorted by its key, every tuple of the other
/// side takes the matching prefix or suffix found by binary search.
pub struct JoinerSort {
    tips: JoinTips,
    why_failed: JoinFailure,
}

impl JoinerSort {
    pub fn new(tips: JoinTips) -> Self {
        Self {
            tips,
            why_failed: JoinFailure::NotFailed,
        }
    }

    #[inline]
    fn order(a: &TypedValue, b: &TypedValue) -> Ordering {
        a.sql_cmp(b).unwrap_or(Ordering::Equal)
    }

    /// Indexes into `sorted` (ascending) of the values `v` with `key op v`.
    fn matching_range(sorted: &[(TypedValue, u32)], key: &TypedValue, op: Operator) -> std::ops::Range<usize> {
        let below = |strict: bool| {
            sorted.partition_point(|(v, _)| match Self::order(v, key) {
                Ordering::Less => true,
                Ordering::Equal => !strict,
                Ordering::Greater => false,
            })
        };
        match op {
            // key < v
            Operator::Less => below(false)..sorted.len(),
            Operator::LessEq => below(true)..sorted.len(),
            // key > v
            Operator::More => 0..below(true),
            Operator::MoreEq => 0..below(false),
            _ => 0..0,
        }
    }
}

impl TwoDimensionalJoiner for JoinerSort {
    fn execute_join_conditions(&mut self, mind: &mut MultiIndex, cond: &mut Condition) -> Result<()> {
        self.why_failed = JoinFailure::FailComplex;
        let no_dims = mind.num_of_dimensions();
        let Some(first) = cond.iter().next() else {
            return Ok(());
        };
        if !first.is_type_join_simple()
            || cond.iter().any(|d| d.is_outer())
            || !first.collation.is_binary()
            || !matches!(first.op, Operator::Less | Operator::LessEq | Operator::More | Operator::MoreEq)
        {
            return Ok(());
        }
        let (Some(a), Some(v)) = (first.attr.vc(), first.val1.vc()) else {
            return Ok(());
        };
        if a.column_type().is_numeric() != v.column_type().is_numeric() {
            return Ok(());
        }
        let (key_a, key_v): (Arc<VirtualColumn>, Arc<VirtualColumn>) = (Arc::clone(a), Arc::clone(v));
        let op = first.op;
        let mut side_a = first.attr.dims(no_dims);
        let mut side_v = first.val1.dims(no_dims);
        mind.mark_involved_dim_groups(&mut side_a);
        mind.mark_involved_dim_groups(&mut side_v);
        if side_a.intersects(&side_v) {
            return Ok(());
        }
        let mut all_dims: DimensionVector = side_a.clone();
        all_dims.plus(&side_v);
        if cond.iter().any(|d| !all_dims.includes(&d.used_dims())) {
            return Ok(());
        }
        let others: Vec<&Descriptor> = cond.iter().skip(1).collect();

        let sw = Stopwatch::start_new();
        let sorted_side = SideTuples::collect(mind, &side_v)?;
        let mut pos = TuplePosition::new(no_dims, mind.pack_power());
        let mut sorted = Vec::with_capacity(sorted_side.len());
        for i in 0..sorted_side.len() {
            sorted_side.write(i, &mut pos);
            let Some(index) = side_index(i) else {
                self.why_failed = JoinFailure::FailSorterTooWide;
                return Ok(());
            };
            let value = key_v.value(&pos)?;
            if !value.is_null() {
                sorted.push((value, index));
            }
        }
        sorted.sort_by(|x, y| Self::order(&x.0, &y.0));

        let mut out = JoinOutput::new(mind, &all_dims, &self.tips);
        let mut it = MIIterator::new(mind, &side_a);
        'outer: while it.is_valid() {
            if it.packrow_started() {
                mind.check_killed()?;
            }
            let mut pos = it.position().clone();
            let key = key_a.value(&pos)?;
            if !key.is_null() {
                for (_, i) in &sorted[Self::matching_range(&sorted, &key, op)] {
                    sorted_side.write(*i as usize, &mut pos);
                    if check_all(others.iter().copied(), &pos)? && !out.push(&pos)? {
                        break 'outer;
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
            "Tuples after join {} {}: {} ({} ms)",
            self.algorithm().tag(),
            cond.len(),
            tuples,
            sw.elapsed_ms()
        );
        Ok(())
    }

    fn why_failed(&self) -> JoinFailure {
        self.why_failed
    }

    fn algorithm(&self) -> JoinAlgType {
        JoinAlgType::Sort
    }
}
