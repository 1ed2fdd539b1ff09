use log::debug;
use stopwatch::Stopwatch;

use crate::core::{
    descriptor::Condition,
    error::Result,
    multi_index::{MIIterator, MultiIndex},
    types::{DimensionVector, RoughSetValue},
    vc::PackLockGuard,
};

use super::{
    check_all, source_columns, JoinAlgType, JoinFailure, JoinOutput, JoinTips, SideTuples,
    TwoDimensionalJoiner,
};

/// Nested loop over the cross product of the involved groups. Handles every
/// condition shape, including outer joins.
pub struct JoinerGeneral {
    tips: JoinTips,
    why_failed: JoinFailure,
}

impl JoinerGeneral {
    pub fn new(tips: JoinTips) -> Self {
        Self {
            tips,
            why_failed: JoinFailure::NotFailed,
        }
    }

    fn inner_loop(&self, mind: &MultiIndex, cond: &Condition, out: &mut JoinOutput, all_dims: &DimensionVector) -> Result<()> {
        let sources = source_columns(cond.iter());
        let mut locks: Vec<PackLockGuard<'_>> = Vec::with_capacity(sources.len());
        let mut packrows = 0u64;
        let mut omitted = 0u64;
        let mut rough_cond = cond.as_slice().to_vec();

        let mut it = MIIterator::new(mind, all_dims);
        while it.is_valid() {
            if it.packrow_started() {
                mind.check_killed()?;
                packrows += 1;
                let pos = it.position();
                let omit = rough_cond
                    .iter_mut()
                    .any(|d| d.evaluate_roughly_pack(pos) == RoughSetValue::None);
                if omit {
                    omitted += 1;
                    it.next_packrow();
                    continue;
                }
                locks.clear();
                locks.extend(sources.iter().map(|vc| vc.lock_source_packs(pos)));
            }
            let pos = it.position();
            if check_all(cond.iter(), pos)? && !out.push(pos)? {
                break;
            }
            it.advance();
        }
        if packrows > 0 && omitted > 0 {
            debug!(
                "Roughly omitted {:.1}% packrows.",
                omitted as f64 * 100.0 / packrows as f64
            );
        }
        Ok(())
    }

    fn outer_loop(
        &self,
        mind: &MultiIndex,
        cond: &Condition,
        out: &mut JoinOutput,
        inner_dims: &DimensionVector,
        outer_dims: &DimensionVector,
    ) -> Result<()> {
        let nulls_only = outer_dims.iter().all(|d| self.tips.is_null_only(d));
        let outer = SideTuples::collect(mind, outer_dims)?;
        let sources = source_columns(cond.iter());
        let mut locks: Vec<PackLockGuard<'_>> = Vec::with_capacity(sources.len());

        let mut it = MIIterator::new(mind, inner_dims);
        'tuples: while it.is_valid() {
            if it.packrow_started() {
                mind.check_killed()?;
            }
            let mut pos = it.position().clone();
            let mut matched = false;
            for i in 0..outer.len() {
                outer.write(i, &mut pos);
                locks.clear();
                locks.extend(sources.iter().map(|vc| vc.lock_source_packs(&pos)));
                if check_all(cond.iter(), &pos)? {
                    matched = true;
                    if nulls_only {
                        break;
                    }
                    if !out.push(&pos)? {
                        break 'tuples;
                    }
                }
            }
            if !matched && !out.push_with_nulls(&pos, outer_dims)? {
                break;
            }
            it.advance();
        }
        Ok(())
    }
}

impl TwoDimensionalJoiner for JoinerGeneral {
    fn execute_join_conditions(&mut self, mind: &mut MultiIndex, cond: &mut Condition) -> Result<()> {
        self.why_failed = JoinFailure::NotFailed;
        if cond.iter().all(|d| d.is_true()) {
            cond.iter_mut().for_each(|d| d.done = true);
            return Ok(());
        }
        let sw = Stopwatch::start_new();
        let no_dims = mind.num_of_dimensions();
        let mut all_dims = DimensionVector::new(no_dims);
        for d in cond.iter() {
            d.dimension_used(&mut all_dims);
            all_dims.plus(&d.left_dims);
            all_dims.plus(&d.right_dims);
        }
        mind.mark_involved_dim_groups(&mut all_dims);

        let outer = cond.iter().next().is_some_and(|d| d.is_outer());
        let mut out = JoinOutput::new(mind, &all_dims, &self.tips);
        if outer {
            let mut outer_dims = cond[0].right_dims.clone();
            mind.mark_involved_dim_groups(&mut outer_dims);
            let mut inner_dims = all_dims.clone();
            inner_dims.minus(&outer_dims);
            self.outer_loop(mind, cond, &mut out, &inner_dims, &outer_dims)?;
        } else if !cond.iter().any(|d| d.is_false()) {
            self.inner_loop(mind, cond, &mut out, &all_dims)?;
        }

        let tuples = out.commit(mind)?;
        mind.update_num_of_tuples();
        cond.iter_mut().for_each(|d| d.done = true);
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
        JoinAlgType::General
    }
}
