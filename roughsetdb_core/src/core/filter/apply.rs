use std::sync::Arc;

use log::{debug, trace};
use stopwatch::Stopwatch;

use crate::core::{
    descriptor::Descriptor,
    error::{FilterError, Result},
    multi_index::{CancellationFlag, DimensionGroup, MIUpdatingIterator, TuplePosition},
    types::{DimensionVector, Operator, RoughSetValue},
};

use super::parameterized_filter::ParameterizedFilter;
#[cfg(feature = "enable_parallelism")]
use super::worker_pool::WorkerPool;

/// Exact pass over the packs left in `it`.
///
/// `rf` holds the rough verdicts of the packs of a single filtered dimension:
/// `NONE` packs are dropped, `ALL` packs kept untouched. With a `limit` the
/// remaining packs are dropped once that many rows passed.
pub(super) fn process_packs(
    desc: &mut Descriptor,
    it: &mut MIUpdatingIterator,
    rf: Option<&[RoughSetValue]>,
    limit: Option<u64>,
    cancel: &CancellationFlag,
) -> Result<()> {
    let mut passed = 0u64;
    let mut prev_pack = None;
    while it.is_valid() {
        let pack = it.current_pack();
        if let (Some(limit), Some(_)) = (limit, rf) {
            if passed >= limit {
                it.reset_current_pack();
                it.next_packrow();
                continue;
            }
            if it.packrow_started() {
                if let Some(prev) = prev_pack {
                    passed += it.ones_in_pack(prev);
                }
                prev_pack = Some(pack);
            }
        }

        let rough = rf.and_then(|r| r.get(pack)).copied().unwrap_or(RoughSetValue::Some);
        match rough {
            RoughSetValue::None => {
                it.reset_current_pack();
                it.next_packrow();
            }
            RoughSetValue::All => it.next_packrow(),
            _ => desc.evaluate_pack(it)?,
        }
        cancel.check()?;
    }
    Ok(())
}

/// Tasks per descriptor: the filter's setting, capped by the permits of the pool running them.
#[inline]
pub(super) fn task_pool_size(configured: usize, pool_permits: usize) -> usize {
    configured.min(pool_permits)
}

/// Splits `packs_no` packs into consecutive inclusive ranges, one per task.
/// The first task also takes the remainder.
pub(super) fn partition_packs(packs_no: usize, pack_some: usize, poolsize: usize) -> Vec<(usize, usize)> {
    if packs_no == 0 || poolsize == 0 {
        return Vec::new();
    }
    let task_num = if pack_some <= poolsize {
        poolsize
    } else {
        packs_no / (pack_some / poolsize)
    }
    .clamp(1, packs_no);
    let rem = packs_no % task_num;
    let num = packs_no / task_num;
    (0..task_num)
        .map(|i| {
            let start = if i == 0 { 0 } else { rem + i * num };
            (start, rem + (i + 1) * num - 1)
        })
        .collect()
}

impl ParameterizedFilter {
    /// Exact evaluation of descriptor `desc_number`, removing the failing tuples.
    pub(super) fn apply_descriptor(&mut self, desc_number: usize, limit: Option<u64>) -> Result<()> {
        match self.descriptors[desc_number].op {
            Operator::True => {
                self.descriptors[desc_number].done = true;
                return Ok(());
            }
            Operator::False => {
                self.mind.empty();
                self.descriptors[desc_number].done = true;
                return Ok(());
            }
            _ => {}
        }

        let sw = Stopwatch::start_new();
        let mut dims = self.descriptors[desc_number].used_dims();
        self.mind.mark_involved_dim_groups(&mut dims);
        let no_dims_used = dims.no_one();
        if no_dims_used == 0 {
            if self.descriptors[desc_number].is_deterministic() {
                return self.apply_constant_descriptor(desc_number);
            }
            dims.set_all();
        }
        if self.mind.groups_for_dims(&dims).len() > 1 {
            self.mind.merge_groups_cross(&dims)?;
        }

        let one_dim = match (no_dims_used, dims.get_one()) {
            (1, Some(dim)) if self.mind.get_filter(dim).is_some() => Some(dim),
            _ => None,
        };
        let rf: Option<Arc<[RoughSetValue]>> = match (one_dim, self.rough_mind.as_mut()) {
            (Some(dim), Some(rough_mind)) => Some(Arc::from(rough_mind.local_desc_filter(dim, desc_number).to_vec())),
            _ => None,
        };

        let on_index = match one_dim {
            Some(dim) => self.evaluate_on_index(desc_number, dim, limit)?,
            None => false,
        };
        if on_index {
            debug!("EvaluateOnIndex done, desc number {}", desc_number);
        } else if !self.apply_in_parallel(desc_number, one_dim, rf.clone(), limit)? {
            let mut it = MIUpdatingIterator::new(&self.mind, &dims)?;
            let cancel = self.mind.cancellation().clone();
            process_packs(&mut self.descriptors[desc_number], &mut it, rf.as_deref(), limit, &cancel)?;
            it.commit(&mut self.mind)?;
        }

        self.descriptors[desc_number].done = true;
        if let (Some(dim), Some(rough_mind)) = (one_dim, self.rough_mind.as_mut()) {
            rough_mind.update_global_from_filter(dim, self.mind.get_filter(dim));
        }
        self.descriptors[desc_number].update_vc_statistics();
        trace!("Cnd({}) applied in {} ms", desc_number, sw.elapsed_ms());
        Ok(())
    }

    /// A deterministic descriptor without columns holds for all tuples or for none.
    fn apply_constant_descriptor(&mut self, desc_number: usize) -> Result<()> {
        let pos = TuplePosition::new(self.no_dims(), self.mind.pack_power());
        if !self.descriptors[desc_number].check_condition(&pos)? {
            self.mind.empty();
        }
        self.descriptors[desc_number].done = true;
        Ok(())
    }

    /// Answers the descriptor from the primary key index of the only table.
    /// Returns false if the descriptor is not index searchable.
    fn evaluate_on_index(&mut self, desc_number: usize, dim: usize, limit: Option<u64>) -> Result<bool> {
        let desc = &self.descriptors[desc_number];
        if !desc.is_left_index_search(self.config.index_search(), self.table.num_tables()) {
            return Ok(false);
        }
        let Some(single) = desc.attr.vc().and_then(|vc| vc.as_single()) else {
            return Ok(false);
        };
        let ranges = match single.index_lookup(desc) {
            Ok(ranges) => ranges,
            Err(FilterError::Unsupported(reason)) => {
                trace!("index search skipped: {}", reason);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };
        let table = Arc::clone(single.table());

        let filter = self
            .mind
            .get_filter_mut(dim)
            .ok_or_else(|| FilterError::Internal(format!("dimension {} has no filter", dim)))?;
        let mut passed = 0u64;
        let rows: Vec<u64> = filter.rows().collect();
        for row in rows {
            let keep = ranges.iter().any(|r| r.contains(row))
                && !table.is_deleted(row)
                && limit.is_none_or(|l| passed < l);
            if keep {
                passed += 1;
            } else {
                filter.reset(row);
            }
        }
        self.mind.update_num_of_tuples();
        Ok(true)
    }

    /// Evaluates the packs of `one_dim` in disjoint ranges on the worker pool.
    /// Returns false when the descriptor has to run sequentially.
    #[cfg(feature = "enable_parallelism")]
    fn apply_in_parallel(
        &mut self,
        desc_number: usize,
        one_dim: Option<usize>,
        rf: Option<Arc<[RoughSetValue]>>,
        limit: Option<u64>,
    ) -> Result<bool> {
        let Some(dim) = one_dim else {
            return Ok(false);
        };
        if limit.is_some() || self.descriptors[desc_number].is_type_subquery() {
            return Ok(false);
        }
        let Some(pool) = WorkerPool::shared() else {
            return Ok(false);
        };
        let poolsize = task_pool_size(self.config.thread_pool_size(), pool.size());
        let packs_no = self.mind.num_of_packs(dim);
        if poolsize == 0 || packs_no / poolsize == 0 {
            return Ok(false);
        }

        let pack_some = match self.rough_mind.as_ref() {
            Some(rough_mind) => rough_mind.nonempty_packs(dim),
            None => packs_no,
        };
        let ranges = partition_packs(packs_no, pack_some, poolsize);
        trace!("Cnd({}) split into {} pack range tasks", desc_number, ranges.len());

        let cancel = self.mind.cancellation().clone();
        let mut jobs = Vec::with_capacity(ranges.len());
        for (from, to) in ranges {
            let mut it = MIUpdatingIterator::for_pack_range(&self.mind, dim, from, to)?;
            let mut desc = self.descriptors[desc_number].clone();
            let rf = rf.clone();
            let cancel = cancel.clone();
            jobs.push(move || -> Result<(MIUpdatingIterator, Descriptor)> {
                process_packs(&mut desc, &mut it, rf.as_deref(), None, &cancel)?;
                Ok((it, desc))
            });
        }

        let results = pool.run_all(jobs)?;
        self.mind.check_killed()?;
        let desc = &mut self.descriptors[desc_number];
        for (it, task_desc) in results {
            if task_desc.rv != RoughSetValue::Unknown {
                desc.rv.accumulate(task_desc.rv);
            }
            it.commit(&mut self.mind)?;
        }
        Ok(true)
    }

    #[cfg(not(feature = "enable_parallelism"))]
    fn apply_in_parallel(
        &mut self,
        _desc_number: usize,
        _one_dim: Option<usize>,
        _rf: Option<Arc<[RoughSetValue]>>,
        _limit: Option<u64>,
    ) -> Result<bool> {
        Ok(false)
    }

    /// Drops the deleted rows of the table behind `dim`.
    pub(super) fn filter_deleted_by_table(&mut self, dim: usize) -> Result<()> {
        let table = Arc::clone(self.table.table(dim));
        if !table.has_deleted_rows() {
            return Ok(());
        }
        if matches!(self.mind.group_for(dim), Some(DimensionGroup::Counted { .. }) | None) {
            return Ok(());
        }
        trace!(
            "Filtering deleted rows of {} by {}",
            table.name(),
            table.liveness_column().name()
        );

        let mut dims = DimensionVector::with_dims(self.no_dims(), &[dim]);
        self.mind.mark_involved_dim_groups(&mut dims);
        let mut it = MIUpdatingIterator::new(&self.mind, &dims)?;
        let by_pack = it.single_filter_dim() == Some(dim);
        while it.is_valid() {
            if it.packrow_started() {
                self.mind.check_killed()?;
                if by_pack && table.deleted_in_pack(it.current_pack()) == 0 {
                    it.next_packrow();
                    continue;
                }
            }
            if it.position().row(dim).is_some_and(|row| table.is_deleted(row)) {
                it.reset_current();
            }
            it.advance();
        }
        it.commit(&mut self.mind)
    }

    pub(super) fn filter_deleted_for_select_all(&mut self) -> Result<()> {
        for dim in 0..self.no_dims() {
            self.filter_deleted_by_table(dim)?;
        }
        self.mind.update_num_of_tuples();
        Ok(())
    }

    /// No column of `dim` holds more distinct values than `ones` rows are left.
    pub(super) fn set_vc_distinct_vals(&self, dim: usize, ones: u64) {
        for d in self.descriptors.iter() {
            for term in [&d.attr, &d.val1, &d.val2] {
                if let Some(vc) = term.vc().filter(|vc| vc.is_single_column() && vc.dim() == Some(dim)) {
                    vc.statistics().set_distinct(ones);
                }
            }
        }
    }
}
