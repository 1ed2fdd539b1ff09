use std::sync::Arc;

use log::{debug, trace};
use stopwatch::Stopwatch;

use crate::{
    WEIGHT_DONE_OR_DELAYED,
    configuration::{self, Configuration},
    core::{
        descriptor::{Condition, Descriptor},
        error::Result,
        multi_index::MultiIndex,
        storage::TempTable,
        types::{DimensionVector, Operator},
    },
};

use super::{
    cost_model::{self, CostContext},
    rough_multi_index::RoughMultiIndex,
};

/// Turns a list of conditions into a filtered multi index.
///
/// Conditions are normalised, ordered by estimated cost, checked roughly on
/// pack statistics and then applied exactly: one dimension conditions first,
/// joins next and conditions waiting for outer join nulls last.
pub struct ParameterizedFilter {
    pub(super) mind: MultiIndex,
    pub(super) rough_mind: Option<RoughMultiIndex>,
    pub(super) table: Arc<TempTable>,
    pub(super) descriptors: Condition,
    pub(super) parametrized_desc: Condition,
    pub(super) config: Arc<Configuration>,
}

impl ParameterizedFilter {
    pub fn new(table: Arc<TempTable>) -> Self {
        Self::with_configuration(table, configuration::current())
    }

    /// `config.thread_pool_size` sets the pack range tasks per descriptor. The
    /// process wide worker pool caps it at its own permits.
    pub fn with_configuration(table: Arc<TempTable>, config: Arc<Configuration>) -> Self {
        let mut mind = MultiIndex::new(table.orig_sizes(), table.pack_power(), config.too_many_tuples());
        for dim in 0..table.num_tables() {
            mind.set_used_in_output(dim, table.is_used_in_output(dim));
        }
        Self::with_multi_index(table, mind, config)
    }

    /// Continues filtering an existing multi index, e.g. one left by a previous step.
    pub fn with_multi_index(table: Arc<TempTable>, mind: MultiIndex, config: Arc<Configuration>) -> Self {
        Self {
            mind,
            rough_mind: None,
            table,
            descriptors: Condition::new(),
            parametrized_desc: Condition::new(),
            config,
        }
    }

    #[inline]
    pub fn mind(&self) -> &MultiIndex {
        &self.mind
    }

    #[inline]
    pub fn mind_mut(&mut self) -> &mut MultiIndex {
        &mut self.mind
    }

    #[inline]
    pub fn rough_mind(&self) -> Option<&RoughMultiIndex> {
        self.rough_mind.as_ref()
    }

    pub fn into_multi_index(self) -> MultiIndex {
        self.mind
    }

    #[inline]
    pub fn table(&self) -> &Arc<TempTable> {
        &self.table
    }

    #[inline]
    pub fn get_conditions(&self) -> &Condition {
        &self.descriptors
    }

    #[inline]
    pub fn parametrized_conditions(&self) -> &Condition {
        &self.parametrized_desc
    }

    #[inline]
    pub(super) fn no_dims(&self) -> usize {
        self.mind.num_of_dimensions()
    }

    /// Adds the conditions of a WHERE or ON clause. Predicates implied by every
    /// branch of an OR tree are pulled out as separate conditions first;
    /// conditions waiting for parameter values are kept aside.
    pub fn add_conditions(&mut self, cond: Condition) -> Result<()> {
        for mut desc in cond {
            if desc.is_type_or_tree() {
                let mut hoisted = 0;
                while let Some(mut extracted) = desc.tree.as_mut().and_then(|t| t.extract_descriptor()) {
                    extracted.left_dims = desc.left_dims.clone();
                    extracted.right_dims = desc.right_dims.clone();
                    extracted.calculate_join_type();
                    extracted.coerce_column_types()?;
                    self.push_condition(extracted);
                    hoisted += 1;
                }
                if hoisted > 0 {
                    desc.simplify(false)?;
                    desc.calculate_join_type();
                    trace!("{} common predicates taken out of OR tree: {}", hoisted, desc);
                }
            }
            self.push_condition(desc);
        }
        Ok(())
    }

    fn push_condition(&mut self, desc: Descriptor) {
        if desc.is_parameterized() {
            self.parametrized_desc.add(desc);
        } else {
            self.descriptors.add(desc);
        }
    }

    /// Replaces the conditions by the parameterized ones, once their parameters are bound.
    pub fn process_parameters(&mut self) {
        self.descriptors.clear();
        for desc in std::mem::take(&mut self.parametrized_desc) {
            self.descriptors.add(desc);
        }
    }

    /// Applies every condition to the multi index.
    ///
    /// With `count_only` the last join may keep only a tuple count; `limit`
    /// stops the last step once that many tuples passed.
    pub fn update_multi_index(&mut self, count_only: bool, limit: Option<u64>) -> Result<()> {
        let sw = Stopwatch::start_new();
        let res = self.update_multi_index_impl(count_only, limit);
        trace!(
            "UpdateMultiIndex finished in {} ms, {} tuples",
            sw.elapsed_ms(),
            self.mind.num_of_tuples()
        );
        res
    }

    fn update_multi_index_impl(&mut self, count_only: bool, limit: Option<u64>) -> Result<()> {
        if self.descriptors.is_empty() {
            self.prepare_rough_multi_index();
            self.filter_deleted_for_select_all()?;
            self.clear_local_desc_filters();
            return Ok(());
        }

        for dim in 0..self.table.num_tables() {
            let filtered_here = self.descriptors.iter().any(|d| {
                !d.is_type_join() && d.attr.vc().and_then(|vc| vc.dim()) == Some(dim)
            });
            if !filtered_here {
                self.filter_deleted_by_table(dim)?;
            }
        }

        self.syntactical_descriptor_list_preprocessing(false)?;
        let empty_cannot_grow = !self.descriptors.iter().any(|d| d.is_outer());
        self.descriptor_list_ordering();
        self.log_plan("Initial execution plan (non-join):", |d| !d.is_type_join() && d.is_inner());

        if self.mind.zero_tuples() && empty_cannot_grow {
            return Ok(self.finish_empty());
        }

        for i in 0..self.descriptors.len() {
            let d = &mut self.descriptors[i];
            if d.done || !d.is_inner() {
                continue;
            }
            if d.is_true() {
                d.done = true;
            } else if d.is_false() {
                let Some(attr) = d.attr.vc().cloned() else {
                    continue;
                };
                d.done = true;
                if empty_cannot_grow {
                    return Ok(self.finish_empty());
                }
                let mut dims = DimensionVector::new(self.no_dims());
                attr.mark_used_dims(&mut dims);
                self.mind.mark_involved_dim_groups(&mut dims);
                self.mind.commit_count_only(&dims, 0)?;
            }
        }

        self.clear_local_desc_filters();
        self.prepare_rough_multi_index();
        let nonempty = self.rough_update_multi_index()?;
        if !nonempty && empty_cannot_grow {
            self.mind.empty();
            self.clear_local_desc_filters();
            return Ok(());
        }
        self.propagate_rough_to_mind();

        let (mut no_of_join_conditions, mut no_of_delayed_conditions) = (0usize, 0usize);
        for d in self.descriptors.iter().filter(|d| !d.done) {
            if d.is_type_join() || d.delayed || d.is_outer() || is_deferred_to_join(d) {
                if d.delayed {
                    no_of_delayed_conditions += 1;
                } else {
                    no_of_join_conditions += 1;
                }
            }
        }

        if self.apply_one_dim_descriptors(limit, no_of_join_conditions, no_of_delayed_conditions, empty_cannot_grow)? {
            return Ok(());
        }

        self.descriptor_join_ordering();
        self.log_plan("Join execution plan:", |d| d.is_type_join() || d.is_outer());

        let mut join_or_delayed_present = false;
        let mut i = 0;
        while i < self.descriptors.len() {
            if self.mind.zero_tuples() && empty_cannot_grow {
                self.descriptors.iter_mut().skip(i).for_each(|d| d.done = true);
                break;
            }
            if self.descriptors[i].done || self.descriptors[i].delayed {
                i += 1;
                continue;
            }
            let mut join_desc = self.prepare_joining_step(i);
            no_of_join_conditions = no_of_join_conditions.saturating_sub(join_desc.len());
            let mut tips = crate::core::joiner::JoinTips::new(&self.mind);

            if join_desc[0].is_outer() {
                no_of_delayed_conditions = no_of_delayed_conditions
                    .saturating_sub(self.fold_outer_null_checks(&join_desc[0], &mut tips));
            }

            let last_group = no_of_join_conditions == 0
                && no_of_delayed_conditions == 0
                && self.parametrized_desc.is_empty();
            if last_group {
                tips.count_only = count_only;
                tips.limit = limit;
                let dims_in_output = (0..self.no_dims()).filter(|d| self.mind.is_used_in_output(*d)).count();
                if let (Some(distinct_dim), 1) = (self.table.distinct_dim(), dims_in_output) {
                    if let Some(flag) = tips.distinct_only.get_mut(distinct_dim) {
                        *flag = true;
                    }
                }
            }

            if self.parametrized_desc.is_empty() {
                let mut dims_used = DimensionVector::new(self.no_dims());
                for d in self.descriptors.iter().filter(|d| !d.done) {
                    d.dimension_used(&mut dims_used);
                }
                for dim in 0..self.no_dims() {
                    if !self.mind.is_used_in_output(dim) && !dims_used.get(dim) {
                        tips.forget_now[dim] = true;
                    }
                }
            }

            self.update_join_condition(&mut join_desc, tips)?;
            i += 1;
        }

        for i in 0..self.descriptors.len() {
            if self.descriptors[i].done {
                continue;
            }
            debug!("Executing delayed Cnd({}): {}", i, self.descriptors[i]);
            let d = &mut self.descriptors[i];
            d.coerce_column_types()?;
            d.simplify(false)?;
            self.apply_descriptor(i, None)?;
            self.descriptors[i].delayed = false;
            join_or_delayed_present = true;
        }

        if join_or_delayed_present {
            if let Some(rough_mind) = self.rough_mind.as_mut() {
                rough_mind.make_dimension_suspect(None);
            }
        }
        self.mind.update_num_of_tuples();
        Ok(())
    }

    /// Applies the one dimension inner conditions in their cost order.
    /// Returns true if the result turned out empty and nothing is left to do.
    fn apply_one_dim_descriptors(
        &mut self,
        limit: Option<u64>,
        no_of_join_conditions: usize,
        no_of_delayed_conditions: usize,
        empty_cannot_grow: bool,
    ) -> Result<bool> {
        let candidates: Vec<usize> = (0..self.descriptors.len())
            .filter(|i| {
                let d = &self.descriptors[*i];
                !d.done && d.is_inner() && !d.is_type_join() && !d.delayed && !is_deferred_to_join(d)
            })
            .collect();
        let no_desc = candidates.len();
        let mut last_desc_dim = None;

        for (n, i) in candidates.into_iter().enumerate() {
            let cur_dim = self.descriptors[i].attr.vc().and_then(|vc| vc.dim());
            if let (Some(last), Some(cur)) = (last_desc_dim, cur_dim) {
                if last != cur {
                    self.rough_make_projections_to(cur, false);
                }
            }
            let last_one = n + 1 == no_desc && no_of_delayed_conditions == 0 && no_of_join_conditions == 0;
            self.apply_descriptor(i, if last_one { limit } else { None })?;
            if self.descriptors[i].attr.vc().is_none() {
                continue;
            }
            if let Some(dim) = cur_dim {
                let emptied = self.mind.get_filter(dim).is_some_and(|f| f.is_empty());
                if emptied && empty_cannot_grow {
                    self.mind.empty();
                    debug!("Empty result set after non-join condition evaluation (WHERE)");
                    self.clear_local_desc_filters();
                    return Ok(true);
                }
            }
            last_desc_dim = cur_dim;
        }

        if let Some(rough_mind) = self.rough_mind.as_mut() {
            rough_mind.update_reduced_dimensions();
        }
        self.mind.update_num_of_tuples();
        for dim in 0..self.no_dims() {
            if let Some(ones) = self.mind.get_filter(dim).map(|f| f.num_of_ones()) {
                self.set_vc_distinct_vals(dim, ones);
            }
        }
        self.clear_local_desc_filters();
        self.log_packrow_statistics();
        Ok(false)
    }

    /// A delayed `IS NULL` on the null padded side of the outer join about to run,
    /// over a column which holds no nulls, only keeps the unmatched rows: the join
    /// emits just those. Returns the number of delayed conditions consumed.
    fn fold_outer_null_checks(&mut self, join: &Descriptor, tips: &mut crate::core::joiner::JoinTips) -> usize {
        let mut consumed = 0;
        for d in self.descriptors.iter_mut() {
            if !d.delayed || d.done || d.op != Operator::IsNull {
                continue;
            }
            let Some(attr) = d.attr.vc() else {
                continue;
            };
            let on_outer_side = attr.dim().is_some_and(|dim| join.right_dims.get(dim));
            if !on_outer_side || attr.nulls_possible() || !attr.is_single_column() {
                continue;
            }
            for dim in join.right_dims.iter() {
                tips.null_only[dim] = true;
            }
            d.done = true;
            d.delayed = false;
            consumed += 1;
        }
        consumed
    }

    fn finish_empty(&mut self) {
        self.mind.empty();
        self.prepare_rough_multi_index();
        self.clear_local_desc_filters();
    }

    pub(super) fn clear_local_desc_filters(&mut self) {
        if let Some(rough_mind) = self.rough_mind.as_mut() {
            rough_mind.clear_local_desc_filters();
        }
    }

    pub(super) fn cost_context(&self) -> CostContext<'_> {
        CostContext {
            index_search: self.config.index_search(),
            no_tables: self.table.num_tables(),
            ..CostContext::new(&self.mind, self.rough_mind.as_ref())
        }
    }

    /// Computes the weight of every descriptor and moves cheaper inner ones forward.
    pub fn descriptor_list_ordering(&mut self) {
        if self.descriptors.len() > 1 || self.descriptors.iter().next().is_some_and(|d| d.is_type_or_tree()) {
            let mut descriptors = std::mem::take(&mut self.descriptors);
            {
                let ctx = self.cost_context();
                for d in descriptors.iter_mut() {
                    d.evaluation = if d.done || d.delayed {
                        WEIGHT_DONE_OR_DELAYED
                    } else {
                        cost_model::non_join_weight(d, &ctx, false)
                    };
                }
            }
            self.descriptors = descriptors;
        }
        bubble_sort(self.descriptors.as_mut_vec(), |a, b| {
            a.evaluation > b.evaluation && a.is_inner() && b.is_inner()
        });
    }

    fn log_plan(&self, title: &str, shown: impl Fn(&Descriptor) -> bool) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        let mut first = true;
        for (i, d) in self.descriptors.iter().enumerate() {
            if d.done || !shown(d) {
                continue;
            }
            if first {
                debug!("{}", title);
                first = false;
            }
            let weight = (d.evaluation * 100.0).trunc() / 100.0;
            if d.delayed {
                debug!("Delayed: {} \t({})", d, weight);
            } else {
                debug!("Cnd({}):  {} \t({})", i, d, weight);
            }
        }
    }

    fn log_packrow_statistics(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        debug!("Packrows after exact evaluation (execute WHERE end):");
        for dim in 0..self.no_dims() {
            let Some(f) = self.mind.get_filter(dim) else {
                continue;
            };
            let pack_all = f.num_of_packs();
            let pack_full = (0..pack_all).filter(|p| f.is_full(*p)).count();
            let pack_some = (0..pack_all).filter(|p| !f.is_full(*p) && !f.is_empty_pack(*p)).count();
            debug!(
                "(t{}): {} all packrows, {} to open (including {} full)",
                dim,
                pack_all,
                pack_full + pack_some,
                pack_full
            );
        }
    }
}

/// `IN`/`NOT IN` over a subquery and `[NOT] EXISTS` run with the joins.
pub(super) fn is_deferred_to_join(d: &Descriptor) -> bool {
    matches!(d.op, Operator::Exists | Operator::NotExists)
        || (matches!(d.op, Operator::In | Operator::NotIn) && d.val1.vc().is_some_and(|vc| vc.is_subselect()))
}

/// Stable pass-wise swap of neighbours for which `swap(a, b)` holds.
pub(super) fn bubble_sort(items: &mut [Descriptor], swap: impl Fn(&Descriptor, &Descriptor) -> bool) {
    let n = items.len();
    for _ in 0..n {
        for i in 0..n.saturating_sub(1) {
            if swap(&items[i], &items[i + 1]) {
                items.swap(i, i + 1);
            }
        }
    }
}
