use log::debug;

use crate::core::{
    descriptor::{Condition, DescriptorJoinType},
    error::Result,
    multi_index::{MIIterator, TuplePosition},
    types::{DimensionVector, RoughSetValue},
};

use super::{
    pack_orderer::{OrderType, PackOrderer},
    parameterized_filter::ParameterizedFilter,
    rough_multi_index::RoughMultiIndex,
};

impl ParameterizedFilter {
    /// Creates the rough multi index from the current filters, unless one exists.
    pub(super) fn prepare_rough_multi_index(&mut self) {
        if self.rough_mind.is_some() {
            return;
        }
        let packs = (0..self.no_dims()).map(|d| self.mind.num_of_packs(d)).collect();
        let mut rough_mind = RoughMultiIndex::new(packs);
        for dim in 0..self.no_dims() {
            let Some(f) = self.mind.get_filter(dim) else {
                continue;
            };
            for p in 0..rough_mind.num_of_packs(dim) {
                let status = if f.is_full(p) {
                    RoughSetValue::All
                } else if f.is_empty_pack(p) {
                    RoughSetValue::None
                } else {
                    RoughSetValue::Some
                };
                rough_mind.set_pack_status(dim, p, status);
            }
        }
        self.rough_mind = Some(rough_mind);
    }

    /// Rough evaluation of every one dimension inner condition on pack statistics.
    /// Returns false if some dimension has no pack left.
    pub(super) fn rough_update_multi_index(&mut self) -> Result<bool> {
        self.prepare_rough_multi_index();
        let no_dims = self.no_dims();
        let pack_power = self.mind.pack_power();
        let mut is_nonempty = true;

        if let Some(rough_mind) = self.rough_mind.as_mut() {
            let mut false_desc = false;
            for d in self.descriptors.iter_mut() {
                if !d.done && d.is_inner() && d.is_true() {
                    d.done = true;
                }
                if d.is_false() && d.is_inner() {
                    rough_mind.make_dimension_empty(None);
                    false_desc = true;
                }
            }

            if !false_desc {
                for dim in 0..no_dims {
                    rough_mind.update_global_from_filter(dim, self.mind.get_filter(dim));
                }
                for i in 0..self.descriptors.len() {
                    let d = &mut self.descriptors[i];
                    if d.done || d.delayed || !d.is_inner() || d.desc_t != DescriptorJoinType::NonJoin {
                        continue;
                    }
                    let used = d.used_dims();
                    let Some(dim) = used.get_one().filter(|_| used.no_one() == 1) else {
                        continue;
                    };
                    d.clear_rough_values();
                    let rf = rough_mind.local_desc_filter(dim, i);
                    let mut pos = TuplePosition::new(no_dims, pack_power);
                    for p in 0..rf.len() {
                        if rf[p] == RoughSetValue::None {
                            continue;
                        }
                        pos.set_pack(dim, p);
                        rf[p] = d.evaluate_roughly_pack(&pos);
                    }
                    self.mind.check_killed()?;

                    is_nonempty &= rough_mind.update_global_rough_filter(dim, i);
                    d.update_vc_statistics();
                    d.simplify_after_rough_accumulate()?;
                }
            }
        }

        if self.dims_with_1dim_filters() {
            self.rough_make_projections();
        }
        self.log_rough_statistics();
        Ok(is_nonempty)
    }

    fn log_rough_statistics(&self) {
        let Some(rough_mind) = self.rough_mind.as_ref() else {
            return;
        };
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        debug!("Packs/packrows after KN evaluation:");
        for dim in 0..rough_mind.num_of_dimensions() {
            let pack_all = rough_mind.num_of_packs(dim);
            let statuses = rough_mind.rs_values(dim);
            let pack_full = statuses.iter().filter(|v| **v == RoughSetValue::All).count();
            let pack_some = statuses
                .iter()
                .filter(|v| !matches!(v, RoughSetValue::All | RoughSetValue::None))
                .count();
            debug!(
                "(t{}) Pckrows: {}, susp. {} ({} empty {} full). Conditions: {}",
                dim,
                pack_all,
                pack_some,
                pack_all - (pack_full + pack_some),
                pack_full,
                rough_mind.num_of_conditions(dim)
            );
        }
    }

    /// Resets the blocks of the packs excluded roughly. Returns false if some filter became empty.
    pub(super) fn propagate_rough_to_mind(&mut self) -> bool {
        let Some(rough_mind) = self.rough_mind.as_ref() else {
            return true;
        };
        let mut is_nonempty = true;
        for dim in 0..rough_mind.num_of_dimensions() {
            let Some(f) = self.mind.get_filter_mut(dim) else {
                continue;
            };
            for (b, status) in rough_mind.rs_values(dim).iter().enumerate() {
                if *status == RoughSetValue::None {
                    f.reset_block(b);
                }
            }
            is_nonempty &= !f.is_empty();
        }
        self.mind.update_num_of_tuples();
        is_nonempty
    }

    /// Dimensions touched by joins or outer conditions can not keep `ALL` packs.
    pub(super) fn rough_update_joins(&mut self) {
        let Some(rough_mind) = self.rough_mind.as_mut() else {
            return;
        };
        let mut dims_to_be_suspect = DimensionVector::new(self.mind.num_of_dimensions());
        for d in self.descriptors.iter_mut().filter(|d| !d.done) {
            if d.delayed {
                rough_mind.make_dimension_suspect(None);
                return;
            }
            if d.is_outer() {
                dims_to_be_suspect.plus(&d.right_dims);
            }
            if d.is_type_join() && d.is_inner() {
                let mut used = d.left_dims.clone();
                d.dimension_used(&mut used);
                d.left_dims = used;
                dims_to_be_suspect.plus(&d.left_dims);
            }
        }
        for dim in dims_to_be_suspect.iter() {
            rough_mind.make_dimension_suspect(Some(dim));
        }
    }

    /// True if two inner one dimension conditions work on different dimensions,
    /// so that projecting one onto the other may exclude packs.
    fn dims_with_1dim_filters(&self) -> bool {
        let mut first: Option<DimensionVector> = None;
        for d in self.descriptors.iter() {
            if d.done || !d.is_inner() || d.is_type_join() || d.delayed {
                continue;
            }
            match &first {
                None => first = Some(d.used_dims()),
                Some(dv1) => {
                    if !dv1.intersects(&d.used_dims()) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub(super) fn rough_make_projections(&mut self) {
        for dim in 0..self.no_dims() {
            self.rough_make_projections_to(dim, false);
        }
        if let Some(rough_mind) = self.rough_mind.as_mut() {
            rough_mind.update_reduced_dimensions();
        }
    }

    /// Excludes the packs of `to_dim` which can not be joined with any pack
    /// left on a dimension reduced since the last projection.
    pub(super) fn rough_make_projections_to(&mut self, to_dim: usize, update_reduced: bool) {
        let no_dims = self.no_dims();
        let pack_power = self.mind.pack_power();
        let Some(rough_mind) = self.rough_mind.as_mut() else {
            return;
        };
        let dims_reduced = rough_mind.reduced_dimensions();
        let mut total_excluded = 0usize;

        for &dim1 in &dims_reduced {
            if dim1 == to_dim {
                continue;
            }
            let mut local_desc = Vec::new();
            for d in self.descriptors.iter() {
                if d.done || d.delayed {
                    continue;
                }
                if d.is_outer() {
                    return;
                }
                let (Some(attr), Some(val)) = (d.attr.vc(), d.val1.vc()) else {
                    continue;
                };
                if attr.dim().is_none() || val.dim().is_none() {
                    continue;
                }
                let dims = d.used_dims();
                if dims.get(dim1) && dims.get(to_dim) && dims.no_one() == 2 {
                    local_desc.push(d.clone());
                }
            }

            for ld in &local_desc {
                let (Some(attr), Some(val)) = (ld.attr.vc(), ld.val1.vc()) else {
                    continue;
                };
                let (ordered, matched) = if attr.dim() == Some(dim1) { (attr, val) } else { (val, attr) };
                let mut po = PackOrderer::new(ordered, OrderType::RangeSimilarity, Some(rough_mind.rs_values(dim1)));
                let mut pos = TuplePosition::new(no_dims, pack_power);

                for p2 in 0..rough_mind.num_of_packs(to_dim) {
                    if rough_mind.pack_status(to_dim, p2) == RoughSetValue::None {
                        continue;
                    }
                    pos.set_pack(to_dim, p2);
                    po.rewind_to_match(matched, &pos);
                    let mut pack_possible = false;
                    for p1 in po.by_ref() {
                        if rough_mind.pack_status(dim1, p1) == RoughSetValue::None {
                            continue;
                        }
                        pos.set_pack(dim1, p1);
                        if attr.rough_check(&pos, ld) != RoughSetValue::None {
                            pack_possible = true;
                            break;
                        }
                    }
                    if !pack_possible {
                        rough_mind.set_pack_status(to_dim, p2, RoughSetValue::None);
                        total_excluded += 1;
                    }
                }
            }
            if update_reduced {
                rough_mind.update_reduced_dimension(dim1);
            }
        }

        if total_excluded == 0 {
            return;
        }
        debug!("Packrows excluded by rough multidimensional projections: {}", total_excluded);
        rough_mind.update_local_rough_filters(to_dim);
        for dim in dims_reduced.iter().copied().chain(std::iter::once(to_dim)) {
            let Some(f) = self.mind.get_filter_mut(dim) else {
                continue;
            };
            for (b, status) in rough_mind.rs_values(dim).iter().enumerate() {
                if *status == RoughSetValue::None {
                    f.reset_block(b);
                }
            }
        }
        self.mind.update_num_of_tuples();
    }

    /// Rough pass only: the pack statistics decide which packs may hold
    /// results, no row is read.
    pub fn rough_update_param_filter(&mut self) -> Result<()> {
        self.prepare_rough_multi_index();
        if self.descriptors.is_empty() {
            return Ok(());
        }
        self.syntactical_descriptor_list_preprocessing(true)?;
        let nonempty = self.rough_update_multi_index()?;
        if !nonempty {
            if let Some(rough_mind) = self.rough_mind.as_mut() {
                rough_mind.make_dimension_empty(None);
            }
        }
        self.rough_update_joins();
        Ok(())
    }

    /// Replaces the OR trees of `cond` by TRUE or FALSE where all packs agree,
    /// pruning the leaves decided roughly.
    pub(super) fn rough_simplify_condition(&self, cond: &mut Condition) -> Result<()> {
        for desc in cond.iter_mut() {
            if desc.is_true() || desc.is_false() || !desc.is_type_or_tree() {
                continue;
            }
            let mut dims = desc.used_dims();
            self.mind.mark_involved_dim_groups(&mut dims);
            desc.clear_rough_values();
            let mut it = MIIterator::new(&self.mind, &dims);
            while it.is_valid() {
                desc.rough_accumulate(it.position());
                it.next_packrow();
            }
            desc.simplify_after_rough_accumulate()?;
        }
        Ok(())
    }

    /// Pack statuses of every dimension, `UNKNOWN` before the first rough pass.
    pub fn rough_pack_status(&self, dim: usize, pack: usize) -> RoughSetValue {
        self.rough_mind
            .as_ref()
            .map_or(RoughSetValue::Unknown, |r| r.pack_status(dim, pack))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::{
        descriptor::Descriptor,
        storage::{StoredTable, TempTable},
        types::Operator,
        vc::VirtualColumn,
    };
    use RoughSetValue as R;

    fn c(v: i64) -> Arc<VirtualColumn> {
        VirtualColumn::constant(v)
    }

    #[test]
    fn projection_keeps_packs_matching_the_remaining_ones() {
        // packs of t1.a: [0..4) [30..34) [20..24), of t2.b: [30..34) [20..24) [40..44)
        let t1 = StoredTable::builder("t1", 2)
            .int_column("a", (0..4).chain(30..34).chain(20..24))
            .build()
            .unwrap();
        let t2 = StoredTable::builder("t2", 2)
            .int_column("b", (30..34).chain(20..24).chain(40..44))
            .build()
            .unwrap();
        let a = VirtualColumn::column(&t1, "a", 0).unwrap();
        let b = VirtualColumn::column(&t2, "b", 1).unwrap();
        let table = Arc::new(TempTable::new(vec![t1, t2]).unwrap());
        let mut pf = ParameterizedFilter::new(table);

        let cond: Condition = [
            Descriptor::compare(&a, Operator::Less, &c(22), 2),
            Descriptor::compare(&b, Operator::NotEq, &c(31), 2),
            Descriptor::compare(&a, Operator::Eq, &b, 2),
        ]
        .into_iter()
        .collect();
        pf.add_conditions(cond).unwrap();

        assert!(pf.rough_update_multi_index().unwrap());
        assert_eq!(pf.rough_mind().unwrap().rs_values(0), &[R::All, R::None, R::Some]);
        assert_eq!(pf.rough_mind().unwrap().rs_values(1), &[R::None, R::All, R::None]);

        let f = pf.mind().get_filter(1).unwrap();
        assert!(f.is_empty_pack(0) && f.is_empty_pack(2));
        assert!(f.is_full(1));
        assert!(pf.mind().get_filter(0).unwrap().is_empty_pack(1));
    }

    #[test]
    fn joins_make_their_dimensions_suspect() {
        let t1 = StoredTable::builder("t1", 2).int_column("a", 0..8).build().unwrap();
        let t2 = StoredTable::builder("t2", 2).int_column("b", 0..8).build().unwrap();
        let a = VirtualColumn::column(&t1, "a", 0).unwrap();
        let b = VirtualColumn::column(&t2, "b", 1).unwrap();
        let table = Arc::new(TempTable::new(vec![t1, t2]).unwrap());
        let mut pf = ParameterizedFilter::new(table);
        pf.add_conditions(std::iter::once(Descriptor::compare(&a, Operator::Less, &b, 2)).collect())
            .unwrap();

        pf.prepare_rough_multi_index();
        pf.rough_update_joins();
        assert!(pf.rough_mind().unwrap().rs_values(0).iter().all(|v| *v == R::Some));
        assert_eq!(pf.rough_pack_status(1, 0), R::Some);
    }
}
