use log::debug;

use crate::core::{
    descriptor::{CQTerm, Descriptor, DescriptorJoinType},
    error::Result,
    types::{DimensionVector, Operator},
};

use super::{condition_encoder::ConditionEncoder, parameterized_filter::ParameterizedFilter};

/// Splits a `BETWEEN` which can not be evaluated as one interval into two
/// comparisons. `d` keeps the first half, the second one is returned.
fn split_between(d: &mut Descriptor, no_dims: usize) -> Option<Descriptor> {
    let (lower, upper) = if d.sharp {
        (Operator::More, Operator::Less)
    } else {
        (Operator::MoreEq, Operator::LessEq)
    };
    let const_attr = d.attr.vc().is_some_and(|vc| vc.is_const());

    let mut dd = if d.desc_t != DescriptorJoinType::ComplexJoin && !d.is_type_join() && const_attr {
        // 5 BETWEEN a AND b  =>  a <= 5 AND b >= 5
        std::mem::swap(&mut d.attr, &mut d.val1);
        d.op = upper;
        let val2 = std::mem::take(&mut d.val2);
        Descriptor::new(val2, lower, d.val1.clone(), CQTerm::default(), no_dims)
    } else if d.is_type_join_simple() {
        // a BETWEEN 1 AND b  =>  a >= 1 AND a <= b
        d.op = lower;
        let val2 = std::mem::take(&mut d.val2);
        Descriptor::new(d.attr.clone(), upper, val2, CQTerm::default(), no_dims)
    } else {
        return None;
    };
    d.sharp = false;
    dd.collation = d.collation;
    dd.left_dims = d.left_dims.clone();
    dd.right_dims = d.right_dims.clone();
    dd.calculate_join_type();
    d.calculate_join_type();
    Some(dd)
}

impl ParameterizedFilter {
    /// Normalises the descriptor list before any evaluation: outer join
    /// analysis, `BETWEEN` splitting, simplification, propagation of
    /// constants over equality joins, encoding and merging.
    pub fn syntactical_descriptor_list_preprocessing(&mut self, for_rough_query: bool) -> Result<()> {
        let no_dims = self.no_dims();
        self.analyse_outer_joins();

        let mut false_desc = false;
        let mut i = 0;
        while i < self.descriptors.len() {
            let d = &mut self.descriptors[i];
            if d.done {
                i += 1;
                continue;
            }
            if d.is_true() {
                if d.is_inner() {
                    d.done = true;
                }
                i += 1;
                continue;
            }
            if d.is_false() || d.delayed {
                i += 1;
                continue;
            }
            if d.op == Operator::Between {
                if let Some(dd) = split_between(d, no_dims) {
                    self.descriptors.add(dd);
                }
            }
            let d = &mut self.descriptors[i];
            d.coerce_column_types()?;
            d.simplify(false)?;
            false_desc |= d.is_false();
            i += 1;
        }

        self.propagate_join_equalities(no_dims)?;

        if false_desc {
            return Ok(());
        }

        for i in 0..self.descriptors.len() {
            let used = self.descriptors[i].used_dims();
            let additional_nulls =
                used.iter().any(|dim| self.mind.get_filter(dim).is_none()) || self.descriptors[i].is_outer();
            let d = &mut self.descriptors[i];
            ConditionEncoder::encode_if_possible(d, for_rough_query, additional_nulls)?;
            if d.is_true() && d.is_inner() {
                d.done = true;
            }
        }

        let descriptors = self.descriptors.as_mut_vec();
        for i in 0..descriptors.len() {
            if descriptors[i].done || descriptors[i].delayed {
                continue;
            }
            for jj in i + 1..descriptors.len() {
                let (head, tail) = descriptors.split_at_mut(jj);
                let (d1, d2) = (&mut head[i], &mut tail[0]);
                if d2.done || d2.delayed || !d2.right_dims.same_dims(&d1.right_dims) {
                    continue;
                }
                if d1.try_to_merge(d2) {
                    debug!("Merging conditions...");
                    d2.done = true;
                }
            }
        }
        Ok(())
    }

    /// Inner conditions over the null padded side of an outer join are delayed
    /// when a null row may satisfy them. Otherwise they reject the padding
    /// anyway and the outer join turns into an inner one.
    fn analyse_outer_joins(&mut self) {
        let no_dims = self.no_dims();
        let mut all_outer = DimensionVector::new(no_dims);
        let mut outer_join_found = false;
        for d in self.descriptors.iter().filter(|d| !d.done && d.is_outer()) {
            outer_join_found = true;
            all_outer.plus(&d.right_dims);
        }
        if !outer_join_found {
            return;
        }

        for d in self.descriptors.iter_mut().filter(|d| !d.done && d.is_inner()) {
            let inner = d.used_dims();
            if !all_outer.intersects(&inner) {
                continue;
            }
            if d.null_may_be_true() {
                d.delayed = true;
            } else {
                all_outer.minus(&inner);
            }
        }

        for d in self.descriptors.iter_mut() {
            if d.done || !d.is_outer() || all_outer.intersects(&d.right_dims) {
                continue;
            }
            debug!("Outer join turned into inner join: {}", d);
            d.right_dims.clean();
        }
    }

    /// `t1.x = t2.y AND t2.y = 5` becomes `t1.x = 5 AND t2.y = 5`; for other
    /// operators the condition is copied onto the joined column instead.
    fn propagate_join_equalities(&mut self, no_dims: usize) -> Result<()> {
        let mut added_cond = Vec::new();
        for i in 0..self.descriptors.len() {
            let di = &self.descriptors[i];
            if di.done || di.op != Operator::Eq || !di.is_type_join_simple() || !di.is_inner() {
                continue;
            }
            for j in 0..self.descriptors.len() {
                let (di, dj) = (&self.descriptors[i], &self.descriptors[j]);
                if i == j || dj.done || !dj.is_type_attr_val_or_attr_val_val() || !dj.is_inner() {
                    continue;
                }
                let on_attr = dj.attr == di.attr;
                let on_val1 = dj.attr == di.val1;
                if !on_attr && !on_val1 {
                    continue;
                }
                if dj.op == Operator::Eq {
                    let value = dj.val1.clone();
                    let di = &mut self.descriptors[i];
                    if on_attr {
                        di.attr = std::mem::take(&mut di.val1);
                    }
                    di.val1 = value;
                    di.calculate_join_type();
                    di.coerce_column_types()?;
                    break;
                }
                let other_side = if on_attr { di.val1.clone() } else { di.attr.clone() };
                added_cond.push(derived_condition(other_side, dj, no_dims)?);
            }
        }

        if !added_cond.is_empty() {
            debug!("Adding {} conditions...", added_cond.len());
        }
        for dd in added_cond {
            self.descriptors.add(dd);
        }
        Ok(())
    }
}

/// Copy of the one column condition `src` applied to `attr`.
fn derived_condition(attr: CQTerm, src: &Descriptor, no_dims: usize) -> Result<Descriptor> {
    let mut dd = Descriptor::new(attr, src.op, src.val1.clone(), src.val2.clone(), no_dims);
    dd.sharp = src.sharp;
    dd.collation = src.collation;
    dd.like_esc = src.like_esc;
    dd.coerce_column_types()?;
    Ok(dd)
}
