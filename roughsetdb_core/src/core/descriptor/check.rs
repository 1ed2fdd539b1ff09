use std::{cmp::Ordering, sync::Arc};

use smallvec::SmallVec;

use crate::core::{
    error::Result,
    multi_index::{MIUpdatingIterator, TuplePosition},
    types::{Collation, Operator, Tribool, TypedValue},
    vc::{PackLockGuard, VirtualColumn},
};

use super::Descriptor;

/// Granularity of the rough check of a correlated subquery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubSelectOptimizationType {
    PackBased,
    RowBased,
}

impl Descriptor {
    /// Value of the attribute in the representation the constants use:
    /// dictionary codes once a lookup column is encoded.
    #[inline]
    fn attr_value(&self, pos: &TuplePosition) -> Result<TypedValue> {
        match self.attr.vc() {
            Some(vc) if self.encoded && vc.column_type().is_lookup() => vc.stored_value(pos),
            Some(vc) => vc.value(pos),
            None => Ok(TypedValue::Null),
        }
    }

    #[inline]
    fn attr_is_null(&self, pos: &TuplePosition) -> Result<bool> {
        match self.attr.vc() {
            Some(vc) => vc.is_null(pos),
            None => Ok(true),
        }
    }

    #[inline]
    fn uses_collation(&self) -> bool {
        !self.collation.is_binary()
            && !(self.encoded && self.attr.vc().is_some_and(|vc| vc.column_type().is_lookup()))
    }

    /// Exact check of the tuple under `pos`. Unknown results count as false.
    pub fn check_condition(&self, pos: &TuplePosition) -> Result<bool> {
        if self.uses_collation() {
            return self.check_condition_utf(pos);
        }
        self.check_condition_with(pos, Collation::Binary)
    }

    /// Exact check comparing strings under the descriptor's collation.
    pub fn check_condition_utf(&self, pos: &TuplePosition) -> Result<bool> {
        self.check_condition_with(pos, self.collation)
    }

    fn check_condition_with(&self, pos: &TuplePosition, collation: Collation) -> Result<bool> {
        match self.op {
            Operator::True => Ok(true),
            Operator::False => Ok(false),
            Operator::Eq => {
                let v = self.attr_value(pos)?;
                let other = self.val1.value(pos)?;
                Ok(v.cmp_collated(&other, collation) == Some(Ordering::Equal))
            }
            Operator::NotNull => Ok(!self.attr_is_null(pos)?),
            Operator::IsNull => self.attr_is_null(pos),
            Operator::Exists | Operator::NotExists => {
                let nonempty = match self.attr.vc() {
                    Some(vc) => vc.check_exists(pos)?,
                    None => false,
                };
                Ok(nonempty == (self.op == Operator::Exists))
            }
            Operator::Between | Operator::NotBetween => {
                if self.attr_is_null(pos)? {
                    return Ok(false);
                }
                let (low, high) = self.between_sides(pos, collation)?;
                Ok(if self.op == Operator::Between {
                    low.is_true() && high.is_true()
                } else {
                    low.is_false() || high.is_false()
                })
            }
            op if op.is_set_operator() => self.check_set_condition(pos, op, collation),
            Operator::OrTree => match &self.tree {
                Some(tree) => tree.check_condition(pos),
                None => Ok(false),
            },
            op => {
                let v = self.attr_value(pos)?;
                let other = self.val1.value(pos)?;
                Ok(v.compare_collated(&other, op, self.like_esc, collation))
            }
        }
    }

    /// `attr >= val1` and `attr <= val2`, strict for sharp intervals. For encoded
    /// descriptors a null bound is open, otherwise it gives an unknown side.
    fn between_sides(&self, pos: &TuplePosition, collation: Collation) -> Result<(Tribool, Tribool)> {
        let v = self.attr_value(pos)?;
        let low = self.val1.value(pos)?;
        let high = self.val2.value(pos)?;
        let side = |bound: &TypedValue, lower: bool| -> Tribool {
            if bound.is_null() {
                return if self.encoded { Tribool::True } else { Tribool::Unknown };
            }
            match v.cmp_collated(bound, collation) {
                None => Tribool::Unknown,
                Some(ord) => {
                    let wanted = if lower { Ordering::Greater } else { Ordering::Less };
                    Tribool::from(ord == wanted || (!self.sharp && ord == Ordering::Equal))
                }
            }
        };
        Ok((side(&low, true), side(&high, false)))
    }

    /// True if the result for the tuple is unknown rather than false.
    pub fn is_null(&self, pos: &TuplePosition) -> Result<bool> {
        if self.null_after_simplify {
            return Ok(true);
        }
        match self.op {
            Operator::True | Operator::False => Ok(false),
            Operator::IsNull | Operator::NotNull | Operator::Exists | Operator::NotExists => Ok(false),
            Operator::Between | Operator::NotBetween => {
                if self.attr_is_null(pos)? {
                    return Ok(true);
                }
                let (low, high) = self.between_sides(pos, self.collation)?;
                Ok(Tribool::and(low, high).is_unknown())
            }
            op if op.is_set_operator() => self.is_null_set(pos, op),
            Operator::OrTree => match &self.tree {
                Some(tree) => tree.is_null(pos),
                None => Ok(false),
            },
            _ => {
                let other_null = match self.val1.vc() {
                    Some(vc) => vc.is_null(pos)?,
                    None => true,
                };
                Ok(self.attr_is_null(pos)? || other_null)
            }
        }
    }

    /// `IN`, `NOT IN` and the `ANY`/`ALL` comparisons against the set in `val1`.
    pub fn check_set_condition(&self, pos: &TuplePosition, op: Operator, collation: Collation) -> Result<bool> {
        let Some(mvc) = self.val1.vc() else {
            return Ok(false);
        };
        let set = mvc.set_values(pos)?;
        let v = self.attr_value(pos)?;

        if self.encoded && matches!(op, Operator::In | Operator::NotIn) {
            if v.is_null() {
                return Ok(op == Operator::NotIn && set.is_empty());
            }
            let mut res = set.contains(&v, collation);
            if op == Operator::NotIn {
                res = !res;
            }
            return Ok(res.is_true());
        }

        let cmp = |a: &TypedValue, b: &TypedValue, op: Operator| a.compare_collated(b, op, '\\', collation);
        let res = match op {
            Operator::EqAll => set
                .values()
                .iter()
                .all(|x| !v.is_null() && !x.is_null() && cmp(&v, x, Operator::Eq)),
            Operator::In | Operator::EqAny => !v.is_null() && set.contains(&v, collation).is_true(),
            Operator::NotIn | Operator::NotEqAll => {
                if v.is_null() && !set.is_empty() {
                    false
                } else {
                    (!set.contains(&v, collation)).is_true()
                }
            }
            Operator::NotEqAny => {
                !v.is_null()
                    && set
                        .values()
                        .iter()
                        .any(|x| !x.is_null() && cmp(&v, x, Operator::NotEq))
            }
            Operator::LessAll | Operator::LessEqAll => {
                set.is_empty()
                    || (!v.is_null()
                        && !set.min().is_null()
                        && !set.contains_null()
                        && cmp(&v, set.min(), op.unmark_all_any()))
            }
            Operator::MoreAny | Operator::MoreEqAny => {
                !set.is_empty() && !v.is_null() && !set.min().is_null() && cmp(&v, set.min(), op.unmark_all_any())
            }
            Operator::LessAny | Operator::LessEqAny => {
                !set.is_empty() && !v.is_null() && !set.max().is_null() && cmp(&v, set.max(), op.unmark_all_any())
            }
            Operator::MoreAll | Operator::MoreEqAll => {
                set.is_empty()
                    || (!v.is_null()
                        && !set.max().is_null()
                        && !set.contains_null()
                        && cmp(&v, set.max(), op.unmark_all_any()))
            }
            _ => false,
        };
        Ok(res)
    }

    /// Unknown result of a set comparison.
    pub fn is_null_set(&self, pos: &TuplePosition, op: Operator) -> Result<bool> {
        let Some(mvc) = self.val1.vc() else {
            return Ok(true);
        };
        let set = mvc.set_values(pos)?;
        let v = self.attr_value(pos)?;
        if self.encoded && matches!(op, Operator::In | Operator::NotIn) {
            return Ok(v.is_null() || set.contains(&v, self.collation).is_unknown());
        }
        let res = match op {
            Operator::EqAll | Operator::NotEqAll => v.is_null() || set.contains_null(),
            Operator::In | Operator::EqAny | Operator::NotIn | Operator::NotEqAny => {
                v.is_null() || set.contains(&v, self.collation).is_unknown()
            }
            Operator::LessAll | Operator::LessEqAll => v.is_null() || set.min().is_null() || set.contains_null(),
            Operator::MoreAny | Operator::MoreEqAny => v.is_null() || set.min().is_null(),
            Operator::LessAny | Operator::LessEqAny => v.is_null() || set.max().is_null(),
            Operator::MoreAll | Operator::MoreEqAll => v.is_null() || set.max().is_null() || set.contains_null(),
            _ => false,
        };
        Ok(res)
    }

    /// Decides a subquery comparison from the subquery's rough bounds when possible.
    pub fn rough_check_subselect_condition(
        &self,
        pos: &TuplePosition,
        sot: SubSelectOptimizationType,
    ) -> Result<Tribool> {
        if sot == SubSelectOptimizationType::PackBased {
            return Ok(Tribool::Unknown);
        }
        match self.op {
            Operator::True => return Ok(Tribool::True),
            Operator::False => return Ok(Tribool::False),
            _ => {}
        }
        let strings = [&self.attr, &self.val1, &self.val2]
            .iter()
            .filter_map(|t| t.vc())
            .any(|vc| vc.column_type().is_string() || vc.column_type().is_lookup());
        if strings {
            return Ok(Tribool::Unknown);
        }

        if matches!(self.op, Operator::Exists | Operator::NotExists) {
            let Some(sub) = self.attr.vc().and_then(|vc| vc.as_subselect()) else {
                return Ok(Tribool::Unknown);
            };
            let is_empty = sub.provider().rough_is_empty();
            let exists = self.op == Operator::Exists;
            return Ok(match is_empty {
                Tribool::True => Tribool::from(!exists),
                Tribool::False => Tribool::from(exists),
                Tribool::Unknown => Tribool::Unknown,
            });
        }
        if self.op.is_set_operator() {
            return self.rough_check_set_subselect_condition(pos, self.op);
        }
        if matches!(self.op, Operator::Between | Operator::NotBetween) {
            return Ok(Tribool::Unknown);
        }

        let (Some(attr), Some(val1)) = (self.attr.vc(), self.val1.vc()) else {
            return Ok(Tribool::Unknown);
        };
        // `val OP sub` once normalized
        let (sub, val, op) = match (attr.as_subselect(), val1.as_subselect()) {
            (Some(_), Some(_)) | (None, None) => return Ok(Tribool::Unknown),
            (Some(sub), None) => (sub, val1, self.op.switch_sides()),
            (None, Some(sub)) => (sub, attr, self.op),
        };
        let (min, max) = (sub.provider().rough_min(), sub.provider().rough_max());
        let v = val.value(pos)?;
        let (Some(v_min), Some(v_max)) = (v.sql_cmp(&min), v.sql_cmp(&max)) else {
            return Ok(Tribool::Unknown);
        };
        let excluded = match op {
            Operator::Eq => v_min == Ordering::Less || v_max == Ordering::Greater,
            Operator::NotEq => v_min == Ordering::Equal && v_max == Ordering::Equal,
            Operator::MoreEq => v_min == Ordering::Less,
            Operator::More => v_min != Ordering::Greater,
            Operator::LessEq => v_max == Ordering::Greater,
            Operator::Less => v_max != Ordering::Less,
            _ => false,
        };
        Ok(if excluded { Tribool::False } else { Tribool::Unknown })
    }

    fn rough_check_set_subselect_condition(&self, pos: &TuplePosition, op: Operator) -> Result<Tribool> {
        let Some(sub) = self.val1.vc().and_then(|vc| vc.as_subselect()) else {
            return Ok(Tribool::Unknown);
        };
        let provider = sub.provider();
        let (min, max) = (provider.rough_min(), provider.rough_max());
        let v = self.attr_value(pos)?;
        let rough_is_empty = provider.rough_is_empty();
        let cmp = |bound: &TypedValue| v.compare(bound, op.unmark_all_any(), '\\');

        let res = match op {
            Operator::EqAll | Operator::In | Operator::EqAny => {
                let on_empty = op == Operator::EqAll;
                if rough_is_empty.is_true() {
                    Tribool::from(on_empty)
                } else if rough_is_empty.is_false()
                    && (v.sql_cmp(&min) == Some(Ordering::Less) || v.sql_cmp(&max) == Some(Ordering::Greater))
                {
                    Tribool::False
                } else {
                    Tribool::Unknown
                }
            }
            Operator::LessAll | Operator::LessEqAll | Operator::MoreAll | Operator::MoreEqAll => {
                let bound = if op.is_type_of_less() || op.is_type_of_less_eq() { &max } else { &min };
                if rough_is_empty.is_true() {
                    Tribool::True
                } else if rough_is_empty.is_false() && !bound.is_null() && !v.is_null() && !cmp(bound) {
                    Tribool::False
                } else {
                    Tribool::Unknown
                }
            }
            Operator::LessAny | Operator::LessEqAny | Operator::MoreAny | Operator::MoreEqAny => {
                let bound = if op.is_type_of_less() || op.is_type_of_less_eq() { &max } else { &min };
                if rough_is_empty.is_true() {
                    Tribool::False
                } else if rough_is_empty.is_false() && !bound.is_null() && !v.is_null() && !cmp(bound) {
                    Tribool::False
                } else {
                    Tribool::Unknown
                }
            }
            _ => Tribool::Unknown,
        };
        Ok(res)
    }

    /// Exact evaluation of the current pack of `it`, resetting the tuples
    /// which fail. Leaves `it` at the start of the next pack.
    pub fn evaluate_pack(&mut self, it: &mut MIUpdatingIterator) -> Result<()> {
        let pos = it.position().clone();
        let sources: SmallVec<[Arc<VirtualColumn>; 3]> = [&self.attr, &self.val1, &self.val2]
            .into_iter()
            .filter_map(|t| t.vc().cloned())
            .collect();
        let _locks: SmallVec<[PackLockGuard<'_>; 3]> =
            sources.iter().map(|vc| vc.lock_source_packs(&pos)).collect();
        self.evaluate_pack_impl(it)
    }

    pub fn evaluate_pack_impl(&mut self, it: &mut MIUpdatingIterator) -> Result<()> {
        if self.encoded {
            if let Some(single) = self.attr.vc().and_then(|vc| vc.as_single()) {
                if single.evaluate_pack_fast(it, self)? {
                    return Ok(());
                }
            }
        }

        if self.is_type_or_tree() {
            if let Some(tree) = self.tree.as_mut() {
                let pos = it.position().clone();
                tree.clear_rough_values();
                tree.evaluate_roughly_pack(&pos);
                return tree.evaluate_pack(it);
            }
        }

        if self.is_type_subquery() && !self.uses_collation() {
            let pos = it.position().clone();
            match self.rough_check_subselect_condition(&pos, SubSelectOptimizationType::PackBased)? {
                Tribool::False => {
                    it.reset_current_pack();
                    it.next_packrow();
                    return Ok(());
                }
                Tribool::True => {
                    it.next_packrow();
                    return Ok(());
                }
                Tribool::Unknown => {}
            }
            while it.is_valid() {
                let pos = it.position();
                let keep = match self.rough_check_subselect_condition(pos, SubSelectOptimizationType::RowBased)? {
                    Tribool::False => false,
                    Tribool::True => true,
                    Tribool::Unknown => self.check_condition(pos)?,
                };
                if !keep || self.attr_deleted(pos) {
                    it.reset_current();
                }
                it.advance();
                if it.packrow_started() {
                    break;
                }
            }
            return Ok(());
        }

        while it.is_valid() {
            let pos = it.position();
            if self.attr_deleted(pos) || !self.check_condition(pos)? {
                it.reset_current();
            }
            it.advance();
            if it.packrow_started() {
                break;
            }
        }
        Ok(())
    }

    #[inline]
    fn attr_deleted(&self, pos: &TuplePosition) -> bool {
        self.attr.vc().is_some_and(|vc| vc.is_deleted(pos))
    }
}
