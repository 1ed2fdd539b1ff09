use std::cmp::Ordering;

use crate::core::{
    error::Result,
    multi_index::TuplePosition,
    types::{ColumnType, Operator, Tribool, TypedValue},
    vc::VirtualColumn,
};

use super::{CQTerm, Descriptor};

impl Descriptor {
    /// Folds the descriptor into `TRUE` or `FALSE` once all its operands are
    /// constant. Parameterized operands count as variable in a `HAVING` clause.
    pub fn simplify(&mut self, in_having: bool) -> Result<()> {
        if self.is_true() || self.is_false() {
            return Ok(());
        }

        if self.is_type_or_tree() {
            let Some(tree) = self.tree.as_mut() else {
                return Ok(());
            };
            match tree.simplify(in_having)? {
                Tribool::True => self.collapse(true),
                Tribool::False => self.collapse(false),
                Tribool::Unknown => {
                    let replacement = tree.root_desc().filter(|d| !d.is_type_or_tree()).cloned();
                    if let Some(mut leaf) = replacement {
                        leaf.left_dims = std::mem::take(&mut self.left_dims);
                        leaf.right_dims = std::mem::take(&mut self.right_dims);
                        *self = leaf;
                    }
                }
            }
            return Ok(());
        }

        let attr_const = self.attr.vc().is_some_and(|vc| vc.is_const());
        let val1_variable = self.val1.vc().is_some_and(|vc| !vc.is_const());
        if attr_const && val1_variable && self.op.is_simple_comparison() && !self.op.is_all_any() {
            self.switch_sides();
        }
        if self.op.is_all_any() && !self.val1.vc().is_some_and(|vc| vc.is_multival()) {
            self.op = self.op.unmark_all_any();
        }

        let variable = [&self.attr, &self.val1, &self.val2].iter().any(|t| {
            t.vc()
                .is_some_and(|vc| !vc.is_const() || (in_having && vc.is_parameterized()))
        });
        if variable {
            return Ok(());
        }

        let pos = TuplePosition::new(0, 0);
        if matches!(self.op, Operator::Between | Operator::NotBetween) {
            let low_null = self.val1.value(&pos)?.is_null();
            let high_null = self.val2.value(&pos)?.is_null();
            if (self.op == Operator::Between && (low_null || high_null)) || (low_null && high_null) {
                self.null_after_simplify = true;
                self.collapse(false);
                return Ok(());
            }
            if low_null {
                // a NOT BETWEEN NULL AND x  =>  a > x
                self.op = Operator::More;
                self.val1 = std::mem::take(&mut self.val2);
            } else if high_null {
                // a NOT BETWEEN x AND NULL  =>  a < x
                self.op = Operator::Less;
                self.val2 = Default::default();
            }
        }

        if self.op.is_set_operator() {
            let op = self.op;
            self.null_after_simplify = self.is_null_set(&pos, op)?;
            let res = self.check_set_condition(&pos, op, self.collation)?;
            self.collapse(res);
            return Ok(());
        }

        let res = match self.op {
            Operator::IsNull => self.attr.value(&pos)?.is_null(),
            Operator::NotNull => !self.attr.value(&pos)?.is_null(),
            Operator::Exists | Operator::NotExists => {
                let exists = match self.attr.vc() {
                    Some(vc) => vc.check_exists(&pos)?,
                    None => false,
                };
                exists == (self.op == Operator::Exists)
            }
            Operator::Between | Operator::NotBetween => {
                let v = self.attr.value(&pos)?;
                if v.is_null() {
                    self.null_after_simplify = true;
                    false
                } else {
                    let low = self.val1.value(&pos)?;
                    let high = self.val2.value(&pos)?;
                    let inside = v.cmp_collated(&low, self.collation).is_some_and(|o| o != Ordering::Less)
                        && v.cmp_collated(&high, self.collation).is_some_and(|o| o != Ordering::Greater);
                    inside == (self.op == Operator::Between)
                }
            }
            _ => {
                let v1 = self.attr.value(&pos)?;
                let v2 = self.val1.value(&pos)?;
                let res = v1.compare_collated(&v2, self.op, self.like_esc, self.collation);
                if !res && (v1.is_null() || v2.is_null()) {
                    self.null_after_simplify = true;
                }
                res
            }
        };
        self.collapse(res);
        Ok(())
    }

    #[inline]
    pub(crate) fn collapse(&mut self, value: bool) {
        self.op = if value { Operator::True } else { Operator::False };
        self.tree = None;
    }

    /// Makes a constant operand comparable with the attribute: a constant of
    /// another type is replaced by its value converted to the attribute's type.
    pub fn coerce_column_types(&mut self) -> Result<()> {
        let Some(attr) = self.attr.vc() else {
            return Ok(());
        };
        if !attr.is_single_column() || self.encoded {
            return Ok(());
        }
        let target = attr.column_type();
        for term in [&mut self.val1, &mut self.val2] {
            let Some(value) = term.const_value() else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            let same = matches!(
                (&value, target),
                (TypedValue::Int(_), ColumnType::Int)
                    | (TypedValue::Real(_), ColumnType::Real)
                    | (TypedValue::Str(_), ColumnType::String | ColumnType::Lookup)
            );
            if same {
                continue;
            }
            if let Some(coerced) = value.coerce_to(target) {
                *term = CQTerm::new(VirtualColumn::constant(coerced));
            }
        }
        Ok(())
    }
}
