use std::cmp::Ordering;

use crate::core::{
    types::{Operator, TypedValue},
    vc::VirtualColumn,
};

use super::{CQTerm, Descriptor};

impl Descriptor {
    /// Folds `d2` into `self` where possible. Returns true if `d2` is no longer
    /// needed. `self` must precede `d2` in evaluation order.
    pub fn try_to_merge(&mut self, d2: &Descriptor) -> bool {
        if self.is_type_or_tree() || d2.is_type_or_tree() {
            return false;
        }
        if *self == *d2 {
            return true;
        }

        if self.attr == d2.attr && self.is_inner() && d2.is_inner() {
            // IS NULL and anything else on the same column is FALSE,
            // except set comparisons such as `null NOT IN (empty)`
            if (self.op == Operator::IsNull && d2.op != Operator::IsNull && !d2.op.is_set_operator())
                || (d2.op == Operator::IsNull && self.op != Operator::IsNull && !self.op.is_set_operator())
            {
                self.collapse(false);
                self.calculate_join_type();
                return true;
            }
            if self.op == Operator::NotNull && !d2.op.is_set_operator() {
                *self = d2.clone();
                return true;
            }
            if d2.op == Operator::NotNull && !self.op.is_set_operator() {
                return true;
            }
        }

        // t1 LEFT JOIN t2 ON (a=b AND c=5) WHERE a=b  =>  t1 LEFT JOIN t2 ON c=5 WHERE a=b
        if self.equal_except_outer(d2) {
            if self.is_inner() && d2.is_outer() {
                return true;
            }
            if self.is_outer() && d2.is_inner() {
                *self = d2.clone();
                return true;
            }
        }

        if self.attr == d2.attr && self.right_dims.same_dims(&d2.right_dims) && self.delayed == d2.delayed {
            return self.merge_content(d2);
        }
        false
    }

    fn merge_content(&mut self, d2: &Descriptor) -> bool {
        if self.implies(d2) {
            return true;
        }
        if d2.implies(self) {
            *self = d2.clone();
            return true;
        }
        self.intersect_intervals(d2)
    }

    /// `a BETWEEN l1 AND h1` and `a BETWEEN l2 AND h2` on encoded numeric
    /// bounds become one interval, or `FALSE` if they are disjoint.
    fn intersect_intervals(&mut self, d2: &Descriptor) -> bool {
        let interval = |d: &Descriptor| -> Option<(TypedValue, TypedValue)> {
            if d.op != Operator::Between || !d.encoded || d.sharp || d.collation != self.collation {
                return None;
            }
            let (low, high) = (d.val1.const_value()?, d.val2.const_value()?);
            let numeric = |v: &TypedValue| v.is_null() || v.as_f64().is_some();
            (numeric(&low) && numeric(&high)).then_some((low, high))
        };
        let (Some((l1, h1)), Some((l2, h2))) = (interval(self), interval(d2)) else {
            return false;
        };
        // a null bound is open
        let low = match l1.sql_cmp(&l2) {
            Some(Ordering::Less) => l2,
            Some(_) => l1,
            None if l1.is_null() => l2,
            None => l1,
        };
        let high = match h1.sql_cmp(&h2) {
            Some(Ordering::Greater) => h2,
            Some(_) => h1,
            None if h1.is_null() => h2,
            None => h1,
        };
        if low.sql_cmp(&high) == Some(Ordering::Greater) {
            self.collapse(false);
            return true;
        }
        self.val1 = CQTerm::new(VirtualColumn::constant(low));
        self.val2 = CQTerm::new(VirtualColumn::constant(high));
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::storage::StoredTable;

    fn column() -> Arc<VirtualColumn> {
        let t = StoredTable::builder("t", 4).int_column("a", 0..64).build().unwrap();
        VirtualColumn::column(&t, "a", 0).unwrap()
    }

    fn encoded_between(a: &Arc<VirtualColumn>, low: TypedValue, high: TypedValue) -> Descriptor {
        let mut d = Descriptor::between(a, &VirtualColumn::constant(low), &VirtualColumn::constant(high), 1);
        d.encoded = true;
        d
    }

    #[test]
    fn is_null_contradicts() {
        let a = column();
        let mut d1 = Descriptor::unary(&a, Operator::IsNull, 1);
        let d2 = Descriptor::compare(&a, Operator::Eq, &VirtualColumn::constant(3i64), 1);
        assert!(d1.try_to_merge(&d2));
        assert!(d1.is_false());
    }

    #[test]
    fn not_null_is_absorbed() {
        let a = column();
        let mut d1 = Descriptor::unary(&a, Operator::NotNull, 1);
        let d2 = Descriptor::compare(&a, Operator::Less, &VirtualColumn::constant(3i64), 1);
        assert!(d1.try_to_merge(&d2));
        assert_eq!(d1.op, Operator::Less);
    }

    #[test]
    fn outer_copy_of_inner_condition_is_dropped() {
        let a = column();
        let five = VirtualColumn::constant(5i64);
        let inner = Descriptor::compare(&a, Operator::Eq, &five, 2);
        let outer = inner.clone().outer(&[0], &[1]);
        let mut d1 = outer.clone();
        assert!(d1.try_to_merge(&inner));
        assert!(d1.is_inner());
        let mut d1 = inner.clone();
        assert!(d1.try_to_merge(&outer));
    }

    #[test]
    fn intervals_intersect() {
        let a = column();
        let mut d1 = encoded_between(&a, TypedValue::Int(0), TypedValue::Int(10));
        let d2 = encoded_between(&a, TypedValue::Int(5), TypedValue::Null);
        assert!(d1.try_to_merge(&d2));
        assert_eq!(d1.val1.const_value(), Some(TypedValue::Int(5)));
        assert_eq!(d1.val2.const_value(), Some(TypedValue::Int(10)));

        let d3 = encoded_between(&a, TypedValue::Int(20), TypedValue::Int(30));
        assert!(d1.try_to_merge(&d3));
        assert!(d1.is_false());
    }

    #[test]
    fn unrelated_descriptors_stay() {
        let a = column();
        let mut d1 = Descriptor::compare(&a, Operator::NotEq, &VirtualColumn::constant(1i64), 1);
        let d2 = Descriptor::compare(&a, Operator::NotEq, &VirtualColumn::constant(2i64), 1);
        assert!(!d1.try_to_merge(&d2));
    }
}
