use std::sync::Arc;

use smallvec::SmallVec;

use crate::core::{
    multi_index::TuplePosition,
    types::{Collation, DimensionVector, LogicalOperator, Operator, RoughSetValue, TypedValue},
    vc::{NullInfo, PackLockGuard, VirtualColumn},
};

use super::{CQTerm, DescTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptorJoinType {
    #[default]
    NotKnownYet,
    NonJoin,
    SimpleJoin,
    ComplexJoin,
}

/// One predicate `attr op val1 [val2]`, or an AND/OR tree of predicates
/// when `op` is [`Operator::OrTree`].
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub attr: CQTerm,
    pub op: Operator,
    pub val1: CQTerm,
    pub val2: CQTerm,
    /// Combinator of the children when this is an inner tree node.
    pub lop: LogicalOperator,
    pub like_esc: char,
    pub collation: Collation,
    /// Strict bounds of `BETWEEN`.
    pub sharp: bool,
    /// Constants were converted to the attribute's representation.
    pub encoded: bool,
    pub done: bool,
    /// Must wait until the outer join producing its nulls is executed.
    pub delayed: bool,
    pub null_after_simplify: bool,
    /// Inner side of an outer join, or every dimension of a multi dimensional tree.
    pub left_dims: DimensionVector,
    /// Outer (null producing) side of an outer join, empty for inner conditions.
    pub right_dims: DimensionVector,
    /// Rough verdict accumulated over the packs checked so far.
    pub rv: RoughSetValue,
    /// Estimated cost used for ordering.
    pub evaluation: f64,
    pub desc_t: DescriptorJoinType,
    pub tree: Option<Box<DescTree>>,
}

impl Default for Descriptor {
    fn default() -> Self {
        Self {
            attr: CQTerm::default(),
            op: Operator::True,
            val1: CQTerm::default(),
            val2: CQTerm::default(),
            lop: LogicalOperator::And,
            like_esc: '\\',
            collation: Collation::Binary,
            sharp: false,
            encoded: false,
            done: false,
            delayed: false,
            null_after_simplify: false,
            left_dims: DimensionVector::default(),
            right_dims: DimensionVector::default(),
            rv: RoughSetValue::Unknown,
            evaluation: 0.0,
            desc_t: DescriptorJoinType::NotKnownYet,
            tree: None,
        }
    }
}

impl Descriptor {
    pub fn new(attr: CQTerm, op: Operator, val1: CQTerm, val2: CQTerm, no_dims: usize) -> Self {
        let mut desc = Self {
            attr,
            op,
            val1,
            val2,
            left_dims: DimensionVector::new(no_dims),
            right_dims: DimensionVector::new(no_dims),
            ..Default::default()
        };
        desc.calculate_join_type();
        desc
    }

    /// `attr op val`
    pub fn compare(attr: &Arc<VirtualColumn>, op: Operator, val: &Arc<VirtualColumn>, no_dims: usize) -> Self {
        Self::new(
            CQTerm::new(Arc::clone(attr)),
            op,
            CQTerm::new(Arc::clone(val)),
            CQTerm::default(),
            no_dims,
        )
    }

    /// `attr BETWEEN low AND high`
    pub fn between(
        attr: &Arc<VirtualColumn>,
        low: &Arc<VirtualColumn>,
        high: &Arc<VirtualColumn>,
        no_dims: usize,
    ) -> Self {
        Self::new(
            CQTerm::new(Arc::clone(attr)),
            Operator::Between,
            CQTerm::new(Arc::clone(low)),
            CQTerm::new(Arc::clone(high)),
            no_dims,
        )
    }

    /// Operators without a right side: `IS [NOT] NULL` and `[NOT] EXISTS` over a subquery.
    pub fn unary(attr: &Arc<VirtualColumn>, op: Operator, no_dims: usize) -> Self {
        Self::new(CQTerm::new(Arc::clone(attr)), op, CQTerm::default(), CQTerm::default(), no_dims)
    }

    /// Wraps an AND/OR tree.
    pub fn from_tree(tree: DescTree, no_dims: usize) -> Self {
        let mut desc = Self {
            op: Operator::OrTree,
            left_dims: DimensionVector::new(no_dims),
            right_dims: DimensionVector::new(no_dims),
            tree: Some(Box::new(tree)),
            ..Default::default()
        };
        desc.calculate_join_type();
        desc
    }

    /// Constant `TRUE` or `FALSE`.
    pub fn trivial(value: bool, no_dims: usize) -> Self {
        Self {
            op: if value { Operator::True } else { Operator::False },
            left_dims: DimensionVector::new(no_dims),
            right_dims: DimensionVector::new(no_dims),
            desc_t: DescriptorJoinType::NonJoin,
            ..Default::default()
        }
    }

    /// Marks the descriptor as the `ON` condition of an outer join:
    /// `inner` is the preserved side, `outer` the side padded with nulls.
    pub fn outer(mut self, inner: &[usize], outer: &[usize]) -> Self {
        let size = self.right_dims.size();
        self.left_dims = DimensionVector::with_dims(size, inner);
        self.right_dims = DimensionVector::with_dims(size, outer);
        self
    }

    pub fn with_collation(mut self, collation: Collation) -> Self {
        self.collation = collation;
        self
    }

    pub fn with_like_escape(mut self, like_esc: char) -> Self {
        self.like_esc = like_esc;
        self
    }

    pub fn with_sharp(mut self, sharp: bool) -> Self {
        self.sharp = sharp;
        self
    }

    #[inline]
    pub fn attr_vc(&self) -> Option<&Arc<VirtualColumn>> {
        self.attr.vc()
    }

    #[inline]
    pub fn is_true(&self) -> bool {
        self.op == Operator::True
    }

    #[inline]
    pub fn is_false(&self) -> bool {
        self.op == Operator::False
    }

    #[inline]
    pub fn is_outer(&self) -> bool {
        !self.right_dims.is_empty()
    }

    #[inline]
    pub fn is_inner(&self) -> bool {
        self.right_dims.is_empty()
    }

    #[inline]
    pub fn is_delayed(&self) -> bool {
        self.delayed
    }

    #[inline]
    pub fn is_type_or_tree(&self) -> bool {
        self.op == Operator::OrTree
    }

    #[inline]
    pub fn is_type_join(&self) -> bool {
        matches!(self.desc_t, DescriptorJoinType::SimpleJoin | DescriptorJoinType::ComplexJoin)
    }

    #[inline]
    pub fn is_type_join_simple(&self) -> bool {
        self.desc_t == DescriptorJoinType::SimpleJoin
    }

    #[inline]
    pub fn is_type_join_complex(&self) -> bool {
        self.desc_t == DescriptorJoinType::ComplexJoin
    }

    /// Physical column against constants, or `IS [NOT] NULL` on a physical column.
    pub fn is_type_attr_val_or_attr_val_val(&self) -> bool {
        let Some(attr) = self.attr.vc() else {
            return false;
        };
        if !attr.is_single_column() {
            return false;
        }
        (self.val1.vc().is_some_and(|v| v.is_const()) || matches!(self.op, Operator::IsNull | Operator::NotNull))
            && self.val2.vc().is_none_or(|v| v.is_const())
    }

    /// Physical column against a constant value list.
    pub fn is_type_attr_multi_val(&self) -> bool {
        !matches!(self.op, Operator::Between | Operator::NotBetween)
            && self.attr.vc().is_some_and(|a| a.is_single_column())
            && self.val1.vc().is_some_and(|v| v.is_multival() && v.is_const())
    }

    /// Two physical columns of the same table.
    pub fn is_type_attr_attr(&self) -> bool {
        match (self.attr.vc(), self.val1.vc()) {
            (Some(a), Some(v)) => {
                a.is_single_column() && v.is_single_column() && self.val2.is_empty() && !self.is_type_join()
            }
            _ => false,
        }
    }

    pub fn is_type_subquery(&self) -> bool {
        [&self.attr, &self.val1, &self.val2]
            .iter()
            .any(|t| t.vc().is_some_and(|vc| vc.is_subselect()))
    }

    /// Only physical columns and constants as operands.
    pub fn is_type_expression(&self) -> bool {
        let plain = |vc: &Arc<VirtualColumn>| vc.is_single_column() || vc.is_const();
        match self.attr.vc() {
            None => false,
            Some(attr) => {
                plain(attr) && self.val1.vc().is_none_or(plain) && self.val2.vc().is_none_or(plain)
            }
        }
    }

    pub fn is_parameterized(&self) -> bool {
        [&self.attr, &self.val1, &self.val2]
            .iter()
            .any(|t| t.vc().is_some_and(|vc| vc.is_parameterized()))
            || self.tree.as_ref().is_some_and(|t| t.is_parameterized())
    }

    pub fn is_deterministic(&self) -> bool {
        [&self.attr, &self.val1, &self.val2]
            .iter()
            .all(|t| t.vc().is_none_or(|vc| vc.is_deterministic()))
    }

    /// True if no operand reads a physical column.
    pub fn without_attrs(&self) -> bool {
        match &self.tree {
            Some(tree) if self.is_type_or_tree() => tree.without_attrs(),
            _ => [&self.attr, &self.val1, &self.val2]
                .iter()
                .all(|t| t.vc().is_none_or(|vc| !vc.is_single_column())),
        }
    }

    pub fn dimension_used(&self, dims: &mut DimensionVector) {
        if let Some(tree) = &self.tree {
            tree.dimension_used(dims);
        }
        self.attr.mark_used_dims(dims);
        self.val1.mark_used_dims(dims);
        self.val2.mark_used_dims(dims);
    }

    /// Dimensions read by the descriptor, sized like its dimension vectors.
    pub fn used_dims(&self) -> DimensionVector {
        let mut dims = DimensionVector::new(self.right_dims.size());
        self.dimension_used(&mut dims);
        dims
    }

    pub fn calculate_join_type(&mut self) {
        let no_dims = self.right_dims.size();
        if self.is_type_or_tree() {
            let mut used = DimensionVector::new(no_dims);
            if let Some(tree) = &self.tree {
                tree.dimension_used(&mut used);
            }
            if used.no_one() > 1 {
                self.desc_t = DescriptorJoinType::ComplexJoin;
                self.left_dims = used;
            } else {
                self.desc_t = DescriptorJoinType::NonJoin;
            }
            return;
        }
        let tables_a = self.attr.dims(no_dims);
        let tables_v1 = self.val1.dims(no_dims);
        let tables_v2 = self.val2.dims(no_dims);
        let mut tables_all = tables_a.clone();
        tables_all.plus(&tables_v1);
        tables_all.plus(&tables_v2);

        self.desc_t = if tables_all.no_one() <= 1 {
            DescriptorJoinType::NonJoin
        } else if tables_a.no_one() > 1
            || tables_v1.no_one() > 1
            || tables_v2.no_one() > 1
            || (tables_a.is_empty() && self.op == Operator::Between)
        {
            DescriptorJoinType::ComplexJoin
        } else {
            DescriptorJoinType::SimpleJoin
        };
    }

    /// True if the result may be non trivial when some involved dimension is
    /// the null row of an outer join.
    pub fn null_may_be_true(&self) -> bool {
        if matches!(self.op, Operator::IsNull | Operator::NotNull) {
            return true;
        }
        if self.is_type_or_tree() {
            return self.tree.as_ref().is_some_and(|t| t.null_may_be_true());
        }
        if self.op == Operator::NotBetween {
            return true;
        }
        [&self.attr, &self.val1, &self.val2]
            .iter()
            .any(|t| t.vc().is_some_and(|vc| !vc.is_single_column() && !vc.is_const()))
    }

    /// Changes `a < b` into `b > a`.
    pub fn switch_sides(&mut self) {
        self.op = self.op.switch_sides();
        std::mem::swap(&mut self.attr, &mut self.val1);
    }

    pub fn equal_except_outer(&self, sec: &Descriptor) -> bool {
        self.attr == sec.attr
            && self.op == sec.op
            && self.lop == sec.lop
            && self.val1 == sec.val1
            && self.val2 == sec.val2
            && self.sharp == sec.sharp
            && self.like_esc == sec.like_esc
            && self.collation == sec.collation
            && self.null_after_simplify == sec.null_after_simplify
    }

    /// True if every row satisfying `self` satisfies `sec`. Only decided for
    /// constant descriptors on the same attribute, `false` means unknown.
    pub fn implies(&self, sec: &Descriptor) -> bool {
        if self == sec {
            return true;
        }
        if self.attr != sec.attr
            || !self.val1.is_const_or_empty()
            || !self.val2.is_const_or_empty()
            || !sec.val1.is_const_or_empty()
            || !sec.val2.is_const_or_empty()
        {
            return false;
        }
        let pos = TuplePosition::new(0, 0);
        let value = |t: &CQTerm| t.value(&pos).unwrap_or_default();
        let cmp = |a: &TypedValue, b: &TypedValue, op: Operator| a.compare(b, op, '\\');
        let (v1, v2) = (value(&self.val1), value(&self.val2));
        let (s1, s2) = (value(&sec.val1), value(&sec.val2));

        match self.op {
            Operator::Eq => {
                if sec.op == Operator::Between && cmp(&v1, &s1, Operator::MoreEq) && cmp(&v1, &s2, Operator::LessEq) {
                    return true;
                }
                if sec.op == Operator::In {
                    let contained = sec
                        .val1
                        .vc()
                        .filter(|vc| vc.is_multival())
                        .and_then(|vc| vc.set_contains(&pos, &v1, sec.collation).ok());
                    if contained.is_some_and(|c| c.is_true()) {
                        return true;
                    }
                }
                sec.op.is_simple_comparison() && sec.op != Operator::NotEq && cmp(&v1, &s1, sec.op)
            }
            Operator::LessEq => matches!(sec.op, Operator::Less | Operator::LessEq) && cmp(&v1, &s1, sec.op),
            Operator::MoreEq => matches!(sec.op, Operator::More | Operator::MoreEq) && cmp(&v1, &s1, sec.op),
            Operator::Less => matches!(sec.op, Operator::Less | Operator::LessEq) && cmp(&v1, &s1, Operator::LessEq),
            Operator::More => matches!(sec.op, Operator::More | Operator::MoreEq) && cmp(&v1, &s1, Operator::MoreEq),
            Operator::Between => {
                (sec.op == Operator::Between && cmp(&v1, &s1, Operator::MoreEq) && cmp(&v2, &s2, Operator::LessEq))
                    || (matches!(sec.op, Operator::Less | Operator::LessEq) && cmp(&v2, &s1, sec.op))
                    || (matches!(sec.op, Operator::More | Operator::MoreEq) && cmp(&v1, &s1, sec.op))
            }
            _ => false,
        }
    }

    /// Locks the source packs of every operand at `pos` until the guards drop.
    pub fn lock_source_packs(&self, pos: &TuplePosition) -> SmallVec<[PackLockGuard<'_>; 3]> {
        [&self.attr, &self.val1, &self.val2]
            .into_iter()
            .filter_map(|t| t.vc())
            .map(|vc| vc.lock_source_packs(pos))
            .collect()
    }

    /// Narrows the attribute's local statistics by what an exact pass of this
    /// descriptor guarantees about the surviving rows.
    pub fn update_vc_statistics(&self) {
        let Some(attr) = self.attr.vc() else {
            return;
        };
        if self.is_type_or_tree() || !self.is_inner() || self.delayed {
            return;
        }
        if self.op == Operator::IsNull {
            attr.statistics().set_nulls(NullInfo::NullsOnly);
            return;
        }
        if matches!(self.op, Operator::True | Operator::False) {
            return;
        }
        attr.statistics().set_nulls(NullInfo::NoNulls);

        let column_type = attr.column_type();
        if column_type.is_numeric() || (column_type.is_lookup() && self.encoded) {
            let min_of = |t: &CQTerm| t.vc().map(|vc| vc.rough_min()).unwrap_or_default();
            let max_of = |t: &CQTerm| t.vc().map(|vc| vc.rough_max()).unwrap_or_default();
            let (min, max) = match self.op {
                Operator::Between if !self.sharp => (min_of(&self.val1), max_of(&self.val2)),
                Operator::Eq => {
                    let (min, max) = (min_of(&self.val1), max_of(&self.val1));
                    if let Some(v1) = self.val1.vc() {
                        v1.statistics().set_min_max(attr.rough_min(), attr.rough_max());
                    }
                    (min, max)
                }
                Operator::Less | Operator::LessEq => (TypedValue::Null, max_of(&self.val1)),
                Operator::More | Operator::MoreEq => (min_of(&self.val1), TypedValue::Null),
                _ => (TypedValue::Null, TypedValue::Null),
            };
            if column_type.is_lookup() || self.encoded || column_type.is_numeric() {
                attr.statistics().set_min_max(min, max);
            }
        }
        if self.op == Operator::In {
            if let Some(set) = self
                .val1
                .vc()
                .filter(|vc| vc.is_const() && vc.is_multival())
                .and_then(|vc| vc.set_values(&TuplePosition::new(0, 0)).ok())
            {
                attr.statistics().set_distinct(set.distinct() as u64);
            }
        }
    }

    /// True if the descriptor can be answered by the primary key index of the only table.
    pub fn is_left_index_search(&self, index_search: bool, no_tables: usize) -> bool {
        if !index_search || self.is_type_or_tree() || no_tables != 1 {
            return false;
        }
        if !self.is_type_attr_val_or_attr_val_val() || !self.encoded {
            return false;
        }
        self.attr
            .vc()
            .and_then(|vc| vc.as_single())
            .is_some_and(|single| single.is_index_searchable(self))
    }
}

impl PartialEq for Descriptor {
    fn eq(&self, sec: &Self) -> bool {
        self.equal_except_outer(sec)
            && self.encoded == sec.encoded
            && self.delayed == sec.delayed
            && self.left_dims.same_dims(&sec.left_dims)
            && self.right_dims.same_dims(&sec.right_dims)
            && match (&self.tree, &sec.tree) {
                (None, None) => true,
                (Some(a), Some(b)) => std::ptr::eq(a.as_ref(), b.as_ref()),
                _ => false,
            }
    }
}
