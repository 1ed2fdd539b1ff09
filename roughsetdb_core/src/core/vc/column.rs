use std::{fmt, sync::Arc};

use arc_swap::ArcSwap;

use crate::core::{
    descriptor::Descriptor,
    error::{FilterError, Result},
    multi_index::{MultiIndex, TuplePosition},
    storage::StoredTable,
    types::{Collation, ColumnType, DimensionVector, RoughSetValue, Tribool, TypedValue},
};

use super::{
    ExprOp, ExpressionColumn, InSetColumn, LocalStatistics, NullInfo, PackLockGuard, PackLocks,
    SingleColumn, SubSelectColumn, SubqueryProvider, TypeCastColumn, in_set::ValueSet,
};

/// A constant operand, fixed or bound to a query parameter.
#[derive(Debug, Clone)]
pub enum ConstColumn {
    Fixed(TypedValue),
    Parameter(Arc<ArcSwap<TypedValue>>),
}

impl ConstColumn {
    #[inline]
    pub fn value(&self) -> TypedValue {
        match self {
            ConstColumn::Fixed(v) => v.clone(),
            ConstColumn::Parameter(p) => TypedValue::clone(&p.load()),
        }
    }
}

#[derive(Debug)]
pub enum ColumnKind {
    Single(SingleColumn),
    Const(ConstColumn),
    Expression(ExpressionColumn),
    /// Expression over constants only.
    ConstExpression(ExpressionColumn),
    InSet(InSetColumn),
    SubSelect(SubSelectColumn),
    TypeCast(TypeCastColumn),
}

/// Read only view of a column of values, the operand of every descriptor.
#[derive(Debug)]
pub struct VirtualColumn {
    kind: ColumnKind,
    stats: LocalStatistics,
    locks: PackLocks,
}

impl VirtualColumn {
    fn from_kind(kind: ColumnKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            stats: LocalStatistics::new(),
            locks: PackLocks::new(),
        })
    }

    pub fn single(table: Arc<StoredTable>, column: usize, dim: usize) -> Result<Arc<Self>> {
        Ok(Self::from_kind(ColumnKind::Single(SingleColumn::new(table, column, dim)?)))
    }

    /// Column found by name.
    pub fn column(table: &Arc<StoredTable>, name: &str, dim: usize) -> Result<Arc<Self>> {
        let index = table
            .column_index(name)
            .ok_or_else(|| FilterError::Internal(format!("unknown column {}.{}", table.name(), name)))?;
        Self::single(Arc::clone(table), index, dim)
    }

    pub fn constant(value: impl Into<TypedValue>) -> Arc<Self> {
        Self::from_kind(ColumnKind::Const(ConstColumn::Fixed(value.into())))
    }

    pub fn parameter(slot: Arc<ArcSwap<TypedValue>>) -> Arc<Self> {
        Self::from_kind(ColumnKind::Const(ConstColumn::Parameter(slot)))
    }

    pub fn expression(op: ExprOp, args: Vec<Arc<VirtualColumn>>) -> Arc<Self> {
        Self::from_expression(ExpressionColumn::new(op, args))
    }

    pub fn from_expression(expr: ExpressionColumn) -> Arc<Self> {
        if !expr.args().is_empty() && expr.args().iter().all(|a| a.is_const()) && expr.is_deterministic() {
            Self::from_kind(ColumnKind::ConstExpression(expr))
        } else {
            Self::from_kind(ColumnKind::Expression(expr))
        }
    }

    pub fn in_set(elements: Vec<Arc<VirtualColumn>>) -> Arc<Self> {
        Self::from_kind(ColumnKind::InSet(InSetColumn::new(elements)))
    }

    /// `IN` list of constants.
    pub fn const_set<T: Into<TypedValue>>(values: impl IntoIterator<Item = T>) -> Arc<Self> {
        Self::in_set(values.into_iter().map(Self::constant).collect())
    }

    pub fn subselect(provider: Arc<dyn SubqueryProvider>, correlated: DimensionVector) -> Arc<Self> {
        Self::from_kind(ColumnKind::SubSelect(SubSelectColumn::new(provider, correlated)))
    }

    pub fn type_cast(child: Arc<VirtualColumn>, target: ColumnType) -> Arc<Self> {
        Self::from_kind(ColumnKind::TypeCast(TypeCastColumn::new(child, target)))
    }

    #[inline]
    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    #[inline]
    pub fn statistics(&self) -> &LocalStatistics {
        &self.stats
    }

    #[inline]
    pub fn pack_locks(&self) -> &PackLocks {
        &self.locks
    }

    #[inline]
    pub fn as_single(&self) -> Option<&SingleColumn> {
        match &self.kind {
            ColumnKind::Single(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_subselect(&self) -> Option<&SubSelectColumn> {
        match &self.kind {
            ColumnKind::SubSelect(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_type_cast(&self) -> Option<&TypeCastColumn> {
        match &self.kind {
            ColumnKind::TypeCast(c) => Some(c),
            _ => None,
        }
    }

    #[inline]
    pub fn is_single_column(&self) -> bool {
        matches!(self.kind, ColumnKind::Single(_))
    }

    #[inline]
    pub fn is_subselect(&self) -> bool {
        matches!(self.kind, ColumnKind::SubSelect(_))
    }

    #[inline]
    pub fn is_in_set(&self) -> bool {
        matches!(self.kind, ColumnKind::InSet(_))
    }

    #[inline]
    pub fn is_expression(&self) -> bool {
        matches!(self.kind, ColumnKind::Expression(_) | ColumnKind::ConstExpression(_))
    }

    /// Set valued operand of `IN`, `ANY`, `ALL` and `EXISTS`.
    #[inline]
    pub fn is_multival(&self) -> bool {
        matches!(self.kind, ColumnKind::InSet(_) | ColumnKind::SubSelect(_))
    }

    /// True if the value does not depend on the tuple.
    pub fn is_const(&self) -> bool {
        match &self.kind {
            ColumnKind::Const(_) | ColumnKind::ConstExpression(_) => true,
            ColumnKind::InSet(s) => s.elements().iter().all(|e| e.is_const()),
            ColumnKind::SubSelect(s) => !s.is_correlated(),
            ColumnKind::TypeCast(c) => c.child().is_const(),
            ColumnKind::Single(_) | ColumnKind::Expression(_) => false,
        }
    }

    /// True if the value changes when query parameters are rebound.
    pub fn is_parameterized(&self) -> bool {
        match &self.kind {
            ColumnKind::Const(ConstColumn::Parameter(_)) => true,
            ColumnKind::Const(ConstColumn::Fixed(_)) | ColumnKind::Single(_) => false,
            ColumnKind::Expression(e) | ColumnKind::ConstExpression(e) => {
                e.args().iter().any(|a| a.is_parameterized())
            }
            ColumnKind::InSet(s) => s.elements().iter().any(|e| e.is_parameterized()),
            ColumnKind::SubSelect(s) => s.provider().is_parameterized(),
            ColumnKind::TypeCast(c) => c.child().is_parameterized(),
        }
    }

    pub fn is_deterministic(&self) -> bool {
        match &self.kind {
            ColumnKind::Expression(e) | ColumnKind::ConstExpression(e) => e.is_deterministic(),
            ColumnKind::InSet(s) => s.elements().iter().all(|e| e.is_deterministic()),
            ColumnKind::TypeCast(c) => c.child().is_deterministic(),
            _ => true,
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match &self.kind {
            ColumnKind::Single(s) => s.column_type(),
            ColumnKind::Const(c) => match c.value() {
                TypedValue::Int(_) | TypedValue::Null => ColumnType::Int,
                TypedValue::Real(_) => ColumnType::Real,
                TypedValue::Str(_) => ColumnType::String,
            },
            ColumnKind::Expression(e) | ColumnKind::ConstExpression(e) => e.column_type(),
            ColumnKind::InSet(s) => s
                .elements()
                .first()
                .map(|e| e.column_type())
                .unwrap_or(ColumnType::Int),
            ColumnKind::SubSelect(s) => s.provider().result_type(),
            ColumnKind::TypeCast(c) => c.target(),
        }
    }

    /// The dimension of a physical column.
    #[inline]
    pub fn dim(&self) -> Option<usize> {
        self.as_single().map(SingleColumn::dim)
    }

    pub fn mark_used_dims(&self, dims: &mut DimensionVector) {
        match &self.kind {
            ColumnKind::Single(s) => dims.set(s.dim()),
            ColumnKind::Const(_) => {}
            ColumnKind::Expression(e) | ColumnKind::ConstExpression(e) => {
                e.args().iter().for_each(|a| a.mark_used_dims(dims))
            }
            ColumnKind::InSet(s) => s.elements().iter().for_each(|e| e.mark_used_dims(dims)),
            ColumnKind::SubSelect(s) => dims.plus(s.correlated_dims()),
            ColumnKind::TypeCast(c) => c.child().mark_used_dims(dims),
        }
    }

    pub fn value(&self, pos: &TuplePosition) -> Result<TypedValue> {
        match &self.kind {
            ColumnKind::Single(s) => Ok(s.value(pos)),
            ColumnKind::Const(c) => Ok(c.value()),
            ColumnKind::Expression(e) | ColumnKind::ConstExpression(e) => e.value(pos),
            ColumnKind::SubSelect(s) => s.value(pos),
            ColumnKind::TypeCast(c) => c.value(pos),
            ColumnKind::InSet(_) => Err(FilterError::Internal(
                "a value list has no single value".into(),
            )),
        }
    }

    /// Value in the stored representation, dictionary codes for lookup columns.
    pub fn stored_value(&self, pos: &TuplePosition) -> Result<TypedValue> {
        match &self.kind {
            ColumnKind::Single(s) => Ok(s.stored_value(pos)),
            _ => self.value(pos),
        }
    }

    /// Value of a constant, `None` for columns depending on the tuple.
    pub fn const_value(&self) -> Option<TypedValue> {
        if !self.is_const() || self.is_multival() {
            return None;
        }
        self.value(&TuplePosition::new(0, 0)).ok()
    }

    pub fn is_null(&self, pos: &TuplePosition) -> Result<bool> {
        match &self.kind {
            ColumnKind::Single(s) => Ok(s.is_null(pos)),
            _ => Ok(self.value(pos)?.is_null()),
        }
    }

    /// True if the row under `pos` is deleted in its table.
    #[inline]
    pub fn is_deleted(&self, pos: &TuplePosition) -> bool {
        self.as_single().is_some_and(|s| s.is_deleted(pos))
    }

    /// Set values of a multi value column.
    pub fn set_values(&self, pos: &TuplePosition) -> Result<Arc<ValueSet>> {
        match &self.kind {
            ColumnKind::InSet(s) => s.set(pos),
            ColumnKind::SubSelect(s) => s.results(pos),
            _ => Ok(Arc::new(ValueSet::new(vec![self.value(pos)?]))),
        }
    }

    /// `v IN self`, three valued.
    pub fn set_contains(&self, pos: &TuplePosition, v: &TypedValue, collation: Collation) -> Result<Tribool> {
        Ok(self.set_values(pos)?.contains(v, collation))
    }

    /// EXISTS over a subquery.
    pub fn check_exists(&self, pos: &TuplePosition) -> Result<bool> {
        Ok(!self.set_values(pos)?.is_empty())
    }

    /// Emptiness of a subquery decided without running it.
    pub fn rough_is_empty(&self) -> Tribool {
        match &self.kind {
            ColumnKind::SubSelect(s) => s.provider().rough_is_empty(),
            ColumnKind::InSet(s) if s.elements().is_empty() => Tribool::True,
            ColumnKind::InSet(_) => Tribool::False,
            _ => Tribool::Unknown,
        }
    }

    pub fn rough_min(&self) -> TypedValue {
        let own = match &self.kind {
            ColumnKind::Single(s) if s.column_type().is_lookup() => TypedValue::Null,
            ColumnKind::Single(s) => s.data().min_max().0,
            ColumnKind::Const(_) | ColumnKind::ConstExpression(_) => {
                self.const_value().unwrap_or_default()
            }
            ColumnKind::SubSelect(s) => s.provider().rough_min(),
            ColumnKind::TypeCast(c) => c.child().rough_min().coerce_to(c.target()).unwrap_or_default(),
            ColumnKind::InSet(s) if s.is_fixed() => self
                .set_values(&TuplePosition::new(0, 0))
                .map(|set| set.min().clone())
                .unwrap_or_default(),
            _ => TypedValue::Null,
        };
        narrow(own, self.stats.min(), std::cmp::Ordering::Greater)
    }

    pub fn rough_max(&self) -> TypedValue {
        let own = match &self.kind {
            ColumnKind::Single(s) if s.column_type().is_lookup() => TypedValue::Null,
            ColumnKind::Single(s) => s.data().min_max().1,
            ColumnKind::Const(_) | ColumnKind::ConstExpression(_) => {
                self.const_value().unwrap_or_default()
            }
            ColumnKind::SubSelect(s) => s.provider().rough_max(),
            ColumnKind::TypeCast(c) => c.child().rough_max().coerce_to(c.target()).unwrap_or_default(),
            ColumnKind::InSet(s) if s.is_fixed() => self
                .set_values(&TuplePosition::new(0, 0))
                .map(|set| set.max().clone())
                .unwrap_or_default(),
            _ => TypedValue::Null,
        };
        narrow(own, self.stats.max(), std::cmp::Ordering::Less)
    }

    /// Value range of one pack of a physical column.
    pub fn pack_range(&self, pack: usize) -> Option<(TypedValue, TypedValue)> {
        self.as_single()?.pack_range(pack)
    }

    pub fn nulls_possible(&self) -> bool {
        match self.stats.nulls() {
            NullInfo::NoNulls => return false,
            NullInfo::NullsOnly => return true,
            NullInfo::Unknown => {}
        }
        match &self.kind {
            ColumnKind::Single(s) => s.data().nulls_possible(),
            ColumnKind::Const(_) | ColumnKind::ConstExpression(_) => {
                self.const_value().is_none_or(|v| v.is_null())
            }
            _ => true,
        }
    }

    pub fn nulls_only(&self) -> bool {
        match self.stats.nulls() {
            NullInfo::NullsOnly => true,
            NullInfo::NoNulls => false,
            NullInfo::Unknown => match &self.kind {
                ColumnKind::Single(s) => s.data().num_rows() > 0 && s.data().null_count() == s.data().num_rows(),
                ColumnKind::Const(_) | ColumnKind::ConstExpression(_) => {
                    self.const_value().is_some_and(|v| v.is_null())
                }
                _ => false,
            },
        }
    }

    /// Estimated number of distinct values under the current multi index.
    pub fn approx_distinct_vals(&self, incl_nulls: bool, mind: Option<&MultiIndex>) -> u64 {
        let mut res = match &self.kind {
            ColumnKind::Single(s) => {
                let mut d = s.data().distinct_values();
                if let Some(mind) = mind {
                    d = d.min(mind.dim_size(s.dim()));
                }
                if let (Some(lo), Some(hi)) = (self.rough_min().as_i64(), self.rough_max().as_i64()) {
                    if s.column_type() == ColumnType::Int && hi >= lo {
                        d = d.min((hi - lo) as u64 + 1);
                    }
                }
                d
            }
            ColumnKind::Const(_) | ColumnKind::ConstExpression(_) => 1,
            ColumnKind::InSet(s) => s.elements().len() as u64,
            ColumnKind::TypeCast(c) => c.child().approx_distinct_vals(false, mind),
            ColumnKind::Expression(e) => {
                let product = e
                    .args()
                    .iter()
                    .fold(1u64, |acc, a| acc.saturating_mul(a.approx_distinct_vals(false, mind).max(1)));
                match mind {
                    Some(mind) => product.min(mind.num_of_tuples()),
                    None => product,
                }
            }
            ColumnKind::SubSelect(s) if !s.is_correlated() => 1,
            ColumnKind::SubSelect(_) => mind.map_or(1, MultiIndex::num_of_tuples),
        };
        if let Some(local) = self.stats.distinct() {
            res = res.min(local);
        }
        if incl_nulls && self.nulls_possible() {
            res += 1;
        }
        res
    }

    /// Row count of the column's source, the bound used by size estimates.
    pub fn approx_answer_size(&self, mind: &MultiIndex) -> u64 {
        match self.dim() {
            Some(dim) => mind.dim_size(dim),
            None => mind.num_of_tuples(),
        }
    }

    /// Locks the packs read at `pos`. Released when the guard drops.
    pub fn lock_source_packs(&self, _pos: &TuplePosition) -> PackLockGuard<'_> {
        self.locks.lock()
    }

    /// Pack level verdict of `desc` with this column as its attribute.
    pub fn rough_check(&self, pos: &TuplePosition, desc: &Descriptor) -> RoughSetValue {
        match &self.kind {
            ColumnKind::Single(s) => s.rough_check(pos, desc),
            _ => RoughSetValue::Some,
        }
    }
}

fn narrow(own: TypedValue, local: TypedValue, keep_if: std::cmp::Ordering) -> TypedValue {
    if own.is_null() {
        return local;
    }
    if !local.is_null() && local.sql_cmp(&own) == Some(keep_if) {
        return local;
    }
    own
}

impl fmt::Display for VirtualColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ColumnKind::Single(s) => {
                let name = s.data().name();
                write!(f, "{}.{}", s.table().name(), name)
            }
            ColumnKind::Const(c) => write!(f, "{}", c.value()),
            ColumnKind::Expression(e) | ColumnKind::ConstExpression(e) => {
                if e.op() == ExprOp::Neg {
                    if let Some(arg) = e.args().first() {
                        return write!(f, "-{}", arg);
                    }
                }
                f.write_str("(")?;
                for (i, arg) in e.args().iter().enumerate() {
                    if i > 0 {
                        write!(f, " {} ", e.op().as_str())?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            ColumnKind::InSet(s) => {
                f.write_str("(")?;
                for (i, e) in s.elements().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                f.write_str(")")
            }
            ColumnKind::SubSelect(_) => f.write_str("(subquery)"),
            ColumnKind::TypeCast(c) => write!(f, "CAST({} AS {})", c.child(), c.target()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::StoredTable;

    fn table() -> Arc<StoredTable> {
        StoredTable::builder("t", 4)
            .int_column("a", 0..40)
            .column(
                "s",
                ColumnType::String,
                (0..40).map(|i| if i % 10 == 0 { TypedValue::Null } else { TypedValue::from("x") }).collect(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn constants_and_expressions_fold() {
        let two = VirtualColumn::constant(2i64);
        let sum = VirtualColumn::expression(ExprOp::Add, vec![Arc::clone(&two), VirtualColumn::constant(3i64)]);
        assert!(sum.is_const());
        assert_eq!(sum.const_value(), Some(TypedValue::Int(5)));

        let t = table();
        let a = VirtualColumn::column(&t, "a", 0).unwrap();
        let shifted = VirtualColumn::expression(ExprOp::Add, vec![Arc::clone(&a), two]);
        assert!(!shifted.is_const());
        let mut pos = TuplePosition::new(1, 4);
        pos.set_row(0, Some(7));
        assert_eq!(shifted.value(&pos).unwrap(), TypedValue::Int(9));

        let mut dims = DimensionVector::new(1);
        shifted.mark_used_dims(&mut dims);
        assert!(dims.get(0));
    }

    #[test]
    fn parameters_are_rebindable() {
        let slot = Arc::new(ArcSwap::from_pointee(TypedValue::Int(1)));
        let p = VirtualColumn::parameter(Arc::clone(&slot));
        assert!(p.is_const() && p.is_parameterized());
        slot.store(Arc::new(TypedValue::Int(2)));
        assert_eq!(p.const_value(), Some(TypedValue::Int(2)));
    }

    #[test]
    fn statistics_narrow_rough_bounds() {
        let t = table();
        let a = VirtualColumn::column(&t, "a", 0).unwrap();
        assert_eq!(a.rough_min(), TypedValue::Int(0));
        a.statistics().set_min_max(TypedValue::Int(5), TypedValue::Int(30));
        assert_eq!(a.rough_min(), TypedValue::Int(5));
        assert_eq!(a.rough_max(), TypedValue::Int(30));
        assert_eq!(a.approx_distinct_vals(false, None), 26);

        let s = VirtualColumn::column(&t, "s", 0).unwrap();
        assert!(s.nulls_possible());
        s.statistics().set_nulls(NullInfo::NoNulls);
        assert!(!s.nulls_possible());
    }
}
