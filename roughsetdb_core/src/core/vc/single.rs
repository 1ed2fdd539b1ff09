use std::{ops::Bound, sync::Arc};

use crate::core::{
    descriptor::Descriptor,
    error::{FilterError, Result},
    multi_index::{MIUpdatingIterator, TuplePosition},
    storage::{ColumnData, PackStatistics, RangeVec, StoredTable},
    types::{ColumnType, Operator, TypedValue},
};

/// A column of a stored table, bound to one dimension of the query.
#[derive(Debug, Clone)]
pub struct SingleColumn {
    table: Arc<StoredTable>,
    column: usize,
    dim: usize,
}

impl SingleColumn {
    pub fn new(table: Arc<StoredTable>, column: usize, dim: usize) -> Result<Self> {
        if column >= table.num_columns() {
            return Err(FilterError::Internal(format!(
                "table {} has no column {}",
                table.name(),
                column
            )));
        }
        Ok(Self { table, column, dim })
    }

    #[inline]
    pub fn table(&self) -> &Arc<StoredTable> {
        &self.table
    }

    #[inline]
    pub fn column_index(&self) -> usize {
        self.column
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn data(&self) -> &ColumnData {
        &self.table.columns()[self.column]
    }

    #[inline]
    pub fn column_type(&self) -> ColumnType {
        self.data().column_type()
    }

    #[inline]
    pub fn row(&self, pos: &TuplePosition) -> Option<u64> {
        pos.row(self.dim)
    }

    /// Decoded value, null for the null row of an outer join.
    #[inline]
    pub fn value(&self, pos: &TuplePosition) -> TypedValue {
        match self.row(pos) {
            Some(row) => self.data().value(row),
            None => TypedValue::Null,
        }
    }

    /// Value as stored, dictionary codes for lookup columns.
    #[inline]
    pub fn stored_value(&self, pos: &TuplePosition) -> TypedValue {
        match self.row(pos) {
            Some(row) => self.data().raw_value(row).clone(),
            None => TypedValue::Null,
        }
    }

    #[inline]
    pub fn is_null(&self, pos: &TuplePosition) -> bool {
        self.row(pos).is_none_or(|row| self.data().is_null(row))
    }

    #[inline]
    pub fn is_deleted(&self, pos: &TuplePosition) -> bool {
        self.row(pos).is_some_and(|row| self.table.is_deleted(row))
    }

    #[inline]
    pub fn pack_statistics(&self, pack: usize) -> Option<&PackStatistics> {
        self.data().pack_statistics(pack)
    }

    #[inline]
    pub fn deleted_in_pack(&self, pack: usize) -> u64 {
        self.table.deleted_in_pack(pack)
    }

    /// Non null value range of a pack, `None` for packs holding only nulls.
    pub fn pack_range(&self, pack: usize) -> Option<(TypedValue, TypedValue)> {
        let stats = self.pack_statistics(pack)?;
        if stats.nulls_only() || stats.min.is_null() || stats.max.is_null() {
            return None;
        }
        Some((stats.min.clone(), stats.max.clone()))
    }

    #[inline]
    pub fn num_packs(&self) -> usize {
        self.data().num_packs()
    }

    /// True if `desc` can be answered by a primary key range scan on this column.
    pub fn is_index_searchable(&self, desc: &Descriptor) -> bool {
        self.table.primary_key() == Some(self.column)
            && self.table.primary_index().is_some()
            && matches!(
                desc.op,
                Operator::Eq
                    | Operator::Less
                    | Operator::LessEq
                    | Operator::More
                    | Operator::MoreEq
                    | Operator::Between
            )
            && desc.val1.const_value().and_then(|v| v.as_i64()).is_some()
            && (desc.op != Operator::Between || desc.val2.const_value().and_then(|v| v.as_i64()).is_some())
    }

    /// Rows matching `desc`, found through the primary key index.
    pub fn index_lookup(&self, desc: &Descriptor) -> Result<RangeVec> {
        if !self.is_index_searchable(desc) {
            return Err(FilterError::Unsupported(format!(
                "{} is not searchable on the primary key of {}",
                desc,
                self.table.name()
            )));
        }
        let index = self
            .table
            .primary_index()
            .ok_or_else(|| FilterError::Unsupported("no primary index".into()))?;
        let v1 = desc.val1.const_value().and_then(|v| v.as_i64()).unwrap_or_default();
        let (low, high) = match desc.op {
            Operator::Eq => (Bound::Included(v1), Bound::Included(v1)),
            Operator::Less => (Bound::Unbounded, Bound::Excluded(v1)),
            Operator::LessEq => (Bound::Unbounded, Bound::Included(v1)),
            Operator::More => (Bound::Excluded(v1), Bound::Unbounded),
            Operator::MoreEq => (Bound::Included(v1), Bound::Unbounded),
            _ => {
                let v2 = desc.val2.const_value().and_then(|v| v.as_i64()).unwrap_or_default();
                if desc.sharp {
                    (Bound::Excluded(v1), Bound::Excluded(v2))
                } else {
                    (Bound::Included(v1), Bound::Included(v2))
                }
            }
        };
        Ok(index.lookup(low, high))
    }

    /// Pack loop for an encoded integer interval, reading stored values directly.
    /// Returns false when `desc` does not have that shape.
    pub fn evaluate_pack_fast(&self, it: &mut MIUpdatingIterator, desc: &Descriptor) -> Result<bool> {
        if !desc.encoded
            || desc.sharp
            || self.column_type() != ColumnType::Int
            || !matches!(desc.op, Operator::Between | Operator::NotBetween)
            || it.single_filter_dim() != Some(self.dim)
        {
            return Ok(false);
        }
        let (Some(low), Some(high)) = (
            desc.val1.const_value().and_then(|v| v.as_i64()),
            desc.val2.const_value().and_then(|v| v.as_i64()),
        ) else {
            return Ok(false);
        };
        let negated = desc.op == Operator::NotBetween;
        let data = self.data();
        loop {
            let Some(row) = it.position().row(self.dim) else {
                it.reset_current();
                it.advance();
                if !it.is_valid() || it.packrow_started() {
                    break;
                }
                continue;
            };
            let keep = match data.raw_value(row) {
                TypedValue::Int(v) => ((low..=high).contains(v) != negated) && !self.table.is_deleted(row),
                _ => false,
            };
            if !keep {
                it.reset_current();
            }
            it.advance();
            if !it.is_valid() || it.packrow_started() {
                break;
            }
        }
        Ok(true)
    }
}
