use std::{fmt, sync::Arc};

use ahash::RandomState;
use dashmap::DashMap;
use smallvec::SmallVec;

use crate::core::{
    error::Result,
    multi_index::TuplePosition,
    types::{ColumnType, DimensionVector, Tribool, TypedValue},
};

use super::in_set::ValueSet;

/// Source of a (possibly correlated) subquery result.
pub trait SubqueryProvider: Send + Sync {
    /// All rows of the subquery for the outer tuple at `pos`.
    fn evaluate(&self, pos: &TuplePosition) -> Result<Vec<TypedValue>>;

    fn result_type(&self) -> ColumnType;

    /// Lower bound of any value the subquery can return, null if unknown.
    fn rough_min(&self) -> TypedValue {
        TypedValue::Null
    }

    fn rough_max(&self) -> TypedValue {
        TypedValue::Null
    }

    /// Whether the result is empty without evaluating it.
    fn rough_is_empty(&self) -> Tribool {
        Tribool::Unknown
    }

    /// Subqueries reading parameters are re-evaluated on each use.
    fn is_parameterized(&self) -> bool {
        false
    }
}

type CorrelationKey = SmallVec<[Option<u64>; 4]>;

/// Subquery used as an operand. Results are cached per correlation key.
pub struct SubSelectColumn {
    provider: Arc<dyn SubqueryProvider>,
    correlated: DimensionVector,
    cache: DashMap<CorrelationKey, Arc<ValueSet>, RandomState>,
}

impl SubSelectColumn {
    pub fn new(provider: Arc<dyn SubqueryProvider>, correlated: DimensionVector) -> Self {
        Self {
            provider,
            correlated,
            cache: DashMap::with_hasher(RandomState::new()),
        }
    }

    #[inline]
    pub fn provider(&self) -> &Arc<dyn SubqueryProvider> {
        &self.provider
    }

    #[inline]
    pub fn correlated_dims(&self) -> &DimensionVector {
        &self.correlated
    }

    #[inline]
    pub fn is_correlated(&self) -> bool {
        !self.correlated.is_empty()
    }

    pub fn results(&self, pos: &TuplePosition) -> Result<Arc<ValueSet>> {
        if self.provider.is_parameterized() {
            return Ok(Arc::new(ValueSet::new(self.provider.evaluate(pos)?)));
        }
        let key = self.correlated.iter().map(|d| pos.row(d)).collect::<CorrelationKey>();
        if let Some(hit) = self.cache.get(&key) {
            return Ok(Arc::clone(hit.value()));
        }
        let set = Arc::new(ValueSet::new(self.provider.evaluate(pos)?));
        self.cache.insert(key, Arc::clone(&set));
        Ok(set)
    }

    /// Scalar use of the subquery: its first value, null if empty.
    pub fn value(&self, pos: &TuplePosition) -> Result<TypedValue> {
        Ok(self
            .results(pos)?
            .values()
            .first()
            .cloned()
            .unwrap_or(TypedValue::Null))
    }

    #[inline]
    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

impl fmt::Debug for SubSelectColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubSelectColumn")
            .field("correlated", &self.correlated)
            .field("cached", &self.cache.len())
            .finish()
    }
}
