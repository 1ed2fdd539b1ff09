use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::core::types::TypedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NullInfo {
    #[default]
    Unknown,
    NoNulls,
    NullsOnly,
}

#[derive(Debug, Clone)]
struct LocalValues {
    min: TypedValue,
    max: TypedValue,
    nulls: NullInfo,
    distinct: Option<u64>,
}

/// Statistics learned while a query runs, narrowing what the column itself knows.
///
/// Shared by every descriptor using the column, updates are published atomically.
#[derive(Debug, Default)]
pub struct LocalStatistics {
    values: ArcSwap<LocalValues>,
}

impl LocalStatistics {
    pub fn new() -> Self {
        Self {
            values: ArcSwap::from_pointee(LocalValues::default()),
        }
    }

    pub fn min(&self) -> TypedValue {
        self.values.load().min.clone()
    }

    pub fn max(&self) -> TypedValue {
        self.values.load().max.clone()
    }

    pub fn nulls(&self) -> NullInfo {
        self.values.load().nulls
    }

    pub fn distinct(&self) -> Option<u64> {
        self.values.load().distinct
    }

    /// Narrows the known range, never widens it.
    pub fn set_min_max(&self, min: TypedValue, max: TypedValue) {
        self.values.rcu(|current| {
            let mut next = LocalValues::clone(current);
            if !min.is_null()
                && (next.min.is_null() || min.sql_cmp(&next.min) == Some(std::cmp::Ordering::Greater))
            {
                next.min = min.clone();
            }
            if !max.is_null()
                && (next.max.is_null() || max.sql_cmp(&next.max) == Some(std::cmp::Ordering::Less))
            {
                next.max = max.clone();
            }
            Arc::new(next)
        });
    }

    pub fn set_nulls(&self, nulls: NullInfo) {
        self.values.rcu(|current| {
            let mut next = LocalValues::clone(current);
            next.nulls = nulls;
            Arc::new(next)
        });
    }

    pub fn set_distinct(&self, distinct: u64) {
        self.values.rcu(|current| {
            let mut next = LocalValues::clone(current);
            next.distinct = Some(next.distinct.map_or(distinct, |d| d.min(distinct)));
            Arc::new(next)
        });
    }
}

impl Default for LocalValues {
    fn default() -> Self {
        Self {
            min: TypedValue::Null,
            max: TypedValue::Null,
            nulls: NullInfo::Unknown,
            distinct: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_only_narrows() {
        let stats = LocalStatistics::new();
        stats.set_min_max(TypedValue::Int(10), TypedValue::Int(20));
        stats.set_min_max(TypedValue::Int(5), TypedValue::Int(15));
        assert_eq!(stats.min(), TypedValue::Int(10));
        assert_eq!(stats.max(), TypedValue::Int(15));
        stats.set_distinct(7);
        stats.set_distinct(9);
        assert_eq!(stats.distinct(), Some(7));
    }
}
