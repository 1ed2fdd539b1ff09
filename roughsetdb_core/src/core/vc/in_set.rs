use std::{collections::HashSet, sync::{Arc, OnceLock}};

use ahash::RandomState;

use crate::core::{
    error::Result,
    multi_index::TuplePosition,
    types::{Collation, TypedValue, Tribool, ValueKey},
};

use super::VirtualColumn;

/// Values of a set operand, hashed for fast membership tests.
#[derive(Debug)]
pub struct ValueSet {
    values: Vec<TypedValue>,
    keys: HashSet<ValueKey, RandomState>,
    contains_null: bool,
    min: TypedValue,
    max: TypedValue,
}

impl ValueSet {
    pub fn new(values: Vec<TypedValue>) -> Self {
        let mut keys = HashSet::with_hasher(RandomState::new());
        let mut contains_null = false;
        let mut min = TypedValue::Null;
        let mut max = TypedValue::Null;
        for v in &values {
            match ValueKey::from_value(v) {
                Some(key) => {
                    keys.insert(key);
                    if min.is_null() || v.sql_cmp(&min) == Some(std::cmp::Ordering::Less) {
                        min = v.clone();
                    }
                    if max.is_null() || v.sql_cmp(&max) == Some(std::cmp::Ordering::Greater) {
                        max = v.clone();
                    }
                }
                None => contains_null = true,
            }
        }
        Self {
            values,
            keys,
            contains_null,
            min,
            max,
        }
    }

    #[inline]
    pub fn values(&self) -> &[TypedValue] {
        &self.values
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Number of distinct non null values.
    #[inline]
    pub fn distinct(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn contains_null(&self) -> bool {
        self.contains_null
    }

    #[inline]
    pub fn min(&self) -> &TypedValue {
        &self.min
    }

    #[inline]
    pub fn max(&self) -> &TypedValue {
        &self.max
    }

    /// SQL `IN`: unknown when `v` is null or the set holds a null and no match.
    pub fn contains(&self, v: &TypedValue, collation: Collation) -> Tribool {
        if self.values.is_empty() {
            return Tribool::False;
        }
        if v.is_null() {
            return Tribool::Unknown;
        }
        let found = if collation.is_binary() {
            ValueKey::from_value(v).is_some_and(|k| self.keys.contains(&k))
                || (v.is_text() && self.numeric_text_match(v))
        } else {
            self.values
                .iter()
                .any(|s| v.cmp_collated(s, collation) == Some(std::cmp::Ordering::Equal))
        };
        if found {
            Tribool::True
        } else if self.contains_null {
            Tribool::Unknown
        } else {
            Tribool::False
        }
    }

    fn numeric_text_match(&self, v: &TypedValue) -> bool {
        self.values.iter().any(|s| !s.is_text() && v.sql_eq(s))
    }
}

/// `IN (...)` list, each element an arbitrary column.
#[derive(Debug)]
pub struct InSetColumn {
    elements: Vec<Arc<VirtualColumn>>,
    cache: OnceLock<Arc<ValueSet>>,
}

impl InSetColumn {
    pub fn new(elements: Vec<Arc<VirtualColumn>>) -> Self {
        Self {
            elements,
            cache: OnceLock::new(),
        }
    }

    #[inline]
    pub fn elements(&self) -> &[Arc<VirtualColumn>] {
        &self.elements
    }

    /// True if the set does not depend on the tuple or on parameters.
    pub fn is_fixed(&self) -> bool {
        self.elements.iter().all(|e| e.is_const() && !e.is_parameterized())
    }

    pub fn set(&self, pos: &TuplePosition) -> Result<Arc<ValueSet>> {
        if self.is_fixed() {
            if let Some(cached) = self.cache.get() {
                return Ok(Arc::clone(cached));
            }
        }
        let mut values = Vec::with_capacity(self.elements.len());
        for e in &self.elements {
            values.push(e.value(pos)?);
        }
        let set = Arc::new(ValueSet::new(values));
        if self.is_fixed() {
            let _ = self.cache.set(Arc::clone(&set));
        }
        Ok(set)
    }
}
