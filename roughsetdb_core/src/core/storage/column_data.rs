use std::collections::HashSet;

use ahash::RandomState;

use crate::core::types::{ColumnType, TypedValue, ValueKey};

/// Summary of one pack of a column, the only data rough evaluation reads.
#[derive(Debug, Clone, PartialEq)]
pub struct PackStatistics {
    pub min: TypedValue,
    pub max: TypedValue,
    pub null_count: u64,
    pub row_count: u64,
    pub deleted_count: u64,
}

impl PackStatistics {
    #[inline]
    pub fn nulls_only(&self) -> bool {
        self.null_count == self.row_count
    }
}

#[derive(Debug)]
pub struct ColumnData {
    name: String,
    column_type: ColumnType,
    /// Lookup columns hold dictionary codes here.
    values: Vec<TypedValue>,
    dictionary: Option<Vec<String>>,
    deleted: Vec<bool>,
    pack_power: u8,
    packs: Vec<PackStatistics>,
    null_count: u64,
    distinct_values: u64,
}

impl ColumnData {
    /// Builds a column, computing pack statistics with packs of `1 << pack_power` rows.
    /// Values of a lookup column are given as strings and replaced by dictionary codes.
    pub fn new(name: &str, column_type: ColumnType, values: Vec<TypedValue>, pack_power: u8) -> Self {
        let (values, dictionary) = if column_type.is_lookup() {
            let mut dictionary: Vec<String> = Vec::new();
            let codes = values
                .into_iter()
                .map(|v| match v.to_text() {
                    Some(text) => {
                        let code = match dictionary.iter().position(|d| *d == text) {
                            Some(code) => code,
                            None => {
                                dictionary.push(text);
                                dictionary.len() - 1
                            }
                        };
                        TypedValue::Int(code as i64)
                    }
                    None => TypedValue::Null,
                })
                .collect::<Vec<_>>();
            (codes, Some(dictionary))
        } else {
            let values = values
                .into_iter()
                .map(|v| v.coerce_to(column_type).unwrap_or(TypedValue::Null))
                .collect::<Vec<_>>();
            (values, None)
        };

        let distinct: HashSet<ValueKey, RandomState> = values
            .iter()
            .filter_map(ValueKey::from_value)
            .collect();

        let mut column = Self {
            name: name.to_string(),
            column_type,
            deleted: vec![false; values.len()],
            null_count: values.iter().filter(|v| v.is_null()).count() as u64,
            distinct_values: distinct.len() as u64,
            values,
            dictionary,
            pack_power,
            packs: Vec::new(),
        };
        column.rebuild_statistics();
        column
    }

    pub(crate) fn mark_deleted(&mut self, rows: &[u64]) {
        for &row in rows {
            if let Some(slot) = self.deleted.get_mut(row as usize) {
                *slot = true;
            }
        }
        self.rebuild_statistics();
    }

    fn rebuild_statistics(&mut self) {
        let pack_rows = 1usize << self.pack_power;
        self.packs = self
            .values
            .chunks(pack_rows)
            .zip(self.deleted.chunks(pack_rows))
            .map(|(values, deleted)| {
                let mut min = TypedValue::Null;
                let mut max = TypedValue::Null;
                let mut null_count = 0;
                for v in values {
                    if v.is_null() {
                        null_count += 1;
                        continue;
                    }
                    if min.is_null() || v.sql_cmp(&min) == Some(std::cmp::Ordering::Less) {
                        min = v.clone();
                    }
                    if max.is_null() || v.sql_cmp(&max) == Some(std::cmp::Ordering::Greater) {
                        max = v.clone();
                    }
                }
                PackStatistics {
                    min,
                    max,
                    null_count,
                    row_count: values.len() as u64,
                    deleted_count: deleted.iter().filter(|d| **d).count() as u64,
                }
            })
            .collect();
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }

    #[inline]
    pub fn num_rows(&self) -> u64 {
        self.values.len() as u64
    }

    #[inline]
    pub fn num_packs(&self) -> usize {
        self.packs.len()
    }

    /// Stored representation, the dictionary code for lookup columns.
    #[inline]
    pub fn raw_value(&self, row: u64) -> &TypedValue {
        self.values.get(row as usize).unwrap_or(&TypedValue::Null)
    }

    /// Value as seen by SQL, lookup codes are decoded.
    pub fn value(&self, row: u64) -> TypedValue {
        let raw = self.raw_value(row);
        match (&self.dictionary, raw) {
            (Some(dictionary), TypedValue::Int(code)) => dictionary
                .get(*code as usize)
                .map(|s| TypedValue::Str(s.clone()))
                .unwrap_or(TypedValue::Null),
            _ => raw.clone(),
        }
    }

    #[inline]
    pub fn is_null(&self, row: u64) -> bool {
        self.raw_value(row).is_null()
    }

    #[inline]
    pub fn is_deleted(&self, row: u64) -> bool {
        self.deleted.get(row as usize).copied().unwrap_or(false)
    }

    #[inline]
    pub fn pack_statistics(&self, pack: usize) -> Option<&PackStatistics> {
        self.packs.get(pack)
    }

    pub fn has_deleted_rows(&self) -> bool {
        self.packs.iter().any(|p| p.deleted_count > 0)
    }

    #[inline]
    pub fn nulls_possible(&self) -> bool {
        self.null_count > 0
    }

    #[inline]
    pub fn null_count(&self) -> u64 {
        self.null_count
    }

    #[inline]
    pub fn distinct_values(&self) -> u64 {
        self.distinct_values
    }

    /// Dictionary code of `text`, `None` if the text never occurs in a lookup column.
    pub fn lookup_code(&self, text: &str) -> Option<i64> {
        self.dictionary
            .as_ref()?
            .iter()
            .position(|d| d == text)
            .map(|code| code as i64)
    }

    /// Texts of a lookup column indexed by code.
    #[inline]
    pub fn dictionary(&self) -> Option<&[String]> {
        self.dictionary.as_deref()
    }

    /// Minimum and maximum over all packs, nulls excluded.
    pub fn min_max(&self) -> (TypedValue, TypedValue) {
        let mut min = TypedValue::Null;
        let mut max = TypedValue::Null;
        for pack in &self.packs {
            if !pack.min.is_null()
                && (min.is_null() || pack.min.sql_cmp(&min) == Some(std::cmp::Ordering::Less))
            {
                min = pack.min.clone();
            }
            if !pack.max.is_null()
                && (max.is_null() || pack.max.sql_cmp(&max) == Some(std::cmp::Ordering::Greater))
            {
                max = pack.max.clone();
            }
        }
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_statistics_are_computed_per_pack() {
        let values = (0..40).map(|i| if i % 10 == 3 { TypedValue::Null } else { TypedValue::Int(i) }).collect();
        let column = ColumnData::new("a", ColumnType::Int, values, 4);
        assert_eq!(column.num_packs(), 3);
        let p0 = column.pack_statistics(0).unwrap();
        assert_eq!(p0.min, TypedValue::Int(0));
        assert_eq!(p0.max, TypedValue::Int(15));
        assert_eq!(p0.null_count, 2);
        let p2 = column.pack_statistics(2).unwrap();
        assert_eq!(p2.row_count, 8);
        assert_eq!(p2.max, TypedValue::Int(39));
        assert!(column.nulls_possible());
        assert_eq!(column.distinct_values(), 36);
    }

    #[test]
    fn lookup_columns_store_codes() {
        let values = vec!["b".into(), "a".into(), "b".into(), TypedValue::Null];
        let column = ColumnData::new("s", ColumnType::Lookup, values, 4);
        assert_eq!(column.raw_value(0), &TypedValue::Int(0));
        assert_eq!(column.value(1), TypedValue::from("a"));
        assert_eq!(column.lookup_code("b"), Some(0));
        assert_eq!(column.lookup_code("zzz"), None);
        assert!(column.is_null(3));
    }

    #[test]
    fn deletions_are_counted() {
        let values = (0..20).map(TypedValue::Int).collect();
        let mut column = ColumnData::new("a", ColumnType::Int, values, 4);
        column.mark_deleted(&[1, 17]);
        assert!(column.is_deleted(17));
        assert_eq!(column.pack_statistics(0).unwrap().deleted_count, 1);
        assert_eq!(column.pack_statistics(1).unwrap().deleted_count, 1);
        assert!(column.has_deleted_rows());
    }
}
