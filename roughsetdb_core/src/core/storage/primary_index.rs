use std::ops::Bound;

use smallvec::SmallVec;

use crate::core::types::TypedValue;

use super::ColumnData;

/// Row-id range (start inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub start_row: u64,
    pub row_count: u64,
}

impl RowRange {
    #[inline]
    pub fn new(start_row: u64, row_count: u64) -> Self {
        Self {
            start_row,
            row_count,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    #[inline]
    pub fn end_row_exclusive(&self) -> u64 {
        self.start_row.saturating_add(self.row_count)
    }

    #[inline]
    pub fn contains(&self, row: u64) -> bool {
        row >= self.start_row && row < self.end_row_exclusive()
    }
}

pub type RangeVec = SmallVec<[RowRange; 64]>;

/// Sorts ranges and merges the overlapping or directly adjacent ones. Empty ranges are dropped.
pub fn merge_row_ranges(mut ranges: RangeVec) -> RangeVec {
    ranges.retain(|r| !r.is_empty());
    if ranges.len() <= 1 {
        return ranges;
    }

    ranges.sort_unstable_by(|a, b| {
        a.start_row
            .cmp(&b.start_row)
            .then_with(|| a.end_row_exclusive().cmp(&b.end_row_exclusive()))
    });

    let mut merged: RangeVec = SmallVec::with_capacity(ranges.len());
    let mut current = ranges[0];
    for r in ranges.iter().skip(1) {
        if r.start_row <= current.end_row_exclusive() {
            let end = current.end_row_exclusive().max(r.end_row_exclusive());
            current.row_count = end - current.start_row;
        } else {
            merged.push(current);
            current = *r;
        }
    }
    merged.push(current);
    merged
}

/// Sorted `(key, row)` pairs of an integer primary key column.
#[derive(Debug, Clone)]
pub struct PrimaryIndex {
    entries: Vec<(i64, u64)>,
}

impl PrimaryIndex {
    /// Returns `None` for columns whose values are not integers.
    pub fn build(column: &ColumnData) -> Option<Self> {
        if column.column_type() != crate::core::types::ColumnType::Int {
            return None;
        }
        let mut entries = (0..column.num_rows())
            .filter_map(|row| match column.raw_value(row) {
                TypedValue::Int(key) => Some((*key, row)),
                _ => None,
            })
            .collect::<Vec<_>>();
        entries.sort_unstable();
        Some(Self { entries })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows whose key lies between `low` and `high`, as merged ranges.
    pub fn lookup(&self, low: Bound<i64>, high: Bound<i64>) -> RangeVec {
        let start = match low {
            Bound::Included(v) => self.entries.partition_point(|(k, _)| *k < v),
            Bound::Excluded(v) => self.entries.partition_point(|(k, _)| *k <= v),
            Bound::Unbounded => 0,
        };
        let end = match high {
            Bound::Included(v) => self.entries.partition_point(|(k, _)| *k <= v),
            Bound::Excluded(v) => self.entries.partition_point(|(k, _)| *k < v),
            Bound::Unbounded => self.entries.len(),
        };
        if start >= end {
            return SmallVec::new();
        }

        let mut rows = self.entries[start..end]
            .iter()
            .map(|(_, row)| *row)
            .collect::<Vec<_>>();
        rows.sort_unstable();

        let mut ranges: RangeVec = SmallVec::new();
        for row in rows {
            match ranges.last_mut() {
                Some(last) if last.end_row_exclusive() == row => last.row_count += 1,
                _ => ranges.push(RowRange::new(row, 1)),
            }
        }
        merge_row_ranges(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ColumnType;

    #[test]
    fn merge_handles_overlap_and_adjacency() {
        let ranges: RangeVec = SmallVec::from_vec(vec![
            RowRange::new(10, 5),
            RowRange::new(0, 3),
            RowRange::new(3, 2),
            RowRange::new(12, 10),
            RowRange::new(40, 0),
        ]);
        let merged = merge_row_ranges(ranges);
        assert_eq!(merged.as_slice(), &[RowRange::new(0, 5), RowRange::new(10, 12)]);
    }

    #[test]
    fn lookup_returns_row_ranges() {
        let values = vec![5, 1, 2, 3, 9, 4].into_iter().map(TypedValue::Int).collect();
        let column = ColumnData::new("pk", ColumnType::Int, values, 4);
        let index = PrimaryIndex::build(&column).unwrap();
        assert_eq!(index.len(), 6);

        let ranges = index.lookup(Bound::Included(2), Bound::Included(4));
        assert_eq!(ranges.as_slice(), &[RowRange::new(2, 2), RowRange::new(5, 1)]);

        let ranges = index.lookup(Bound::Excluded(5), Bound::Unbounded);
        assert_eq!(ranges.as_slice(), &[RowRange::new(4, 1)]);

        assert!(index.lookup(Bound::Included(100), Bound::Unbounded).is_empty());
    }
}
