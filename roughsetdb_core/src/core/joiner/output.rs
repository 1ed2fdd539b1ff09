use std::collections::HashSet;

use ahash::RandomState;
use smallvec::SmallVec;

use crate::core::{
    error::{FilterError, Result},
    multi_index::{JoinedGroup, MIIterator, MultiIndex, TuplePosition, TupleRow},
    types::DimensionVector,
};

use super::JoinTips;

/// Index of side tuple `i` in the 32-bit form the joiners keep, `None` past `u32::MAX`.
#[inline]
pub fn side_index(i: usize) -> Option<u32> {
    u32::try_from(i).ok()
}

/// Materialised tuples of one side of a join, rows ordered like `dims`.
#[derive(Debug, Clone, Default)]
pub struct SideTuples {
    pub dims: SmallVec<[usize; 4]>,
    pub rows: Vec<TupleRow>,
}

impl SideTuples {
    /// Collects every tuple of the groups covering `dims`, which should be whole groups.
    pub fn collect(mind: &MultiIndex, dims: &DimensionVector) -> Result<Self> {
        let mut side = Self {
            dims: dims.iter().collect(),
            rows: Vec::new(),
        };
        let mut it = MIIterator::new(mind, dims);
        while it.is_valid() {
            if it.packrow_started() {
                mind.check_killed()?;
            }
            let pos = it.position();
            side.rows.push(side.dims.iter().map(|d| pos.row(*d)).collect());
            it.advance();
        }
        Ok(side)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Moves tuple `i` into `pos`.
    #[inline]
    pub fn write(&self, i: usize, pos: &mut TuplePosition) {
        if let Some(row) = self.rows.get(i) {
            for (slot, dim) in self.dims.iter().enumerate() {
                pos.set_row(*dim, row[slot]);
            }
        }
    }
}

/// Collects the result tuples of a join and commits them as one dimension group.
pub struct JoinOutput {
    dims: SmallVec<[usize; 4]>,
    tuples: Vec<TupleRow>,
    count: u64,
    limit: Option<u64>,
    tuple_limit: u64,
    count_only: bool,
    forget: SmallVec<[usize; 4]>,
    distinct_slots: SmallVec<[usize; 4]>,
    seen: HashSet<TupleRow, RandomState>,
}

impl JoinOutput {
    pub fn new(mind: &MultiIndex, dims: &DimensionVector, tips: &JoinTips) -> Self {
        let dims: SmallVec<[usize; 4]> = dims.iter().collect();
        let flagged = |flags: &[bool], d: usize| flags.get(d).copied().unwrap_or(false);
        let distinct_slots = dims
            .iter()
            .enumerate()
            .filter(|(_, d)| flagged(&tips.distinct_only, **d))
            .map(|(slot, _)| slot)
            .collect();
        let forget = dims.iter().copied().filter(|d| flagged(&tips.forget_now, *d)).collect();
        Self {
            dims,
            tuples: Vec::new(),
            count: 0,
            limit: tips.limit,
            tuple_limit: mind.tuple_limit(),
            count_only: tips.count_only,
            forget,
            distinct_slots,
            seen: HashSet::with_hasher(RandomState::new()),
        }
    }

    /// Adds the tuple under `pos`. `false` once the limit is reached.
    pub fn push(&mut self, pos: &TuplePosition) -> Result<bool> {
        let row: TupleRow = self.dims.iter().map(|d| pos.row(*d)).collect();
        self.push_row(row)
    }

    /// Adds the tuple under `pos` with the null row on `null_dims`.
    pub fn push_with_nulls(&mut self, pos: &TuplePosition, null_dims: &DimensionVector) -> Result<bool> {
        let row: TupleRow = self
            .dims
            .iter()
            .map(|d| if null_dims.get(*d) { None } else { pos.row(*d) })
            .collect();
        self.push_row(row)
    }

    fn push_row(&mut self, row: TupleRow) -> Result<bool> {
        if self.is_full() {
            return Ok(false);
        }
        if !self.distinct_slots.is_empty() {
            let key: TupleRow = self.distinct_slots.iter().map(|s| row[*s]).collect();
            if !self.seen.insert(key) {
                return Ok(true);
            }
        }
        self.count += 1;
        if !self.count_only && self.count >= self.tuple_limit {
            return Err(FilterError::OutOfMemory(format!(
                "join result exceeds {} tuples",
                self.tuple_limit
            )));
        }
        if !self.count_only {
            self.tuples.push(row);
        }
        Ok(!self.is_full())
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|l| self.count >= l)
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Replaces the joined groups in `mind`. Returns the number of result tuples.
    pub fn commit(self, mind: &mut MultiIndex) -> Result<u64> {
        let count = self.count;
        if self.count_only {
            let dims = DimensionVector::with_dims(mind.num_of_dimensions(), &self.dims);
            mind.commit_count_only(&dims, count)?;
        } else {
            mind.replace_with_joined(JoinedGroup {
                dims: self.dims,
                tuples: self.tuples,
            })?;
        }
        for dim in self.forget {
            mind.forget(dim);
        }
        Ok(count)
    }
}
