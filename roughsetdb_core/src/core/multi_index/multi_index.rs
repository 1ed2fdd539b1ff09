use smallvec::SmallVec;

use crate::core::{
    error::{FilterError, Result},
    types::DimensionVector,
};

use super::{CancellationFlag, Filter};

/// One tuple of a joined group, rows ordered like [`JoinedGroup::dims`].
/// `None` stands for the null row of an outer join.
pub type TupleRow = SmallVec<[Option<u64>; 4]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinedGroup {
    pub dims: SmallVec<[usize; 4]>,
    pub tuples: Vec<TupleRow>,
}

impl JoinedGroup {
    #[inline]
    pub fn slot_of(&self, dim: usize) -> Option<usize> {
        self.dims.iter().position(|d| *d == dim)
    }
}

/// Dimensions are either filtered independently or materialised together after a join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DimensionGroup {
    Filtered { dim: usize, filter: Filter },
    Joined(JoinedGroup),
    /// Only the number of tuples is known, rows were not materialised.
    Counted { dims: SmallVec<[usize; 4]>, count: u64 },
}

impl DimensionGroup {
    pub fn dims(&self) -> SmallVec<[usize; 4]> {
        match self {
            DimensionGroup::Filtered { dim, .. } => SmallVec::from_elem(*dim, 1),
            DimensionGroup::Joined(g) => g.dims.clone(),
            DimensionGroup::Counted { dims, .. } => dims.clone(),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            DimensionGroup::Filtered { filter, .. } => filter.num_of_ones(),
            DimensionGroup::Joined(g) => g.tuples.len() as u64,
            DimensionGroup::Counted { count, .. } => *count,
        }
    }

    fn make_empty(&mut self) {
        match self {
            DimensionGroup::Filtered { filter, .. } => filter.reset_all(),
            DimensionGroup::Joined(g) => g.tuples.clear(),
            DimensionGroup::Counted { count, .. } => *count = 0,
        }
    }
}

/// Tuple index over all dimensions of a query.
#[derive(Debug, Clone)]
pub struct MultiIndex {
    orig_sizes: Vec<u64>,
    pack_power: u8,
    groups: Vec<DimensionGroup>,
    group_of: Vec<usize>,
    used_in_output: Vec<bool>,
    forgotten: Vec<bool>,
    no_tuples: u64,
    too_many_tuples: u64,
    cancellation: CancellationFlag,
}

impl MultiIndex {
    pub fn new(orig_sizes: Vec<u64>, pack_power: u8, too_many_tuples: u64) -> Self {
        let groups = orig_sizes
            .iter()
            .enumerate()
            .map(|(dim, size)| DimensionGroup::Filtered {
                dim,
                filter: Filter::new(*size, pack_power, true),
            })
            .collect();
        let n = orig_sizes.len();
        let mut mind = Self {
            orig_sizes,
            pack_power,
            groups,
            group_of: (0..n).collect(),
            used_in_output: vec![true; n],
            forgotten: vec![false; n],
            no_tuples: 0,
            too_many_tuples,
            cancellation: CancellationFlag::new(),
        };
        mind.update_num_of_tuples();
        mind
    }

    #[inline]
    pub fn num_of_dimensions(&self) -> usize {
        self.orig_sizes.len()
    }

    #[inline]
    pub fn pack_power(&self) -> u8 {
        self.pack_power
    }

    #[inline]
    pub fn orig_size(&self, dim: usize) -> u64 {
        self.orig_sizes.get(dim).copied().unwrap_or(0)
    }

    #[inline]
    pub fn num_of_packs(&self, dim: usize) -> usize {
        self.orig_size(dim).div_ceil(1 << self.pack_power) as usize
    }

    /// Number of distinct rows of `dim` still present.
    pub fn dim_size(&self, dim: usize) -> u64 {
        match self.group_for(dim) {
            Some(DimensionGroup::Filtered { filter, .. }) => filter.num_of_ones(),
            Some(DimensionGroup::Joined(g)) => {
                let Some(slot) = g.slot_of(dim) else {
                    return 0;
                };
                let mut seen = Filter::new(self.orig_size(dim), self.pack_power, false);
                for t in &g.tuples {
                    if let Some(row) = t[slot] {
                        seen.set(row);
                    }
                }
                seen.num_of_ones()
            }
            Some(DimensionGroup::Counted { count, .. }) => (*count).min(self.orig_size(dim)),
            None => 0,
        }
    }

    #[inline]
    pub fn group_index(&self, dim: usize) -> Option<usize> {
        self.group_of.get(dim).copied()
    }

    #[inline]
    pub fn group_for(&self, dim: usize) -> Option<&DimensionGroup> {
        self.group_index(dim).and_then(|g| self.groups.get(g))
    }

    #[inline]
    pub fn groups(&self) -> &[DimensionGroup] {
        &self.groups
    }

    #[inline]
    pub fn group(&self, index: usize) -> Option<&DimensionGroup> {
        self.groups.get(index)
    }

    #[inline]
    pub fn group_mut(&mut self, index: usize) -> Option<&mut DimensionGroup> {
        self.groups.get_mut(index)
    }

    /// Exact filter of `dim`, only for dimensions not merged by a join.
    pub fn get_filter(&self, dim: usize) -> Option<&Filter> {
        match self.group_for(dim) {
            Some(DimensionGroup::Filtered { filter, .. }) => Some(filter),
            _ => None,
        }
    }

    pub fn get_filter_mut(&mut self, dim: usize) -> Option<&mut Filter> {
        let g = self.group_index(dim)?;
        match self.groups.get_mut(g) {
            Some(DimensionGroup::Filtered { filter, .. }) => Some(filter),
            _ => None,
        }
    }

    /// Extends `dims` with every dimension sharing a group with one of them.
    pub fn mark_involved_dim_groups(&self, dims: &mut DimensionVector) {
        let touched = dims.iter().collect::<SmallVec<[usize; 8]>>();
        for dim in touched {
            if let Some(group) = self.group_for(dim) {
                for d in group.dims() {
                    dims.set(d);
                }
            }
        }
    }

    /// Indexes of the groups touching `dims`, ascending.
    pub fn groups_for_dims(&self, dims: &DimensionVector) -> SmallVec<[usize; 4]> {
        let mut out: SmallVec<[usize; 4]> = dims.iter().filter_map(|d| self.group_index(d)).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    #[inline]
    pub fn num_of_tuples(&self) -> u64 {
        self.no_tuples
    }

    pub fn update_num_of_tuples(&mut self) {
        self.no_tuples = self
            .groups
            .iter()
            .fold(1u64, |acc, g| acc.saturating_mul(g.size()));
        if self.groups.is_empty() {
            self.no_tuples = 0;
        }
    }

    /// Tuple count of the cross product of `groups`.
    pub fn num_of_tuples_in(&self, groups: &[usize]) -> u64 {
        groups
            .iter()
            .filter_map(|g| self.groups.get(*g))
            .fold(1u64, |acc, g| acc.saturating_mul(g.size()))
    }

    #[inline]
    pub fn zero_tuples(&self) -> bool {
        self.no_tuples == 0
    }

    #[inline]
    pub fn too_many_tuples(&self) -> bool {
        self.no_tuples >= self.too_many_tuples
    }

    #[inline]
    pub fn tuple_limit(&self) -> u64 {
        self.too_many_tuples
    }

    /// Removes every tuple.
    pub fn empty(&mut self) {
        self.groups.iter_mut().for_each(DimensionGroup::make_empty);
        self.no_tuples = 0;
    }

    #[inline]
    pub fn is_used_in_output(&self, dim: usize) -> bool {
        self.used_in_output.get(dim).copied().unwrap_or(false)
    }

    pub fn set_used_in_output(&mut self, dim: usize, used: bool) {
        if let Some(slot) = self.used_in_output.get_mut(dim) {
            *slot = used;
        }
    }

    /// Marks a dimension whose row numbers are no longer needed after joins.
    pub fn forget(&mut self, dim: usize) {
        if let Some(slot) = self.forgotten.get_mut(dim) {
            *slot = true;
        }
    }

    #[inline]
    pub fn is_forgotten(&self, dim: usize) -> bool {
        self.forgotten.get(dim).copied().unwrap_or(false)
    }

    #[inline]
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    pub fn set_cancellation(&mut self, flag: CancellationFlag) {
        self.cancellation = flag;
    }

    #[inline]
    pub fn check_killed(&self) -> Result<()> {
        self.cancellation.check()
    }

    /// Replaces the groups touching `joined.dims` with the materialised join result.
    pub fn replace_with_joined(&mut self, joined: JoinedGroup) -> Result<()> {
        let dims = DimensionVector::with_dims(self.num_of_dimensions(), &joined.dims);
        self.replace_groups(&dims, DimensionGroup::Joined(joined))
    }

    /// Replaces the groups touching `dims` with a bare tuple count.
    /// Such a multi index is only good for [`MultiIndex::num_of_tuples`].
    pub fn commit_count_only(&mut self, dims: &DimensionVector, count: u64) -> Result<()> {
        let group = DimensionGroup::Counted {
            dims: dims.iter().collect(),
            count,
        };
        self.replace_groups(dims, group)
    }

    fn replace_groups(&mut self, dims: &DimensionVector, group: DimensionGroup) -> Result<()> {
        let mut involved = dims.clone();
        self.mark_involved_dim_groups(&mut involved);
        if !dims.same_dims(&involved) {
            return Err(FilterError::Internal(
                "join result does not cover whole dimension groups".into(),
            ));
        }
        let replaced = self.groups_for_dims(dims);
        let mut kept = Vec::with_capacity(self.groups.len() - replaced.len() + 1);
        for (i, g) in std::mem::take(&mut self.groups).into_iter().enumerate() {
            if !replaced.contains(&i) {
                kept.push(g);
            }
        }
        kept.push(group);
        self.groups = kept;
        self.rebuild_group_map();
        self.update_num_of_tuples();
        Ok(())
    }

    /// Materialises the cross product of all groups touching `dims` into one group.
    pub fn merge_groups_cross(&mut self, dims: &DimensionVector) -> Result<()> {
        let groups = self.groups_for_dims(dims);
        if groups.len() <= 1 {
            return Ok(());
        }
        if self.num_of_tuples_in(&groups) >= self.too_many_tuples {
            return Err(FilterError::OutOfMemory(format!(
                "cross product of {} groups exceeds the tuple limit",
                groups.len()
            )));
        }

        let mut result = JoinedGroup {
            dims: SmallVec::new(),
            tuples: vec![TupleRow::new()],
        };
        for &g in &groups {
            let (dims, members): (SmallVec<[usize; 4]>, Vec<TupleRow>) = match &self.groups[g] {
                DimensionGroup::Filtered { dim, filter } => (
                    SmallVec::from_elem(*dim, 1),
                    filter.rows().map(|r| SmallVec::from_elem(Some(r), 1)).collect(),
                ),
                DimensionGroup::Joined(j) => (j.dims.clone(), j.tuples.clone()),
                DimensionGroup::Counted { .. } => {
                    return Err(FilterError::Unsupported(
                        "counted dimension groups can not be materialised".into(),
                    ));
                }
            };
            let mut next = Vec::with_capacity(result.tuples.len() * members.len());
            for prefix in &result.tuples {
                for m in &members {
                    let mut t = prefix.clone();
                    t.extend_from_slice(m);
                    next.push(t);
                }
            }
            result.dims.extend_from_slice(&dims);
            result.tuples = next;
            self.check_killed()?;
        }
        self.replace_with_joined(result)
    }

    fn rebuild_group_map(&mut self) {
        for (gi, g) in self.groups.iter().enumerate() {
            for d in g.dims() {
                self.group_of[d] = gi;
            }
        }
    }
}
