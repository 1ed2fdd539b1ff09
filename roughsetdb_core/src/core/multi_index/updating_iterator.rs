use crate::core::{
    error::{FilterError, Result},
    types::DimensionVector,
};

use super::{DimensionGroup, Filter, JoinedGroup, MultiIndex, PackBlock, TuplePosition};

enum UpdateTarget {
    Filter { dim: usize, filter: Filter },
    Tuples { group: JoinedGroup, keep: Vec<bool> },
}

/// Saved state of one pack, used to OR the results of two tree branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackFilter {
    Block(PackBlock),
    Tuples(Vec<bool>),
}

/// Iterator over one dimension group which removes the tuples it resets.
///
/// Works on a private copy of the group; nothing reaches the multi index
/// before [`MIUpdatingIterator::commit`]. A filtered group may be restricted
/// to a pack range so that tasks owning disjoint ranges can run side by side.
pub struct MIUpdatingIterator {
    group_index: usize,
    target: UpdateTarget,
    pack_power: u8,
    first_pack: usize,
    last_pack: usize,
    units: Vec<usize>,
    unit: usize,
    members: Vec<u64>,
    offset: usize,
    position: TuplePosition,
    valid: bool,
    packrow_started: bool,
}

impl MIUpdatingIterator {
    /// `dims` must lie in a single group of `mind`.
    pub fn new(mind: &MultiIndex, dims: &DimensionVector) -> Result<Self> {
        let groups = mind.groups_for_dims(dims);
        if groups.len() != 1 {
            return Err(FilterError::Internal(format!(
                "updating iterator needs exactly one dimension group, got {}",
                groups.len()
            )));
        }
        let group_index = groups[0];
        match mind.group(group_index) {
            Some(DimensionGroup::Filtered { dim, filter }) => {
                let last = filter.num_of_packs().saturating_sub(1);
                Ok(Self::over_filter(mind, group_index, *dim, filter.clone(), 0, last))
            }
            Some(DimensionGroup::Joined(g)) => {
                let keep = vec![true; g.tuples.len()];
                let chunks = g.tuples.len().div_ceil(1 << mind.pack_power());
                let mut it = Self::empty_for(mind, group_index, UpdateTarget::Tuples { group: g.clone(), keep });
                it.last_pack = chunks.saturating_sub(1);
                it.units = (0..chunks).collect();
                it.start();
                Ok(it)
            }
            Some(DimensionGroup::Counted { .. }) => Err(FilterError::Internal(
                "tuples of a counted group can not be updated".into(),
            )),
            None => Err(FilterError::Internal("unknown dimension group".into())),
        }
    }

    /// Iterator over packs `from..=to` of the filtered dimension `dim`.
    pub fn for_pack_range(mind: &MultiIndex, dim: usize, from: usize, to: usize) -> Result<Self> {
        let group_index = mind
            .group_index(dim)
            .ok_or_else(|| FilterError::Internal(format!("unknown dimension {}", dim)))?;
        let filter = mind
            .get_filter(dim)
            .ok_or_else(|| FilterError::Internal(format!("dimension {} has no filter", dim)))?;
        Ok(Self::over_filter(mind, group_index, dim, filter.clone(), from, to))
    }

    fn empty_for(mind: &MultiIndex, group_index: usize, target: UpdateTarget) -> Self {
        Self {
            group_index,
            target,
            pack_power: mind.pack_power(),
            first_pack: 0,
            last_pack: 0,
            units: Vec::new(),
            unit: 0,
            members: Vec::new(),
            offset: 0,
            position: TuplePosition::new(mind.num_of_dimensions(), mind.pack_power()),
            valid: false,
            packrow_started: true,
        }
    }

    fn over_filter(mind: &MultiIndex, group_index: usize, dim: usize, filter: Filter, from: usize, to: usize) -> Self {
        let units = (from..=to.min(filter.num_of_packs().saturating_sub(1)))
            .filter(|p| !filter.is_empty_pack(*p))
            .collect();
        let mut it = Self::empty_for(mind, group_index, UpdateTarget::Filter { dim, filter });
        it.first_pack = from;
        it.last_pack = to;
        it.units = units;
        it.start();
        it
    }

    fn start(&mut self) {
        self.unit = 0;
        self.load_unit();
    }

    /// Loads the members of `self.unit`, skipping units emptied meanwhile.
    fn load_unit(&mut self) {
        self.offset = 0;
        self.packrow_started = true;
        while self.unit < self.units.len() {
            let u = self.units[self.unit];
            self.members = self.unit_members(u);
            if !self.members.is_empty() {
                self.valid = true;
                self.refresh_position();
                return;
            }
            self.unit += 1;
        }
        self.members.clear();
        self.valid = false;
    }

    fn unit_members(&self, unit: usize) -> Vec<u64> {
        match &self.target {
            UpdateTarget::Filter { filter, .. } => filter.rows_in_pack(unit),
            UpdateTarget::Tuples { keep, .. } => {
                let (from, to) = self.chunk_bounds(unit, keep.len());
                (from..to).filter(|i| keep[*i]).map(|i| i as u64).collect()
            }
        }
    }

    #[inline]
    fn chunk_bounds(&self, chunk: usize, len: usize) -> (usize, usize) {
        let size = 1usize << self.pack_power;
        let from = (chunk * size).min(len);
        (from, (from + size).min(len))
    }

    fn refresh_position(&mut self) {
        let Some(member) = self.members.get(self.offset).copied() else {
            return;
        };
        match &self.target {
            UpdateTarget::Filter { dim, .. } => self.position.set_row(*dim, Some(member)),
            UpdateTarget::Tuples { group, .. } => {
                if let Some(t) = group.tuples.get(member as usize) {
                    for (slot, dim) in group.dims.iter().enumerate() {
                        self.position.set_row(*dim, t[slot]);
                    }
                }
            }
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    #[inline]
    pub fn position(&self) -> &TuplePosition {
        &self.position
    }

    #[inline]
    pub fn packrow_started(&self) -> bool {
        self.packrow_started
    }

    #[inline]
    pub fn group_index(&self) -> usize {
        self.group_index
    }

    /// Pack of the filtered dimension, or the tuple chunk of a joined group.
    #[inline]
    pub fn current_pack(&self) -> usize {
        self.units.get(self.unit).copied().unwrap_or(usize::MAX)
    }

    /// The dimension whose packs are iterated, if the group is a single filtered one.
    #[inline]
    pub fn single_filter_dim(&self) -> Option<usize> {
        match &self.target {
            UpdateTarget::Filter { dim, .. } => Some(*dim),
            UpdateTarget::Tuples { .. } => None,
        }
    }

    pub fn advance(&mut self) {
        if !self.valid {
            return;
        }
        self.offset += 1;
        if self.offset < self.members.len() {
            self.packrow_started = false;
            self.refresh_position();
        } else {
            self.next_packrow();
        }
    }

    pub fn next_packrow(&mut self) {
        if !self.valid {
            return;
        }
        self.unit += 1;
        self.load_unit();
    }

    pub fn rewind(&mut self) {
        self.start();
    }

    /// Positions the iterator at `pack`. Returns false if the pack has no rows left,
    /// the iterator then stands on the next pack holding rows.
    pub fn rewind_to_pack(&mut self, pack: usize) -> bool {
        self.unit = self.units.partition_point(|u| *u < pack);
        self.load_unit();
        self.valid && self.current_pack() == pack
    }

    pub fn reset_current(&mut self) {
        let Some(member) = self.members.get(self.offset).copied() else {
            return;
        };
        match &mut self.target {
            UpdateTarget::Filter { filter, .. } => filter.reset(member),
            UpdateTarget::Tuples { keep, .. } => keep[member as usize] = false,
        }
    }

    pub fn reset_current_pack(&mut self) {
        let unit = self.current_pack();
        let (from, to) = match &self.target {
            UpdateTarget::Tuples { keep, .. } => self.chunk_bounds(unit, keep.len()),
            UpdateTarget::Filter { .. } => (0, 0),
        };
        match &mut self.target {
            UpdateTarget::Filter { filter, .. } => filter.reset_block(unit),
            UpdateTarget::Tuples { keep, .. } => keep[from..to].iter_mut().for_each(|k| *k = false),
        }
    }

    /// Rows of `pack` still present in the working copy.
    pub fn ones_in_pack(&self, pack: usize) -> u64 {
        match &self.target {
            UpdateTarget::Filter { filter, .. } => filter.ones_in_pack(pack),
            UpdateTarget::Tuples { keep, .. } => {
                let (from, to) = self.chunk_bounds(pack, keep.len());
                keep[from..to].iter().filter(|k| **k).count() as u64
            }
        }
    }

    pub fn new_pack_filter(&self, pack: usize) -> PackFilter {
        match &self.target {
            UpdateTarget::Filter { filter, .. } => PackFilter::Block(
                filter
                    .block(pack)
                    .cloned()
                    .unwrap_or_else(|| PackBlock::new(0, false)),
            ),
            UpdateTarget::Tuples { keep, .. } => {
                let (from, to) = self.chunk_bounds(pack, keep.len());
                PackFilter::Tuples(keep[from..to].to_vec())
            }
        }
    }

    /// Exchanges the state of `pack` with `saved`. Returns true if they differed.
    pub fn swap_pack_filter(&mut self, pack: usize, saved: &mut PackFilter) -> bool {
        let bounds = match &self.target {
            UpdateTarget::Tuples { keep, .. } => self.chunk_bounds(pack, keep.len()),
            UpdateTarget::Filter { .. } => (0, 0),
        };
        match (&mut self.target, saved) {
            (UpdateTarget::Filter { filter, .. }, PackFilter::Block(saved)) => match filter.block_mut(pack) {
                Some(block) => {
                    let differ = *block != *saved;
                    std::mem::swap(block, saved);
                    differ
                }
                None => false,
            },
            (UpdateTarget::Tuples { keep, .. }, PackFilter::Tuples(saved)) => {
                let current = &mut keep[bounds.0..bounds.1];
                let differ = current.iter().ne(saved.iter());
                current.swap_with_slice(saved.as_mut_slice());
                differ
            }
            _ => false,
        }
    }

    pub fn or_pack_filter(&mut self, pack: usize, saved: &PackFilter) {
        let bounds = match &self.target {
            UpdateTarget::Tuples { keep, .. } => self.chunk_bounds(pack, keep.len()),
            UpdateTarget::Filter { .. } => (0, 0),
        };
        match (&mut self.target, saved) {
            (UpdateTarget::Filter { filter, .. }, PackFilter::Block(saved)) => {
                if let Some(block) = filter.block_mut(pack) {
                    block.or_with(saved);
                }
            }
            (UpdateTarget::Tuples { keep, .. }, PackFilter::Tuples(saved)) => {
                for (k, s) in keep[bounds.0..bounds.1].iter_mut().zip(saved.iter()) {
                    *k |= *s;
                }
            }
            _ => {}
        }
    }

    /// Writes the working copy back. A pack range iterator only writes its own packs.
    pub fn commit(self, mind: &mut MultiIndex) -> Result<()> {
        let (first, last) = (self.first_pack, self.last_pack);
        match (self.target, mind.group_mut(self.group_index)) {
            (UpdateTarget::Filter { filter, .. }, Some(DimensionGroup::Filtered { filter: target, .. })) => {
                target.copy_blocks_from(&filter, first, last);
            }
            (UpdateTarget::Tuples { group, keep }, Some(DimensionGroup::Joined(target))) => {
                let mut tuples = group.tuples;
                let mut i = 0;
                tuples.retain(|_| {
                    let k = keep[i];
                    i += 1;
                    k
                });
                target.tuples = tuples;
            }
            _ => {
                return Err(FilterError::Internal(
                    "dimension group changed while an updating iterator was open".into(),
                ));
            }
        }
        mind.update_num_of_tuples();
        Ok(())
    }
}
