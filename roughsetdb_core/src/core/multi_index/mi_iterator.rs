use smallvec::SmallVec;

use crate::core::types::DimensionVector;

use super::{DimensionGroup, Filter, JoinedGroup, MultiIndex, TuplePosition};

enum GroupSource<'a> {
    Filtered { dim: usize, filter: &'a Filter },
    Joined(&'a JoinedGroup),
    Counted,
}

struct GroupCursor<'a> {
    source: GroupSource<'a>,
    /// Non empty pack numbers of a filtered group, tuple indexes of a joined one.
    units: Vec<usize>,
    unit: usize,
    offset: usize,
    rows: Vec<u64>,
}

impl<'a> GroupCursor<'a> {
    fn new(group: &'a DimensionGroup) -> Self {
        let (source, units) = match group {
            DimensionGroup::Filtered { dim, filter } => (
                GroupSource::Filtered { dim: *dim, filter },
                (0..filter.num_of_packs())
                    .filter(|p| !filter.is_empty_pack(*p))
                    .collect(),
            ),
            DimensionGroup::Joined(g) => (GroupSource::Joined(g), (0..g.tuples.len()).collect()),
            DimensionGroup::Counted { .. } => (GroupSource::Counted, Vec::new()),
        };
        let mut cursor = Self {
            source,
            units,
            unit: 0,
            offset: 0,
            rows: Vec::new(),
        };
        cursor.load_unit();
        cursor
    }

    #[inline]
    fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn load_unit(&mut self) {
        self.offset = 0;
        if let GroupSource::Filtered { filter, .. } = self.source {
            self.rows = self
                .units
                .get(self.unit)
                .map(|p| filter.rows_in_pack(*p))
                .unwrap_or_default();
        }
    }

    #[inline]
    fn unit_len(&self) -> usize {
        match self.source {
            GroupSource::Filtered { .. } => self.rows.len(),
            GroupSource::Joined(_) | GroupSource::Counted => 1,
        }
    }

    fn write_position(&self, position: &mut TuplePosition) {
        match self.source {
            GroupSource::Filtered { dim, .. } => position.set_row(dim, self.rows.get(self.offset).copied()),
            GroupSource::Joined(g) => {
                if let Some(t) = self.units.get(self.unit).and_then(|i| g.tuples.get(*i)) {
                    for (slot, dim) in g.dims.iter().enumerate() {
                        position.set_row(*dim, t[slot]);
                    }
                }
            }
            GroupSource::Counted => {}
        }
    }
}

/// Read-only iterator over the cross product of the groups covering a set of dimensions.
///
/// Tuples are visited packrow by packrow: a packrow is one pack of every
/// filtered group combined with one tuple of every joined group.
pub struct MIIterator<'a> {
    cursors: SmallVec<[GroupCursor<'a>; 4]>,
    position: TuplePosition,
    valid: bool,
    packrow_started: bool,
}

impl<'a> MIIterator<'a> {
    /// `dims` should already be extended to whole groups.
    pub fn new(mind: &'a MultiIndex, dims: &DimensionVector) -> Self {
        let cursors: SmallVec<[GroupCursor<'a>; 4]> = mind
            .groups_for_dims(dims)
            .into_iter()
            .filter_map(|g| mind.group(g))
            .map(GroupCursor::new)
            .collect();
        let valid = !cursors.is_empty() && cursors.iter().all(|c| !c.is_empty());
        let mut it = Self {
            cursors,
            position: TuplePosition::new(mind.num_of_dimensions(), mind.pack_power()),
            valid,
            packrow_started: true,
        };
        it.refresh_position();
        it
    }

    fn refresh_position(&mut self) {
        if !self.valid {
            return;
        }
        for c in &self.cursors {
            c.write_position(&mut self.position);
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

    /// Pack of `dim` in the current packrow.
    #[inline]
    pub fn current_pack(&self, dim: usize) -> Option<usize> {
        self.position.pack(dim)
    }

    pub fn advance(&mut self) {
        if !self.valid {
            return;
        }
        for c in self.cursors.iter_mut().rev() {
            c.offset += 1;
            if c.offset < c.unit_len() {
                self.packrow_started = false;
                self.refresh_position();
                return;
            }
            c.offset = 0;
        }
        self.next_packrow();
    }

    /// Skips the rest of the current packrow.
    pub fn next_packrow(&mut self) {
        if !self.valid {
            return;
        }
        for c in self.cursors.iter_mut().rev() {
            c.unit += 1;
            if c.unit < c.units.len() {
                c.load_unit();
                self.packrow_started = true;
                self.refresh_position();
                return;
            }
            c.unit = 0;
            c.load_unit();
        }
        self.valid = false;
    }

    pub fn rewind(&mut self) {
        for c in self.cursors.iter_mut() {
            c.unit = 0;
            c.load_unit();
        }
        self.valid = !self.cursors.is_empty() && self.cursors.iter().all(|c| !c.is_empty());
        self.packrow_started = true;
        self.refresh_position();
    }

    /// Rows left in the current packrow, counting the current one.
    pub fn packrow_size_left(&self) -> u64 {
        let mut size = 1u64;
        for c in &self.cursors {
            size = size.saturating_mul(c.unit_len() as u64);
        }
        size.saturating_sub(self.cursors.last().map(|c| c.offset as u64).unwrap_or(0))
    }
}
