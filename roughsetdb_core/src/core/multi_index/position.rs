use smallvec::SmallVec;

/// Row numbers of the current tuple, one slot per dimension.
///
/// A slot is `None` for dimensions the iterator does not cover and for
/// null rows produced by outer joins. Rough checks only look at the pack
/// of each slot, so a position set with [`TuplePosition::set_pack`] serves
/// as a dummy iterator standing on a pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuplePosition {
    rows: SmallVec<[Option<u64>; 8]>,
    pack_power: u8,
}

impl TuplePosition {
    pub fn new(num_dims: usize, pack_power: u8) -> Self {
        Self {
            rows: SmallVec::from_elem(None, num_dims),
            pack_power,
        }
    }

    #[inline]
    pub fn num_dims(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn pack_power(&self) -> u8 {
        self.pack_power
    }

    #[inline]
    pub fn row(&self, dim: usize) -> Option<u64> {
        self.rows.get(dim).copied().flatten()
    }

    #[inline]
    pub fn pack(&self, dim: usize) -> Option<usize> {
        self.row(dim).map(|r| (r >> self.pack_power) as usize)
    }

    #[inline]
    pub fn set_row(&mut self, dim: usize, row: Option<u64>) {
        if let Some(slot) = self.rows.get_mut(dim) {
            *slot = row;
        }
    }

    #[inline]
    pub fn set_pack(&mut self, dim: usize, pack: usize) {
        self.set_row(dim, Some((pack as u64) << self.pack_power));
    }

    pub fn clear(&mut self) {
        self.rows.iter_mut().for_each(|r| *r = None);
    }
}
