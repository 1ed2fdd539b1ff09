use smallvec::SmallVec;

/// Bitmap of the rows of one pack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackBlock {
    bits: SmallVec<[u64; 4]>,
    len: u32,
}

impl PackBlock {
    pub fn new(len: u32, full: bool) -> Self {
        let words = (len as usize).div_ceil(64);
        let mut block = Self {
            bits: SmallVec::from_elem(0, words),
            len,
        };
        if full {
            block.set_all();
        }
        block
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn get(&self, i: u32) -> bool {
        i < self.len && self.bits[(i / 64) as usize] & (1u64 << (i % 64)) != 0
    }

    #[inline]
    pub fn set(&mut self, i: u32) {
        if i < self.len {
            self.bits[(i / 64) as usize] |= 1u64 << (i % 64);
        }
    }

    #[inline]
    pub fn reset(&mut self, i: u32) {
        if i < self.len {
            self.bits[(i / 64) as usize] &= !(1u64 << (i % 64));
        }
    }

    pub fn set_all(&mut self) {
        let full_words = (self.len / 64) as usize;
        for w in self.bits.iter_mut().take(full_words) {
            *w = u64::MAX;
        }
        let rest = self.len % 64;
        if rest > 0 {
            self.bits[full_words] = (1u64 << rest) - 1;
        }
    }

    pub fn reset_all(&mut self) {
        self.bits.iter_mut().for_each(|w| *w = 0);
    }

    #[inline]
    pub fn count_ones(&self) -> u32 {
        self.bits.iter().map(|w| w.count_ones()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bits.iter().all(|w| *w == 0)
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count_ones() == self.len
    }

    pub fn or_with(&mut self, other: &PackBlock) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a |= *b;
        }
    }

    pub fn and_with(&mut self, other: &PackBlock) {
        for (a, b) in self.bits.iter_mut().zip(other.bits.iter()) {
            *a &= *b;
        }
    }

    /// Offsets of the set bits, ascending.
    pub fn ones(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.iter().enumerate().flat_map(|(wi, w)| {
            let mut word = *w;
            std::iter::from_fn(move || {
                if word == 0 {
                    return None;
                }
                let bit = word.trailing_zeros();
                word &= word - 1;
                Some(wi as u32 * 64 + bit)
            })
        })
    }
}

/// Exact row filter of one dimension, organised in packs of `1 << power` rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    no_obj: u64,
    power: u8,
    blocks: Vec<PackBlock>,
}

impl Filter {
    pub fn new(no_obj: u64, power: u8, full: bool) -> Self {
        let pack_rows = 1u64 << power;
        let no_packs = no_obj.div_ceil(pack_rows) as usize;
        let blocks = (0..no_packs)
            .map(|p| {
                let start = p as u64 * pack_rows;
                let len = (no_obj - start).min(pack_rows) as u32;
                PackBlock::new(len, full)
            })
            .collect();
        Self {
            no_obj,
            power,
            blocks,
        }
    }

    #[inline]
    pub fn num_of_obj(&self) -> u64 {
        self.no_obj
    }

    #[inline]
    pub fn num_of_packs(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn pack_power(&self) -> u8 {
        self.power
    }

    #[inline]
    fn split(&self, row: u64) -> (usize, u32) {
        ((row >> self.power) as usize, (row & ((1u64 << self.power) - 1)) as u32)
    }

    #[inline]
    pub fn get(&self, row: u64) -> bool {
        let (p, i) = self.split(row);
        self.blocks.get(p).is_some_and(|b| b.get(i))
    }

    #[inline]
    pub fn set(&mut self, row: u64) {
        let (p, i) = self.split(row);
        if let Some(b) = self.blocks.get_mut(p) {
            b.set(i);
        }
    }

    #[inline]
    pub fn reset(&mut self, row: u64) {
        let (p, i) = self.split(row);
        if let Some(b) = self.blocks.get_mut(p) {
            b.reset(i);
        }
    }

    pub fn reset_block(&mut self, pack: usize) {
        if let Some(b) = self.blocks.get_mut(pack) {
            b.reset_all();
        }
    }

    pub fn reset_all(&mut self) {
        self.blocks.iter_mut().for_each(PackBlock::reset_all);
    }

    #[inline]
    pub fn is_full(&self, pack: usize) -> bool {
        self.blocks.get(pack).is_some_and(PackBlock::is_full)
    }

    #[inline]
    pub fn is_empty_pack(&self, pack: usize) -> bool {
        self.blocks.get(pack).is_none_or(PackBlock::is_empty)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(PackBlock::is_empty)
    }

    pub fn num_of_ones(&self) -> u64 {
        self.blocks.iter().map(|b| b.count_ones() as u64).sum()
    }

    #[inline]
    pub fn ones_in_pack(&self, pack: usize) -> u64 {
        self.blocks.get(pack).map(|b| b.count_ones() as u64).unwrap_or(0)
    }

    #[inline]
    pub fn block(&self, pack: usize) -> Option<&PackBlock> {
        self.blocks.get(pack)
    }

    #[inline]
    pub fn block_mut(&mut self, pack: usize) -> Option<&mut PackBlock> {
        self.blocks.get_mut(pack)
    }

    /// Rows of `pack` still present, ascending.
    pub fn rows_in_pack(&self, pack: usize) -> Vec<u64> {
        let base = (pack as u64) << self.power;
        self.blocks
            .get(pack)
            .map(|b| b.ones().map(|i| base + i as u64).collect())
            .unwrap_or_default()
    }

    /// All rows present, ascending.
    pub fn rows(&self) -> impl Iterator<Item = u64> + '_ {
        let power = self.power;
        self.blocks.iter().enumerate().flat_map(move |(p, b)| {
            let base = (p as u64) << power;
            b.ones().map(move |i| base + i as u64)
        })
    }

    /// Copies packs `from..=to` of `other`, the rest of this filter is left untouched.
    pub fn copy_blocks_from(&mut self, other: &Filter, from: usize, to: usize) {
        for p in from..=to.min(self.blocks.len().saturating_sub(1)) {
            if let Some(b) = other.blocks.get(p) {
                self.blocks[p] = b.clone();
            }
        }
    }

    pub fn and_with(&mut self, other: &Filter) {
        for (a, b) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            a.and_with(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_have_partial_tail() {
        let f = Filter::new(40, 4, true);
        assert_eq!(f.num_of_packs(), 3);
        assert_eq!(f.block(2).unwrap().len(), 8);
        assert_eq!(f.num_of_ones(), 40);
        assert!(f.is_full(2));
    }

    #[test]
    fn reset_and_iterate() {
        let mut f = Filter::new(150, 6, true);
        f.reset(3);
        f.reset(64);
        f.reset_block(2);
        assert!(!f.get(3));
        assert!(f.is_empty_pack(2));
        assert!(!f.is_full(0));
        assert_eq!(f.num_of_ones(), 150 - 2 - 22);
        assert_eq!(f.rows_in_pack(1).first(), Some(&65));
        assert_eq!(f.rows().count() as u64, f.num_of_ones());
    }

    #[test]
    fn block_copy_is_partial() {
        let mut a = Filter::new(64, 4, true);
        let mut b = Filter::new(64, 4, true);
        b.reset_block(1);
        b.reset_block(3);
        a.copy_blocks_from(&b, 0, 1);
        assert!(a.is_empty_pack(1));
        assert!(a.is_full(3));
    }

    #[test]
    fn or_of_blocks() {
        let mut a = PackBlock::new(10, false);
        let mut b = PackBlock::new(10, false);
        a.set(1);
        b.set(9);
        a.or_with(&b);
        assert_eq!(a.ones().collect::<Vec<_>>(), vec![1, 9]);
    }
}
