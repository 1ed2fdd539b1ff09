use smallvec::SmallVec;

/// Set of dimensions (tables of the multi index) touched by a term or a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DimensionVector {
    v: SmallVec<[bool; 8]>,
}

impl DimensionVector {
    pub fn new(size: usize) -> Self {
        Self {
            v: SmallVec::from_elem(false, size),
        }
    }

    pub fn with_dims(size: usize, dims: &[usize]) -> Self {
        let mut dv = Self::new(size);
        for &d in dims {
            dv.set(d);
        }
        dv
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.v.len()
    }

    #[inline]
    pub fn get(&self, dim: usize) -> bool {
        self.v.get(dim).copied().unwrap_or(false)
    }

    #[inline]
    pub fn set(&mut self, dim: usize) {
        if dim >= self.v.len() {
            self.v.resize(dim + 1, false);
        }
        self.v[dim] = true;
    }

    #[inline]
    pub fn reset(&mut self, dim: usize) {
        if let Some(slot) = self.v.get_mut(dim) {
            *slot = false;
        }
    }

    pub fn set_all(&mut self) {
        self.v.iter_mut().for_each(|b| *b = true);
    }

    pub fn clean(&mut self) {
        self.v.iter_mut().for_each(|b| *b = false);
    }

    pub fn plus(&mut self, other: &DimensionVector) {
        for dim in other.iter() {
            self.set(dim);
        }
    }

    pub fn minus(&mut self, other: &DimensionVector) {
        for dim in other.iter() {
            self.reset(dim);
        }
    }

    pub fn intersects(&self, other: &DimensionVector) -> bool {
        self.iter().any(|d| other.get(d))
    }

    /// True if every dimension of `other` is present here.
    pub fn includes(&self, other: &DimensionVector) -> bool {
        other.iter().all(|d| self.get(d))
    }

    pub fn is_empty(&self) -> bool {
        !self.v.iter().any(|b| *b)
    }

    pub fn no_one(&self) -> usize {
        self.v.iter().filter(|b| **b).count()
    }

    /// First dimension present.
    pub fn get_one(&self) -> Option<usize> {
        self.v.iter().position(|b| *b)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.v
            .iter()
            .enumerate()
            .filter_map(|(i, b)| if *b { Some(i) } else { None })
    }

    /// Same dimension set regardless of the vector sizes.
    pub fn same_dims(&self, other: &DimensionVector) -> bool {
        self.includes(other) && other.includes(self)
    }
}
