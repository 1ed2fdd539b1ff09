use crate::core::{multi_index::Filter, types::RoughSetValue};

#[derive(Debug, Clone)]
struct LocalDescFilter {
    desc_num: usize,
    rf: Vec<RoughSetValue>,
}

/// Per dimension, per pack rough status of the filter being built.
///
/// Besides the global table every descriptor may own a local table for its
/// dimension; the global one is the AND of the locals.
#[derive(Debug, Clone)]
pub struct RoughMultiIndex {
    no_packs: Vec<usize>,
    rf: Vec<Vec<RoughSetValue>>,
    no_empty_packs: Vec<usize>,
    local_desc: Vec<Vec<LocalDescFilter>>,
}

impl RoughMultiIndex {
    /// All packs start as `UNKNOWN`.
    pub fn new(no_packs: Vec<usize>) -> Self {
        let rf = no_packs.iter().map(|n| vec![RoughSetValue::Unknown; *n]).collect();
        let dims = no_packs.len();
        Self {
            no_packs,
            rf,
            no_empty_packs: vec![0; dims],
            local_desc: vec![Vec::new(); dims],
        }
    }

    #[inline]
    pub fn num_of_dimensions(&self) -> usize {
        self.no_packs.len()
    }

    #[inline]
    pub fn num_of_packs(&self, dim: usize) -> usize {
        self.no_packs.get(dim).copied().unwrap_or(0)
    }

    /// Number of local descriptor filters kept for `dim`.
    pub fn num_of_conditions(&self, dim: usize) -> usize {
        self.local_desc.get(dim).map_or(0, |l| l.len())
    }

    #[inline]
    pub fn pack_status(&self, dim: usize, pack: usize) -> RoughSetValue {
        self.rf
            .get(dim)
            .and_then(|r| r.get(pack))
            .copied()
            .unwrap_or(RoughSetValue::Unknown)
    }

    #[inline]
    pub fn set_pack_status(&mut self, dim: usize, pack: usize, v: RoughSetValue) {
        if let Some(slot) = self.rf.get_mut(dim).and_then(|r| r.get_mut(pack)) {
            *slot = v;
        }
    }

    pub fn rs_values(&self, dim: usize) -> &[RoughSetValue] {
        self.rf.get(dim).map_or(&[], |r| r.as_slice())
    }

    /// Local table of descriptor `desc_num` on `dim`, created on first use with
    /// `NONE` where the global table already excludes the pack.
    pub fn local_desc_filter(&mut self, dim: usize, desc_num: usize) -> &mut [RoughSetValue] {
        let locals = &mut self.local_desc[dim];
        let idx = match locals.iter().position(|l| l.desc_num == desc_num) {
            Some(i) => i,
            None => {
                let rf = self.rf[dim]
                    .iter()
                    .map(|v| {
                        if *v == RoughSetValue::None {
                            RoughSetValue::None
                        } else {
                            RoughSetValue::Unknown
                        }
                    })
                    .collect();
                locals.push(LocalDescFilter { desc_num, rf });
                locals.len() - 1
            }
        };
        &mut locals[idx].rf
    }

    pub fn local_desc_filter_read(&self, dim: usize, desc_num: usize) -> Option<&[RoughSetValue]> {
        self.local_desc
            .get(dim)?
            .iter()
            .find(|l| l.desc_num == desc_num)
            .map(|l| l.rf.as_slice())
    }

    pub fn clear_local_desc_filters(&mut self) {
        self.local_desc.iter_mut().for_each(|l| l.clear());
    }

    /// Folds the local table of `desc_num` into the global one.
    /// Returns true if any pack of `dim` may still hold rows.
    pub fn update_global_rough_filter(&mut self, dim: usize, desc_num: usize) -> bool {
        let Some(local) = self.local_desc[dim].iter().find(|l| l.desc_num == desc_num) else {
            return self.rf[dim].iter().any(|v| *v != RoughSetValue::None);
        };
        let mut any_nonempty = false;
        for (global, local) in self.rf[dim].iter_mut().zip(local.rf.iter()) {
            *global = match (*global, *local) {
                (RoughSetValue::Unknown, l) => l,
                (_, RoughSetValue::None) => RoughSetValue::None,
                (RoughSetValue::None, _) => RoughSetValue::None,
                (RoughSetValue::All, RoughSetValue::All) => RoughSetValue::All,
                _ => RoughSetValue::Some,
            };
            any_nonempty |= *global != RoughSetValue::None;
        }
        any_nonempty
    }

    /// Packs empty in `filter` become `NONE`.
    pub fn update_global_from_filter(&mut self, dim: usize, filter: Option<&Filter>) {
        let Some(filter) = filter else {
            return;
        };
        for (p, v) in self.rf[dim].iter_mut().enumerate() {
            if filter.is_empty_pack(p) {
                *v = RoughSetValue::None;
            }
        }
    }

    /// Copies the `NONE` packs of the global table into every local one.
    pub fn update_local_rough_filters(&mut self, dim: usize) {
        let global = &self.rf[dim];
        for local in self.local_desc[dim].iter_mut() {
            for (l, g) in local.rf.iter_mut().zip(global.iter()) {
                if *g == RoughSetValue::None {
                    *l = RoughSetValue::None;
                }
            }
        }
    }

    /// `ALL` becomes `SOME` on `dim`, or on every dimension for `None`.
    pub fn make_dimension_suspect(&mut self, dim: Option<usize>) {
        for d in self.dims(dim) {
            self.rf[d].iter_mut().for_each(|v| {
                if *v == RoughSetValue::All {
                    *v = RoughSetValue::Some;
                }
            });
        }
    }

    pub fn make_dimension_empty(&mut self, dim: Option<usize>) {
        for d in self.dims(dim) {
            self.rf[d].iter_mut().for_each(|v| *v = RoughSetValue::None);
        }
    }

    fn dims(&self, dim: Option<usize>) -> std::ops::Range<usize> {
        match dim {
            Some(d) if d < self.num_of_dimensions() => d..d + 1,
            Some(_) => 0..0,
            None => 0..self.num_of_dimensions(),
        }
    }

    fn count_empty(&self, dim: usize) -> usize {
        self.rf[dim].iter().filter(|v| **v == RoughSetValue::None).count()
    }

    /// Remembers the number of `NONE` packs of `dim`.
    pub fn update_reduced_dimension(&mut self, dim: usize) {
        self.no_empty_packs[dim] = self.count_empty(dim);
    }

    pub fn update_reduced_dimensions(&mut self) {
        for d in 0..self.num_of_dimensions() {
            self.update_reduced_dimension(d);
        }
    }

    /// Dimensions which lost packs since their last [`Self::update_reduced_dimension`].
    pub fn reduced_dimensions(&self) -> Vec<usize> {
        (0..self.num_of_dimensions())
            .filter(|d| self.count_empty(*d) > self.no_empty_packs[*d])
            .collect()
    }

    /// Number of packs of `dim` which may still hold rows.
    pub fn nonempty_packs(&self, dim: usize) -> usize {
        self.num_of_packs(dim) - self.count_empty(dim)
    }

    pub fn is_empty(&self) -> bool {
        (0..self.num_of_dimensions()).any(|d| self.num_of_packs(d) > 0 && self.nonempty_packs(d) == 0)
    }
}
