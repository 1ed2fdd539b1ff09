use std::cmp::Ordering;

use itertools::Itertools;

use crate::core::{
    multi_index::TuplePosition,
    types::{RoughSetValue, TypedValue},
    vc::VirtualColumn,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderType {
    /// Packs closest to the matched pack's range come first.
    RangeSimilarity,
    MinAsc,
    MinDesc,
    MaxAsc,
    MaxDesc,
}

#[derive(Debug, Clone)]
struct PackEntry {
    pack: usize,
    min: Option<f64>,
    max: Option<f64>,
}

impl PackEntry {
    #[inline]
    fn midpoint(&self) -> Option<f64> {
        Some((self.min? + self.max?) / 2.0)
    }
}

/// Visiting order over the packs of one column.
///
/// Packs marked `NONE` in the rough table given at construction are never
/// visited. Packs without a numeric range come last, in natural order.
#[derive(Debug, Clone)]
pub struct PackOrderer {
    order: OrderType,
    entries: Vec<PackEntry>,
    visit: Vec<usize>,
    cursor: usize,
}

fn numeric(v: &TypedValue) -> Option<f64> {
    match v {
        TypedValue::Int(i) => Some(*i as f64),
        TypedValue::Real(r) => Some(*r),
        _ => None,
    }
}

fn by_key(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => {
            let o = x.total_cmp(&y);
            if descending { o.reverse() } else { o }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl PackOrderer {
    pub fn new(vc: &VirtualColumn, order: OrderType, rf: Option<&[RoughSetValue]>) -> Self {
        let no_packs = vc.as_single().map_or(0, |s| s.num_packs());
        let entries = (0..no_packs)
            .filter(|p| rf.and_then(|r| r.get(*p)).is_none_or(|v| *v != RoughSetValue::None))
            .map(|pack| {
                let (min, max) = vc
                    .pack_range(pack)
                    .map_or((None, None), |(lo, hi)| (numeric(&lo), numeric(&hi)));
                PackEntry { pack, min, max }
            })
            .collect();
        let mut orderer = Self {
            order,
            entries,
            visit: Vec::new(),
            cursor: 0,
        };
        orderer.visit = orderer.static_order();
        orderer
    }

    fn static_order(&self) -> Vec<usize> {
        let key = |e: &PackEntry| match self.order {
            OrderType::MinAsc | OrderType::MinDesc => e.min,
            OrderType::MaxAsc | OrderType::MaxDesc => e.max,
            OrderType::RangeSimilarity => e.midpoint(),
        };
        let descending = matches!(self.order, OrderType::MinDesc | OrderType::MaxDesc);
        self.entries
            .iter()
            .sorted_by(|a, b| by_key(key(a), key(b), descending).then(a.pack.cmp(&b.pack)))
            .map(|e| e.pack)
            .collect()
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.cursor < self.visit.len()
    }

    /// Pack under the cursor.
    #[inline]
    pub fn current(&self) -> Option<usize> {
        self.visit.get(self.cursor).copied()
    }

    #[inline]
    pub fn advance(&mut self) {
        self.cursor += 1;
    }

    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    pub fn len(&self) -> usize {
        self.visit.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visit.is_empty()
    }

    /// Restarts from the packs whose midpoint is nearest to the midpoint of the
    /// pack of `matched` at `pos`. Ties go to the lower pack number. Without a
    /// numeric range on either side the static order is used.
    pub fn rewind_to_match(&mut self, matched: &VirtualColumn, pos: &TuplePosition) {
        self.cursor = 0;
        if self.order != OrderType::RangeSimilarity {
            return;
        }
        let target = matched
            .dim()
            .and_then(|d| pos.pack(d))
            .and_then(|p| matched.pack_range(p))
            .and_then(|(lo, hi)| Some((numeric(&lo)? + numeric(&hi)?) / 2.0));
        let Some(target) = target else {
            self.visit = self.static_order();
            return;
        };
        self.visit = self
            .entries
            .iter()
            .sorted_by(|a, b| {
                let da = a.midpoint().map(|m| (m - target).abs());
                let db = b.midpoint().map(|m| (m - target).abs());
                by_key(da, db, false).then(a.pack.cmp(&b.pack))
            })
            .map(|e| e.pack)
            .collect();
    }
}

impl Iterator for PackOrderer {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let p = self.current()?;
        self.advance();
        Some(p)
    }
}
