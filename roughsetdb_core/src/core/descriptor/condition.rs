use std::ops::{Index, IndexMut};

use super::Descriptor;

/// Ordered list of descriptors ANDed together. Order is evaluation order.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    descriptors: Vec<Descriptor>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn add(&mut self, desc: Descriptor) {
        self.descriptors.push(desc);
    }

    pub fn erase_first(&mut self) -> Option<Descriptor> {
        if self.descriptors.is_empty() {
            None
        } else {
            Some(self.descriptors.remove(0))
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn clear(&mut self) {
        self.descriptors.clear();
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.descriptors.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Descriptor> {
        self.descriptors.iter_mut()
    }

    pub fn as_slice(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub(crate) fn as_mut_vec(&mut self) -> &mut Vec<Descriptor> {
        &mut self.descriptors
    }
}

impl Index<usize> for Condition {
    type Output = Descriptor;

    fn index(&self, i: usize) -> &Descriptor {
        &self.descriptors[i]
    }
}

impl IndexMut<usize> for Condition {
    fn index_mut(&mut self, i: usize) -> &mut Descriptor {
        &mut self.descriptors[i]
    }
}

impl FromIterator<Descriptor> for Condition {
    fn from_iter<I: IntoIterator<Item = Descriptor>>(iter: I) -> Self {
        Self {
            descriptors: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Condition {
    type Item = Descriptor;
    type IntoIter = std::vec::IntoIter<Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.into_iter()
    }
}

impl<'a> IntoIterator for &'a Condition {
    type Item = &'a Descriptor;
    type IntoIter = std::slice::Iter<'a, Descriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erase_first_keeps_order() {
        let mut cond: Condition = [true, false, true].into_iter().map(|v| Descriptor::trivial(v, 1)).collect();
        assert_eq!(cond.len(), 3);
        assert!(cond.erase_first().is_some_and(|d| d.is_true()));
        assert!(cond[0].is_false());
        cond.clear();
        assert!(cond.erase_first().is_none());
    }
}
