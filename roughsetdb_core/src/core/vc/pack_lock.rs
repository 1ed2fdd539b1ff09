use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Lock bookkeeping of the packs a column reads.
#[derive(Debug, Default)]
pub struct PackLocks {
    held: AtomicUsize,
    acquired: AtomicU64,
}

impl PackLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> PackLockGuard<'_> {
        self.held.fetch_add(1, Ordering::AcqRel);
        self.acquired.fetch_add(1, Ordering::Relaxed);
        PackLockGuard { locks: self }
    }

    /// Locks currently held.
    #[inline]
    pub fn held(&self) -> usize {
        self.held.load(Ordering::Acquire)
    }

    /// Locks taken since the column was created.
    #[inline]
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }
}

/// Keeps the source packs of a column locked until dropped.
#[must_use]
#[derive(Debug)]
pub struct PackLockGuard<'a> {
    locks: &'a PackLocks,
}

impl Drop for PackLockGuard<'_> {
    fn drop(&mut self) {
        self.locks.held.fetch_sub(1, Ordering::AcqRel);
    }
}
