use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use crate::core::error::{FilterError, Result};

/// Statement scoped kill switch polled by every pack and row loop.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    killed: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.killed.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(FilterError::Cancelled)
        } else {
            Ok(())
        }
    }
}
