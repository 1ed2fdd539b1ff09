use std::sync::Arc;

use arc_swap::ArcSwap;
use log::LevelFilter;
use once_cell::sync::Lazy;

use crate::{
    DEFAULT_JOIN_RETRY_LIMIT, DEFAULT_PACK_POWER, DEFAULT_TOO_MANY_TUPLES, MAX_PERMITS_THREADS,
    PACK_POWER,
};

#[derive(Clone, Debug, Default)]
pub struct Configuration {
    /// Rows per pack as a power of two (default: 16).
    pub pack_power: Option<u8>,
    /// Worker tasks used for parallel pack evaluation, `0` disables it (default: available parallelism).
    pub thread_pool_size: Option<usize>,
    /// Allow primary key prefix predicates to be answered from the index (default: true).
    pub index_search: Option<bool>,
    /// Join attempts made for one condition group before giving up (default: 8).
    pub join_retry_limit: Option<usize>,
    /// Tuple count above which a multi index refuses to grow (default: 2^40).
    pub too_many_tuples: Option<u64>,
}

impl Configuration {
    pub fn pack_power(&self) -> u8 {
        self.pack_power
            .or_else(|| PACK_POWER.get().copied())
            .unwrap_or(DEFAULT_PACK_POWER)
    }

    pub fn thread_pool_size(&self) -> usize {
        self.thread_pool_size
            .or_else(|| MAX_PERMITS_THREADS.get().copied())
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(4)
            })
    }

    pub fn index_search(&self) -> bool {
        self.index_search.unwrap_or(true)
    }

    pub fn join_retry_limit(&self) -> usize {
        self.join_retry_limit.unwrap_or(DEFAULT_JOIN_RETRY_LIMIT).max(1)
    }

    pub fn too_many_tuples(&self) -> u64 {
        self.too_many_tuples.unwrap_or(DEFAULT_TOO_MANY_TUPLES)
    }

    /// Publishes the pool size and the pack power into the process wide statics.
    /// The first published values win.
    pub fn publish(&self) {
        _ = MAX_PERMITS_THREADS.set(self.thread_pool_size());
        _ = PACK_POWER.set(self.pack_power());
    }
}

static CURRENT: Lazy<ArcSwap<Configuration>> =
    Lazy::new(|| ArcSwap::from_pointee(Configuration::default()));

/// Settings picked up by filters created from now on.
pub fn current() -> Arc<Configuration> {
    CURRENT.load_full()
}

pub fn install(configuration: Configuration) {
    configuration.publish();
    CURRENT.store(Arc::new(configuration));
}

pub fn init_logging(level: LevelFilter) {
    _ = env_logger::Builder::new()
        .filter_level(level)
        .is_test(cfg!(test))
        .try_init();
}
