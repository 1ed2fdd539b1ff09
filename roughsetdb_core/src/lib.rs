use std::sync::OnceLock;

/// Upper bound of concurrently running pack evaluation tasks.
pub static MAX_PERMITS_THREADS: OnceLock<usize> = OnceLock::new();

/// Rows per pack are `1 << PACK_POWER`.
pub static PACK_POWER: OnceLock<u8> = OnceLock::new();

pub(crate) const DEFAULT_PACK_POWER: u8 = 16;
pub(crate) const DEFAULT_JOIN_RETRY_LIMIT: usize = 8;
pub(crate) const DEFAULT_TOO_MANY_TUPLES: u64 = 1 << 40;

// Weight given to descriptors which must not be moved before cheaper ones.
pub(crate) const WEIGHT_DONE_OR_DELAYED: f64 = 100_000.0;
pub(crate) const WEIGHT_UNKNOWN_SHAPE: f64 = 99_999.0;

pub mod configuration;
pub mod core;
