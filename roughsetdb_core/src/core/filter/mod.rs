pub mod condition_encoder;
pub mod cost_model;
pub mod pack_orderer;
pub mod parameterized_filter;
pub mod rough_multi_index;
pub mod worker_pool;

mod apply;
mod joins;
mod preprocessing;
mod rough_pass;

pub use condition_encoder::ConditionEncoder;
pub use cost_model::CostContext;
pub use pack_orderer::{OrderType, PackOrderer};
pub use parameterized_filter::ParameterizedFilter;
pub use rough_multi_index::RoughMultiIndex;
pub use worker_pool::WorkerPool;
