pub mod cancellation;
pub mod filter;
pub mod mi_iterator;
pub mod multi_index;
pub mod position;
pub mod updating_iterator;

pub use cancellation::CancellationFlag;
pub use filter::{Filter, PackBlock};
pub use mi_iterator::MIIterator;
pub use multi_index::{DimensionGroup, JoinedGroup, MultiIndex, TupleRow};
pub use position::TuplePosition;
pub use updating_iterator::{MIUpdatingIterator, PackFilter};
