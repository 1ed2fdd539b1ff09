pub mod column;
pub mod expression;
pub mod in_set;
pub mod pack_lock;
pub mod rough;
pub mod single;
pub mod statistics;
pub mod subselect;

pub use column::{ColumnKind, ConstColumn, VirtualColumn};
pub use expression::{ExprOp, ExpressionColumn, TypeCastColumn};
pub use in_set::InSetColumn;
pub use pack_lock::{PackLockGuard, PackLocks};
pub use single::SingleColumn;
pub use statistics::{LocalStatistics, NullInfo};
pub use subselect::{SubSelectColumn, SubqueryProvider};
