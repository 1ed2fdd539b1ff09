pub mod collation;
pub mod dimension_vector;
pub mod operator;
pub mod rough_value;
pub mod tribool;
pub mod value;

pub use collation::Collation;
pub use dimension_vector::DimensionVector;
pub use operator::{LogicalOperator, Operator};
pub use rough_value::RoughSetValue;
pub use tribool::Tribool;
pub use value::{ColumnType, TypedValue, ValueKey};
