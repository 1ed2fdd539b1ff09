pub mod column_data;
pub mod primary_index;
pub mod stored_table;
pub mod temp_table;

pub use column_data::{ColumnData, PackStatistics};
pub use primary_index::{PrimaryIndex, RangeVec, RowRange};
pub use stored_table::{StoredTable, StoredTableBuilder};
pub use temp_table::TempTable;
