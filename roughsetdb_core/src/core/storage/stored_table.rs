use std::sync::Arc;

use crate::core::{
    error::{FilterError, Result},
    types::{ColumnType, TypedValue},
};

use super::{ColumnData, PrimaryIndex};

/// In-memory physical table feeding one dimension of a query.
#[derive(Debug)]
pub struct StoredTable {
    name: String,
    pack_power: u8,
    num_rows: u64,
    columns: Vec<ColumnData>,
    /// Column whose delete marks decide row visibility.
    liveness: usize,
    primary_key: Option<usize>,
    primary_index: Option<PrimaryIndex>,
}

impl StoredTable {
    pub fn builder(name: &str, pack_power: u8) -> StoredTableBuilder {
        StoredTableBuilder {
            name: name.to_string(),
            pack_power,
            columns: Vec::new(),
            deleted: Vec::new(),
            liveness: None,
            primary_key: None,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn pack_power(&self) -> u8 {
        self.pack_power
    }

    #[inline]
    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    #[inline]
    pub fn num_packs(&self) -> usize {
        self.num_rows.div_ceil(1 << self.pack_power) as usize
    }

    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn column(&self, index: usize) -> Option<&ColumnData> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    #[inline]
    pub fn liveness_column(&self) -> &ColumnData {
        &self.columns[self.liveness]
    }

    #[inline]
    pub fn is_deleted(&self, row: u64) -> bool {
        self.liveness_column().is_deleted(row)
    }

    #[inline]
    pub fn deleted_in_pack(&self, pack: usize) -> u64 {
        self.liveness_column()
            .pack_statistics(pack)
            .map(|s| s.deleted_count)
            .unwrap_or(0)
    }

    #[inline]
    pub fn has_deleted_rows(&self) -> bool {
        self.liveness_column().has_deleted_rows()
    }

    /// First column of the primary key, if the table has one.
    #[inline]
    pub fn primary_key(&self) -> Option<usize> {
        self.primary_key
    }

    #[inline]
    pub fn primary_index(&self) -> Option<&PrimaryIndex> {
        self.primary_index.as_ref()
    }
}

pub struct StoredTableBuilder {
    name: String,
    pack_power: u8,
    columns: Vec<(String, ColumnType, Vec<TypedValue>)>,
    deleted: Vec<u64>,
    liveness: Option<String>,
    primary_key: Option<String>,
}

impl StoredTableBuilder {
    pub fn column(mut self, name: &str, column_type: ColumnType, values: Vec<TypedValue>) -> Self {
        self.columns.push((name.to_string(), column_type, values));
        self
    }

    pub fn int_column(self, name: &str, values: impl IntoIterator<Item = i64>) -> Self {
        let values = values.into_iter().map(TypedValue::Int).collect();
        self.column(name, ColumnType::Int, values)
    }

    pub fn deleted_rows(mut self, rows: &[u64]) -> Self {
        self.deleted.extend_from_slice(rows);
        self
    }

    /// Names the column holding the delete marks, the first column when never called.
    pub fn liveness_column(mut self, name: &str) -> Self {
        self.liveness = Some(name.to_string());
        self
    }

    pub fn primary_key(mut self, name: &str) -> Self {
        self.primary_key = Some(name.to_string());
        self
    }

    pub fn build(self) -> Result<Arc<StoredTable>> {
        if self.columns.is_empty() {
            return Err(FilterError::Internal(format!("table {} has no columns", self.name)));
        }
        let num_rows = self.columns[0].2.len() as u64;
        if let Some((name, _, _)) = self.columns.iter().find(|(_, _, v)| v.len() as u64 != num_rows) {
            return Err(FilterError::Internal(format!(
                "column {}.{} has a different number of rows",
                self.name, name
            )));
        }

        let find = |name: &str| -> Result<usize> {
            self.columns
                .iter()
                .position(|(n, _, _)| n == name)
                .ok_or_else(|| FilterError::Internal(format!("unknown column {}.{}", self.name, name)))
        };
        let liveness = match &self.liveness {
            Some(name) => find(name)?,
            None => 0,
        };
        let primary_key = self.primary_key.as_deref().map(find).transpose()?;

        let mut columns = self
            .columns
            .into_iter()
            .map(|(name, column_type, values)| ColumnData::new(&name, column_type, values, self.pack_power))
            .collect::<Vec<_>>();
        if !self.deleted.is_empty() {
            columns[liveness].mark_deleted(&self.deleted);
        }
        let primary_index = primary_key.and_then(|pk| PrimaryIndex::build(&columns[pk]));

        Ok(Arc::new(StoredTable {
            name: self.name,
            pack_power: self.pack_power,
            num_rows,
            columns,
            liveness,
            primary_key,
            primary_index,
        }))
    }
}
