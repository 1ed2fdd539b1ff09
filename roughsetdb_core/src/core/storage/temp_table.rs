use std::sync::Arc;

use crate::core::error::{FilterError, Result};

use super::StoredTable;

/// The tables feeding a query, one dimension each, plus the output context
/// the filter needs for join tips and cost weighting.
#[derive(Debug, Clone)]
pub struct TempTable {
    tables: Vec<Arc<StoredTable>>,
    pack_power: u8,
    used_in_output: Vec<bool>,
    distinct_dim: Option<usize>,
}

impl TempTable {
    pub fn new(tables: Vec<Arc<StoredTable>>) -> Result<Self> {
        let Some(first) = tables.first() else {
            return Err(FilterError::Internal("a query needs at least one table".into()));
        };
        let pack_power = first.pack_power();
        if let Some(t) = tables.iter().find(|t| t.pack_power() != pack_power) {
            return Err(FilterError::Internal(format!(
                "table {} uses pack power {} instead of {}",
                t.name(),
                t.pack_power(),
                pack_power
            )));
        }
        let used_in_output = vec![true; tables.len()];
        Ok(Self {
            tables,
            pack_power,
            used_in_output,
            distinct_dim: None,
        })
    }

    #[inline]
    pub fn num_tables(&self) -> usize {
        self.tables.len()
    }

    #[inline]
    pub fn table(&self, dim: usize) -> &Arc<StoredTable> {
        &self.tables[dim]
    }

    #[inline]
    pub fn tables(&self) -> &[Arc<StoredTable>] {
        &self.tables
    }

    #[inline]
    pub fn pack_power(&self) -> u8 {
        self.pack_power
    }

    pub fn orig_sizes(&self) -> Vec<u64> {
        self.tables.iter().map(|t| t.num_rows()).collect()
    }

    #[inline]
    pub fn is_used_in_output(&self, dim: usize) -> bool {
        self.used_in_output.get(dim).copied().unwrap_or(false)
    }

    pub fn set_used_in_output(&mut self, dim: usize, used: bool) {
        if let Some(slot) = self.used_in_output.get_mut(dim) {
            *slot = used;
        }
    }

    /// Dimension read in a `DISTINCT` context, joins on it may stop at the first match.
    #[inline]
    pub fn distinct_dim(&self) -> Option<usize> {
        self.distinct_dim
    }

    pub fn set_distinct_dim(&mut self, dim: Option<usize>) {
        self.distinct_dim = dim;
    }
}
