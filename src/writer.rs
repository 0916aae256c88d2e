use crate::error::{PortalError, PortalResult};
use crate::sheet::{sheet_row, TabularStore, Table};

/// Patches single cells of a previously read table, addressed by data row
/// index and header name. Each patch is one independent store write.
pub struct StatusWriter<'a> {
    store: &'a dyn TabularStore,
    table: &'a Table,
}

impl<'a> StatusWriter<'a> {
    pub fn new(store: &'a dyn TabularStore, table: &'a Table) -> Self {
        StatusWriter { store, table }
    }

    pub fn patch(&self, row_index: usize, column: &str, value: &str) -> PortalResult<()> {
        let position = self
            .table
            .sheet_column(column)
            .ok_or_else(|| PortalError::missing_column(self.table.worksheet(), column))?;
        self.store
            .update_cell(self.table.worksheet(), sheet_row(row_index), position, value)
    }
}
