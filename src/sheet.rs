use std::collections::BTreeMap;

use crate::error::{PortalError, PortalResult};

/// A header-addressed column and its 1-based position in the worksheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub position: usize,
}

/// A worksheet snapshot: named columns plus data rows aligned to them.
#[derive(Debug, Clone, Default)]
pub struct Table {
    worksheet: String,
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Builds a table from raw worksheet values with headers in row 1.
    ///
    /// Columns whose header is blank are dropped. Short rows are padded and
    /// long rows truncated, so every row has exactly one cell per column.
    pub fn from_values(worksheet: &str, values: Vec<Vec<String>>) -> Self {
        let mut values = values.into_iter();
        let Some(header_row) = values.next() else {
            return Table {
                worksheet: worksheet.to_string(),
                ..Table::default()
            };
        };

        let columns: Vec<Column> = header_row
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.trim().is_empty())
            .map(|(index, name)| Column {
                name: name.trim().to_string(),
                position: index + 1,
            })
            .collect();

        let rows = values
            .map(|raw| {
                columns
                    .iter()
                    .map(|column| {
                        raw.get(column.position - 1)
                            .map(|cell| cell.trim().to_string())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        Table {
            worksheet: worksheet.to_string(),
            columns,
            rows,
        }
    }

    pub fn worksheet(&self) -> &str {
        &self.worksheet
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Index of the first column named `name`.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn require(&self, name: &str) -> PortalResult<usize> {
        self.column(name)
            .ok_or_else(|| PortalError::missing_column(&self.worksheet, name))
    }

    /// 1-based worksheet column of `name`, for cell writes.
    pub fn sheet_column(&self, name: &str) -> Option<usize> {
        self.column(name).map(|index| self.columns[index].position)
    }

    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Cell by header name; empty when the column or row is absent.
    pub fn value(&self, row: usize, name: &str) -> &str {
        match self.column(name) {
            Some(column) => self.cell(row, column),
            None => "",
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[String]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// First data row whose `column` cell equals `value`.
    pub fn find_row(&self, column: usize, value: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|cells| cells.get(column).map(String::as_str) == Some(value))
    }

    pub fn record(&self, row: usize) -> BTreeMap<String, String> {
        self.columns
            .iter()
            .enumerate()
            .map(|(index, column)| (column.name.clone(), self.cell(row, index).to_string()))
            .collect()
    }

    pub fn records(&self) -> Vec<BTreeMap<String, String>> {
        (0..self.rows.len()).map(|row| self.record(row)).collect()
    }

    /// Lays `fields` out as a full worksheet row, placing each value under
    /// its header. Fields naming unknown headers are ignored.
    pub fn compose_row(&self, fields: &[(&str, String)]) -> Vec<String> {
        let width = self
            .columns
            .iter()
            .map(|column| column.position)
            .max()
            .unwrap_or(0);
        let mut row = vec![String::new(); width];
        for (name, value) in fields {
            if let Some(position) = self.sheet_column(name) {
                row[position - 1] = value.clone();
            }
        }
        row
    }
}

/// Worksheet row number (1-based, header in row 1) of a data row index.
pub fn sheet_row(data_index: usize) -> usize {
    data_index + 2
}

/// A spreadsheet-like store addressed by worksheet label.
///
/// Rows and columns are 1-based worksheet coordinates. Implementations are
/// blocking; async callers run them on the blocking pool.
pub trait TabularStore: Send + Sync {
    fn read_values(&self, worksheet: &str) -> PortalResult<Vec<Vec<String>>>;

    fn update_cell(&self, worksheet: &str, row: usize, column: usize, value: &str)
        -> PortalResult<()>;

    fn update_row(&self, worksheet: &str, row: usize, values: &[String]) -> PortalResult<()>;

    fn append_rows(&self, worksheet: &str, rows: &[Vec<String>]) -> PortalResult<()>;

    fn delete_row(&self, worksheet: &str, row: usize) -> PortalResult<()>;

    fn read_table(&self, worksheet: &str) -> PortalResult<Table> {
        Ok(Table::from_values(worksheet, self.read_values(worksheet)?))
    }
}

/// Grid edits shared by the store implementations.
pub(crate) mod grid {
    use crate::error::{PortalError, PortalResult};

    fn row_mut<'a>(
        grid: &'a mut [Vec<String>],
        worksheet: &str,
        row: usize,
    ) -> PortalResult<&'a mut Vec<String>> {
        if row == 0 {
            return Err(out_of_range(worksheet, row));
        }
        grid.get_mut(row - 1)
            .ok_or_else(|| out_of_range(worksheet, row))
    }

    fn out_of_range(worksheet: &str, row: usize) -> PortalError {
        PortalError::RowOutOfRange {
            worksheet: worksheet.to_string(),
            row,
        }
    }

    pub fn update_cell(
        grid: &mut [Vec<String>],
        worksheet: &str,
        row: usize,
        column: usize,
        value: &str,
    ) -> PortalResult<()> {
        let cells = row_mut(grid, worksheet, row)?;
        if column == 0 {
            return Err(out_of_range(worksheet, row));
        }
        if cells.len() < column {
            cells.resize(column, String::new());
        }
        cells[column - 1] = value.to_string();
        Ok(())
    }

    pub fn update_row(
        grid: &mut [Vec<String>],
        worksheet: &str,
        row: usize,
        values: &[String],
    ) -> PortalResult<()> {
        let cells = row_mut(grid, worksheet, row)?;
        if cells.len() < values.len() {
            cells.resize(values.len(), String::new());
        }
        cells[..values.len()].clone_from_slice(values);
        Ok(())
    }

    pub fn delete_row(grid: &mut Vec<Vec<String>>, worksheet: &str, row: usize) -> PortalResult<()> {
        row_mut(grid, worksheet, row)?;
        grid.remove(row - 1);
        Ok(())
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::{grid, TabularStore};
    use crate::error::{PortalError, PortalResult};

    /// In-memory workbook used by tests.
    #[derive(Default)]
    pub struct MemoryWorkbook {
        sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    }

    impl MemoryWorkbook {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_sheet(self, worksheet: &str, rows: &[&[&str]]) -> Self {
            let values = rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect();
            self.sheets
                .lock()
                .expect("workbook lock")
                .insert(worksheet.to_string(), values);
            self
        }

        pub fn values(&self, worksheet: &str) -> Vec<Vec<String>> {
            self.sheets
                .lock()
                .expect("workbook lock")
                .get(worksheet)
                .cloned()
                .unwrap_or_default()
        }

        fn edit<T>(
            &self,
            worksheet: &str,
            f: impl FnOnce(&mut Vec<Vec<String>>) -> PortalResult<T>,
        ) -> PortalResult<T> {
            let mut sheets = self.sheets.lock().expect("workbook lock");
            let grid = sheets
                .get_mut(worksheet)
                .ok_or_else(|| PortalError::WorksheetNotFound(worksheet.to_string()))?;
            f(grid)
        }
    }

    impl TabularStore for MemoryWorkbook {
        fn read_values(&self, worksheet: &str) -> PortalResult<Vec<Vec<String>>> {
            self.edit(worksheet, |grid| Ok(grid.clone()))
        }

        fn update_cell(
            &self,
            worksheet: &str,
            row: usize,
            column: usize,
            value: &str,
        ) -> PortalResult<()> {
            self.edit(worksheet, |g| grid::update_cell(g, worksheet, row, column, value))
        }

        fn update_row(&self, worksheet: &str, row: usize, values: &[String]) -> PortalResult<()> {
            self.edit(worksheet, |g| grid::update_row(g, worksheet, row, values))
        }

        fn append_rows(&self, worksheet: &str, rows: &[Vec<String>]) -> PortalResult<()> {
            self.edit(worksheet, |g| {
                g.extend(rows.iter().cloned());
                Ok(())
            })
        }

        fn delete_row(&self, worksheet: &str, row: usize) -> PortalResult<()> {
            self.edit(worksheet, |g| grid::delete_row(g, worksheet, row))
        }
    }
}
