use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{PortalError, PortalResult};
use crate::sheet::{grid, TabularStore};

/// A workbook kept as a directory of `<worksheet>.csv` files.
///
/// Writes rewrite the whole file. The in-process lock only serializes this
/// process; other editors of the directory are not coordinated.
pub struct CsvWorkbook {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvWorkbook {
    pub fn open(dir: impl Into<PathBuf>) -> PortalResult<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(PortalError::Io {
                worksheet: dir.display().to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "workbook directory does not exist",
                ),
            });
        }
        Ok(CsvWorkbook {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, worksheet: &str) -> PathBuf {
        self.dir.join(format!("{worksheet}.csv"))
    }

    fn existing_path(&self, worksheet: &str) -> PortalResult<PathBuf> {
        let path = self.path(worksheet);
        if path.is_file() {
            Ok(path)
        } else {
            Err(PortalError::WorksheetNotFound(worksheet.to_string()))
        }
    }

    fn read_grid(&self, worksheet: &str) -> PortalResult<Vec<Vec<String>>> {
        let path = self.existing_path(worksheet)?;
        let csv_err = |source: csv::Error| PortalError::Csv {
            worksheet: worksheet.to_string(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&path)
            .map_err(csv_err)?;

        let mut grid = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            grid.push(record.iter().map(str::to_string).collect());
        }
        Ok(grid)
    }

    fn write_grid(&self, worksheet: &str, grid: &[Vec<String>]) -> PortalResult<()> {
        let csv_err = |source: csv::Error| PortalError::Csv {
            worksheet: worksheet.to_string(),
            source,
        };
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(self.path(worksheet))
            .map_err(csv_err)?;
        for row in grid {
            writer.write_record(row).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| PortalError::Io {
            worksheet: worksheet.to_string(),
            source,
        })
    }

    fn rewrite(
        &self,
        worksheet: &str,
        edit: impl FnOnce(&mut Vec<Vec<String>>) -> PortalResult<()>,
    ) -> PortalResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut grid = self.read_grid(worksheet)?;
        edit(&mut grid)?;
        self.write_grid(worksheet, &grid)
    }
}

impl TabularStore for CsvWorkbook {
    fn read_values(&self, worksheet: &str) -> PortalResult<Vec<Vec<String>>> {
        self.read_grid(worksheet)
    }

    fn update_cell(
        &self,
        worksheet: &str,
        row: usize,
        column: usize,
        value: &str,
    ) -> PortalResult<()> {
        self.rewrite(worksheet, |g| grid::update_cell(g, worksheet, row, column, value))
    }

    fn update_row(&self, worksheet: &str, row: usize, values: &[String]) -> PortalResult<()> {
        self.rewrite(worksheet, |g| grid::update_row(g, worksheet, row, values))
    }

    fn append_rows(&self, worksheet: &str, rows: &[Vec<String>]) -> PortalResult<()> {
        self.rewrite(worksheet, |g| {
            g.extend(rows.iter().cloned());
            Ok(())
        })
    }

    fn delete_row(&self, worksheet: &str, row: usize) -> PortalResult<()> {
        self.rewrite(worksheet, |g| grid::delete_row(g, worksheet, row))
    }
}
