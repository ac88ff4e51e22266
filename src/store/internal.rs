//! Internal row bookkeeping shared by `Dataset` and `Store`.

use super::Row;
use crate::error::{Result, TimecellError};
use crate::types::{Cell, CellValue, StoreStats};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::SystemTime;

/// Row and column tables. Owned by a `Dataset` while it is being written,
/// then moved as a whole into the committed `Store`.
#[derive(Debug, Default)]
pub(crate) struct Tables {
    /// Rows in insertion order
    pub rows: Vec<Row>,
    /// Row id to position in `rows`
    pub row_index: FxHashMap<Arc<str>, usize>,
    /// Column names in first-seen order
    pub columns: Vec<Arc<str>>,
    /// Column name to position in `columns`
    pub column_index: FxHashMap<Arc<str>, usize>,
    pub cell_count: usize,
}

impl Tables {
    pub(crate) fn validate_row_id(row_id: &str) -> Result<()> {
        if row_id.is_empty() {
            return Err(TimecellError::InvalidInput(
                "Row id cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn validate_column(row_id: &str, column: &str) -> Result<()> {
        if column.is_empty() {
            return Err(TimecellError::InvalidInput(format!(
                "Column name cannot be empty (row '{}')",
                row_id
            )));
        }
        Ok(())
    }

    /// Return the shared name for `column`, registering it on first sight.
    pub(crate) fn intern_column(&mut self, column: &str) -> Arc<str> {
        if let Some(&idx) = self.column_index.get(column) {
            return self.columns[idx].clone();
        }
        let name: Arc<str> = Arc::from(column);
        self.column_index.insert(name.clone(), self.columns.len());
        self.columns.push(name.clone());
        name
    }

    /// Position of `row_id`, creating the row at the end if it is new.
    pub(crate) fn row_slot(&mut self, row_id: &str) -> usize {
        if let Some(&idx) = self.row_index.get(row_id) {
            return idx;
        }
        let id: Arc<str> = Arc::from(row_id);
        let idx = self.rows.len();
        self.row_index.insert(id.clone(), idx);
        self.rows.push(Row {
            id,
            cells: Vec::new(),
        });
        idx
    }

    /// Append already validated cells to a row.
    pub(crate) fn append(&mut self, row_id: &str, cells: Vec<(String, CellValue, SystemTime)>) {
        if cells.is_empty() {
            return;
        }
        let slot = self.row_slot(row_id);
        let mut interned = Vec::with_capacity(cells.len());
        for (column, value, timestamp) in cells {
            interned.push(Cell {
                column: self.intern_column(&column),
                value,
                timestamp,
            });
        }
        self.cell_count += interned.len();
        self.rows[slot].cells.extend(interned);
    }

    pub(crate) fn stats(&self) -> StoreStats {
        let mut earliest: Option<SystemTime> = None;
        let mut latest: Option<SystemTime> = None;
        for cell in self.rows.iter().flat_map(|row| row.cells.iter()) {
            earliest = Some(earliest.map_or(cell.timestamp, |t| t.min(cell.timestamp)));
            latest = Some(latest.map_or(cell.timestamp, |t| t.max(cell.timestamp)));
        }

        StoreStats {
            row_count: self.rows.len(),
            cell_count: self.cell_count,
            column_count: self.columns.len(),
            earliest,
            latest,
        }
    }

    /// Report rows whose version count exceeds `threshold`.
    pub(crate) fn warn_wide_rows(&self, dataset: &str, threshold: usize) {
        for row in &self.rows {
            if row.cells.len() >= threshold {
                log::warn!(
                    "Wide row detected in dataset '{}': row '{}' holds {} cells. \
                     Every filter and lookup scans all versions of a row.",
                    dataset,
                    row.id,
                    row.cells.len()
                );
            }
        }
    }
}
