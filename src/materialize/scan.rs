//! Full-table scan over a filtered view.

use crate::filter::{FilteredRows, FilteredView};
use crate::types::{Cell, CellValue};
use std::time::SystemTime;

/// One scanned row: its id and the surviving cells in recording order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedRow<'a> {
    pub row_id: &'a str,
    pub cells: Vec<&'a Cell>,
}

impl<'a> ScannedRow<'a> {
    /// `(column, value)` pairs in recording order.
    pub fn columns(&self) -> impl Iterator<Item = (&'a str, &'a CellValue)> + '_ {
        self.cells.iter().map(|cell| (cell.column(), &cell.value))
    }

    /// `(column, value, timestamp)` triples, ready to be recorded elsewhere.
    pub fn to_record(&self) -> Vec<(String, CellValue, SystemTime)> {
        self.cells
            .iter()
            .map(|cell| (cell.column().to_string(), cell.value.clone(), cell.timestamp))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True for rows whose cells were all filtered out.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Lazy scan in row insertion order. Clone it, or call [`scan`] again, to
/// restart from the first row.
#[derive(Debug, Clone)]
pub struct Scan<'a> {
    rows: FilteredRows<'a>,
}

impl<'a> Iterator for Scan<'a> {
    type Item = ScannedRow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(ScannedRow {
            row_id: row.id(),
            cells: row.cells().collect(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for Scan<'_> {}

/// Scan every row of the view, including rows reduced to zero columns.
pub fn scan(view: FilteredView<'_>) -> Scan<'_> {
    Scan { rows: view.rows() }
}
