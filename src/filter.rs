//! Cell-granular temporal filtering.
//!
//! A [`FilteredView`] pairs a committed [`Store`] with a
//! [`CompiledPredicate`]. Nothing is copied: each access re-evaluates the
//! predicate against the cells it touches, so a view is as cheap to create as
//! it is to drop and several views over one store never interact.
//!
//! Filtering never removes rows. A row whose cells all fail the predicate is
//! still enumerated, with no cells; consumers that need at least one surviving
//! cell decide for themselves what an empty row means.

use crate::error::{Result, TimecellError};
use crate::predicate::CompiledPredicate;
use crate::store::{Row, Store};
use crate::types::Cell;

/// Logical result of applying a `when` predicate to a store.
#[derive(Debug, Clone, Copy)]
pub struct FilteredView<'a> {
    store: &'a Store,
    predicate: &'a CompiledPredicate,
}

impl<'a> FilteredView<'a> {
    pub(crate) fn new(store: &'a Store, predicate: &'a CompiledPredicate) -> Self {
        Self { store, predicate }
    }

    pub fn store(&self) -> &'a Store {
        self.store
    }

    pub fn predicate(&self) -> &'a CompiledPredicate {
        self.predicate
    }

    /// Every row of the store in insertion order, including rows left with no
    /// surviving cells.
    pub fn rows(&self) -> FilteredRows<'a> {
        FilteredRows {
            rows: self.store.rows(),
            predicate: self.predicate,
        }
    }

    /// Rows with at least one surviving cell.
    pub fn matching_rows(&self) -> impl Iterator<Item = FilteredRow<'a>> + use<'a> {
        self.rows().filter(|row| !row.is_empty())
    }

    /// The filtered view of a single row.
    ///
    /// Fails with [`TimecellError::UnknownRow`] only when the id was never
    /// recorded; a row whose cells were all filtered out is returned empty.
    pub fn row(&self, row_id: &str) -> Result<FilteredRow<'a>> {
        let row = self
            .store
            .row(row_id)
            .ok_or_else(|| TimecellError::UnknownRow(row_id.to_string()))?;
        Ok(FilteredRow::new(row, self.predicate))
    }

    /// Number of surviving cells across the store.
    pub fn cell_count(&self) -> usize {
        self.rows().map(|row| row.cells().count()).sum()
    }

    /// True when no cell survives.
    pub fn is_empty(&self) -> bool {
        self.predicate.matches_nothing() || self.rows().all(|row| row.is_empty())
    }
}

/// Iterator over the filtered rows of a store.
#[derive(Debug, Clone)]
pub struct FilteredRows<'a> {
    rows: std::slice::Iter<'a, Row>,
    predicate: &'a CompiledPredicate,
}

impl<'a> Iterator for FilteredRows<'a> {
    type Item = FilteredRow<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows
            .next()
            .map(|row| FilteredRow::new(row, self.predicate))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl ExactSizeIterator for FilteredRows<'_> {}

/// One row seen through a predicate.
#[derive(Debug, Clone, Copy)]
pub struct FilteredRow<'a> {
    row: &'a Row,
    predicate: &'a CompiledPredicate,
}

impl<'a> FilteredRow<'a> {
    fn new(row: &'a Row, predicate: &'a CompiledPredicate) -> Self {
        Self { row, predicate }
    }

    pub fn id(&self) -> &'a str {
        self.row.id()
    }

    /// Surviving cells in recording order.
    pub fn cells(&self) -> impl Iterator<Item = &'a Cell> + use<'a> {
        let predicate = self.predicate;
        self.row
            .cells()
            .iter()
            .filter(move |cell| predicate.evaluate(cell.timestamp))
    }

    /// True when every cell of the row failed the predicate.
    pub fn is_empty(&self) -> bool {
        self.cells().next().is_none()
    }

    /// Number of cells recorded for the row before filtering.
    pub fn unfiltered_len(&self) -> usize {
        self.row.cells().len()
    }
}

/// Apply `predicate` to `store`.
pub fn filter<'a>(store: &'a Store, predicate: &'a CompiledPredicate) -> FilteredView<'a> {
    FilteredView::new(store, predicate)
}
