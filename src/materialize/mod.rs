//! Materializers turning a [`FilteredView`] into consumer-facing shapes.
//!
//! - [`scan`]: every row in insertion order with its surviving cells, for
//!   transforms and table-like queries.
//! - [`lookup`] / [`apply`]: one row as a column→value mapping, for
//!   query-function application.
//! - [`to_matrix`] / [`to_labeled_matrix`]: numeric feature vectors for
//!   trainers.
//!
//! All three read the same [`FilteredView`], so they agree on which cells
//! exist.

mod lookup;
mod matrix;
mod scan;

pub use lookup::{RowLookup, RowMapping, apply, lookup};
pub use matrix::{
    ColumnSelector, FeatureMatrix, LabeledMatrix, SparseRow, to_labeled_matrix, to_matrix,
};
pub use scan::{Scan, ScannedRow, scan};

use crate::filter::{FilteredRow, FilteredView};
use crate::store::Store;
use crate::types::{Cell, VersionPolicy};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;

/// Collapse the surviving versions of each column to a single cell.
///
/// Returns `(canonical column position, cell)` pairs sorted by position.
pub(crate) fn resolve_versions<'a>(
    store: &Store,
    row: &FilteredRow<'a>,
    policy: VersionPolicy,
) -> Vec<(usize, &'a Cell)> {
    let mut chosen: FxHashMap<usize, &'a Cell> = FxHashMap::default();
    for cell in row.cells() {
        let Some(position) = store.column_position(cell.column()) else {
            continue;
        };
        match chosen.entry(position) {
            Entry::Occupied(mut current) => {
                if policy.prefers(cell.timestamp, current.get().timestamp) {
                    current.insert(cell);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(cell);
            }
        }
    }

    let mut resolved: Vec<(usize, &'a Cell)> = chosen.into_iter().collect();
    resolved.sort_unstable_by_key(|(position, _)| *position);
    resolved
}

impl<'a> FilteredView<'a> {
    /// See [`scan`].
    pub fn scan(&self) -> Scan<'a> {
        scan(*self)
    }

    /// See [`lookup`].
    pub fn lookup(&self, row_id: &str) -> crate::Result<RowLookup> {
        lookup(*self, row_id)
    }

    /// See [`apply`].
    pub fn apply(&self, row_id: &str) -> crate::Result<RowMapping> {
        apply(*self, row_id)
    }

    /// See [`to_matrix`].
    pub fn to_matrix(&self, selector: &ColumnSelector) -> crate::Result<FeatureMatrix> {
        to_matrix(*self, selector)
    }

    /// See [`to_labeled_matrix`].
    pub fn to_labeled_matrix(
        &self,
        selector: &ColumnSelector,
        label_column: &str,
    ) -> crate::Result<LabeledMatrix> {
        to_labeled_matrix(*self, selector, label_column)
    }
}
