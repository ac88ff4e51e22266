//! Single-row lookup for query-function application.

use super::resolve_versions;
use crate::error::Result;
use crate::filter::FilteredView;
use crate::types::CellValue;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::Arc;

/// A row flattened to one value per column, in canonical column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMapping {
    entries: Vec<(Arc<str>, CellValue)>,
}

impl RowMapping {
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_ref() == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.entries.iter().map(|(name, value)| (name.as_ref(), value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for RowMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (column, value) in &self.entries {
            map.serialize_entry(column.as_ref(), value)?;
        }
        map.end()
    }
}

/// Outcome of looking up a known row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowLookup {
    /// At least one cell survived.
    Matched(RowMapping),
    /// The row exists but the predicate rejected every cell.
    FilteredOut,
}

impl RowLookup {
    pub fn is_matched(&self) -> bool {
        matches!(self, RowLookup::Matched(_))
    }

    /// The mapping, empty for a filtered-out row.
    pub fn into_mapping(self) -> RowMapping {
        match self {
            RowLookup::Matched(mapping) => mapping,
            RowLookup::FilteredOut => RowMapping::default(),
        }
    }
}

/// Look up `row_id`, collapsing multiple surviving versions of a column with
/// the store's [`VersionPolicy`](crate::VersionPolicy).
///
/// Fails with [`TimecellError::UnknownRow`](crate::TimecellError::UnknownRow)
/// when the row was never recorded.
pub fn lookup(view: FilteredView<'_>, row_id: &str) -> Result<RowLookup> {
    let row = view.row(row_id)?;
    let store = view.store();
    let resolved = resolve_versions(store, &row, store.config().version_policy);
    if resolved.is_empty() {
        return Ok(RowLookup::FilteredOut);
    }

    let columns = store.columns();
    let entries = resolved
        .into_iter()
        .map(|(position, cell)| (Arc::clone(&columns[position]), cell.value.clone()))
        .collect();
    Ok(RowLookup::Matched(RowMapping { entries }))
}

/// Like [`lookup`], with a filtered-out row reported as an empty mapping.
pub fn apply(view: FilteredView<'_>, row_id: &str) -> Result<RowMapping> {
    lookup(view, row_id).map(RowLookup::into_mapping)
}
