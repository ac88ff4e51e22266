//! Timestamped cell store.
//!
//! A [`Dataset`] accepts rows of `(column, value, timestamp)` triples and is
//! sealed by [`Dataset::commit`] into an immutable [`Store`]. Every version of
//! every cell is retained; "when" is expressed by filtering, never by
//! deleting.

use crate::error::{Result, TimecellError};
use crate::filter::FilteredView;
use crate::predicate::CompiledPredicate;
use crate::types::{Cell, CellValue, Config, StoreStats};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::SystemTime;

mod internal;

use internal::Tables;

/// A row: an id plus every cell recorded for it, in recording order.
#[derive(Debug, Clone)]
pub struct Row {
    pub(crate) id: Arc<str>,
    pub(crate) cells: Vec<Cell>,
}

impl Row {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}

/// A dataset that is still accepting writes.
///
/// `Dataset` is `Send + Sync`: several threads may record rows at once.
/// Once [`commit`](Dataset::commit) has been called every further write fails
/// with [`TimecellError::DatasetCommitted`].
///
/// # Examples
///
/// ```rust
/// use timecell::Dataset;
/// use std::time::{Duration, SystemTime};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let now = SystemTime::now();
/// let tomorrow = now + Duration::from_secs(86_400);
///
/// let dataset = Dataset::new("dataset1");
/// dataset.record_row("0", [("x", 0.into(), now), ("y", 0.into(), now)])?;
/// dataset.record_row("9", [("x", 9.into(), tomorrow)])?;
///
/// let store = dataset.commit()?;
/// assert_eq!(store.len(), 2);
/// assert_eq!(store.columns().len(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Dataset {
    name: String,
    config: Config,
    inner: RwLock<DatasetState>,
}

#[derive(Debug, Default)]
struct DatasetState {
    tables: Tables,
    committed: bool,
}

impl Dataset {
    /// Create an empty dataset with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: Config::default(),
            inner: RwLock::new(DatasetState::default()),
        }
    }

    /// Create an empty dataset with a custom configuration.
    ///
    /// The configuration travels with the committed store and drives version
    /// resolution and matrix densification.
    pub fn with_config(name: impl Into<String>, config: Config) -> Result<Self> {
        config.validate().map_err(TimecellError::Config)?;
        Ok(Self {
            name: name.into(),
            config,
            inner: RwLock::new(DatasetState::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Record cells for a row.
    ///
    /// A new row is created on its first non-empty call; later calls append
    /// to it and the row keeps its original position. Recording an empty cell
    /// list for an unknown row does nothing. All cells are validated before
    /// any is stored.
    pub fn record_row<I, C>(&self, row_id: &str, cells: I) -> Result<()>
    where
        I: IntoIterator<Item = (C, CellValue, SystemTime)>,
        C: AsRef<str>,
    {
        Tables::validate_row_id(row_id)?;

        let mut validated = Vec::new();
        for (column, value, timestamp) in cells {
            let column = column.as_ref();
            Tables::validate_column(row_id, column)?;
            validated.push((column.to_string(), value, timestamp));
        }

        let mut state = self.inner.write();
        if state.committed {
            return Err(TimecellError::DatasetCommitted(self.name.clone()));
        }
        state.tables.append(row_id, validated);
        Ok(())
    }

    /// Record a single cell.
    pub fn record_cell(
        &self,
        row_id: &str,
        column: &str,
        value: impl Into<CellValue>,
        timestamp: SystemTime,
    ) -> Result<()> {
        self.record_row(row_id, [(column, value.into(), timestamp)])
    }

    /// Number of rows recorded so far.
    pub fn row_count(&self) -> usize {
        self.inner.read().tables.rows.len()
    }

    pub fn is_committed(&self) -> bool {
        self.inner.read().committed
    }

    /// Seal the dataset and return its immutable store.
    ///
    /// Committing twice fails with [`TimecellError::DatasetCommitted`].
    pub fn commit(&self) -> Result<Store> {
        let mut state = self.inner.write();
        if state.committed {
            return Err(TimecellError::DatasetCommitted(self.name.clone()));
        }
        state.committed = true;
        let tables = std::mem::take(&mut state.tables);
        drop(state);

        tables.warn_wide_rows(&self.name, self.config.wide_row_warn_threshold);
        log::debug!(
            "Committed dataset '{}': {} rows, {} cells, {} columns",
            self.name,
            tables.rows.len(),
            tables.cell_count,
            tables.columns.len()
        );

        Ok(Store {
            inner: Arc::new(StoreInner {
                name: self.name.clone(),
                config: self.config.clone(),
                tables,
            }),
        })
    }
}

/// Immutable, committed collection of timestamped cells.
///
/// Cloning is cheap and every read path is lock-free, so a `Store` can be
/// shared across threads without synchronization.
#[derive(Debug, Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    name: String,
    config: Config,
    tables: Tables,
}

impl Store {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.inner.tables.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tables.rows.is_empty()
    }

    pub fn cell_count(&self) -> usize {
        self.inner.tables.cell_count
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> std::slice::Iter<'_, Row> {
        self.inner.tables.rows.iter()
    }

    pub fn row(&self, row_id: &str) -> Option<&Row> {
        self.row_position(row_id)
            .map(|idx| &self.inner.tables.rows[idx])
    }

    /// Insertion position of a row.
    pub fn row_position(&self, row_id: &str) -> Option<usize> {
        self.inner.tables.row_index.get(row_id).copied()
    }

    pub fn contains_row(&self, row_id: &str) -> bool {
        self.inner.tables.row_index.contains_key(row_id)
    }

    /// Column names in canonical (first-seen) order across the whole store.
    pub fn columns(&self) -> &[Arc<str>] {
        &self.inner.tables.columns
    }

    /// Canonical position of a column.
    pub fn column_position(&self, column: &str) -> Option<usize> {
        self.inner.tables.column_index.get(column).copied()
    }

    pub fn stats(&self) -> StoreStats {
        self.inner.tables.stats()
    }

    /// Restrict the store to the cells matching `predicate`.
    pub fn filter<'a>(&'a self, predicate: &'a CompiledPredicate) -> FilteredView<'a> {
        FilteredView::new(self, predicate)
    }
}
