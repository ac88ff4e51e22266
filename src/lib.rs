//! Temporal cell filtering over timestamped tabular data.
//!
//! Every cell of a [`Store`] carries its own timestamp and all versions are
//! kept. A `when` expression selects cells by timestamp, one cell at a time,
//! and the resulting [`FilteredView`] feeds scans, single-row lookups and
//! numeric matrices.
//!
//! ```rust
//! use std::time::{Duration, SystemTime};
//! use timecell::{ColumnSelector, Dataset, compile};
//!
//! let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_420_070_400);
//! let tomorrow = now + Duration::from_secs(86_400);
//!
//! let dataset = Dataset::new("example");
//! dataset.record_row("0", [("x", 0.into(), now)])?;
//! dataset.record_row("9", [("x", 9.into(), tomorrow)])?;
//! let store = dataset.commit()?;
//!
//! let when = compile("timestamp() <= '2015-01-01T02:00:00Z'")?;
//! let view = store.filter(&when);
//! assert!(view.apply("9")?.is_empty());
//! assert_eq!(view.to_matrix(&ColumnSelector::All)?.len(), 1);
//! # Ok::<(), timecell::TimecellError>(())
//! ```

pub mod error;
pub mod filter;
pub mod materialize;
pub mod predicate;
pub mod procedure;
pub mod store;
pub mod types;

pub use error::{Result, TimecellError};

pub use filter::{FilteredRow, FilteredRows, FilteredView, filter};

pub use materialize::{
    ColumnSelector, FeatureMatrix, LabeledMatrix, RowLookup, RowMapping, Scan, ScannedRow, apply,
    lookup, scan, to_labeled_matrix, to_matrix,
};

pub use predicate::{CmpOp, CompiledPredicate, TemporalExpr, TimeRange, compile};

pub use procedure::{
    QueryFunction, QueryFunctionConfig, TrainingInput, TrainingInputConfig, Transform,
    TransformConfig,
};

pub use store::{Dataset, Row, Store};

pub use types::{Cell, CellValue, Config, StoreStats, VersionPolicy};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{Dataset, Result, Store, TimecellError};

    pub use crate::{CompiledPredicate, TemporalExpr, compile};

    pub use crate::{ColumnSelector, FilteredView, RowLookup, RowMapping};

    pub use crate::{CellValue, Config, VersionPolicy};

    pub use std::time::{Duration, SystemTime};
}
