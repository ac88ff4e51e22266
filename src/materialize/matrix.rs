//! Numeric feature matrices for training procedures.
//!
//! Rows keep insertion order. Columns keep canonical (first-seen) order but
//! only those with at least one surviving numeric value are retained, so a
//! column whose cells were all filtered out does not widen the matrix. Text
//! values are not coerced; they are skipped and counted.

use super::resolve_versions;
use crate::error::{Result, TimecellError};
use crate::filter::FilteredView;
use crate::types::Cell;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// `(matrix column index, value)` pairs of one row, sorted by column.
pub type SparseRow = SmallVec<[(usize, f64); 8]>;

/// Which columns feed a matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnSelector {
    /// Every column (`{*}`).
    #[default]
    All,
    Only(Vec<String>),
    Except(Vec<String>),
}

impl ColumnSelector {
    pub fn only<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(columns.into_iter().map(Into::into).collect())
    }

    pub fn except<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Except(columns.into_iter().map(Into::into).collect())
    }

    pub fn selects(&self, column: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(columns) => columns.iter().any(|c| c == column),
            Self::Except(columns) => !columns.iter().any(|c| c == column),
        }
    }
}

/// Sparse numeric matrix built from a filtered view.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    row_labels: Vec<String>,
    columns: Vec<String>,
    rows: Vec<SparseRow>,
    skipped_text: usize,
    missing_value: f64,
    rank_tolerance: f64,
}

impl FeatureMatrix {
    /// Row ids, one per matrix row.
    pub fn row_labels(&self) -> &[String] {
        &self.row_labels
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[SparseRow] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[(usize, f64)]> {
        self.rows.get(index).map(|row| row.as_slice())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Text cells that were selected but left out.
    pub fn skipped_text(&self) -> usize {
        self.skipped_text
    }

    /// Value of `(row, column)`, if present.
    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        let row = self.rows.get(row)?;
        row.binary_search_by_key(&column, |(c, _)| *c)
            .ok()
            .map(|i| row[i].1)
    }

    /// Dense copy, absent entries set to `fill`.
    pub fn to_dense(&self, fill: f64) -> Vec<Vec<f64>> {
        self.rows
            .iter()
            .map(|row| {
                let mut dense = vec![fill; self.columns.len()];
                for &(column, value) in row {
                    dense[column] = value;
                }
                dense
            })
            .collect()
    }

    /// Dense copy using the store's configured missing value.
    pub fn to_dense_default(&self) -> Vec<Vec<f64>> {
        self.to_dense(self.missing_value)
    }

    /// Mean of each column over the rows where it is present.
    pub fn column_means(&self) -> Vec<f64> {
        let mut sums = vec![0.0; self.columns.len()];
        let mut counts = vec![0usize; self.columns.len()];
        for row in &self.rows {
            for &(column, value) in row {
                sums[column] += value;
                counts[column] += 1;
            }
        }
        sums.into_iter()
            .zip(counts)
            .map(|(sum, count)| if count == 0 { f64::NAN } else { sum / count as f64 })
            .collect()
    }

    /// Numerical rank with the store's configured tolerance.
    pub fn rank(&self) -> usize {
        self.rank_with_tolerance(self.rank_tolerance)
    }

    /// Numerical rank of the dense matrix (missing value filled in), by
    /// Gaussian elimination with partial pivoting.
    ///
    /// A pivot counts when its magnitude exceeds
    /// `tolerance * max|a_ij| * max(rows, columns)`.
    pub fn rank_with_tolerance(&self, tolerance: f64) -> usize {
        let mut a = self.to_dense_default();
        let (m, n) = (a.len(), self.columns.len());
        if m == 0 || n == 0 {
            return 0;
        }

        let scale = a
            .iter()
            .flatten()
            .fold(0.0f64, |acc, value| acc.max(value.abs()));
        if scale == 0.0 {
            return 0;
        }
        let threshold = tolerance * scale * m.max(n) as f64;

        let mut rank = 0;
        for column in 0..n {
            if rank == m {
                break;
            }
            let (pivot, magnitude) = (rank..m)
                .map(|r| (r, a[r][column].abs()))
                .fold((rank, -1.0), |best, candidate| {
                    if candidate.1 > best.1 { candidate } else { best }
                });
            if magnitude <= threshold {
                continue;
            }
            a.swap(rank, pivot);

            let pivot_row = a[rank].clone();
            for row in a.iter_mut().skip(rank + 1) {
                let factor = row[column] / pivot_row[column];
                if factor == 0.0 {
                    continue;
                }
                for (c, value) in row.iter_mut().enumerate().skip(column) {
                    *value -= factor * pivot_row[c];
                }
            }
            rank += 1;
        }
        rank
    }
}

/// Feature matrix plus one label per matrix row.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    pub features: FeatureMatrix,
    pub labels: Vec<f64>,
}

impl LabeledMatrix {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Build a feature matrix from the selected columns of `view`.
///
/// Rows with no surviving numeric value in the selection are omitted.
pub fn to_matrix(view: FilteredView<'_>, selector: &ColumnSelector) -> Result<FeatureMatrix> {
    log_unknown_columns(view, selector);
    let builder = MatrixBuilder::new(view, selector);
    Ok(builder.build(view, |_| Some(())).0)
}

/// Build a feature matrix plus labels read from `label_column`.
///
/// The selector alone decides whether the label column is also a feature:
/// `ColumnSelector::All` keeps it, as `{*} as features, x as label` does.
/// Use [`ColumnSelector::except`] to leave it out. Rows whose label did not
/// survive or is not numeric are omitted, as are rows without any feature.
pub fn to_labeled_matrix(
    view: FilteredView<'_>,
    selector: &ColumnSelector,
    label_column: &str,
) -> Result<LabeledMatrix> {
    let store = view.store();
    let label_position = store.column_position(label_column).ok_or_else(|| {
        TimecellError::InvalidInput(format!(
            "label column '{}' does not exist in dataset '{}'",
            label_column,
            store.name()
        ))
    })?;
    log_unknown_columns(view, selector);

    let builder = MatrixBuilder::new(view, selector);
    let (features, labels) = builder.build(view, |resolved| {
        resolved
            .iter()
            .find(|(position, _)| *position == label_position)
            .and_then(|(_, cell)| cell.value.as_f64())
    });
    Ok(LabeledMatrix { features, labels })
}

fn log_unknown_columns(view: FilteredView<'_>, selector: &ColumnSelector) {
    if let ColumnSelector::Only(columns) = selector {
        for column in columns {
            if view.store().column_position(column).is_none() {
                log::debug!(
                    "Selected column '{}' does not exist in dataset '{}'",
                    column,
                    view.store().name()
                );
            }
        }
    }
}

struct MatrixBuilder {
    /// Indexed by canonical column position.
    selected: Vec<bool>,
}

impl MatrixBuilder {
    fn new(view: FilteredView<'_>, selector: &ColumnSelector) -> Self {
        let selected = view
            .store()
            .columns()
            .iter()
            .map(|name| selector.selects(name))
            .collect();
        Self { selected }
    }

    /// `extra` pulls a per-row companion value out of the resolved cells;
    /// rows for which it returns `None` are dropped.
    fn build<'a, T>(
        self,
        view: FilteredView<'a>,
        extra: impl Fn(&[(usize, &'a Cell)]) -> Option<T>,
    ) -> (FeatureMatrix, Vec<T>) {
        let store = view.store();
        let config = store.config();

        let mut row_labels = Vec::new();
        let mut rows: Vec<SparseRow> = Vec::new();
        let mut extras = Vec::new();
        let mut skipped_text = 0;
        let mut used = vec![false; self.selected.len()];

        for row in view.rows() {
            let resolved = resolve_versions(store, &row, config.version_policy);
            let Some(companion) = extra(resolved.as_slice()) else {
                continue;
            };

            let mut sparse = SparseRow::new();
            for (position, cell) in &resolved {
                if !self.selected[*position] {
                    continue;
                }
                match cell.value.as_f64() {
                    Some(value) => sparse.push((*position, value)),
                    None => skipped_text += 1,
                }
            }
            if sparse.is_empty() {
                continue;
            }
            for &(position, _) in &sparse {
                used[position] = true;
            }
            row_labels.push(row.id().to_string());
            rows.push(sparse);
            extras.push(companion);
        }

        // Canonical position -> matrix column index.
        let mut remap = vec![usize::MAX; used.len()];
        let mut columns = Vec::new();
        for (position, name) in store.columns().iter().enumerate() {
            if used[position] {
                remap[position] = columns.len();
                columns.push(name.to_string());
            }
        }
        for row in &mut rows {
            for entry in row.iter_mut() {
                entry.0 = remap[entry.0];
            }
        }

        if skipped_text > 0 {
            log::debug!(
                "Skipped {} text cells while building a matrix from '{}'",
                skipped_text,
                store.name()
            );
        }

        let matrix = FeatureMatrix {
            row_labels,
            columns,
            rows,
            skipped_text,
            missing_value: config.missing_value,
            rank_tolerance: config.rank_tolerance,
        };
        (matrix, extras)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{CompiledPredicate, compile};
    use crate::store::{Dataset, Store};
    use crate::types::Config;
    use std::time::{Duration, SystemTime};

    fn t(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn store() -> Store {
        let dataset = Dataset::new("matrix");
        dataset
            .record_row(
                "r1",
                [
                    ("x", 1.into(), t(10)),
                    ("y", 2.into(), t(10)),
                    ("note", "hi".into(), t(10)),
                    ("z", 7.into(), t(500)),
                ],
            )
            .unwrap();
        dataset
            .record_row("r2", [("x", 3.into(), t(10)), ("y", 6.into(), t(10))])
            .unwrap();
        dataset.record_row("r3", [("z", 1.into(), t(500))]).unwrap();
        dataset.commit().unwrap()
    }

    fn early() -> CompiledPredicate {
        compile("timestamp() < '1970-01-01T00:01:00Z'").unwrap()
    }

    #[test]
    fn test_matrix_omits_filtered_columns_and_rows() {
        let store = store();
        let p = early();
        let m = store.filter(&p).to_matrix(&ColumnSelector::All).unwrap();

        assert_eq!(m.columns(), ["x", "y"]);
        assert_eq!(m.row_labels(), ["r1", "r2"]);
        assert_eq!(m.to_dense(0.0), vec![vec![1.0, 2.0], vec![3.0, 6.0]]);
        assert_eq!(m.skipped_text(), 1);
    }

    #[test]
    fn test_missing_entries_use_fill() {
        let store = store();
        let p = CompiledPredicate::always();
        let m = store.filter(&p).to_matrix(&ColumnSelector::All).unwrap();

        assert_eq!(m.columns(), ["x", "y", "z"]);
        assert_eq!(m.get(2, 0), None);
        assert_eq!(m.get(2, 2), Some(1.0));
        assert_eq!(m.to_dense_default()[2], vec![0.0, 0.0, 1.0]);
        assert!(m.to_dense(f64::NAN)[2][0].is_nan());
    }

    #[test]
    fn test_selectors() {
        let store = store();
        let p = CompiledPredicate::always();
        let view = store.filter(&p);

        let only = view.to_matrix(&ColumnSelector::only(["z", "missing"])).unwrap();
        assert_eq!(only.columns(), ["z"]);
        assert_eq!(only.row_labels(), ["r1", "r3"]);

        let except = view.to_matrix(&ColumnSelector::except(["x", "note"])).unwrap();
        assert_eq!(except.columns(), ["y", "z"]);
        assert_eq!(except.skipped_text(), 0);
    }

    #[test]
    fn test_rank_of_dependent_columns() {
        let store = store();
        let p = early();
        let m = store.filter(&p).to_matrix(&ColumnSelector::All).unwrap();
        // (1, 2) and (3, 6)
        assert_eq!(m.rank(), 1);

        let all = CompiledPredicate::always();
        let full = store.filter(&all).to_matrix(&ColumnSelector::All).unwrap();
        assert_eq!(full.rank(), 2);
    }

    #[test]
    fn test_rank_of_empty_matrix_is_zero() {
        let store = store();
        let never = compile("FALSE").unwrap();
        let m = store.filter(&never).to_matrix(&ColumnSelector::All).unwrap();
        assert!(m.is_empty());
        assert_eq!(m.width(), 0);
        assert_eq!(m.rank(), 0);
    }

    #[test]
    fn test_column_means() {
        let store = store();
        let p = CompiledPredicate::always();
        let m = store.filter(&p).to_matrix(&ColumnSelector::All).unwrap();
        assert_eq!(m.column_means(), vec![2.0, 4.0, 4.0]);
    }

    #[test]
    fn test_labeled_matrix() {
        let dataset = Dataset::with_config("labels", Config::default()).unwrap();
        dataset
            .record_row("a", [("f", 1.into(), t(1)), ("label", 1.into(), t(1))])
            .unwrap();
        dataset
            .record_row("b", [("f", 2.into(), t(1)), ("label", "bad".into(), t(1))])
            .unwrap();
        dataset
            .record_row("c", [("f", 3.into(), t(1)), ("label", 0.into(), t(900))])
            .unwrap();
        dataset
            .record_row("d", [("f", 4.into(), t(1)), ("label", 0.into(), t(1))])
            .unwrap();
        let store = dataset.commit().unwrap();

        let p = early();
        let labeled = store
            .filter(&p)
            .to_labeled_matrix(&ColumnSelector::All, "label")
            .unwrap();
        assert_eq!(labeled.features.columns(), ["f", "label"]);
        assert_eq!(labeled.features.row_labels(), ["a", "d"]);
        assert_eq!(labeled.features.to_dense(0.0), vec![vec![1.0, 1.0], vec![4.0, 0.0]]);
        assert_eq!(labeled.labels, vec![1.0, 0.0]);

        let without_label = store
            .filter(&p)
            .to_labeled_matrix(&ColumnSelector::except(["label"]), "label")
            .unwrap();
        assert_eq!(without_label.features.columns(), ["f"]);
        assert_eq!(without_label.labels, vec![1.0, 0.0]);

        let err = store
            .filter(&p)
            .to_labeled_matrix(&ColumnSelector::All, "nope")
            .unwrap_err();
        assert!(matches!(err, TimecellError::InvalidInput(_)));
    }
}
