//! In-process consumers of filtered views.
//!
//! Each consumer compiles its `when` clause once, at construction, so a bad
//! expression fails before any data is read. Configurations deserialize from
//! camelCase JSON, e.g.
//!
//! ```json
//! { "outputId": "recent", "when": "timestamp() > '2015-01-01'" }
//! ```

use crate::error::{Result, TimecellError};
use crate::materialize::{ColumnSelector, FeatureMatrix, LabeledMatrix, RowLookup, RowMapping};
use crate::predicate::CompiledPredicate;
use crate::store::{Dataset, Store};
use serde::{Deserialize, Serialize};

fn compile_when(when: Option<&str>) -> Result<CompiledPredicate> {
    match when {
        Some(source) => CompiledPredicate::compile(source),
        None => Ok(CompiledPredicate::always()),
    }
}

/// Configuration of a [`Transform`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformConfig {
    /// Name of the dataset the transform produces.
    pub output_id: String,
    #[serde(default)]
    pub when: Option<String>,
    #[serde(default)]
    pub select: ColumnSelector,
}

impl TransformConfig {
    pub fn new(output_id: impl Into<String>) -> Self {
        Self {
            output_id: output_id.into(),
            when: None,
            select: ColumnSelector::All,
        }
    }

    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }

    pub fn with_select(mut self, select: ColumnSelector) -> Self {
        self.select = select;
        self
    }
}

/// Copies the surviving cells of a store into a new dataset, timestamps
/// unchanged.
#[derive(Debug, Clone)]
pub struct Transform {
    config: TransformConfig,
    when: CompiledPredicate,
}

impl Transform {
    pub fn new(config: TransformConfig) -> Result<Self> {
        if config.output_id.is_empty() {
            return Err(TimecellError::InvalidInput(
                "transform output id cannot be empty".to_string(),
            ));
        }
        let when = compile_when(config.when.as_deref())?;
        Ok(Self { config, when })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn config(&self) -> &TransformConfig {
        &self.config
    }

    pub fn when(&self) -> &CompiledPredicate {
        &self.when
    }

    /// Run against `input`. The output is only returned once fully built.
    ///
    /// Rows left without any cell are not recorded, since a row only exists
    /// through its cells.
    pub fn run(&self, input: &Store) -> Result<Store> {
        let output = Dataset::with_config(self.config.output_id.clone(), input.config().clone())?;
        let mut dropped = 0usize;

        for row in input.filter(&self.when).scan() {
            let cells: Vec<_> = row
                .to_record()
                .into_iter()
                .filter(|(column, _, _)| self.config.select.selects(column))
                .collect();
            if cells.is_empty() {
                dropped += 1;
                continue;
            }
            output.record_row(row.row_id, cells)?;
        }

        log::debug!(
            "Transform '{}' -> '{}' with when {}: {} rows kept, {} rows empty",
            input.name(),
            self.config.output_id,
            self.when,
            output.row_count(),
            dropped
        );
        output.commit()
    }
}

/// Configuration of a [`QueryFunction`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryFunctionConfig {
    /// Row the function reads.
    pub row: String,
    #[serde(default)]
    pub when: Option<String>,
}

impl QueryFunctionConfig {
    pub fn new(row: impl Into<String>) -> Self {
        Self {
            row: row.into(),
            when: None,
        }
    }

    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }
}

/// Reads one fixed row of a store through a `when` clause.
#[derive(Debug, Clone)]
pub struct QueryFunction {
    config: QueryFunctionConfig,
    when: CompiledPredicate,
}

impl QueryFunction {
    pub fn new(config: QueryFunctionConfig) -> Result<Self> {
        let when = compile_when(config.when.as_deref())?;
        Ok(Self { config, when })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn config(&self) -> &QueryFunctionConfig {
        &self.config
    }

    pub fn when(&self) -> &CompiledPredicate {
        &self.when
    }

    /// Column→value mapping of the row; empty when every cell was filtered.
    pub fn apply(&self, store: &Store) -> Result<RowMapping> {
        store.filter(&self.when).apply(&self.config.row)
    }

    pub fn lookup(&self, store: &Store) -> Result<RowLookup> {
        store.filter(&self.when).lookup(&self.config.row)
    }
}

/// Configuration of a [`TrainingInput`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingInputConfig {
    #[serde(default)]
    pub select: ColumnSelector,
    /// Label column for supervised training.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub when: Option<String>,
}

impl TrainingInputConfig {
    pub fn new(select: ColumnSelector) -> Self {
        Self {
            select,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_when(mut self, when: impl Into<String>) -> Self {
        self.when = Some(when.into());
        self
    }
}

/// Builds trainer input (feature vectors, optionally with labels).
#[derive(Debug, Clone)]
pub struct TrainingInput {
    config: TrainingInputConfig,
    when: CompiledPredicate,
}

impl TrainingInput {
    pub fn new(config: TrainingInputConfig) -> Result<Self> {
        let when = compile_when(config.when.as_deref())?;
        Ok(Self { config, when })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::new(serde_json::from_str(json)?)
    }

    pub fn config(&self) -> &TrainingInputConfig {
        &self.config
    }

    pub fn when(&self) -> &CompiledPredicate {
        &self.when
    }

    /// Unsupervised input from the selected columns. The label setting is
    /// ignored, so rows without a label are kept.
    pub fn features(&self, store: &Store) -> Result<FeatureMatrix> {
        store.filter(&self.when).to_matrix(&self.config.select)
    }

    /// Supervised input; requires a label column.
    pub fn labeled(&self, store: &Store) -> Result<LabeledMatrix> {
        let label = self.config.label.as_deref().ok_or_else(|| {
            TimecellError::InvalidInput("training input has no label column".to_string())
        })?;
        store
            .filter(&self.when)
            .to_labeled_matrix(&self.config.select, label)
    }
}
