//! Cell values, cells and engine configuration.
//!
//! Configuration is serializable so it can be loaded from JSON (or TOML with
//! the `toml` feature) alongside the procedure definitions that use it.
use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Value held by a single cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Numeric view of the value; text never converts.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::Number(_) => None,
            CellValue::Text(s) => Some(s),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Number(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
        }
    }
}

macro_rules! impl_from_number {
    ($($t:ty),*) => {
        $(
            impl From<$t> for CellValue {
                fn from(v: $t) -> Self {
                    CellValue::Number(v as f64)
                }
            }
        )*
    };
}

impl_from_number!(i8, i16, i32, i64, u8, u16, u32, u64, usize, f32, f64);

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

/// A single timestamped `(column, value)` fact attached to a row.
///
/// Column names are interned by the dataset that recorded the cell, so
/// cloning a cell never copies the name.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub column: Arc<str>,
    pub value: CellValue,
    pub timestamp: SystemTime,
}

impl Cell {
    pub fn column(&self) -> &str {
        &self.column
    }
}

/// Which version wins when a row holds several surviving cells for the
/// same column and a consumer needs exactly one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// Greatest timestamp wins; ties go to the cell recorded last.
    #[default]
    Latest,
    /// Smallest timestamp wins; ties go to the cell recorded first.
    Earliest,
}

impl VersionPolicy {
    /// Whether `candidate` should replace `current` as the resolved version.
    /// `candidate` is always the later-recorded of the two.
    pub(crate) fn prefers(self, candidate: SystemTime, current: SystemTime) -> bool {
        match self {
            VersionPolicy::Latest => candidate >= current,
            VersionPolicy::Earliest => candidate < current,
        }
    }
}

/// Engine configuration
///
/// # Example
///
/// ```rust
/// use timecell::{Config, VersionPolicy};
///
/// let json = r#"{
///     "version_policy": "earliest",
///     "missing_value": -1.0
/// }"#;
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.version_policy, VersionPolicy::Earliest);
/// assert_eq!(config.missing_value, -1.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// How duplicate column versions collapse to a single value
    #[serde(default)]
    pub version_policy: VersionPolicy,

    /// Fill value used when densifying a feature matrix
    #[serde(default = "Config::default_missing_value")]
    pub missing_value: f64,

    /// Relative pivot tolerance used by `FeatureMatrix::rank`
    #[serde(default = "Config::default_rank_tolerance")]
    pub rank_tolerance: f64,

    /// Rows with more cells than this are reported when committed
    #[serde(default = "Config::default_wide_row_warn_threshold")]
    pub wide_row_warn_threshold: usize,
}

impl Config {
    const fn default_missing_value() -> f64 {
        0.0
    }

    const fn default_rank_tolerance() -> f64 {
        1e-9
    }

    const fn default_wide_row_warn_threshold() -> usize {
        10_000
    }

    pub fn with_version_policy(mut self, policy: VersionPolicy) -> Self {
        self.version_policy = policy;
        self
    }

    pub fn with_missing_value(mut self, value: f64) -> Self {
        self.missing_value = value;
        self
    }

    pub fn with_rank_tolerance(mut self, tolerance: f64) -> Self {
        assert!(
            tolerance.is_finite() && tolerance >= 0.0,
            "Rank tolerance must be finite and non-negative"
        );
        self.rank_tolerance = tolerance;
        self
    }

    pub fn with_wide_row_warn_threshold(mut self, threshold: usize) -> Self {
        assert!(threshold > 0, "Wide row threshold must be greater than zero");
        self.wide_row_warn_threshold = threshold;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if !self.missing_value.is_finite() {
            return Err("Missing value fill must be finite".to_string());
        }

        if !self.rank_tolerance.is_finite() || self.rank_tolerance < 0.0 {
            return Err("Rank tolerance must be finite and non-negative".to_string());
        }

        if self.wide_row_warn_threshold == 0 {
            return Err("Wide row threshold must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Load configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load configuration from TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    /// Save configuration as TOML string (requires toml feature)
    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version_policy: VersionPolicy::default(),
            missing_value: Self::default_missing_value(),
            rank_tolerance: Self::default_rank_tolerance(),
            wide_row_warn_threshold: Self::default_wide_row_warn_threshold(),
        }
    }
}

/// Summary of a committed store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreStats {
    pub row_count: usize,
    pub cell_count: usize,
    pub column_count: usize,
    /// Smallest cell timestamp, `None` for an empty store
    pub earliest: Option<SystemTime>,
    /// Greatest cell timestamp, `None` for an empty store
    pub latest: Option<SystemTime>,
}
