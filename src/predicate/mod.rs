//! Temporal predicate compiler.
//!
//! A "when" expression such as
//! `timestamp() BETWEEN '2015-01-01' AND '2030-01-06'` is parsed once into a
//! [`TemporalExpr`] and wrapped in a [`CompiledPredicate`]. Every malformed
//! input is rejected by [`compile`]; evaluation itself cannot fail, never
//! reads the wall clock and is safe to share across threads.

mod ast;
mod instant;
mod parser;

pub use ast::{CmpOp, TemporalExpr, TimeRange};
pub use instant::{format_instant, parse_instant};

use crate::error::{Result, TimecellError};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// A validated, ready-to-evaluate `when` predicate.
///
/// # Examples
///
/// ```rust
/// use timecell::predicate::{compile, parse_instant};
///
/// let when = compile("timestamp() BETWEEN '2015-01-01' AND '2015-06-06'")?;
/// assert!(when.evaluate(parse_instant("2015-01-01").unwrap()));
/// assert!(!when.evaluate(parse_instant("2015-06-07").unwrap()));
///
/// assert!(compile("timestamp() < 'tomorrow'").is_err());
/// # Ok::<(), timecell::TimecellError>(())
/// ```
#[derive(Debug, Clone)]
pub struct CompiledPredicate {
    source: String,
    expr: TemporalExpr,
    bounds: Option<TimeRange>,
}

impl CompiledPredicate {
    /// Parse and validate a textual expression.
    pub fn compile(source: &str) -> Result<Self> {
        let expr = parser::parse(source).inspect_err(|e| {
            log::debug!("Rejected when expression {:?}: {}", source, e);
        })?;
        Ok(Self::with_source(source.to_string(), expr))
    }

    /// Wrap an expression built programmatically.
    pub fn from_expr(expr: TemporalExpr) -> Self {
        Self::with_source(expr.to_string(), expr)
    }

    /// Predicate matching every cell (no `when` clause).
    pub fn always() -> Self {
        Self::from_expr(TemporalExpr::Const(true))
    }

    fn with_source(source: String, expr: TemporalExpr) -> Self {
        let bounds = expr.bounds();
        if bounds.is_none() {
            log::debug!("When expression {:?} can never match", source);
        }
        Self {
            source,
            expr,
            bounds,
        }
    }

    /// Whether a cell stamped `timestamp` passes the predicate.
    #[inline]
    pub fn evaluate(&self, timestamp: SystemTime) -> bool {
        match &self.bounds {
            None => false,
            Some(range) => range.contains(timestamp) && self.expr.evaluate(timestamp),
        }
    }

    /// The text the predicate was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &TemporalExpr {
        &self.expr
    }

    /// Interval outside of which the predicate is certainly false;
    /// `None` when it can never be true.
    pub fn bounds(&self) -> Option<TimeRange> {
        self.bounds
    }

    pub fn matches_nothing(&self) -> bool {
        self.bounds.is_none()
    }

    pub fn matches_everything(&self) -> bool {
        self.expr == TemporalExpr::Const(true)
    }
}

impl PartialEq for CompiledPredicate {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl fmt::Display for CompiledPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

impl FromStr for CompiledPredicate {
    type Err = TimecellError;

    fn from_str(s: &str) -> Result<Self> {
        Self::compile(s)
    }
}

impl From<TemporalExpr> for CompiledPredicate {
    fn from(expr: TemporalExpr) -> Self {
        Self::from_expr(expr)
    }
}

/// Compile a `when` expression.
pub fn compile(expression: &str) -> Result<CompiledPredicate> {
    CompiledPredicate::compile(expression)
}
