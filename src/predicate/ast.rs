//! Typed expression tree for `when` predicates.

use super::instant::format_instant;
use std::fmt;
use std::ops::{Bound, Not};
use std::time::SystemTime;

/// Comparison operator between `timestamp()` and a literal instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    /// Operator to use when the operands are swapped (`'a' < t` is `t > 'a'`).
    pub fn flip(self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            CmpOp::Eq => CmpOp::Eq,
            CmpOp::Ne => CmpOp::Ne,
        }
    }

    /// Apply `lhs OP rhs`.
    pub fn apply(self, lhs: SystemTime, rhs: SystemTime) -> bool {
        match self {
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
        }
    }
}

/// Boolean expression over the timestamp of a single cell.
///
/// Built either by the parser or directly through the constructors below.
/// The combinators fold constants, so `TRUE AND e` is stored as `e`.
///
/// ```rust
/// use timecell::predicate::{CmpOp, TemporalExpr};
/// use std::time::{Duration, SystemTime};
///
/// let start = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
/// let end = start + Duration::from_secs(100);
///
/// let expr = TemporalExpr::between(start, end).and(TemporalExpr::cmp(CmpOp::Ne, end));
/// assert!(expr.evaluate(start));
/// assert!(!expr.evaluate(end));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemporalExpr {
    Const(bool),
    /// `timestamp() OP instant`
    Cmp { op: CmpOp, instant: SystemTime },
    /// `timestamp() BETWEEN low AND high`, inclusive on both ends
    Between { low: SystemTime, high: SystemTime },
    Not(Box<TemporalExpr>),
    And(Box<TemporalExpr>, Box<TemporalExpr>),
    Or(Box<TemporalExpr>, Box<TemporalExpr>),
}

impl TemporalExpr {
    pub fn cmp(op: CmpOp, instant: SystemTime) -> Self {
        TemporalExpr::Cmp { op, instant }
    }

    pub fn between(low: SystemTime, high: SystemTime) -> Self {
        TemporalExpr::Between { low, high }
    }

    pub fn and(self, rhs: TemporalExpr) -> Self {
        use TemporalExpr::*;
        match (self, rhs) {
            (Const(false), _) | (_, Const(false)) => Const(false),
            (Const(true), x) | (x, Const(true)) => x,
            (x, y) => And(Box::new(x), Box::new(y)),
        }
    }

    pub fn or(self, rhs: TemporalExpr) -> Self {
        use TemporalExpr::*;
        match (self, rhs) {
            (Const(true), _) | (_, Const(true)) => Const(true),
            (Const(false), x) | (x, Const(false)) => x,
            (x, y) => Or(Box::new(x), Box::new(y)),
        }
    }

    pub fn negate(self) -> Self {
        match self {
            TemporalExpr::Const(b) => TemporalExpr::Const(!b),
            TemporalExpr::Not(inner) => *inner,
            other => TemporalExpr::Not(Box::new(other)),
        }
    }

    pub fn evaluate(&self, timestamp: SystemTime) -> bool {
        match self {
            TemporalExpr::Const(b) => *b,
            TemporalExpr::Cmp { op, instant } => op.apply(timestamp, *instant),
            TemporalExpr::Between { low, high } => *low <= timestamp && timestamp <= *high,
            TemporalExpr::Not(inner) => !inner.evaluate(timestamp),
            TemporalExpr::And(a, b) => a.evaluate(timestamp) && b.evaluate(timestamp),
            TemporalExpr::Or(a, b) => a.evaluate(timestamp) || b.evaluate(timestamp),
        }
    }

    /// Tightest interval outside of which the expression is certainly false.
    ///
    /// `None` means the expression can never be true. Negations are not
    /// inverted and widen to the full range.
    pub fn bounds(&self) -> Option<TimeRange> {
        match self {
            TemporalExpr::Const(true) => Some(TimeRange::FULL),
            TemporalExpr::Const(false) => None,
            TemporalExpr::Cmp { op, instant } => {
                let t = *instant;
                Some(match op {
                    CmpOp::Lt => TimeRange::new(Bound::Unbounded, Bound::Excluded(t)),
                    CmpOp::Le => TimeRange::new(Bound::Unbounded, Bound::Included(t)),
                    CmpOp::Gt => TimeRange::new(Bound::Excluded(t), Bound::Unbounded),
                    CmpOp::Ge => TimeRange::new(Bound::Included(t), Bound::Unbounded),
                    CmpOp::Eq => TimeRange::new(Bound::Included(t), Bound::Included(t)),
                    CmpOp::Ne => TimeRange::FULL,
                })
            }
            TemporalExpr::Between { low, high } => {
                TimeRange::new(Bound::Included(*low), Bound::Included(*high)).non_empty()
            }
            TemporalExpr::Not(_) => Some(TimeRange::FULL),
            TemporalExpr::And(a, b) => a.bounds()?.intersect(&b.bounds()?),
            TemporalExpr::Or(a, b) => match (a.bounds(), b.bounds()) {
                (Some(x), Some(y)) => Some(x.hull(&y)),
                (x, None) | (None, x) => x,
            },
        }
    }
}

impl Not for TemporalExpr {
    type Output = TemporalExpr;

    fn not(self) -> TemporalExpr {
        self.negate()
    }
}

impl fmt::Display for TemporalExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalExpr::Const(true) => write!(f, "TRUE"),
            TemporalExpr::Const(false) => write!(f, "FALSE"),
            TemporalExpr::Cmp { op, instant } => {
                write!(f, "timestamp() {} '{}'", op.symbol(), format_instant(*instant))
            }
            TemporalExpr::Between { low, high } => write!(
                f,
                "timestamp() BETWEEN '{}' AND '{}'",
                format_instant(*low),
                format_instant(*high)
            ),
            TemporalExpr::Not(inner) => write!(f, "NOT ({})", inner),
            TemporalExpr::And(a, b) => write!(f, "({} AND {})", a, b),
            TemporalExpr::Or(a, b) => write!(f, "({} OR {})", a, b),
        }
    }
}

/// Interval of instants with explicit inclusive/exclusive edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub lower: Bound<SystemTime>,
    pub upper: Bound<SystemTime>,
}

impl TimeRange {
    pub const FULL: TimeRange = TimeRange {
        lower: Bound::Unbounded,
        upper: Bound::Unbounded,
    };

    pub fn new(lower: Bound<SystemTime>, upper: Bound<SystemTime>) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, t: SystemTime) -> bool {
        let above = match self.lower {
            Bound::Unbounded => true,
            Bound::Included(l) => t >= l,
            Bound::Excluded(l) => t > l,
        };
        let below = match self.upper {
            Bound::Unbounded => true,
            Bound::Included(u) => t <= u,
            Bound::Excluded(u) => t < u,
        };
        above && below
    }

    pub fn is_full(&self) -> bool {
        matches!(
            (self.lower, self.upper),
            (Bound::Unbounded, Bound::Unbounded)
        )
    }

    fn is_empty(&self) -> bool {
        match (self.lower, self.upper) {
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
            _ => false,
        }
    }

    fn non_empty(self) -> Option<Self> {
        if self.is_empty() { None } else { Some(self) }
    }

    fn intersect(&self, other: &TimeRange) -> Option<TimeRange> {
        TimeRange::new(
            tighter_lower(self.lower, other.lower),
            tighter_upper(self.upper, other.upper),
        )
        .non_empty()
    }

    fn hull(&self, other: &TimeRange) -> TimeRange {
        TimeRange::new(
            looser_lower(self.lower, other.lower),
            looser_upper(self.upper, other.upper),
        )
    }
}

fn tighter_lower(a: Bound<SystemTime>, b: Bound<SystemTime>) -> Bound<SystemTime> {
    use Bound::*;
    match (a, b) {
        (Unbounded, x) | (x, Unbounded) => x,
        (Included(x), Included(y)) => Included(x.max(y)),
        (Excluded(x), Excluded(y)) => Excluded(x.max(y)),
        (Included(i), Excluded(e)) | (Excluded(e), Included(i)) => {
            if i > e { Included(i) } else { Excluded(e) }
        }
    }
}

fn tighter_upper(a: Bound<SystemTime>, b: Bound<SystemTime>) -> Bound<SystemTime> {
    use Bound::*;
    match (a, b) {
        (Unbounded, x) | (x, Unbounded) => x,
        (Included(x), Included(y)) => Included(x.min(y)),
        (Excluded(x), Excluded(y)) => Excluded(x.min(y)),
        (Included(i), Excluded(e)) | (Excluded(e), Included(i)) => {
            if i < e { Included(i) } else { Excluded(e) }
        }
    }
}

fn looser_lower(a: Bound<SystemTime>, b: Bound<SystemTime>) -> Bound<SystemTime> {
    use Bound::*;
    match (a, b) {
        (Unbounded, _) | (_, Unbounded) => Unbounded,
        (Included(x), Included(y)) => Included(x.min(y)),
        (Excluded(x), Excluded(y)) => Excluded(x.min(y)),
        (Included(i), Excluded(e)) | (Excluded(e), Included(i)) => {
            if i <= e { Included(i) } else { Excluded(e) }
        }
    }
}

fn looser_upper(a: Bound<SystemTime>, b: Bound<SystemTime>) -> Bound<SystemTime> {
    use Bound::*;
    match (a, b) {
        (Unbounded, _) | (_, Unbounded) => Unbounded,
        (Included(x), Included(y)) => Included(x.max(y)),
        (Excluded(x), Excluded(y)) => Excluded(x.max(y)),
        (Included(i), Excluded(e)) | (Excluded(e), Included(i)) => {
            if i >= e { Included(i) } else { Excluded(e) }
        }
    }
}
