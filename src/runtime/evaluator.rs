//! Guard comparisons.
//!
//! The processor only decides *which* conditions to check and in what order;
//! the comparison itself goes through a [`ConditionEvaluator`]. The default
//! evaluator is an [`OperatorTable`] mapping operator names to plain
//! comparison functions.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{Number, Value};

use crate::error::ConditionError;

pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, operator: &str, current: &Value, expected: &Value) -> Result<bool, ConditionError>;
}

/// A comparison between the current variable value and the expected value.
/// `None` means the two values cannot be compared with this operator.
pub type Comparison = fn(&Value, &Value) -> Option<bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Contains,
    In,
}

impl Operator {
    pub const ALL: [Operator; 8] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::GreaterThan,
        Operator::GreaterThanOrEqual,
        Operator::LessThan,
        Operator::LessThanOrEqual,
        Operator::Contains,
        Operator::In,
    ];

    /// Canonical name followed by accepted aliases.
    pub fn names(self) -> &'static [&'static str] {
        match self {
            Operator::Equals => &["equals", "eq", "=="],
            Operator::NotEquals => &["not_equals", "not-equals", "neq", "!="],
            Operator::GreaterThan => &["greater_than", "gt", ">"],
            Operator::GreaterThanOrEqual => &["greater_than_or_equal", "gte", ">="],
            Operator::LessThan => &["less_than", "lt", "<"],
            Operator::LessThanOrEqual => &["less_than_or_equal", "lte", "<="],
            Operator::Contains => &["contains"],
            Operator::In => &["in"],
        }
    }

    pub fn comparison(self) -> Comparison {
        match self {
            Operator::Equals => |a, b| Some(values_equal(a, b)),
            Operator::NotEquals => |a, b| Some(!values_equal(a, b)),
            Operator::GreaterThan => |a, b| ordering(a, b).map(Ordering::is_gt),
            Operator::GreaterThanOrEqual => |a, b| ordering(a, b).map(Ordering::is_ge),
            Operator::LessThan => |a, b| ordering(a, b).map(Ordering::is_lt),
            Operator::LessThanOrEqual => |a, b| ordering(a, b).map(Ordering::is_le),
            Operator::Contains => contains,
            Operator::In => |a, b| contains(b, a).filter(|_| b.is_array()),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.names()[0])
    }
}

impl FromStr for Operator {
    type Err = ConditionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Operator::ALL
            .into_iter()
            .find(|op| op.names().iter().any(|name| name.eq_ignore_ascii_case(wanted)))
            .ok_or_else(|| ConditionError::UnknownOperator(s.to_string()))
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn ordering(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

// Integers are compared exactly; f64 only when either side is a float.
fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    match (x.as_i64(), y.as_i64(), x.as_u64(), y.as_u64()) {
        (Some(a), Some(b), _, _) => Some(a.cmp(&b)),
        (_, _, Some(a), Some(b)) => Some(a.cmp(&b)),
        // One side is a u64 above i64::MAX, the other a negative i64.
        (Some(_), None, _, Some(_)) => Some(Ordering::Less),
        (None, Some(_), Some(_), _) => Some(Ordering::Greater),
        _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}

fn contains(haystack: &Value, needle: &Value) -> Option<bool> {
    match (haystack, needle) {
        (Value::String(s), Value::String(sub)) => Some(s.contains(sub.as_str())),
        (Value::Array(items), _) => Some(items.iter().any(|item| values_equal(item, needle))),
        _ => None,
    }
}

/// Operator name → comparison function.
#[derive(Clone)]
pub struct OperatorTable {
    entries: HashMap<String, Comparison>,
}

impl fmt::Debug for OperatorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        f.debug_struct("OperatorTable").field("operators", &names).finish()
    }
}

impl Default for OperatorTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl OperatorTable {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Every [`Operator`] under its canonical name and aliases.
    pub fn standard() -> Self {
        let mut table = Self::empty();
        for op in Operator::ALL {
            for name in op.names() {
                table.register(*name, op.comparison());
            }
        }
        table
    }

    /// Add or replace an operator. Names are matched case-insensitively.
    pub fn register(&mut self, name: impl Into<String>, comparison: Comparison) -> &mut Self {
        self.entries.insert(name.into().to_ascii_lowercase(), comparison);
        self
    }

    pub fn supports(&self, operator: &str) -> bool {
        self.entries.contains_key(&operator.trim().to_ascii_lowercase())
    }
}

impl ConditionEvaluator for OperatorTable {
    fn evaluate(&self, operator: &str, current: &Value, expected: &Value) -> Result<bool, ConditionError> {
        let comparison = self
            .entries
            .get(&operator.trim().to_ascii_lowercase())
            .ok_or_else(|| ConditionError::UnknownOperator(operator.to_string()))?;
        comparison(current, expected).ok_or_else(|| ConditionError::Incomparable {
            operator: operator.to_string(),
            current: current.clone(),
            expected: expected.clone(),
        })
    }
}
