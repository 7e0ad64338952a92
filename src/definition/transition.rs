use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::Id;

/// Guard on a transition: `<variable_path> <operator> <value>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Variable id, optionally followed by `.key` / `.index` segments.
    #[serde(alias = "variable")]
    pub variable_path: String,
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(variable_path: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            variable_path: variable_path.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// Directed edge between two states. Eligible when every condition holds;
/// a transition without conditions is always eligible.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub(crate) id: Id,
    pub(crate) name: String,
    pub(crate) from: Id,
    pub(crate) to: Id,
    pub(crate) conditions: Vec<Condition>,
    pub(crate) priority: i32,
}

impl Transition {
    pub fn new(id: impl Into<Id>, name: impl Into<String>, from: impl Into<Id>, to: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            from: from.into(),
            to: to.into(),
            conditions: Vec::new(),
            priority: 0,
        }
    }

    /// Add a guard. Guards are checked in the order they are added.
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Carried for callers and export; the processor fires every eligible
    /// transition regardless of priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn from(&self) -> &Id {
        &self.from
    }

    pub fn to(&self) -> &Id {
        &self.to
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }
}
