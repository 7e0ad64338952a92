use std::fmt;

use serde::{Deserialize, Serialize};

use crate::actions::Action;
use crate::id::Id;

/// Role of a state in the workflow graph.
///
/// `Final` is informational: the engine does not stop at final states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    Initial,
    #[default]
    Intermediate,
    Final,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Initial => write!(f, "initial"),
            StateKind::Intermediate => write!(f, "intermediate"),
            StateKind::Final => write!(f, "final"),
        }
    }
}

#[derive(Debug)]
pub struct State {
    pub(crate) id: Id,
    pub(crate) name: String,
    pub(crate) kind: StateKind,
    pub(crate) entry_actions: Vec<Box<dyn Action>>,
    pub(crate) exit_actions: Vec<Box<dyn Action>>,
}

impl State {
    /// An intermediate state without actions. A blank `id` is replaced by a
    /// generated one when the definition is built.
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: StateKind::default(),
            entry_actions: Vec::new(),
            exit_actions: Vec::new(),
        }
    }

    pub fn with_kind(mut self, kind: StateKind) -> Self {
        self.kind = kind;
        self
    }

    /// Append an action run when a transition enters this state.
    pub fn on_entry(mut self, action: Box<dyn Action>) -> Self {
        self.entry_actions.push(action);
        self
    }

    /// Append an action run when a transition leaves this state.
    pub fn on_exit(mut self, action: Box<dyn Action>) -> Self {
        self.exit_actions.push(action);
        self
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> StateKind {
        self.kind
    }

    pub fn entry_actions(&self) -> &[Box<dyn Action>] {
        &self.entry_actions
    }

    pub fn exit_actions(&self) -> &[Box<dyn Action>] {
        &self.exit_actions
    }
}
