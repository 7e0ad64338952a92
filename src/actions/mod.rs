//! The action contract and the actions that ship with the engine.
//!
//! An [`Action`] is one unit of side-effecting work attached to a state's
//! entry/exit list or to an event. Actions live inside the immutable
//! definition, so `execute` takes `&self`; anything an action wants to keep
//! goes into the process it runs against.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ActionExecutionError, ConfigurationError};
use crate::id::Id;
use crate::runtime::{HistoryKind, Process};

pub mod http_request;
pub mod log_entry;
pub mod registry;
pub mod set_variable;

pub use http_request::{HttpDefaults, HttpRequestAction, HttpRequestConfig};
pub use log_entry::AddLogEntryAction;
pub use registry::ActionRegistry;
pub use set_variable::{SetVariableAction, SetVariableConfig};

/// Which state or event owns an action. A label only, never a live reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "owner", content = "id", rename_all = "snake_case")]
pub enum Caller {
    State(Id),
    Event(Id),
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Caller::State(id) => write!(f, "state '{id}'"),
            Caller::Event(id) => write!(f, "event '{id}'"),
        }
    }
}

/// Identity shared by every action implementation.
#[derive(Debug, Clone, Default)]
pub struct ActionMeta {
    pub id: Id,
    pub caller: Option<Caller>,
}

impl ActionMeta {
    pub fn with_id(id: impl Into<Id>) -> Self {
        Self {
            id: id.into(),
            caller: None,
        }
    }
}

pub trait Action: fmt::Debug + Send + Sync {
    /// Registry name of the action type, e.g. `set_variable`.
    fn kind(&self) -> &'static str;

    fn meta(&self) -> &ActionMeta;

    fn meta_mut(&mut self) -> &mut ActionMeta;

    /// Validate and store `options`. Calling it again replaces the previous
    /// configuration.
    fn configure(&mut self, options: &Value) -> Result<(), ConfigurationError>;

    /// Run against `process`. `args` carries the event payload for event
    /// actions and `null` for state entry/exit actions.
    fn execute(&self, process: &mut Process, args: &Value) -> Result<(), ActionExecutionError>;

    /// Current configuration as a JSON object, for export.
    fn options(&self) -> Value;

    fn id(&self) -> &Id {
        &self.meta().id
    }

    fn caller(&self) -> Option<&Caller> {
        self.meta().caller.as_ref()
    }

    fn set_caller(&mut self, owner: Caller) {
        self.meta_mut().caller = Some(owner);
    }

    fn set_id(&mut self, id: Id) {
        self.meta_mut().id = id;
    }

    /// Append the `action_executed` audit entry. Implementations call this
    /// before doing anything that can fail.
    fn record_attempt(&self, process: &mut Process) {
        let owner = self
            .caller()
            .map(|caller| format!(" for {caller}"))
            .unwrap_or_default();
        process.add_to_history(
            HistoryKind::ActionExecuted,
            format!("Action '{}' ({}) executed{owner}", self.kind(), self.id()),
        );
    }
}

/// Deserialize an options object into an action's typed configuration.
pub(crate) fn parse_options<T: DeserializeOwned>(
    action: &'static str,
    options: &Value,
) -> Result<T, ConfigurationError> {
    if !options.is_object() {
        return Err(ConfigurationError::new(
            action,
            format!("options must be an object, got {options}"),
        ));
    }
    serde_json::from_value(options.clone())
        .map_err(|e| ConfigurationError::new(action, e.to_string()))
}
