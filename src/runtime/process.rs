use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::definition::{Definition, Event};
use crate::error::ActionExecutionError;
use crate::id::Id;

/// Category of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryKind {
    ProcessCreated,
    VariableSet,
    EventRaised,
    ActiveStatesSet,
    ActionExecuted,
    Audit,
}

impl fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HistoryKind::ProcessCreated => "process_created",
            HistoryKind::VariableSet => "variable_set",
            HistoryKind::EventRaised => "event_raised",
            HistoryKind::ActiveStatesSet => "active_states_set",
            HistoryKind::ActionExecuted => "action_executed",
            HistoryKind::Audit => "audit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub kind: HistoryKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaisedEvent {
    pub event_id: Id,
    pub event_name: String,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

/// One running instance of a [`Definition`].
///
/// Everything a process does is appended to its history, which is never
/// truncated or reordered. The active state set is only ever replaced as a
/// whole, by the processor.
#[derive(Debug)]
pub struct Process {
    id: Id,
    definition: Arc<Definition>,
    configuration: Value,
    active_state_ids: Vec<Id>,
    variables: BTreeMap<Id, Value>,
    history: Vec<HistoryEntry>,
    raised_events: Vec<RaisedEvent>,
}

impl Process {
    /// Seeds active states from the definition's initial states and
    /// variables from their defaults.
    pub(crate) fn new(id: Id, definition: Arc<Definition>, configuration: Value) -> Self {
        let active_state_ids = definition.initial_state_ids().to_vec();
        let variables = definition
            .variables()
            .map(|v| (v.id().clone(), v.default_value().clone()))
            .collect();

        let mut process = Self {
            id,
            definition,
            configuration,
            active_state_ids,
            variables,
            history: Vec::new(),
            raised_events: Vec::new(),
        };
        let message = format!(
            "Process created from workflow '{}' ({})",
            process.definition.name(),
            process.definition.id()
        );
        process.add_to_history(HistoryKind::ProcessCreated, message);
        process
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn definition(&self) -> &Arc<Definition> {
        &self.definition
    }

    pub fn configuration(&self) -> &Value {
        &self.configuration
    }

    pub fn active_state_ids(&self) -> &[Id] {
        &self.active_state_ids
    }

    pub fn is_active(&self, state_id: &str) -> bool {
        self.active_state_ids.iter().any(|id| id == state_id)
    }

    /// Replace the whole active set. Only the processor advances states.
    pub(crate) fn set_active_state_ids(&mut self, ids: Vec<Id>) {
        let listed = ids.iter().map(Id::as_str).collect::<Vec<_>>().join(", ");
        self.active_state_ids = ids;
        self.add_to_history(
            HistoryKind::ActiveStatesSet,
            format!("Active states set to: {listed}"),
        );
    }

    pub fn variables(&self) -> &BTreeMap<Id, Value> {
        &self.variables
    }

    pub fn variable_value(&self, id: &str) -> Option<&Value> {
        self.variables.get(id)
    }

    /// Always succeeds; no check against the declared variables.
    pub fn set_variable_value(&mut self, id: impl Into<Id>, value: Value) {
        let id = id.into();
        self.add_to_history(
            HistoryKind::VariableSet,
            format!("Variable '{id}' set to value '{value}'"),
        );
        self.variables.insert(id, value);
    }

    /// Look up `path` as a variable id, or as the longest dotted prefix that
    /// names a variable followed by object keys / array indices inside it.
    pub fn resolve_variable_path(&self, path: &str) -> Option<&Value> {
        if let Some(value) = self.variables.get(path) {
            return Some(value);
        }
        let segments: Vec<&str> = path.split('.').collect();
        for split in (1..segments.len()).rev() {
            let head = segments[..split].join(".");
            if let Some(root) = self.variables.get(head.as_str()) {
                return walk(root, &segments[split..]);
            }
        }
        None
    }

    /// Record the event, then run its actions in order against this process.
    ///
    /// The first failing action stops the run; effects of the actions before
    /// it are kept.
    pub fn raise_event(&mut self, event: &Event, payload: Value) -> Result<(), ActionExecutionError> {
        self.raised_events.push(RaisedEvent {
            event_id: event.id().clone(),
            event_name: event.name().to_string(),
            payload: payload.clone(),
            timestamp: Utc::now(),
        });
        self.add_to_history(
            HistoryKind::EventRaised,
            format!("Event '{}' raised", event.id()),
        );

        for action in event.actions() {
            action.execute(self, &payload)?;
        }
        Ok(())
    }

    pub fn raised_events(&self) -> &[RaisedEvent] {
        &self.raised_events
    }

    pub fn add_to_history(&mut self, kind: HistoryKind, message: impl Into<String>) {
        self.history.push(HistoryEntry {
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Owned, serializable copy of the runtime state.
    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            id: self.id.clone(),
            definition_id: self.definition.id().clone(),
            configuration: self.configuration.clone(),
            active_state_ids: self.active_state_ids.clone(),
            variables: self.variables.clone(),
            history: self.history.clone(),
            raised_events: self.raised_events.clone(),
        }
    }
}

fn walk<'a>(mut value: &'a Value, segments: &[&str]) -> Option<&'a Value> {
    for segment in segments {
        value = match value {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: Id,
    pub definition_id: Id,
    pub configuration: Value,
    pub active_state_ids: Vec<Id>,
    pub variables: BTreeMap<Id, Value>,
    pub history: Vec<HistoryEntry>,
    pub raised_events: Vec<RaisedEvent>,
}
