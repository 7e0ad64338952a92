//! Serializable mirror of a [`Definition`].
//!
//! Actions appear as [`ActionSpec`]s (`{"type": ..., "id": ..., <options>}`)
//! and are turned into live actions through an [`ActionRegistry`]. Documents
//! load from `.json` or `.toml`; export always goes through JSON since TOML
//! cannot hold `null` defaults.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{Condition, Definition, Event, State, StateKind, Transition, Variable};
use crate::actions::{Action, ActionRegistry};
use crate::error::{FlowError, Result};
use crate::id::IdGenerator;

/// One action entry: the registry type name, an optional id and the
/// options handed to [`Action::configure`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSpec {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub options: Map<String, Value>,
}

impl ActionSpec {
    fn of(action: &dyn Action) -> Self {
        let options = match action.options() {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            kind: action.kind().to_string(),
            id: Some(action.id().to_string()),
            options,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: StateKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_entry: Vec<ActionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_exit: Vec<ActionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub priority: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDocument {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub default: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefinitionDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub states: Vec<StateDocument>,
    #[serde(default)]
    pub transitions: Vec<TransitionDocument>,
    #[serde(default)]
    pub events: Vec<EventDocument>,
    #[serde(default)]
    pub variables: Vec<VariableDocument>,
    /// Overrides the states of kind `initial` when non-empty.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub initial_states: Vec<String>,
}

impl DefinitionDocument {
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_toml_str(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Load a `.json` or `.toml` file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        debug!(path = %path.display(), "loading definition document");
        match extension.as_deref() {
            Some("json") => Self::from_json_str(&contents),
            Some("toml") => Self::from_toml_str(&contents),
            _ => Err(FlowError::InvalidDefinition(format!(
                "{}: expected a .json or .toml file",
                path.display()
            ))),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Instantiate every action through `registry` and build the definition.
    pub fn into_definition(self, registry: &ActionRegistry, id_generator: Arc<dyn IdGenerator>) -> Result<Definition> {
        let mut builder = Definition::builder(self.name).id_generator(id_generator);
        if let Some(id) = self.id {
            builder = builder.id(id);
        }
        if let Some(description) = self.description {
            builder = builder.description(description);
        }

        for doc in self.states {
            let mut state = State::new(doc.id, doc.name).with_kind(doc.kind);
            for spec in &doc.on_entry {
                state = state.on_entry(registry.create(spec)?);
            }
            for spec in &doc.on_exit {
                state = state.on_exit(registry.create(spec)?);
            }
            builder = builder.state(state);
        }

        for doc in self.transitions {
            let mut transition = Transition::new(doc.id, doc.name, doc.from, doc.to).with_priority(doc.priority);
            for condition in doc.conditions {
                transition = transition.when(condition);
            }
            builder = builder.transition(transition);
        }

        for doc in self.events {
            let mut event = Event::new(doc.id, doc.name);
            for spec in &doc.actions {
                event = event.with_action(registry.create(spec)?);
            }
            builder = builder.event(event);
        }

        for doc in self.variables {
            let name = if doc.name.is_empty() { doc.id.clone() } else { doc.name };
            let mut variable = Variable::new(doc.id, name, doc.default);
            if let Some(description) = doc.description {
                variable = variable.with_description(description);
            }
            builder = builder.variable(variable);
        }

        builder.initial_states(self.initial_states).build()
    }
}

impl Definition {
    /// Export as a document. Initial states are listed explicitly so the
    /// export rebuilds to the same definition.
    pub fn to_document(&self) -> DefinitionDocument {
        let specs = |actions: &[Box<dyn Action>]| -> Vec<ActionSpec> {
            actions.iter().map(|a| ActionSpec::of(&**a)).collect()
        };

        DefinitionDocument {
            id: Some(self.id().to_string()),
            name: self.name().to_string(),
            description: self.description().map(str::to_string),
            states: self
                .states()
                .map(|s| StateDocument {
                    id: s.id().to_string(),
                    name: s.name().to_string(),
                    kind: s.kind(),
                    on_entry: specs(s.entry_actions()),
                    on_exit: specs(s.exit_actions()),
                })
                .collect(),
            transitions: self
                .transitions()
                .map(|t| TransitionDocument {
                    id: t.id().to_string(),
                    name: t.name().to_string(),
                    from: t.from().to_string(),
                    to: t.to().to_string(),
                    conditions: t.conditions().to_vec(),
                    priority: t.priority(),
                })
                .collect(),
            events: self
                .events()
                .map(|e| EventDocument {
                    id: e.id().to_string(),
                    name: e.name().to_string(),
                    actions: specs(e.actions()),
                })
                .collect(),
            variables: self
                .variables()
                .map(|v| VariableDocument {
                    id: v.id().to_string(),
                    name: v.name().to_string(),
                    description: v.description().map(str::to_string),
                    default: v.default_value().clone(),
                })
                .collect(),
            initial_states: self.initial_state_ids().iter().map(ToString::to_string).collect(),
        }
    }
}
