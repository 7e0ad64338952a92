use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use super::{Action, AddLogEntryAction, HttpDefaults, HttpRequestAction, SetVariableAction};
use crate::definition::ActionSpec;
use crate::error::{FlowError, Result};

type Constructor = Box<dyn Fn() -> Box<dyn Action> + Send + Sync>;

/// Maps action type names found in definition documents to constructors.
pub struct ActionRegistry {
    constructors: HashMap<String, Constructor>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ActionRegistry {
    /// A registry with no action types at all.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// `set_variable`, `add_log_entry` and `http_request` with default HTTP settings.
    pub fn standard() -> Self {
        Self::with_http_defaults(HttpDefaults::default())
    }

    pub fn with_http_defaults(defaults: HttpDefaults) -> Self {
        let mut registry = Self::empty();
        registry.register("set_variable", || Box::new(SetVariableAction::default()));
        registry.register("add_log_entry", || Box::new(AddLogEntryAction::default()));
        registry.register("http_request", move || Box::new(HttpRequestAction::new(defaults.clone())));
        registry
    }

    /// Register (or replace) the constructor for `kind`.
    pub fn register<F>(&mut self, kind: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Action> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Box::new(constructor));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build and configure the action described by `spec`.
    pub fn create(&self, spec: &ActionSpec) -> Result<Box<dyn Action>> {
        let constructor = self
            .constructors
            .get(&spec.kind)
            .ok_or_else(|| FlowError::UnknownAction(spec.kind.clone()))?;
        let mut action = constructor();
        action.configure(&Value::Object(spec.options.clone()))?;
        if let Some(id) = &spec.id {
            action.set_id(id.as_str().into());
        }
        Ok(action)
    }
}
