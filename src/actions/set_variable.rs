use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::{Action, ActionMeta, parse_options};
use crate::error::{ActionExecutionError, ConfigurationError};
use crate::runtime::Process;

const KIND: &str = "set_variable";

/// Options for [`SetVariableAction`].
///
/// Exactly one of `value` and `from_payload` must be given. `from_payload`
/// names a key in the event payload the action runs with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetVariableConfig {
    pub variable: String,
    #[serde(
        default,
        deserialize_with = "explicit_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_payload: Option<String>,
}

// Keeps an explicit `"value": null` distinct from a missing key.
fn explicit_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Writes a process variable.
#[derive(Debug, Default)]
pub struct SetVariableAction {
    meta: ActionMeta,
    config: Option<SetVariableConfig>,
}

impl SetVariableAction {
    pub fn new(variable: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            meta: ActionMeta::default(),
            config: Some(SetVariableConfig {
                variable: variable.into(),
                value: Some(value.into()),
                from_payload: None,
            }),
        }
    }

    /// Copies `key` from the event payload into `variable`.
    pub fn from_payload(variable: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            meta: ActionMeta::default(),
            config: Some(SetVariableConfig {
                variable: variable.into(),
                value: None,
                from_payload: Some(key.into()),
            }),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.meta.id = id.into();
        self
    }

    pub fn config(&self) -> Option<&SetVariableConfig> {
        self.config.as_ref()
    }
}

impl Action for SetVariableAction {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn configure(&mut self, options: &Value) -> Result<(), ConfigurationError> {
        let config: SetVariableConfig = parse_options(KIND, options)?;
        if config.variable.trim().is_empty() {
            return Err(ConfigurationError::new(KIND, "`variable` must not be empty"));
        }
        match (&config.value, &config.from_payload) {
            (None, None) => {
                return Err(ConfigurationError::new(
                    KIND,
                    "one of `value` or `from_payload` is required",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(ConfigurationError::new(
                    KIND,
                    "`value` and `from_payload` are mutually exclusive",
                ));
            }
            _ => {}
        }
        self.config = Some(config);
        Ok(())
    }

    fn execute(&self, process: &mut Process, args: &Value) -> Result<(), ActionExecutionError> {
        self.record_attempt(process);
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| ActionExecutionError::new(KIND, self.id(), "action was never configured"))?;

        let value = match &config.from_payload {
            Some(key) => args.get(key).cloned().ok_or_else(|| {
                ActionExecutionError::new(KIND, self.id(), format!("payload has no key '{key}'"))
            })?,
            None => config.value.clone().unwrap_or(Value::Null),
        };

        process.set_variable_value(config.variable.as_str(), value);
        Ok(())
    }

    fn options(&self) -> Value {
        match &self.config {
            Some(config) => serde_json::to_value(config).unwrap_or_default(),
            None => Value::Object(Map::new()),
        }
    }
}
