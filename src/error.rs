use serde_json::Value;
use thiserror::Error;

use crate::id::Id;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Action execution error: {0}")]
    ActionExecution(#[from] ActionExecutionError),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Condition evaluation error: {0}")]
    ConditionEvaluation(#[from] ConditionError),

    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("Unknown action type: {0}")]
    UnknownAction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, FlowError>;

/// An action was handed options it cannot work with.
#[derive(Debug, Error)]
#[error("{action}: {message}")]
pub struct ConfigurationError {
    pub action: &'static str,
    pub message: String,
}

impl ConfigurationError {
    pub fn new(action: &'static str, message: impl Into<String>) -> Self {
        Self {
            action,
            message: message.into(),
        }
    }
}

/// An action failed while running against a process.
#[derive(Debug, Error)]
#[error("{action} ({action_id}) failed: {reason}")]
pub struct ActionExecutionError {
    pub action: &'static str,
    pub action_id: Id,
    pub reason: String,
}

impl ActionExecutionError {
    pub fn new(action: &'static str, action_id: &Id, reason: impl Into<String>) -> Self {
        Self {
            action,
            action_id: action_id.clone(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("variable path '{0}' does not resolve to a value")]
    UnresolvedVariable(String),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("cannot apply '{operator}' to {current} and {expected}")]
    Incomparable {
        operator: String,
        current: Value,
        expected: Value,
    },
}
