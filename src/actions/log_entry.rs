use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Action, ActionMeta, parse_options};
use crate::error::{ActionExecutionError, ConfigurationError};
use crate::runtime::{HistoryKind, Process};

const KIND: &str = "add_log_entry";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LogEntryConfig {
    message: String,
}

/// Appends a free-form `audit` entry to the process history.
#[derive(Debug, Default)]
pub struct AddLogEntryAction {
    meta: ActionMeta,
    message: Option<String>,
}

impl AddLogEntryAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            meta: ActionMeta::default(),
            message: Some(message.into()),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.meta.id = id.into();
        self
    }
}

impl Action for AddLogEntryAction {
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
        let config: LogEntryConfig = parse_options(KIND, options)?;
        self.message = Some(config.message);
        Ok(())
    }

    fn execute(&self, process: &mut Process, _args: &Value) -> Result<(), ActionExecutionError> {
        self.record_attempt(process);
        let message = self
            .message
            .as_ref()
            .ok_or_else(|| ActionExecutionError::new(KIND, self.id(), "action was never configured"))?;
        process.add_to_history(HistoryKind::Audit, message.clone());
        Ok(())
    }

    fn options(&self) -> Value {
        match &self.message {
            Some(message) => serde_json::json!({ "message": message }),
            None => Value::Object(Default::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::tests::empty_process;
    use serde_json::json;

    #[test]
    fn appends_audit_entry_after_attempt_record() {
        let mut process = empty_process();
        let before = process.history().len();
        AddLogEntryAction::new("Entered review")
            .with_id("log-1")
            .execute(&mut process, &Value::Null)
            .unwrap();

        let added = &process.history()[before..];
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].kind, HistoryKind::ActionExecuted);
        assert!(added[0].message.contains("add_log_entry"));
        assert!(added[0].message.contains("log-1"));
        assert_eq!(added[1].kind, HistoryKind::Audit);
        assert_eq!(added[1].message, "Entered review");
    }

    #[test]
    fn configure_requires_message() {
        let mut action = AddLogEntryAction::default();
        assert!(action.configure(&json!({"text": "nope"})).is_err());
        action.configure(&json!({"message": "ok"})).unwrap();
        assert_eq!(action.options(), json!({"message": "ok"}));
    }
}
