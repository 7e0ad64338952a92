#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use flowstate::actions::ActionMeta;
use flowstate::{
    Action, ActionExecutionError, ActionRegistry, ConfigurationError, Definition, DefinitionDocument, Process,
    SequentialIdGenerator,
};
use serde_json::{Value, json};

/// Shared, ordered record of what ran.
pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Appends its label to a journal, optionally writes a variable, and fails
/// on demand.
#[derive(Debug)]
pub struct RecordingAction {
    meta: ActionMeta,
    label: String,
    journal: Journal,
    write: Option<(String, Value)>,
    fail: bool,
}

impl RecordingAction {
    pub fn new(label: &str, journal: &Journal) -> Self {
        Self {
            meta: ActionMeta::default(),
            label: label.to_string(),
            journal: Arc::clone(journal),
            write: None,
            fail: false,
        }
    }

    pub fn writing(mut self, variable: &str, value: Value) -> Self {
        self.write = Some((variable.to_string(), value));
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn boxed(self) -> Box<dyn Action> {
        Box::new(self)
    }
}

impl Action for RecordingAction {
    fn kind(&self) -> &'static str {
        "recording"
    }

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn configure(&mut self, options: &Value) -> Result<(), ConfigurationError> {
        self.label = options
            .get("label")
            .and_then(Value::as_str)
            .ok_or_else(|| ConfigurationError::new("recording", "`label` is required"))?
            .to_string();
        Ok(())
    }

    fn execute(&self, process: &mut Process, _args: &Value) -> Result<(), ActionExecutionError> {
        self.record_attempt(process);
        self.journal.lock().unwrap().push(self.label.clone());
        if self.fail {
            return Err(ActionExecutionError::new("recording", self.id(), format!("{} failed", self.label)));
        }
        if let Some((variable, value)) = &self.write {
            process.set_variable_value(variable.as_str(), value.clone());
        }
        Ok(())
    }

    fn options(&self) -> Value {
        json!({ "label": self.label })
    }
}

pub fn workflow_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("workflows").join(name)
}

/// The bundled approval workflow with deterministic ids.
pub fn approval_definition() -> Arc<Definition> {
    let document = DefinitionDocument::load(&workflow_path("approval.json")).unwrap();
    let definition = document
        .into_definition(&ActionRegistry::standard(), Arc::new(SequentialIdGenerator::new("gen")))
        .unwrap();
    Arc::new(definition)
}
