use serde_json::Value;

use crate::id::Id;

/// Declared process variable and the value every new process starts with.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub(crate) id: Id,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) default_value: Value,
}

impl Variable {
    pub fn new(id: impl Into<Id>, name: impl Into<String>, default_value: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            default_value: default_value.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default_value(&self) -> &Value {
        &self.default_value
    }
}
