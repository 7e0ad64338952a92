use crate::actions::Action;
use crate::id::Id;

/// A named external stimulus. Raising it runs its actions; it never moves
/// the process between states by itself.
#[derive(Debug)]
pub struct Event {
    pub(crate) id: Id,
    pub(crate) name: String,
    pub(crate) actions: Vec<Box<dyn Action>>,
}

impl Event {
    pub fn new(id: impl Into<Id>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: Box<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &[Box<dyn Action>] {
        &self.actions
    }
}
