//! The static workflow model: states, guarded transitions, events and
//! variables, assembled into an immutable [`Definition`].

mod document;
mod event;
mod state;
mod transition;
mod variable;
mod workflow;

pub use document::{
    ActionSpec, DefinitionDocument, EventDocument, StateDocument, TransitionDocument, VariableDocument,
};
pub use event::Event;
pub use state::{State, StateKind};
pub use transition::{Condition, Transition};
pub use variable::Variable;
pub use workflow::{Definition, DefinitionBuilder};
