//! Deterministic workflow engine.
//!
//! A [`Definition`] describes states, guarded transitions, events and
//! variables. The [`Processor`] creates [`Process`]es from it, raises events
//! on them and advances their active states.
//!
//! ```no_run
//! use std::sync::Arc;
//! use flowstate::{Condition, Definition, Event, Processor, SetVariableAction, State, StateKind, Transition};
//! use serde_json::Value;
//!
//! let definition = Definition::builder("approval")
//!     .state(State::new("draft", "Draft").with_kind(StateKind::Initial))
//!     .state(State::new("done", "Done").with_kind(StateKind::Final))
//!     .transition(
//!         Transition::new("finish", "Finish", "draft", "done")
//!             .when(Condition::new("status", "equals", "submitted")),
//!     )
//!     .event(Event::new("submit", "Submit").with_action(Box::new(SetVariableAction::new("status", "submitted"))))
//!     .build()?;
//! let definition = Arc::new(definition);
//!
//! let processor = Processor::default();
//! let mut process = processor.instantiate(&definition, Value::Null);
//! processor.trigger_event(&mut process, "submit", Value::Null)?;
//! processor.process(&mut process)?;
//! assert!(process.is_active("done"));
//! # Ok::<(), flowstate::FlowError>(())
//! ```

pub mod actions;
pub mod config;
pub mod definition;
pub mod error;
pub mod id;
pub mod runtime;

pub use actions::{Action, ActionRegistry, AddLogEntryAction, Caller, HttpDefaults, HttpRequestAction, SetVariableAction};
pub use config::{FlowstateConfig, LogConfig};
pub use definition::{
    Condition, Definition, DefinitionBuilder, DefinitionDocument, Event, State, StateKind, Transition, Variable,
};
pub use error::{ActionExecutionError, ConditionError, ConfigurationError, FlowError, Result};
pub use id::{Id, IdGenerator, SequentialIdGenerator, TimeOrderedIdGenerator};
pub use runtime::{
    ConditionEvaluator, HistoryEntry, HistoryKind, Operator, OperatorTable, Process, ProcessSnapshot, Processor,
    RaisedEvent,
};
