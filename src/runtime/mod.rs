mod evaluator;
mod process;
mod processor;

pub use evaluator::{Comparison, ConditionEvaluator, Operator, OperatorTable};
pub use process::{HistoryEntry, HistoryKind, Process, ProcessSnapshot, RaisedEvent};
pub use processor::Processor;

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use serde_json::Value;

    use super::Process;
    use crate::definition::{Definition, State, StateKind};
    use crate::id::Id;

    /// A process over a one-state definition, for action unit tests.
    pub(crate) fn empty_process() -> Process {
        let definition = Definition::builder("empty")
            .id("empty")
            .state(State::new("start", "Start").with_kind(StateKind::Initial))
            .build()
            .unwrap();
        Process::new(Id::from("test-process"), Arc::new(definition), Value::Null)
    }
}
