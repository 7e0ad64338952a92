use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use super::evaluator::{ConditionEvaluator, OperatorTable};
use super::process::Process;
use crate::actions::Action;
use crate::definition::{Definition, Transition};
use crate::error::{ConditionError, FlowError, Result};
use crate::id::{Id, IdGenerator, TimeOrderedIdGenerator};

/// What happens to one slot of the active set during an advance.
enum Step<'a> {
    Fire(&'a Transition),
    Stay(Id),
}

/// Drives processes: creates them, feeds them events and advances their
/// active states.
///
/// The processor holds no per-process state, so one instance can serve any
/// number of processes.
pub struct Processor {
    evaluator: Arc<dyn ConditionEvaluator>,
    id_generator: Arc<dyn IdGenerator>,
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor").finish_non_exhaustive()
    }
}

impl Default for Processor {
    fn default() -> Self {
        Self::new(
            Arc::new(OperatorTable::standard()),
            Arc::new(TimeOrderedIdGenerator::new()),
        )
    }
}

impl Processor {
    pub fn new(evaluator: Arc<dyn ConditionEvaluator>, id_generator: Arc<dyn IdGenerator>) -> Self {
        Self {
            evaluator,
            id_generator,
        }
    }

    /// Start a new process at the definition's initial states. Entry actions
    /// of the initial states are not run.
    pub fn instantiate(&self, definition: &Arc<Definition>, configuration: Value) -> Process {
        let id = self.id_generator.next_id();
        info!(process_id = %id, workflow = %definition.id(), "process created");
        Process::new(id, Arc::clone(definition), configuration)
    }

    /// Raise an event on `process`, looked up by id and then by name.
    ///
    /// Active states are never changed here. If one of the event's actions
    /// fails, the effects of the actions before it stay in the process.
    #[instrument(skip(self, process, payload), fields(process_id = %process.id()))]
    pub fn trigger_event(&self, process: &mut Process, event_id: &str, payload: Value) -> Result<()> {
        let definition = Arc::clone(process.definition());
        let event = definition
            .event(event_id)
            .or_else(|| definition.event_by_name(event_id))
            .ok_or_else(|| FlowError::EventNotFound(event_id.to_string()))?;

        info!(event = %event.id(), "raising event");
        process.raise_event(event, payload)?;
        Ok(())
    }

    /// Evaluate the outgoing transitions of every active state and advance.
    ///
    /// All guards are evaluated against the process as it is before any
    /// action runs; a condition error aborts before anything is changed.
    /// Every eligible transition fires: exit actions of its source, then
    /// entry actions of its target. States with nothing eligible stay
    /// active in place. The new active set is written once at the end.
    #[instrument(skip(self, process), fields(process_id = %process.id()))]
    pub fn process(&self, process: &mut Process) -> Result<()> {
        let definition = Arc::clone(process.definition());
        let active = process.active_state_ids().to_vec();

        let mut plan = Vec::with_capacity(active.len());
        for state_id in active {
            let before = plan.len();
            for transition in definition.transitions_from(state_id.as_str()) {
                if self.is_eligible(process, transition)? {
                    debug!(
                        transition = %transition.id(),
                        from = %transition.from(),
                        to = %transition.to(),
                        "transition eligible"
                    );
                    plan.push(Step::Fire(transition));
                }
            }
            if plan.len() == before {
                plan.push(Step::Stay(state_id));
            }
        }

        let mut next = Vec::with_capacity(plan.len());
        let mut fired = 0usize;
        for step in plan {
            match step {
                Step::Fire(transition) => {
                    if let Some(from) = definition.state(transition.from().as_str()) {
                        run_actions(process, from.exit_actions())?;
                    }
                    if let Some(to) = definition.state(transition.to().as_str()) {
                        run_actions(process, to.entry_actions())?;
                    }
                    next.push(transition.to().clone());
                    fired += 1;
                }
                Step::Stay(state_id) => next.push(state_id),
            }
        }

        info!(fired, active = ?next, "advanced");
        process.set_active_state_ids(next);
        Ok(())
    }

    /// Current value of a process variable.
    pub fn get_variable(&self, process: &Process, variable_id: &str) -> Option<Value> {
        process.variable_value(variable_id).cloned()
    }

    /// Bind a process variable. The id need not be declared in the definition.
    pub fn set_variable(&self, process: &mut Process, variable_id: &str, value: Value) {
        debug!(process_id = %process.id(), variable = variable_id, "setting variable");
        process.set_variable_value(variable_id, value);
    }

    // Conditions are AND-ed in order and stop at the first false one.
    fn is_eligible(&self, process: &Process, transition: &Transition) -> Result<bool> {
        for condition in transition.conditions() {
            let current = process
                .resolve_variable_path(&condition.variable_path)
                .ok_or_else(|| ConditionError::UnresolvedVariable(condition.variable_path.clone()))?;
            if !self
                .evaluator
                .evaluate(&condition.operator, current, &condition.value)?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn run_actions(process: &mut Process, actions: &[Box<dyn Action>]) -> Result<()> {
    for action in actions {
        debug!(action = action.kind(), id = %action.id(), "running action");
        action.execute(process, &Value::Null)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{AddLogEntryAction, SetVariableAction};
    use crate::definition::{Condition, Event, State, StateKind};
    use crate::id::SequentialIdGenerator;
    use crate::runtime::HistoryKind;
    use serde_json::json;

    fn processor() -> Processor {
        Processor::new(
            Arc::new(OperatorTable::standard()),
            Arc::new(SequentialIdGenerator::new("proc")),
        )
    }

    fn approval() -> Arc<Definition> {
        let definition = Definition::builder("approval")
            .id("approval")
            .id_generator(Arc::new(SequentialIdGenerator::new("gen")))
            .state(State::new("draft", "Draft").with_kind(StateKind::Initial))
            .state(
                State::new("pending", "Pending")
                    .on_entry(Box::new(AddLogEntryAction::new("entered pending")))
                    .on_exit(Box::new(AddLogEntryAction::new("left pending"))),
            )
            .state(State::new("approved", "Approved").with_kind(StateKind::Final))
            .transition(
                Transition::new("submit", "Submit", "draft", "pending")
                    .when(Condition::new("status", "equals", "submitted")),
            )
            .transition(
                Transition::new("approve", "Approve", "pending", "approved")
                    .when(Condition::new("status", "equals", "approved"))
                    .when(Condition::new("role", "equals", "manager")),
            )
            .variable(crate::definition::Variable::new("status", "Status", json!("draft")))
            .event(
                Event::new("submit-event", "submit")
                    .with_action(Box::new(SetVariableAction::new("status", "submitted"))),
            )
            .build()
            .unwrap();
        Arc::new(definition)
    }

    #[test]
    fn instantiate_uses_generator_and_initial_states() {
        let processor = processor();
        let definition = approval();
        let first = processor.instantiate(&definition, Value::Null);
        let second = processor.instantiate(&definition, json!({"tenant": "acme"}));
        assert_eq!(first.id(), "proc-1");
        assert_eq!(second.id(), "proc-2");
        assert_eq!(first.active_state_ids(), [Id::from("draft")]);
        assert_eq!(second.configuration(), &json!({"tenant": "acme"}));
    }

    #[test]
    fn trigger_event_by_id_or_name() {
        let processor = processor();
        let mut process = processor.instantiate(&approval(), Value::Null);
        processor
            .trigger_event(&mut process, "submit-event", Value::Null)
            .unwrap();
        processor.trigger_event(&mut process, "submit", Value::Null).unwrap();
        assert_eq!(process.raised_events().len(), 2);
        assert_eq!(process.active_state_ids(), [Id::from("draft")]);
    }

    #[test]
    fn unknown_event_leaves_process_untouched() {
        let processor = processor();
        let mut process = processor.instantiate(&approval(), Value::Null);
        let before = process.snapshot();
        let err = processor
            .trigger_event(&mut process, "archive", Value::Null)
            .unwrap_err();
        assert!(matches!(err, FlowError::EventNotFound(ref id) if id == "archive"));
        assert_eq!(process.snapshot(), before);
    }

    #[test]
    fn guarded_transition_fires_with_actions() {
        let processor = processor();
        let mut process = processor.instantiate(&approval(), Value::Null);
        processor.trigger_event(&mut process, "submit", Value::Null).unwrap();
        processor.process(&mut process).unwrap();

        assert_eq!(process.active_state_ids(), [Id::from("pending")]);
        let audits: Vec<&str> = process
            .history()
            .iter()
            .filter(|e| e.kind == HistoryKind::Audit)
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(audits, ["entered pending"]);
    }

    #[test]
    fn all_conditions_must_hold() {
        let processor = processor();
        let mut process = processor.instantiate(&approval(), Value::Null);
        processor.set_variable(&mut process, "status", json!("submitted"));
        processor.process(&mut process).unwrap();

        processor.set_variable(&mut process, "status", json!("approved"));
        processor.set_variable(&mut process, "role", json!("employee"));
        processor.process(&mut process).unwrap();
        assert_eq!(process.active_state_ids(), [Id::from("pending")]);

        processor.set_variable(&mut process, "role", json!("manager"));
        processor.process(&mut process).unwrap();
        assert_eq!(process.active_state_ids(), [Id::from("approved")]);
    }

    #[test]
    fn short_circuit_skips_unresolvable_later_conditions() {
        // `role` is not bound, but the first condition is already false.
        let processor = processor();
        let mut process = processor.instantiate(&approval(), Value::Null);
        process.set_active_state_ids(vec![Id::from("pending")]);
        processor.process(&mut process).unwrap();
        assert_eq!(process.active_state_ids(), [Id::from("pending")]);
    }

    #[test]
    fn unresolved_variable_aborts_before_commit() {
        let processor = processor();
        let mut process = processor.instantiate(&approval(), Value::Null);
        process.set_active_state_ids(vec![Id::from("pending")]);
        processor.set_variable(&mut process, "status", json!("approved"));
        let history_len = process.history().len();

        let err = processor.process(&mut process).unwrap_err();
        assert!(matches!(
            err,
            FlowError::ConditionEvaluation(ConditionError::UnresolvedVariable(ref path)) if path == "role"
        ));
        assert_eq!(process.history().len(), history_len);
        assert_eq!(process.active_state_ids(), [Id::from("pending")]);
    }

    #[test]
    fn nothing_eligible_rewrites_same_set() {
        let processor = processor();
        let mut process = processor.instantiate(&approval(), Value::Null);
        processor.process(&mut process).unwrap();
        processor.process(&mut process).unwrap();
        assert_eq!(process.active_state_ids(), [Id::from("draft")]);
        let sets = process
            .history()
            .iter()
            .filter(|e| e.kind == HistoryKind::ActiveStatesSet)
            .count();
        assert_eq!(sets, 2);
    }

    #[test]
    fn unknown_active_state_is_kept_and_skipped() {
        let processor = processor();
        let mut process = processor.instantiate(&approval(), Value::Null);
        process.set_active_state_ids(vec![Id::from("ghost"), Id::from("draft")]);
        processor.set_variable(&mut process, "status", json!("submitted"));
        processor.process(&mut process).unwrap();
        assert_eq!(
            process.active_state_ids(),
            [Id::from("ghost"), Id::from("pending")]
        );
    }

    #[test]
    fn large_integer_guard_blocks_neighbouring_value() {
        let definition = Definition::builder("orders")
            .state(State::new("waiting", "Waiting").with_kind(StateKind::Initial))
            .state(State::new("matched", "Matched"))
            .transition(
                Transition::new("match", "Match", "waiting", "matched")
                    .when(Condition::new("order", "equals", 9007199254740992u64)),
            )
            .build()
            .unwrap();
        let processor = processor();
        let mut process = processor.instantiate(&Arc::new(definition), Value::Null);

        processor.set_variable(&mut process, "order", json!(9007199254740993u64));
        processor.process(&mut process).unwrap();
        assert_eq!(process.active_state_ids(), [Id::from("waiting")]);

        processor.set_variable(&mut process, "order", json!(9007199254740992u64));
        processor.process(&mut process).unwrap();
        assert_eq!(process.active_state_ids(), [Id::from("matched")]);
    }

    #[test]
    fn variable_accessors() {
        let processor = processor();
        let mut process = processor.instantiate(&approval(), Value::Null);
        assert_eq!(processor.get_variable(&process, "status"), Some(json!("draft")));
        assert_eq!(processor.get_variable(&process, "role"), None);
        processor.set_variable(&mut process, "role", json!("manager"));
        assert_eq!(processor.get_variable(&process, "role"), Some(json!("manager")));
    }
}
