use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};

use super::{Event, State, StateKind, Transition, Variable};
use crate::actions::{Action, Caller};
use crate::error::{FlowError, Result};
use crate::id::{Id, IdGenerator, TimeOrderedIdGenerator};

/// Immutable workflow graph.
///
/// Built once by [`DefinitionBuilder`] and shared between processes as
/// `Arc<Definition>`. Collections keep declaration order.
#[derive(Debug)]
pub struct Definition {
    id: Id,
    name: String,
    description: Option<String>,
    states: IndexMap<Id, State>,
    transitions: IndexMap<Id, Transition>,
    events: IndexMap<Id, Event>,
    variables: IndexMap<Id, Variable>,
    initial_state_ids: Vec<Id>,
}

impl Definition {
    pub fn builder(name: impl Into<String>) -> DefinitionBuilder {
        DefinitionBuilder::new(name)
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

    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    pub fn transition(&self, id: &str) -> Option<&Transition> {
        self.transitions.get(id)
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    /// Outgoing transitions of `state_id`, in declaration order.
    pub fn transitions_from<'a>(&'a self, state_id: &str) -> impl Iterator<Item = &'a Transition> {
        self.transitions.values().filter(move |t| t.from == state_id)
    }

    pub fn event(&self, id: &str) -> Option<&Event> {
        self.events.get(id)
    }

    /// First event declared with this name.
    pub fn event_by_name(&self, name: &str) -> Option<&Event> {
        self.events.values().find(|e| e.name == name)
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }

    pub fn variable(&self, id: &str) -> Option<&Variable> {
        self.variables.get(id)
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.values()
    }

    pub fn initial_state_ids(&self) -> &[Id] {
        &self.initial_state_ids
    }
}

/// Collects the parts of a [`Definition`] and checks them on [`build`].
///
/// [`build`]: DefinitionBuilder::build
pub struct DefinitionBuilder {
    id: Option<Id>,
    name: String,
    description: Option<String>,
    states: Vec<State>,
    transitions: Vec<Transition>,
    events: Vec<Event>,
    variables: Vec<Variable>,
    initial_state_ids: Vec<Id>,
    id_generator: Option<Arc<dyn IdGenerator>>,
}

impl DefinitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            states: Vec::new(),
            transitions: Vec::new(),
            events: Vec::new(),
            variables: Vec::new(),
            initial_state_ids: Vec::new(),
            id_generator: None,
        }
    }

    pub fn id(mut self, id: impl Into<Id>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn event(mut self, event: Event) -> Self {
        self.events.push(event);
        self
    }

    pub fn variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Start processes here instead of at the states of kind `Initial`.
    pub fn initial_state(mut self, id: impl Into<Id>) -> Self {
        self.initial_state_ids.push(id.into());
        self
    }

    pub fn initial_states<I, T>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Id>,
    {
        self.initial_state_ids.extend(ids.into_iter().map(Into::into));
        self
    }

    /// Generator for blank ids. Defaults to [`TimeOrderedIdGenerator`].
    pub fn id_generator(mut self, generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(generator);
        self
    }

    /// Fill in blank ids, label actions with their owner and check that the
    /// graph is consistent.
    pub fn build(self) -> Result<Definition> {
        let generator = self
            .id_generator
            .unwrap_or_else(|| Arc::new(TimeOrderedIdGenerator::new()) as Arc<dyn IdGenerator>);
        let generator = generator.as_ref();

        let id = fill_blank(self.id.unwrap_or_default(), generator);

        let mut states = IndexMap::with_capacity(self.states.len());
        for mut state in self.states {
            state.id = fill_blank(state.id, generator);
            let owner = Caller::State(state.id.clone());
            for action in state.entry_actions.iter_mut().chain(state.exit_actions.iter_mut()) {
                adopt(action.as_mut(), &owner, generator);
            }
            insert_unique(&mut states, "state", state.id.clone(), state)?;
        }

        let mut transitions = IndexMap::with_capacity(self.transitions.len());
        for mut transition in self.transitions {
            transition.id = fill_blank(transition.id, generator);
            for (end, state_id) in [("from", &transition.from), ("to", &transition.to)] {
                if !states.contains_key(state_id) {
                    return Err(invalid(format!(
                        "transition '{}' {end} unknown state '{state_id}'",
                        transition.id
                    )));
                }
            }
            insert_unique(&mut transitions, "transition", transition.id.clone(), transition)?;
        }

        let mut events = IndexMap::with_capacity(self.events.len());
        for mut event in self.events {
            event.id = fill_blank(event.id, generator);
            let owner = Caller::Event(event.id.clone());
            for action in event.actions.iter_mut() {
                adopt(action.as_mut(), &owner, generator);
            }
            insert_unique(&mut events, "event", event.id.clone(), event)?;
        }

        let mut variables = IndexMap::with_capacity(self.variables.len());
        for mut variable in self.variables {
            variable.id = fill_blank(variable.id, generator);
            insert_unique(&mut variables, "variable", variable.id.clone(), variable)?;
        }

        let initial_state_ids = if self.initial_state_ids.is_empty() {
            states
                .values()
                .filter(|s| s.kind == StateKind::Initial)
                .map(|s| s.id.clone())
                .collect::<Vec<_>>()
        } else {
            for (index, state_id) in self.initial_state_ids.iter().enumerate() {
                if !states.contains_key(state_id) {
                    return Err(invalid(format!("initial state '{state_id}' is not declared")));
                }
                if self.initial_state_ids[..index].contains(state_id) {
                    return Err(invalid(format!("duplicate initial state id '{state_id}'")));
                }
            }
            self.initial_state_ids
        };
        if initial_state_ids.is_empty() {
            return Err(invalid(format!("workflow '{}' has no initial state", self.name)));
        }

        for transition in transitions.values() {
            let leaves_final = states
                .get(&transition.from)
                .is_some_and(|s: &State| s.kind == StateKind::Final);
            if leaves_final {
                warn!(
                    transition = %transition.id,
                    state = %transition.from,
                    "transition leaves a final state"
                );
            }
        }

        debug!(
            workflow = %id,
            states = states.len(),
            transitions = transitions.len(),
            events = events.len(),
            "definition built"
        );

        Ok(Definition {
            id,
            name: self.name,
            description: self.description,
            states,
            transitions,
            events,
            variables,
            initial_state_ids,
        })
    }
}

fn invalid(message: String) -> FlowError {
    FlowError::InvalidDefinition(message)
}

fn fill_blank(id: Id, generator: &dyn IdGenerator) -> Id {
    if id.is_blank() { generator.next_id() } else { id }
}

fn adopt(action: &mut dyn Action, owner: &Caller, generator: &dyn IdGenerator) {
    action.set_caller(owner.clone());
    if action.id().is_blank() {
        action.set_id(generator.next_id());
    }
}

fn insert_unique<T>(map: &mut IndexMap<Id, T>, what: &str, id: Id, item: T) -> Result<()> {
    if map.contains_key(&id) {
        return Err(invalid(format!("duplicate {what} id '{id}'")));
    }
    map.insert(id, item);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{AddLogEntryAction, SetVariableAction};
    use crate::definition::Condition;
    use crate::id::SequentialIdGenerator;
    use serde_json::json;

    fn builder() -> DefinitionBuilder {
        Definition::builder("orders").id_generator(Arc::new(SequentialIdGenerator::new("gen")))
    }

    #[test]
    fn blank_ids_are_generated() {
        let definition = builder()
            .state(State::new("", "Start").with_kind(StateKind::Initial))
            .variable(Variable::new("", "Total", json!(0)))
            .build()
            .unwrap();
        assert_eq!(definition.id(), "gen-1");
        assert_eq!(definition.initial_state_ids(), [Id::from("gen-2")]);
        assert!(definition.variable("gen-3").is_some());
    }

    #[test]
    fn actions_get_caller_and_id() {
        let definition = builder()
            .id("orders")
            .state(
                State::new("open", "Open")
                    .with_kind(StateKind::Initial)
                    .on_entry(Box::new(AddLogEntryAction::new("opened")))
                    .on_exit(Box::new(AddLogEntryAction::new("closed").with_id("bye"))),
            )
            .event(Event::new("pay", "Pay").with_action(Box::new(SetVariableAction::new("paid", true))))
            .build()
            .unwrap();

        let open = definition.state("open").unwrap();
        let entry = &open.entry_actions()[0];
        assert_eq!(entry.id(), "gen-1");
        assert_eq!(entry.caller(), Some(&Caller::State(Id::from("open"))));
        assert_eq!(open.exit_actions()[0].id(), "bye");

        let pay = &definition.event("pay").unwrap().actions()[0];
        assert_eq!(pay.caller(), Some(&Caller::Event(Id::from("pay"))));
    }

    #[test]
    fn initial_states_follow_kind_in_declaration_order() {
        let definition = builder()
            .state(State::new("b", "B").with_kind(StateKind::Initial))
            .state(State::new("mid", "Mid"))
            .state(State::new("a", "A").with_kind(StateKind::Initial))
            .build()
            .unwrap();
        assert_eq!(definition.initial_state_ids(), [Id::from("b"), Id::from("a")]);
    }

    #[test]
    fn explicit_initial_states_win() {
        let definition = builder()
            .state(State::new("a", "A").with_kind(StateKind::Initial))
            .state(State::new("b", "B"))
            .initial_state("b")
            .build()
            .unwrap();
        assert_eq!(definition.initial_state_ids(), [Id::from("b")]);
    }

    #[test]
    fn rejects_missing_initial_state() {
        let err = builder().state(State::new("a", "A")).build().unwrap_err();
        assert!(err.to_string().contains("no initial state"));

        let err = builder()
            .state(State::new("a", "A"))
            .initial_states(["nowhere"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("'nowhere' is not declared"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = builder()
            .state(State::new("a", "A").with_kind(StateKind::Initial))
            .state(State::new("a", "Again"))
            .build()
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidDefinition(ref m) if m == "duplicate state id 'a'"));
    }

    #[test]
    fn rejects_repeated_initial_state() {
        let err = builder()
            .state(State::new("a", "A"))
            .state(State::new("b", "B"))
            .initial_state("a")
            .initial_states(["b", "a"])
            .build()
            .unwrap_err();
        assert!(matches!(err, FlowError::InvalidDefinition(ref m) if m == "duplicate initial state id 'a'"));
    }

    #[test]
    fn rejects_dangling_transition() {
        let err = builder()
            .state(State::new("a", "A").with_kind(StateKind::Initial))
            .transition(Transition::new("t", "T", "a", "b"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("transition 't' to unknown state 'b'"));
    }

    #[test]
    fn transitions_from_keeps_declaration_order() {
        let definition = builder()
            .state(State::new("a", "A").with_kind(StateKind::Initial))
            .state(State::new("b", "B"))
            .state(State::new("c", "C").with_kind(StateKind::Final))
            .transition(Transition::new("t2", "To C", "a", "c").when(Condition::new("x", "eq", 1)))
            .transition(Transition::new("t1", "To B", "a", "b"))
            .transition(Transition::new("t3", "Back", "b", "a"))
            .build()
            .unwrap();
        let ids: Vec<&str> = definition.transitions_from("a").map(|t| t.id().as_str()).collect();
        assert_eq!(ids, ["t2", "t1"]);
        assert_eq!(definition.transitions().count(), 3);
    }

    #[test]
    fn events_resolve_by_name() {
        let definition = builder()
            .state(State::new("a", "A").with_kind(StateKind::Initial))
            .event(Event::new("e-1", "ship"))
            .build()
            .unwrap();
        assert_eq!(definition.event_by_name("ship").unwrap().id(), "e-1");
        assert!(definition.event("ship").is_none());
    }
}
