use std::fs;
use std::sync::Arc;

use flowstate::{ActionRegistry, DefinitionDocument, FlowError, Id, SequentialIdGenerator, StateKind};
use serde_json::json;

mod common;
use common::{RecordingAction, approval_definition, journal, workflow_path};

fn generator() -> Arc<SequentialIdGenerator> {
    Arc::new(SequentialIdGenerator::new("gen"))
}

#[test]
fn bundled_workflow_loads() {
    let definition = approval_definition();
    assert_eq!(definition.id(), "document-approval");
    assert_eq!(definition.initial_state_ids(), [Id::from("draft")]);
    assert_eq!(definition.states().count(), 4);
    assert_eq!(definition.state("approved").unwrap().kind(), StateKind::Final);

    let pending = definition.state("pending-approval").unwrap();
    let kinds: Vec<&str> = pending.entry_actions().iter().map(|a| a.kind()).collect();
    assert_eq!(kinds, ["http_request", "add_log_entry"]);
    assert_eq!(
        pending.entry_actions()[0].caller().map(ToString::to_string),
        Some("state 'pending-approval'".to_string())
    );
    assert_eq!(definition.transition("approve").unwrap().conditions().len(), 2);
}

#[test]
fn toml_file_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tickets.toml");
    fs::write(
        &path,
        r#"
        id = "tickets"
        name = "Tickets"
        initial_states = ["triage"]

        [[states]]
        id = "triage"
        name = "Triage"

        [[states]]
        id = "done"
        name = "Done"
        kind = "final"

        [[states.on_entry]]
        type = "add_log_entry"
        message = "ticket closed"

        [[transitions]]
        id = "close"
        from = "triage"
        to = "done"
        priority = 3

        [[transitions.conditions]]
        variable = "severity"
        operator = "lte"
        value = 2

        [[events]]
        id = "grade"
        name = "Grade"

        [[events.actions]]
        type = "set_variable"
        variable = "severity"
        from_payload = "severity"

        [[variables]]
        id = "severity"
        name = "Severity"
        default = 5
        "#,
    )
    .unwrap();

    let document = DefinitionDocument::load(&path).unwrap();
    let definition = document.into_definition(&ActionRegistry::standard(), generator()).unwrap();

    assert_eq!(definition.initial_state_ids(), [Id::from("triage")]);
    assert_eq!(definition.state("done").unwrap().entry_actions().len(), 1);
    let close = definition.transition("close").unwrap();
    assert_eq!(close.priority(), 3);
    assert_eq!(close.conditions()[0].variable_path, "severity");
    assert_eq!(definition.variable("severity").unwrap().default_value(), &json!(5));
}

#[test]
fn exported_json_reloads_identically() {
    let definition = approval_definition();
    let exported = definition.to_document();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    fs::write(&path, exported.to_json_pretty().unwrap()).unwrap();

    let reloaded = DefinitionDocument::load(&path).unwrap();
    assert_eq!(reloaded, exported);
    let rebuilt = reloaded
        .into_definition(&ActionRegistry::standard(), generator())
        .unwrap();
    assert_eq!(rebuilt.to_document(), exported);
}

#[test]
fn custom_action_types_come_from_the_registry() {
    let journal = journal();
    let mut registry = ActionRegistry::standard();
    let shared = journal.clone();
    registry.register("recording", move || RecordingAction::new("unset", &shared).boxed());

    let document = DefinitionDocument::from_json_str(
        r#"{
            "name": "custom",
            "states": [{"id": "s", "name": "S", "kind": "initial",
                        "on_exit": [{"type": "recording", "label": "leaving"}]}]
        }"#,
    )
    .unwrap();
    let definition = document.into_definition(&registry, generator()).unwrap();
    let action = &definition.state("s").unwrap().exit_actions()[0];
    assert_eq!(action.options(), json!({"label": "leaving"}));
}

#[test]
fn invalid_documents_are_reported() {
    let missing = DefinitionDocument::load(&workflow_path("does-not-exist.json")).unwrap_err();
    assert!(matches!(missing, FlowError::Io(_)));

    let malformed = DefinitionDocument::from_json_str(r#"{"name": "x", "states": [{"id": 1}]}"#).unwrap_err();
    assert!(matches!(malformed, FlowError::Json(_)));

    let dangling = DefinitionDocument::from_json_str(
        r#"{"name": "x",
            "states": [{"id": "a", "name": "A", "kind": "initial"}],
            "transitions": [{"from": "a", "to": "b"}]}"#,
    )
    .unwrap()
    .into_definition(&ActionRegistry::standard(), generator())
    .unwrap_err();
    assert!(matches!(dangling, FlowError::InvalidDefinition(_)));

    let bad_options = DefinitionDocument::from_json_str(
        r#"{"name": "x",
            "states": [{"id": "a", "name": "A", "kind": "initial",
                        "on_entry": [{"type": "http_request", "url": "not a url"}]}]}"#,
    )
    .unwrap()
    .into_definition(&ActionRegistry::standard(), generator())
    .unwrap_err();
    assert!(matches!(bad_options, FlowError::Configuration(_)));
}
