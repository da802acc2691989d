use std::collections::BTreeMap;

use coedit::crdt::{List, SharedState, Text};
use coedit::{Document, DocumentState, Operation};
use serde_json::json;

use crate::document::helpers::*;
use crate::helpers::*;

#[test]
fn test_state_serializes_as_flat_object() {
    let doc = new_doc(&clock());
    let items = add_list(&doc, "items");
    items.as_list().unwrap().add("x");
    add_text(&doc, "title", "Draft");

    let value = serde_json::to_value(doc.state()).unwrap();

    assert_eq!(value["items"], json!(["x"]));
    assert_eq!(value["title"], json!("Draft"));
    assert_eq!(value["version"], json!(doc.version()));
    assert_eq!(value["timestamp"], json!(doc.timestamp()));
}

#[test]
fn test_state_round_trips_through_json() {
    let doc = new_doc(&clock());
    add_text(&doc, "title", "Draft");
    let settings = add_map(&doc, "settings");
    settings.as_map().unwrap().set("theme", "dark");

    let state = doc.state();
    let decoded: DocumentState =
        serde_json::from_str(&serde_json::to_string(&state).unwrap()).unwrap();

    assert_eq!(decoded, state);
    assert_eq!(decoded.get("title"), Some(&SharedState::Text("Draft".into())));
}

#[test]
fn test_document_json_round_trip_preserves_ids_and_pending() {
    let doc = new_doc(&clock());
    let body = add_text(&doc, "body", "abc");
    let queued = Operation::clear("unregistered");
    doc.apply_operation(queued.clone());
    doc.add_client("alice");

    let restored = Document::from_json(&doc.to_json().unwrap()).unwrap();

    assert_eq!(restored.id(), doc.id());
    assert_eq!(restored.version(), doc.version());
    assert_eq!(restored.get("body").unwrap().id(), body.id());
    assert_eq!(text_of(&restored, "body"), "abc");
    assert_eq!(restored.pending_operations(), vec![queued]);
    // Attached clients are session state and are not persisted.
    assert_eq!(restored.client_count(), 0);
}

#[test]
fn test_restored_document_merges_back_cleanly() {
    let doc = new_doc(&clock());
    add_text(&doc, "body", "Hello");

    let restored = Document::from_json(&doc.to_json().unwrap()).unwrap();
    restored
        .get("body")
        .unwrap()
        .as_text()
        .unwrap()
        .append(" World");

    doc.merge(&restored);

    assert_eq!(text_of(&doc, "body"), "Hello World");
}

#[test]
fn test_from_json_rejects_garbage() {
    let err = Document::from_json(r#"{"id": 1}"#).unwrap_err();
    assert!(err.is_serialization_error());
    assert_eq!(err.module(), "serialize");
}

#[test]
fn test_state_stamp_keys_win_over_same_named_fields() {
    let doc = new_doc(&clock());
    doc.register("version", List::new());
    doc.register("timestamp", Text::new());
    let items = add_list(&doc, "items");
    items.as_list().unwrap().add(1);

    let state = doc.state();
    assert!(state.get("version").is_none());
    assert!(state.get("timestamp").is_none());

    let json = serde_json::to_string(&state).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value.as_object().unwrap().len(), 3);
    assert_eq!(value["version"], json!(doc.version()));
    assert_eq!(value["timestamp"], json!(doc.timestamp()));
    assert_eq!(value["items"], json!([1]));

    let decoded: DocumentState = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, state);
}

#[test]
fn test_state_serializes_stamp_keys_once() {
    let mut fields = BTreeMap::new();
    fields.insert("version".to_string(), SharedState::List(vec![]));
    let state = DocumentState {
        fields,
        version: 3,
        timestamp: 4,
    };

    let json = serde_json::to_string(&state).unwrap();

    assert_eq!(json, r#"{"version":3,"timestamp":4}"#);
    assert!(serde_json::from_str::<DocumentState>(&json).is_ok());
}

#[test]
fn test_full_document_json_keeps_stamp_named_fields() {
    let doc = new_doc(&clock());
    doc.register("version", List::new());

    let restored = Document::from_json(&doc.to_json().unwrap()).unwrap();

    assert!(restored.get("version").is_some());
    assert_eq!(restored.version(), doc.version());
}
