use std::sync::Arc;

use coedit::Document;
use coedit::crdt::{SharedKind, Text};

use crate::document::helpers::*;
use crate::helpers::*;

#[test]
fn test_new_document_is_empty() {
    let doc = new_doc(&clock());

    assert!(doc.is_empty());
    assert_eq!(doc.len(), 0);
    assert_eq!(doc.version(), 0);
    assert_eq!(doc.pending_len(), 0);
    assert!(!doc.id().is_empty());
    assert_ne!(doc.id(), new_doc(&clock()).id());
}

#[test]
fn test_register_returns_shared_handle() {
    let doc = new_doc(&clock());

    let handle = add_text(&doc, "body", "abc");
    handle.as_text().unwrap().append("d");

    let fetched = doc.get("body").unwrap();
    assert!(Arc::ptr_eq(&handle, &fetched));
    assert_eq!(text_of(&doc, "body"), "abcd");
    assert_eq!(doc.version(), 1);
}

#[test]
fn test_register_replaces_existing_binding() {
    let doc = new_doc(&clock());
    add_text(&doc, "field", "old");

    let replacement = add_list(&doc, "field");

    assert_eq!(doc.len(), 1);
    assert_eq!(doc.get("field").unwrap().kind(), SharedKind::List);
    assert_eq!(doc.get("field").unwrap().id(), replacement.id());
    assert_eq!(doc.version(), 2);
}

#[test]
fn test_names_are_sorted() {
    let doc = new_doc(&clock());
    add_map(&doc, "zeta");
    add_text(&doc, "alpha", "");
    add_list(&doc, "mid");

    assert_eq!(doc.names(), vec!["alpha", "mid", "zeta"]);
    assert!(doc.get("missing").is_none());
}

#[test]
fn test_find_resolves_by_shared_type_id() {
    let doc = new_doc(&clock());
    let list = add_list(&doc, "items");
    add_text(&doc, "body", "x");

    let found = doc.find(list.id()).unwrap();

    assert!(Arc::ptr_eq(&found, &list));
    assert!(doc.find("no-such-id").is_none());
}

#[test]
fn test_clear_drops_fields_and_pending() {
    let doc = new_doc(&clock());
    add_text(&doc, "body", "x");
    doc.apply_operation(coedit::Operation::clear("unknown"));
    let version = doc.version();

    doc.clear();

    assert!(doc.is_empty());
    assert_eq!(doc.pending_len(), 0);
    assert!(doc.version() > version);
}

#[test]
fn test_client_tracking() {
    let doc = Document::new();

    assert!(doc.add_client("alice"));
    assert!(!doc.add_client("alice"));
    assert!(doc.add_client("bob"));
    assert_eq!(doc.client_count(), 2);
    assert!(doc.has_client("bob"));

    assert!(doc.remove_client("alice"));
    assert!(!doc.remove_client("alice"));
    assert_eq!(doc.client_count(), 1);
    assert!(!doc.has_client("alice"));
}

#[test]
fn test_register_accepts_any_variant() {
    let doc = Document::new();

    let shared = doc.register("body", Text::new());

    assert_eq!(shared.kind(), SharedKind::Text);
    assert_eq!(doc.names(), vec!["body"]);
}
