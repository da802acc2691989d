//! List shared-type integration tests
//!
//! Covers index-based editing, element identity, merging, operation
//! application and full-state serialization.

use std::sync::Arc;
use std::thread;

use coedit::crdt::{CRDTError, List, Replica};
use coedit::{Error, Operation, OperationType};
use serde_json::json;

use crate::crdt::helpers::*;
use crate::helpers::*;

// ===== BASIC LIST OPERATIONS =====

#[test]
fn test_list_add_insert_get_remove() {
    let list = List::with_clock(clock());
    assert!(list.is_empty());

    assert_eq!(list.add("item1"), 1);
    assert_eq!(list.add("item2"), 2);
    list.insert(1, "inserted").unwrap();

    assert_eq!(list.size(), 3);
    assert_eq!(list.get(1).unwrap(), json!("inserted"));
    assert_eq!(list.remove(1).unwrap(), json!("inserted"));
    assert_eq!(list.to_vec(), vec![json!("item1"), json!("item2")]);
}

#[test]
fn test_list_mixed_value_kinds() {
    let list = List::with_clock(clock());
    list.add("hello");
    list.add(42);
    list.add(true);
    list.add(json!({"nested": [1, 2]}));

    assert_eq!(list.get(0).unwrap().as_str(), Some("hello"));
    assert_eq!(list.get(1).unwrap().as_i64(), Some(42));
    assert_eq!(list.get(2).unwrap().as_bool(), Some(true));
    assert_eq!(list.get(3).unwrap()["nested"][1], json!(2));
}

#[test]
fn test_list_out_of_range_access_fails() {
    let list = list_with(&clock(), &["a"]);

    let err = list.get(5).unwrap_err();
    assert!(matches!(
        err,
        Error::CRDT(CRDTError::IndexOutOfRange { index: 5, len: 1 })
    ));
    assert!(list.set(1, "x").is_err());
    assert!(list.remove(1).is_err());
    assert!(list.insert(2, "x").is_err());

    // Inserting at exactly size appends.
    list.insert(1, "b").unwrap();
    assert_eq!(list.to_vec(), vec![json!("a"), json!("b")]);
}

#[test]
fn test_list_set_returns_previous_and_keeps_id() {
    let list = list_with(&clock(), &["original"]);
    let id = list.element_id(0).unwrap();

    let previous = list.set(0, "modified").unwrap();

    assert_eq!(previous, json!("original"));
    assert_eq!(list.get(0).unwrap(), json!("modified"));
    assert_eq!(list.element_id(0), Some(id));
}

#[test]
fn test_list_ids_follow_elements_across_shifts() {
    let list = list_with(&clock(), &["a", "b", "c"]);
    let b = list.element_id(1).unwrap();
    let c = list.element_id(2).unwrap();

    list.insert(0, "z").unwrap();
    assert_eq!(list.index_of(&b), Some(2));
    assert_eq!(list.index_of(&c), Some(3));

    list.remove(2).unwrap();
    assert_eq!(list.index_of(&b), None);
    assert_eq!(list.index_of(&c), Some(2));
    assert_eq!(list.element_id(2), Some(c));
}

#[test]
fn test_list_clear_empties_and_bumps_version() {
    let list = list_with(&clock(), &["a", "b"]);
    let version = list.version();

    list.clear();

    assert!(list.is_empty());
    assert_eq!(list.element_id(0), None);
    assert_eq!(list.version(), version + 1);
}

#[test]
fn test_list_failed_mutation_keeps_version() {
    let list = list_with(&clock(), &["a"]);
    let version = list.version();

    let _ = list.remove(3);
    let _ = list.set(3, "x");

    assert_eq!(list.version(), version);
}

// ===== MERGING =====

#[test]
fn test_list_merge_appends_peer_only_elements() {
    let list = list_with(&clock(), &["1", "2"]);
    let peer = list.fork();
    peer.add("3");
    list.add("4");

    list.merge(&peer);

    assert_eq!(
        list.to_vec(),
        vec![json!("1"), json!("2"), json!("4"), json!("3")]
    );
}

#[test]
fn test_list_merge_peer_value_wins_in_local_position() {
    let list = list_with(&clock(), &["a", "b"]);
    let peer = list.fork();
    peer.set(1, "from-peer").unwrap();
    // A later local write still loses to the peer's value.
    list.set(1, "from-local").unwrap();

    list.merge(&peer);

    assert_eq!(list.to_vec(), vec![json!("a"), json!("from-peer")]);
}

#[test]
fn test_list_merge_is_idempotent() {
    let clock = clock();
    let left = list_with(&clock, &["a"]);
    let right = list_with(&clock, &["b", "c"]);

    left.merge(&right);
    let once = left.to_vec();
    left.merge(&right);

    assert_eq!(left.to_vec(), once);
    assert_eq!(left.size(), 3);
}

#[test]
fn test_list_merge_keeps_id_maps_consistent() {
    let clock = clock();
    let left = list_with(&clock, &["a", "b"]);
    let right = list_with(&clock, &["c"]);

    left.merge(&right);

    for index in 0..left.size() {
        let id = left.element_id(index).unwrap();
        assert_eq!(left.index_of(&id), Some(index));
    }
    let c = right.element_id(0).unwrap();
    assert_eq!(left.index_of(&c), Some(2));
}

#[test]
fn test_list_merge_resurrects_locally_removed_elements() {
    let list = list_with(&clock(), &["a", "b"]);
    let peer = list.fork();
    list.clear();

    list.merge(&peer);

    assert_eq!(list.to_vec(), vec![json!("a"), json!("b")]);
}

// ===== OPERATIONS =====

#[test]
fn test_list_apply_operations() {
    let list = List::with_clock(clock());

    list.apply_operation(&Operation::insert(
        list.id(),
        json!({"index": 0, "element": "x"}),
    ));
    list.apply_operation(&Operation::insert(
        list.id(),
        json!({"index": 1, "element": {"k": 1}}),
    ));
    list.apply_operation(&Operation::update(
        list.id(),
        json!({"index": 0, "element": "y"}),
    ));
    assert_eq!(list.to_vec(), vec![json!("y"), json!({"k": 1})]);

    list.apply_operation(&Operation::delete(list.id(), json!(0)));
    assert_eq!(list.to_vec(), vec![json!({"k": 1})]);

    list.apply_operation(&Operation::clear(list.id()));
    assert!(list.is_empty());
}

#[test]
fn test_list_ignores_malformed_and_out_of_range_operations() {
    let list = list_with(&clock(), &["a"]);
    let version = list.version();

    let ignored = [
        Operation::insert(list.id(), json!({"index": 0})),
        Operation::insert(list.id(), json!({"index": 0, "element": null})),
        Operation::insert(list.id(), json!({"index": 5, "element": "x"})),
        Operation::update(list.id(), json!({"index": 1, "element": "x"})),
        Operation::update(list.id(), json!({"element": "x"})),
        Operation::delete(list.id(), json!({"index": 0})),
        Operation::delete(list.id(), json!(7)),
        Operation::new(OperationType::Merge, list.id(), json!({})),
    ];
    for op in &ignored {
        list.apply_operation(op);
    }

    assert_eq!(list.to_vec(), vec![json!("a")]);
    assert_eq!(list.version(), version);
}

// ===== SERIALIZATION =====

#[test]
fn test_list_full_state_round_trip_preserves_element_ids() {
    let list = list_with(&clock(), &["a", "b"]);

    let json = serde_json::to_string(&list).unwrap();
    let restored: List = serde_json::from_str(&json).unwrap();

    assert_eq!(restored.id(), list.id());
    assert_eq!(restored.stamp(), list.stamp());
    assert_eq!(restored.to_vec(), list.to_vec());
    assert_eq!(restored.element_id(1), list.element_id(1));

    list.merge(&restored);
    assert_eq!(list.size(), 2);
}

// ===== CONCURRENCY =====

#[test]
fn test_list_concurrent_adds_are_all_kept() {
    let list = Arc::new(List::with_clock(clock()));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for i in 0..25 {
                    list.add(t * 100 + i);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(list.size(), 100);
    for index in 0..list.size() {
        let id = list.element_id(index).unwrap();
        assert_eq!(list.index_of(&id), Some(index));
    }
}
