//! Ordered list shared type.
//!
//! [`List`] keeps its values in a dense, zero-based sequence and gives every
//! element a generated id. The id-to-index map and the index-to-id sequence
//! are kept as exact inverses across every mutation.
//!
//! Merging is an unconditional union by element id: on collision the peer's
//! value wins, and the combined elements are re-indexed in the order they were
//! collected (local elements first, then elements only the peer has).

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::Result;
use crate::clock::{Clock, system_clock};
use crate::constants;
use crate::crdt::{CRDTError, Replica, Stamp};
use crate::operation::{Operation, OperationType};

#[derive(Debug, Clone, Default)]
struct ListInner {
    stamp: Stamp,
    elements: Vec<Value>,
    index_to_id: Vec<Uuid>,
    id_to_index: HashMap<Uuid, usize>,
}

impl ListInner {
    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.elements.len();
        if index >= len {
            return Err(CRDTError::IndexOutOfRange { index, len }.into());
        }
        Ok(())
    }

    /// Rebuild all three structures from `(id, value)` pairs in order.
    fn rebuild(&mut self, entries: impl IntoIterator<Item = (Uuid, Value)>) {
        self.elements.clear();
        self.index_to_id.clear();
        self.id_to_index.clear();
        for (index, (id, value)) in entries.into_iter().enumerate() {
            self.elements.push(value);
            self.index_to_id.push(id);
            self.id_to_index.insert(id, index);
        }
    }

    fn entries(&self) -> impl Iterator<Item = (Uuid, Value)> + '_ {
        self.index_to_id.iter().copied().zip(self.elements.iter().cloned())
    }
}

/// An index-addressable collaborative list.
///
/// # Examples
///
/// ```
/// use coedit::crdt::List;
///
/// let list = List::new();
/// assert_eq!(list.add("item1"), 1);
/// assert_eq!(list.add("item2"), 2);
/// list.insert(1, "inserted").unwrap();
///
/// assert_eq!(list.get(1).unwrap(), "inserted");
/// assert_eq!(list.remove(1).unwrap(), "inserted");
/// assert!(list.get(5).is_err());
/// ```
#[derive(Debug)]
pub struct List {
    id: String,
    clock: Arc<dyn Clock>,
    inner: RwLock<ListInner>,
}

impl Default for List {
    fn default() -> Self {
        Self::new()
    }
}

impl List {
    /// Create an empty list using the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create an empty list stamped by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let stamp = Stamp::new(clock.now_millis());
        Self {
            id: Uuid::new_v4().to_string(),
            clock,
            inner: RwLock::new(ListInner {
                stamp,
                ..ListInner::default()
            }),
        }
    }

    /// Append a value, returning the new size.
    pub fn add(&self, value: impl Into<Value>) -> usize {
        let mut inner = self.inner.write();
        let id = Uuid::new_v4();
        let index = inner.elements.len();
        inner.elements.push(value.into());
        inner.index_to_id.push(id);
        inner.id_to_index.insert(id, index);
        inner.stamp.bump(self.clock.now_millis());
        inner.elements.len()
    }

    /// Insert a value at `index`, shifting later elements up by one.
    ///
    /// Fails with [`CRDTError::IndexOutOfRange`] unless `index <= size`.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<()> {
        let mut inner = self.inner.write();
        let len = inner.elements.len();
        if index > len {
            return Err(CRDTError::IndexOutOfRange { index, len }.into());
        }
        for position in inner.id_to_index.values_mut() {
            if *position >= index {
                *position += 1;
            }
        }
        let id = Uuid::new_v4();
        inner.elements.insert(index, value.into());
        inner.index_to_id.insert(index, id);
        inner.id_to_index.insert(id, index);
        inner.stamp.bump(self.clock.now_millis());
        Ok(())
    }

    /// The value at `index`.
    pub fn get(&self, index: usize) -> Result<Value> {
        let inner = self.inner.read();
        inner.check_index(index)?;
        Ok(inner.elements[index].clone())
    }

    /// Replace the value at `index`, returning the previous one.
    ///
    /// The element keeps its id.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<Value> {
        let mut inner = self.inner.write();
        inner.check_index(index)?;
        let old = std::mem::replace(&mut inner.elements[index], value.into());
        inner.stamp.bump(self.clock.now_millis());
        Ok(old)
    }

    /// Remove and return the value at `index`, shifting later elements down.
    pub fn remove(&self, index: usize) -> Result<Value> {
        let mut inner = self.inner.write();
        inner.check_index(index)?;
        let removed = inner.elements.remove(index);
        let id = inner.index_to_id.remove(index);
        inner.id_to_index.remove(&id);
        for position in inner.id_to_index.values_mut() {
            if *position > index {
                *position -= 1;
            }
        }
        inner.stamp.bump(self.clock.now_millis());
        Ok(removed)
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.inner.read().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Remove every element.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.elements.clear();
        inner.index_to_id.clear();
        inner.id_to_index.clear();
        inner.stamp.bump(self.clock.now_millis());
    }

    /// Copy of all values in index order.
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.read().elements.clone()
    }

    /// The id of the element currently at `index`.
    pub fn element_id(&self, index: usize) -> Option<Uuid> {
        self.inner.read().index_to_id.get(index).copied()
    }

    /// The current index of the element with this id.
    pub fn index_of(&self, id: &Uuid) -> Option<usize> {
        self.inner.read().id_to_index.get(id).copied()
    }

    fn ignore(&self, op: &Operation, reason: &'static str) {
        debug!(
            list_id = %self.id,
            operation_id = %op.operation_id(),
            operation_type = %op.operation_type(),
            reason,
            "Ignoring list operation"
        );
    }

    fn indexed_payload(op: &Operation) -> Option<(usize, Value)> {
        let index = op.index_field(constants::INDEX)?;
        let element = op.value_field(constants::ELEMENT)?;
        Some((index, element.clone()))
    }
}

impl Replica for List {
    type State = Vec<Value>;

    fn id(&self) -> &str {
        &self.id
    }

    fn stamp(&self) -> Stamp {
        self.inner.read().stamp
    }

    fn state(&self) -> Vec<Value> {
        self.to_vec()
    }

    fn merge(&self, other: &List) {
        if std::ptr::eq(self, other) {
            return;
        }
        let (peer_entries, peer_stamp) = {
            let peer = other.inner.read();
            (peer.entries().collect::<Vec<_>>(), peer.stamp)
        };

        let mut inner = self.inner.write();
        let mut combined: IndexMap<Uuid, Value> = inner.entries().collect();
        let local_len = combined.len();
        // Peer wins on id collision; the element keeps its local position.
        combined.extend(peer_entries);
        trace!(
            list_id = %self.id,
            local = local_len,
            merged = combined.len(),
            "Merged list replicas"
        );
        inner.rebuild(combined);
        inner.stamp.absorb(peer_stamp, self.clock.now_millis());
    }

    fn apply_operation(&self, op: &Operation) {
        match op.operation_type() {
            OperationType::Insert => match Self::indexed_payload(op) {
                Some((index, element)) => {
                    if self.insert(index, element).is_err() {
                        self.ignore(op, "index out of range");
                    }
                }
                None => self.ignore(op, "malformed insert payload"),
            },
            OperationType::Update => match Self::indexed_payload(op) {
                Some((index, element)) => {
                    if self.set(index, element).is_err() {
                        self.ignore(op, "index out of range");
                    }
                }
                None => self.ignore(op, "malformed update payload"),
            },
            OperationType::Delete => match op.index_payload() {
                Some(index) => {
                    if self.remove(index).is_err() {
                        self.ignore(op, "index out of range");
                    }
                }
                None => self.ignore(op, "malformed delete payload"),
            },
            OperationType::Clear => self.clear(),
            OperationType::Merge => self.ignore(op, "unsupported operation type"),
        }
    }

    fn fork(&self) -> List {
        List {
            id: self.id.clone(),
            clock: Arc::clone(&self.clock),
            inner: RwLock::new(self.inner.read().clone()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ElementRepr {
    id: Uuid,
    value: Value,
}

/// Complete replica state, as shipped between peers.
#[derive(Serialize, Deserialize)]
struct ListRepr {
    id: String,
    #[serde(flatten)]
    stamp: Stamp,
    elements: Vec<ElementRepr>,
}

impl Serialize for List {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let inner = self.inner.read();
        ListRepr {
            id: self.id.clone(),
            stamp: inner.stamp,
            elements: inner
                .entries()
                .map(|(id, value)| ElementRepr { id, value })
                .collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for List {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = ListRepr::deserialize(deserializer)?;
        let mut inner = ListInner {
            stamp: repr.stamp,
            ..ListInner::default()
        };
        // Duplicate ids on the wire collapse to one element, last value wins.
        let entries: IndexMap<Uuid, Value> = repr
            .elements
            .into_iter()
            .map(|e| (e.id, e.value))
            .collect();
        inner.rebuild(entries);
        Ok(List {
            id: repr.id,
            clock: system_clock(),
            inner: RwLock::new(inner),
        })
    }
}
