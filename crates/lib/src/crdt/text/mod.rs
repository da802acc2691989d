//! Ordered text shared type.
//!
//! [`Text`] stores one node per character in a sentinel-bounded doubly linked
//! sequence. Every inserted character gets a fresh id and the current
//! timestamp. Merging unions both sides' nodes by id and orders the result by
//! timestamp, which means concurrent edits converge to a common order but not
//! necessarily the order either author saw.

mod sequence;

use std::sync::Arc;

use indexmap::IndexMap;
use indexmap::map::Entry;
use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, trace};
use uuid::Uuid;

pub use sequence::CharNode;
use sequence::CharSequence;

use crate::Result;
use crate::clock::{Clock, system_clock};
use crate::constants;
use crate::crdt::{CRDTError, Replica, Stamp};
use crate::operation::{Operation, OperationType};

#[derive(Debug, Clone)]
struct TextInner {
    stamp: Stamp,
    seq: CharSequence,
}

/// A character-addressable collaborative text buffer.
///
/// # Examples
///
/// ```
/// use coedit::crdt::Text;
///
/// let text = Text::new();
/// text.append("Hello World!");
/// text.insert(6, "beautiful ").unwrap();
/// assert_eq!(text.to_string(), "Hello beautiful World!");
///
/// let removed = text.delete(6, 16).unwrap();
/// assert_eq!(removed, "beautiful ");
/// assert_eq!(text.length(), 12);
/// ```
#[derive(Debug)]
pub struct Text {
    id: String,
    clock: Arc<dyn Clock>,
    inner: RwLock<TextInner>,
}

impl Default for Text {
    fn default() -> Self {
        Self::new()
    }
}

impl Text {
    /// Create an empty text using the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create an empty text stamped by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let stamp = Stamp::new(clock.now_millis());
        Self {
            id: Uuid::new_v4().to_string(),
            clock,
            inner: RwLock::new(TextInner {
                stamp,
                seq: CharSequence::new(),
            }),
        }
    }

    /// Append `text` at the end, returning the new length.
    ///
    /// Appending an empty string changes nothing.
    pub fn append(&self, text: &str) -> usize {
        let mut inner = self.inner.write();
        if text.is_empty() {
            return inner.seq.len();
        }
        let tail = inner.seq.slot_at(inner.seq.len());
        for c in text.chars() {
            inner.seq.insert_before(tail, CharNode::new(c, self.clock.now_millis()));
        }
        inner.stamp.bump(self.clock.now_millis());
        inner.seq.len()
    }

    /// Insert `text` so that its first character lands at `index`.
    ///
    /// Fails with [`CRDTError::IndexOutOfRange`] unless `index <= length`.
    pub fn insert(&self, index: usize, text: &str) -> Result<()> {
        let mut inner = self.inner.write();
        let len = inner.seq.len();
        if index > len {
            return Err(CRDTError::IndexOutOfRange { index, len }.into());
        }
        if text.is_empty() {
            return Ok(());
        }
        let anchor = inner.seq.slot_at(index);
        for c in text.chars() {
            inner.seq.insert_before(anchor, CharNode::new(c, self.clock.now_millis()));
        }
        inner.stamp.bump(self.clock.now_millis());
        Ok(())
    }

    /// Remove the characters in `[start, end)` and return them.
    ///
    /// Fails with [`CRDTError::InvalidRange`] unless
    /// `start < end <= length`; the text is left untouched on failure.
    pub fn delete(&self, start: usize, end: usize) -> Result<String> {
        let mut inner = self.inner.write();
        let len = inner.seq.len();
        if start >= end || end > len {
            return Err(CRDTError::InvalidRange { start, end, len }.into());
        }
        let mut removed = String::with_capacity(end - start);
        let mut slot = inner.seq.slot_at(start);
        for _ in start..end {
            match inner.seq.remove(slot) {
                Some((node, next)) => {
                    removed.push(node.value);
                    slot = next;
                }
                None => break,
            }
        }
        inner.stamp.bump(self.clock.now_millis());
        Ok(removed)
    }

    /// Number of characters.
    pub fn length(&self) -> usize {
        self.inner.read().seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    /// The character at `index`, if any.
    pub fn char_at(&self, index: usize) -> Option<char> {
        let inner = self.inner.read();
        if index >= inner.seq.len() {
            return None;
        }
        let slot = inner.seq.slot_at(index);
        inner.seq.node(slot).map(|n| n.value)
    }

    /// Remove all characters.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.seq.clear();
        inner.stamp.bump(self.clock.now_millis());
    }

    /// Whether a node with this id is currently in the text.
    pub fn contains_node(&self, id: &Uuid) -> bool {
        self.inner.read().seq.contains(id)
    }

    /// Copy of every character node in reading order.
    pub fn nodes(&self) -> Vec<CharNode> {
        self.inner.read().seq.nodes()
    }

    fn ignore(&self, op: &Operation, reason: &'static str) {
        debug!(
            text_id = %self.id,
            operation_id = %op.operation_id(),
            operation_type = %op.operation_type(),
            reason,
            "Ignoring text operation"
        );
    }
}

impl Replica for Text {
    type State = String;

    fn id(&self) -> &str {
        &self.id
    }

    fn stamp(&self) -> Stamp {
        self.inner.read().stamp
    }

    fn state(&self) -> String {
        self.to_string()
    }

    /// Union both sides' nodes by id, keeping the node with the strictly
    /// greater timestamp on collision, then rebuild the sequence in ascending
    /// timestamp order. Nodes with equal timestamps keep their local reading
    /// order, followed by the peer's.
    fn merge(&self, other: &Text) {
        if std::ptr::eq(self, other) {
            return;
        }
        let (peer_nodes, peer_stamp) = {
            let peer = other.inner.read();
            (peer.seq.nodes(), peer.stamp)
        };

        let mut inner = self.inner.write();
        let mut merged: IndexMap<Uuid, CharNode> =
            inner.seq.iter().map(|n| (n.id, n.clone())).collect();
        let local_len = merged.len();
        for node in peer_nodes {
            match merged.entry(node.id) {
                Entry::Occupied(mut slot) => {
                    if node.timestamp > slot.get().timestamp {
                        slot.insert(node);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(node);
                }
            }
        }

        let mut nodes: Vec<CharNode> = merged.into_values().collect();
        nodes.sort_by_key(|n| n.timestamp);
        trace!(
            text_id = %self.id,
            local = local_len,
            merged = nodes.len(),
            "Merged text replicas"
        );
        inner.seq = CharSequence::from_nodes(nodes);
        inner.stamp.absorb(peer_stamp, self.clock.now_millis());
    }

    fn apply_operation(&self, op: &Operation) {
        match op.operation_type() {
            OperationType::Insert => {
                let index = op.index_field(constants::INDEX);
                let text = op.value_field(constants::TEXT).and_then(|v| v.as_str());
                match (index, text) {
                    (Some(index), Some(text)) => {
                        if self.insert(index, text).is_err() {
                            self.ignore(op, "index out of range");
                        }
                    }
                    _ => self.ignore(op, "malformed insert payload"),
                }
            }
            OperationType::Delete => {
                let start = op.index_field(constants::START);
                let end = op.index_field(constants::END);
                match (start, end) {
                    (Some(start), Some(end)) => {
                        if self.delete(start, end).is_err() {
                            self.ignore(op, "range out of bounds");
                        }
                    }
                    _ => self.ignore(op, "malformed delete payload"),
                }
            }
            OperationType::Clear => self.clear(),
            // Text updates travel as a delete followed by an insert.
            OperationType::Update | OperationType::Merge => {
                self.ignore(op, "unsupported operation type")
            }
        }
    }

    fn fork(&self) -> Text {
        Text {
            id: self.id.clone(),
            clock: Arc::clone(&self.clock),
            inner: RwLock::new(self.inner.read().clone()),
        }
    }
}

impl std::fmt::Display for Text {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner.read().seq, f)
    }
}

/// Complete replica state, as shipped between peers.
#[derive(Serialize, Deserialize)]
struct TextRepr {
    id: String,
    #[serde(flatten)]
    stamp: Stamp,
    nodes: Vec<CharNode>,
}

impl Serialize for Text {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let inner = self.inner.read();
        TextRepr {
            id: self.id.clone(),
            stamp: inner.stamp,
            nodes: inner.seq.nodes(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Text {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = TextRepr::deserialize(deserializer)?;
        Ok(Text {
            id: repr.id,
            clock: system_clock(),
            inner: RwLock::new(TextInner {
                stamp: repr.stamp,
                seq: CharSequence::from_nodes(repr.nodes),
            }),
        })
    }
}
