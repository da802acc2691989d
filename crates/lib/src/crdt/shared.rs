//! The closed set of shared-type variants behind one interface.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

use crate::Result;
use crate::crdt::{List, Map, Replica, Stamp, Text};
use crate::operation::Operation;

/// Which variant a [`SharedType`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SharedKind {
    Text,
    List,
    Map,
}

impl std::fmt::Display for SharedKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SharedKind::Text => "text",
            SharedKind::List => "list",
            SharedKind::Map => "map",
        })
    }
}

/// One field of a document: an ordered text, an ordered list, or a map.
///
/// Serializes as the variant's full replica state with a `"type"` tag.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SharedType {
    Text(Text),
    List(List),
    Map(Map),
}

/// A plain snapshot of a shared type's contents.
///
/// Serializes untagged: a string for text, an array for a list, an object for
/// a map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SharedState {
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl SharedState {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SharedState::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            SharedState::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            SharedState::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl SharedType {
    pub fn kind(&self) -> SharedKind {
        match self {
            SharedType::Text(_) => SharedKind::Text,
            SharedType::List(_) => SharedKind::List,
            SharedType::Map(_) => SharedKind::Map,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            SharedType::Text(t) => t.id(),
            SharedType::List(l) => l.id(),
            SharedType::Map(m) => m.id(),
        }
    }

    pub fn stamp(&self) -> Stamp {
        match self {
            SharedType::Text(t) => t.stamp(),
            SharedType::List(l) => l.stamp(),
            SharedType::Map(m) => m.stamp(),
        }
    }

    pub fn version(&self) -> u64 {
        self.stamp().version
    }

    pub fn timestamp(&self) -> u64 {
        self.stamp().timestamp
    }

    pub fn state(&self) -> SharedState {
        match self {
            SharedType::Text(t) => SharedState::Text(t.state()),
            SharedType::List(l) => SharedState::List(l.state()),
            SharedType::Map(m) => SharedState::Map(m.state()),
        }
    }

    /// Merge a peer of the same variant into this one. A peer of a different
    /// variant is ignored.
    pub fn merge(&self, other: &SharedType) {
        match (self, other) {
            (SharedType::Text(a), SharedType::Text(b)) => a.merge(b),
            (SharedType::List(a), SharedType::List(b)) => a.merge(b),
            (SharedType::Map(a), SharedType::Map(b)) => a.merge(b),
            _ => trace!(
                id = %self.id(),
                local = %self.kind(),
                peer = %other.kind(),
                "Skipping merge across shared-type variants"
            ),
        }
    }

    pub fn apply_operation(&self, op: &Operation) {
        match self {
            SharedType::Text(t) => t.apply_operation(op),
            SharedType::List(l) => l.apply_operation(op),
            SharedType::Map(m) => m.apply_operation(op),
        }
    }

    /// An independent deep copy with the same id, stamp and contents.
    pub fn fork(&self) -> SharedType {
        match self {
            SharedType::Text(t) => SharedType::Text(t.fork()),
            SharedType::List(l) => SharedType::List(l.fork()),
            SharedType::Map(m) => SharedType::Map(m.fork()),
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            SharedType::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&List> {
        match self {
            SharedType::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            SharedType::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Encode the full replica state as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a full replica state produced by [`SharedType::to_json`].
    pub fn from_json(json: &str) -> Result<SharedType> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<Text> for SharedType {
    fn from(text: Text) -> Self {
        SharedType::Text(text)
    }
}

impl From<List> for SharedType {
    fn from(list: List) -> Self {
        SharedType::List(list)
    }
}

impl From<Map> for SharedType {
    fn from(map: Map) -> Self {
        SharedType::Map(map)
    }
}
