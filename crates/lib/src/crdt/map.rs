//! Key-value shared type with last-writer-wins per key.
//!
//! Every write stamps its key with the current time. Merging adopts the peer's
//! value for a key when the local map lacks the key or the peer's per-key
//! timestamp is strictly greater. Equal timestamps keep the local value.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::clock::{Clock, system_clock};
use crate::crdt::{Replica, Stamp};
use crate::operation::{Operation, OperationType};

/// A stored value together with the time of its last write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MapEntry {
    value: Value,
    timestamp: u64,
}

#[derive(Debug, Clone, Default)]
struct MapInner {
    stamp: Stamp,
    // Value and write time live in one entry so a key can never have one
    // without the other.
    entries: HashMap<String, MapEntry>,
}

/// A key-addressable collaborative map.
///
/// # Examples
///
/// ```
/// use coedit::crdt::Map;
/// use serde_json::json;
///
/// let map = Map::new();
/// assert_eq!(map.set("key1", "value1"), None);
/// assert_eq!(map.set("key1", "updated"), Some(json!("value1")));
/// assert_eq!(map.get("key1"), Some(json!("updated")));
/// assert!(map.contains_key("key1"));
/// ```
#[derive(Debug)]
pub struct Map {
    id: String,
    clock: Arc<dyn Clock>,
    inner: RwLock<MapInner>,
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

impl Map {
    /// Create an empty map using the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create an empty map stamped by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let stamp = Stamp::new(clock.now_millis());
        Self {
            id: Uuid::new_v4().to_string(),
            clock,
            inner: RwLock::new(MapInner {
                stamp,
                entries: HashMap::new(),
            }),
        }
    }

    /// Store a value, returning the previous one.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let mut inner = self.inner.write();
        // Read the clock under the lock so per-key stamps follow write order.
        let now = self.clock.now_millis();
        let previous = inner.entries.insert(
            key.into(),
            MapEntry {
                value: value.into(),
                timestamp: now,
            },
        );
        inner.stamp.bump(now);
        previous.map(|e| e.value)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().entries.get(key).map(|e| e.value.clone())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.read().entries.contains_key(key)
    }

    /// Remove a key, returning its value. Counts as a mutation even when the
    /// key was absent.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let mut inner = self.inner.write();
        let removed = inner.entries.remove(key);
        inner.stamp.bump(self.clock.now_millis());
        removed.map(|e| e.value)
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.stamp.bump(self.clock.now_millis());
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.read().entries.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.inner
            .read()
            .entries
            .values()
            .map(|e| e.value.clone())
            .collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    /// Time of the last write to `key`.
    pub fn entry_timestamp(&self, key: &str) -> Option<u64> {
        self.inner.read().entries.get(key).map(|e| e.timestamp)
    }
}

impl Replica for Map {
    type State = BTreeMap<String, Value>;

    fn id(&self) -> &str {
        &self.id
    }

    fn stamp(&self) -> Stamp {
        self.inner.read().stamp
    }

    fn state(&self) -> BTreeMap<String, Value> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), e.value.clone()))
            .collect()
    }

    fn merge(&self, other: &Map) {
        if std::ptr::eq(self, other) {
            return;
        }
        let (peer_entries, peer_stamp) = {
            let peer = other.inner.read();
            (peer.entries.clone(), peer.stamp)
        };

        let mut inner = self.inner.write();
        let mut adopted = 0usize;
        for (key, entry) in peer_entries {
            let newer = match inner.entries.get(&key) {
                None => true,
                Some(local) => entry.timestamp > local.timestamp,
            };
            if newer {
                inner.entries.insert(key, entry);
                adopted += 1;
            }
        }
        trace!(map_id = %self.id, adopted, "Merged map replicas");
        inner.stamp.absorb(peer_stamp, self.clock.now_millis());
    }

    fn apply_operation(&self, op: &Operation) {
        match op.operation_type() {
            OperationType::Insert | OperationType::Update => match op.data().as_object() {
                Some(entries) => {
                    for (key, value) in entries {
                        self.set(key.clone(), value.clone());
                    }
                }
                None => debug!(
                    map_id = %self.id,
                    operation_id = %op.operation_id(),
                    "Ignoring map write without an object payload"
                ),
            },
            OperationType::Delete => match op.data().as_str() {
                Some(key) => {
                    self.remove(key);
                }
                None => debug!(
                    map_id = %self.id,
                    operation_id = %op.operation_id(),
                    "Ignoring map delete without a key payload"
                ),
            },
            OperationType::Clear => self.clear(),
            OperationType::Merge => debug!(
                map_id = %self.id,
                operation_id = %op.operation_id(),
                operation_type = %op.operation_type(),
                reason = "unsupported operation type",
                "Ignoring map operation"
            ),
        }
    }

    fn fork(&self) -> Map {
        Map {
            id: self.id.clone(),
            clock: Arc::clone(&self.clock),
            inner: RwLock::new(self.inner.read().clone()),
        }
    }
}

/// Complete replica state, as shipped between peers.
#[derive(Serialize, Deserialize)]
struct MapRepr {
    id: String,
    #[serde(flatten)]
    stamp: Stamp,
    entries: BTreeMap<String, MapEntry>,
}

impl Serialize for Map {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let inner = self.inner.read();
        MapRepr {
            id: self.id.clone(),
            stamp: inner.stamp,
            entries: inner
                .entries
                .iter()
                .map(|(k, e)| (k.clone(), e.clone()))
                .collect(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Map {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = MapRepr::deserialize(deserializer)?;
        Ok(Map {
            id: repr.id,
            clock: system_clock(),
            inner: RwLock::new(MapInner {
                stamp: repr.stamp,
                entries: repr.entries.into_iter().collect(),
            }),
        })
    }
}
