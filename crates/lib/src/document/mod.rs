//! Documents: named registries of shared types.
//!
//! A [`Document`] binds field names to [`SharedType`] instances, routes
//! incoming operations to the instance whose id matches the operation's
//! target, and buffers operations whose target is not registered yet. Merging
//! two documents reconciles same-named fields, adopts fields only the peer
//! has, then retries the buffered operations.
//!
//! Routing and merging never fail. An operation for an unknown target is
//! deferred, not rejected, so replayed or early network messages are
//! harmless. The pending queue is unbounded and nothing expires from it.

pub mod errors;
pub mod store;

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, trace};
use uuid::Uuid;

pub use errors::DocumentError;
pub use store::DocumentStore;

use crate::Result;
use crate::clock::{Clock, system_clock};
use crate::constants;
use crate::crdt::{SharedState, SharedType, Stamp};
use crate::operation::Operation;

/// A plain snapshot of a document, ready to send to clients.
///
/// Serializes as one flat object: each field name maps to its shared-type
/// snapshot, next to `version` and `timestamp`. The stamp keys win over fields
/// with those names, so every key appears once.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocumentState {
    #[serde(flatten)]
    pub fields: BTreeMap<String, SharedState>,
    pub version: u64,
    pub timestamp: u64,
}

impl DocumentState {
    pub fn get(&self, name: &str) -> Option<&SharedState> {
        self.fields.get(name)
    }
}

fn is_stamp_key(name: &str) -> bool {
    name == constants::VERSION || name == constants::TIMESTAMP
}

impl Serialize for DocumentState {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let visible = self.fields.iter().filter(|(name, _)| !is_stamp_key(name));
        let mut map = serializer.serialize_map(None)?;
        for (name, state) in visible {
            map.serialize_entry(name, state)?;
        }
        map.serialize_entry(constants::VERSION, &self.version)?;
        map.serialize_entry(constants::TIMESTAMP, &self.timestamp)?;
        map.end()
    }
}

/// A collaborative document.
///
/// Shared types are held behind [`Arc`] so callers can keep a handle to a
/// registered field and mutate it directly. Fields adopted from a peer during
/// [`Document::merge`] are deep copies; two documents never share an instance.
///
/// # Examples
///
/// ```
/// use coedit::{Document, Operation};
/// use coedit::crdt::{List, SharedState};
/// use serde_json::json;
///
/// let doc = Document::new();
/// let items = doc.register("items", List::new());
///
/// doc.apply_operation(Operation::insert(items.id(), json!({"index": 0, "element": "x"})));
///
/// let state = doc.state();
/// assert_eq!(state.get("items"), Some(&SharedState::List(vec![json!("x")])));
/// ```
#[derive(Debug)]
pub struct Document {
    id: String,
    clock: Arc<dyn Clock>,
    fields: RwLock<HashMap<String, Arc<SharedType>>>,
    pending: Mutex<Vec<Operation>>,
    clients: RwLock<HashSet<String>>,
    stamp: Mutex<Stamp>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document using the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create an empty document stamped by the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), clock)
    }

    /// Create an empty document with a caller-chosen id.
    pub fn with_id(id: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let stamp = Stamp::new(clock.now_millis());
        Self {
            id: id.into(),
            clock,
            fields: RwLock::new(HashMap::new()),
            pending: Mutex::new(Vec::new()),
            clients: RwLock::new(HashSet::new()),
            stamp: Mutex::new(stamp),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn stamp(&self) -> Stamp {
        *self.stamp.lock()
    }

    pub fn version(&self) -> u64 {
        self.stamp().version
    }

    pub fn timestamp(&self) -> u64 {
        self.stamp().timestamp
    }

    /// The clock this document stamps with.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn bump(&self) {
        self.stamp.lock().bump(self.clock.now_millis());
    }

    /// Bind `name` to a shared type, replacing any previous binding, and
    /// return a handle to the registered instance.
    pub fn register(&self, name: impl Into<String>, shared: impl Into<SharedType>) -> Arc<SharedType> {
        let shared = Arc::new(shared.into());
        self.fields.write().insert(name.into(), Arc::clone(&shared));
        self.bump();
        shared
    }

    /// The shared type bound to `name`.
    pub fn get(&self, name: &str) -> Option<Arc<SharedType>> {
        self.fields.read().get(name).cloned()
    }

    /// Registered field names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.fields.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.read().is_empty()
    }

    /// The registered shared type whose id is `target_id`.
    ///
    /// The registry is keyed by name, so this scans every field.
    pub fn find(&self, target_id: &str) -> Option<Arc<SharedType>> {
        self.fields
            .read()
            .values()
            .find(|shared| shared.id() == target_id)
            .cloned()
    }

    /// Route an operation to its target, or queue it if the target is not
    /// registered.
    pub fn apply_operation(&self, op: Operation) {
        match self.find(op.target_id()) {
            Some(target) => {
                target.apply_operation(&op);
                self.bump();
            }
            None => {
                debug!(
                    document_id = %self.id,
                    operation_id = %op.operation_id(),
                    target_id = %op.target_id(),
                    "Target not registered, queueing operation"
                );
                self.pending.lock().push(op);
            }
        }
    }

    /// Apply a batch of operations in order.
    pub fn apply_operations(&self, ops: impl IntoIterator<Item = Operation>) {
        for op in ops {
            self.apply_operation(op);
        }
    }

    /// Reconcile with a peer document.
    ///
    /// Same-named fields are merged into the local instance; fields only the
    /// peer has are adopted as deep copies keeping their shared-type id. The
    /// pending queue is replayed afterwards. Merging a document with itself is
    /// a no-op.
    pub fn merge(&self, other: &Document) {
        if std::ptr::eq(self, other) {
            return;
        }
        let peer_fields: Vec<(String, Arc<SharedType>)> = other
            .fields
            .read()
            .iter()
            .map(|(name, shared)| (name.clone(), Arc::clone(shared)))
            .collect();

        let mut merged = 0usize;
        let mut adopted = 0usize;
        for (name, peer) in peer_fields {
            let local = match self.fields.write().entry(name) {
                Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(peer.fork()));
                    None
                }
            };
            match local {
                Some(local) => {
                    local.merge(&peer);
                    merged += 1;
                }
                None => adopted += 1,
            }
        }

        let replayed = self.drain_pending();
        trace!(
            document_id = %self.id,
            peer_id = %other.id,
            merged,
            adopted,
            replayed,
            "Merged documents"
        );
        self.bump();
    }

    /// Retry every queued operation against the current registry.
    ///
    /// Operations whose target now resolves are applied and dropped from the
    /// queue; the rest stay queued in their original order. Returns the number
    /// applied.
    pub fn replay_pending(&self) -> usize {
        let applied = self.drain_pending();
        if applied > 0 {
            self.bump();
        }
        applied
    }

    fn drain_pending(&self) -> usize {
        let queued = std::mem::take(&mut *self.pending.lock());
        if queued.is_empty() {
            return 0;
        }
        let mut applied = 0;
        let mut unresolved = Vec::new();
        for op in queued {
            match self.find(op.target_id()) {
                Some(target) => {
                    target.apply_operation(&op);
                    applied += 1;
                }
                None => unresolved.push(op),
            }
        }
        let mut pending = self.pending.lock();
        // Anything queued while we were replaying goes after the survivors.
        unresolved.append(&mut pending);
        *pending = unresolved;
        applied
    }

    /// Number of operations waiting for their target.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Copy of the operations waiting for their target, oldest first.
    pub fn pending_operations(&self) -> Vec<Operation> {
        self.pending.lock().clone()
    }

    /// Remove every field and queued operation.
    pub fn clear(&self) {
        self.fields.write().clear();
        self.pending.lock().clear();
        self.bump();
    }

    /// A plain snapshot of every field plus the document's own stamp.
    ///
    /// Fields named `version` or `timestamp` are left out of the snapshot;
    /// the document's stamp takes those keys.
    pub fn state(&self) -> DocumentState {
        let fields = self
            .fields
            .read()
            .iter()
            .filter(|(name, _)| {
                let shadowed = is_stamp_key(name);
                if shadowed {
                    debug!(
                        document_id = %self.id,
                        name = %name,
                        "Field shadowed by snapshot stamp key"
                    );
                }
                !shadowed
            })
            .map(|(name, shared)| (name.clone(), shared.state()))
            .collect();
        let stamp = self.stamp();
        DocumentState {
            fields,
            version: stamp.version,
            timestamp: stamp.timestamp,
        }
    }

    /// Track an attached client. Returns false if it was already attached.
    pub fn add_client(&self, client_id: impl Into<String>) -> bool {
        self.clients.write().insert(client_id.into())
    }

    /// Stop tracking a client. Returns false if it was not attached.
    pub fn remove_client(&self, client_id: &str) -> bool {
        self.clients.write().remove(client_id)
    }

    pub fn has_client(&self, client_id: &str) -> bool {
        self.clients.read().contains(client_id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Encode the full document (ids, stamps, replica state, pending queue)
    /// as JSON. Attached clients are not included.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a document produced by [`Document::to_json`].
    pub fn from_json(json: &str) -> Result<Document> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Serialize)]
struct DocumentReprRef<'a> {
    id: &'a str,
    #[serde(flatten)]
    stamp: Stamp,
    fields: BTreeMap<&'a str, &'a SharedType>,
    pending: &'a [Operation],
}

#[derive(Deserialize)]
struct DocumentRepr {
    id: String,
    #[serde(flatten)]
    stamp: Stamp,
    fields: BTreeMap<String, SharedType>,
    #[serde(default)]
    pending: Vec<Operation>,
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let fields = self.fields.read();
        let pending = self.pending.lock();
        DocumentReprRef {
            id: &self.id,
            stamp: self.stamp(),
            fields: fields
                .iter()
                .map(|(name, shared)| (name.as_str(), shared.as_ref()))
                .collect(),
            pending: &pending,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let repr = DocumentRepr::deserialize(deserializer)?;
        Ok(Document {
            id: repr.id,
            clock: system_clock(),
            fields: RwLock::new(
                repr.fields
                    .into_iter()
                    .map(|(name, shared)| (name, Arc::new(shared)))
                    .collect(),
            ),
            pending: Mutex::new(repr.pending),
            clients: RwLock::new(HashSet::new()),
            stamp: Mutex::new(repr.stamp),
        })
    }
}
