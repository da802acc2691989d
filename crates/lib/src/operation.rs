//! Operation records delivered to shared types and documents.
//!
//! An [`Operation`] is an immutable description of one mutation request. The
//! transport layer deserializes it from the wire, and the core routes it to the
//! shared type named by [`Operation::target_id`]. The shape of
//! [`Operation::data`] depends on the operation type and the target variant;
//! a payload that does not match is ignored by the receiver rather than
//! rejected.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::clock::{Clock, millis_to_utc, system_clock};

/// The kind of mutation an [`Operation`] requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationType {
    Insert,
    Update,
    Delete,
    Clear,
    /// Carried on the wire for completeness; shared types never apply it.
    /// Merging goes through `merge` directly.
    Merge,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationType::Insert => "INSERT",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
            OperationType::Clear => "CLEAR",
            OperationType::Merge => "MERGE",
        };
        f.write_str(name)
    }
}

/// One mutation request against a shared type.
///
/// Operations carry no ownership relation to their target; they only name it
/// by id. Once built they cannot be modified.
///
/// # Examples
///
/// ```
/// use coedit::{Operation, OperationType};
/// use serde_json::json;
///
/// let op = Operation::new(OperationType::Insert, "list-id", json!({"index": 0, "element": "x"}))
///     .with_metadata("client", json!("alice"));
///
/// assert_eq!(op.operation_type(), OperationType::Insert);
/// assert_eq!(op.target_id(), "list-id");
/// assert_eq!(op.metadata().get("client"), Some(&json!("alice")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default = "generate_operation_id")]
    operation_id: String,
    operation_type: OperationType,
    target_id: String,
    #[serde(default)]
    timestamp: u64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    metadata: HashMap<String, Value>,
}

fn generate_operation_id() -> String {
    Uuid::new_v4().to_string()
}

impl Operation {
    /// Create an operation stamped with the system clock.
    pub fn new(operation_type: OperationType, target_id: impl Into<String>, data: Value) -> Self {
        Self::with_clock(operation_type, target_id, data, system_clock())
    }

    /// Create an operation stamped with the given clock.
    pub fn with_clock(
        operation_type: OperationType,
        target_id: impl Into<String>,
        data: Value,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            operation_id: generate_operation_id(),
            operation_type,
            target_id: target_id.into(),
            timestamp: clock.now_millis(),
            data,
            metadata: HashMap::new(),
        }
    }

    /// Create an `Insert` operation.
    pub fn insert(target_id: impl Into<String>, data: Value) -> Self {
        Self::new(OperationType::Insert, target_id, data)
    }

    /// Create an `Update` operation.
    pub fn update(target_id: impl Into<String>, data: Value) -> Self {
        Self::new(OperationType::Update, target_id, data)
    }

    /// Create a `Delete` operation.
    pub fn delete(target_id: impl Into<String>, data: Value) -> Self {
        Self::new(OperationType::Delete, target_id, data)
    }

    /// Create a `Clear` operation. Clear ignores its payload.
    pub fn clear(target_id: impl Into<String>) -> Self {
        Self::new(OperationType::Clear, target_id, Value::Null)
    }

    /// Attach a metadata entry, consuming and returning the operation.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    pub fn operation_type(&self) -> OperationType {
        self.operation_type
    }

    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Creation time in milliseconds since Unix epoch.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Creation time as a UTC datetime.
    pub fn datetime(&self) -> DateTime<Utc> {
        millis_to_utc(self.timestamp)
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn metadata(&self) -> &HashMap<String, Value> {
        &self.metadata
    }

    /// Read a non-negative integer field from an object payload.
    pub(crate) fn index_field(&self, field: &str) -> Option<usize> {
        self.data.get(field).and_then(as_index)
    }

    /// Read a non-null field from an object payload.
    pub(crate) fn value_field(&self, field: &str) -> Option<&Value> {
        self.data.get(field).filter(|v| !v.is_null())
    }

    /// Interpret the whole payload as a bare index.
    pub(crate) fn index_payload(&self) -> Option<usize> {
        as_index(&self.data)
    }
}

fn as_index(value: &Value) -> Option<usize> {
    value.as_u64().and_then(|n| usize::try_from(n).ok())
}
