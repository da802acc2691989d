//!
//! Coedit: conflict-free shared types for collaborative documents.
//! This library provides replicated text, list and map types, a document that
//! groups them under names, and an in-process store of documents.
//!
//! ## Core Concepts
//!
//! * **Shared types (`crdt::SharedType`)**: Replicated data structures, each with an immutable id and a version/timestamp stamp:
//!     * **Text (`crdt::Text`)**: A character sequence in which every character carries its own id and timestamp.
//!     * **List (`crdt::List`)**: An ordered list of JSON values with a stable id per element.
//!     * **Map (`crdt::Map`)**: A string-keyed map of JSON values, last-writer-wins per key.
//! * **Operations (`operation::Operation`)**: Remote edit messages addressed to a shared type by id.
//! * **Documents (`document::Document`)**: Named registries of shared types that route operations, queue the ones whose target is unknown, and merge with peer documents.
//! * **Store (`document::DocumentStore`)**: Documents by id, with helpers to create fields and merge documents.
//! * **Clocks (`clock::Clock`)**: The millisecond source behind every timestamp, injectable for deterministic tests.

pub mod clock;
pub mod constants;
pub mod crdt;
pub mod document;
pub mod operation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use crdt::{CRDTError, List, Map, Replica, SharedKind, SharedState, SharedType, Stamp, Text};
pub use document::{Document, DocumentError, DocumentState, DocumentStore};
pub use operation::{Operation, OperationType};

/// Result type used throughout the Coedit library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Coedit library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured CRDT errors from the crdt module
    #[error(transparent)]
    CRDT(crdt::CRDTError),

    /// Structured document errors from the document module
    #[error(transparent)]
    Document(document::DocumentError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::CRDT(_) => "crdt",
            Error::Document(_) => "document",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a document or field was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Document(doc_err) => doc_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error indicates an index or range outside the bounds of
    /// a shared type.
    pub fn is_out_of_range(&self) -> bool {
        match self {
            Error::CRDT(crdt_err) => crdt_err.is_out_of_range(),
            _ => false,
        }
    }

    /// Check if this error is CRDT-related.
    pub fn is_crdt_error(&self) -> bool {
        matches!(self, Error::CRDT(_))
    }

    /// Check if this error is document-related.
    pub fn is_document_error(&self) -> bool {
        matches!(self, Error::Document(_))
    }

    /// Check if this error came from JSON encoding or decoding.
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Error::Serialize(_))
    }
}
