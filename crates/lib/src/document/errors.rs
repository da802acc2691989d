//! Error types for document and document-store lookups.

use thiserror::Error;

/// Errors raised by [`DocumentStore`](super::DocumentStore) lookups.
///
/// `Document` itself never fails: unresolved operation targets are queued and
/// mismatched merges are ignored.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// No document is stored under this id.
    #[error("Document not found: {id}")]
    DocumentNotFound {
        /// The id that was looked up
        id: String,
    },

    /// The document has no field with this name.
    #[error("Shared type '{name}' not found in document '{document_id}'")]
    SharedTypeNotFound {
        /// The document that was searched
        document_id: String,
        /// The field name that was looked up
        name: String,
    },
}

impl DocumentError {
    /// Check if this error indicates a missing document or field
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DocumentError::DocumentNotFound { .. } | DocumentError::SharedTypeNotFound { .. }
        )
    }

    /// Get the document id this error refers to
    pub fn document_id(&self) -> &str {
        match self {
            DocumentError::DocumentNotFound { id } => id,
            DocumentError::SharedTypeNotFound { document_id, .. } => document_id,
        }
    }
}

impl From<DocumentError> for crate::Error {
    fn from(err: DocumentError) -> Self {
        crate::Error::Document(err)
    }
}
