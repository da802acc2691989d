//! Error types for shared-type operations.
//!
//! Only bounds violations are surfaced as errors. Malformed operations and
//! mismatched merge peers are silent no-ops and never produce a `CRDTError`.

use thiserror::Error;

/// Structured error types for shared-type operations.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CRDTError {
    /// A position argument fell outside the valid bounds.
    #[error("Index out of range: {index} (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// A `[start, end)` range was empty or ran past the end.
    #[error("Invalid range: [{start}, {end}) (length {len})")]
    InvalidRange { start: usize, end: usize, len: usize },
}

impl CRDTError {
    /// Check if this error is a bounds violation of any kind
    pub fn is_out_of_range(&self) -> bool {
        matches!(
            self,
            CRDTError::IndexOutOfRange { .. } | CRDTError::InvalidRange { .. }
        )
    }

    /// Get the length of the structure at the time of the failed call
    pub fn length(&self) -> usize {
        match self {
            CRDTError::IndexOutOfRange { len, .. } | CRDTError::InvalidRange { len, .. } => *len,
        }
    }
}

// Conversion from CRDTError to the main Error type
impl From<CRDTError> for crate::Error {
    fn from(err: CRDTError) -> Self {
        crate::Error::CRDT(err)
    }
}
