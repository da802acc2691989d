//! Core traits and version stamps shared by every shared type.
//!
//! - [`Stamp`]: the `(version, timestamp)` pair each replica carries, and the
//!   precedence rule that decides which of two stamps wins.
//! - [`Replica`]: the capability set every shared-type variant implements.

use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Version counter and wall-clock timestamp of a replica.
///
/// `version` only increases and `timestamp` never decreases for a single
/// instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub version: u64,
    pub timestamp: u64,
}

impl Stamp {
    /// A fresh stamp at version 0.
    pub fn new(timestamp: u64) -> Self {
        Self {
            version: 0,
            timestamp,
        }
    }

    /// Precedence rule: strictly larger version wins, and on an equal version
    /// a strictly larger timestamp wins.
    ///
    /// ```
    /// use coedit::crdt::Stamp;
    ///
    /// let a = Stamp { version: 2, timestamp: 10 };
    /// let b = Stamp { version: 2, timestamp: 20 };
    /// assert!(b.supersedes(&a));
    /// assert!(!a.supersedes(&b));
    /// assert!(!a.supersedes(&a));
    /// ```
    pub fn supersedes(&self, other: &Stamp) -> bool {
        self.version > other.version
            || (self.version == other.version && self.timestamp > other.timestamp)
    }

    /// Record one local mutation.
    pub(crate) fn bump(&mut self, now: u64) {
        self.version += 1;
        self.timestamp = self.timestamp.max(now);
    }

    /// Take the maximum of both stamps, then record the merge itself as one
    /// local mutation.
    pub(crate) fn absorb(&mut self, other: Stamp, now: u64) {
        self.version = self.version.max(other.version);
        self.timestamp = self.timestamp.max(other.timestamp);
        self.bump(now);
    }
}

/// The capability set of a shared type.
///
/// Implementations guard their state with an internal reader/writer lock, so
/// every method takes `&self` and instances can be shared across threads.
pub trait Replica: Send + Sync {
    /// The plain snapshot returned by [`Replica::state`].
    type State;

    /// The identifier assigned at construction. Never changes.
    fn id(&self) -> &str;

    /// Current version and timestamp.
    fn stamp(&self) -> Stamp;

    fn version(&self) -> u64 {
        self.stamp().version
    }

    fn timestamp(&self) -> u64 {
        self.stamp().timestamp
    }

    /// A read-consistent copy of the current contents.
    fn state(&self) -> Self::State;

    /// Reconcile with another replica of the same variant.
    ///
    /// Merging an instance with itself is a no-op.
    fn merge(&self, other: &Self);

    /// Apply an operation record. Unrecognized or malformed operations are
    /// ignored without error.
    fn apply_operation(&self, op: &Operation);

    /// An independent deep copy with the same id, stamp and contents.
    fn fork(&self) -> Self
    where
        Self: Sized;
}
