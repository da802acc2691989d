//! Shared types: the replicated data structures that make up a document.
//!
//! Every shared type carries an immutable id and a [`Stamp`] that advances on
//! each mutating call, merges included. All three variants guard their state
//! with a reader/writer lock, so they can be shared across threads and every
//! method takes `&self`.
//!
//! # Core Types
//!
//! - [`Text`] - a character-addressable text buffer
//! - [`List`] - an index-addressable list with per-element ids
//! - [`Map`] - a key-value map with last-writer-wins per key
//! - [`SharedType`] - the tagged union a document stores
//!
//! # Traits
//!
//! - [`Replica`] - merge, apply-operation and snapshot semantics

pub mod errors;
pub mod list;
pub mod map;
pub mod shared;
pub mod text;
pub mod traits;

pub use errors::CRDTError;
pub use list::List;
pub use map::Map;
pub use shared::{SharedKind, SharedState, SharedType};
pub use text::{CharNode, Text};
pub use traits::{Replica, Stamp};
