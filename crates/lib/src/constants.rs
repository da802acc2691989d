//! Constants used throughout the coedit library.
//!
//! Central definitions for the field names that make up operation payloads.

/// Payload field holding the target position of a list or text insert.
pub const INDEX: &str = "index";

/// Payload field holding the value of a list insert or update.
pub const ELEMENT: &str = "element";

/// Payload field holding the characters of a text insert.
pub const TEXT: &str = "text";

/// Payload field holding the inclusive start of a text delete range.
pub const START: &str = "start";

/// Payload field holding the exclusive end of a text delete range.
pub const END: &str = "end";


/// Snapshot key holding a document's version. Takes precedence over a field
/// of the same name.
pub const VERSION: &str = "version";

/// Snapshot key holding a document's timestamp. Takes precedence over a field
/// of the same name.
pub const TIMESTAMP: &str = "timestamp";
