//! Store error types.
//!
//! Only conditions a caller can sensibly recover from are reported here.
//! Contract violations (stale table ids passed to mutators, rows out of
//! bounds, migrating a table into itself) panic instead.

use memdb_property::PropertyId;

/// Errors returned by [`Database`](crate::Database) operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A property id was not found in the type registry.
    #[error("property {0} is not registered")]
    UnknownProperty(PropertyId),

    /// Every table slot is in use.
    #[error("table limit reached ({max} tables); raise `max_tables` in the database config")]
    TableLimitReached { max: usize },

    /// A serialized instance ended in the middle of an entry.
    #[error("serialized instance truncated at byte {offset}: needed {needed} bytes, {available} left")]
    TruncatedBlob {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// A typed access used a Rust type whose size differs from the column's.
    #[error("type size mismatch for {property}: column holds {expected} bytes, got {actual}")]
    TypeSizeMismatch {
        property: PropertyId,
        expected: usize,
        actual: usize,
    },

    /// The table has no column for the property (absent, or a zero-size tag).
    #[error("table has no column for {property}")]
    NoColumn { property: PropertyId },
}
