//! Self-describing snapshots of a single row.
//!
//! A blob is a sequence of entries, one per property of the source table in
//! schema order: the property id as a little-endian `u32`, then the raw value
//! bytes (none for tags). Value sizes are not stored; they come from the
//! type registry, so a blob is only meaningful to databases sharing it.

use memdb_property::PropertyId;
use serde::{Deserialize, Serialize};

use super::Database;
use crate::error::DbError;
use crate::id::TableId;

const ID_SIZE: usize = std::mem::size_of::<u32>();

/// Serialized form of one row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob(Vec<u8>);

impl Blob {
    /// Raw blob bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` for a blob with no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the blob, returning its bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// One decoded entry: property and the byte range of its value.
struct Entry {
    property: PropertyId,
    value: std::ops::Range<usize>,
}

fn take(bytes: &[u8], offset: usize, needed: usize) -> Result<std::ops::Range<usize>, DbError> {
    let available = bytes.len() - offset;
    if available < needed {
        return Err(DbError::TruncatedBlob {
            offset,
            needed,
            available,
        });
    }
    Ok(offset..offset + needed)
}

impl Database {
    /// Snapshot every property of `row` into a [`Blob`].
    ///
    /// # Panics
    ///
    /// Panics if `tid` is invalid or `row >= num_rows`.
    #[must_use]
    pub fn serialize_instance(&self, tid: TableId, row: usize) -> Blob {
        let table = self.table(tid);
        assert!(row < table.num_rows, "row {row} out of bounds ({} rows)", table.num_rows);

        let size: usize = table
            .properties
            .iter()
            .map(|&p| ID_SIZE + self.registry.type_size(p).unwrap_or(0) as usize)
            .sum();
        let mut bytes = Vec::with_capacity(size);
        for &property in &table.properties {
            bytes.extend_from_slice(&property.0.to_le_bytes());
            if let Some(column) = table.column(property) {
                bytes.extend_from_slice(column.get_raw(row));
            }
        }
        Blob(bytes)
    }

    /// Write the values in `blob` into `row` of `tid`.
    ///
    /// Entries for properties the table lacks are skipped; columns the blob
    /// does not mention keep their current value. The blob is fully
    /// validated before anything is written, so an error leaves the row
    /// untouched.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::TruncatedBlob`] if an entry is cut short and
    /// [`DbError::UnknownProperty`] if an entry names an unregistered property.
    ///
    /// # Panics
    ///
    /// Panics if `tid` is invalid or `row >= num_rows`.
    pub fn deserialize_instance(&mut self, blob: &Blob, tid: TableId, row: usize) -> Result<(), DbError> {
        let bytes = blob.as_bytes();
        let mut entries = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let id_range = take(bytes, offset, ID_SIZE)?;
            let mut raw = [0u8; ID_SIZE];
            raw.copy_from_slice(&bytes[id_range]);
            let property = PropertyId(u32::from_le_bytes(raw));
            offset += ID_SIZE;

            let size = self
                .registry
                .type_size(property)
                .ok_or(DbError::UnknownProperty(property))? as usize;
            let value = take(bytes, offset, size)?;
            offset = value.end;
            entries.push(Entry { property, value });
        }

        let table = self.table_mut(tid);
        assert!(row < table.num_rows, "row {row} out of bounds ({} rows)", table.num_rows);
        for entry in entries {
            let Some(col) = table.column_index(entry.property) else {
                continue;
            };
            table.columns[col.index()]
                .get_raw_mut(row)
                .copy_from_slice(&bytes[entry.value]);
        }
        Ok(())
    }
}
