//! Table storage: one schema, one raw byte buffer per sized property.
//!
//! A [`Table`] is only ever mutated through the [`Database`](crate::Database)
//! that owns it. Every column buffer holds `capacity` slots; rows
//! `[0, num_rows)` are potentially live and `free_ids` lists the holes among
//! them that are waiting for reuse or defragmentation.

use std::collections::HashMap;
use std::sync::Arc;

use memdb_property::{PropertyDescription, PropertyId};
use tracing::trace;

use crate::id::{ColumnIndex, TableId};

/// A column storing values of a single property type.
///
/// Values are stored as raw bytes, `item_size` bytes per row, laid out
/// contiguously. The buffer always spans the table's full capacity.
#[derive(Debug, Clone)]
pub(crate) struct Column {
    /// The property stored in this column.
    pub(crate) property: PropertyId,
    /// Size of a single value in bytes. Never zero.
    pub(crate) item_size: usize,
    /// Bytes written into a slot when it is (re)initialised.
    pub(crate) default: Arc<[u8]>,
    /// Raw byte storage. Length is always `item_size * capacity`.
    pub(crate) data: Vec<u8>,
}

impl Column {
    /// Create a column with `capacity` slots, every one set to the default.
    #[must_use]
    pub(crate) fn new(property: PropertyId, desc: &PropertyDescription, capacity: usize) -> Self {
        debug_assert!(desc.type_size > 0, "tag properties have no column");
        let mut column = Self {
            property,
            item_size: desc.type_size as usize,
            default: Arc::clone(&desc.default_value),
            data: Vec::new(),
        };
        column.resize(capacity);
        column
    }

    /// Number of slots the buffer holds.
    #[must_use]
    pub(crate) fn capacity(&self) -> usize {
        self.data.len() / self.item_size
    }

    /// Resizes the buffer to `capacity` slots. New slots receive the default.
    pub(crate) fn resize(&mut self, capacity: usize) {
        let old = self.capacity();
        self.data.resize(capacity * self.item_size, 0);
        for row in old..capacity {
            self.write_default(row);
        }
    }

    fn range(&self, row: usize) -> std::ops::Range<usize> {
        let start = row * self.item_size;
        start..start + self.item_size
    }

    /// Raw bytes of the value at `row`.
    #[must_use]
    pub(crate) fn get_raw(&self, row: usize) -> &[u8] {
        &self.data[self.range(row)]
    }

    /// Mutable raw bytes of the value at `row`.
    #[must_use]
    pub(crate) fn get_raw_mut(&mut self, row: usize) -> &mut [u8] {
        let range = self.range(row);
        &mut self.data[range]
    }

    /// Resets the value at `row` to the property default.
    pub(crate) fn write_default(&mut self, row: usize) {
        let range = self.range(row);
        self.data[range].copy_from_slice(&self.default);
    }

    /// Copies the value at `from` over the value at `to`.
    pub(crate) fn copy_within(&mut self, from: usize, to: usize) {
        let src = self.range(from);
        self.data.copy_within(src, to * self.item_size);
    }
}

/// One schema-homogeneous block of columnar storage.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    /// Handle of the slot this table lives in.
    pub(crate) tid: TableId,
    /// Debug name given at creation.
    pub(crate) name: String,
    /// Every property of the table, tags included, in the order added.
    pub(crate) properties: Vec<PropertyId>,
    /// Buffers for the sized properties, in the order added.
    pub(crate) columns: Vec<Column>,
    /// Property → column lookup.
    pub(crate) column_registry: HashMap<PropertyId, ColumnIndex>,
    /// Logical row count, holes included.
    pub(crate) num_rows: usize,
    /// Allocated slots per column.
    pub(crate) capacity: usize,
    /// Capacity added by the next growth.
    pub(crate) grow: usize,
    /// Dead rows below `num_rows`, sorted ascending.
    pub(crate) free_ids: Vec<usize>,
}

impl Table {
    /// Create an empty table with no columns.
    #[must_use]
    pub(crate) fn new(tid: TableId, name: impl Into<String>, capacity: usize, grow: usize) -> Self {
        Self {
            tid,
            name: name.into(),
            properties: Vec::new(),
            columns: Vec::new(),
            column_registry: HashMap::new(),
            num_rows: 0,
            capacity,
            grow: grow.max(1),
            free_ids: Vec::new(),
        }
    }

    /// Returns the column index of `property`, if it has a buffer here.
    #[must_use]
    pub(crate) fn column_index(&self, property: PropertyId) -> Option<ColumnIndex> {
        self.column_registry.get(&property).copied()
    }

    /// Returns the column holding `property`, if any.
    #[must_use]
    pub(crate) fn column(&self, property: PropertyId) -> Option<&Column> {
        self.column_index(property).map(|col| &self.columns[col.index()])
    }

    /// Appends `property` to the schema, allocating a buffer if it is sized.
    ///
    /// The caller has already checked for duplicates.
    pub(crate) fn add_column(&mut self, property: PropertyId, desc: &PropertyDescription) -> Option<ColumnIndex> {
        self.properties.push(property);
        if desc.is_tag() {
            return None;
        }

        let col = ColumnIndex(self.columns.len() as u32);
        self.columns.push(Column::new(property, desc, self.capacity));
        self.column_registry.insert(property, col);
        Some(col)
    }

    /// Grows every column by the current step and doubles the step.
    pub(crate) fn grow(&mut self) {
        let old_capacity = self.capacity;
        self.capacity += self.grow;
        self.grow *= 2;
        for column in &mut self.columns {
            column.resize(self.capacity);
        }
        trace!(
            table = %self.tid,
            old_capacity,
            new_capacity = self.capacity,
            next_grow = self.grow,
            "grew table"
        );
    }

    /// Returns a row slot: the most recently freed hole if any, else a new
    /// row at the end. Values in the slot are left untouched.
    pub(crate) fn allocate_row_index(&mut self) -> usize {
        if let Some(row) = self.free_ids.pop() {
            return row;
        }

        let row = self.num_rows;
        if row >= self.capacity {
            self.grow();
        }
        self.num_rows += 1;
        row
    }

    /// Records `row` as a hole, keeping `free_ids` sorted.
    pub(crate) fn free_row(&mut self, row: usize) {
        assert!(row < self.num_rows, "row {row} out of bounds ({} rows)", self.num_rows);
        match self.free_ids.binary_search(&row) {
            Ok(_) => panic!("row {row} deallocated twice"),
            Err(pos) => self.free_ids.insert(pos, row),
        }
    }

    /// Resets every column at `row` to its default.
    pub(crate) fn set_to_default(&mut self, row: usize) {
        for column in &mut self.columns {
            column.write_default(row);
        }
    }

    /// Moves the last row into `row` and shrinks the row count by one.
    ///
    /// Any external reference to the old last row is invalidated.
    pub(crate) fn erase_swap_index(&mut self, row: usize) {
        assert!(row < self.num_rows, "row {row} out of bounds ({} rows)", self.num_rows);
        let end = self.num_rows - 1;
        if row != end {
            for column in &mut self.columns {
                column.copy_within(end, row);
            }
        }
        self.num_rows -= 1;
    }

    /// Empties the table without releasing its buffers.
    pub(crate) fn clean(&mut self) {
        self.num_rows = 0;
        self.free_ids.clear();
    }

    /// Writes `src_row` of `src` into `dst_row` of this table.
    ///
    /// Columns this table has but `src` lacks receive their default; columns
    /// only `src` has are dropped.
    pub(crate) fn copy_row_from(&mut self, dst_row: usize, src: &Table, src_row: usize) {
        for column in &mut self.columns {
            match src.column(column.property) {
                Some(src_col) => column
                    .get_raw_mut(dst_row)
                    .copy_from_slice(src_col.get_raw(src_row)),
                None => column.write_default(dst_row),
            }
        }
    }

    /// Batched [`Table::copy_row_from`], column-major.
    pub(crate) fn copy_rows_from(&mut self, dst_rows: &[usize], src: &Table, src_rows: &[usize]) {
        debug_assert_eq!(dst_rows.len(), src_rows.len());
        for column in &mut self.columns {
            match src.column(column.property) {
                Some(src_col) => {
                    for (&dst_row, &src_row) in dst_rows.iter().zip(src_rows) {
                        column
                            .get_raw_mut(dst_row)
                            .copy_from_slice(src_col.get_raw(src_row));
                    }
                }
                None => {
                    for &dst_row in dst_rows {
                        column.write_default(dst_row);
                    }
                }
            }
        }
    }
}
