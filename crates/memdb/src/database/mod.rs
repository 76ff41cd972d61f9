//! The database: owner of every table, signature and column buffer.
//!
//! Table slots live in a bounded array indexed by [`TableId::index`]; an
//! id pool hands out generation-checked ids for them. All row and column
//! mutation goes through [`Database`]. Operations are split by concern:
//!
//! - this module: table lifecycle, column registration, introspection and
//!   raw/typed value access,
//! - [`rows`]: row allocation, freeing and defragmentation,
//! - [`movement`]: duplication and migration between tables and databases,
//! - [`serialize`]: self-describing per-row blobs,
//! - [`query`]: signature-filtered table scans.
//!
//! The database performs no locking. Callers must not add rows to a table
//! while holding a [`Dataset`](crate::Dataset) over it that they intend to
//! keep using.

mod movement;
mod query;
mod rows;
mod serialize;

use std::collections::HashSet;
use std::sync::Arc;

use memdb_property::{PropertyId, TypeRegistry};
use tracing::{debug, warn};

use crate::config::DatabaseConfig;
use crate::error::DbError;
use crate::id::{ColumnIndex, IdPool, TableId};
use crate::signature::TableSignature;
use crate::table::Table;

pub use serialize::Blob;

/// Parameters for [`Database::create_table`].
#[derive(Debug, Clone, Default)]
pub struct TableCreateInfo {
    /// Debug name of the table.
    pub name: String,
    /// Initial properties, in column order.
    pub properties: Vec<PropertyId>,
}

impl TableCreateInfo {
    /// Create an empty table description.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Append a property.
    #[must_use]
    pub fn with_property(mut self, property: PropertyId) -> Self {
        self.properties.push(property);
        self
    }

    /// Append several properties.
    #[must_use]
    pub fn with_properties(mut self, properties: &[PropertyId]) -> Self {
        self.properties.extend_from_slice(properties);
        self
    }
}

/// In-memory columnar table store.
#[derive(Debug)]
pub struct Database {
    config: DatabaseConfig,
    registry: Arc<TypeRegistry>,
    /// Table slots; `None` once deleted. Length is the scan high-water mark.
    tables: Vec<Option<Table>>,
    /// Signature of each slot, meaningful only while the slot is live.
    signatures: Vec<TableSignature>,
    pool: IdPool,
}

fn lookup<'a>(tables: &'a [Option<Table>], pool: &IdPool, tid: TableId) -> &'a Table {
    match tables.get(tid.slot()).and_then(Option::as_ref) {
        Some(table) if pool.is_valid(tid) => table,
        _ => panic!("invalid table id {tid}"),
    }
}

fn lookup_mut<'a>(tables: &'a mut [Option<Table>], pool: &IdPool, tid: TableId) -> &'a mut Table {
    match tables.get_mut(tid.slot()).and_then(Option::as_mut) {
        Some(table) if pool.is_valid(tid) => table,
        _ => panic!("invalid table id {tid}"),
    }
}

impl Database {
    /// Create an empty database over a fully populated registry.
    #[must_use]
    pub fn new(config: DatabaseConfig, registry: Arc<TypeRegistry>) -> Self {
        Self {
            tables: Vec::with_capacity(config.max_tables),
            signatures: Vec::with_capacity(config.max_tables),
            pool: IdPool::new(config.max_tables),
            config,
            registry,
        }
    }

    /// The registry this database resolves property sizes against.
    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// The configuration this database was created with.
    #[must_use]
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub(crate) fn table(&self, tid: TableId) -> &Table {
        lookup(&self.tables, &self.pool, tid)
    }

    pub(crate) fn table_mut(&mut self, tid: TableId) -> &mut Table {
        lookup_mut(&mut self.tables, &self.pool, tid)
    }

    /// Borrows two distinct tables of this database at once.
    pub(crate) fn table_pair_mut(&mut self, src: TableId, dst: TableId) -> (&Table, &mut Table) {
        assert!(self.pool.is_valid(src), "invalid table id {src}");
        assert!(self.pool.is_valid(dst), "invalid table id {dst}");
        assert_ne!(src.slot(), dst.slot(), "source and destination are the same table");

        let (src_slot, dst_slot) = if src.slot() < dst.slot() {
            let (lo, hi) = self.tables.split_at_mut(dst.slot());
            (&lo[src.slot()], &mut hi[0])
        } else {
            let (lo, hi) = self.tables.split_at_mut(src.slot());
            (&hi[0], &mut lo[dst.slot()])
        };
        match (src_slot.as_ref(), dst_slot.as_mut()) {
            (Some(src_table), Some(dst_table)) => (src_table, dst_table),
            _ => panic!("table slot empty for live id"),
        }
    }

    // -- Table lifecycle --

    /// Create a table with one column per sized property in `info`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::UnknownProperty`] if a property is missing from the
    /// registry and [`DbError::TableLimitReached`] if every slot is taken.
    pub fn create_table(&mut self, info: &TableCreateInfo) -> Result<TableId, DbError> {
        if let Some(&missing) = info
            .properties
            .iter()
            .find(|&&p| self.registry.get_description(p).is_none())
        {
            return Err(DbError::UnknownProperty(missing));
        }

        let tid = self.pool.allocate().ok_or(DbError::TableLimitReached {
            max: self.config.max_tables,
        })?;

        let table = Table::new(
            tid,
            info.name.clone(),
            self.config.initial_capacity as usize,
            self.config.initial_grow as usize,
        );
        if tid.slot() == self.tables.len() {
            self.tables.push(Some(table));
            self.signatures.push(TableSignature::new());
        } else {
            self.tables[tid.slot()] = Some(table);
            self.signatures[tid.slot()] = TableSignature::new();
        }

        for &property in &info.properties {
            self.add_column(tid, property, true);
        }

        debug!(
            table = %tid,
            name = %info.name,
            properties = self.signatures[tid.slot()].count(),
            slots = self.pool.high_water(),
            "created table"
        );
        Ok(tid)
    }

    /// Delete a table and free its buffers. Invalid ids are ignored.
    pub fn delete_table(&mut self, tid: TableId) {
        if !self.pool.deallocate(tid) {
            debug!(table = %tid, "delete of invalid table ignored");
            return;
        }
        self.tables[tid.slot()] = None;
        self.signatures[tid.slot()] = TableSignature::new();
        debug!(table = %tid, "deleted table");
    }

    /// Returns `true` if `tid` refers to a live table of this database.
    #[must_use]
    pub fn is_valid(&self, tid: TableId) -> bool {
        self.pool.is_valid(tid)
    }

    /// Returns the first live table whose signature equals `signature`.
    #[must_use]
    pub fn find_table(&self, signature: &TableSignature) -> Option<TableId> {
        self.find_table_excluding(signature, &HashSet::new())
    }

    /// [`find_table`](Database::find_table), skipping the tables in `claimed`.
    pub(crate) fn find_table_excluding(
        &self,
        signature: &TableSignature,
        claimed: &HashSet<TableId>,
    ) -> Option<TableId> {
        if !signature.is_valid() {
            return None;
        }
        self.tables
            .iter()
            .zip(&self.signatures)
            .find_map(|(slot, sig)| match slot {
                Some(table) if sig == signature && !claimed.contains(&table.tid) => Some(table.tid),
                _ => None,
            })
    }

    /// Add `property` to a table.
    ///
    /// Adding a property the table already has logs a warning and returns the
    /// existing column. Zero-size (tag) properties only touch the schema and
    /// signature and return `None`.
    ///
    /// # Panics
    ///
    /// Panics if `tid` is invalid or `property` is not registered.
    pub fn add_column(
        &mut self,
        tid: TableId,
        property: PropertyId,
        update_signature: bool,
    ) -> Option<ColumnIndex> {
        let table = lookup_mut(&mut self.tables, &self.pool, tid);
        if table.properties.contains(&property) {
            warn!(
                table = %tid,
                %property,
                "adding multiple columns of the same property is not supported; keeping one column"
            );
            return table.column_index(property);
        }

        let Some(desc) = self.registry.get_description(property) else {
            panic!("property {property} is not registered");
        };

        if update_signature {
            let signature = &mut self.signatures[tid.slot()];
            debug_assert!(!signature.is_set(property));
            signature.flip_bit(property);
        }
        table.add_column(property, desc)
    }

    // -- Introspection --

    /// Returns `true` if the table's signature includes `property`.
    #[must_use]
    pub fn has_property(&self, tid: TableId, property: PropertyId) -> bool {
        assert!(self.is_valid(tid), "invalid table id {tid}");
        self.signatures[tid.slot()].is_set(property)
    }

    /// The table's signature.
    #[must_use]
    pub fn signature(&self, tid: TableId) -> &TableSignature {
        assert!(self.is_valid(tid), "invalid table id {tid}");
        &self.signatures[tid.slot()]
    }

    /// All properties of the table, tags included, in the order added.
    #[must_use]
    pub fn properties(&self, tid: TableId) -> &[PropertyId] {
        &self.table(tid).properties
    }

    /// `(column, property)` pairs of the table's buffers.
    pub fn columns(&self, tid: TableId) -> impl Iterator<Item = (ColumnIndex, PropertyId)> + '_ {
        self.table(tid)
            .columns
            .iter()
            .enumerate()
            .map(|(i, col)| (ColumnIndex(i as u32), col.property))
    }

    /// Number of column buffers (tags excluded).
    #[must_use]
    pub fn num_columns(&self, tid: TableId) -> usize {
        self.table(tid).columns.len()
    }

    /// Column holding `property`, if the table has a buffer for it.
    #[must_use]
    pub fn column_index(&self, tid: TableId, property: PropertyId) -> Option<ColumnIndex> {
        self.table(tid).column_index(property)
    }

    /// Property stored in `col`.
    #[must_use]
    pub fn property_of(&self, tid: TableId, col: ColumnIndex) -> PropertyId {
        self.table(tid).columns[col.index()].property
    }

    /// Logical row count, holes included.
    #[must_use]
    pub fn num_rows(&self, tid: TableId) -> usize {
        self.table(tid).num_rows
    }

    /// Allocated row slots per column.
    #[must_use]
    pub fn capacity(&self, tid: TableId) -> usize {
        self.table(tid).capacity
    }

    /// Rows freed but not yet reused or reclaimed, ascending.
    #[must_use]
    pub fn free_rows(&self, tid: TableId) -> &[usize] {
        &self.table(tid).free_ids
    }

    /// Debug name of the table.
    #[must_use]
    pub fn table_name(&self, tid: TableId) -> &str {
        &self.table(tid).name
    }

    /// Number of live tables.
    #[must_use]
    pub fn num_tables(&self) -> usize {
        self.pool.live_count()
    }

    /// Calls `f` for every live table in slot order.
    pub fn for_each_table(&self, mut f: impl FnMut(TableId)) {
        for table in self.tables.iter().flatten() {
            f(table.tid);
        }
    }

    // -- Value access --

    /// Bytes of rows `[0, num_rows)` of a column.
    ///
    /// The slice is invalidated by any row allocation on the table.
    #[must_use]
    pub fn column_bytes(&self, tid: TableId, col: ColumnIndex) -> &[u8] {
        let table = self.table(tid);
        let column = &table.columns[col.index()];
        &column.data[..table.num_rows * column.item_size]
    }

    /// Mutable bytes of rows `[0, num_rows)` of a column.
    #[must_use]
    pub fn column_bytes_mut(&mut self, tid: TableId, col: ColumnIndex) -> &mut [u8] {
        let table = self.table_mut(tid);
        let len = table.num_rows * table.columns[col.index()].item_size;
        &mut table.columns[col.index()].data[..len]
    }

    /// Bytes of one value.
    #[must_use]
    pub fn value_bytes(&self, tid: TableId, col: ColumnIndex, row: usize) -> &[u8] {
        let table = self.table(tid);
        assert!(row < table.num_rows, "row {row} out of bounds ({} rows)", table.num_rows);
        table.columns[col.index()].get_raw(row)
    }

    /// Mutable bytes of one value.
    #[must_use]
    pub fn value_bytes_mut(&mut self, tid: TableId, col: ColumnIndex, row: usize) -> &mut [u8] {
        let table = self.table_mut(tid);
        assert!(row < table.num_rows, "row {row} out of bounds ({} rows)", table.num_rows);
        table.columns[col.index()].get_raw_mut(row)
    }

    fn typed_column(&self, tid: TableId, property: PropertyId, size: usize) -> Result<ColumnIndex, DbError> {
        let table = self.table(tid);
        let col = table
            .column_index(property)
            .ok_or(DbError::NoColumn { property })?;
        let expected = table.columns[col.index()].item_size;
        if expected != size {
            return Err(DbError::TypeSizeMismatch {
                property,
                expected,
                actual: size,
            });
        }
        Ok(col)
    }

    /// Reads the `T` stored for `property` at `row`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NoColumn`] if the table has no buffer for
    /// `property` and [`DbError::TypeSizeMismatch`] if `T` is the wrong size.
    pub fn get<T: bytemuck::Pod>(&self, tid: TableId, property: PropertyId, row: usize) -> Result<T, DbError> {
        let col = self.typed_column(tid, property, std::mem::size_of::<T>())?;
        Ok(bytemuck::pod_read_unaligned(self.value_bytes(tid, col, row)))
    }

    /// Writes `value` for `property` at `row`.
    ///
    /// # Errors
    ///
    /// Same as [`Database::get`].
    pub fn set<T: bytemuck::Pod>(
        &mut self,
        tid: TableId,
        property: PropertyId,
        row: usize,
        value: &T,
    ) -> Result<(), DbError> {
        let col = self.typed_column(tid, property, std::mem::size_of::<T>())?;
        self.value_bytes_mut(tid, col, row)
            .copy_from_slice(bytemuck::bytes_of(value));
        Ok(())
    }
}
