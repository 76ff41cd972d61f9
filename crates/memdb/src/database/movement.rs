//! Moving rows between tables and between databases.
//!
//! Duplication copies every destination column that the source also has and
//! default-fills the rest, so copying into a narrower or wider schema is
//! always well defined. Migration is duplication followed by reclaiming the
//! source row, either immediately by erase-swap or later through
//! [`Database::defragment`].

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use super::{Database, TableCreateInfo};
use crate::error::DbError;
use crate::id::TableId;
use crate::table::Table;

fn assert_shared_registry(a: &Database, b: &Database) {
    assert!(
        Arc::ptr_eq(&a.registry, &b.registry),
        "databases must share a type registry"
    );
}

fn assert_rows_in_bounds(table: &Table, rows: &[usize]) {
    for &row in rows {
        assert!(row < table.num_rows, "row {row} out of bounds ({} rows)", table.num_rows);
    }
}

impl Database {
    /// Copy `src_row` of `src` into a new row of `dst`. Returns the new row.
    ///
    /// `src` and `dst` may be the same table.
    ///
    /// # Panics
    ///
    /// Panics if either id is invalid or `src_row` is out of bounds.
    pub fn duplicate_instance(&mut self, src: TableId, src_row: usize, dst: TableId) -> usize {
        if src == dst {
            let table = self.table_mut(src);
            assert_rows_in_bounds(table, &[src_row]);
            let dst_row = table.allocate_row_index();
            for column in &mut table.columns {
                column.copy_within(src_row, dst_row);
            }
            return dst_row;
        }

        let (src_table, dst_table) = self.table_pair_mut(src, dst);
        assert_rows_in_bounds(src_table, &[src_row]);
        let dst_row = dst_table.allocate_row_index();
        dst_table.copy_row_from(dst_row, src_table, src_row);
        dst_row
    }

    /// [`duplicate_instance`](Database::duplicate_instance) into a table of
    /// another database sharing the same registry.
    pub fn duplicate_instance_into(
        &self,
        src: TableId,
        src_row: usize,
        dst_db: &mut Database,
        dst: TableId,
    ) -> usize {
        assert_shared_registry(self, dst_db);
        let src_table = self.table(src);
        assert_rows_in_bounds(src_table, &[src_row]);
        let dst_table = dst_db.table_mut(dst);
        let dst_row = dst_table.allocate_row_index();
        dst_table.copy_row_from(dst_row, src_table, src_row);
        dst_row
    }

    /// Duplicate many rows at once. Returns the destination rows, parallel
    /// to `src_rows`.
    ///
    /// # Panics
    ///
    /// Panics if either id is invalid, the ids are equal, or a row is out of
    /// bounds.
    pub fn duplicate_instances(&mut self, src: TableId, src_rows: &[usize], dst: TableId) -> Vec<usize> {
        let (src_table, dst_table) = self.table_pair_mut(src, dst);
        assert_rows_in_bounds(src_table, src_rows);
        let dst_rows: Vec<usize> = src_rows.iter().map(|_| dst_table.allocate_row_index()).collect();
        dst_table.copy_rows_from(&dst_rows, src_table, src_rows);
        dst_rows
    }

    /// [`duplicate_instances`](Database::duplicate_instances) into another database.
    pub fn duplicate_instances_into(
        &self,
        src: TableId,
        src_rows: &[usize],
        dst_db: &mut Database,
        dst: TableId,
    ) -> Vec<usize> {
        assert_shared_registry(self, dst_db);
        let src_table = self.table(src);
        assert_rows_in_bounds(src_table, src_rows);
        let dst_table = dst_db.table_mut(dst);
        let dst_rows: Vec<usize> = src_rows.iter().map(|_| dst_table.allocate_row_index()).collect();
        dst_table.copy_rows_from(&dst_rows, src_table, src_rows);
        dst_rows
    }

    /// Reclaims a migrated source row.
    fn release_rows(
        &mut self,
        src: TableId,
        src_rows: &[usize],
        defragment: bool,
        move_callback: &mut impl FnMut(usize, usize),
    ) {
        let table = self.table_mut(src);
        for &row in src_rows {
            if defragment {
                let last = table.num_rows - 1;
                if row != last {
                    move_callback(last, row);
                }
                table.erase_swap_index(row);
            } else {
                table.free_row(row);
            }
        }
    }

    /// Move `src_row` of `src` into a new row of `dst`. Returns the new row.
    ///
    /// With `defragment` the source row is erase-swapped away immediately and
    /// `move_callback(last, src_row)` runs first if a row moves; otherwise the
    /// source row is only freed.
    ///
    /// # Panics
    ///
    /// Panics if `src == dst`, either id is invalid or `src_row` is out of bounds.
    pub fn migrate_instance(
        &mut self,
        src: TableId,
        src_row: usize,
        dst: TableId,
        defragment: bool,
        mut move_callback: impl FnMut(usize, usize),
    ) -> usize {
        assert_ne!(src, dst, "cannot migrate an instance into its own table");
        let dst_row = self.duplicate_instance(src, src_row, dst);
        self.release_rows(src, &[src_row], defragment, &mut move_callback);
        dst_row
    }

    /// [`migrate_instance`](Database::migrate_instance) into another database.
    pub fn migrate_instance_into(
        &mut self,
        src: TableId,
        src_row: usize,
        dst_db: &mut Database,
        dst: TableId,
        defragment: bool,
        mut move_callback: impl FnMut(usize, usize),
    ) -> usize {
        let dst_row = self.duplicate_instance_into(src, src_row, dst_db, dst);
        self.release_rows(src, &[src_row], defragment, &mut move_callback);
        dst_row
    }

    /// Migrate many rows at once. Returns the destination rows.
    ///
    /// When defragmenting, rows are erase-swapped in the given order; each
    /// swap changes which row is last, so callers pass rows in an order that
    /// stays valid (descending is always safe).
    pub fn migrate_instances(
        &mut self,
        src: TableId,
        src_rows: &[usize],
        dst: TableId,
        defragment: bool,
        mut move_callback: impl FnMut(usize, usize),
    ) -> Vec<usize> {
        assert_ne!(src, dst, "cannot migrate instances into their own table");
        let dst_rows = self.duplicate_instances(src, src_rows, dst);
        self.release_rows(src, src_rows, defragment, &mut move_callback);
        dst_rows
    }

    /// [`migrate_instances`](Database::migrate_instances) into another database.
    pub fn migrate_instances_into(
        &mut self,
        src: TableId,
        src_rows: &[usize],
        dst_db: &mut Database,
        dst: TableId,
        defragment: bool,
        mut move_callback: impl FnMut(usize, usize),
    ) -> Vec<usize> {
        let dst_rows = self.duplicate_instances_into(src, src_rows, dst_db, dst);
        self.release_rows(src, src_rows, defragment, &mut move_callback);
        dst_rows
    }

    /// Deep-copy every table into `dst`.
    ///
    /// Tables are matched by signature, each destination table at most once;
    /// missing ones are created. A matched destination table is overwritten
    /// with the source's rows, free list, capacity and growth step. No
    /// buffers are shared.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::TableLimitReached`] if `dst` runs out of table slots.
    pub fn copy_to(&self, dst: &mut Database) -> Result<(), DbError> {
        assert_shared_registry(self, dst);

        let mut claimed = HashSet::new();
        for (slot, signature) in self.tables.iter().zip(&self.signatures) {
            let Some(src_table) = slot else {
                continue;
            };

            // Each destination table receives exactly one source table.
            let dst_tid = match dst.find_table_excluding(signature, &claimed) {
                Some(tid) => tid,
                None => dst.create_table(
                    &TableCreateInfo::new(src_table.name.clone())
                        .with_properties(&src_table.properties),
                )?,
            };
            claimed.insert(dst_tid);

            let dst_table = dst.table_mut(dst_tid);
            dst_table.num_rows = src_table.num_rows;
            dst_table.capacity = src_table.capacity;
            dst_table.grow = src_table.grow;
            dst_table.free_ids.clone_from(&src_table.free_ids);
            for column in &mut dst_table.columns {
                match src_table.column(column.property) {
                    Some(src_col) => column.data.clone_from(&src_col.data),
                    None => {
                        column.data.clear();
                        column.resize(src_table.capacity);
                    }
                }
            }

            debug!(
                src = %src_table.tid,
                dst = %dst_tid,
                rows = src_table.num_rows,
                "copied table"
            );
        }
        Ok(())
    }
}
