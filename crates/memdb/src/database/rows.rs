//! Row allocation, freeing and defragmentation.

use tracing::debug;

use super::Database;
use crate::id::TableId;

impl Database {
    /// Allocate a row and reset every column at it to its default.
    ///
    /// The most recently freed hole is reused first; otherwise a row is
    /// appended, growing the table if it is full.
    ///
    /// # Panics
    ///
    /// Panics if `tid` is invalid.
    pub fn allocate_row(&mut self, tid: TableId) -> usize {
        let table = self.table_mut(tid);
        let row = table.allocate_row_index();
        table.set_to_default(row);
        row
    }

    /// Mark `row` as free. The row stays counted in
    /// [`num_rows`](Database::num_rows) until reused or defragmented away.
    ///
    /// # Panics
    ///
    /// Panics if `tid` is invalid, `row >= num_rows` or the row is already free.
    pub fn deallocate_row(&mut self, tid: TableId, row: usize) {
        self.table_mut(tid).free_row(row);
    }

    /// Reset every column at `row` to its default, leaving liveness alone.
    ///
    /// # Panics
    ///
    /// Panics if `tid` is invalid or `row >= num_rows`.
    pub fn set_to_default(&mut self, tid: TableId, row: usize) {
        let table = self.table_mut(tid);
        assert!(row < table.num_rows, "row {row} out of bounds ({} rows)", table.num_rows);
        table.set_to_default(row);
    }

    /// Physically remove every freed row by erase-swap, largest first.
    ///
    /// `move_callback(from, to)` runs before each swap that moves a row, so
    /// external row maps can follow. Free ids already past the end of the
    /// table are skipped. Returns the number of rows erased.
    ///
    /// # Panics
    ///
    /// Panics if `tid` is invalid.
    pub fn defragment(&mut self, tid: TableId, mut move_callback: impl FnMut(usize, usize)) -> usize {
        let table = self.table_mut(tid);
        let mut num_erased = 0;

        while let Some(row) = table.free_ids.pop() {
            if row >= table.num_rows {
                continue;
            }
            let last = table.num_rows - 1;
            if row != last {
                move_callback(last, row);
            }
            table.erase_swap_index(row);
            num_erased += 1;
        }

        if num_erased > 0 {
            debug!(table = %tid, num_erased, num_rows = table.num_rows, "defragmented table");
        }
        num_erased
    }

    /// Drop every row of a table, keeping its buffers. Invalid ids are ignored.
    pub fn clean(&mut self, tid: TableId) {
        if !self.is_valid(tid) {
            return;
        }
        self.table_mut(tid).clean();
    }

    /// [`clean`](Database::clean) every table.
    pub fn reset(&mut self) {
        for table in self.tables.iter_mut().flatten() {
            table.clean();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::TableCreateInfo;
    use super::super::tests::{read_u32, setup, small, write_u32};

    #[test]
    fn test_allocate_first_row() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_properties(&[p.a, p.b])).unwrap();
        assert_eq!(db.allocate_row(tid), 0);
        assert_eq!(db.num_rows(tid), 1);
        assert_eq!(read_u32(&db, tid, p.a, 0), 1);
        assert_eq!(db.get::<u64>(tid, p.b, 0).unwrap(), 2);
    }

    #[test]
    fn test_lifo_reuse_and_redefault() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_property(p.a)).unwrap();
        let r0 = db.allocate_row(tid);
        let r1 = db.allocate_row(tid);
        let r2 = db.allocate_row(tid);
        write_u32(&mut db, tid, p.a, r0, 50);
        db.deallocate_row(tid, r0);
        db.deallocate_row(tid, r2);
        db.deallocate_row(tid, r1);
        assert_eq!(db.free_rows(tid), &[0, 1, 2]);
        assert_eq!(db.num_rows(tid), 3);

        // Largest freed row comes back first, regardless of free order.
        assert_eq!(db.allocate_row(tid), 2);
        assert_eq!(db.allocate_row(tid), 1);
        assert_eq!(db.allocate_row(tid), 0);
        assert_eq!(read_u32(&db, tid, p.a, 0), 1);
        assert_eq!(db.allocate_row(tid), 3);
    }

    #[test]
    fn test_dealloc_then_alloc_same_row() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_property(p.a)).unwrap();
        db.allocate_row(tid);
        db.allocate_row(tid);
        db.deallocate_row(tid, 0);
        assert_eq!(db.allocate_row(tid), 0);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_deallocate_out_of_bounds() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_property(p.a)).unwrap();
        db.allocate_row(tid);
        db.deallocate_row(tid, 1);
    }

    #[test]
    fn test_growth_keeps_values() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_property(p.a)).unwrap();
        for i in 0..5 {
            let row = db.allocate_row(tid);
            write_u32(&mut db, tid, p.a, row, i * 10);
        }
        assert_eq!(db.capacity(tid), 8);
        for i in 0..5 {
            assert_eq!(read_u32(&db, tid, p.a, i as usize), i * 10);
        }
    }

    #[test]
    fn test_set_to_default() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_property(p.a)).unwrap();
        let row = db.allocate_row(tid);
        write_u32(&mut db, tid, p.a, row, 9);
        db.set_to_default(tid, row);
        assert_eq!(read_u32(&db, tid, p.a, row), 1);
        assert_eq!(db.num_rows(tid), 1);
    }

    #[test]
    fn test_defragment_two_holes() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_property(p.a)).unwrap();
        for i in 0..5 {
            let row = db.allocate_row(tid);
            write_u32(&mut db, tid, p.a, row, 100 + i);
        }
        db.deallocate_row(tid, 1);
        db.deallocate_row(tid, 3);

        let mut moves = Vec::new();
        let erased = db.defragment(tid, |from, to| moves.push((from, to)));
        assert_eq!(erased, 2);
        assert_eq!(moves, vec![(4, 3), (3, 1)]);
        assert_eq!(db.num_rows(tid), 3);
        assert!(db.free_rows(tid).is_empty());
        assert_eq!(read_u32(&db, tid, p.a, 0), 100);
        assert_eq!(read_u32(&db, tid, p.a, 1), 104);
        assert_eq!(read_u32(&db, tid, p.a, 2), 102);
    }

    #[test]
    fn test_defragment_trailing_holes_do_not_move() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_property(p.a)).unwrap();
        for _ in 0..4 {
            db.allocate_row(tid);
        }
        db.deallocate_row(tid, 2);
        db.deallocate_row(tid, 3);
        let mut calls = 0;
        assert_eq!(db.defragment(tid, |_, _| calls += 1), 2);
        assert_eq!(calls, 0);
        assert_eq!(db.num_rows(tid), 2);
    }

    #[test]
    fn test_defragment_skips_consumed_free_id() {
        let (mut db, p) = setup(small());
        let src = db.create_table(&TableCreateInfo::new("src").with_property(p.a)).unwrap();
        let dst = db.create_table(&TableCreateInfo::new("dst").with_property(p.a)).unwrap();
        for _ in 0..3 {
            db.allocate_row(src);
        }
        db.deallocate_row(src, 2);
        // Erase-swapping row 0 pulls the hole at row 2 down and shrinks the table.
        db.migrate_instance(src, 0, dst, true, |_, _| {});
        assert_eq!(db.num_rows(src), 2);
        assert_eq!(db.defragment(src, |_, _| {}), 0);
        assert!(db.free_rows(src).is_empty());
    }

    #[test]
    fn test_clean_and_reset() {
        let (mut db, p) = setup(small());
        let t1 = db.create_table(&TableCreateInfo::new("1").with_property(p.a)).unwrap();
        let t2 = db.create_table(&TableCreateInfo::new("2").with_property(p.b)).unwrap();
        for _ in 0..3 {
            db.allocate_row(t1);
            db.allocate_row(t2);
        }
        db.deallocate_row(t1, 0);
        db.clean(t1);
        assert_eq!(db.num_rows(t1), 0);
        assert!(db.free_rows(t1).is_empty());
        assert_eq!(db.capacity(t1), 4);
        assert_eq!(db.num_rows(t2), 3);

        db.reset();
        assert_eq!(db.num_rows(t2), 0);

        db.delete_table(t1);
        db.clean(t1);
    }
}
