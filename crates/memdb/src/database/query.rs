//! Signature-filtered table scans.

use super::Database;
use crate::dataset::{Dataset, FilterSet, View};
use crate::id::TableId;
use crate::signature::TableSignature;

impl Database {
    fn matching_tables<'a>(&'a self, filter: &'a FilterSet) -> impl Iterator<Item = TableId> + 'a {
        self.tables
            .iter()
            .zip(&self.signatures)
            .filter_map(move |(slot, signature)| match slot {
                Some(table) if filter.matches(signature) => Some(table.tid),
                _ => None,
            })
    }

    /// Collect a view of every non-empty table matching `filter`, in slot order.
    ///
    /// Each view resolves a column for every requested property the table
    /// stores; tags and other column-less properties are skipped.
    #[must_use]
    pub fn query(&self, filter: &FilterSet) -> Dataset {
        let views = self
            .matching_tables(filter)
            .filter_map(|tid| {
                let table = self.table(tid);
                if table.num_rows == 0 {
                    return None;
                }
                let columns = filter
                    .property_ids()
                    .iter()
                    .filter_map(|&p| table.column_index(p).map(|col| (p, col)))
                    .collect();
                Some(View {
                    tid,
                    num_instances: table.num_rows,
                    columns,
                })
            })
            .collect();
        Dataset { views }
    }

    /// Ids of every table matching the signatures, empty tables included.
    #[must_use]
    pub fn query_tables(&self, inclusive: &TableSignature, exclusive: &TableSignature) -> Vec<TableId> {
        let filter = FilterSet::from_signatures(inclusive.clone(), exclusive.clone());
        self.matching_tables(&filter).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{read_u32, setup, small, write_u32};
    use super::super::TableCreateInfo;
    use super::*;

    #[test]
    fn test_query_superset_tables() {
        let (mut db, p) = setup(small());
        let ab = db.create_table(&TableCreateInfo::new("ab").with_properties(&[p.a, p.b])).unwrap();
        let abc = db
            .create_table(&TableCreateInfo::new("abc").with_properties(&[p.a, p.b, p.c]))
            .unwrap();
        let a = db.create_table(&TableCreateInfo::new("a").with_property(p.a)).unwrap();
        for tid in [ab, abc, a] {
            db.allocate_row(tid);
        }

        let dataset = db.query(&FilterSet::new().with(p.a).with(p.b));
        let tids: Vec<TableId> = dataset.views().iter().map(|v| v.tid).collect();
        assert_eq!(tids, vec![ab, abc]);
        assert_eq!(dataset.views()[1].columns.len(), 2);
        assert_eq!(dataset.total_instances(), 2);
    }

    #[test]
    fn test_query_exclusion() {
        let (mut db, p) = setup(small());
        let ab = db.create_table(&TableCreateInfo::new("ab").with_properties(&[p.a, p.b])).unwrap();
        let abt = db
            .create_table(&TableCreateInfo::new("abt").with_properties(&[p.a, p.b, p.tag]))
            .unwrap();
        db.allocate_row(ab);
        db.allocate_row(abt);

        let dataset = db.query(&FilterSet::new().with(p.a).without(p.tag));
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.views()[0].tid, ab);
    }

    #[test]
    fn test_query_skips_empty_tables() {
        let (mut db, p) = setup(small());
        let empty = db.create_table(&TableCreateInfo::new("empty").with_property(p.a)).unwrap();
        let full = db.create_table(&TableCreateInfo::new("full").with_properties(&[p.a, p.c])).unwrap();
        db.allocate_row(full);

        let dataset = db.query(&FilterSet::new().with(p.a));
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.views()[0].tid, full);

        let tids = db.query_tables(&TableSignature::from_properties(&[p.a]), &TableSignature::new());
        assert_eq!(tids, vec![empty, full]);
    }

    #[test]
    fn test_query_tag_has_no_buffer() {
        let (mut db, p) = setup(small());
        let tid = db
            .create_table(&TableCreateInfo::new("t").with_properties(&[p.a, p.tag]))
            .unwrap();
        db.allocate_row(tid);

        let dataset = db.query(&FilterSet::new().with(p.tag).with(p.a));
        let view = &dataset.views()[0];
        assert_eq!(view.columns.len(), 1);
        assert_eq!(view.column_of(p.a), db.column_index(tid, p.a));
        assert_eq!(view.column_of(p.tag), None);
    }

    #[test]
    fn test_empty_filter_matches_nothing() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_property(p.a)).unwrap();
        db.allocate_row(tid);
        assert!(db.query(&FilterSet::new()).is_empty());
    }

    #[test]
    fn test_view_buffers_read_and_write() {
        let (mut db, p) = setup(small());
        let tid = db.create_table(&TableCreateInfo::new("t").with_properties(&[p.c, p.a])).unwrap();
        for i in 0..3 {
            let row = db.allocate_row(tid);
            write_u32(&mut db, tid, p.a, row, i);
        }

        let dataset = db.query(&FilterSet::new().with(p.a));
        for view in &dataset {
            for chunk in view.buffer_mut(&mut db, 0).chunks_exact_mut(4) {
                let v: u32 = bytemuck::pod_read_unaligned(chunk);
                chunk.copy_from_slice(&(v + 10).to_le_bytes());
            }
        }
        let view = &dataset.views()[0];
        assert_eq!(view.buffer(&db, 0).len(), 12);
        assert_eq!(read_u32(&db, tid, p.a, 2), 12);
    }

    #[test]
    fn test_validate_after_delete_and_growth() {
        let (mut db, p) = setup(small());
        let t1 = db.create_table(&TableCreateInfo::new("1").with_property(p.a)).unwrap();
        let t2 = db.create_table(&TableCreateInfo::new("2").with_properties(&[p.a, p.b])).unwrap();
        db.allocate_row(t1);
        db.allocate_row(t2);

        let mut dataset = db.query(&FilterSet::new().with(p.a));
        assert_eq!(dataset.len(), 2);

        db.delete_table(t1);
        for _ in 0..4 {
            db.allocate_row(t2);
        }
        dataset.validate(&db);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.views()[0].tid, t2);
        assert_eq!(dataset.views()[0].num_instances, 5);
        assert_eq!(dataset.views()[0].buffer(&db, 0).len(), 20);
    }

    #[test]
    fn test_buffer_of_ignores_tag_position() {
        let (mut db, p) = setup(small());
        let tid = db
            .create_table(&TableCreateInfo::new("t").with_properties(&[p.tag, p.c, p.a]))
            .unwrap();
        let row = db.allocate_row(tid);
        write_u32(&mut db, tid, p.a, row, 41);

        // The tag is requested first but resolves to no column.
        let dataset = db.query(&FilterSet::new().with(p.tag).with(p.c).with(p.a));
        let view = &dataset.views()[0];
        assert!(view.buffer_of(&db, p.tag).is_none());
        assert_eq!(view.buffer_of(&db, p.c).unwrap(), &3u16.to_le_bytes());
        assert_eq!(view.buffer_of(&db, p.a).unwrap(), &41u32.to_le_bytes());

        view.buffer_of_mut(&mut db, p.a)
            .unwrap()
            .copy_from_slice(&42u32.to_le_bytes());
        assert_eq!(read_u32(&db, tid, p.a, row), 42);
    }
}
