//! Query filters and their materialised results.
//!
//! A [`FilterSet`] says which tables a query wants: tables carrying every
//! inclusive property and none of the exclusive ones. Running it through
//! [`Database::query`](crate::Database::query) yields a [`Dataset`] with one
//! [`View`] per matching non-empty table.
//!
//! Views do not borrow the database. They name the columns to read and the
//! row count seen at query time; the buffers themselves are resolved through
//! the database on access. A dataset goes stale once a table it references
//! is deleted or changes size, and [`Dataset::validate`] brings it back in
//! line.

use memdb_property::PropertyId;

use crate::database::Database;
use crate::id::{ColumnIndex, TableId};
use crate::signature::TableSignature;

/// Inclusion/exclusion filter plus the properties whose buffers to resolve.
#[derive(Debug, Clone, Default)]
pub struct FilterSet {
    inclusive: TableSignature,
    exclusive: TableSignature,
    properties: Vec<PropertyId>,
}

impl FilterSet {
    /// Create an empty filter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from explicit lists. Buffers are resolved for every inclusive
    /// property, in order.
    #[must_use]
    pub fn from_lists(inclusive: &[PropertyId], exclusive: &[PropertyId]) -> Self {
        Self {
            inclusive: TableSignature::from_properties(inclusive),
            exclusive: TableSignature::from_properties(exclusive),
            properties: inclusive.to_vec(),
        }
    }

    /// Build from prepared signatures. No buffers are resolved.
    #[must_use]
    pub fn from_signatures(inclusive: TableSignature, exclusive: TableSignature) -> Self {
        Self {
            inclusive,
            exclusive,
            properties: Vec::new(),
        }
    }

    /// Require `property` and resolve its buffer.
    #[must_use]
    pub fn with(mut self, property: PropertyId) -> Self {
        self.inclusive.set(property);
        if !self.properties.contains(&property) {
            self.properties.push(property);
        }
        self
    }

    /// Reject tables carrying `property`.
    #[must_use]
    pub fn without(mut self, property: PropertyId) -> Self {
        self.exclusive.set(property);
        self
    }

    /// Tables must carry all of these.
    #[must_use]
    pub fn inclusive(&self) -> &TableSignature {
        &self.inclusive
    }

    /// Tables must carry none of these.
    #[must_use]
    pub fn exclusive(&self) -> &TableSignature {
        &self.exclusive
    }

    /// Properties whose columns each view resolves, in request order.
    #[must_use]
    pub fn property_ids(&self) -> &[PropertyId] {
        &self.properties
    }

    /// Returns `true` if a table with `signature` passes the filter.
    #[must_use]
    pub fn matches(&self, signature: &TableSignature) -> bool {
        if !TableSignature::check_bits(signature, &self.inclusive) {
            return false;
        }
        !(self.exclusive.is_valid() && TableSignature::has_any(signature, &self.exclusive))
    }
}

/// One matching table in a [`Dataset`].
#[derive(Debug, Clone)]
pub struct View {
    /// The table this view reads.
    pub tid: TableId,
    /// Row count when the view was taken or last validated.
    pub num_instances: usize,
    /// Resolved columns for the requested properties, in request order.
    /// Properties without a column (tags) are skipped.
    pub columns: Vec<(PropertyId, ColumnIndex)>,
}

impl View {
    /// Column resolved for `property`, if any.
    #[must_use]
    pub fn column_of(&self, property: PropertyId) -> Option<ColumnIndex> {
        self.columns
            .iter()
            .find(|(p, _)| *p == property)
            .map(|&(_, col)| col)
    }

    /// Bytes of the column resolved for `property`, or `None` if the table
    /// stores no buffer for it.
    ///
    /// # Panics
    ///
    /// Panics if the view's table is no longer valid in `db`.
    #[must_use]
    pub fn buffer_of<'a>(&self, db: &'a Database, property: PropertyId) -> Option<&'a [u8]> {
        let col = self.column_of(property)?;
        Some(db.column_bytes(self.tid, col))
    }

    /// Mutable counterpart of [`View::buffer_of`].
    ///
    /// # Panics
    ///
    /// Panics if the view's table is no longer valid in `db`.
    #[must_use]
    pub fn buffer_of_mut<'a>(&self, db: &'a mut Database, property: PropertyId) -> Option<&'a mut [u8]> {
        let col = self.column_of(property)?;
        Some(db.column_bytes_mut(self.tid, col))
    }

    /// Bytes of the `i`-th resolved column, `[0, num_instances)` rows.
    ///
    /// `i` counts resolved columns only; prefer [`View::buffer_of`] when the
    /// request includes tags.
    ///
    /// # Panics
    ///
    /// Panics if the view's table is no longer valid in `db`.
    #[must_use]
    pub fn buffer<'a>(&self, db: &'a Database, i: usize) -> &'a [u8] {
        let (_, col) = self.columns[i];
        db.column_bytes(self.tid, col)
    }

    /// Mutable bytes of the `i`-th resolved column.
    ///
    /// # Panics
    ///
    /// Panics if the view's table is no longer valid in `db`.
    #[must_use]
    pub fn buffer_mut<'a>(&self, db: &'a mut Database, i: usize) -> &'a mut [u8] {
        let (_, col) = self.columns[i];
        db.column_bytes_mut(self.tid, col)
    }
}

/// Result of [`Database::query`](crate::Database::query).
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub(crate) views: Vec<View>,
}

impl Dataset {
    /// Views in table slot order.
    #[must_use]
    pub fn views(&self) -> &[View] {
        &self.views
    }

    /// Number of views.
    #[must_use]
    pub fn len(&self) -> usize {
        self.views.len()
    }

    /// Returns `true` when no table matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    /// Sum of `num_instances` over all views.
    #[must_use]
    pub fn total_instances(&self) -> usize {
        self.views.iter().map(|v| v.num_instances).sum()
    }

    /// Drops views whose table was deleted and refreshes row counts.
    pub fn validate(&mut self, db: &Database) {
        let mut i = 0;
        while i < self.views.len() {
            let tid = self.views[i].tid;
            if !db.is_valid(tid) {
                self.views.swap_remove(i);
                continue;
            }
            self.views[i].num_instances = db.num_rows(tid);
            i += 1;
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a View;
    type IntoIter = std::slice::Iter<'a, View>;

    fn into_iter(self) -> Self::IntoIter {
        self.views.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<PropertyId> {
        raw.iter().map(|&i| PropertyId(i)).collect()
    }

    #[test]
    fn test_builder_matches_lists() {
        let built = FilterSet::new()
            .with(PropertyId(1))
            .with(PropertyId(2))
            .without(PropertyId(3));
        let listed = FilterSet::from_lists(&ids(&[1, 2]), &ids(&[3]));
        assert_eq!(built.inclusive(), listed.inclusive());
        assert_eq!(built.exclusive(), listed.exclusive());
        assert_eq!(built.property_ids(), listed.property_ids());
    }

    #[test]
    fn test_with_deduplicates_properties() {
        let filter = FilterSet::new().with(PropertyId(1)).with(PropertyId(1));
        assert_eq!(filter.property_ids(), &[PropertyId(1)]);
    }

    #[test]
    fn test_matches() {
        let filter = FilterSet::from_lists(&ids(&[1, 2]), &ids(&[3]));
        assert!(filter.matches(&ids(&[1, 2]).into_iter().collect()));
        assert!(filter.matches(&ids(&[1, 2, 4]).into_iter().collect()));
        assert!(!filter.matches(&ids(&[1, 2, 3]).into_iter().collect()));
        assert!(!filter.matches(&ids(&[1]).into_iter().collect()));
    }

    #[test]
    fn test_no_exclusions() {
        let filter = FilterSet::from_lists(&ids(&[1]), &[]);
        assert!(!filter.exclusive().is_valid());
        assert!(filter.matches(&ids(&[1, 3]).into_iter().collect()));
    }

    #[test]
    fn test_view_column_of() {
        let view = View {
            tid: TableId::INVALID,
            num_instances: 0,
            columns: vec![(PropertyId(4), ColumnIndex(1))],
        };
        assert_eq!(view.column_of(PropertyId(4)), Some(ColumnIndex(1)));
        assert_eq!(view.column_of(PropertyId(5)), None);
    }
}
