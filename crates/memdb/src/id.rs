//! Table and column handles, and the id pool that issues table ids.
//!
//! A [`TableId`] pairs a slot index with a generation. When a table is
//! deleted its slot's generation is bumped, so handles to the old table stop
//! validating even after the slot is recycled for a new table.

use serde::{Deserialize, Serialize};

/// Generation-checked handle to a table slot in a [`Database`](crate::Database).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableId {
    /// Slot index in the database's table array.
    pub index: u32,
    /// Generation of the slot when this handle was issued.
    pub generation: u32,
}

impl TableId {
    /// The null / invalid table sentinel.
    pub const INVALID: TableId = TableId {
        index: u32::MAX,
        generation: u32::MAX,
    };

    /// Returns the slot index as `usize`.
    #[must_use]
    pub const fn slot(self) -> usize {
        self.index as usize
    }
}

impl Default for TableId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TableId({}v{})", self.index, self.generation)
    }
}

/// Position of a column inside one table.
///
/// Column indices are only meaningful for the table that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnIndex(pub u32);

impl ColumnIndex {
    /// Returns the index as `usize`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Allocates and recycles generation-tagged [`TableId`]s up to a fixed ceiling.
#[derive(Debug)]
pub(crate) struct IdPool {
    /// Current generation of every slot ever issued.
    generations: Vec<u32>,
    /// Whether the slot is currently handed out.
    live: Vec<bool>,
    /// Freed slot indices, reused most-recent first.
    free: Vec<u32>,
    max: usize,
}

impl IdPool {
    /// Creates a pool that hands out at most `max` simultaneous ids.
    #[must_use]
    pub(crate) fn new(max: usize) -> Self {
        Self {
            generations: Vec::new(),
            live: Vec::new(),
            free: Vec::new(),
            max,
        }
    }

    /// Allocates an id, recycling a freed slot if one exists.
    ///
    /// Returns `None` once `max` ids are live.
    pub(crate) fn allocate(&mut self) -> Option<TableId> {
        if let Some(index) = self.free.pop() {
            self.live[index as usize] = true;
            return Some(TableId {
                index,
                generation: self.generations[index as usize],
            });
        }

        if self.generations.len() >= self.max {
            return None;
        }

        let index = self.generations.len() as u32;
        self.generations.push(0);
        self.live.push(true);
        Some(TableId {
            index,
            generation: 0,
        })
    }

    /// Releases an id. Stale or already-freed ids are ignored.
    ///
    /// Returns `true` if the id was live and has been released.
    pub(crate) fn deallocate(&mut self, id: TableId) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        let slot = id.slot();
        self.live[slot] = false;
        self.generations[slot] = self.generations[slot].wrapping_add(1);
        self.free.push(id.index);
        true
    }

    /// Returns `true` if `id` is live and its generation matches its slot.
    #[must_use]
    pub(crate) fn is_valid(&self, id: TableId) -> bool {
        let slot = id.slot();
        slot < self.generations.len() && self.live[slot] && self.generations[slot] == id.generation
    }

    /// Number of ids currently handed out.
    #[must_use]
    pub(crate) fn live_count(&self) -> usize {
        self.generations.len() - self.free.len()
    }

    /// One past the highest slot index ever issued.
    #[must_use]
    pub(crate) fn high_water(&self) -> usize {
        self.generations.len()
    }
}
