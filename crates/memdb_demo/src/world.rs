//! Entity bookkeeping on top of the store.
//!
//! The [`World`] owns the database plus two maps kept in step with it:
//! entity → location and, per table, row → entity. Row moves reported by
//! the store's move callbacks are applied to both.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use glam::Vec3;
use memdb::{Blob, Database, DatabaseConfig, TableCreateInfo, TableId, TypeRegistry};
use tracing::debug;

use crate::components::{ComponentIds, Health, Position, Velocity};

/// Simulation entity handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity(pub u32);

impl Entity {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Where an entity's row currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub tid: TableId,
    pub row: usize,
}

#[derive(Debug)]
pub struct World {
    db: Database,
    ids: ComponentIds,
    agents: TableId,
    corpses: TableId,
    locations: Vec<Option<Location>>,
    owners: HashMap<TableId, Vec<Option<Entity>>>,
}

impl World {
    /// Register the simulation's properties and create its two tables.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        let mut registry = TypeRegistry::new();
        let ids = ComponentIds::register(&mut registry)?;
        let mut db = Database::new(config, Arc::new(registry));

        let agents = db.create_table(
            &TableCreateInfo::new("agents").with_properties(&[ids.position, ids.velocity, ids.health]),
        )?;
        let corpses = db.create_table(
            &TableCreateInfo::new("corpses").with_properties(&[ids.position, ids.health, ids.dead]),
        )?;

        let owners = HashMap::from([(agents, Vec::new()), (corpses, Vec::new())]);
        Ok(Self {
            db,
            ids,
            agents,
            corpses,
            locations: Vec::new(),
            owners,
        })
    }

    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    #[must_use]
    pub fn ids(&self) -> &ComponentIds {
        &self.ids
    }

    #[must_use]
    pub fn agents(&self) -> TableId {
        self.agents
    }

    #[must_use]
    pub fn corpses(&self) -> TableId {
        self.corpses
    }

    #[must_use]
    pub fn location(&self, entity: Entity) -> Option<Location> {
        self.locations.get(entity.index()).copied().flatten()
    }

    /// Entity stored at `row` of `tid`, if the row is live.
    #[must_use]
    pub fn owner(&self, tid: TableId, row: usize) -> Option<Entity> {
        self.owners.get(&tid)?.get(row).copied().flatten()
    }

    fn place(&mut self, entity: Entity, tid: TableId, row: usize) {
        let owners = self.owners.entry(tid).or_default();
        if owners.len() <= row {
            owners.resize(row + 1, None);
        }
        owners[row] = Some(entity);
        self.locations[entity.index()] = Some(Location { tid, row });
    }

    /// Create a live agent.
    pub fn spawn(&mut self, position: Vec3, velocity: Vec3, health: Health) -> Result<Entity> {
        let entity = Entity(self.locations.len() as u32);
        self.locations.push(None);

        let row = self.db.allocate_row(self.agents);
        self.db.set(self.agents, self.ids.position, row, &Position(position))?;
        self.db.set(self.agents, self.ids.velocity, row, &Velocity(velocity))?;
        self.db.set(self.agents, self.ids.health, row, &health)?;
        self.place(entity, self.agents, row);
        Ok(entity)
    }

    /// Move an agent into the corpse table. Its old row becomes a hole until
    /// [`World::compact`] runs.
    pub fn kill(&mut self, entity: Entity) -> Result<()> {
        let loc = self
            .location(entity)
            .with_context(|| format!("entity {} has no location", entity.0))?;
        if loc.tid == self.corpses {
            return Ok(());
        }

        let row = self
            .db
            .migrate_instance(loc.tid, loc.row, self.corpses, false, |_, _| {});
        if let Some(owners) = self.owners.get_mut(&loc.tid) {
            owners[loc.row] = None;
        }
        self.place(entity, self.corpses, row);
        debug!(entity = entity.0, row, "agent died");
        Ok(())
    }

    /// Defragment every table, following the rows that move. Returns the
    /// number of rows reclaimed.
    pub fn compact(&mut self) -> usize {
        let mut reclaimed = 0;
        for tid in [self.agents, self.corpses] {
            let owners = self.owners.entry(tid).or_default();
            let locations = &mut self.locations;
            reclaimed += self.db.defragment(tid, |from, to| {
                let moved = owners[from].take();
                owners[to] = moved;
                if let Some(entity) = moved {
                    locations[entity.index()] = Some(Location { tid, row: to });
                }
            });
            owners.truncate(self.db.num_rows(tid));
        }
        reclaimed
    }

    /// Number of live agents.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.db.num_rows(self.agents) - self.db.free_rows(self.agents).len()
    }

    /// Number of corpses.
    #[must_use]
    pub fn dead(&self) -> usize {
        self.db.num_rows(self.corpses) - self.db.free_rows(self.corpses).len()
    }

    /// Serialize an entity's row and pack it as MessagePack.
    pub fn snapshot(&self, entity: Entity) -> Result<Vec<u8>> {
        let loc = self
            .location(entity)
            .with_context(|| format!("entity {} has no location", entity.0))?;
        let blob = self.db.serialize_instance(loc.tid, loc.row);
        Ok(rmp_serde::to_vec(&blob)?)
    }

    /// Restore a [`World::snapshot`] into a fresh database sharing this
    /// world's registry. Returns the database and the restored row.
    pub fn restore(&self, entity: Entity, packed: &[u8]) -> Result<(Database, TableId, usize)> {
        let loc = self
            .location(entity)
            .with_context(|| format!("entity {} has no location", entity.0))?;
        let blob: Blob = rmp_serde::from_slice(packed).context("decoding snapshot")?;

        let mut archive = Database::new(self.db.config().clone(), Arc::clone(self.db.registry()));
        let tid = archive.create_table(
            &TableCreateInfo::new("archive").with_properties(self.db.properties(loc.tid)),
        )?;
        let row = archive.allocate_row(tid);
        archive.deserialize_instance(&blob, tid, row)?;
        Ok((archive, tid, row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> World {
        World::new(DatabaseConfig::default().with_initial_capacity(4).with_initial_grow(4)).unwrap()
    }

    #[test]
    fn test_spawn_records_location() {
        let mut world = world();
        let e = world.spawn(Vec3::ONE, Vec3::X, Health::new(5.0)).unwrap();
        let loc = world.location(e).unwrap();
        assert_eq!(loc.tid, world.agents());
        assert_eq!(world.owner(loc.tid, loc.row), Some(e));
        let pos: Position = world.db().get(loc.tid, world.ids().position, loc.row).unwrap();
        assert_eq!(pos, Position(Vec3::ONE));
    }

    #[test]
    fn test_kill_then_compact_follows_moves() {
        let mut world = world();
        let a = world.spawn(Vec3::ZERO, Vec3::X, Health::new(1.0)).unwrap();
        let b = world.spawn(Vec3::ONE, Vec3::X, Health::new(1.0)).unwrap();
        let c = world.spawn(Vec3::splat(2.0), Vec3::X, Health::new(1.0)).unwrap();

        world.kill(a).unwrap();
        assert_eq!(world.location(a).unwrap().tid, world.corpses());
        assert_eq!(world.alive(), 2);
        assert_eq!(world.dead(), 1);

        assert_eq!(world.compact(), 1);
        let loc_c = world.location(c).unwrap();
        assert_eq!(loc_c.row, 0);
        assert_eq!(world.owner(world.agents(), 0), Some(c));
        let pos: Position = world.db().get(loc_c.tid, world.ids().position, loc_c.row).unwrap();
        assert_eq!(pos, Position(Vec3::splat(2.0)));
        assert_eq!(world.location(b).unwrap().row, 1);
        assert_eq!(world.db().num_rows(world.agents()), 2);
    }

    #[test]
    fn test_kill_is_idempotent() {
        let mut world = world();
        let e = world.spawn(Vec3::ZERO, Vec3::ZERO, Health::new(1.0)).unwrap();
        world.kill(e).unwrap();
        world.kill(e).unwrap();
        assert_eq!(world.dead(), 1);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut world = world();
        let e = world.spawn(Vec3::new(1.0, 2.0, 3.0), Vec3::ZERO, Health::new(7.0)).unwrap();
        world.kill(e).unwrap();

        let packed = world.snapshot(e).unwrap();
        let (archive, tid, row) = world.restore(e, &packed).unwrap();
        let pos: Position = archive.get(tid, world.ids().position, row).unwrap();
        let health: Health = archive.get(tid, world.ids().health, row).unwrap();
        assert_eq!(pos, Position(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(health, Health::new(7.0));
        assert!(archive.has_property(tid, world.ids().dead));
    }
}
