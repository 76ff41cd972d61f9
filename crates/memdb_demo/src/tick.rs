//! Fixed-timestep simulation loop.
//!
//! Each tick:
//!
//! 1. Integrate positions of every moving, living entity.
//! 2. Apply damage to living entities.
//! 3. Migrate entities whose health ran out to the corpse table.
//! 4. Defragment, following the rows that move.

use std::mem::size_of;
use std::time::{Duration, Instant};

use anyhow::Result;
use memdb::{FilterSet, TableId};
use tracing::{debug, info, warn};

use crate::components::{Health, Position, Velocity};
use crate::world::{Entity, World};

/// Configuration for the simulation tick loop.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Target ticks per second.
    pub tick_rate: f64,
    /// Maximum number of ticks to run (0 = unlimited).
    pub max_ticks: u64,
    /// Health lost by every living entity per second.
    pub damage_per_second: f32,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60.0,
            max_ticks: 0,
            damage_per_second: 10.0,
        }
    }
}

#[derive(Debug)]
pub struct TickLoop {
    tick_id: u64,
    config: TickConfig,
    world: World,
}

fn read_all<T: bytemuck::Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}

impl TickLoop {
    #[must_use]
    pub fn new(config: TickConfig, world: World) -> Self {
        Self {
            tick_id: 0,
            config,
            world,
        }
    }

    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    fn integrate(&mut self, dt: f32) {
        let ids = *self.world.ids();
        let movers = FilterSet::new()
            .with(ids.position)
            .with(ids.velocity)
            .without(ids.dead);
        let dataset = self.world.db().query(&movers);

        let db = self.world.db_mut();
        for view in &dataset {
            let Some(velocities) = view.buffer_of(db, ids.velocity) else {
                continue;
            };
            let velocities: Vec<Velocity> = read_all(velocities);
            let Some(positions) = view.buffer_of_mut(db, ids.position) else {
                continue;
            };
            for (chunk, velocity) in positions.chunks_exact_mut(size_of::<Position>()).zip(&velocities) {
                let mut position: Position = bytemuck::pod_read_unaligned(chunk);
                position.0 += velocity.0 * dt;
                chunk.copy_from_slice(bytemuck::bytes_of(&position));
            }
        }
    }

    /// Damages the living and returns the ones that died this tick.
    fn damage(&mut self, amount: f32) -> Vec<Entity> {
        let ids = *self.world.ids();
        let living = FilterSet::new().with(ids.health).without(ids.dead);
        let dataset = self.world.db().query(&living);

        let mut died: Vec<(TableId, usize)> = Vec::new();
        let db = self.world.db_mut();
        for view in &dataset {
            let Some(buffer) = view.buffer_of_mut(db, ids.health) else {
                continue;
            };
            for (row, chunk) in buffer.chunks_exact_mut(size_of::<Health>()).enumerate() {
                let mut health: Health = bytemuck::pod_read_unaligned(chunk);
                if health.is_dead() {
                    continue;
                }
                health.current -= amount;
                chunk.copy_from_slice(bytemuck::bytes_of(&health));
                if health.is_dead() {
                    died.push((view.tid, row));
                }
            }
        }

        died.into_iter()
            .filter_map(|(tid, row)| self.world.owner(tid, row))
            .collect()
    }

    /// Run one tick of the simulation.
    pub fn tick(&mut self, dt: f64) -> Result<()> {
        self.tick_id += 1;
        let dt = dt as f32;

        self.integrate(dt);
        let died = self.damage(self.config.damage_per_second * dt);
        for &entity in &died {
            self.world.kill(entity)?;
        }
        let reclaimed = self.world.compact();

        debug!(
            tick_id = self.tick_id,
            died = died.len(),
            reclaimed,
            alive = self.world.alive(),
            "tick complete"
        );
        Ok(())
    }

    /// Run the tick loop for the configured number of ticks, or indefinitely.
    pub fn run(&mut self) -> Result<()> {
        let tick_duration = Duration::from_secs_f64(1.0 / self.config.tick_rate);
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            "starting tick loop"
        );

        loop {
            let start = Instant::now();

            self.tick(tick_duration.as_secs_f64())?;

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(
                    ticks = tick_count,
                    alive = self.world.alive(),
                    dead = self.world.dead(),
                    "tick loop complete"
                );
                return Ok(());
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use memdb::DatabaseConfig;

    use super::*;

    fn tick_loop(config: TickConfig) -> TickLoop {
        let world = World::new(DatabaseConfig::default().with_initial_capacity(2).with_initial_grow(2)).unwrap();
        TickLoop::new(config, world)
    }

    #[test]
    fn test_tick_advances_counter() {
        let mut tick_loop = tick_loop(TickConfig::default());
        tick_loop.tick(1.0 / 60.0).unwrap();
        tick_loop.tick(1.0 / 60.0).unwrap();
        assert_eq!(tick_loop.tick_id(), 2);
    }

    #[test]
    fn test_integrate_moves_agents() {
        let mut tick_loop = tick_loop(TickConfig {
            damage_per_second: 0.0,
            ..TickConfig::default()
        });
        let e = tick_loop
            .world_mut()
            .spawn(Vec3::ZERO, Vec3::new(2.0, 0.0, -4.0), Health::new(10.0))
            .unwrap();
        tick_loop.tick(0.5).unwrap();

        let world = tick_loop.world();
        let loc = world.location(e).unwrap();
        let pos: Position = world.db().get(loc.tid, world.ids().position, loc.row).unwrap();
        assert_eq!(pos, Position(Vec3::new(1.0, 0.0, -2.0)));
    }

    #[test]
    fn test_dead_agents_move_to_corpses() {
        let mut tick_loop = tick_loop(TickConfig {
            damage_per_second: 1.0,
            ..TickConfig::default()
        });
        let world = tick_loop.world_mut();
        let weak = world.spawn(Vec3::ZERO, Vec3::X, Health::new(1.0)).unwrap();
        let strong = world.spawn(Vec3::ZERO, Vec3::X, Health::new(3.0)).unwrap();
        let last = world.spawn(Vec3::ONE, Vec3::X, Health::new(3.0)).unwrap();

        tick_loop.tick(1.0).unwrap();
        let world = tick_loop.world();
        assert_eq!(world.location(weak).unwrap().tid, world.corpses());
        assert_eq!(world.alive(), 2);
        assert_eq!(world.dead(), 1);

        // The hole left by `weak` was filled by the last agent.
        let loc = world.location(last).unwrap();
        assert_eq!(loc.row, 0);
        assert_eq!(world.owner(world.agents(), 0), Some(last));
        assert_eq!(world.location(strong).unwrap().row, 1);

        // Corpses neither move nor take damage.
        let corpse = world.location(weak).unwrap();
        let before: Position = world.db().get(corpse.tid, world.ids().position, corpse.row).unwrap();
        tick_loop.tick(1.0).unwrap();
        let world = tick_loop.world();
        let after: Position = world.db().get(corpse.tid, world.ids().position, corpse.row).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_run_limited_ticks() {
        let mut tick_loop = tick_loop(TickConfig {
            tick_rate: 1000.0,
            max_ticks: 5,
            damage_per_second: 0.0,
        });
        tick_loop.run().unwrap();
        assert_eq!(tick_loop.tick_id(), 5);
    }
}
