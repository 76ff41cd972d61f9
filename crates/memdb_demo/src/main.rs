//! # memdb_demo
//!
//! Drives the columnar store the way engine systems do: a fixed-timestep
//! loop of queries over raw column buffers, migrations between tables and
//! defragmentation, followed by a snapshot of one entity restored into a
//! second database.

mod components;
mod tick;
mod world;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use glam::Vec3;
use memdb::DatabaseConfig;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use components::{Health, Position};
use tick::{TickConfig, TickLoop};
use world::World;

#[derive(Parser)]
#[command(name = "memdb_demo", about = "Columnar entity store simulation")]
struct Args {
    /// Number of ticks to simulate
    #[arg(short, long, default_value_t = 120)]
    ticks: u64,

    /// Number of agents to spawn
    #[arg(short, long, default_value_t = 1000)]
    entities: u32,

    /// Ticks per second
    #[arg(long, default_value_t = 60.0)]
    tick_rate: f64,

    /// Optional JSON file with database settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Summary {
    ticks: u64,
    alive: usize,
    dead: usize,
    snapshot_bytes: usize,
    restored_position: Option<Position>,
}

fn load_config(path: Option<&Path>) -> Result<DatabaseConfig> {
    let Some(path) = path else {
        return Ok(DatabaseConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn populate(world: &mut World, count: u32) -> Result<()> {
    for i in 0..count {
        let f = i as f32;
        let position = Vec3::new(f, 0.0, -f);
        let velocity = Vec3::new((f * 0.37).sin(), 0.0, (f * 0.37).cos());
        // Staggered lifetimes so agents die over the whole run.
        let health = Health::new(5.0 + (i % 20) as f32);
        world.spawn(position, velocity, health)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("memdb_demo=info".parse()?)
                .add_directive("memdb=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    info!(?config, entities = args.entities, ticks = args.ticks, "starting simulation");

    let world = World::new(config)?;
    info!(agents = %world.agents(), corpses = %world.corpses(), "tables created");

    let mut tick_loop = TickLoop::new(
        TickConfig {
            tick_rate: args.tick_rate,
            max_ticks: args.ticks,
            damage_per_second: 10.0,
        },
        world,
    );
    populate(tick_loop.world_mut(), args.entities)?;
    tick_loop.run()?;

    let world = tick_loop.world();
    let corpse = world.db().num_rows(world.corpses()).checked_sub(1);
    let (snapshot_bytes, restored_position) = match corpse.and_then(|row| world.owner(world.corpses(), row)) {
        Some(entity) => {
            let packed = world.snapshot(entity)?;
            let (archive, tid, row) = world.restore(entity, &packed)?;
            let position: Position = archive.get(tid, world.ids().position, row)?;
            info!(entity = entity.0, bytes = packed.len(), "restored corpse snapshot");
            (packed.len(), Some(position))
        }
        None => (0, None),
    };

    let summary = Summary {
        ticks: tick_loop.tick_id(),
        alive: world.alive(),
        dead: world.dead(),
        snapshot_bytes,
        restored_position,
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
