//! Property types used by the simulation.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use memdb_property::{Property, PropertyId, RegistryError, TypeRegistry};
use serde::{Deserialize, Serialize};

/// World-space position.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Position(pub Vec3);

impl Property for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

/// Units per second.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

impl Property for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Default for Health {
    fn default() -> Self {
        Self {
            current: 100.0,
            max: 100.0,
        }
    }
}

impl Health {
    #[must_use]
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.current <= 0.0
    }
}

impl Property for Health {
    fn type_name() -> &'static str {
        "Health"
    }
}

/// Name of the zero-size marker carried by dead entities.
pub const DEAD_TAG: &str = "Dead";

/// Ids of every property the simulation registers.
#[derive(Debug, Clone, Copy)]
pub struct ComponentIds {
    pub position: PropertyId,
    pub velocity: PropertyId,
    pub health: PropertyId,
    pub dead: PropertyId,
}

impl ComponentIds {
    /// Register the simulation's properties.
    ///
    /// # Errors
    ///
    /// Fails if a name is already registered with a different size.
    pub fn register(registry: &mut TypeRegistry) -> Result<Self, RegistryError> {
        Ok(Self {
            position: registry.register::<Position>()?,
            velocity: registry.register::<Velocity>()?,
            health: registry.register::<Health>()?,
            dead: registry.register_tag(DEAD_TAG)?,
        })
    }
}
