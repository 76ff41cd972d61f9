//! Core [`Property`] trait and associated metadata.
//!
//! A property is a fixed-size plain-old-data type that can be stored in a
//! table column. The store never interprets property values: it only knows
//! each type's byte size and default bytes, both of which are recorded in a
//! [`PropertyDescription`] owned by the [`TypeRegistry`](crate::TypeRegistry).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a registered property type.
///
/// Ids are dense indices issued by the [`TypeRegistry`](crate::TypeRegistry)
/// in registration order, which keeps table signatures (one bit per id)
/// small. Ids are stable for the lifetime of the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyId(pub u32);

impl PropertyId {
    /// The null / unregistered property sentinel.
    pub const INVALID: PropertyId = PropertyId(u32::MAX);

    /// Returns the raw index of this id.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` unless this is [`PropertyId::INVALID`].
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl std::fmt::Display for PropertyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PropertyId({})", self.0)
    }
}

/// Size and default value of a registered property type.
#[derive(Debug, Clone)]
pub struct PropertyDescription {
    /// Human-readable type name (e.g. `"Position"`).
    pub name: String,
    /// Size of one value in bytes. Zero for tag properties.
    pub type_size: u32,
    /// Bytes written into a column slot whenever a row is (re)initialised.
    /// Always exactly `type_size` bytes long.
    pub default_value: Arc<[u8]>,
}

impl PropertyDescription {
    /// Returns `true` for zero-size marker properties, which never get a column.
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.type_size == 0
    }
}

/// A property type known at compile time.
///
/// Property values are copied around as raw bytes, so the type must be
/// [`bytemuck::Pod`]. Its [`Default`] value becomes the column default.
///
/// # Examples
///
/// ```rust
/// use bytemuck::{Pod, Zeroable};
/// use memdb_property::Property;
///
/// #[repr(C)]
/// #[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Property for Health {
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Property: bytemuck::Pod + Default + Send + Sync + 'static {
    /// Name the type is registered under.
    fn type_name() -> &'static str;

    /// Builds the [`PropertyDescription`] for this type.
    fn description() -> PropertyDescription {
        let default = Self::default();
        PropertyDescription {
            name: Self::type_name().to_string(),
            type_size: std::mem::size_of::<Self>() as u32,
            default_value: Arc::from(bytemuck::bytes_of(&default)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Default for Health {
        fn default() -> Self {
            Self {
                current: 100.0,
                max: 100.0,
            }
        }
    }

    impl Property for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_description_size_and_name() {
        let desc = Health::description();
        assert_eq!(desc.name, "Health");
        assert_eq!(desc.type_size, 8);
        assert!(!desc.is_tag());
    }

    #[test]
    fn test_description_default_bytes() {
        let desc = Health::description();
        let restored: Health = bytemuck::pod_read_unaligned(&desc.default_value);
        assert_eq!(restored, Health::default());
    }

    #[test]
    fn test_property_id_invalid() {
        assert!(!PropertyId::INVALID.is_valid());
        assert!(PropertyId(0).is_valid());
        assert_eq!(PropertyId(7).index(), 7);
    }

    #[test]
    fn test_property_id_serialization_roundtrip() {
        let id = PropertyId(42);
        let bytes = rmp_serde::to_vec(&id).unwrap();
        let restored: PropertyId = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(id, restored);
    }
}
