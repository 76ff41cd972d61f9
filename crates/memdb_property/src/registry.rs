//! Type registry mapping property ids to their size and default value.
//!
//! The registry is populated once during engine setup and then frozen into an
//! `Arc<TypeRegistry>` that every database shares. Because a shared registry
//! can no longer be mutated, every property a database sees is guaranteed to
//! have been registered before the database was created.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::RegistryError;
use crate::property::{Property, PropertyDescription, PropertyId};

/// Registry of all property types known to the store.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    /// Descriptions indexed by [`PropertyId::index`].
    descriptions: Vec<PropertyDescription>,
    /// Name lookup, used to make registration idempotent.
    by_name: HashMap<String, PropertyId>,
}

impl TypeRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            descriptions: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Register a compile-time property type.
    ///
    /// Registering the same type twice returns the id issued the first time.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Conflict`] if another type with a different
    /// size was already registered under the same name.
    pub fn register<T: Property>(&mut self) -> Result<PropertyId, RegistryError> {
        self.insert(T::description())
    }

    /// Register a property from its raw size and default bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DefaultSizeMismatch`] if `default_value` is
    /// not exactly `type_size` bytes, or [`RegistryError::Conflict`] on a
    /// name clash with a different size.
    pub fn register_raw(
        &mut self,
        name: &str,
        type_size: u32,
        default_value: &[u8],
    ) -> Result<PropertyId, RegistryError> {
        if default_value.len() != type_size as usize {
            return Err(RegistryError::DefaultSizeMismatch {
                name: name.to_string(),
                expected: type_size,
                actual: default_value.len(),
            });
        }
        self.insert(PropertyDescription {
            name: name.to_string(),
            type_size,
            default_value: Arc::from(default_value),
        })
    }

    /// Register a zero-size marker property.
    ///
    /// Tags participate in table signatures but never get a column buffer.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Conflict`] if the name is already taken by a
    /// sized property.
    pub fn register_tag(&mut self, name: &str) -> Result<PropertyId, RegistryError> {
        self.register_raw(name, 0, &[])
    }

    fn insert(&mut self, desc: PropertyDescription) -> Result<PropertyId, RegistryError> {
        if let Some(&existing) = self.by_name.get(&desc.name) {
            let existing_size = self.descriptions[existing.index()].type_size;
            if existing_size != desc.type_size {
                return Err(RegistryError::Conflict {
                    name: desc.name,
                    existing: existing_size,
                    requested: desc.type_size,
                });
            }
            return Ok(existing);
        }

        let id = PropertyId(self.descriptions.len() as u32);
        debug!(property = %id, name = %desc.name, size = desc.type_size, "registered property");
        self.by_name.insert(desc.name.clone(), id);
        self.descriptions.push(desc);
        Ok(id)
    }

    /// Returns the description of a property, if registered.
    #[must_use]
    pub fn get_description(&self, id: PropertyId) -> Option<&PropertyDescription> {
        self.descriptions.get(id.index())
    }

    /// Returns the byte size of a property, if registered.
    #[must_use]
    pub fn type_size(&self, id: PropertyId) -> Option<u32> {
        self.get_description(id).map(|desc| desc.type_size)
    }

    /// Looks up a property by name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<PropertyId> {
        self.by_name.get(name).copied()
    }

    /// Looks up the id of a compile-time property type.
    #[must_use]
    pub fn id_of<T: Property>(&self) -> Option<PropertyId> {
        self.find(T::type_name())
    }

    /// Returns the number of registered properties.
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    /// Returns `true` if nothing has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }

    /// Returns an iterator over all registered properties.
    pub fn iter(&self) -> impl Iterator<Item = (PropertyId, &PropertyDescription)> {
        self.descriptions
            .iter()
            .enumerate()
            .map(|(i, desc)| (PropertyId(i as u32), desc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
    struct Velocity {
        x: f32,
        y: f32,
        z: f32,
    }

    impl Property for Velocity {
        fn type_name() -> &'static str {
            "Velocity"
        }
    }

    #[test]
    fn test_ids_are_dense() {
        let mut registry = TypeRegistry::new();
        let a = registry.register_raw("A", 4, &[0; 4]).unwrap();
        let b = registry.register_raw("B", 8, &[0; 8]).unwrap();
        let c = registry.register_tag("C").unwrap();
        assert_eq!((a, b, c), (PropertyId(0), PropertyId(1), PropertyId(2)));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_register_typed() {
        let mut registry = TypeRegistry::new();
        let id = registry.register::<Velocity>().unwrap();
        assert_eq!(registry.type_size(id), Some(12));
        assert_eq!(registry.id_of::<Velocity>(), Some(id));
        let desc = registry.get_description(id).unwrap();
        assert_eq!(&*desc.default_value, &[0u8; 12]);
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = TypeRegistry::new();
        let first = registry.register::<Velocity>().unwrap();
        let second = registry.register::<Velocity>().unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_conflicting_size() {
        let mut registry = TypeRegistry::new();
        registry.register_raw("Hp", 4, &[0; 4]).unwrap();
        let err = registry.register_raw("Hp", 8, &[0; 8]).unwrap_err();
        assert!(matches!(err, RegistryError::Conflict { existing: 4, requested: 8, .. }));
    }

    #[test]
    fn test_register_default_size_mismatch() {
        let mut registry = TypeRegistry::new();
        let err = registry.register_raw("Hp", 4, &[0; 2]).unwrap_err();
        assert!(matches!(err, RegistryError::DefaultSizeMismatch { actual: 2, .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_tag_is_zero_size() {
        let mut registry = TypeRegistry::new();
        let tag = registry.register_tag("Dead").unwrap();
        assert!(registry.get_description(tag).unwrap().is_tag());
        assert_eq!(registry.find("Dead"), Some(tag));
    }

    #[test]
    fn test_unknown_id() {
        let registry = TypeRegistry::new();
        assert!(registry.get_description(PropertyId(3)).is_none());
        assert!(registry.type_size(PropertyId::INVALID).is_none());
    }
}
