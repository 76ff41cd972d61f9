//! Registry error types.

/// Errors that can occur while registering property types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The default value does not match the declared type size.
    #[error("default value for '{name}' is {actual} bytes, expected {expected}")]
    DefaultSizeMismatch {
        name: String,
        expected: u32,
        actual: usize,
    },

    /// A property with the same name was already registered with another size.
    #[error("property '{name}' already registered with size {existing}, got {requested}")]
    Conflict {
        name: String,
        existing: u32,
        requested: u32,
    },
}
