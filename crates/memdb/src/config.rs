//! Database configuration.

use serde::{Deserialize, Serialize};

/// Sizing parameters for a [`Database`](crate::Database).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Maximum number of simultaneously live tables.
    pub max_tables: usize,
    /// Row slots allocated for every column when a table is created.
    pub initial_capacity: u32,
    /// Capacity added by a table's first growth. Doubles after every growth.
    pub initial_grow: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_tables: 512,
            initial_capacity: 128,
            initial_grow: 128,
        }
    }
}

impl DatabaseConfig {
    /// Override the table ceiling.
    #[must_use]
    pub fn with_max_tables(mut self, max_tables: usize) -> Self {
        self.max_tables = max_tables;
        self
    }

    /// Override the initial per-table capacity.
    #[must_use]
    pub fn with_initial_capacity(mut self, capacity: u32) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Override the first growth step.
    #[must_use]
    pub fn with_initial_grow(mut self, grow: u32) -> Self {
        self.initial_grow = grow.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: DatabaseConfig = serde_json::from_str(r#"{ "max_tables": 8 }"#).unwrap();
        assert_eq!(config.max_tables, 8);
        assert_eq!(config.initial_capacity, 128);
        assert_eq!(config.initial_grow, 128);
    }

    #[test]
    fn test_builder() {
        let config = DatabaseConfig::default()
            .with_max_tables(4)
            .with_initial_capacity(2)
            .with_initial_grow(0);
        assert_eq!(config.max_tables, 4);
        assert_eq!(config.initial_capacity, 2);
        assert_eq!(config.initial_grow, 1);
    }
}
