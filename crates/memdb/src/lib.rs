//! # memdb
//!
//! In-memory columnar table store. Entities are rows; every table holds the
//! rows of one property combination in one byte buffer per sized property.
//!
//! This crate provides:
//!
//! - [`Database`] — owner of all tables, with row allocation, migration,
//!   defragmentation, serialization and queries.
//! - [`TableId`] — generation-checked table handle.
//! - [`TableSignature`] — canonical property bitset used for matching.
//! - [`FilterSet`] / [`Dataset`] — query input and result.
//! - [`DatabaseConfig`] — table limit and growth parameters.
//!
//! Property types themselves come from [`memdb_property`], re-exported here.

pub mod config;
pub mod database;
pub mod dataset;
pub mod error;
pub mod id;
pub mod signature;
mod table;

pub use config::DatabaseConfig;
pub use database::{Blob, Database, TableCreateInfo};
pub use dataset::{Dataset, FilterSet, View};
pub use error::DbError;
pub use id::{ColumnIndex, TableId};
pub use signature::TableSignature;

pub use memdb_property::{Property, PropertyDescription, PropertyId, RegistryError, TypeRegistry};
