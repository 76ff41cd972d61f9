//! # memdb_property
//!
//! Property types for the columnar store: what a column holds and how big
//! it is.
//!
//! This crate provides:
//!
//! - [`PropertyId`] — dense identifier of a registered property type.
//! - [`PropertyDescription`] — byte size and default value of a type.
//! - [`Property`] — trait for compile-time `Pod` property types.
//! - [`TypeRegistry`] — the id → description mapping every database consults.

pub mod error;
pub mod property;
pub mod registry;

pub use error::RegistryError;
pub use property::{Property, PropertyDescription, PropertyId};
pub use registry::TypeRegistry;
