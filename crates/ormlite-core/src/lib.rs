//! # ormlite-core
//!
//! Typed model declarations for SQLite tables.
//!
//! This crate provides:
//! - [`TypeRegistry`] mapping value types to storage types and SQL literals,
//!   extensible through [`Adapter`]s
//! - [`ModelRegistry`] holding validated [`Model`]s by table name
//! - [`Registry`], the caller-owned context bundling both
//!
//! Schema migration lives in the `ormlite-migrate` crate, which consumes the
//! model registry and the rendered column definitions.
//!
//! ## Declaring models
//!
//! ```
//! use ormlite_core::{Field, ModelDefinition, Registry, ValueType};
//!
//! let mut registry = Registry::new();
//!
//! registry
//!     .declare_model(
//!         ModelDefinition::new("bars")
//!             .field(Field::new("id", ValueType::Text).primary_key()),
//!     )
//!     .unwrap();
//!
//! let foos = registry
//!     .declare_model(
//!         ModelDefinition::new("foos")
//!             .field(Field::new("bar", ValueType::Text).foreign_key("bars.id").unwrap())
//!             .field(Field::new("active", ValueType::of::<bool>()).default(true)),
//!     )
//!     .unwrap();
//!
//! assert_eq!(foos.columns()[1].definition, "active BOOL DEFAULT 'T' NOT NULL");
//! ```

pub mod adapters;
mod error;
pub mod model;
mod registry;
pub mod types;

pub use error::{OrmError, Result};
pub use model::{Column, Field, FieldDefault, ForeignKey, Model, ModelDefinition, ModelRegistry};
pub use registry::Registry;
pub use types::{Adapter, CustomValue, TypeKey, TypeRegistry, Value, ValueType};
