//! Data types for the schema store
//!
//! This module contains the schema model, meta records, and the write
//! operation language shared by the engine, the service and the API.

mod meta;
mod schema;
mod write;

pub use meta::MetaRecord;
pub use schema::{EntityType, Property, ScalarKind, SchemaDefinition};
pub use write::{WriteBatch, WriteOperation};

/// A stored object: property name to JSON value
pub type Object = serde_json::Map<String, serde_json::Value>;
