//! Schema Store
//!
//! A schema-versioned object store: typed objects live in a store bound to
//! a schema, every schema change is recorded in an append-only history, and
//! writes are applied as atomic batches.
//!
//! # Modules
//!
//! - `types`: Schema model, meta records and write operations
//! - `meta_store`: Append-only schema history per logical path
//! - `engine`: Store handles, transactions and persistence
//! - `filter`: Predicate language and the evaluator seam
//! - `lifecycle`: Single live handle per path, open/close/swap
//! - `service`: Write dispatcher, query façade and schema versioning
//! - `api`: HTTP routes over the service
//! - `config`: Environment configuration
//! - `utils`: Atomic file writes
//!
//! # Example
//!
//! ```no_run
//! use schema_store::{ServiceContext, StoreConfig, WriteOperation};
//! use serde_json::json;
//!
//! fn main() -> schema_store::StoreResult<()> {
//!     let ctx = ServiceContext::open(StoreConfig::new("./data"))?;
//!
//!     let payload = json!({"id": 1, "name": "Rex", "breed": "Lab"});
//!     ctx.apply_batch(&[WriteOperation::Add {
//!         entity_type: "Dog".to_string(),
//!         payload: payload.as_object().cloned().unwrap_or_default(),
//!     }])?;
//!
//!     assert_eq!(ctx.get_count("Dog")?, 1);
//!     ctx.shutdown();
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod meta_store;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::StoreConfig;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use filter::{FilterEvaluator, PredicateEvaluator};
pub use service::{Results, SchemaUpdate, ServiceContext};
pub use types::{
    EntityType, MetaRecord, Object, Property, ScalarKind, SchemaDefinition, WriteBatch,
    WriteOperation,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
