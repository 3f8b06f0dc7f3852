//! Storage Engine
//!
//! An embedded object store persisted as a single JSON document per store:
//!
//! ```text
//! default.store
//! {"schemaVersion":1,"schema":[...],"objects":{"Dog":[...],"Person":[...]}}
//! ```
//!
//! - [`StoreHandle`]: the live binding, with snapshot reads and serialized writes
//! - [`Transaction`]: scoped write context, committed only on success
//! - [`Collections`]: in-memory tables indexed by primary key
//!
//! Commits go through a temp file and rename, so a crash leaves either the
//! previous or the new document on disk.

mod collections;
mod handle;
mod transaction;

pub use collections::{index_key, Collections, Table};
pub use handle::StoreHandle;
pub use transaction::Transaction;
