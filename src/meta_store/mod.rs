//! Meta Store Module
//!
//! Durable, append-only history of schema versions per logical store path.
//!
//! ```text
//! meta.jsonl
//! {"schemaVersion":0,"schema":"[...]","path":"default.store",...}
//! {"schemaVersion":1,"schema":"[...]","path":"default.store",...}
//! ```
//!
//! Records are never rewritten or deleted. Per path, versions strictly
//! increase and the record with the highest version is the current one.

mod store;

pub use store::MetaStore;
