//! Store Lifecycle Controller
//!
//! Owns the single live [`StoreHandle`](crate::engine::StoreHandle) per
//! logical path and rebinds it on schema changes. A swap closes the old
//! handle before opening the new one; the path reports `Unavailable` in
//! between.

mod controller;

pub use controller::LifecycleController;
