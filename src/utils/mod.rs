//! Utility functions and helpers
//!
//! This module contains the atomic file-replacement helpers used by the engine.

pub mod atomic;

pub use atomic::{atomic_write_json, atomic_write_with, cleanup_temp_file, AtomicError, AtomicResult};
