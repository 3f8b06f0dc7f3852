//! Lifecycle controller - one live handle per logical path

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, info, warn};

use crate::engine::StoreHandle;
use crate::error::{StoreError, StoreResult};
use crate::filter::FilterEvaluator;
use crate::types::SchemaDefinition;

enum Slot {
    Open(Arc<StoreHandle>),
    Swapping,
}

/// Owns the live [`StoreHandle`] of every open path
pub struct LifecycleController {
    data_dir: PathBuf,
    evaluator: Arc<dyn FilterEvaluator>,
    slots: RwLock<HashMap<String, Slot>>,
}

impl LifecycleController {
    pub fn new<P: AsRef<Path>>(data_dir: P, evaluator: Arc<dyn FilterEvaluator>) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            evaluator,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// File backing the store at logical `path`
    pub fn file_path(&self, path: &str) -> PathBuf {
        self.data_dir.join(path)
    }

    /// Open `path` bound to `schema` at `version`
    ///
    /// Fails if the path already has a live handle.
    pub fn open(
        &self,
        schema: SchemaDefinition,
        version: u64,
        path: &str,
    ) -> StoreResult<Arc<StoreHandle>> {
        let mut slots = self.slots.write();
        match slots.get(path) {
            Some(Slot::Open(handle)) if !handle.is_closed() => {
                return Err(StoreError::ConstraintViolation(format!(
                    "store '{}' is already open",
                    path
                )))
            }
            Some(Slot::Swapping) => return Err(swapping(path)),
            _ => {}
        }

        let handle = Arc::new(self.open_handle(schema, version, path)?);
        slots.insert(path.to_string(), Slot::Open(handle.clone()));
        Ok(handle)
    }

    fn open_handle(
        &self,
        schema: SchemaDefinition,
        version: u64,
        path: &str,
    ) -> StoreResult<StoreHandle> {
        std::fs::create_dir_all(&self.data_dir)?;
        StoreHandle::open(
            self.file_path(path),
            path,
            schema,
            version,
            self.evaluator.clone(),
        )
    }

    /// The live handle for `path`
    pub fn current(&self, path: &str) -> StoreResult<Arc<StoreHandle>> {
        match self.slots.read().get(path) {
            Some(Slot::Open(handle)) if !handle.is_closed() => Ok(handle.clone()),
            Some(Slot::Open(_)) => Err(StoreError::unavailable(format!(
                "store '{}' is closed",
                path
            ))),
            Some(Slot::Swapping) => Err(swapping(path)),
            None => Err(StoreError::unavailable(format!("store '{}' is not open", path))),
        }
    }

    /// Close the live handle for `path`, if any
    pub fn close(&self, path: &str) {
        if let Some(Slot::Open(handle)) = self.slots.write().remove(path) {
            handle.close();
        }
    }

    /// Rebind `path` to `schema` at `version`
    ///
    /// The old handle is closed before the new one opens; callers racing the
    /// gap get `Unavailable`. If the new binding cannot be opened the previous
    /// one is restored and the open error is returned.
    pub fn swap(
        &self,
        schema: SchemaDefinition,
        version: u64,
        path: &str,
    ) -> StoreResult<Arc<StoreHandle>> {
        let old = {
            let mut slots = self.slots.write();
            match slots.insert(path.to_string(), Slot::Swapping) {
                Some(Slot::Open(handle)) => Some(handle),
                Some(Slot::Swapping) => {
                    slots.insert(path.to_string(), Slot::Swapping);
                    return Err(swapping(path));
                }
                None => None,
            }
        };

        if let Some(old) = &old {
            old.close();
        }
        info!(path, schema_version = version, "swapping store handle");

        match self.open_handle(schema, version, path) {
            Ok(handle) => {
                let handle = Arc::new(handle);
                self.slots
                    .write()
                    .insert(path.to_string(), Slot::Open(handle.clone()));
                Ok(handle)
            }
            Err(e) => {
                warn!(path, error = %e, "swap failed, restoring previous binding");
                self.restore(path, old.as_deref());
                Err(e)
            }
        }
    }

    fn restore(&self, path: &str, old: Option<&StoreHandle>) {
        let restored = old.and_then(|old| {
            match self.open_handle(old.schema().clone(), old.schema_version(), path) {
                Ok(handle) => Some(Arc::new(handle)),
                Err(e) => {
                    error!(path, error = %e, "could not reopen previous binding");
                    None
                }
            }
        });

        let mut slots = self.slots.write();
        match restored {
            Some(handle) => {
                slots.insert(path.to_string(), Slot::Open(handle));
            }
            None => {
                slots.remove(path);
            }
        }
    }

    /// Close every live handle
    pub fn shutdown(&self) {
        let mut slots = self.slots.write();
        for (_, slot) in slots.drain() {
            if let Slot::Open(handle) = slot {
                handle.close();
            }
        }
        info!("all stores closed");
    }
}

fn swapping(path: &str) -> StoreError {
    StoreError::unavailable(format!("store '{}' is being swapped", path))
}
