//! Service Context - the operations exposed by the store
//!
//! [`ServiceContext`] owns the meta store, the lifecycle controller and the
//! configuration of one logical path. Every external operation goes through
//! it:
//!
//! - `get_latest_meta` / `meta_history`
//! - `get_all` / `get_filtered` / `get_by_key` / `get_count`
//! - `apply_batch`
//! - `update_schema`

mod dispatch;
mod query;
mod versioning;

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::info;

use crate::config::StoreConfig;
use crate::engine::StoreHandle;
use crate::error::StoreResult;
use crate::filter::{FilterEvaluator, PredicateEvaluator};
use crate::lifecycle::LifecycleController;
use crate::meta_store::MetaStore;
use crate::types::{MetaRecord, Object, SchemaDefinition, WriteOperation};

pub use dispatch::apply;
pub use query::Results;
pub use versioning::SchemaUpdate;

/// Explicit context shared by every operation on one store
pub struct ServiceContext {
    config: StoreConfig,
    pub(crate) meta: Mutex<MetaStore>,
    pub(crate) controller: LifecycleController,
    pub(crate) schema_lock: Mutex<()>,
}

impl ServiceContext {
    /// Open the store described by `config` with the default filter evaluator
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        Self::with_evaluator(config, Arc::new(PredicateEvaluator::new()))
    }

    /// Open the store described by `config`
    ///
    /// A store file ahead of the history is recorded first. An empty history
    /// is then seeded with the default schema at version 0, and the store is
    /// opened at the latest recorded version.
    pub fn with_evaluator(
        config: StoreConfig,
        evaluator: Arc<dyn FilterEvaluator>,
    ) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        let controller = LifecycleController::new(&config.data_dir, evaluator);

        let mut meta = MetaStore::open(config.meta_file_path())?;
        versioning::reconcile_history(
            &mut meta,
            &controller.file_path(&config.store_path),
            &config.store_path,
        )?;
        meta.bootstrap(&config.store_path, &SchemaDefinition::default_schema())?;
        let latest = meta.get_latest(&config.store_path)?;

        controller.open(latest.definition()?, latest.schema_version, &config.store_path)?;

        info!(
            path = %config.store_path,
            schema_version = latest.schema_version,
            data_dir = %config.data_dir.display(),
            "service ready"
        );

        Ok(Self {
            config,
            meta: Mutex::new(meta),
            controller,
            schema_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store_path(&self) -> &str {
        &self.config.store_path
    }

    /// The live handle; `Unavailable` during a schema swap
    pub fn current_handle(&self) -> StoreResult<Arc<StoreHandle>> {
        self.controller.current(self.store_path())
    }

    pub fn get_latest_meta(&self) -> StoreResult<MetaRecord> {
        self.meta.lock().get_latest(self.store_path())
    }

    pub fn meta_history(&self) -> Vec<MetaRecord> {
        self.meta.lock().history(self.store_path())
    }

    pub fn get_all(&self, entity_type: &str) -> StoreResult<Results> {
        query::get_all(self, entity_type)
    }

    pub fn get_filtered(&self, entity_type: &str, predicate: &str) -> StoreResult<Results> {
        query::get_filtered(self, entity_type, predicate)
    }

    pub fn get_by_key(&self, entity_type: &str, key: &Value) -> StoreResult<Object> {
        query::get_by_key(self, entity_type, key)
    }

    pub fn get_count(&self, entity_type: &str) -> StoreResult<usize> {
        query::get_count(self, entity_type)
    }

    /// Parse a textual primary key for `entity_type`
    pub fn coerce_key(&self, entity_type: &str, raw: &str) -> StoreResult<Value> {
        query::coerce_key(self, entity_type, raw)
    }

    pub fn apply_batch(&self, batch: &[WriteOperation]) -> StoreResult<()> {
        dispatch::apply_batch(self, batch)
    }

    pub fn update_schema(&self, schema: SchemaDefinition) -> StoreResult<SchemaUpdate> {
        versioning::update_schema(self, schema)
    }

    /// Close the live store
    pub fn shutdown(&self) {
        self.controller.shutdown();
    }
}
