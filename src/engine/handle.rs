//! Store handle: a live binding of one persisted store to a schema and version

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::collections::Collections;
use super::transaction::Transaction;
use crate::error::{StoreError, StoreResult};
use crate::filter::{select, FilterEvaluator};
use crate::types::{Object, Property, SchemaDefinition};
use crate::utils::{atomic_write_json, cleanup_temp_file};

/// On-disk layout of a data store
#[derive(Deserialize)]
struct PersistedStore {
    #[serde(rename = "schemaVersion")]
    schema_version: u64,
    schema: SchemaDefinition,
    #[serde(default)]
    objects: BTreeMap<String, Vec<Object>>,
}

#[derive(Serialize)]
struct PersistedStoreRef<'a> {
    #[serde(rename = "schemaVersion")]
    schema_version: u64,
    schema: &'a SchemaDefinition,
    objects: BTreeMap<&'a str, &'a [Object]>,
}

#[derive(Deserialize)]
struct PersistedHeader {
    #[serde(rename = "schemaVersion")]
    schema_version: u64,
    schema: SchemaDefinition,
}

/// Live binding to one (schema, version, path) triple
///
/// Readers take an `Arc` snapshot of the collections; writers run one at a
/// time and publish a new snapshot on commit. Once closed, every operation
/// fails with `Unavailable`.
pub struct StoreHandle {
    path: String,
    file_path: PathBuf,
    schema: SchemaDefinition,
    schema_version: u64,
    evaluator: Arc<dyn FilterEvaluator>,
    state: RwLock<Arc<Collections>>,
    writer: Mutex<()>,
    closed: AtomicBool,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("path", &self.path)
            .field("schema_version", &self.schema_version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl StoreHandle {
    /// Attach to the store persisted at `file_path`
    ///
    /// A missing file is initialized empty for `schema` at `schema_version`.
    /// An existing file must be at the same version with the same schema, or
    /// at a lower version, in which case its rows are migrated.
    pub fn open<P: AsRef<Path>>(
        file_path: P,
        path: &str,
        schema: SchemaDefinition,
        schema_version: u64,
        evaluator: Arc<dyn FilterEvaluator>,
    ) -> StoreResult<Self> {
        schema.validate()?;
        let file_path = file_path.as_ref().to_path_buf();

        if cleanup_temp_file(&file_path)? {
            warn!(path, "removed leftover temp file from an interrupted commit");
        }

        let (collections, needs_persist) = if file_path.exists() {
            let persisted: PersistedStore = serde_json::from_str(&fs::read_to_string(&file_path)?)?;

            if persisted.schema_version > schema_version {
                return Err(StoreError::VersionConflict {
                    path: path.to_string(),
                    attempted: schema_version,
                    current: persisted.schema_version,
                });
            }

            if persisted.schema_version == schema_version {
                if persisted.schema != schema {
                    return Err(StoreError::SchemaMismatch(format!(
                        "store '{}' at version {} was created with a different schema",
                        path, schema_version
                    )));
                }
                (Collections::from_rows(&schema, persisted.objects)?, false)
            } else {
                info!(
                    path,
                    from = persisted.schema_version,
                    to = schema_version,
                    "migrating store to new schema version"
                );
                let rows = migrate(&persisted.schema, &schema, persisted.objects)?;
                let collections = Collections::from_rows(&schema, rows)
                    .map_err(|e| StoreError::SchemaMismatch(e.to_string()))?;
                (collections, true)
            }
        } else {
            (Collections::empty(&schema), true)
        };

        let handle = Self {
            path: path.to_string(),
            file_path,
            schema,
            schema_version,
            evaluator,
            state: RwLock::new(Arc::new(collections)),
            writer: Mutex::new(()),
            closed: AtomicBool::new(false),
        };

        if needs_persist {
            let snapshot = handle.state.read().clone();
            handle.persist(&snapshot)?;
        }

        info!(path, schema_version, "store opened");
        Ok(handle)
    }

    /// Version recorded in the store file at `file_path`, if it exists
    pub fn persisted_version<P: AsRef<Path>>(file_path: P) -> StoreResult<Option<u64>> {
        Ok(Self::persisted_schema(file_path)?.map(|(version, _)| version))
    }

    /// Version and schema recorded in the store file at `file_path`, if it exists
    pub fn persisted_schema<P: AsRef<Path>>(
        file_path: P,
    ) -> StoreResult<Option<(u64, SchemaDefinition)>> {
        let file_path = file_path.as_ref();
        if !file_path.exists() {
            return Ok(None);
        }
        let header: PersistedHeader = serde_json::from_str(&fs::read_to_string(file_path)?)?;
        Ok(Some((header.schema_version, header.schema)))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn schema(&self) -> &SchemaDefinition {
        &self.schema
    }

    pub fn schema_version(&self) -> u64 {
        self.schema_version
    }

    pub fn evaluator(&self) -> &dyn FilterEvaluator {
        self.evaluator.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Release the handle once any in-flight write has finished
    pub fn close(&self) {
        let _guard = self.writer.lock();
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!(path = %self.path, schema_version = self.schema_version, "store closed");
        }
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.is_closed() {
            return Err(StoreError::unavailable(format!(
                "store '{}' (version {}) is closed",
                self.path, self.schema_version
            )));
        }
        Ok(())
    }

    /// Current committed state
    pub fn snapshot(&self) -> StoreResult<Arc<Collections>> {
        self.ensure_open()?;
        Ok(self.state.read().clone())
    }

    /// Run `f` in a write transaction, committing only if it returns `Ok`
    pub fn write<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> StoreResult<T>,
    {
        let _guard = self.writer.lock();
        self.ensure_open()?;

        let base = self.state.read().clone();
        let mut txn = Transaction::new(&self.schema, self.evaluator.as_ref(), (*base).clone());
        let output = f(&mut txn)?;

        let committed = Arc::new(txn.into_collections());
        self.persist(&committed)?;
        *self.state.write() = committed;

        debug!(path = %self.path, "transaction committed");
        Ok(output)
    }

    fn persist(&self, collections: &Collections) -> StoreResult<()> {
        let persisted = PersistedStoreRef {
            schema_version: self.schema_version,
            schema: &self.schema,
            objects: collections.rows_by_type(),
        };
        atomic_write_json(&self.file_path, &persisted)?;
        Ok(())
    }

    /// Materialized objects of `entity_type`, optionally filtered, in store order
    pub fn objects(&self, entity_type: &str, predicate: Option<&str>) -> StoreResult<Vec<Object>> {
        let snapshot = self.snapshot()?;
        let rows = snapshot.table(entity_type)?.rows();

        let selected: Vec<&Object> = match predicate {
            Some(predicate) => select(self.evaluator.as_ref(), predicate, rows)?
                .into_iter()
                .filter_map(|i| rows.get(i))
                .collect(),
            None => rows.iter().collect(),
        };

        Ok(selected
            .into_iter()
            .map(|row| snapshot.materialize(&self.schema, entity_type, row))
            .collect())
    }

    /// Number of objects of `entity_type`, optionally filtered
    pub fn count(&self, entity_type: &str, predicate: Option<&str>) -> StoreResult<usize> {
        let snapshot = self.snapshot()?;
        let rows = snapshot.table(entity_type)?.rows();
        match predicate {
            Some(predicate) => Ok(select(self.evaluator.as_ref(), predicate, rows)?.len()),
            None => Ok(rows.len()),
        }
    }

    /// The object of `entity_type` whose primary key equals `key`
    pub fn object_for_primary_key(&self, entity_type: &str, key: &Value) -> StoreResult<Object> {
        let snapshot = self.snapshot()?;
        let row = snapshot.table(entity_type)?.get(key).ok_or_else(|| {
            StoreError::not_found(format!("{} with primary key {}", entity_type, key))
        })?;
        Ok(snapshot.materialize(&self.schema, entity_type, row))
    }
}

/// Carry rows over from `old` to `new`
///
/// Entity types and properties missing from `new` are dropped; new optional
/// properties stay unset and new lists start empty. A value that no longer
/// fits its property, or a new required property, makes the schemas
/// incompatible.
fn migrate(
    old: &SchemaDefinition,
    new: &SchemaDefinition,
    mut rows: BTreeMap<String, Vec<Object>>,
) -> StoreResult<BTreeMap<String, Vec<Object>>> {
    let mut migrated = BTreeMap::new();

    for declared in &new.entity_types {
        let old_rows = match old.entity_type(&declared.name) {
            Some(_) => rows.remove(&declared.name).unwrap_or_default(),
            None => Vec::new(),
        };

        let mut out = Vec::with_capacity(old_rows.len());
        for row in old_rows {
            let mut next = Object::new();
            for (name, property) in &declared.properties {
                match (property, row.get(name)) {
                    (Property::List { .. }, Some(Value::Array(items))) => {
                        next.insert(name.clone(), Value::Array(items.clone()));
                    }
                    (Property::List { .. }, _) => {
                        next.insert(name.clone(), Value::Array(Vec::new()));
                    }
                    (Property::Scalar { optional: true, .. }, Some(Value::Null)) => {
                        next.insert(name.clone(), Value::Null);
                    }
                    (Property::Scalar { kind, .. }, Some(value)) if kind.accepts(value) => {
                        next.insert(name.clone(), value.clone());
                    }
                    (Property::Scalar { optional: true, .. }, None) => {}
                    _ => {
                        return Err(StoreError::SchemaMismatch(format!(
                            "cannot migrate {}.{} to the new schema",
                            declared.name, name
                        )))
                    }
                }
            }
            out.push(next);
        }
        migrated.insert(declared.name.clone(), out);
    }

    Ok(migrated)
}
