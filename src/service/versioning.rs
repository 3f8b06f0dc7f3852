//! Schema version manager

use std::path::Path;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::engine::StoreHandle;
use crate::error::{StoreError, StoreResult};
use crate::meta_store::MetaStore;
use crate::types::{MetaRecord, SchemaDefinition};

use super::ServiceContext;

/// Outcome of a schema update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaUpdate {
    pub schema_version: u64,
    pub success: bool,
}

/// Move the store of `ctx` to `schema` at the next version
///
/// The handle is rebound first and the new meta record is appended only once
/// the rebound store reports the new version. If that check fails the handle
/// stays on the new schema while the history does not advance.
pub fn update_schema(ctx: &ServiceContext, schema: SchemaDefinition) -> StoreResult<SchemaUpdate> {
    schema.validate()?;

    let _guard = ctx.schema_lock.lock();
    let path = ctx.store_path();
    let file_path = ctx.controller.file_path(path);

    let next = {
        let mut meta = ctx.meta.lock();
        reconcile_history(&mut meta, &file_path, path)?;
        meta.current_version(path).map_or(0, |v| v + 1)
    };

    let handle = ctx.controller.swap(schema.clone(), next, path)?;
    record_rebind(ctx, &handle, &schema, next)?;

    Ok(SchemaUpdate {
        schema_version: next,
        success: true,
    })
}

/// Append the meta record for a rebound handle once its store file is at `version`
fn record_rebind(
    ctx: &ServiceContext,
    handle: &StoreHandle,
    schema: &SchemaDefinition,
    version: u64,
) -> StoreResult<()> {
    let path = handle.path();
    let persisted = StoreHandle::persisted_version(handle.file_path())?;
    if persisted != Some(version) {
        error!(
            path,
            expected = version,
            persisted = ?persisted,
            "store version differs after swap; meta history not advanced"
        );
        return Err(StoreError::VersionConflict {
            path: path.to_string(),
            attempted: version,
            current: persisted.unwrap_or_default(),
        });
    }

    ctx.meta.lock().append(MetaRecord::new(version, schema, path)?)?;
    info!(path, schema_version = version, "schema updated");
    Ok(())
}

/// Catch the history of `path` up with a store file that is ahead of it
///
/// A rebind whose meta append failed leaves the store file one version
/// ahead. The missing record is rebuilt from the schema saved in that file.
/// Returns whether a record was appended.
pub(crate) fn reconcile_history(
    meta: &mut MetaStore,
    file_path: &Path,
    path: &str,
) -> StoreResult<bool> {
    let Some((version, schema)) = StoreHandle::persisted_schema(file_path)? else {
        return Ok(false);
    };
    if meta.current_version(path).is_some_and(|current| current >= version) {
        return Ok(false);
    }

    warn!(
        path,
        schema_version = version,
        "store file is ahead of the meta history, recording its schema"
    );
    meta.append(MetaRecord::new(version, &schema, path)?)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::ErrorKind;
    use crate::types::{EntityType, Property, ScalarKind};
    use tempfile::TempDir;

    fn create_test_context() -> (ServiceContext, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ServiceContext::open(StoreConfig::new(temp_dir.path())).unwrap();
        (ctx, temp_dir)
    }

    fn cat_schema() -> SchemaDefinition {
        SchemaDefinition::new(vec![EntityType::new("Cat", "name")
            .with_property("name", Property::scalar(ScalarKind::String))
            .with_property("lives", Property::optional(ScalarKind::Int))])
    }

    #[test]
    fn test_versions_strictly_increase() {
        let (ctx, _temp_dir) = create_test_context();
        assert_eq!(ctx.get_latest_meta().unwrap().schema_version, 0);

        let first = update_schema(&ctx, cat_schema()).unwrap();
        let second = update_schema(&ctx, SchemaDefinition::default_schema()).unwrap();

        assert_eq!(first.schema_version, 1);
        assert_eq!(second.schema_version, 2);
        assert!(second.success);
        assert_eq!(ctx.get_latest_meta().unwrap().schema_version, 2);
    }

    #[test]
    fn test_latest_meta_carries_new_schema() {
        let (ctx, _temp_dir) = create_test_context();
        update_schema(&ctx, cat_schema()).unwrap();

        let latest = ctx.get_latest_meta().unwrap();
        assert_eq!(latest.definition().unwrap(), cat_schema());
        assert!(ctx.get_count("Cat").is_ok());
        assert_eq!(ctx.get_count("Dog").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_invalid_schema_rejected_before_swap() {
        let (ctx, _temp_dir) = create_test_context();
        let broken = SchemaDefinition::new(vec![EntityType::new("Cat", "missing")
            .with_property("name", Property::scalar(ScalarKind::String))]);

        assert!(update_schema(&ctx, broken).is_err());
        assert_eq!(ctx.get_latest_meta().unwrap().schema_version, 0);
        assert!(ctx.get_count("Dog").is_ok());
    }

    #[test]
    fn test_old_handle_unavailable_after_update() {
        let (ctx, _temp_dir) = create_test_context();
        let dogs = ctx.get_all("Dog").unwrap();

        update_schema(&ctx, cat_schema()).unwrap();

        assert_eq!(dogs.len().unwrap_err().kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_rebind_not_recorded_when_store_version_differs() {
        let (ctx, _temp_dir) = create_test_context();
        let live = ctx.current_handle().unwrap();

        let err = record_rebind(&ctx, &live, &cat_schema(), 1).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::VersionConflict);
        assert_eq!(ctx.meta_history().len(), 1);
        assert_eq!(ctx.get_latest_meta().unwrap().schema_version, 0);
    }

    /// Make the next meta append fail, run `update`, then put the history back
    fn with_meta_unwritable<T>(ctx: &ServiceContext, update: impl FnOnce() -> T) -> T {
        let meta_path = ctx.config().meta_file_path();
        let saved = std::fs::read_to_string(&meta_path).unwrap();
        std::fs::remove_file(&meta_path).unwrap();
        std::fs::create_dir(&meta_path).unwrap();

        let result = update();

        std::fs::remove_dir(&meta_path).unwrap();
        std::fs::write(&meta_path, saved).unwrap();
        result
    }

    #[test]
    fn test_failed_meta_append_recovered_by_next_update() {
        let (ctx, _temp_dir) = create_test_context();

        let failed = with_meta_unwritable(&ctx, || update_schema(&ctx, cat_schema()));
        assert!(failed.is_err());
        assert_eq!(ctx.get_latest_meta().unwrap().schema_version, 0);

        let next = update_schema(&ctx, SchemaDefinition::default_schema()).unwrap();
        assert_eq!(next.schema_version, 2);

        let history = ctx.meta_history();
        let versions: Vec<u64> = history.iter().map(|r| r.schema_version).collect();
        assert_eq!(versions, vec![0, 1, 2]);
        assert_eq!(history[1].definition().unwrap(), cat_schema());
    }

    #[test]
    fn test_failed_meta_append_recovered_on_reopen() {
        let (ctx, temp_dir) = create_test_context();

        let failed = with_meta_unwritable(&ctx, || update_schema(&ctx, cat_schema()));
        assert!(failed.is_err());
        ctx.shutdown();
        drop(ctx);

        let ctx = ServiceContext::open(StoreConfig::new(temp_dir.path())).unwrap();
        let latest = ctx.get_latest_meta().unwrap();
        assert_eq!(latest.schema_version, 1);
        assert_eq!(latest.definition().unwrap(), cat_schema());
        assert_eq!(ctx.get_count("Cat").unwrap(), 0);
        ctx.shutdown();
        drop(ctx);

        let ctx = ServiceContext::open(StoreConfig::new(temp_dir.path())).unwrap();
        assert_eq!(ctx.meta_history().len(), 2);
        assert_eq!(update_schema(&ctx, cat_schema()).unwrap().schema_version, 2);
    }
}
