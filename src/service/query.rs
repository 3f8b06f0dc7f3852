//! Query façade: read-only access to the current store

use std::sync::Arc;

use serde_json::Value;

use crate::engine::StoreHandle;
use crate::error::{StoreError, StoreResult};
use crate::types::{Object, ScalarKind};

use super::ServiceContext;

/// A lazily evaluated query over one entity type
///
/// Nothing is read until [`Results::to_vec`] or [`Results::len`] is called,
/// and every call reads the handle's latest committed state. Results stay
/// bound to the handle they were created from; once a schema swap closes it
/// they fail with `Unavailable`.
#[derive(Clone)]
pub struct Results {
    handle: Arc<StoreHandle>,
    entity_type: String,
    predicate: Option<String>,
}

impl Results {
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    /// Materialized objects in store order
    pub fn to_vec(&self) -> StoreResult<Vec<Object>> {
        self.handle.objects(&self.entity_type, self.predicate())
    }

    pub fn len(&self) -> StoreResult<usize> {
        self.handle.count(&self.entity_type, self.predicate())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Narrow these results with a further predicate
    pub fn filtered(&self, predicate: &str) -> Results {
        let predicate = match &self.predicate {
            Some(existing) => format!("({}) AND ({})", existing, predicate),
            None => predicate.to_string(),
        };
        Results {
            handle: self.handle.clone(),
            entity_type: self.entity_type.clone(),
            predicate: Some(predicate),
        }
    }
}

fn results(ctx: &ServiceContext, entity_type: &str, predicate: Option<&str>) -> StoreResult<Results> {
    let handle = ctx.current_handle()?;
    handle.schema().require(entity_type)?;
    Ok(Results {
        handle,
        entity_type: entity_type.to_string(),
        predicate: predicate.map(str::to_string),
    })
}

/// Every object of `entity_type`
pub fn get_all(ctx: &ServiceContext, entity_type: &str) -> StoreResult<Results> {
    results(ctx, entity_type, None)
}

/// Objects of `entity_type` matching `predicate`
///
/// The predicate is checked on first evaluation, not here.
pub fn get_filtered(ctx: &ServiceContext, entity_type: &str, predicate: &str) -> StoreResult<Results> {
    results(ctx, entity_type, Some(predicate))
}

/// The object of `entity_type` with primary key `key`
pub fn get_by_key(ctx: &ServiceContext, entity_type: &str, key: &Value) -> StoreResult<Object> {
    ctx.current_handle()?.object_for_primary_key(entity_type, key)
}

/// Number of objects of `entity_type`
pub fn get_count(ctx: &ServiceContext, entity_type: &str) -> StoreResult<usize> {
    ctx.current_handle()?.count(entity_type, None)
}

/// Interpret a textual key as the primary key kind of `entity_type`
pub fn coerce_key(ctx: &ServiceContext, entity_type: &str, raw: &str) -> StoreResult<Value> {
    let handle = ctx.current_handle()?;
    let declared = handle.schema().require(entity_type)?;
    match declared.primary_key_kind() {
        Some(ScalarKind::Int) => raw.parse::<i64>().map(Value::from).map_err(|_| {
            StoreError::invalid(format!(
                "primary key of {} is an int, got '{}'",
                entity_type, raw
            ))
        }),
        _ => Ok(Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::error::ErrorKind;
    use crate::types::WriteOperation;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_context() -> (ServiceContext, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ServiceContext::open(StoreConfig::new(temp_dir.path())).unwrap();

        let dogs = [(1, "Rex", "Lab"), (2, "Fido", "Pug"), (3, "Max", "Lab")];
        let batch: Vec<WriteOperation> = dogs
            .iter()
            .map(|(id, name, breed)| WriteOperation::Add {
                entity_type: "Dog".to_string(),
                payload: json!({"id": id, "name": name, "breed": breed})
                    .as_object()
                    .cloned()
                    .unwrap(),
            })
            .collect();
        ctx.apply_batch(&batch).unwrap();

        (ctx, temp_dir)
    }

    #[test]
    fn test_all_in_store_order() {
        let (ctx, _temp_dir) = create_test_context();
        let dogs = get_all(&ctx, "Dog").unwrap().to_vec().unwrap();
        let ids: Vec<i64> = dogs.iter().map(|d| d["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_results_are_live() {
        let (ctx, _temp_dir) = create_test_context();
        let all = get_all(&ctx, "Dog").unwrap();
        assert_eq!(all.len().unwrap(), 3);

        ctx.apply_batch(&[WriteOperation::DeleteAll {
            entity_type: "Dog".to_string(),
        }])
        .unwrap();

        assert!(all.is_empty().unwrap());
    }

    #[test]
    fn test_filtered_results_conjoin() {
        let (ctx, _temp_dir) = create_test_context();
        let labs = get_filtered(&ctx, "Dog", "breed == 'Lab'").unwrap();
        assert_eq!(labs.len().unwrap(), 2);

        let max = labs.filtered("name BEGINSWITH[c] 'm'");
        let found = max.to_vec().unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["name"], "Max");
    }

    #[test]
    fn test_by_key_and_count() {
        let (ctx, _temp_dir) = create_test_context();

        let key = coerce_key(&ctx, "Dog", "2").unwrap();
        assert_eq!(get_by_key(&ctx, "Dog", &key).unwrap()["name"], "Fido");
        assert_eq!(get_count(&ctx, "Dog").unwrap(), 3);

        let err = get_by_key(&ctx, "Dog", &json!(42)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_unknown_type_not_found() {
        let (ctx, _temp_dir) = create_test_context();
        assert_eq!(get_all(&ctx, "Cat").err().map(|e| e.kind()), Some(ErrorKind::NotFound));
        assert_eq!(get_count(&ctx, "Cat").unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_bad_key_rejected() {
        let (ctx, _temp_dir) = create_test_context();
        let err = coerce_key(&ctx, "Dog", "abc").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
