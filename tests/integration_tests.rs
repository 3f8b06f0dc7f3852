//! Integration tests for the Schema Store service

use std::sync::Arc;
use std::thread;

use serde_json::{json, Value};
use tempfile::TempDir;

use schema_store::{
    EntityType, ErrorKind, Object, Property, ScalarKind, SchemaDefinition, ServiceContext,
    StoreConfig, StoreError, WriteBatch, WriteOperation,
};

fn setup_test_ctx() -> (ServiceContext, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let ctx = ServiceContext::open(StoreConfig::new(temp_dir.path())).unwrap();
    (ctx, temp_dir)
}

fn obj(value: Value) -> Object {
    value.as_object().cloned().unwrap()
}

fn add(entity_type: &str, payload: Value) -> WriteOperation {
    WriteOperation::Add {
        entity_type: entity_type.to_string(),
        payload: obj(payload),
    }
}

fn cat_schema() -> SchemaDefinition {
    SchemaDefinition::new(vec![EntityType::new("Cat", "id")
        .with_property("id", Property::scalar(ScalarKind::Int))
        .with_property("name", Property::scalar(ScalarKind::String))])
}

#[test]
fn test_bootstrap_uses_default_schema() {
    let (ctx, _temp_dir) = setup_test_ctx();

    let latest = ctx.get_latest_meta().unwrap();
    assert_eq!(latest.schema_version, 0);
    assert_eq!(latest.path, "default.store");
    assert_eq!(latest.definition().unwrap(), SchemaDefinition::default_schema());
}

#[test]
fn test_person_dog_nest_scenario() {
    let (ctx, _temp_dir) = setup_test_ctx();

    ctx.apply_batch(&[
        add("Person", json!({"id": 1, "name": "A"})),
        add("Dog", json!({"id": 1, "name": "Rex", "breed": "Lab"})),
        WriteOperation::Nest {
            entity_type: "Person".to_string(),
            payload: obj(json!({"id": 1, "name": "Rex", "breed": "Lab"})),
            filter: "id=1".to_string(),
            property: "dogs".to_string(),
        },
    ])
    .unwrap();

    let person = ctx.get_by_key("Person", &json!(1)).unwrap();
    assert_eq!(person["dogs"], json!([{"id": 1, "name": "Rex", "breed": "Lab"}]));
}

#[test]
fn test_batch_is_atomic() {
    let (ctx, _temp_dir) = setup_test_ctx();
    ctx.apply_batch(&[add("Person", json!({"id": 1, "name": "A"}))]).unwrap();
    let dogs_before = ctx.get_count("Dog").unwrap();

    let err = ctx
        .apply_batch(&[
            add("Dog", json!({"id": 7, "name": "Rex", "breed": "Lab"})),
            WriteOperation::Nest {
                entity_type: "Person".to_string(),
                payload: obj(json!({"id": 8, "name": "Fido", "breed": "Pug"})),
                filter: "id == 1".to_string(),
                property: "friends".to_string(),
            },
        ])
        .unwrap_err();

    assert!(matches!(err, StoreError::TransactionAborted { index: 1, .. }));
    assert_eq!(err.root_kind(), ErrorKind::PropertyNotFound);
    assert_eq!(ctx.get_count("Dog").unwrap(), dogs_before);
}

#[test]
fn test_delete_and_delete_all() {
    let (ctx, _temp_dir) = setup_test_ctx();
    ctx.apply_batch(&[
        add("Dog", json!({"id": 1, "name": "Rex", "breed": "Lab", "age": 2.0})),
        add("Dog", json!({"id": 2, "name": "Fido", "breed": "Pug", "age": 9.0})),
        add("Dog", json!({"id": 3, "name": "Max", "breed": "Lab", "age": 11.0})),
    ])
    .unwrap();

    ctx.apply_batch(&[WriteOperation::Delete {
        entity_type: "Dog".to_string(),
        filter: "age > 5 AND breed != 'Pug'".to_string(),
    }])
    .unwrap();

    let remaining: Vec<Value> = ctx
        .get_all("Dog")
        .unwrap()
        .to_vec()
        .unwrap()
        .into_iter()
        .map(|d| d["id"].clone())
        .collect();
    assert_eq!(remaining, vec![json!(1), json!(2)]);

    ctx.apply_batch(&[WriteOperation::DeleteAll {
        entity_type: "Dog".to_string(),
    }])
    .unwrap();
    assert_eq!(ctx.get_count("Dog").unwrap(), 0);
}

#[test]
fn test_update_multiple() {
    let (ctx, _temp_dir) = setup_test_ctx();
    ctx.apply_batch(&[
        add("Dog", json!({"id": 1, "name": "Rex", "breed": "Lab"})),
        add("Dog", json!({"id": 2, "name": "Fido", "breed": "Pug"})),
        WriteOperation::UpdateMultiple {
            entity_type: "Dog".to_string(),
            payload: obj(json!({"breed": "Mixed"})),
            filter: "name CONTAINS[c] 'R'".to_string(),
        },
    ])
    .unwrap();

    let mixed = ctx.get_filtered("Dog", "breed == 'Mixed'").unwrap().to_vec().unwrap();
    assert_eq!(mixed.len(), 1);
    assert_eq!(mixed[0]["name"], "Rex");
}

#[test]
fn test_batch_from_request_json() {
    let (ctx, _temp_dir) = setup_test_ctx();
    let batch: WriteBatch = serde_json::from_value(json!([
        {"schema": "Person", "object": {"id": 1, "name": "A"}},
        {"action": "nest", "schema": "Person", "object": {"id": 5, "name": "Rex", "breed": "Lab"},
         "filter": "id == 1", "property": "dogs"},
        {"action": "update", "schema": "Dog", "object": {"id": 5, "age": 4}}
    ]))
    .unwrap();

    ctx.apply_batch(&batch).unwrap();

    let person = ctx.get_by_key("Person", &json!(1)).unwrap();
    assert_eq!(person["dogs"][0]["age"], 4);
}

#[test]
fn test_schema_versions_strictly_increase() {
    let (ctx, _temp_dir) = setup_test_ctx();

    let mut last = ctx.get_latest_meta().unwrap().schema_version;
    for schema in [cat_schema(), SchemaDefinition::default_schema(), cat_schema()] {
        let update = ctx.update_schema(schema.clone()).unwrap();
        assert_eq!(update.schema_version, last + 1);

        let latest = ctx.get_latest_meta().unwrap();
        assert_eq!(latest.schema_version, update.schema_version);
        assert_eq!(latest.definition().unwrap(), schema);
        last = update.schema_version;
    }

    assert_eq!(ctx.meta_history().len(), 4);
}

#[test]
fn test_reopen_restores_schema_and_objects() {
    let temp_dir = TempDir::new().unwrap();

    {
        let ctx = ServiceContext::open(StoreConfig::new(temp_dir.path())).unwrap();
        ctx.update_schema(cat_schema()).unwrap();
        ctx.apply_batch(&[add("Cat", json!({"id": 1, "name": "Tom"}))]).unwrap();
        ctx.shutdown();
    }

    let ctx = ServiceContext::open(StoreConfig::new(temp_dir.path())).unwrap();
    assert_eq!(ctx.get_latest_meta().unwrap().schema_version, 1);
    assert_eq!(ctx.get_by_key("Cat", &json!(1)).unwrap()["name"], "Tom");
}

#[test]
fn test_swap_invalidates_old_results() {
    let (ctx, _temp_dir) = setup_test_ctx();
    let stale = ctx.get_all("Person").unwrap();

    ctx.update_schema(cat_schema()).unwrap();

    assert_eq!(stale.to_vec().unwrap_err().kind(), ErrorKind::Unavailable);
    assert_eq!(ctx.get_count("Cat").unwrap(), 0);
    assert_eq!(ctx.get_count("Person").unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_separate_paths_are_independent() {
    let temp_dir = TempDir::new().unwrap();
    let first = ServiceContext::open(StoreConfig::new(temp_dir.path())).unwrap();
    let second =
        ServiceContext::open(StoreConfig::new(temp_dir.path()).with_store_path("other.store"))
            .unwrap();

    first.update_schema(cat_schema()).unwrap();

    assert_eq!(first.get_latest_meta().unwrap().schema_version, 1);
    assert_eq!(second.get_latest_meta().unwrap().schema_version, 0);
}

#[test]
fn test_concurrent_batches_never_interleave() {
    let (ctx, _temp_dir) = setup_test_ctx();
    let ctx = Arc::new(ctx);

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || {
                for i in 0..10 {
                    let base = (t * 100 + i * 2) as i64;
                    ctx.apply_batch(&[
                        add("Dog", json!({"id": base, "name": "a", "breed": "x"})),
                        add("Dog", json!({"id": base + 1, "name": "b", "breed": "x"})),
                    ])
                    .unwrap();
                }
            })
        })
        .collect();

    let reader = {
        let ctx = Arc::clone(&ctx);
        thread::spawn(move || {
            for _ in 0..50 {
                assert_eq!(ctx.get_count("Dog").unwrap() % 2, 0);
            }
        })
    };

    for handle in writers {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    assert_eq!(ctx.get_count("Dog").unwrap(), 80);
}
