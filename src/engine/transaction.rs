//! Write transactions
//!
//! A [`Transaction`] works on a private copy of the store's collections. The
//! owning handle publishes that copy only after the closure that drives the
//! transaction returns `Ok`, so a failed transaction leaves no trace.

use std::collections::HashSet;

use serde_json::Value;

use super::collections::{index_key, Collections};
use crate::error::{StoreError, StoreResult};
use crate::filter::{select, FilterEvaluator};
use crate::types::{EntityType, Object, Property, SchemaDefinition};

/// Scoped write context over a working copy of the collections
pub struct Transaction<'a> {
    schema: &'a SchemaDefinition,
    evaluator: &'a dyn FilterEvaluator,
    collections: Collections,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        schema: &'a SchemaDefinition,
        evaluator: &'a dyn FilterEvaluator,
        collections: Collections,
    ) -> Self {
        Self {
            schema,
            evaluator,
            collections,
        }
    }

    pub(crate) fn into_collections(self) -> Collections {
        self.collections
    }

    pub fn schema(&self) -> &SchemaDefinition {
        self.schema
    }

    /// Stored rows of `entity_type` (list properties hold primary keys)
    pub fn objects(&self, entity_type: &str) -> StoreResult<&[Object]> {
        Ok(self.collections.table(entity_type)?.rows())
    }

    /// Positions of the rows of `entity_type` matching `predicate`, in store order
    pub fn select(&self, entity_type: &str, predicate: &str) -> StoreResult<Vec<usize>> {
        let rows = self.objects(entity_type)?;
        select(self.evaluator, predicate, rows)
    }

    /// Read a row with its list references resolved
    pub fn materialize(&self, entity_type: &str, position: usize) -> StoreResult<Object> {
        let row = self
            .objects(entity_type)?
            .get(position)
            .ok_or_else(|| StoreError::not_found(format!("{} row {}", entity_type, position)))?;
        Ok(self.collections.materialize(self.schema, entity_type, row))
    }

    /// Insert a new object; an existing primary key is a constraint violation
    pub fn insert(&mut self, entity_type: &str, payload: &Object) -> StoreResult<Value> {
        let schema = self.schema;
        let declared = schema.require(entity_type)?;
        let key = primary_key_of(declared, payload)?;
        if self.collections.table(entity_type)?.position(&key).is_some() {
            return Err(StoreError::ConstraintViolation(format!(
                "{} with primary key {} already exists",
                entity_type, key
            )));
        }

        let row = self.build_row(declared, payload, None)?;
        self.collections.table_mut(entity_type)?.push(row, &key);
        Ok(key)
    }

    /// Insert, or overwrite the given fields of the object with the same primary key
    pub fn upsert(&mut self, entity_type: &str, payload: &Object) -> StoreResult<Value> {
        let schema = self.schema;
        let declared = schema.require(entity_type)?;
        let key = primary_key_of(declared, payload)?;
        let table = self.collections.table(entity_type)?;

        match table.position(&key) {
            Some(position) => {
                let existing = table.rows()[position].clone();
                let row = self.build_row(declared, payload, Some(existing))?;
                if let Some(slot) = self.collections.table_mut(entity_type)?.row_mut(position) {
                    *slot = row;
                }
            }
            None => {
                let row = self.build_row(declared, payload, None)?;
                self.collections.table_mut(entity_type)?.push(row, &key);
            }
        }
        Ok(key)
    }

    /// Set each field of `payload` on the row at `position`
    ///
    /// The primary key cannot be changed this way.
    pub fn assign(&mut self, entity_type: &str, position: usize, payload: &Object) -> StoreResult<()> {
        let schema = self.schema;
        let declared = schema.require(entity_type)?;
        let existing = self
            .collections
            .table(entity_type)?
            .rows()
            .get(position)
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("{} row {}", entity_type, position)))?;

        if let Some(new_key) = payload.get(&declared.primary_key) {
            if existing.get(&declared.primary_key) != Some(new_key) {
                return Err(StoreError::invalid(format!(
                    "cannot change primary key '{}' of {}",
                    declared.primary_key, entity_type
                )));
            }
        }

        let row = self.build_row(declared, payload, Some(existing))?;
        if let Some(slot) = self.collections.table_mut(entity_type)?.row_mut(position) {
            *slot = row;
        }
        Ok(())
    }

    /// Append `element` to the list `property` of the row at `position`
    ///
    /// `element` is upserted into the list's target type and referenced by key.
    /// An unset list is created empty first.
    pub fn append_to_list(
        &mut self,
        entity_type: &str,
        position: usize,
        property: &str,
        element: &Object,
    ) -> StoreResult<()> {
        let schema = self.schema;
        let declared = schema.require(entity_type)?;
        let Some(Property::List { object_type }) = declared.property(property) else {
            return Err(StoreError::PropertyNotFound {
                entity_type: entity_type.to_string(),
                property: property.to_string(),
            });
        };

        let key = self.upsert(object_type, element)?;

        let row = self
            .collections
            .table_mut(entity_type)?
            .row_mut(position)
            .ok_or_else(|| StoreError::not_found(format!("{} row {}", entity_type, position)))?;
        let list = row
            .entry(property.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if list.is_null() {
            *list = Value::Array(Vec::new());
        }
        match list {
            Value::Array(items) => {
                items.push(key);
                Ok(())
            }
            _ => Err(StoreError::PropertyNotFound {
                entity_type: entity_type.to_string(),
                property: property.to_string(),
            }),
        }
    }

    /// Delete the rows at `positions`, dropping references to them from every list
    pub fn delete(&mut self, entity_type: &str, positions: &[usize]) -> StoreResult<usize> {
        let positions: HashSet<usize> = positions.iter().copied().collect();
        let removed = self
            .collections
            .table_mut(entity_type)?
            .remove_positions(&positions);
        let count = removed.len();
        self.unlink(entity_type, &removed)?;
        Ok(count)
    }

    /// Delete every row of `entity_type`
    pub fn delete_all(&mut self, entity_type: &str) -> StoreResult<usize> {
        let removed = self.collections.table_mut(entity_type)?.clear();
        let count = removed.len();
        self.unlink(entity_type, &removed)?;
        Ok(count)
    }

    fn unlink(&mut self, target_type: &str, keys: &[Value]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let dead: HashSet<String> = keys.iter().map(index_key).collect();

        let schema = self.schema;
        for declared in &schema.entity_types {
            for (name, property) in &declared.properties {
                let Property::List { object_type } = property else {
                    continue;
                };
                if object_type != target_type {
                    continue;
                }
                for row in self.collections.table_mut(&declared.name)?.rows_mut() {
                    if let Some(Value::Array(items)) = row.get_mut(name) {
                        items.retain(|k| !dead.contains(&index_key(k)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Validate `payload` against `declared` and produce the row to store
    ///
    /// With `base`, fields absent from `payload` keep their current values;
    /// without it, required scalars must all be present and lists start empty.
    fn build_row(
        &mut self,
        declared: &EntityType,
        payload: &Object,
        base: Option<Object>,
    ) -> StoreResult<Object> {
        for name in payload.keys() {
            if declared.property(name).is_none() {
                return Err(StoreError::invalid(format!(
                    "{} has no property '{}'",
                    declared.name, name
                )));
            }
        }

        let is_new = base.is_none();
        let base = base.unwrap_or_default();
        let mut row = Object::new();

        for (name, property) in &declared.properties {
            let value = match payload.get(name) {
                Some(value) => self.coerce(declared, name, property, value)?,
                None => match base.get(name) {
                    Some(current) => current.clone(),
                    None => match property {
                        Property::List { .. } => Value::Array(Vec::new()),
                        Property::Scalar { optional: true, .. } => continue,
                        Property::Scalar { .. } if is_new => {
                            return Err(StoreError::invalid(format!(
                                "{} is missing required property '{}'",
                                declared.name, name
                            )))
                        }
                        Property::Scalar { .. } => continue,
                    },
                },
            };
            row.insert(name.clone(), value);
        }

        Ok(row)
    }

    fn coerce(
        &mut self,
        declared: &EntityType,
        name: &str,
        property: &Property,
        value: &Value,
    ) -> StoreResult<Value> {
        match property {
            Property::Scalar { optional, .. } if value.is_null() => {
                if *optional {
                    Ok(Value::Null)
                } else {
                    Err(StoreError::invalid(format!(
                        "{}.{} cannot be null",
                        declared.name, name
                    )))
                }
            }
            Property::Scalar { kind, .. } => {
                if kind.accepts(value) {
                    Ok(value.clone())
                } else {
                    Err(StoreError::invalid(format!(
                        "{}.{} expects {}, got {}",
                        declared.name,
                        name,
                        kind.as_str(),
                        value
                    )))
                }
            }
            Property::List { object_type } => {
                let items = match value {
                    Value::Null => return Ok(Value::Array(Vec::new())),
                    Value::Array(items) => items,
                    other => {
                        return Err(StoreError::invalid(format!(
                            "{}.{} expects a list, got {}",
                            declared.name, name, other
                        )))
                    }
                };

                let mut keys = Vec::with_capacity(items.len());
                for item in items {
                    let key = match item {
                        Value::Object(child) => self.upsert(object_type, child)?,
                        key => {
                            if self.collections.table(object_type)?.position(key).is_none() {
                                return Err(StoreError::ConstraintViolation(format!(
                                    "{}.{} references missing {} {}",
                                    declared.name, name, object_type, key
                                )));
                            }
                            key.clone()
                        }
                    };
                    keys.push(key);
                }
                Ok(Value::Array(keys))
            }
        }
    }
}

fn primary_key_of(declared: &EntityType, payload: &Object) -> StoreResult<Value> {
    match payload.get(&declared.primary_key) {
        Some(key) if !key.is_null() => Ok(key.clone()),
        _ => Err(StoreError::invalid(format!(
            "{} payload is missing primary key '{}'",
            declared.name, declared.primary_key
        ))),
    }
}
