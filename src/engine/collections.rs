//! In-memory tables with a primary key index

use std::collections::{BTreeMap, HashMap, HashSet};

use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::types::{Object, Property, SchemaDefinition};

/// Canonical index key for a primary key value
///
/// Ints and strings never collide (`1` vs `"1"`).
pub fn index_key(value: &Value) -> String {
    value.to_string()
}

/// Rows of one entity type in insertion order, indexed by primary key
#[derive(Debug, Clone, Default)]
pub struct Table {
    primary_key: String,
    rows: Vec<Object>,
    index: HashMap<String, usize>,
}

impl Table {
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            primary_key: primary_key.into(),
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a table from persisted rows, rejecting missing or duplicate keys
    pub fn from_rows(primary_key: impl Into<String>, rows: Vec<Object>) -> StoreResult<Self> {
        let mut table = Self::new(primary_key);
        for row in rows {
            let key = row.get(&table.primary_key).cloned().ok_or_else(|| {
                StoreError::ConstraintViolation(format!(
                    "row without primary key '{}'",
                    table.primary_key
                ))
            })?;
            if table.position(&key).is_some() {
                return Err(StoreError::ConstraintViolation(format!(
                    "duplicate primary key {}",
                    key
                )));
            }
            table.push(row, &key);
        }
        Ok(table)
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn rows(&self) -> &[Object] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn position(&self, key: &Value) -> Option<usize> {
        self.index.get(&index_key(key)).copied()
    }

    pub fn get(&self, key: &Value) -> Option<&Object> {
        self.position(key).map(|i| &self.rows[i])
    }

    pub(crate) fn row_mut(&mut self, position: usize) -> Option<&mut Object> {
        self.rows.get_mut(position)
    }

    pub(crate) fn rows_mut(&mut self) -> impl Iterator<Item = &mut Object> {
        self.rows.iter_mut()
    }

    pub(crate) fn push(&mut self, row: Object, key: &Value) {
        self.index.insert(index_key(key), self.rows.len());
        self.rows.push(row);
    }

    /// Remove the rows at `positions`, returning their primary keys
    pub(crate) fn remove_positions(&mut self, positions: &HashSet<usize>) -> Vec<Value> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.rows.len());
        for (i, row) in std::mem::take(&mut self.rows).into_iter().enumerate() {
            if positions.contains(&i) {
                if let Some(key) = row.get(&self.primary_key) {
                    removed.push(key.clone());
                }
            } else {
                kept.push(row);
            }
        }
        self.rows = kept;
        self.reindex();
        removed
    }

    /// Remove every row, returning their primary keys
    pub(crate) fn clear(&mut self) -> Vec<Value> {
        let removed = self
            .rows
            .iter()
            .filter_map(|row| row.get(&self.primary_key).cloned())
            .collect();
        self.rows.clear();
        self.index.clear();
        removed
    }

    fn reindex(&mut self) {
        self.index = self
            .rows
            .iter()
            .enumerate()
            .filter_map(|(i, row)| row.get(&self.primary_key).map(|k| (index_key(k), i)))
            .collect();
    }
}

/// All tables of one store
#[derive(Debug, Clone, Default)]
pub struct Collections {
    tables: BTreeMap<String, Table>,
}

impl Collections {
    /// Empty tables for every entity type of `schema`
    pub fn empty(schema: &SchemaDefinition) -> Self {
        let tables = schema
            .entity_types
            .iter()
            .map(|t| (t.name.clone(), Table::new(t.primary_key.clone())))
            .collect();
        Self { tables }
    }

    /// Rebuild tables from persisted rows
    pub fn from_rows(
        schema: &SchemaDefinition,
        mut rows: BTreeMap<String, Vec<Object>>,
    ) -> StoreResult<Self> {
        let mut tables = BTreeMap::new();
        for entity_type in &schema.entity_types {
            let type_rows = rows.remove(&entity_type.name).unwrap_or_default();
            let table = Table::from_rows(entity_type.primary_key.clone(), type_rows)?;
            tables.insert(entity_type.name.clone(), table);
        }
        Ok(Self { tables })
    }

    pub fn table(&self, entity_type: &str) -> StoreResult<&Table> {
        self.tables
            .get(entity_type)
            .ok_or_else(|| StoreError::not_found(format!("entity type '{}'", entity_type)))
    }

    pub(crate) fn table_mut(&mut self, entity_type: &str) -> StoreResult<&mut Table> {
        self.tables
            .get_mut(entity_type)
            .ok_or_else(|| StoreError::not_found(format!("entity type '{}'", entity_type)))
    }

    /// Persistable view: entity type name to rows
    pub fn rows_by_type(&self) -> BTreeMap<&str, &[Object]> {
        self.tables
            .iter()
            .map(|(name, table)| (name.as_str(), table.rows()))
            .collect()
    }

    /// Copy of `object` with list references replaced by the referenced objects
    ///
    /// A reference back to an object already being resolved is left as its
    /// bare key, so cyclic links terminate.
    pub fn materialize(
        &self,
        schema: &SchemaDefinition,
        entity_type: &str,
        object: &Object,
    ) -> Object {
        let mut path = Vec::new();
        self.materialize_inner(schema, entity_type, object, &mut path)
    }

    fn materialize_inner(
        &self,
        schema: &SchemaDefinition,
        entity_type: &str,
        object: &Object,
        path: &mut Vec<(String, String)>,
    ) -> Object {
        let Some(declared) = schema.entity_type(entity_type) else {
            return object.clone();
        };
        let own_key = object
            .get(&declared.primary_key)
            .map(index_key)
            .unwrap_or_default();
        path.push((entity_type.to_string(), own_key));

        let mut out = object.clone();
        for (name, property) in &declared.properties {
            let Property::List { object_type } = property else {
                continue;
            };
            let Some(Value::Array(keys)) = object.get(name) else {
                continue;
            };
            let Ok(target) = self.table(object_type) else {
                continue;
            };

            let resolved = keys
                .iter()
                .filter_map(|key| {
                    let in_path = path
                        .iter()
                        .any(|(t, k)| t == object_type && *k == index_key(key));
                    if in_path {
                        return Some(key.clone());
                    }
                    target.get(key).map(|child| {
                        Value::Object(self.materialize_inner(schema, object_type, child, path))
                    })
                })
                .collect();
            out.insert(name.clone(), Value::Array(resolved));
        }

        path.pop();
        out
    }
}
