//! Write operations accepted by the dispatcher
//!
//! On the wire an operation is a flat request object:
//! `{"action", "schema", "object", "filter", "property"}`, where
//! `schema` names the entity type and `action` defaults to `add`.

use serde::{Deserialize, Serialize};

use super::Object;

/// One declarative write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWrite", into = "RawWrite")]
pub enum WriteOperation {
    /// Insert a new object; fails on primary key collision
    Add { entity_type: String, payload: Object },
    /// Upsert by primary key
    Update { entity_type: String, payload: Object },
    /// Append `payload` to the list `property` of the first object matching `filter`
    Nest {
        entity_type: String,
        payload: Object,
        filter: String,
        property: String,
    },
    Delete { entity_type: String, filter: String },
    DeleteAll { entity_type: String },
    /// Assign every key of `payload` on all objects matching `filter`
    UpdateMultiple {
        entity_type: String,
        payload: Object,
        filter: String,
    },
}

/// Ordered operations applied as one unit
pub type WriteBatch = Vec<WriteOperation>;

impl WriteOperation {
    pub fn entity_type(&self) -> &str {
        match self {
            WriteOperation::Add { entity_type, .. }
            | WriteOperation::Update { entity_type, .. }
            | WriteOperation::Nest { entity_type, .. }
            | WriteOperation::Delete { entity_type, .. }
            | WriteOperation::DeleteAll { entity_type }
            | WriteOperation::UpdateMultiple { entity_type, .. } => entity_type,
        }
    }

    /// Wire name of the action
    pub fn action(&self) -> &'static str {
        match self {
            WriteOperation::Add { .. } => "add",
            WriteOperation::Update { .. } => "update",
            WriteOperation::Nest { .. } => "nest",
            WriteOperation::Delete { .. } => "delete",
            WriteOperation::DeleteAll { .. } => "deleteAll",
            WriteOperation::UpdateMultiple { .. } => "updateMultiple",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawWrite {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    schema: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    object: Option<Object>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    property: Option<String>,
}

fn required<T>(value: Option<T>, field: &str, action: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("'{}' requires '{}'", action, field))
}

impl TryFrom<RawWrite> for WriteOperation {
    type Error = String;

    fn try_from(raw: RawWrite) -> Result<Self, Self::Error> {
        let action = raw.action.as_deref().unwrap_or("add");
        let entity_type = raw.schema;

        let op = match action {
            "add" => WriteOperation::Add {
                entity_type,
                payload: required(raw.object, "object", action)?,
            },
            "update" => WriteOperation::Update {
                entity_type,
                payload: required(raw.object, "object", action)?,
            },
            "nest" => WriteOperation::Nest {
                entity_type,
                payload: required(raw.object, "object", action)?,
                filter: required(raw.filter, "filter", action)?,
                property: required(raw.property, "property", action)?,
            },
            "delete" => WriteOperation::Delete {
                entity_type,
                filter: required(raw.filter, "filter", action)?,
            },
            "deleteAll" => WriteOperation::DeleteAll { entity_type },
            "updateMultiple" => WriteOperation::UpdateMultiple {
                entity_type,
                payload: required(raw.object, "object", action)?,
                filter: required(raw.filter, "filter", action)?,
            },
            other => return Err(format!("unknown write action '{}'", other)),
        };
        Ok(op)
    }
}

impl From<WriteOperation> for RawWrite {
    fn from(op: WriteOperation) -> Self {
        let action = Some(op.action().to_string());
        match op {
            WriteOperation::Add {
                entity_type,
                payload,
            }
            | WriteOperation::Update {
                entity_type,
                payload,
            } => RawWrite {
                action,
                schema: entity_type,
                object: Some(payload),
                filter: None,
                property: None,
            },
            WriteOperation::Nest {
                entity_type,
                payload,
                filter,
                property,
            } => RawWrite {
                action,
                schema: entity_type,
                object: Some(payload),
                filter: Some(filter),
                property: Some(property),
            },
            WriteOperation::Delete {
                entity_type,
                filter,
            } => RawWrite {
                action,
                schema: entity_type,
                object: None,
                filter: Some(filter),
                property: None,
            },
            WriteOperation::DeleteAll { entity_type } => RawWrite {
                action,
                schema: entity_type,
                object: None,
                filter: None,
                property: None,
            },
            WriteOperation::UpdateMultiple {
                entity_type,
                payload,
                filter,
            } => RawWrite {
                action,
                schema: entity_type,
                object: Some(payload),
                filter: Some(filter),
                property: None,
            },
        }
    }
}
