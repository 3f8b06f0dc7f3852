//! Meta records: one entry of a store's schema history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SchemaDefinition;
use crate::error::StoreResult;

/// Immutable record of one schema version of a logical store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaRecord {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u64,
    /// Serialized [`SchemaDefinition`]
    pub schema: String,
    pub path: String,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl MetaRecord {
    /// Create a record for `schema` at `schema_version`, stamped with the current time
    pub fn new(
        schema_version: u64,
        schema: &SchemaDefinition,
        path: impl Into<String>,
    ) -> StoreResult<Self> {
        Ok(Self {
            schema_version,
            schema: schema.to_json()?,
            path: path.into(),
            created_at: Some(Utc::now()),
        })
    }

    /// Parse the stored schema
    pub fn definition(&self) -> StoreResult<SchemaDefinition> {
        SchemaDefinition::from_json(&self.schema)
    }

    /// Serialize to a single JSON line
    pub fn to_json_line(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_line(line: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(line)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_record_json_line() {
        let record = MetaRecord::new(3, &SchemaDefinition::default_schema(), "default.store").unwrap();
        let line = record.to_json_line().unwrap();

        assert!(line.contains("\"schemaVersion\":3"));
        assert!(!line.contains('\n'));

        let parsed = MetaRecord::from_json_line(&line).unwrap();
        assert_eq!(parsed.schema_version, 3);
        assert_eq!(parsed.definition().unwrap(), SchemaDefinition::default_schema());
    }

    #[test]
    fn test_legacy_record_without_timestamp() {
        let line = r#"{"schemaVersion":0,"schema":"[]","path":"default.store"}"#;
        let record = MetaRecord::from_json_line(line).unwrap();
        assert!(record.created_at.is_none());
        assert!(record.definition().unwrap().entity_types.is_empty());
    }
}
