//! Schema definition types
//!
//! A schema is an ordered list of entity types. Each entity type names its
//! primary key and declares its properties, which are either scalars or lists
//! of references to another entity type.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Scalar property kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int,
    Double,
    Float,
    String,
    Bool,
    Date,
}

impl ScalarKind {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "int" => Some(ScalarKind::Int),
            "double" => Some(ScalarKind::Double),
            "float" => Some(ScalarKind::Float),
            "string" => Some(ScalarKind::String),
            "bool" => Some(ScalarKind::Bool),
            "date" => Some(ScalarKind::Date),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScalarKind::Int => "int",
            ScalarKind::Double => "double",
            ScalarKind::Float => "float",
            ScalarKind::String => "string",
            ScalarKind::Bool => "bool",
            ScalarKind::Date => "date",
        }
    }

    /// Check that a non-null JSON value fits this kind
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            ScalarKind::Int => value.is_i64() || value.is_u64(),
            ScalarKind::Double | ScalarKind::Float => value.is_number(),
            ScalarKind::String => value.is_string(),
            ScalarKind::Bool => value.is_boolean(),
            ScalarKind::Date => value
                .as_str()
                .map(|s| chrono::DateTime::parse_from_rfc3339(s).is_ok())
                .unwrap_or(false),
        }
    }
}

/// A single property declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Property {
    Scalar { kind: ScalarKind, optional: bool },
    List { object_type: String },
}

impl Property {
    pub fn scalar(kind: ScalarKind) -> Self {
        Property::Scalar {
            kind,
            optional: false,
        }
    }

    pub fn optional(kind: ScalarKind) -> Self {
        Property::Scalar {
            kind,
            optional: true,
        }
    }

    pub fn list(object_type: impl Into<String>) -> Self {
        Property::List {
            object_type: object_type.into(),
        }
    }
}

/// Declaration-style representation: `"int"`, `"double?"` or `{"type": .., ..}`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum PropertySpec {
    Short(String),
    Full {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        optional: bool,
        #[serde(rename = "objectType", default, skip_serializing_if = "Option::is_none")]
        object_type: Option<String>,
    },
}

impl TryFrom<PropertySpec> for Property {
    type Error = String;

    fn try_from(spec: PropertySpec) -> Result<Self, Self::Error> {
        match spec {
            PropertySpec::Short(name) => {
                let (name, optional) = match name.strip_suffix('?') {
                    Some(base) => (base, true),
                    None => (name.as_str(), false),
                };
                ScalarKind::parse(name)
                    .map(|kind| Property::Scalar { kind, optional })
                    .ok_or_else(|| format!("unknown property type '{}'", name))
            }
            PropertySpec::Full {
                kind,
                optional,
                object_type,
            } => {
                if kind == "list" {
                    let object_type =
                        object_type.ok_or_else(|| "list property needs objectType".to_string())?;
                    return Ok(Property::List { object_type });
                }
                ScalarKind::parse(&kind)
                    .map(|kind| Property::Scalar { kind, optional })
                    .ok_or_else(|| format!("unknown property type '{}'", kind))
            }
        }
    }
}

impl From<&Property> for PropertySpec {
    fn from(property: &Property) -> Self {
        match property {
            Property::Scalar {
                kind,
                optional: false,
            } => PropertySpec::Short(kind.as_str().to_string()),
            Property::Scalar {
                kind,
                optional: true,
            } => PropertySpec::Full {
                kind: kind.as_str().to_string(),
                optional: true,
                object_type: None,
            },
            Property::List { object_type } => PropertySpec::Full {
                kind: "list".to_string(),
                optional: false,
                object_type: Some(object_type.clone()),
            },
        }
    }
}

/// Entity type declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    #[serde(rename = "primaryKey")]
    pub primary_key: String,
    #[serde(with = "property_map")]
    pub properties: Vec<(String, Property)>,
}

impl EntityType {
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            properties: Vec::new(),
        }
    }

    /// Builder-style property declaration
    pub fn with_property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.push((name.into(), property));
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    /// Kind of the primary key property
    pub fn primary_key_kind(&self) -> Option<ScalarKind> {
        match self.property(&self.primary_key) {
            Some(Property::Scalar { kind, .. }) => Some(*kind),
            _ => None,
        }
    }
}

/// Properties serialize as an insertion-ordered JSON object
mod property_map {
    use serde::de::Error as _;

    use super::*;

    pub fn serialize<S: Serializer>(
        properties: &[(String, Property)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            properties
                .iter()
                .map(|(name, property)| (name, PropertySpec::from(property))),
        )
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(String, Property)>, D::Error> {
        let raw = Map::<String, Value>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(name, value)| {
                let spec: PropertySpec = serde_json::from_value(value).map_err(D::Error::custom)?;
                let property = Property::try_from(spec)
                    .map_err(|e| D::Error::custom(format!("property '{}': {}", name, e)))?;
                Ok((name, property))
            })
            .collect()
    }
}

/// Ordered set of entity types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct SchemaDefinition {
    pub entity_types: Vec<EntityType>,
}

impl SchemaDefinition {
    pub fn new(entity_types: Vec<EntityType>) -> Self {
        Self { entity_types }
    }

    /// The schema a fresh store is bootstrapped with
    pub fn default_schema() -> Self {
        Self::new(vec![
            EntityType::new("Person", "id")
                .with_property("id", Property::scalar(ScalarKind::Int))
                .with_property("name", Property::scalar(ScalarKind::String))
                .with_property("age", Property::optional(ScalarKind::Double))
                .with_property("dogs", Property::list("Dog")),
            EntityType::new("Dog", "id")
                .with_property("id", Property::scalar(ScalarKind::Int))
                .with_property("name", Property::scalar(ScalarKind::String))
                .with_property("breed", Property::scalar(ScalarKind::String))
                .with_property("age", Property::optional(ScalarKind::Double)),
        ])
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.iter().find(|t| t.name == name)
    }

    /// Look up an entity type, failing NotFound for unknown names
    pub fn require(&self, name: &str) -> StoreResult<&EntityType> {
        self.entity_type(name)
            .ok_or_else(|| StoreError::not_found(format!("entity type '{}'", name)))
    }

    /// Structural checks: unique names, usable primary keys, resolvable list targets
    pub fn validate(&self) -> StoreResult<()> {
        let mut names = HashSet::new();
        for entity_type in &self.entity_types {
            if entity_type.name.is_empty() {
                return Err(StoreError::invalid("entity type name cannot be empty"));
            }
            if !names.insert(entity_type.name.as_str()) {
                return Err(StoreError::invalid(format!(
                    "duplicate entity type '{}'",
                    entity_type.name
                )));
            }

            let mut props = HashSet::new();
            for (name, _) in &entity_type.properties {
                if !props.insert(name.as_str()) {
                    return Err(StoreError::invalid(format!(
                        "duplicate property '{}.{}'",
                        entity_type.name, name
                    )));
                }
            }

            match entity_type.property(&entity_type.primary_key) {
                Some(Property::Scalar {
                    kind: ScalarKind::Int | ScalarKind::String,
                    optional: false,
                }) => {}
                _ => {
                    return Err(StoreError::invalid(format!(
                        "primary key '{}.{}' must be a required int or string property",
                        entity_type.name, entity_type.primary_key
                    )))
                }
            }
        }

        for entity_type in &self.entity_types {
            for (name, property) in &entity_type.properties {
                if let Property::List { object_type } = property {
                    if !names.contains(object_type.as_str()) {
                        return Err(StoreError::invalid(format!(
                            "list '{}.{}' references unknown type '{}'",
                            entity_type.name, name, object_type
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Serialize to the JSON string stored in meta records
    pub fn to_json(&self) -> StoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> StoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
