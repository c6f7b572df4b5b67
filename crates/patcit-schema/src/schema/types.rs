//! Schema type definitions
//!
//! Each schema type struct contains its annotations plus the constraints
//! specific to that type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Schema;

/// Annotations that can be attached to any schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaAnnotations {
    /// Schema identifier
    #[serde(rename = "$id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Short description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Boolean type schema
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanSchema {
    pub annotations: SchemaAnnotations,
}

/// Number type schema (integer or float)
#[derive(Debug, Clone, PartialEq)]
pub struct NumberSchema {
    pub annotations: SchemaAnnotations,
    /// `type: integer` rather than `type: number`
    pub integer: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// String type schema
#[derive(Debug, Clone, PartialEq)]
pub struct StringSchema {
    pub annotations: SchemaAnnotations,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<String>,
}

/// Null type schema
#[derive(Debug, Clone, PartialEq)]
pub struct NullSchema {
    pub annotations: SchemaAnnotations,
}

/// Enum type schema
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub annotations: SchemaAnnotations,
    pub values: Vec<serde_json::Value>,
}

/// Any type schema (no validation)
#[derive(Debug, Clone, PartialEq)]
pub struct AnySchema {
    pub annotations: SchemaAnnotations,
}

/// AnyOf schema (validates if any subschema matches)
#[derive(Debug, Clone, PartialEq)]
pub struct AnyOfSchema {
    pub annotations: SchemaAnnotations,
    pub schemas: Vec<Schema>,
}

/// AllOf schema (validates if all subschemas match)
#[derive(Debug, Clone, PartialEq)]
pub struct AllOfSchema {
    pub annotations: SchemaAnnotations,
    pub schemas: Vec<Schema>,
}

/// Array type schema
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    pub annotations: SchemaAnnotations,
    pub items: Option<Box<Schema>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub unique_items: Option<bool>,
}

/// Object type schema
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSchema {
    pub annotations: SchemaAnnotations,
    pub properties: HashMap<String, Schema>,
    pub additional_properties: Option<Box<Schema>>,
    pub required: Vec<String>,
    /// `additionalProperties: false`
    pub closed: bool,
}

impl ObjectSchema {
    /// True if `key` may appear on an instance of this schema.
    pub fn allows(&self, key: &str) -> bool {
        self.properties.contains_key(key) || !self.closed
    }
}

/// Reference to a named definition (`$ref: "#/definitions/<name>"`)
#[derive(Debug, Clone, PartialEq)]
pub struct RefSchema {
    pub annotations: SchemaAnnotations,
    pub reference: String,
}
