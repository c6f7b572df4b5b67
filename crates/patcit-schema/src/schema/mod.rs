//! Schema types for citation record validation
//!
//! This module defines the schema type system used for validation: the part
//! of JSON Schema (draft 7) the citation schema documents are written in.
//!
//! Schemas are parsed from `serde_json::Value` documents by
//! [`Schema::from_json`]. Named definitions (`"definitions": {...}`) go into a
//! [`SchemaRegistry`] and are resolved lazily by the validator when it meets
//! a `$ref`.

use crate::error::{SchemaError, SchemaResult};
use std::collections::HashMap;
use std::sync::LazyLock;

mod parser;
mod types;

pub use types::{
    AllOfSchema, AnyOfSchema, AnySchema, ArraySchema, BooleanSchema, EnumSchema, NullSchema,
    NumberSchema, ObjectSchema, RefSchema, SchemaAnnotations, StringSchema,
};

static EMPTY_ANNOTATIONS: LazyLock<SchemaAnnotations> = LazyLock::new(SchemaAnnotations::default);

/// The main schema enum representing all possible schema types
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    /// Always fails validation
    False,
    /// Always passes validation
    True,
    /// Boolean type schema
    Boolean(BooleanSchema),
    /// Number type schema (integer or float)
    Number(NumberSchema),
    /// String type schema
    String(StringSchema),
    /// Null type schema
    Null(NullSchema),
    /// Enum type schema (fixed set of values)
    Enum(EnumSchema),
    /// Any type schema (no validation)
    Any(AnySchema),
    /// AnyOf schema (validates if any subschema matches)
    AnyOf(AnyOfSchema),
    /// AllOf schema (validates if all subschemas match)
    AllOf(AllOfSchema),
    /// Array type schema
    Array(ArraySchema),
    /// Object type schema
    Object(ObjectSchema),
    /// Reference to another schema
    Ref(RefSchema),
}

impl Schema {
    /// Parse a Schema from a JSON schema document.
    ///
    /// The `definitions` keyword is ignored here; use
    /// [`CompiledSchema::from_json`] to keep them for `$ref` resolution.
    ///
    /// # Example
    ///
    /// ```
    /// use patcit_schema::Schema;
    /// use serde_json::json;
    ///
    /// let schema = Schema::from_json(&json!({"type": "string", "minLength": 1})).unwrap();
    /// assert_eq!(schema.type_name(), "string");
    /// ```
    pub fn from_json(value: &serde_json::Value) -> SchemaResult<Schema> {
        parser::from_json(value, "#")
    }

    /// Get the annotations for this schema
    pub fn annotations(&self) -> &SchemaAnnotations {
        match self {
            Schema::False | Schema::True => &EMPTY_ANNOTATIONS,
            Schema::Boolean(s) => &s.annotations,
            Schema::Number(s) => &s.annotations,
            Schema::String(s) => &s.annotations,
            Schema::Null(s) => &s.annotations,
            Schema::Enum(s) => &s.annotations,
            Schema::Any(s) => &s.annotations,
            Schema::AnyOf(s) => &s.annotations,
            Schema::AllOf(s) => &s.annotations,
            Schema::Array(s) => &s.annotations,
            Schema::Object(s) => &s.annotations,
            Schema::Ref(s) => &s.annotations,
        }
    }

    /// Get a human-readable name for this schema type
    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::False => "false",
            Schema::True => "true",
            Schema::Boolean(_) => "boolean",
            Schema::Number(s) if s.integer => "integer",
            Schema::Number(_) => "number",
            Schema::String(_) => "string",
            Schema::Null(_) => "null",
            Schema::Enum(_) => "enum",
            Schema::Any(_) => "any",
            Schema::AnyOf(_) => "anyOf",
            Schema::AllOf(_) => "allOf",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
            Schema::Ref(_) => "$ref",
        }
    }
}

/// Named schema definitions, the targets of `$ref`
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    /// Create a new empty schema registry
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Register a schema under a name
    pub fn register(&mut self, name: String, schema: Schema) {
        self.schemas.insert(name, schema);
    }

    /// Look up a schema by name
    pub fn resolve(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    /// Check if a schema is registered
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Number of registered schemas
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// A schema document ready for validation: its root schema together with the
/// definitions its `$ref`s point at.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    pub root: Schema,
    pub registry: SchemaRegistry,
}

impl CompiledSchema {
    /// Parse a whole schema document, registering every entry of its
    /// `definitions` object.
    ///
    /// # Errors
    ///
    /// Fails if any part of the document is outside the supported subset, or
    /// if a `$ref` names a definition the document does not contain.
    pub fn from_json(document: &serde_json::Value) -> SchemaResult<Self> {
        let mut registry = SchemaRegistry::new();

        if let Some(definitions) = document.get("definitions") {
            let definitions =
                definitions
                    .as_object()
                    .ok_or_else(|| SchemaError::InvalidStructure {
                        message: "'definitions' must be an object".to_string(),
                        pointer: "#/definitions".to_string(),
                    })?;
            for (name, definition) in definitions {
                let pointer = format!("#/definitions/{}", name);
                registry.register(name.clone(), parser::from_json(definition, &pointer)?);
            }
        }

        let root = Schema::from_json(document)?;
        let compiled = Self { root, registry };
        compiled.check_refs()?;
        Ok(compiled)
    }

    /// Parse a schema document from its JSON text.
    pub fn parse_str(text: &str) -> SchemaResult<Self> {
        let document: serde_json::Value = serde_json::from_str(text)?;
        Self::from_json(&document)
    }

    /// The root object schema, following a top-level `$ref` if there is one.
    pub fn object(&self) -> Option<&ObjectSchema> {
        let mut schema = &self.root;
        // Bounded so a self-referential definition cannot loop forever.
        for _ in 0..=self.registry.len() {
            match schema {
                Schema::Object(obj) => return Some(obj),
                Schema::Ref(r) => schema = self.registry.resolve(&r.reference)?,
                _ => return None,
            }
        }
        None
    }

    /// Mutable access to the root object schema, for composing documents.
    pub fn object_mut(&mut self) -> Option<&mut ObjectSchema> {
        match &mut self.root {
            Schema::Object(obj) => Some(obj),
            _ => None,
        }
    }

    fn check_refs(&self) -> SchemaResult<()> {
        let mut pending: Vec<&Schema> = vec![&self.root];
        pending.extend(self.registry.schemas.values());

        while let Some(schema) = pending.pop() {
            match schema {
                Schema::Ref(r) if !self.registry.contains(&r.reference) => {
                    return Err(SchemaError::UnresolvedRef(r.reference.clone()));
                }
                Schema::AnyOf(s) => pending.extend(s.schemas.iter()),
                Schema::AllOf(s) => pending.extend(s.schemas.iter()),
                Schema::Array(s) => pending.extend(s.items.as_deref()),
                Schema::Object(s) => {
                    pending.extend(s.properties.values());
                    pending.extend(s.additional_properties.as_deref());
                }
                _ => {}
            }
        }
        Ok(())
    }
}
