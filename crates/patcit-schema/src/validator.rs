// Validation engine

use crate::error::{InstancePath, PathSegment, SchemaPath, ValidationError, ValidationResult};
use crate::schema::{
    AllOfSchema, AnyOfSchema, ArraySchema, CompiledSchema, EnumSchema, NumberSchema, ObjectSchema,
    Schema, SchemaRegistry, StringSchema,
};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

/// Validates a JSON value against a schema, stopping at the first violation
pub fn validate(value: &Value, schema: &Schema, registry: &SchemaRegistry) -> ValidationResult<()> {
    let mut context = ValidationContext::new(registry);
    validate_generic(value, schema, &mut context)
}

impl CompiledSchema {
    /// Validate `value` against this document's root schema.
    pub fn validate(&self, value: &Value) -> ValidationResult<()> {
        validate(value, &self.root, &self.registry)
    }
}

/// Validation context tracks state during validation
pub struct ValidationContext<'a> {
    /// Reference to the schema registry for $ref resolution
    registry: &'a SchemaRegistry,
    /// Current instance path (e.g., ["authors", 0])
    instance_path: InstancePath,
    /// Current schema path (e.g., ["object", "authors", "array"])
    schema_path: SchemaPath,
    /// Number of `$ref`s currently being followed
    ref_depth: usize,
}

/// Deeper `$ref` chains than this are treated as a cycle.
const MAX_REF_DEPTH: usize = 64;

impl<'a> ValidationContext<'a> {
    /// Create a new validation context
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            instance_path: InstancePath::new(),
            schema_path: SchemaPath::new(),
            ref_depth: 0,
        }
    }

    /// Build an error at the current position
    pub fn error(&self, message: impl Into<String>) -> ValidationError {
        ValidationError::new(message, self.instance_path.clone())
            .with_schema_path(self.schema_path.clone())
    }

    /// Execute a function with a new instance path segment
    pub fn with_instance_path<F, R>(&mut self, segment: PathSegment, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.instance_path.push(segment);
        let result = f(self);
        self.instance_path.pop();
        result
    }

    /// Execute a function with a new schema path segment
    pub fn with_schema_path<F, R>(&mut self, segment: impl Into<String>, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.schema_path.push(segment);
        let result = f(self);
        self.schema_path.pop();
        result
    }
}

/// Main validation dispatcher
fn validate_generic(
    value: &Value,
    schema: &Schema,
    context: &mut ValidationContext,
) -> ValidationResult<()> {
    match schema {
        Schema::False => Err(context.error("Schema 'false' always fails validation")),
        Schema::True | Schema::Any(_) => Ok(()),
        Schema::Boolean(_) => match value {
            Value::Bool(_) => Ok(()),
            _ => Err(context.error(format!("Expected boolean, got {}", json_type_name(value)))),
        },
        Schema::Number(s) => {
            context.with_schema_path(schema.type_name(), |ctx| validate_number(value, s, ctx))
        }
        Schema::String(s) => {
            context.with_schema_path("string", |ctx| validate_string(value, s, ctx))
        }
        Schema::Null(_) => match value {
            Value::Null => Ok(()),
            _ => Err(context.error(format!("Expected null, got {}", json_type_name(value)))),
        },
        Schema::Enum(s) => context.with_schema_path("enum", |ctx| validate_enum(value, s, ctx)),
        Schema::AnyOf(s) => context.with_schema_path("anyOf", |ctx| validate_any_of(value, s, ctx)),
        Schema::AllOf(s) => context.with_schema_path("allOf", |ctx| validate_all_of(value, s, ctx)),
        Schema::Array(s) => context.with_schema_path("array", |ctx| validate_array(value, s, ctx)),
        Schema::Object(s) => {
            context.with_schema_path("object", |ctx| validate_object(value, s, ctx))
        }
        Schema::Ref(s) => {
            if context.ref_depth >= MAX_REF_DEPTH {
                return Err(context.error(format!("Schema reference cycle through '{}'", s.reference)));
            }
            let Some(resolved) = context.registry.resolve(&s.reference) else {
                return Err(context.error(format!("Unresolved schema reference: {}", s.reference)));
            };
            context.ref_depth += 1;
            let result = context.with_schema_path(format!("$ref:{}", s.reference), |ctx| {
                validate_generic(value, resolved, ctx)
            });
            context.ref_depth -= 1;
            result
        }
    }
}

/// Validate a number value
fn validate_number(
    value: &Value,
    schema: &NumberSchema,
    context: &mut ValidationContext,
) -> ValidationResult<()> {
    let Value::Number(number) = value else {
        let expected = if schema.integer { "integer" } else { "number" };
        return Err(context.error(format!(
            "Expected {}, got {}",
            expected,
            json_type_name(value)
        )));
    };

    if schema.integer && !(number.is_i64() || number.is_u64()) {
        return Err(context.error(format!("Expected integer, got {}", number)));
    }

    let num = number.as_f64().unwrap_or(f64::NAN);

    if let Some(min) = schema.minimum {
        if num < min {
            return Err(context.error(format!("Number {} is less than minimum {}", num, min)));
        }
    }

    if let Some(max) = schema.maximum {
        if num > max {
            return Err(context.error(format!("Number {} is greater than maximum {}", num, max)));
        }
    }

    Ok(())
}

/// Validate a string value
fn validate_string(
    value: &Value,
    schema: &StringSchema,
    context: &mut ValidationContext,
) -> ValidationResult<()> {
    let Value::String(s) = value else {
        return Err(context.error(format!("Expected string, got {}", json_type_name(value))));
    };

    // JSON Schema lengths count characters, not bytes.
    let length = s.chars().count();

    if let Some(min) = schema.min_length {
        if length < min {
            return Err(context.error(format!(
                "String length {} is less than minimum {}",
                length, min
            )));
        }
    }

    if let Some(max) = schema.max_length {
        if length > max {
            return Err(context.error(format!(
                "String length {} is greater than maximum {}",
                length, max
            )));
        }
    }

    if let Some(pattern) = &schema.pattern {
        let re = Regex::new(pattern).map_err(|e| {
            context.error(format!("Invalid regex pattern '{}': {}", pattern, e))
        })?;

        if !re.is_match(s) {
            return Err(context.error(format!(
                "String '{}' does not match pattern '{}'",
                s, pattern
            )));
        }
    }

    Ok(())
}

/// Validate an enum value
fn validate_enum(
    value: &Value,
    schema: &EnumSchema,
    context: &mut ValidationContext,
) -> ValidationResult<()> {
    if schema.values.iter().any(|allowed| allowed == value) {
        return Ok(());
    }

    Err(context.error(format!(
        "Value must be one of: {}",
        schema
            .values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    )))
}

/// Validate anyOf (at least one schema must match)
fn validate_any_of(
    value: &Value,
    schema: &AnyOfSchema,
    context: &mut ValidationContext,
) -> ValidationResult<()> {
    let mut first_error = None;

    for subschema in &schema.schemas {
        match validate_generic(value, subschema, context) {
            Ok(()) => return Ok(()),
            Err(err) => {
                first_error.get_or_insert(err);
            }
        }
    }

    Err(first_error.unwrap_or_else(|| context.error("anyOf has no alternatives")))
}

/// Validate allOf (all schemas must match)
fn validate_all_of(
    value: &Value,
    schema: &AllOfSchema,
    context: &mut ValidationContext,
) -> ValidationResult<()> {
    for subschema in &schema.schemas {
        validate_generic(value, subschema, context)?;
    }
    Ok(())
}

/// Validate an array value
fn validate_array(
    value: &Value,
    schema: &ArraySchema,
    context: &mut ValidationContext,
) -> ValidationResult<()> {
    let Value::Array(items) = value else {
        return Err(context.error(format!("Expected array, got {}", json_type_name(value))));
    };

    if let Some(min) = schema.min_items {
        if items.len() < min {
            return Err(context.error(format!(
                "Array length {} is less than minimum {}",
                items.len(),
                min
            )));
        }
    }

    if let Some(max) = schema.max_items {
        if items.len() > max {
            return Err(context.error(format!(
                "Array length {} is greater than maximum {}",
                items.len(),
                max
            )));
        }
    }

    if let Some(true) = schema.unique_items {
        let mut seen = HashSet::new();
        for item in items {
            if !seen.insert(item.to_string()) {
                return Err(context.error("Array items must be unique"));
            }
        }
    }

    if let Some(item_schema) = &schema.items {
        for (i, item) in items.iter().enumerate() {
            context.with_instance_path(PathSegment::Index(i), |ctx| {
                validate_generic(item, item_schema, ctx)
            })?;
        }
    }

    Ok(())
}

/// Validate an object value
fn validate_object(
    value: &Value,
    schema: &ObjectSchema,
    context: &mut ValidationContext,
) -> ValidationResult<()> {
    let Value::Object(entries) = value else {
        return Err(context.error(format!("Expected object, got {}", json_type_name(value))));
    };

    for required in &schema.required {
        if !entries.contains_key(required) {
            return Err(context.error(format!("Missing required property '{}'", required)));
        }
    }

    for (key, entry) in entries {
        if let Some(prop_schema) = schema.properties.get(key) {
            context.with_instance_path(PathSegment::Key(key.clone()), |ctx| {
                validate_generic(entry, prop_schema, ctx)
            })?;
        } else if schema.closed {
            return Err(context.error(format!("Unknown property '{}'", key)));
        } else if let Some(additional) = &schema.additional_properties {
            context.with_instance_path(PathSegment::Key(key.clone()), |ctx| {
                validate_generic(entry, additional, ctx)
            })?;
        }
    }

    Ok(())
}

/// Get a human-readable type name for a JSON value
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
