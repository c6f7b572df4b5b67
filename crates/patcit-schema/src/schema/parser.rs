//! Parsing of JSON schema documents into [`Schema`] values.

use super::types::*;
use super::Schema;
use crate::error::{SchemaError, SchemaResult};
use serde_json::{Map, Value};
use std::collections::HashMap;

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Keywords with no effect on validation, accepted on any node.
const ANNOTATION_KEYWORDS: &[&str] = &[
    "$id",
    "$schema",
    "$comment",
    "title",
    "description",
    "definitions",
    "default",
    "examples",
];

const STRING_KEYWORDS: &[&str] = &["minLength", "maxLength", "pattern"];
const NUMBER_KEYWORDS: &[&str] = &["minimum", "maximum"];
const ARRAY_KEYWORDS: &[&str] = &["items", "minItems", "maxItems", "uniqueItems"];
const OBJECT_KEYWORDS: &[&str] = &["properties", "required", "additionalProperties"];

/// Parse a schema node. `pointer` is the JSON pointer of `value` inside its
/// document, used only for error messages.
pub(super) fn from_json(value: &Value, pointer: &str) -> SchemaResult<Schema> {
    match value {
        Value::Bool(true) => Ok(Schema::True),
        Value::Bool(false) => Ok(Schema::False),
        Value::Object(map) => parse_object_node(map, pointer),
        _ => Err(invalid(
            pointer,
            format!("expected an object or boolean, got {}", value),
        )),
    }
}

fn parse_object_node(map: &Map<String, Value>, pointer: &str) -> SchemaResult<Schema> {
    let annotations = parse_annotations(map);

    if let Some(reference) = map.get("$ref") {
        expect_keywords(map, &["$ref"], pointer)?;
        let reference = reference
            .as_str()
            .ok_or_else(|| invalid(pointer, "'$ref' must be a string"))?;
        let name = reference
            .strip_prefix(DEFINITIONS_PREFIX)
            .unwrap_or(reference)
            .to_string();
        return Ok(Schema::Ref(RefSchema {
            annotations,
            reference: name,
        }));
    }

    if let Some(values) = map.get("enum") {
        expect_keywords(map, &["enum"], pointer)?;
        let values = values
            .as_array()
            .ok_or_else(|| invalid(pointer, "'enum' must be an array"))?;
        return Ok(Schema::Enum(EnumSchema {
            annotations,
            values: values.clone(),
        }));
    }

    if let Some(any_of) = map.get("anyOf") {
        expect_keywords(map, &["anyOf"], pointer)?;
        let schemas = parse_schema_list(any_of, &format!("{}/anyOf", pointer))?;
        return Ok(Schema::AnyOf(AnyOfSchema {
            annotations,
            schemas,
        }));
    }

    if let Some(all_of) = map.get("allOf") {
        expect_keywords(map, &["allOf"], pointer)?;
        let schemas = parse_schema_list(all_of, &format!("{}/allOf", pointer))?;
        return Ok(Schema::AllOf(AllOfSchema {
            annotations,
            schemas,
        }));
    }

    match map.get("type") {
        None => {
            expect_keywords(map, &[], pointer)?;
            Ok(Schema::Any(AnySchema { annotations }))
        }
        Some(Value::String(type_name)) => {
            expect_keywords(map, &typed_keywords(&[type_name.as_str()]), pointer)?;
            parse_typed(type_name, map, annotations, pointer)
        }
        Some(Value::Array(type_names)) => {
            // `"type": ["string", "null"]` is an anyOf over the listed types,
            // each sharing the node's other keywords.
            let type_names = type_names
                .iter()
                .map(|type_name| {
                    type_name
                        .as_str()
                        .ok_or_else(|| invalid(pointer, "'type' entries must be strings"))
                })
                .collect::<SchemaResult<Vec<_>>>()?;
            expect_keywords(map, &typed_keywords(&type_names), pointer)?;
            let mut schemas = Vec::with_capacity(type_names.len());
            for type_name in type_names {
                schemas.push(parse_typed(
                    type_name,
                    map,
                    SchemaAnnotations::default(),
                    pointer,
                )?);
            }
            Ok(Schema::AnyOf(AnyOfSchema {
                annotations,
                schemas,
            }))
        }
        Some(_) => Err(invalid(pointer, "'type' must be a string or an array")),
    }
}

/// Keywords a node with the given `type` values may carry.
fn typed_keywords(type_names: &[&str]) -> Vec<&'static str> {
    let mut keywords = vec!["type"];
    for type_name in type_names {
        keywords.extend_from_slice(match *type_name {
            "string" => STRING_KEYWORDS,
            "number" | "integer" => NUMBER_KEYWORDS,
            "array" => ARRAY_KEYWORDS,
            "object" => OBJECT_KEYWORDS,
            _ => &[],
        });
    }
    keywords
}

/// Reject any keyword outside `allowed` and the annotations.
fn expect_keywords(map: &Map<String, Value>, allowed: &[&str], pointer: &str) -> SchemaResult<()> {
    match map
        .keys()
        .find(|key| !allowed.contains(&key.as_str()) && !ANNOTATION_KEYWORDS.contains(&key.as_str()))
    {
        Some(key) => Err(invalid(pointer, format!("unsupported keyword '{}'", key))),
        None => Ok(()),
    }
}

fn parse_typed(
    type_name: &str,
    map: &Map<String, Value>,
    annotations: SchemaAnnotations,
    pointer: &str,
) -> SchemaResult<Schema> {
    match type_name {
        "boolean" => Ok(Schema::Boolean(BooleanSchema { annotations })),
        "null" => Ok(Schema::Null(NullSchema { annotations })),
        "number" | "integer" => Ok(Schema::Number(NumberSchema {
            annotations,
            integer: type_name == "integer",
            minimum: get_f64(map, "minimum", pointer)?,
            maximum: get_f64(map, "maximum", pointer)?,
        })),
        "string" => Ok(Schema::String(StringSchema {
            annotations,
            min_length: get_usize(map, "minLength", pointer)?,
            max_length: get_usize(map, "maxLength", pointer)?,
            pattern: get_string(map, "pattern", pointer)?,
        })),
        "array" => {
            let items = match map.get("items") {
                Some(items) => Some(Box::new(from_json(items, &format!("{}/items", pointer))?)),
                None => None,
            };
            Ok(Schema::Array(ArraySchema {
                annotations,
                items,
                min_items: get_usize(map, "minItems", pointer)?,
                max_items: get_usize(map, "maxItems", pointer)?,
                unique_items: get_bool(map, "uniqueItems", pointer)?,
            }))
        }
        "object" => parse_object_schema(map, annotations, pointer),
        other => Err(SchemaError::InvalidType(other.to_string())),
    }
}

fn parse_object_schema(
    map: &Map<String, Value>,
    annotations: SchemaAnnotations,
    pointer: &str,
) -> SchemaResult<Schema> {
    let mut properties = HashMap::new();
    if let Some(props) = map.get("properties") {
        let props = props
            .as_object()
            .ok_or_else(|| invalid(pointer, "'properties' must be an object"))?;
        for (name, prop) in props {
            let prop_pointer = format!("{}/properties/{}", pointer, name);
            properties.insert(name.clone(), from_json(prop, &prop_pointer)?);
        }
    }

    let mut required = Vec::new();
    if let Some(names) = map.get("required") {
        let names = names
            .as_array()
            .ok_or_else(|| invalid(pointer, "'required' must be an array"))?;
        for name in names {
            let name = name
                .as_str()
                .ok_or_else(|| invalid(pointer, "'required' entries must be strings"))?;
            required.push(name.to_string());
        }
    }

    let (closed, additional_properties) = match map.get("additionalProperties") {
        None | Some(Value::Bool(true)) => (false, None),
        Some(Value::Bool(false)) => (true, None),
        Some(schema) => {
            let additional = from_json(schema, &format!("{}/additionalProperties", pointer))?;
            (false, Some(Box::new(additional)))
        }
    };

    Ok(Schema::Object(ObjectSchema {
        annotations,
        properties,
        additional_properties,
        required,
        closed,
    }))
}

fn parse_schema_list(value: &Value, pointer: &str) -> SchemaResult<Vec<Schema>> {
    let entries = value
        .as_array()
        .ok_or_else(|| invalid(pointer, "expected an array of schemas"))?;
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| from_json(entry, &format!("{}/{}", pointer, i)))
        .collect()
}

fn parse_annotations(map: &Map<String, Value>) -> SchemaAnnotations {
    SchemaAnnotations {
        id: map.get("$id").and_then(Value::as_str).map(str::to_string),
        description: map
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn get_f64(map: &Map<String, Value>, key: &str, pointer: &str) -> SchemaResult<Option<f64>> {
    match map.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(pointer, format!("'{}' must be a number", key))),
    }
}

fn get_usize(map: &Map<String, Value>, key: &str, pointer: &str) -> SchemaResult<Option<usize>> {
    match map.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(pointer, format!("'{}' must be a non-negative integer", key))),
    }
}

fn get_bool(map: &Map<String, Value>, key: &str, pointer: &str) -> SchemaResult<Option<bool>> {
    match map.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_bool()
            .map(Some)
            .ok_or_else(|| invalid(pointer, format!("'{}' must be a boolean", key))),
    }
}

fn get_string(map: &Map<String, Value>, key: &str, pointer: &str) -> SchemaResult<Option<String>> {
    match map.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| invalid(pointer, format!("'{}' must be a string", key))),
    }
}

fn invalid(pointer: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::InvalidStructure {
        message: message.into(),
        pointer: pointer.to_string(),
    }
}
