//! Whole-document parsing and validation, using a schema shaped like the
//! citation record schemas.

use patcit_schema::{CompiledSchema, Schema};
use pretty_assertions::assert_eq;
use serde_json::json;

const CITATION_SCHEMA: &str = r##"{
  "$id": "citation",
  "description": "A non-patent literature citation",
  "type": "object",
  "definitions": {
    "date": {"type": "string", "pattern": "^[0-9]{8}$"},
    "issue_code": {"type": "integer", "minimum": 0, "maximum": 7}
  },
  "properties": {
    "title_main": {"type": "string"},
    "authors": {"type": "array", "items": {"type": "string", "minLength": 1}},
    "date": {"type": "array", "items": {"$ref": "#/definitions/date"}, "uniqueItems": true},
    "doi": {"type": "string", "pattern": "^[^A-Z]*$"},
    "npl_cat": {"type": ["string", "null"]},
    "issues": {"type": "array", "items": {"$ref": "#/definitions/issue_code"}}
  },
  "required": ["issues"],
  "additionalProperties": false
}"##;

fn compiled() -> CompiledSchema {
    CompiledSchema::parse_str(CITATION_SCHEMA).unwrap()
}

#[test]
fn test_document_structure() {
    let schema = compiled();
    assert_eq!(schema.registry.len(), 2);
    assert_eq!(schema.root.annotations().id.as_deref(), Some("citation"));

    let object = schema.object().unwrap();
    assert!(object.closed);
    assert_eq!(object.properties.len(), 6);
}

#[test]
fn test_clean_record_validates() {
    let record = json!({
        "title_main": "Deep residual learning",
        "authors": ["Kaiming He"],
        "date": ["20160627"],
        "doi": "10.1109/cvpr.2016.90",
        "npl_cat": null,
        "issues": []
    });
    assert!(compiled().validate(&record).is_ok());
}

#[test]
fn test_violations_name_their_location() {
    let schema = compiled();

    let cases = [
        (json!({"issues": [9]}), "Number 9 is greater than maximum 7 at issues.[0]"),
        (
            json!({"issues": [], "date": ["20160627", "20160627"]}),
            "Array items must be unique at date",
        ),
        (
            json!({"issues": [], "doi": "10.1109/CVPR"}),
            "String '10.1109/CVPR' does not match pattern '^[^A-Z]*$' at doi",
        ),
        (json!({"issues": [], "venue": "x"}), "Unknown property 'venue' at (root)"),
        (json!({}), "Missing required property 'issues' at (root)"),
    ];

    for (record, expected) in cases {
        let err = schema.validate(&record).unwrap_err();
        assert_eq!(err.to_string(), expected);
    }
}

#[test]
fn test_boolean_schemas() {
    assert_eq!(Schema::from_json(&json!(true)).unwrap(), Schema::True);
    assert_eq!(Schema::from_json(&json!(false)).unwrap(), Schema::False);
}

#[test]
fn test_documents_with_unsupported_keywords_do_not_compile() {
    let document = r#"{
      "type": "object",
      "properties": {
        "k": {"const": "a"},
        "n": {"oneOf": [{"type": "string"}]}
      }
    }"#;
    let err = CompiledSchema::parse_str(document).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid schema structure: unsupported keyword 'const' (at #/properties/k)"
    );
}
