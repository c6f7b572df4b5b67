// Schema validation for patcit citation records
//
// This crate provides a JSON Schema subset (the keywords the citation
// schemas actually use) and a validator over `serde_json::Value` that
// reports the first violation with its instance path.

pub mod error;
pub mod schema;
pub mod validator;

pub use error::{
    InstancePath, PathSegment, SchemaError, SchemaPath, SchemaResult, ValidationError,
    ValidationResult,
};
pub use schema::{CompiledSchema, ObjectSchema, Schema, SchemaAnnotations, SchemaRegistry};
pub use validator::{ValidationContext, validate};
