/*
 * validate.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Schema preparation, validation and the downgrade path.
 */

//! Schema Validator.
//!
//! A record is first pruned to what its schema can describe ([`prepare`]),
//! then validated ([`validate_record`]). [`finalize`] is the single place a
//! stage result becomes an output unit: a failure of any kind is downgraded
//! to the minimal failure record. There is no second repair attempt.

use patcit_schema::CompiledSchema;
use serde_json::Value;

use crate::error::StageFailure;
use crate::issues;
use crate::record::{downgrade, CitationRecord, Emitted, Flavor, ISSUES};

/// Fields whose `null` is meaningful and must be emitted.
const NULLABLE_FIELDS: &[&str] = &["npl_cat"];

/// Drop fields a closed schema does not declare, along with `null`s, blank
/// strings and empty lists. The primary key and `issues` are always kept.
pub fn prepare(mut record: CitationRecord, schema: &CompiledSchema) -> CitationRecord {
    let object = schema.object();
    record.retain(|key, value| {
        if key == ISSUES {
            return true;
        }
        if object.is_some_and(|object| !object.allows(key)) {
            return false;
        }
        match value {
            Value::Null => NULLABLE_FIELDS.contains(&key),
            Value::String(s) => !s.trim().is_empty(),
            Value::Array(items) => !items.is_empty(),
            _ => true,
        }
    });
    record
}

/// Validate the record as a JSON object against `schema`.
pub fn validate_record(
    record: CitationRecord,
    schema: &CompiledSchema,
) -> Result<CitationRecord, StageFailure> {
    match schema.validate(&record.to_value()) {
        Ok(()) => Ok(record),
        Err(err) => Err(StageFailure::Schema(err.to_string())),
    }
}

/// Turn a stage result into an output unit, downgrading failures.
pub fn finalize(pk_name: &str, pk: &str, result: Result<CitationRecord, StageFailure>) -> Emitted {
    match result {
        Ok(record) => {
            tracing::debug!(pk = record.pk(), fields = record.len(), "record accepted");
            Emitted::Record(record)
        }
        Err(failure) => {
            tracing::warn!(pk, kind = failure.kind(), exception = %failure, "record downgraded");
            Emitted::Failure(downgrade(pk_name, pk, &failure))
        }
    }
}

/// Issue detection and repair, pruning and validation for one record.
pub fn normalize_record(
    record: CitationRecord,
    flavor: Flavor,
    schema: &CompiledSchema,
) -> Result<CitationRecord, StageFailure> {
    let record = issues::annotate(record, flavor);
    let record = prepare(record, schema);
    validate_record(record, schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaCatalog;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn npl(fields: Value) -> CitationRecord {
        let Value::Object(map) = fields else {
            unreachable!()
        };
        let mut record = CitationRecord::new(Flavor::Npl, "npl_publn_id", "7");
        record.merge(map);
        record
    }

    #[test]
    fn test_prepare_drops_undeclared_and_empty_fields() {
        let schema = SchemaCatalog::global().resolve_default(Flavor::Npl).unwrap();
        let record = npl(json!({
            "title_main": "T",
            "venue": "unknown to the schema",
            "volume": "",
            "authors": [],
            "publisher": null,
            "npl_cat": null,
            "issues": []
        }));
        let prepared = prepare(record, &schema);
        assert_eq!(
            prepared.to_value(),
            json!({"npl_publn_id": "7", "title_main": "T", "npl_cat": null, "issues": []})
        );
    }

    #[test]
    fn test_normalize_accepts_repairable_record() {
        let schema = SchemaCatalog::global().resolve_default(Flavor::Npl).unwrap();
        let record = npl(json!({"journal": "Nature", "DOI": "10.1038/NATURE14539", "date": "May 2015"}));
        let record = normalize_record(record, Flavor::Npl, &schema).unwrap();
        assert_eq!(
            record.to_value(),
            json!({
                "npl_publn_id": "7",
                "issues": [1, 2, 4, 5],
                "title_j": "Nature",
                "doi": "10.1038/nature14539",
                "date": ["20150501"]
            })
        );
    }

    #[test]
    fn test_schema_violation_downgrades() {
        let schema = SchemaCatalog::global().resolve_default(Flavor::Npl).unwrap();
        let record = npl(json!({"title_main": "T", "pmid": "PMC123"}));
        let result = normalize_record(record, Flavor::Npl, &schema);
        let failure = result.clone().unwrap_err();
        assert!(matches!(failure, StageFailure::Schema(_)));

        let emitted = finalize("npl_publn_id", "7", result);
        let line = emitted.to_json_line().unwrap();
        assert_eq!(
            line,
            r#"{"npl_publn_id":"7","exception":"String 'PMC123' does not match pattern '^[0-9]+$' at pmid","issues":[0]}"#
        );
    }

    #[test]
    fn test_clean_record_round_trips() {
        let schema = SchemaCatalog::global().resolve_default(Flavor::Npl).unwrap();
        let record = npl(json!({"title_main": "T", "authors": ["A B"], "date": ["20200105"]}));
        let first = normalize_record(record, Flavor::Npl, &schema).unwrap();
        assert_eq!(first.get("issues"), Some(&json!([])));

        let second = normalize_record(first.clone(), Flavor::Npl, &schema).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_repaired_record_round_trips() {
        let schema = SchemaCatalog::global().resolve_default(Flavor::Npl).unwrap();
        let first = normalize_record(npl(json!({"journal": "Nature"})), Flavor::Npl, &schema).unwrap();
        assert_eq!(
            first.to_value(),
            json!({"npl_publn_id": "7", "issues": [1], "title_j": "Nature"})
        );

        let second = normalize_record(first.clone(), Flavor::Npl, &schema).unwrap();
        assert_eq!(first, second);
    }
}
