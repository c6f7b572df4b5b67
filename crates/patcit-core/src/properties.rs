/*
 * properties.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Property Enricher: content hash, language, category and identity key.
 */

//! Property enrichment for NPL records.
//!
//! Adds the content hash of `npl_biblio`, the detected language, a
//! category for allowed languages, and a stable `patcit_id`.

use serde_json::Value;
use std::sync::Arc;

use crate::error::StageFailure;
use crate::models::{CategoryClassifier, LanguageIdentifier};
use crate::record::{md5_hex, CitationRecord};

/// A category is kept only when its probability exceeds this.
pub const ACCEPTANCE_THRESHOLD: f64 = 0.5;

/// Models shared by every record of a run.
#[derive(Clone)]
pub struct PropertyModels {
    pub language: Arc<dyn LanguageIdentifier>,
    pub category: Arc<dyn CategoryClassifier>,
}

/// Compute `md5`, the language fields, `npl_cat` and `patcit_id`, in that
/// order.
///
/// `npl_cat` is classified only when the record carries none and the
/// detected language code is in `language_codes`; otherwise it is `null`.
/// `patcit_id` is set from `md5` once and kept on later passes.
pub fn compute_properties(
    mut record: CitationRecord,
    models: &PropertyModels,
    language_codes: &[String],
) -> Result<CitationRecord, StageFailure> {
    let Some(biblio) = record.get_str("npl_biblio").map(str::to_string) else {
        let line = serde_json::to_string(&record).unwrap_or_default();
        return Err(StageFailure::parse("missing npl_biblio", line));
    };

    let md5 = md5_hex(&biblio);
    record.insert("md5", Value::String(md5.clone()));

    let guess = models.language.identify(&biblio)?;
    record.insert("language_is_reliable", Value::Bool(guess.is_reliable));
    record.insert("language", Value::String(guess.language));
    record.insert("language_code", Value::String(guess.code.clone()));
    record.insert("language_percent", Value::from(guess.percent));
    record.insert("language_score", Value::from(guess.score));

    let allowed = language_codes.iter().any(|code| *code == guess.code);
    let tagged = record.get_str("npl_cat").is_some_and(|cat| !cat.is_empty());
    let category = if allowed && !tagged {
        models
            .category
            .classify(&biblio)?
            .into_iter()
            .find(|(_, probability)| *probability > ACCEPTANCE_THRESHOLD)
            .map(|(label, _)| label)
    } else {
        None
    };
    record.insert("npl_cat", category.map_or(Value::Null, Value::String));

    let has_identity = record
        .get_str("patcit_id")
        .is_some_and(|id| !id.is_empty());
    if !has_identity {
        record.insert("patcit_id", Value::String(md5));
    }

    tracing::debug!(pk = record.pk(), language = %guess.code, "computed properties");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::models::{KeywordClassifier, LanguageGuess, StopwordIdentifier};
    use crate::record::Flavor;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct FixedLanguage(&'static str);

    impl LanguageIdentifier for FixedLanguage {
        fn identify(&self, _text: &str) -> Result<LanguageGuess, ModelError> {
            Ok(LanguageGuess {
                is_reliable: true,
                language: self.0.to_uppercase(),
                code: self.0.to_string(),
                percent: 97.0,
                score: 1200.0,
            })
        }
    }

    struct Confident(f64);

    impl CategoryClassifier for Confident {
        fn classify(&self, _text: &str) -> Result<Vec<(String, f64)>, ModelError> {
            Ok(vec![("DATABASE".to_string(), self.0), ("WIKI".to_string(), 1.0 - self.0)])
        }
    }

    struct Failing;

    impl LanguageIdentifier for Failing {
        fn identify(&self, _text: &str) -> Result<LanguageGuess, ModelError> {
            Err(ModelError::Inference("detector crashed".to_string()))
        }
    }

    fn models(language: &'static str, confidence: f64) -> PropertyModels {
        PropertyModels {
            language: Arc::new(FixedLanguage(language)),
            category: Arc::new(Confident(confidence)),
        }
    }

    fn codes() -> Vec<String> {
        vec!["en".to_string(), "un".to_string()]
    }

    fn record(biblio: &str) -> CitationRecord {
        let mut record = CitationRecord::new(Flavor::Npl, "npl_publn_id", "9");
        record.insert("npl_biblio", json!(biblio));
        record
    }

    #[test]
    fn test_properties_in_order() {
        let out = compute_properties(record("abc"), &models("en", 0.9), &codes()).unwrap();
        assert_eq!(
            out.keys().collect::<Vec<_>>(),
            vec![
                "npl_publn_id",
                "npl_biblio",
                "md5",
                "language_is_reliable",
                "language",
                "language_code",
                "language_percent",
                "language_score",
                "npl_cat",
                "patcit_id"
            ]
        );
        assert_eq!(out.get_str("md5"), Some("900150983cd24fb0d6963f7d28e17f72"));
        assert_eq!(out.get_str("patcit_id"), out.get_str("md5"));
        assert_eq!(out.get_str("npl_cat"), Some("DATABASE"));
    }

    #[test]
    fn test_category_null_outside_allow_list() {
        let out = compute_properties(record("abc"), &models("fr", 0.99), &codes()).unwrap();
        assert_eq!(out.get("npl_cat"), Some(&Value::Null));

        let mut tagged = record("abc");
        tagged.insert("npl_cat", json!("WIKI"));
        let out = compute_properties(tagged, &models("fr", 0.99), &codes()).unwrap();
        assert_eq!(out.get("npl_cat"), Some(&Value::Null));
    }

    #[test]
    fn test_category_requires_confidence() {
        let out = compute_properties(record("abc"), &models("en", 0.5), &codes()).unwrap();
        assert_eq!(out.get("npl_cat"), Some(&Value::Null));
    }

    #[test]
    fn test_existing_category_is_cleared_and_identity_kept() {
        let mut tagged = record("abc");
        tagged.insert("npl_cat", json!("WIKI"));
        tagged.insert("patcit_id", json!("stable-id"));
        let out = compute_properties(tagged, &models("en", 0.9), &codes()).unwrap();
        assert_eq!(out.get("npl_cat"), Some(&Value::Null));
        assert_eq!(out.get_str("patcit_id"), Some("stable-id"));
    }

    #[test]
    fn test_idempotent_with_builtin_models() {
        let models = PropertyModels {
            language: Arc::new(StopwordIdentifier::builtin()),
            category: Arc::new(KeywordClassifier::builtin()),
        };
        let input = record("Smith J., A study of the heart, Journal of Cardiology, vol. 3, pp. 1-9");
        let mut once = compute_properties(input, &models, &codes()).unwrap();
        let mut twice = compute_properties(once.clone(), &models, &codes()).unwrap();
        assert_eq!(once.get_str("language_code"), Some("en"));
        assert_eq!(twice.get_str("patcit_id"), once.get_str("md5"));
        once.remove("npl_cat");
        twice.remove("npl_cat");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_tagged_record_in_allowed_language_gets_null_category() {
        let models = PropertyModels {
            language: Arc::new(StopwordIdentifier::builtin()),
            category: Arc::new(KeywordClassifier::builtin()),
        };
        let mut tagged = record("A study of the heart and the lungs");
        tagged.insert("npl_cat", json!("WIKI"));
        let out = compute_properties(tagged, &models, &["en".to_string()]).unwrap();
        assert_eq!(out.get_str("language_code"), Some("en"));
        assert_eq!(out.get("npl_cat"), Some(&Value::Null));
    }

    #[test]
    fn test_missing_biblio_is_a_parse_failure() {
        let r = CitationRecord::new(Flavor::Npl, "npl_publn_id", "9");
        let err = compute_properties(r, &models("en", 0.9), &codes()).unwrap_err();
        assert_eq!(
            err.to_string(),
            r#"missing npl_biblio in line: {"npl_publn_id":"9"}"#
        );
    }

    #[test]
    fn test_model_failure_surfaces() {
        let models = PropertyModels {
            language: Arc::new(Failing),
            category: Arc::new(Confident(0.9)),
        };
        let err = compute_properties(record("abc"), &models, &codes()).unwrap_err();
        assert!(matches!(err, StageFailure::Model(m) if m.contains("detector crashed")));
    }
}
