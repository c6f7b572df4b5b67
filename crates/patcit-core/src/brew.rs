/*
 * brew.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Entity Brewer: labeled spans, dates, URLs and hostnames from free text.
 */

//! Entity Brewer.
//!
//! Runs a [`SpanExtractor`] once over a record's free text and harvests the
//! spans of each label configured for a category into a field named after
//! the lower-cased label. Post-processing runs in a fixed order: dates are
//! canonicalized, URLs and their hostnames are extracted from the raw text,
//! then the category's case policy is applied.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

use crate::dates;
use crate::error::{ConfigError, StageFailure};
use crate::models::SpanExtractor;
use crate::record::CitationRecord;

static URL_EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"http[s]?://(?:[a-zA-Z]|[0-9]|[$-_@.&+]|[!*\(\),—]|(?:%[0-9a-fA-F][0-9a-fA-F]))+")
        .expect("URL expression is valid")
});

/// Label set and case policy of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPolicy {
    pub labels: Vec<String>,
    /// Labels whose values are forced to upper case.
    #[serde(default)]
    pub upper: Vec<String>,
    /// Labels whose values are forced to lower case.
    #[serde(default)]
    pub lower: Vec<String>,
}

impl CategoryPolicy {
    pub fn new(labels: &[&str]) -> Self {
        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            upper: Vec::new(),
            lower: Vec::new(),
        }
    }

    pub fn with_upper(mut self, labels: &[&str]) -> Self {
        self.upper = labels.iter().map(|l| l.to_string()).collect();
        self
    }
}

/// Category name → policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrewConfig {
    pub categories: IndexMap<String, CategoryPolicy>,
}

impl Default for BrewConfig {
    fn default() -> Self {
        let mut categories = IndexMap::new();
        categories.insert("WIKI".to_string(), CategoryPolicy::new(&["DATE", "ITEM"]));
        categories.insert(
            "DATABASE".to_string(),
            CategoryPolicy::new(&["NAME", "DATE", "ACC_NUM"]).with_upper(&["NAME"]),
        );
        Self { categories }
    }
}

impl BrewConfig {
    /// The policy for `category`, or an error naming the known categories.
    pub fn policy(&self, category: &str) -> Result<&CategoryPolicy, ConfigError> {
        self.categories
            .get(category)
            .ok_or_else(|| ConfigError::UnknownCategory {
                category: category.to_string(),
                known: self
                    .categories
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Harvest entities from the record's `npl_biblio` (else `text`) and merge
/// them into the record. A record with neither yields empty lists.
pub fn brew(
    mut record: CitationRecord,
    extractor: &dyn SpanExtractor,
    policy: &CategoryPolicy,
) -> Result<CitationRecord, StageFailure> {
    let text = source_text(&record).unwrap_or_default();
    let spans = extractor.extract(&text)?;

    let mut harvested: IndexMap<String, Vec<String>> = IndexMap::new();
    for label in &policy.labels {
        let values = unique(
            spans
                .iter()
                .filter(|span| span.label == *label)
                .map(|span| span.text.clone()),
        );
        harvested.insert(label.to_lowercase(), values);
    }

    if let Some(raw_dates) = harvested.get_mut("date") {
        *raw_dates = dates::canonical_dates(raw_dates.iter().map(String::as_str));
    }

    let (urls, hostnames) = url_components(&text);
    harvested.insert("url".to_string(), urls);
    harvested.insert("hostnames".to_string(), hostnames);

    for label in &policy.upper {
        recase(&mut harvested, label, str::to_uppercase);
    }
    for label in &policy.lower {
        recase(&mut harvested, label, str::to_lowercase);
    }

    tracing::debug!(pk = record.pk(), spans = spans.len(), "brewed entities");
    for (field, values) in harvested {
        record.insert(field, Value::from(values));
    }
    Ok(record)
}

fn source_text(record: &CitationRecord) -> Option<String> {
    ["npl_biblio", "text"]
        .into_iter()
        .filter_map(|field| record.get_str(field))
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

/// URLs found in `text`, trailing punctuation stripped, with the
/// lower-cased hostnames of those that have one.
pub fn url_components(text: &str) -> (Vec<String>, Vec<String>) {
    let urls = unique(
        URL_EXPRESSION
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(|c: char| c.is_ascii_punctuation()))
            .filter(|url| !url.is_empty())
            .map(str::to_string),
    );
    let hostnames = unique(urls.iter().filter_map(|url| {
        url::Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
    }));
    (urls, hostnames)
}

fn recase(harvested: &mut IndexMap<String, Vec<String>>, label: &str, convert: fn(&str) -> String) {
    if let Some(values) = harvested.get_mut(&label.to_lowercase()) {
        *values = unique(values.iter().map(|v| convert(v)));
    }
}

fn unique(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntitySpan, PatternExtractor};
    use crate::record::Flavor;
    use crate::error::ModelError;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct FixedSpans(Vec<EntitySpan>);

    impl SpanExtractor for FixedSpans {
        fn extract(&self, _text: &str) -> Result<Vec<EntitySpan>, ModelError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    impl SpanExtractor for Broken {
        fn extract(&self, _text: &str) -> Result<Vec<EntitySpan>, ModelError> {
            Err(ModelError::Inference("model unavailable".to_string()))
        }
    }

    fn record(biblio: &str) -> CitationRecord {
        let mut record = CitationRecord::new(Flavor::Npl, "npl_publn_id", "1");
        record.insert("npl_biblio", json!(biblio));
        record
    }

    #[test]
    fn test_database_category() {
        let config = BrewConfig::default();
        let policy = config.policy("DATABASE").unwrap();
        let brewed = brew(
            record("Filed 2020-01-05, see http://example.org/doc."),
            &PatternExtractor::builtin(),
            policy,
        )
        .unwrap();

        assert_eq!(
            brewed.to_value(),
            json!({
                "npl_publn_id": "1",
                "npl_biblio": "Filed 2020-01-05, see http://example.org/doc.",
                "name": [],
                "date": ["20200105"],
                "acc_num": [],
                "url": ["http://example.org/doc"],
                "hostnames": ["example.org"]
            })
        );
    }

    #[test]
    fn test_labels_match_exactly_and_values_dedup_case_sensitively() {
        let spans = FixedSpans(vec![
            EntitySpan::new("ITEM", "Foo"),
            EntitySpan::new("ITEM", "foo"),
            EntitySpan::new("ITEM", "Foo"),
            EntitySpan::new("item", "ignored"),
            EntitySpan::new("DATE", "March 2019"),
            EntitySpan::new("DATE", "soon"),
        ]);
        let policy = BrewConfig::default().policy("WIKI").unwrap().clone();
        let brewed = brew(record("x"), &spans, &policy).unwrap();
        assert_eq!(brewed.get("item"), Some(&json!(["Foo", "foo"])));
        assert_eq!(brewed.get("date"), Some(&json!(["20190301"])));
        assert_eq!(brewed.get("url"), Some(&json!([])));
    }

    #[test]
    fn test_upper_policy_dedups_after_recasing() {
        let spans = FixedSpans(vec![
            EntitySpan::new("NAME", "GenBank"),
            EntitySpan::new("NAME", "GENBANK"),
            EntitySpan::new("NAME", "embl"),
        ]);
        let config = BrewConfig::default();
        let brewed = brew(record("x"), &spans, config.policy("DATABASE").unwrap()).unwrap();
        assert_eq!(brewed.get("name"), Some(&json!(["GENBANK", "EMBL"])));
    }

    #[test]
    fn test_lower_policy() {
        let spans = FixedSpans(vec![EntitySpan::new("ITEM", "Foo Bar")]);
        let policy = CategoryPolicy {
            labels: vec!["ITEM".to_string()],
            upper: Vec::new(),
            lower: vec!["ITEM".to_string()],
        };
        let brewed = brew(record("x"), &spans, &policy).unwrap();
        assert_eq!(brewed.get("item"), Some(&json!(["foo bar"])));
    }

    #[test]
    fn test_falls_back_to_text_field() {
        let mut r = CitationRecord::new(Flavor::Npl, "npl_publn_id", "1");
        r.insert("text", json!("https://en.wikipedia.org/wiki/Rust_(programming_language)."));
        let policy = BrewConfig::default().policy("WIKI").unwrap().clone();
        let brewed = brew(r, &FixedSpans(Vec::new()), &policy).unwrap();
        assert_eq!(
            brewed.get("url"),
            Some(&json!(["https://en.wikipedia.org/wiki/Rust_(programming_language"]))
        );
        assert_eq!(brewed.get("hostnames"), Some(&json!(["en.wikipedia.org"])));
    }

    #[test]
    fn test_extractor_failure_is_a_model_failure() {
        let policy = BrewConfig::default().policy("WIKI").unwrap().clone();
        let err = brew(record("x"), &Broken, &policy).unwrap_err();
        assert!(matches!(err, StageFailure::Model(_)));
    }

    #[test]
    fn test_unknown_category() {
        let err = BrewConfig::default().policy("PATENT").unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown brew category 'PATENT' (known: WIKI, DATABASE)"
        );
    }

    #[test]
    fn test_url_components() {
        let (urls, hosts) = url_components("see HTTP://x and https://Example.COM/a?b=1; or http://example.com/c!");
        assert_eq!(urls, vec!["https://Example.COM/a?b=1", "http://example.com/c"]);
        assert_eq!(hosts, vec!["example.com"]);
    }
}
