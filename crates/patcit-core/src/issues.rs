/*
 * issues.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Issue detection and deterministic repair.
 */

//! Issue Detector and Issue Resolver.
//!
//! [`detect`] is a pure inspection of a record that returns the anomalies it
//! finds in code order, each code at most once. [`resolve`] applies the known
//! repair for each code in the order given, in a single pass. Neither ever
//! touches the primary key.
//!
//! Detection reads legacy field names as aliases of their canonical names, so
//! a record carrying `author: "Smith"` is reported both as using a legacy
//! name and as holding a bare string where a list is expected. Resolution
//! renames first, so the later repairs see the canonical names.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::dates;
use crate::record::{CitationRecord, Flavor, ISSUES};

/// Anomaly classes, with their wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum IssueCode {
    /// Sentinel carried by downgraded records; never detected.
    Fatal = 0,
    LegacyFieldName = 1,
    TypeMismatch = 2,
    MultipleValues = 3,
    MalformedDate = 4,
    CaseViolation = 5,
    MissingRequiredField = 6,
    EmptyBiblio = 7,
}

impl IssueCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => IssueCode::Fatal,
            1 => IssueCode::LegacyFieldName,
            2 => IssueCode::TypeMismatch,
            3 => IssueCode::MultipleValues,
            4 => IssueCode::MalformedDate,
            5 => IssueCode::CaseViolation,
            6 => IssueCode::MissingRequiredField,
            7 => IssueCode::EmptyBiblio,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            IssueCode::Fatal => "fatal",
            IssueCode::LegacyFieldName => "legacy-field-name",
            IssueCode::TypeMismatch => "type-mismatch",
            IssueCode::MultipleValues => "multiple-values",
            IssueCode::MalformedDate => "malformed-date",
            IssueCode::CaseViolation => "case-violation",
            IssueCode::MissingRequiredField => "missing-required-field",
            IssueCode::EmptyBiblio => "empty-biblio",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code(), self.name())
    }
}

impl Serialize for IssueCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Legacy name → canonical name, for every flavor.
const LEGACY_NAMES: &[(&str, &str)] = &[
    ("author", "authors"),
    ("journal", "title_j"),
    ("DOI", "doi"),
    ("publication_date", "date"),
    ("pub_date", "date"),
];

/// Legacy names only patent records use.
const PAT_LEGACY_NAMES: &[(&str, &str)] = &[("country", "orgname")];

/// Fields whose value is a list of strings.
const LIST_FIELDS: &[&str] = &["authors", "date", "url", "hostnames", "name", "item", "acc_num"];

/// Fields whose value is a single string.
const STRING_FIELDS: &[&str] = &[
    "title_main",
    "title_j",
    "title_m",
    "title_abbrev",
    "volume",
    "issue",
    "first_page",
    "last_page",
    "doi",
    "pmid",
    "issn",
    "isbn",
    "publisher",
    "npl_biblio",
    "orgname",
    "original",
    "epodoc",
    "kind_code",
    "status",
    "pubnum",
    "md5",
    "patcit_id",
];

const TITLE_FIELDS: &[&str] = &["title_main", "title_j", "title_m", "title_abbrev"];

#[derive(Clone, Copy)]
enum Case {
    Upper,
    Lower,
}

const CASE_POLICY: &[(&str, Case)] = &[
    ("doi", Case::Lower),
    ("orgname", Case::Upper),
    ("kind_code", Case::Upper),
    ("epodoc", Case::Upper),
    ("issn", Case::Upper),
];

fn legacy_names(flavor: Flavor) -> impl Iterator<Item = &'static (&'static str, &'static str)> {
    let extra: &'static [(&'static str, &'static str)] = match flavor {
        Flavor::Pat => PAT_LEGACY_NAMES,
        Flavor::Npl | Flavor::Bibref => &[],
    };
    LEGACY_NAMES.iter().chain(extra)
}

/// Read-only view of a record in which legacy names alias canonical ones.
struct CanonicalView<'a> {
    record: &'a CitationRecord,
    flavor: Flavor,
}

impl<'a> CanonicalView<'a> {
    fn new(record: &'a CitationRecord, flavor: Flavor) -> Self {
        Self { record, flavor }
    }

    /// The canonical field, else the first legacy alias present.
    fn get(&self, canonical: &str) -> Option<&'a Value> {
        if canonical == self.record.pk_name() {
            return None;
        }
        self.record.get(canonical).or_else(|| {
            legacy_names(self.flavor)
                .filter(|(_, to)| *to == canonical)
                .find_map(|(from, _)| self.record.get(from))
        })
    }

    fn has_text(&self, canonical: &str) -> bool {
        match self.get(canonical) {
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(items)) => items.iter().any(|v| scalar_text(v).is_some()),
            Some(Value::Number(_)) => true,
            _ => false,
        }
    }
}

/// Inspect `record` for anomalies, in code order.
pub fn detect(record: &CitationRecord, flavor: Flavor) -> Vec<IssueCode> {
    let view = CanonicalView::new(record, flavor);
    let checks: [(IssueCode, fn(&CanonicalView<'_>) -> bool); 7] = [
        (IssueCode::LegacyFieldName, has_legacy_name),
        (IssueCode::TypeMismatch, has_type_mismatch),
        (IssueCode::MultipleValues, has_multiple_values),
        (IssueCode::MalformedDate, has_malformed_date),
        (IssueCode::CaseViolation, has_case_violation),
        (IssueCode::MissingRequiredField, misses_required_field),
        (IssueCode::EmptyBiblio, has_empty_biblio),
    ];

    checks
        .into_iter()
        .filter(|(_, check)| check(&view))
        .map(|(code, _)| code)
        .collect()
}

/// Apply the repair for each code, in order. Codes without a repair leave
/// the record unchanged.
pub fn resolve(mut record: CitationRecord, issues: &[IssueCode]) -> CitationRecord {
    let flavor = record.flavor();
    for issue in issues {
        match issue {
            IssueCode::LegacyFieldName => rename_legacy(&mut record, flavor),
            IssueCode::TypeMismatch => coerce_types(&mut record),
            IssueCode::MultipleValues => keep_first_values(&mut record),
            IssueCode::MalformedDate => reparse_dates(&mut record),
            IssueCode::CaseViolation => apply_case_policy(&mut record),
            IssueCode::MissingRequiredField if flavor == Flavor::Pat => derive_patent_parts(&mut record),
            IssueCode::Fatal | IssueCode::MissingRequiredField | IssueCode::EmptyBiblio => {}
        }
    }
    record
}

/// Detect, record the codes under `issues`, then resolve.
///
/// Codes already stored on the record are kept, so a repaired record passes
/// through again unchanged. Only the newly detected codes are resolved.
pub fn annotate(mut record: CitationRecord, flavor: Flavor) -> CitationRecord {
    let detected = detect(&record, flavor);
    if !detected.is_empty() {
        tracing::debug!(pk = record.pk(), issues = ?detected, "detected issues");
    }
    let mut recorded = stored_issues(&record);
    recorded.extend(detected.iter().copied());
    recorded.sort_unstable();
    recorded.dedup();
    record.insert(
        ISSUES,
        Value::Array(recorded.iter().map(|code| Value::from(code.code())).collect()),
    );
    resolve(record, &detected)
}

fn stored_issues(record: &CitationRecord) -> Vec<IssueCode> {
    let Some(Value::Array(codes)) = record.get(ISSUES) else {
        return Vec::new();
    };
    codes
        .iter()
        .filter_map(Value::as_u64)
        .filter_map(|code| u8::try_from(code).ok())
        .filter_map(IssueCode::from_code)
        .collect()
}

fn has_legacy_name(view: &CanonicalView<'_>) -> bool {
    legacy_names(view.flavor)
        .any(|(from, _)| *from != view.record.pk_name() && view.record.contains(from))
}

fn has_type_mismatch(view: &CanonicalView<'_>) -> bool {
    let string_mismatch = STRING_FIELDS
        .iter()
        .any(|field| matches!(view.get(field), Some(Value::Number(_) | Value::Bool(_))));
    let list_mismatch = LIST_FIELDS.iter().any(|field| match view.get(field) {
        Some(Value::String(_) | Value::Number(_) | Value::Bool(_)) => true,
        Some(Value::Array(items)) => items
            .iter()
            .any(|v| matches!(v, Value::Number(_) | Value::Bool(_))),
        _ => false,
    });
    string_mismatch || list_mismatch
}

fn has_multiple_values(view: &CanonicalView<'_>) -> bool {
    STRING_FIELDS
        .iter()
        .any(|field| matches!(view.get(field), Some(Value::Array(_))))
}

fn has_malformed_date(view: &CanonicalView<'_>) -> bool {
    match view.get("date") {
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| !item.as_str().is_some_and(dates::is_canonical)),
        Some(Value::Null) | None => false,
        Some(other) => !other.as_str().is_some_and(dates::is_canonical),
    }
}

fn has_case_violation(view: &CanonicalView<'_>) -> bool {
    CASE_POLICY.iter().any(|(field, case)| {
        let violates = |s: &str| apply_case(s, *case) != s;
        match view.get(field) {
            Some(Value::String(s)) => violates(s.as_str()),
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).any(violates),
            _ => false,
        }
    })
}

fn misses_required_field(view: &CanonicalView<'_>) -> bool {
    match view.flavor {
        Flavor::Npl | Flavor::Bibref => {
            !TITLE_FIELDS.iter().any(|field| view.has_text(field)) && !view.has_text("npl_biblio")
        }
        Flavor::Pat => !view.has_text("orgname") || !view.has_text("original"),
    }
}

fn has_empty_biblio(view: &CanonicalView<'_>) -> bool {
    matches!(view.get("npl_biblio"), Some(Value::String(s)) if s.trim().is_empty())
}

fn rename_legacy(record: &mut CitationRecord, flavor: Flavor) {
    for (from, to) in legacy_names(flavor) {
        record.rename(from, to);
    }
}

fn coerce_types(record: &mut CitationRecord) {
    for field in STRING_FIELDS {
        if let Some(value) = record.get_mut(field) {
            if let Value::Number(_) | Value::Bool(_) = value {
                *value = Value::String(value.to_string());
            }
        }
    }
    for field in LIST_FIELDS {
        if let Some(value) = record.get_mut(field) {
            match value {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    let item = scalar_text(value).unwrap_or_default();
                    *value = Value::Array(vec![Value::String(item)]);
                }
                Value::Array(items) => {
                    for item in items.iter_mut() {
                        if let Value::Number(_) | Value::Bool(_) = item {
                            *item = Value::String(item.to_string());
                        }
                    }
                }
                Value::Null | Value::Object(_) => {}
            }
        }
    }
}

fn keep_first_values(record: &mut CitationRecord) {
    for field in STRING_FIELDS {
        let Some(Value::Array(items)) = record.get(field) else {
            continue;
        };
        match items.iter().find_map(scalar_text) {
            Some(first) => {
                record.insert(*field, Value::String(first));
            }
            None => {
                record.remove(field);
            }
        }
    }
}

fn reparse_dates(record: &mut CitationRecord) {
    let tokens: Vec<String> = match record.get("date") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(other) => scalar_text(other).into_iter().collect(),
        None => return,
    };
    let parsed = dates::canonical_dates(tokens.iter().map(String::as_str));
    if parsed.is_empty() {
        record.remove("date");
    } else {
        record.insert("date", Value::from(parsed));
    }
}

fn apply_case_policy(record: &mut CitationRecord) {
    for (field, case) in CASE_POLICY {
        match record.get_mut(field) {
            Some(Value::String(s)) => *s = apply_case(s, *case),
            Some(Value::Array(items)) => {
                for item in items.iter_mut() {
                    if let Value::String(s) = item {
                        *s = apply_case(s, *case);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Fill `orgname` and `original` from `epodoc` (`EP1234567`), else from
/// `pubnum` (`EP-1234567-A1`).
fn derive_patent_parts(record: &mut CitationRecord) {
    let parts = record
        .get_str("epodoc")
        .and_then(split_epodoc)
        .or_else(|| record.get_str("pubnum").and_then(split_pubnum));
    let Some((orgname, original)) = parts else {
        return;
    };

    for (field, value) in [("orgname", orgname), ("original", original)] {
        let present = record
            .get_str(field)
            .is_some_and(|s| !s.trim().is_empty());
        if !present {
            record.insert(field, Value::String(value));
        }
    }
}

fn split_epodoc(epodoc: &str) -> Option<(String, String)> {
    let epodoc = epodoc.trim();
    let country = epodoc.get(..2)?;
    let number = epodoc.get(2..)?;
    if !country.chars().all(|c| c.is_ascii_alphabetic()) || number.is_empty() {
        return None;
    }
    Some((country.to_ascii_uppercase(), number.to_string()))
}

fn split_pubnum(pubnum: &str) -> Option<(String, String)> {
    let mut parts = pubnum.trim().split('-');
    let country = parts.next()?;
    let number = parts.next()?;
    if country.len() != 2 || number.is_empty() {
        return None;
    }
    Some((country.to_ascii_uppercase(), number.to_string()))
}

fn apply_case(s: &str, case: Case) -> String {
    match case {
        Case::Upper => s.to_uppercase(),
        Case::Lower => s.to_lowercase(),
    }
}

/// Non-blank text of a string or number.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(flavor: Flavor, fields: Value) -> CitationRecord {
        let Value::Object(map) = fields else {
            unreachable!()
        };
        let pk = flavor.default_pk();
        let mut record = CitationRecord::new(flavor, pk, "1");
        record.merge(map);
        record
    }

    #[test]
    fn test_clean_record_has_no_issues() {
        let r = record(
            Flavor::Npl,
            json!({"title_main": "Attention", "authors": ["A. Vaswani"], "date": ["20170612"]}),
        );
        assert_eq!(detect(&r, Flavor::Npl), vec![]);
    }

    #[test]
    fn test_legacy_names_alias_canonical_fields() {
        let r = record(Flavor::Npl, json!({"author": "Smith", "journal": "Nature"}));
        assert_eq!(
            detect(&r, Flavor::Npl),
            vec![IssueCode::LegacyFieldName, IssueCode::TypeMismatch]
        );

        let fixed = annotate(r, Flavor::Npl);
        assert_eq!(
            fixed.to_value(),
            json!({
                "npl_publn_id": "1",
                "issues": [1, 2],
                "authors": ["Smith"],
                "title_j": "Nature"
            })
        );
    }

    #[test]
    fn test_existing_canonical_field_wins_over_legacy() {
        let r = record(Flavor::Npl, json!({"doi": "10.1/a", "DOI": "10.1/b", "title_m": "B"}));
        let fixed = annotate(r, Flavor::Npl);
        assert_eq!(fixed.get_str("doi"), Some("10.1/a"));
        assert!(!fixed.contains("DOI"));
    }

    #[test]
    fn test_multiple_values_keep_first_non_empty() {
        let r = record(Flavor::Npl, json!({"title_main": ["", "First", "Second"], "volume": 12}));
        assert_eq!(
            detect(&r, Flavor::Npl),
            vec![IssueCode::TypeMismatch, IssueCode::MultipleValues]
        );
        let fixed = annotate(r, Flavor::Npl);
        assert_eq!(fixed.get_str("title_main"), Some("First"));
        assert_eq!(fixed.get_str("volume"), Some("12"));
    }

    #[test]
    fn test_malformed_dates_are_reparsed_and_deduplicated() {
        let r = record(
            Flavor::Npl,
            json!({"npl_biblio": "x", "date": ["2020-01-05", "05.01.2020", "someday", "19991203"]}),
        );
        assert_eq!(detect(&r, Flavor::Npl), vec![IssueCode::MalformedDate]);
        let fixed = annotate(r, Flavor::Npl);
        assert_eq!(fixed.get("date"), Some(&json!(["20200105", "19991203"])));
    }

    #[test]
    fn test_unparseable_dates_remove_the_field() {
        let r = record(Flavor::Npl, json!({"npl_biblio": "x", "date": "2019"}));
        let fixed = annotate(r, Flavor::Npl);
        assert!(!fixed.contains("date"));
        assert_eq!(fixed.get("issues"), Some(&json!([2, 4])));
    }

    #[test]
    fn test_case_policy() {
        let r = record(Flavor::Npl, json!({"npl_biblio": "x", "doi": "10.1109/CVPR", "issn": "1234-567x"}));
        assert_eq!(detect(&r, Flavor::Npl), vec![IssueCode::CaseViolation]);
        let fixed = annotate(r, Flavor::Npl);
        assert_eq!(fixed.get_str("doi"), Some("10.1109/cvpr"));
        assert_eq!(fixed.get_str("issn"), Some("1234-567X"));
    }

    #[test]
    fn test_missing_title_and_biblio_is_unrepairable() {
        let r = record(Flavor::Npl, json!({"volume": "3"}));
        let fixed = annotate(r, Flavor::Npl);
        assert_eq!(fixed.get("issues"), Some(&json!([6])));
        assert_eq!(fixed.get_str("volume"), Some("3"));
    }

    #[test]
    fn test_empty_biblio() {
        let r = record(Flavor::Bibref, json!({"npl_biblio": "  ", "title_main": "T"}));
        assert_eq!(detect(&r, Flavor::Bibref), vec![IssueCode::EmptyBiblio]);
    }

    #[test]
    fn test_patent_parts_derived_from_epodoc() {
        let r = record(Flavor::Pat, json!({"epodoc": "ep1234567", "kind_code": "a1"}));
        assert_eq!(
            detect(&r, Flavor::Pat),
            vec![IssueCode::CaseViolation, IssueCode::MissingRequiredField]
        );
        let fixed = annotate(r, Flavor::Pat);
        assert_eq!(fixed.get_str("orgname"), Some("EP"));
        assert_eq!(fixed.get_str("original"), Some("1234567"));
        assert_eq!(fixed.get_str("epodoc"), Some("EP1234567"));
        assert_eq!(fixed.get_str("kind_code"), Some("A1"));
    }

    #[test]
    fn test_patent_parts_derived_from_pubnum() {
        let r = record(Flavor::Pat, json!({"pubnum": "US-2005123456-A1", "orgname": "US"}));
        let fixed = annotate(r, Flavor::Pat);
        assert_eq!(fixed.get_str("original"), Some("2005123456"));
    }

    #[test]
    fn test_country_is_a_patent_legacy_name_only() {
        let r = record(Flavor::Pat, json!({"country": "de", "original": "1"}));
        assert_eq!(
            detect(&r, Flavor::Pat),
            vec![IssueCode::LegacyFieldName, IssueCode::CaseViolation]
        );
        let fixed = annotate(r, Flavor::Pat);
        assert_eq!(fixed.get_str("orgname"), Some("DE"));

        let r = record(Flavor::Npl, json!({"country": "de", "npl_biblio": "x"}));
        assert_eq!(detect(&r, Flavor::Npl), vec![]);
    }

    #[test]
    fn test_resolve_never_touches_pk() {
        let r = CitationRecord::new(Flavor::Pat, "publication_number", "EP-1-A1");
        let fixed = resolve(r, &[
            IssueCode::Fatal,
            IssueCode::LegacyFieldName,
            IssueCode::TypeMismatch,
            IssueCode::MultipleValues,
            IssueCode::MalformedDate,
            IssueCode::CaseViolation,
            IssueCode::MissingRequiredField,
            IssueCode::EmptyBiblio,
        ]);
        assert_eq!(fixed.pk(), "EP-1-A1");
        assert!(fixed.is_placeholder());
    }

    #[test]
    fn test_annotate_is_idempotent() {
        let r = record(
            Flavor::Npl,
            json!({"author": ["Smith", 7], "DOI": "10.1/X", "pub_date": "Jan 2001", "npl_biblio": "x"}),
        );
        let once = annotate(r, Flavor::Npl);
        let twice = annotate(once.clone(), Flavor::Npl);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_stored_issues_merge_with_new_ones() {
        let r = record(Flavor::Npl, json!({"issues": [4, 1, 99, "x"], "DOI": "10.1/X", "npl_biblio": "x"}));
        let out = annotate(r, Flavor::Npl);
        assert_eq!(out.get("issues"), Some(&json!([1, 4, 5])));
        assert_eq!(out.get_str("doi"), Some("10.1/x"));
    }

    #[test]
    fn test_issue_codes_serialize_as_integers() {
        assert_eq!(serde_json::to_string(&IssueCode::CaseViolation).unwrap(), "5");
        assert_eq!(IssueCode::from_code(6), Some(IssueCode::MissingRequiredField));
        assert_eq!(IssueCode::from_code(8), None);
    }
}
