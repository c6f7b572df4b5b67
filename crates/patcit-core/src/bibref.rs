/*
 * bibref.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Bibliographic reference normalization from GROBID or Crossref records.
 */

//! Bibref normalization.
//!
//! Crossref works are mapped field by field onto the citation vocabulary.
//! GROBID records already use it and pass through. Either way the result
//! then goes through issue detection, pruning and validation against the
//! bibref schema.

use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::StageFailure;
use crate::issues;
use crate::record::{fallback_pk, CitationRecord, Emitted, Flavor};
use crate::registry::{PkType, SchemaCatalog};
use crate::validate::{finalize, prepare, validate_record};

/// Where a bibliographic record comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BibrefSource {
    Grobid,
    Crossref,
}

impl BibrefSource {
    pub fn as_str(self) -> &'static str {
        match self {
            BibrefSource::Grobid => "grobid",
            BibrefSource::Crossref => "crossref",
        }
    }
}

impl fmt::Display for BibrefSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BibrefSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grobid" => Ok(BibrefSource::Grobid),
            "crossref" => Ok(BibrefSource::Crossref),
            other => Err(format!("unknown source flavor '{}' (expected grobid or crossref)", other)),
        }
    }
}

const BIBREF_SOURCE: &str = "bibref_source";

/// Dates Crossref may carry, most specific first.
const CROSSREF_DATES: &[&str] = &["issued", "published-print", "published-online", "created"];

/// Map one input object onto a bibref record.
///
/// The primary key is `npl_publn_id` when present, else `patcit_id`, else
/// the lower-cased DOI stored as `patcit_id`.
pub fn to_patcit(value: Value, source: BibrefSource) -> Result<CitationRecord, StageFailure> {
    if !value.is_object() {
        return Err(StageFailure::parse("expected a JSON object", value.to_string()));
    }
    let raw = value;
    let fields = match source {
        BibrefSource::Grobid => passthrough(&raw),
        BibrefSource::Crossref => crossref_fields(&raw),
    };

    let (pk_name, pk) = primary_key(&raw)
        .ok_or_else(|| StageFailure::parse("missing primary key (npl_publn_id, patcit_id or DOI)", raw.to_string()))?;

    let mut record = CitationRecord::new(Flavor::Bibref, pk_name, pk);
    record.merge(fields);
    if !record.contains(BIBREF_SOURCE) {
        record.insert(BIBREF_SOURCE, Value::String(source.as_str().to_string()));
    }
    Ok(record)
}

/// Parse, map, repair and validate one JSONL line.
pub fn normalize_line(line: &str, source: BibrefSource, catalog: &SchemaCatalog) -> Emitted {
    let default_pk = Flavor::Bibref.default_pk();
    let record = serde_json::from_str::<Value>(line)
        .map_err(|e| StageFailure::parse(e.to_string(), line))
        .and_then(|value| to_patcit(value, source));

    let record = match record {
        Ok(record) => record,
        Err(failure) => return finalize(default_pk, &fallback_pk(line), Err(failure)),
    };

    let pk_name = record.pk_name().to_string();
    let pk = record.pk().to_string();
    let result = catalog
        .resolve(Flavor::Bibref, &pk_name, PkType::String)
        .map_err(StageFailure::from)
        .and_then(|schema| {
            let record = issues::annotate(record, Flavor::Bibref);
            validate_record(prepare(record, &schema), &schema)
        });
    finalize(&pk_name, &pk, result)
}

fn primary_key(raw: &Value) -> Option<(&'static str, String)> {
    for name in ["npl_publn_id", "patcit_id"] {
        if let Some(pk) = raw.get(name).and_then(text) {
            return Some((name, pk));
        }
    }
    raw.get("DOI")
        .or_else(|| raw.get("doi"))
        .and_then(text)
        .map(|doi| ("patcit_id", doi.to_lowercase()))
}

fn passthrough(raw: &Value) -> Map<String, Value> {
    raw.as_object().cloned().unwrap_or_default()
}

fn crossref_fields(raw: &Value) -> Map<String, Value> {
    let mut out = Map::new();
    let mut put = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            out.insert(key.to_string(), Value::String(value));
        }
    };

    put("doi", raw.get("DOI").and_then(text));
    put("title_main", first_text(raw, "title"));
    put("title_j", first_text(raw, "container-title"));
    put("title_abbrev", first_text(raw, "short-container-title"));
    put("volume", raw.get("volume").and_then(text));
    put("issue", raw.get("issue").and_then(text));
    if let Some(page) = raw.get("page").and_then(text) {
        match page.split_once('-') {
            Some((first, last)) => {
                put("first_page", Some(first.trim().to_string()));
                put("last_page", Some(last.trim().to_string()));
            }
            None => put("first_page", Some(page)),
        }
    }
    put("issn", first_text(raw, "ISSN"));
    put("isbn", first_text(raw, "ISBN"));
    put("publisher", raw.get("publisher").and_then(text));

    for key in ["npl_publn_id", "patcit_id"] {
        if let Some(value) = raw.get(key) {
            out.insert(key.to_string(), value.clone());
        }
    }

    let authors: Vec<String> = raw
        .get("author")
        .and_then(Value::as_array)
        .map(|authors| authors.iter().filter_map(author_name).collect())
        .unwrap_or_default();
    if !authors.is_empty() {
        out.insert("authors".to_string(), Value::from(authors));
    }

    if let Some(date) = CROSSREF_DATES.iter().find_map(|key| date_parts(raw.get(*key)?)) {
        out.insert("date".to_string(), Value::from(vec![date]));
    }
    if let Some(url) = raw.get("URL").and_then(text) {
        out.insert("url".to_string(), Value::from(vec![url]));
    }
    out
}

/// `{"given": "Ada", "family": "Lovelace"}` → `"Ada Lovelace"`; a `name`
/// (for organizations) is used as is.
fn author_name(author: &Value) -> Option<String> {
    if let Some(name) = author.get("name").and_then(text) {
        return Some(name);
    }
    let parts: Vec<String> = ["given", "family"]
        .into_iter()
        .filter_map(|key| author.get(key).and_then(text))
        .collect();
    if parts.is_empty() { None } else { Some(parts.join(" ")) }
}

/// `{"date-parts": [[2016, 6, 27]]}` → `"20160627"`; a missing day is the
/// first of the month, a bare year is not a date.
fn date_parts(value: &Value) -> Option<String> {
    let parts = value.get("date-parts")?.get(0)?.as_array()?;
    let number = |i: usize| parts.get(i).and_then(Value::as_i64);
    let year = i32::try_from(number(0)?).ok()?;
    let month = u32::try_from(number(1)?).ok()?;
    let day = number(2).map_or(Some(1), |d| u32::try_from(d).ok())?;
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.format("%Y%m%d").to_string())
}

fn first_text(raw: &Value, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::Array(items) => items.iter().find_map(text),
        other => text(other),
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
