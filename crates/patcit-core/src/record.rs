/*
 * record.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Citation records, failure records and their primary keys.
 */

//! The record model.
//!
//! A [`CitationRecord`] is an insertion-ordered JSON object that always holds
//! its primary key as the first entry. The key is set at construction and can
//! be neither overwritten nor removed afterwards. A unit that cannot be turned
//! into a record is emitted as a [`FailureRecord`] instead; both are wrapped in
//! [`Emitted`], the unit written to an output stream.

use md5::{Digest, Md5};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::StageFailure;

/// Field holding the ordered list of issue codes.
pub const ISSUES: &str = "issues";

/// Field holding the failure description on a downgraded record.
pub const EXCEPTION: &str = "exception";

/// The bibliographic kind of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flavor {
    Npl,
    Pat,
    Bibref,
}

impl Flavor {
    pub const ALL: [Flavor; 3] = [Flavor::Npl, Flavor::Pat, Flavor::Bibref];

    pub fn as_str(self) -> &'static str {
        match self {
            Flavor::Npl => "npl",
            Flavor::Pat => "pat",
            Flavor::Bibref => "bibref",
        }
    }

    /// Primary key used when a command does not say otherwise.
    pub fn default_pk(self) -> &'static str {
        match self {
            Flavor::Npl | Flavor::Bibref => "npl_publn_id",
            Flavor::Pat => "publication_number",
        }
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a string that names no flavor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown flavor '{0}' (expected npl, pat or bibref)")]
pub struct UnknownFlavor(pub String);

impl FromStr for Flavor {
    type Err = UnknownFlavor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "npl" => Ok(Flavor::Npl),
            "pat" => Ok(Flavor::Pat),
            "bibref" => Ok(Flavor::Bibref),
            _ => Err(UnknownFlavor(s.to_string())),
        }
    }
}

/// A citation record: primary key first, then structured fields.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationRecord {
    flavor: Flavor,
    pk_name: String,
    fields: Map<String, Value>,
}

impl CitationRecord {
    /// A record holding only its primary key (a placeholder until fields
    /// are added).
    pub fn new(flavor: Flavor, pk_name: impl Into<String>, pk: impl Into<String>) -> Self {
        let pk_name = pk_name.into();
        let mut fields = Map::new();
        fields.insert(pk_name.clone(), Value::String(pk.into()));
        Self {
            flavor,
            pk_name,
            fields,
        }
    }

    /// Build a record from a JSON object that must already contain the key.
    ///
    /// Numeric keys are converted to strings. Returns `None` when the key is
    /// absent, empty, or neither a string nor a number.
    pub fn from_object(flavor: Flavor, pk_name: &str, mut object: Map<String, Value>) -> Option<Self> {
        let pk = object.shift_remove(pk_name).and_then(|v| pk_string(&v))?;
        let mut record = Self::new(flavor, pk_name, pk);
        record.fields.extend(object);
        Some(record)
    }

    /// Parse one JSON line, taking the primary key from the first candidate
    /// name present on the object.
    pub fn parse_line(
        line: &str,
        flavor: Flavor,
        pk_candidates: &[&str],
    ) -> Result<Self, StageFailure> {
        let value: Value =
            serde_json::from_str(line).map_err(|e| StageFailure::parse(e.to_string(), line))?;
        let Value::Object(object) = value else {
            return Err(StageFailure::parse("expected a JSON object", line));
        };

        let Some(pk_name) = pk_candidates
            .iter()
            .find(|name| object.get(**name).and_then(pk_string).is_some())
        else {
            return Err(StageFailure::parse(
                format!("missing primary key (one of {})", pk_candidates.join(", ")),
                line,
            ));
        };

        Self::from_object(flavor, pk_name, object)
            .ok_or_else(|| StageFailure::parse("missing primary key", line))
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    pub fn pk_name(&self) -> &str {
        &self.pk_name
    }

    pub fn pk(&self) -> &str {
        self.fields
            .get(&self.pk_name)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        if key == self.pk_name {
            return None;
        }
        self.fields.get_mut(key)
    }

    /// String value of a field, if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Set a field. Writing the primary key is ignored.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if key == self.pk_name {
            tracing::debug!(pk = self.pk(), "ignored write to primary key");
            return None;
        }
        self.fields.insert(key, value)
    }

    /// Remove a field, keeping the order of the others. The primary key
    /// cannot be removed.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if key == self.pk_name {
            return None;
        }
        self.fields.shift_remove(key)
    }

    /// Move a field to a new name. An existing field under `to` wins and the
    /// field under `from` is dropped.
    pub fn rename(&mut self, from: &str, to: &str) {
        let Some(value) = self.remove(from) else {
            return;
        };
        if !self.contains(to) {
            self.insert(to, value);
        }
    }

    /// Merge fields from `other`; the primary key is never replaced.
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (key, value) in other {
            self.insert(key, value);
        }
    }

    /// Keep only the fields for which `keep` returns true. The primary key is
    /// always kept.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &Value) -> bool) {
        let pk_name = self.pk_name.clone();
        self.fields
            .retain(|key, value| *key == pk_name || keep(key, value));
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True if the record holds nothing but its primary key.
    pub fn is_placeholder(&self) -> bool {
        self.fields.len() == 1
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl Serialize for CitationRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// The minimal shape a unit is reduced to when it cannot be emitted as a
/// record: `{<pk>, "exception", "issues": [0]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub pk_name: String,
    pub pk: String,
    pub exception: String,
}

impl Serialize for FailureRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(&self.pk_name, &self.pk)?;
        map.serialize_entry(EXCEPTION, &self.exception)?;
        map.serialize_entry(ISSUES, &[0u8])?;
        map.end()
    }
}

/// Replace a unit by its failure record.
pub fn downgrade(pk_name: &str, pk: &str, failure: &StageFailure) -> FailureRecord {
    FailureRecord {
        pk_name: pk_name.to_string(),
        pk: pk.to_string(),
        exception: failure.to_string(),
    }
}

/// One output line.
#[derive(Debug, Clone, PartialEq)]
pub enum Emitted {
    Record(CitationRecord),
    Failure(FailureRecord),
}

impl Emitted {
    pub fn pk(&self) -> &str {
        match self {
            Emitted::Record(record) => record.pk(),
            Emitted::Failure(failure) => &failure.pk,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Emitted::Failure(_))
    }

    /// Serialize to a single JSON line (without the trailing newline).
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl Serialize for Emitted {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Emitted::Record(record) => record.serialize(serializer),
            Emitted::Failure(failure) => failure.serialize(serializer),
        }
    }
}

impl From<CitationRecord> for Emitted {
    fn from(record: CitationRecord) -> Self {
        Emitted::Record(record)
    }
}

/// Hex MD5 digest of `text`'s UTF-8 bytes.
pub fn md5_hex(text: &str) -> String {
    format!("{:x}", Md5::digest(text.as_bytes()))
}

/// Primary key for a unit whose own key cannot be recovered: the digest of
/// its raw text, so the same bad line always maps to the same key.
pub fn fallback_pk(raw: &str) -> String {
    md5_hex(raw)
}

fn pk_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
