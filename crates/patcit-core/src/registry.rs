/*
 * registry.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Schema catalog keyed by flavor and primary key.
 */

//! Schema Registry.
//!
//! Maps a `(flavor, pk_name, pk_type)` triple to a compiled schema. The
//! catalog of valid triples is fixed; each entry points at one of the
//! embedded schema documents, and the primary key property is composed into
//! that document on first use. Compiled schemas are cached for the life of
//! the catalog.

use patcit_schema::schema::{NumberSchema, StringSchema};
use patcit_schema::{CompiledSchema, Schema, SchemaAnnotations};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::error::RegistryError;
use crate::record::Flavor;

const NPL_DOCUMENT: &str = include_str!("../schemas/npl.json");
const PAT_DOCUMENT: &str = include_str!("../schemas/pat.json");
const BIBREF_DOCUMENT: &str = include_str!("../schemas/bibref.json");

/// JSON type of a primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PkType {
    String,
    Integer,
}

impl PkType {
    pub fn as_str(self) -> &'static str {
        match self {
            PkType::String => "string",
            PkType::Integer => "integer",
        }
    }

    fn schema(self) -> Schema {
        match self {
            PkType::String => Schema::String(StringSchema {
                annotations: SchemaAnnotations::default(),
                min_length: Some(1),
                max_length: None,
                pattern: None,
            }),
            PkType::Integer => Schema::Number(NumberSchema {
                annotations: SchemaAnnotations::default(),
                integer: true,
                minimum: None,
                maximum: None,
            }),
        }
    }
}

impl fmt::Display for PkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(PkType::String),
            "integer" => Ok(PkType::Integer),
            other => Err(format!("unknown primary key type '{}'", other)),
        }
    }
}

/// Cache key: one compiled schema per distinct triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub flavor: Flavor,
    pub pk_name: String,
    pub pk_type: PkType,
}

struct CatalogEntry {
    flavor: Flavor,
    pk_name: &'static str,
    pk_type: PkType,
    document_name: &'static str,
    document: &'static str,
}

impl CatalogEntry {
    fn matches(&self, flavor: Flavor, pk_name: &str, pk_type: PkType) -> bool {
        self.flavor == flavor && self.pk_name == pk_name && self.pk_type == pk_type
    }
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        flavor: Flavor::Npl,
        pk_name: "npl_publn_id",
        pk_type: PkType::String,
        document_name: "npl.json",
        document: NPL_DOCUMENT,
    },
    CatalogEntry {
        flavor: Flavor::Npl,
        pk_name: "publication_number",
        pk_type: PkType::String,
        document_name: "npl.json",
        document: NPL_DOCUMENT,
    },
    CatalogEntry {
        flavor: Flavor::Pat,
        pk_name: "publication_number",
        pk_type: PkType::String,
        document_name: "pat.json",
        document: PAT_DOCUMENT,
    },
    CatalogEntry {
        flavor: Flavor::Bibref,
        pk_name: "npl_publn_id",
        pk_type: PkType::String,
        document_name: "bibref.json",
        document: BIBREF_DOCUMENT,
    },
    CatalogEntry {
        flavor: Flavor::Bibref,
        pk_name: "patcit_id",
        pk_type: PkType::String,
        document_name: "bibref.json",
        document: BIBREF_DOCUMENT,
    },
];

static GLOBAL: LazyLock<SchemaCatalog> = LazyLock::new(SchemaCatalog::new);

/// Lazily compiled, cached schemas for every catalog entry.
pub struct SchemaCatalog {
    cache: RwLock<HashMap<SchemaKey, Arc<CompiledSchema>>>,
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide catalog.
    pub fn global() -> &'static SchemaCatalog {
        &GLOBAL
    }

    /// Every triple the catalog can resolve.
    pub fn keys() -> impl Iterator<Item = SchemaKey> {
        CATALOG.iter().map(|entry| SchemaKey {
            flavor: entry.flavor,
            pk_name: entry.pk_name.to_string(),
            pk_type: entry.pk_type,
        })
    }

    /// Resolve a triple to its compiled schema.
    ///
    /// Two threads racing on the same uncached key both compile it; the
    /// results are identical and the second insert is a no-op.
    pub fn resolve(
        &self,
        flavor: Flavor,
        pk_name: &str,
        pk_type: PkType,
    ) -> Result<Arc<CompiledSchema>, RegistryError> {
        let key = SchemaKey {
            flavor,
            pk_name: pk_name.to_string(),
            pk_type,
        };

        if let Some(schema) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Ok(Arc::clone(schema));
        }

        let entry = CATALOG
            .iter()
            .find(|entry| entry.matches(flavor, pk_name, pk_type))
            .ok_or_else(|| RegistryError::SchemaNotFound {
                flavor: flavor.to_string(),
                pk_name: pk_name.to_string(),
                pk_type: pk_type.to_string(),
            })?;

        let compiled = Arc::new(compose(entry)?);
        tracing::debug!(%flavor, pk_name, document = entry.document_name, "compiled schema");

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(key).or_insert(compiled)))
    }

    /// Resolve with the flavor's default primary key (a string).
    pub fn resolve_default(&self, flavor: Flavor) -> Result<Arc<CompiledSchema>, RegistryError> {
        self.resolve(flavor, flavor.default_pk(), PkType::String)
    }
}

/// Parse the entry's document and add its primary key as a required property.
fn compose(entry: &CatalogEntry) -> Result<CompiledSchema, RegistryError> {
    let invalid = |source| RegistryError::InvalidDocument {
        document: entry.document_name,
        source,
    };

    let mut compiled = CompiledSchema::parse_str(entry.document).map_err(invalid)?;
    let object = compiled.object_mut().ok_or_else(|| {
        invalid(patcit_schema::SchemaError::InvalidStructure {
            message: "root schema must be an object".to_string(),
            pointer: "#".to_string(),
        })
    })?;

    object
        .properties
        .insert(entry.pk_name.to_string(), entry.pk_type.schema());
    if !object.required.iter().any(|name| name == entry.pk_name) {
        object.required.insert(0, entry.pk_name.to_string());
    }

    Ok(compiled)
}
