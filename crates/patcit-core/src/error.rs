/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Error types for patcit-core.
 */

//! Error types for the citation pipeline.
//!
//! [`StageFailure`] is what a pipeline stage returns when a record cannot be
//! produced. It never aborts a run: [`crate::record::downgrade`] turns it into
//! the minimal failure record. The other enums describe failures of the
//! collaborators a stage depends on and convert into a `StageFailure` at the
//! stage boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Exception text for a unit whose upstream parser output is missing.
pub const GROBID_EXCEPTION: &str = "GrobidException";

/// Terminal failure of one pipeline stage for one unit.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageFailure {
    /// The input line is not well-formed for its expected format.
    #[error("{message} in line: {line}")]
    Parse { message: String, line: String },

    /// Upstream parser output for the unit is missing, empty or unreadable.
    #[error("{0}")]
    Extraction(String),

    /// Enrichment of one fragment failed.
    #[error("{0}")]
    Fetch(String),

    /// The record does not conform to its schema, or no schema applies.
    #[error("{0}")]
    Schema(String),

    /// Language identification, classification or span extraction failed.
    #[error("{0}")]
    Model(String),
}

impl StageFailure {
    pub fn parse(message: impl Into<String>, line: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            line: line.into(),
        }
    }

    /// Empty or absent upstream parser output.
    pub fn missing_markup() -> Self {
        Self::Extraction(GROBID_EXCEPTION.to_string())
    }

    /// Short name of the failure class, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            StageFailure::Parse { .. } => "parse",
            StageFailure::Extraction(_) => "extraction",
            StageFailure::Fetch(_) => "fetch",
            StageFailure::Schema(_) => "schema",
            StageFailure::Model(_) => "model",
        }
    }
}

/// Errors from the schema catalog.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("no schema for flavor '{flavor}' with primary key '{pk_name}' of type '{pk_type}'")]
    SchemaNotFound {
        flavor: String,
        pk_name: String,
        pk_type: String,
    },

    #[error("schema document '{document}' is invalid: {source}")]
    InvalidDocument {
        document: &'static str,
        #[source]
        source: patcit_schema::SchemaError,
    },
}

impl From<RegistryError> for StageFailure {
    fn from(err: RegistryError) -> Self {
        StageFailure::Schema(err.to_string())
    }
}

/// Errors raised by model collaborators.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("cannot read model '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid model '{}': {message}", path.display())]
    Format { path: PathBuf, message: String },

    #[error("inference failed: {0}")]
    Inference(String),
}

impl From<ModelError> for StageFailure {
    fn from(err: ModelError) -> Self {
        StageFailure::Model(err.to_string())
    }
}

/// Errors raised while enriching a fragment.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("fragment {index} has no content")]
    EmptyFragment { index: usize },

    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("enrichment task failed: {0}")]
    Task(String),
}

impl From<FetchError> for StageFailure {
    fn from(err: FetchError) -> Self {
        StageFailure::Fetch(err.to_string())
    }
}

/// Errors loading the run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config '{}': {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unknown brew category '{category}' (known: {known})")]
    UnknownCategory { category: String, known: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors that stop a command before any unit is processed.
///
/// Per-file and per-line failures are logged and counted in the run summary
/// instead.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("invalid path pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write output: {0}")]
    Sink(#[source] std::io::Error),

    #[error("cannot start worker pool: {0}")]
    Pool(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
