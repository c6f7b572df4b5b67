//! Citation normalization and validation pipeline.
//!
//! This crate turns citation markup produced by a bibliographic parser, and
//! tokenized bibliographic records, into schema-conformant JSON lines.
//!
//! # Architecture
//!
//! Every stage takes a [`CitationRecord`] and returns
//! `Result<CitationRecord, StageFailure>`. A failure never aborts a run:
//! [`validate::finalize`] downgrades it to the minimal failure record.
//!
//! - [`fragments`] - split markup into patent and non-patent fragments
//! - [`enrich`] - resolve fragments concurrently, results in fragment order
//! - [`issues`] - detect and repair known data-quality issues
//! - [`validate`] - prune to the schema and validate
//! - [`brew`] - harvest labeled entities, dates, URLs and hostnames
//! - [`properties`] - content hash, language, category and identity key
//! - [`bibref`] - map GROBID or Crossref records onto the citation vocabulary
//! - [`orchestrator`] - the commands, as functions over files
//!
//! # Example
//!
//! ```
//! use patcit_core::{Flavor, SchemaCatalog, StageFailure};
//! use patcit_core::validate::finalize;
//!
//! let emitted = finalize("npl_publn_id", "X1", Err(StageFailure::missing_markup()));
//! assert_eq!(
//!     emitted.to_json_line().unwrap(),
//!     r#"{"npl_publn_id":"X1","exception":"GrobidException","issues":[0]}"#
//! );
//! assert!(SchemaCatalog::global().resolve_default(Flavor::Npl).is_ok());
//! ```

pub mod bibref;
pub mod brew;
pub mod config;
pub mod dates;
pub mod enrich;
pub mod error;
pub mod fragments;
pub mod issues;
pub mod models;
pub mod orchestrator;
pub mod properties;
pub mod record;
pub mod registry;
pub mod validate;

// Re-export commonly used types
pub use bibref::BibrefSource;
pub use brew::{BrewConfig, CategoryPolicy};
pub use config::PatcitConfig;
pub use enrich::{CitationResolver, TeiResolver};
pub use error::{
    ConfigError, FetchError, ModelError, OrchestratorError, RegistryError, StageFailure,
};
pub use issues::IssueCode;
pub use record::{CitationRecord, Emitted, FailureRecord, Flavor};
pub use registry::{PkType, SchemaCatalog};
