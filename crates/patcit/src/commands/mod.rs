//! Command implementations for the patcit CLI
//!
//! Each command module handles the CLI interface and delegates to
//! patcit-core for the actual work.

pub mod brew_entities;
pub mod compute_properties;
pub mod extract_intext;
pub mod extract_npl;
pub mod normalize_bibref;

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use patcit_core::orchestrator::{expand_paths, RunSummary};

/// Expand a path pattern, naming it in the error.
fn inputs(pattern: &str) -> Result<Vec<PathBuf>> {
    expand_paths(pattern).with_context(|| format!("Failed to expand input pattern '{}'", pattern))
}

/// Log the outcome of a run.
fn report(command: &str, summary: RunSummary) {
    info!(
        command,
        files = summary.files,
        emitted = summary.emitted,
        downgraded = summary.downgraded,
        "run finished"
    );
    if summary.failed_files > 0 {
        warn!(command, failed_files = summary.failed_files, "some input files were skipped");
    }
}
