/*
 * extract_npl.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * extract-npl command implementation
 */

use anyhow::{Context, Result};
use clap::Args;

use patcit_core::PatcitConfig;
use patcit_core::orchestrator::{JsonlSink, extract_npl};

/// Arguments for the extract-npl command
#[derive(Args, Debug)]
pub struct ExtractNplArgs {
    /// Glob of parser output CSV files (npl_publn_id and npl_grobid columns)
    pub path_glob: String,

    /// Rows processed concurrently (defaults to the config, then one per CPU)
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,
}

/// Execute the extract-npl command
pub fn execute(args: ExtractNplArgs, config: &PatcitConfig) -> Result<()> {
    let paths = super::inputs(&args.path_glob)?;
    let workers = config.workers(args.max_workers);
    tracing::debug!(files = paths.len(), workers, "starting extract-npl");

    let sink = JsonlSink::stdout();
    let summary = extract_npl(&paths, workers, &sink).context("extract-npl failed")?;
    super::report("extract-npl", summary);
    Ok(())
}
