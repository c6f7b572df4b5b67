/*
 * extract_intext.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * extract-intext command implementation
 */

use anyhow::{Context, Result};
use clap::Args;

use patcit_core::PatcitConfig;
use patcit_core::orchestrator::extract_intext;

/// Arguments for the extract-intext command
#[derive(Args, Debug)]
pub struct ExtractIntextArgs {
    /// Glob of two-column CSV files (publication_number, markup)
    pub path_glob: String,

    /// Files processed in parallel (defaults to the config, then one per CPU)
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,
}

/// Execute the extract-intext command
///
/// Output goes to `npl_*.jsonl` and `pat_*.jsonl` files next to each input.
pub fn execute(args: ExtractIntextArgs, config: &PatcitConfig) -> Result<()> {
    let paths = super::inputs(&args.path_glob)?;
    let workers = config.workers(args.max_workers);

    let summary = extract_intext(&paths, workers).context("extract-intext failed")?;
    super::report("extract-intext", summary);
    Ok(())
}
