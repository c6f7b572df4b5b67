/*
 * normalize_bibref.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * normalize-bibref command implementation
 */

use anyhow::{Context, Result};
use clap::Args;

use patcit_core::BibrefSource;
use patcit_core::orchestrator::{JsonlSink, normalize_bibref};

/// Arguments for the normalize-bibref command
#[derive(Args, Debug)]
pub struct NormalizeBibrefArgs {
    /// Glob of JSONL files
    pub path_glob: String,

    /// Where the records come from (grobid or crossref)
    #[arg(long)]
    pub src_flavor: BibrefSource,
}

/// Execute the normalize-bibref command
pub fn execute(args: NormalizeBibrefArgs) -> Result<()> {
    let paths = super::inputs(&args.path_glob)?;

    let sink = JsonlSink::stdout();
    let summary =
        normalize_bibref(&paths, args.src_flavor, &sink).context("normalize-bibref failed")?;
    super::report("normalize-bibref", summary);
    Ok(())
}
