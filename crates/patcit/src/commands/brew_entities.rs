/*
 * brew_entities.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * brew-entities command implementation
 */

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use patcit_core::PatcitConfig;
use patcit_core::models::load_span_extractor;
use patcit_core::orchestrator::{JsonlSink, brew_entities};

/// Arguments for the brew-entities command
#[derive(Args, Debug)]
pub struct BrewEntitiesArgs {
    /// JSONL file
    pub file: PathBuf,

    /// Span extraction model (JSON label patterns); the built-in one when omitted
    #[arg(long, value_name = "FILE")]
    pub model: Option<PathBuf>,

    /// Category whose label set is harvested (e.g. WIKI, DATABASE)
    #[arg(long)]
    pub category: String,
}

/// Execute the brew-entities command
pub fn execute(args: BrewEntitiesArgs, config: &PatcitConfig) -> Result<()> {
    let extractor =
        load_span_extractor(args.model.as_deref()).context("Failed to load extraction model")?;

    let sink = JsonlSink::stdout();
    let summary = brew_entities(
        &args.file,
        extractor.as_ref(),
        &args.category,
        &config.brew,
        &sink,
    )
    .with_context(|| format!("brew-entities failed for {}", args.file.display()))?;
    super::report("brew-entities", summary);
    Ok(())
}
