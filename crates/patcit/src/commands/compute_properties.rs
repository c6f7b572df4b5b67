/*
 * compute_properties.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * compute-properties command implementation
 */

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use patcit_core::PatcitConfig;
use patcit_core::models::{load_category_classifier, load_language_identifier};
use patcit_core::orchestrator::{JsonlSink, compute_properties};
use patcit_core::properties::PropertyModels;

/// Arguments for the compute-properties command
#[derive(Args, Debug)]
pub struct ComputePropertiesArgs {
    /// Glob of JSONL files
    pub path_glob: String,

    /// Category model (JSON keyword table); the built-in one when omitted
    #[arg(long, value_name = "FILE")]
    pub cat_model: Option<PathBuf>,

    /// Language model (JSON stop-word profiles); the built-in one when omitted
    #[arg(long, value_name = "FILE")]
    pub lang_model: Option<PathBuf>,

    /// Language codes for which a category is computed (e.g. en,un)
    #[arg(long, value_delimiter = ',')]
    pub language_codes: Option<Vec<String>>,
}

/// Execute the compute-properties command
pub fn execute(args: ComputePropertiesArgs, config: &PatcitConfig) -> Result<()> {
    let paths = super::inputs(&args.path_glob)?;
    let models = PropertyModels {
        language: load_language_identifier(args.lang_model.as_deref())
            .context("Failed to load language model")?,
        category: load_category_classifier(args.cat_model.as_deref())
            .context("Failed to load category model")?,
    };
    let language_codes = args
        .language_codes
        .unwrap_or_else(|| config.language_codes.clone());

    let sink = JsonlSink::stdout();
    let summary = compute_properties(&paths, &models, &language_codes, &sink)
        .context("compute-properties failed")?;
    super::report("compute-properties", summary);
    Ok(())
}
