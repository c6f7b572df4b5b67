//! patcit CLI - Main entry point

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use patcit_core::PatcitConfig;

mod commands;

#[derive(Parser)]
#[command(name = "patcit")]
#[command(version)]
#[command(about = "Normalize and validate patent and non-patent citations", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract front-page NPL citations from parser output tables
    ExtractNpl(commands::extract_npl::ExtractNplArgs),

    /// Extract in-text citations into paired npl_/pat_ files
    ExtractIntext(commands::extract_intext::ExtractIntextArgs),

    /// Map GROBID or Crossref records onto the bibref schema
    NormalizeBibref(commands::normalize_bibref::NormalizeBibrefArgs),

    /// Add content hash, language, category and identity key
    ComputeProperties(commands::compute_properties::ComputePropertiesArgs),

    /// Harvest labeled entities, dates, URLs and hostnames
    BrewEntities(commands::brew_entities::BrewEntitiesArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON lines.
    let default_filter = if cli.quiet { "patcit=warn" } else { "patcit=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = PatcitConfig::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::ExtractNpl(args) => commands::extract_npl::execute(args, &config),
        Commands::ExtractIntext(args) => commands::extract_intext::execute(args, &config),
        Commands::NormalizeBibref(args) => commands::normalize_bibref::execute(args),
        Commands::ComputeProperties(args) => commands::compute_properties::execute(args, &config),
        Commands::BrewEntities(args) => commands::brew_entities::execute(args, &config),
    }
}
