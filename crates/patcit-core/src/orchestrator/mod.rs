/*
 * orchestrator/mod.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Commands as functions over input files.
 */

//! Orchestrator.
//!
//! Each command drives the pipeline stages over a set of input files and
//! streams one JSON line per unit. Units are atomic: a failing line or row
//! becomes a failure record, and a file that cannot be read or written is
//! logged and counted in the [`RunSummary`]. Nothing short of a bad path
//! pattern, an unusable worker pool or an invalid configuration stops a run.
//!
//! Two concurrency tiers are used:
//!
//! - [`extract_intext`] is CPU-bound (markup parsing per patent). Files are
//!   spread over a rayon pool; each worker owns its output files and a
//!   current-thread tokio runtime for the fragment fan-out.
//! - [`extract_npl`] drives one row per task on a multi-thread tokio runtime,
//!   with at most `workers` rows in flight.

mod intext;
mod jsonl;
mod npl;
pub mod sink;

pub use intext::extract_intext;
pub use jsonl::{brew_entities, compute_properties, normalize_bibref};
pub use npl::extract_npl;
pub use sink::JsonlSink;

use serde::Serialize;
use std::io::{self, Write};
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use crate::error::OrchestratorError;
use crate::record::Emitted;

/// Counts reported by every command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Input files visited.
    pub files: usize,
    /// Lines written, records and failures alike.
    pub emitted: usize,
    /// Lines written as failure records.
    pub downgraded: usize,
    /// Files abandoned because they could not be read or written.
    pub failed_files: usize,
}

impl RunSummary {
    pub fn count(&mut self, emitted: &Emitted) {
        self.emitted += 1;
        if emitted.is_failure() {
            self.downgraded += 1;
        }
    }
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.emitted += other.emitted;
        self.downgraded += other.downgraded;
        self.failed_files += other.failed_files;
    }
}

/// Write one unit and count it.
fn deliver<W: Write + Send>(
    sink: &JsonlSink<W>,
    summary: &mut RunSummary,
    unit: &Emitted,
) -> Result<(), OrchestratorError> {
    sink.emit(unit)?;
    summary.count(unit);
    Ok(())
}

fn unreadable(path: &Path, err: impl Into<io::Error>) -> OrchestratorError {
    OrchestratorError::Io {
        path: path.to_path_buf(),
        source: err.into(),
    }
}

/// Log a file that had to be abandoned and count it.
fn abandon(path: &Path, err: &OrchestratorError, summary: &mut RunSummary) {
    tracing::error!(path = %path.display(), error = %err, "abandoned input file");
    summary.failed_files += 1;
}

/// Expand a glob pattern into the matching files, sorted.
///
/// Entries that cannot be read while walking are logged and skipped.
pub fn expand_paths(pattern: &str) -> Result<Vec<PathBuf>, OrchestratorError> {
    let entries = glob::glob(pattern).map_err(|source| OrchestratorError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(err) => tracing::warn!(error = %err, "skipping unreadable path"),
        }
    }
    paths.sort();

    if paths.is_empty() {
        tracing::warn!(pattern, "no input files match");
    }
    Ok(paths)
}

/// The NPL and patent output files written next to an in-text input file.
///
/// The stem is the file name up to its first `.`, with `processed_`
/// replaced by `serialized_`: `processed_US_2001.csv.gz` gives
/// `npl_serialized_US_2001.jsonl` and `pat_serialized_US_2001.jsonl`.
pub fn output_paths(input: &Path) -> (PathBuf, PathBuf) {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    let stem = stem.replace("processed_", "serialized_");
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    (
        dir.join(format!("npl_{}.jsonl", stem)),
        dir.join(format!("pat_{}.jsonl", stem)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageFailure;
    use crate::record::{downgrade, CitationRecord, Flavor};

    #[test]
    fn test_output_paths() {
        let (npl, pat) = output_paths(Path::new("/data/processed_US_2001.csv.gz"));
        assert_eq!(npl, PathBuf::from("/data/npl_serialized_US_2001.jsonl"));
        assert_eq!(pat, PathBuf::from("/data/pat_serialized_US_2001.jsonl"));

        let (npl, _) = output_paths(Path::new("batch.csv"));
        assert_eq!(npl, PathBuf::from("npl_batch.jsonl"));
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = RunSummary::default();
        summary.count(&Emitted::Record(CitationRecord::new(Flavor::Npl, "npl_publn_id", "1")));
        summary.count(&Emitted::Failure(downgrade(
            "npl_publn_id",
            "2",
            &StageFailure::missing_markup(),
        )));
        summary += RunSummary {
            files: 2,
            emitted: 1,
            downgraded: 0,
            failed_files: 1,
        };
        assert_eq!(
            summary,
            RunSummary {
                files: 2,
                emitted: 3,
                downgraded: 1,
                failed_files: 1,
            }
        );
    }

    #[test]
    fn test_expand_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.jsonl"), "").unwrap();
        std::fs::write(dir.path().join("a.jsonl"), "").unwrap();
        std::fs::write(dir.path().join("c.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("d.jsonl")).unwrap();

        let pattern = format!("{}/*.jsonl", dir.path().display());
        let paths = expand_paths(&pattern).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jsonl", "b.jsonl"]);

        assert!(matches!(
            expand_paths("[unclosed"),
            Err(OrchestratorError::Pattern { .. })
        ));
    }
}
