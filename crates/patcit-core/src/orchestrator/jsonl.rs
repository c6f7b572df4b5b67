/*
 * orchestrator/jsonl.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Line-by-line commands over JSONL inputs.
 */

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::{abandon, deliver, unreadable, JsonlSink, RunSummary};
use crate::bibref::{self, BibrefSource};
use crate::brew::{self, BrewConfig};
use crate::error::{OrchestratorError, StageFailure};
use crate::models::SpanExtractor;
use crate::properties::{self, PropertyModels};
use crate::record::{fallback_pk, CitationRecord, Emitted, Flavor};
use crate::registry::SchemaCatalog;
use crate::validate::finalize;

/// Keys a JSONL record may be identified by, in order of preference.
const PK_CANDIDATES: &[&str] = &["npl_publn_id", "patcit_id", "publication_number"];

/// Map GROBID or Crossref records onto the bibref vocabulary and validate
/// them.
pub fn normalize_bibref<W: Write + Send>(
    paths: &[PathBuf],
    source: BibrefSource,
    sink: &JsonlSink<W>,
) -> Result<RunSummary, OrchestratorError> {
    let catalog = SchemaCatalog::global();
    each_line(paths, sink, |line| bibref::normalize_line(line, source, catalog))
}

/// Add the content hash, language, category and identity key to each
/// record. Only records whose language code is in `language_codes` get a
/// category.
pub fn compute_properties<W: Write + Send>(
    paths: &[PathBuf],
    models: &PropertyModels,
    language_codes: &[String],
    sink: &JsonlSink<W>,
) -> Result<RunSummary, OrchestratorError> {
    each_line(paths, sink, |line| {
        with_record(line, |record| {
            properties::compute_properties(record, models, language_codes)
        })
    })
}

/// Harvest the entities of `category` from each record of one file.
///
/// An unknown category is rejected before any line is read.
pub fn brew_entities<W: Write + Send>(
    path: &Path,
    extractor: &dyn SpanExtractor,
    category: &str,
    config: &BrewConfig,
    sink: &JsonlSink<W>,
) -> Result<RunSummary, OrchestratorError> {
    let policy = config.policy(category)?;
    each_line(&[path.to_path_buf()], sink, |line| {
        with_record(line, |record| brew::brew(record, extractor, policy))
    })
}

/// Parse `line` and run `stage` on it. A line without a usable key is a
/// parse failure keyed by the digest of the line.
fn with_record(
    line: &str,
    stage: impl FnOnce(CitationRecord) -> Result<CitationRecord, StageFailure>,
) -> Emitted {
    match CitationRecord::parse_line(line, Flavor::Npl, PK_CANDIDATES) {
        Ok(record) => {
            let pk_name = record.pk_name().to_string();
            let pk = record.pk().to_string();
            finalize(&pk_name, &pk, stage(record))
        }
        Err(failure) => finalize(PK_CANDIDATES[0], &fallback_pk(line), Err(failure)),
    }
}

fn each_line<W: Write + Send>(
    paths: &[PathBuf],
    sink: &JsonlSink<W>,
    mut process: impl FnMut(&str) -> Emitted,
) -> Result<RunSummary, OrchestratorError> {
    let mut summary = RunSummary::default();
    for path in paths {
        summary.files += 1;
        let before = summary;
        tracing::info!(path = %path.display(), "processing file");
        match lines_of(path, sink, &mut process, &mut summary) {
            Ok(()) => tracing::info!(
                path = %path.display(),
                emitted = summary.emitted - before.emitted,
                downgraded = summary.downgraded - before.downgraded,
                "finished file"
            ),
            Err(err) => abandon(path, &err, &mut summary),
        }
    }
    sink.flush()?;
    Ok(summary)
}

fn lines_of<W: Write + Send>(
    path: &Path,
    sink: &JsonlSink<W>,
    process: &mut impl FnMut(&str) -> Emitted,
    summary: &mut RunSummary,
) -> Result<(), OrchestratorError> {
    let file = File::open(path).map_err(|err| unreadable(path, err))?;
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|err| unreadable(path, err))?;
        if line.trim().is_empty() {
            continue;
        }
        deliver(sink, summary, &process(&line))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{KeywordClassifier, PatternExtractor, StopwordIdentifier};
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn write_input(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    fn output(sink: JsonlSink<Vec<u8>>) -> Vec<Value> {
        String::from_utf8(sink.into_inner())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_brew_entities_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(
            dir.path(),
            "npl.jsonl",
            &[r#"{"npl_publn_id": "1", "npl_biblio": "Filed 2020-01-05, see http://example.org/doc."}"#],
        );
        let sink = JsonlSink::new(Vec::new());
        let summary = brew_entities(
            &path,
            &PatternExtractor::builtin(),
            "DATABASE",
            &BrewConfig::default(),
            &sink,
        )
        .unwrap();
        assert_eq!(summary.emitted, 1);

        let lines = output(sink);
        assert_eq!(lines[0]["date"], json!(["20200105"]));
        assert_eq!(lines[0]["url"], json!(["http://example.org/doc"]));
        assert_eq!(lines[0]["hostnames"], json!(["example.org"]));
    }

    #[test]
    fn test_brew_rejects_unknown_category_up_front() {
        let sink = JsonlSink::new(Vec::new());
        let err = brew_entities(
            Path::new("does-not-matter.jsonl"),
            &PatternExtractor::builtin(),
            "PATENT",
            &BrewConfig::default(),
            &sink,
        )
        .unwrap_err();
        assert!(matches!(err, OrchestratorError::Config(_)));
    }

    #[test]
    fn test_compute_properties_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_input(
            dir.path(),
            "npl.jsonl",
            &[
                r#"{"npl_publn_id": 5, "npl_biblio": "The structure of the protein and the database of the genome"}"#,
                "",
                r#"{"npl_publn_id": "6"}"#,
                "not json",
            ],
        );
        let models = PropertyModels {
            language: Arc::new(StopwordIdentifier::builtin()),
            category: Arc::new(KeywordClassifier::builtin()),
        };
        let sink = JsonlSink::new(Vec::new());
        let summary = compute_properties(
            &[path],
            &models,
            &["en".to_string(), "un".to_string()],
            &sink,
        )
        .unwrap();
        assert_eq!(summary.emitted, 3);
        assert_eq!(summary.downgraded, 2);

        let lines = output(sink);
        assert_eq!(lines[0]["npl_publn_id"], "5");
        assert_eq!(lines[0]["patcit_id"], lines[0]["md5"]);
        assert!(lines[0].get("npl_cat").is_some());
        assert_eq!(
            lines[1],
            json!({
                "npl_publn_id": "6",
                "exception": r#"missing npl_biblio in line: {"npl_publn_id":"6"}"#,
                "issues": [0]
            })
        );
        assert_eq!(lines[2]["npl_publn_id"], json!(fallback_pk("not json")));
        assert_eq!(lines[2]["issues"], json!([0]));
    }

    #[test]
    fn test_normalize_bibref_over_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_input(
            dir.path(),
            "a.jsonl",
            &[r#"{"DOI": "10.1000/XYZ", "title": ["A title"], "issued": {"date-parts": [[2001, 2, 3]]}}"#],
        );
        let second = write_input(dir.path(), "b.jsonl", &[r#"{"title": ["no key"]}"#]);
        let sink = JsonlSink::new(Vec::new());
        let summary =
            normalize_bibref(&[first, second], BibrefSource::Crossref, &sink).unwrap();
        assert_eq!(summary.files, 2);
        assert_eq!(summary.emitted, 2);
        assert_eq!(summary.downgraded, 1);

        let lines = output(sink);
        assert_eq!(lines[0]["patcit_id"], "10.1000/xyz");
        assert_eq!(lines[0]["doi"], "10.1000/xyz");
        assert_eq!(lines[0]["date"], json!(["20010203"]));
        assert_eq!(lines[1]["issues"], json!([0]));
    }
}
