/*
 * orchestrator/npl.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Front-page NPL citations from parser output tables.
 */

use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::{Id, JoinError, JoinSet};

use super::{abandon, deliver, unreadable, JsonlSink, RunSummary};
use crate::enrich::{CitationResolver, TeiResolver};
use crate::error::{OrchestratorError, StageFailure};
use crate::fragments::extract_fragments;
use crate::record::{fallback_pk, CitationRecord, Emitted, Flavor};
use crate::registry::{PkType, SchemaCatalog};
use crate::validate::{finalize, normalize_record};

const NPL_PK: &str = "npl_publn_id";
const MARKUP_COLUMN: &str = "npl_grobid";

/// One row of a parser output table.
struct NplRow {
    raw: String,
    pk: Option<String>,
    markup: Option<String>,
}

/// Extract one NPL record per row of each CSV file and stream it to `sink`.
///
/// The files need a header with `npl_publn_id` and `npl_grobid` columns;
/// other columns are ignored. Rows run concurrently, at most `workers` at a
/// time, so output lines follow completion order rather than row order.
pub fn extract_npl<W: Write + Send>(
    paths: &[PathBuf],
    workers: usize,
    sink: &JsonlSink<W>,
) -> Result<RunSummary, OrchestratorError> {
    let workers = workers.max(1);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(workers)
        .thread_name("patcit-npl")
        .enable_all()
        .build()
        .map_err(|err| OrchestratorError::Pool(err.to_string()))?;
    let resolver: Arc<dyn CitationResolver> = Arc::new(TeiResolver);

    let mut summary = RunSummary::default();
    for path in paths {
        summary.files += 1;
        let before = summary;
        tracing::info!(path = %path.display(), "extracting NPL citations");
        match runtime.block_on(npl_file(path, workers, &resolver, sink, &mut summary)) {
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

async fn npl_file<W: Write + Send>(
    path: &Path,
    workers: usize,
    resolver: &Arc<dyn CitationResolver>,
    sink: &JsonlSink<W>,
    summary: &mut RunSummary,
) -> Result<(), OrchestratorError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|err| unreadable(path, err))?;
    let headers = reader
        .byte_headers()
        .map_err(|err| unreadable(path, err))?
        .clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|header| header.trim_ascii() == name.as_bytes())
    };
    let (Some(pk_column), Some(markup_column)) = (column(NPL_PK), column(MARKUP_COLUMN)) else {
        return Err(unreadable(
            path,
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected '{}' and '{}' columns", NPL_PK, MARKUP_COLUMN),
            ),
        ));
    };

    let mut tasks = JoinSet::new();
    let mut pending: HashMap<Id, String> = HashMap::new();
    for row in reader.byte_records() {
        let row = row.map_err(|err| unreadable(path, err))?;
        let field = |i: usize| {
            row.get(i)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        };
        let row = NplRow {
            raw: row
                .iter()
                .map(String::from_utf8_lossy)
                .collect::<Vec<_>>()
                .join(","),
            pk: field(pk_column)
                .map(|pk| pk.trim().to_string())
                .filter(|pk| !pk.is_empty()),
            markup: field(markup_column),
        };

        while tasks.len() >= workers {
            if let Some(joined) = tasks.join_next_with_id().await {
                deliver(sink, summary, &settle(joined, &mut pending))?;
            }
        }
        let fallback = row.pk.clone().unwrap_or_else(|| fallback_pk(&row.raw));
        let resolver = Arc::clone(resolver);
        let handle = tasks.spawn(async move { npl_row(resolver, row).await });
        pending.insert(handle.id(), fallback);
    }

    while let Some(joined) = tasks.join_next_with_id().await {
        deliver(sink, summary, &settle(joined, &mut pending))?;
    }
    Ok(())
}

async fn npl_row(resolver: Arc<dyn CitationResolver>, row: NplRow) -> Emitted {
    let Some(pk) = row.pk else {
        let failure = StageFailure::parse(format!("missing {}", NPL_PK), row.raw.as_str());
        return finalize(NPL_PK, &fallback_pk(&row.raw), Err(failure));
    };
    let result = npl_record(resolver.as_ref(), &pk, row.markup.as_deref()).await;
    finalize(NPL_PK, &pk, result)
}

async fn npl_record(
    resolver: &dyn CitationResolver,
    pk: &str,
    markup: Option<&str>,
) -> Result<CitationRecord, StageFailure> {
    let fragment = extract_fragments(markup)?
        .primary_npl()
        .ok_or_else(StageFailure::missing_markup)?;
    let record = resolver.resolve(NPL_PK, pk, &fragment).await?;
    let schema = SchemaCatalog::global().resolve(Flavor::Npl, NPL_PK, PkType::String)?;
    normalize_record(record, Flavor::Npl, &schema)
}

/// A finished row task as an output unit. A task that panicked still
/// yields a failure record under its row's key.
fn settle(
    joined: Result<(Id, Emitted), JoinError>,
    pending: &mut HashMap<Id, String>,
) -> Emitted {
    match joined {
        Ok((id, emitted)) => {
            pending.remove(&id);
            emitted
        }
        Err(err) => {
            let pk = pending.remove(&err.id()).unwrap_or_default();
            let failure = StageFailure::Extraction(format!("row task failed: {}", err));
            finalize(NPL_PK, &pk, Err(failure))
        }
    }
}
