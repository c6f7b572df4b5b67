/*
 * orchestrator/intext.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * In-text citations of patent full texts, one pair of output files per input.
 */

use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;

use super::{abandon, deliver, output_paths, unreadable, JsonlSink, RunSummary};
use crate::enrich::{fetch_all, CitationResolver, TeiResolver};
use crate::error::{OrchestratorError, StageFailure};
use crate::fragments::{extract_fragments, Fragment};
use crate::record::{fallback_pk, CitationRecord, Emitted, Flavor};
use crate::registry::{PkType, SchemaCatalog};
use crate::validate::{finalize, normalize_record};

const PAT_PK: &str = "publication_number";

/// Both output streams of one input file.
struct Streams {
    npl: JsonlSink<BufWriter<File>>,
    pat: JsonlSink<BufWriter<File>>,
}

impl Streams {
    fn create(input: &Path) -> Result<Self, OrchestratorError> {
        let (npl, pat) = output_paths(input);
        let open = |path: &Path| {
            File::create(path)
                .map(|file| JsonlSink::new(BufWriter::new(file)))
                .map_err(OrchestratorError::Sink)
        };
        Ok(Self {
            npl: open(&npl)?,
            pat: open(&pat)?,
        })
    }

    fn for_flavor(&self, flavor: Flavor) -> &JsonlSink<BufWriter<File>> {
        match flavor {
            Flavor::Pat => &self.pat,
            Flavor::Npl | Flavor::Bibref => &self.npl,
        }
    }
}

/// Extract the in-text citations of each two-column CSV file
/// (`publication_number`, markup; the first line is a header).
///
/// Files are processed in parallel on a pool of `workers` threads. Each
/// input row yields, in each of the `npl_` and `pat_` output files, either
/// one line per citation of that flavor or a single placeholder holding only
/// the publication number.
pub fn extract_intext(paths: &[PathBuf], workers: usize) -> Result<RunSummary, OrchestratorError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("patcit-intext-{}", i))
        .build()
        .map_err(|err| OrchestratorError::Pool(err.to_string()))?;
    let resolver: Arc<dyn CitationResolver> = Arc::new(TeiResolver);

    let summaries: Vec<RunSummary> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let mut summary = RunSummary {
                    files: 1,
                    ..RunSummary::default()
                };
                tracing::info!(path = %path.display(), "extracting in-text citations");
                match intext_file(path, &resolver, &mut summary) {
                    Ok(()) => tracing::info!(
                        path = %path.display(),
                        emitted = summary.emitted,
                        downgraded = summary.downgraded,
                        "finished file"
                    ),
                    Err(err) => abandon(path, &err, &mut summary),
                }
                summary
            })
            .collect()
    });

    let mut total = RunSummary::default();
    for summary in summaries {
        total += summary;
    }
    Ok(total)
}

fn intext_file(
    path: &Path,
    resolver: &Arc<dyn CitationResolver>,
    summary: &mut RunSummary,
) -> Result<(), OrchestratorError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| OrchestratorError::Pool(err.to_string()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|err| unreadable(path, err))?;
    let streams = Streams::create(path)?;

    for row in reader.byte_records() {
        let row = row.map_err(|err| unreadable(path, err))?;
        let field = |i: usize| {
            row.get(i)
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        };
        let pk = field(0)
            .map(|pk| pk.trim().to_string())
            .filter(|pk| !pk.is_empty());
        let markup = field(1);

        let Some(pk) = pk else {
            let raw = row
                .iter()
                .map(String::from_utf8_lossy)
                .collect::<Vec<_>>()
                .join(",");
            let failure = StageFailure::parse(format!("missing {}", PAT_PK), raw.as_str());
            let unit = finalize(PAT_PK, &fallback_pk(&raw), Err(failure));
            deliver(&streams.npl, summary, &unit)?;
            deliver(&streams.pat, summary, &unit)?;
            continue;
        };

        let fragments = match extract_fragments(markup.as_deref()) {
            Ok(fragments) => fragments,
            Err(failure) => {
                let unit = finalize(PAT_PK, &pk, Err(failure));
                deliver(&streams.npl, summary, &unit)?;
                deliver(&streams.pat, summary, &unit)?;
                continue;
            }
        };

        for (flavor, fragments) in [(Flavor::Npl, fragments.npl), (Flavor::Pat, fragments.pat)] {
            let sink = streams.for_flavor(flavor);
            for unit in citations(&runtime, resolver, flavor, &pk, fragments) {
                deliver(sink, summary, &unit)?;
            }
        }
    }

    streams.npl.flush()?;
    streams.pat.flush()?;
    Ok(())
}

/// The output units of one flavor for one patent, in fragment order.
fn citations(
    runtime: &Runtime,
    resolver: &Arc<dyn CitationResolver>,
    flavor: Flavor,
    pk: &str,
    fragments: Vec<Fragment>,
) -> Vec<Emitted> {
    if fragments.is_empty() {
        return vec![Emitted::Record(CitationRecord::new(flavor, PAT_PK, pk))];
    }

    let results = runtime.block_on(fetch_all(Arc::clone(resolver), PAT_PK, pk, fragments));
    results
        .into_iter()
        .map(|result| {
            let result = result.and_then(|record| {
                let schema = SchemaCatalog::global().resolve(flavor, PAT_PK, PkType::String)?;
                normalize_record(record, flavor, &schema)
            });
            finalize(PAT_PK, pk, result)
        })
        .collect()
}
