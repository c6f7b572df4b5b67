/*
 * orchestrator/sink.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Line-oriented JSON output shared between workers.
 */

use std::io::{self, BufWriter, Write};
use std::sync::{Mutex, PoisonError};

use crate::error::OrchestratorError;
use crate::record::Emitted;

/// Writes one JSON object per line. Each unit is written with a single
/// `write_all` under the lock, so lines from concurrent workers never
/// interleave.
pub struct JsonlSink<W> {
    out: Mutex<W>,
}

impl JsonlSink<BufWriter<io::Stdout>> {
    /// Buffered standard output; flushed by every command when it finishes.
    pub fn stdout() -> Self {
        Self::new(BufWriter::new(io::stdout()))
    }
}

impl<W: Write + Send> JsonlSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn emit(&self, unit: &Emitted) -> Result<(), OrchestratorError> {
        let mut line = unit
            .to_json_line()
            .map_err(|err| OrchestratorError::Sink(io::Error::other(err)))?;
        line.push('\n');
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(line.as_bytes()).map_err(OrchestratorError::Sink)
    }

    pub fn flush(&self) -> Result<(), OrchestratorError> {
        self.out
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
            .map_err(OrchestratorError::Sink)
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
