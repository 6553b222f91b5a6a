//! Result handlers: where finished domain results go.
//!
//! A batch run hands every [`DomainResult`] to exactly one handler, one at a
//! time and in completion order. Handlers can print results, aggregate them,
//! collect them, or anything else; the caller picks one when starting the
//! batch. To feed several handlers at once, pass a tuple `(a, b)`.

use crate::types::DomainResult;
use std::io::Write;

/// Processes domain results as a batch produces them.
pub trait ResultHandler {
    /// Called once per checked domain.
    fn handle_domain(&mut self, result: &DomainResult);
}

impl<H: ResultHandler + ?Sized> ResultHandler for &mut H {
    fn handle_domain(&mut self, result: &DomainResult) {
        (**self).handle_domain(result)
    }
}

impl<H: ResultHandler + ?Sized> ResultHandler for Box<H> {
    fn handle_domain(&mut self, result: &DomainResult) {
        (**self).handle_domain(result)
    }
}

/// Collects every result.
impl ResultHandler for Vec<DomainResult> {
    fn handle_domain(&mut self, result: &DomainResult) {
        self.push(result.clone());
    }
}

impl<A: ResultHandler, B: ResultHandler> ResultHandler for (A, B) {
    fn handle_domain(&mut self, result: &DomainResult) {
        self.0.handle_domain(result);
        self.1.handle_domain(result);
    }
}

/// Writes each result as one JSON document per line.
pub struct JsonLinesPrinter<W: Write> {
    writer: W,
    written: usize,
    failed: usize,
}

impl<W: Write> JsonLinesPrinter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            failed: 0,
        }
    }

    /// Number of results written successfully.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Number of results that could not be written.
    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ResultHandler for JsonLinesPrinter<W> {
    fn handle_domain(&mut self, result: &DomainResult) {
        let line = match serde_json::to_string(result) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("failed to serialize result for {}: {}", result.domain, e);
                self.failed += 1;
                return;
            }
        };
        match writeln!(self.writer, "{}", line) {
            Ok(()) => self.written += 1,
            Err(e) => {
                tracing::warn!("failed to write result for {}: {}", result.domain, e);
                self.failed += 1;
            }
        }
    }
}
