//! Identifier sources for batch runs.
//!
//! The pipeline consumes any iterator of `Result<String>`. This module adapts
//! CSV input into that shape: one configurable column is the domain, rows too
//! short to have that column and blank cells are skipped, and a read error is
//! returned once and ends the iteration.

use crate::error::ScanError;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Domains read from one column of a CSV document.
pub struct CsvIdentifiers<R: Read> {
    records: csv::StringRecordsIntoIter<R>,
    column: usize,
    failed: bool,
}

impl<R: Read> std::fmt::Debug for CsvIdentifiers<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvIdentifiers")
            .field("column", &self.column)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl<R: Read> CsvIdentifiers<R> {
    /// Read identifiers from `reader`, taking the zero-based `column`.
    pub fn from_reader(reader: R, column: usize, has_headers: bool) -> Self {
        let reader = csv::ReaderBuilder::new()
            .has_headers(has_headers)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        Self {
            records: reader.into_records(),
            column,
            failed: false,
        }
    }
}

impl CsvIdentifiers<File> {
    /// Open a CSV file of domains.
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        column: usize,
        has_headers: bool,
    ) -> Result<Self, ScanError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ScanError::file_error(
                path.to_string_lossy(),
                format!("Failed to open domain list: {}", e),
            )
        })?;
        Ok(Self::from_reader(file, column, has_headers))
    }
}

impl<R: Read> Iterator for CsvIdentifiers<R> {
    type Item = Result<String, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            match self.records.next()? {
                Ok(record) => match record.get(self.column) {
                    Some(value) if !value.is_empty() => return Some(Ok(value.to_string())),
                    _ => continue,
                },
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e.into()));
                }
            }
        }
    }
}
