//! CSV output sink
//!
//! Rows are written in the order they are handed over; callers pass the run's
//! records oldest first. A run with no records still produces the header line.

use crate::model::Tweet;
use crate::output::traits::{CsvRow, OutputResult, Sink, CSV_HEADER};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Writes records as CSV to any writer
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(inner);
        Self { writer }
    }

    /// Flushes and returns the underlying writer
    pub fn into_inner(self) -> OutputResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| std::io::Error::new(e.error().kind(), e.error().to_string()).into())
    }
}

impl<W: Write> Sink for CsvSink<W> {
    fn write(&mut self, records: &[Tweet]) -> OutputResult<()> {
        self.writer.write_record(CSV_HEADER)?;
        for tweet in records {
            self.writer.serialize(CsvRow::from(tweet))?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

/// File name used when a query's stem has nothing usable left
const FALLBACK_STEM: &str = "tweets";

/// Path of the CSV file for a query's output stem
///
/// The stem is free search text, so it is reduced to a single file name
/// component that always lands directly inside `directory`.
pub fn csv_path(directory: &Path, stem: &str) -> PathBuf {
    directory.join(format!("{}.csv", sanitize_stem(stem)))
}

fn sanitize_stem(stem: &str) -> String {
    let mut sanitized: String = stem
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '_' | '-' | '@' | '#') {
                c
            } else {
                '_'
            }
        })
        .collect();

    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "_");
    }

    let sanitized = sanitized.trim_matches(|c: char| c == '.' || c == '_');
    if sanitized.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        sanitized.to_string()
    }
}

/// Writes records to `path` in the order given
///
/// Rows go to a sibling temporary file that is renamed over `path` once
/// complete, so a failed write never leaves a truncated CSV behind.
///
/// # Arguments
///
/// * `records` - All records, oldest first
/// * `path` - Destination file; parent directories are created
pub fn write_csv(records: &[Tweet], path: &Path) -> OutputResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    if let Err(e) = write_rows(records, &tmp_path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    #[cfg(target_os = "windows")]
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    std::fs::rename(&tmp_path, path)?;

    tracing::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

fn write_rows(records: &[Tweet], path: &Path) -> OutputResult<()> {
    let mut sink = CsvSink::new(File::create(path)?);
    sink.write(records)?;
    sink.into_inner()?.sync_all()?;
    Ok(())
}
