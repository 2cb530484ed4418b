//! Output module for writing crawl results
//!
//! This module handles:
//! - Projecting records into flat CSV rows
//! - Writing rows oldest first
//! - Formatting the end-of-run report

mod csv_output;
pub mod stats;
mod traits;

pub use csv_output::{csv_path, write_csv, CsvSink};
pub use stats::{format_report, print_report};
pub use traits::{CsvRow, OutputError, OutputResult, Sink, CSV_HEADER, TIMESTAMP_FORMAT};
