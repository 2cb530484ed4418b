//! Run report formatting
//!
//! Turns a finished run's `CrawlReport` into the summary printed by the CLI.

use crate::crawler::CrawlReport;
use std::path::Path;

/// Formats the end-of-run summary
///
/// # Arguments
///
/// * `report` - Counters from the finished run
/// * `output_path` - Where the CSV was written
pub fn format_report(report: &CrawlReport, output_path: &Path) -> String {
    let mut out = String::new();

    out.push_str("=== Crawl Report ===\n\n");
    out.push_str(&format!("  Pages fetched: {}\n", report.pages));
    out.push_str(&format!("  Tweets collected: {}\n", report.records));
    out.push_str(&format!("  Items skipped: {}\n", report.skipped_items));
    out.push_str(&format!("  Retried requests: {}\n", report.retries));
    out.push_str(&format!("  Stop reason: {}\n", report.stop_reason));
    out.push_str(&format!(
        "  Duration: {:.1}s\n",
        report.elapsed.as_secs_f64()
    ));

    let rate = if report.elapsed.as_secs_f64() > 0.0 {
        report.pages as f64 / report.elapsed.as_secs_f64()
    } else {
        0.0
    };
    out.push_str(&format!("  Rate: {:.2} pages/sec\n", rate));

    if report.records == 0 {
        out.push_str("\nNo tweets matched; wrote header only\n");
    }
    out.push_str(&format!("\nOutput: {}\n", output_path.display()));

    out
}

/// Prints the end-of-run summary to stdout
pub fn print_report(report: &CrawlReport, output_path: &Path) {
    print!("{}", format_report(report, output_path));
}
