//! Output module for crawl records and run summaries
//!
//! This module handles:
//! - Appending records to CSV files, one schema per pipeline
//! - Building file names for run outputs
//! - Summarising a finished run

mod csv_sink;
mod summary;
mod traits;

pub use csv_sink::{read_records, CsvSink};
pub use summary::{print_crawl_summary, CrawlSummary, StateTally};
pub use traits::{OutputError, OutputResult, RecordSchema, RecordSink};

use chrono::{DateTime, Utc};

/// Timestamp format embedded in output file names
pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Timestamp format of the "Captured At" column
pub const CAPTURED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Formats `at` for use in a file name
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format(FILE_STAMP_FORMAT).to_string()
}

/// Current time formatted for the "Captured At" column
pub fn captured_now() -> String {
    Utc::now().format(CAPTURED_AT_FORMAT).to_string()
}
