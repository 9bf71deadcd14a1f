//! Output sink traits and types

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Record has {actual} fields, schema expects {expected}")]
    FieldCount { expected: usize, actual: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Column layout of an output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordSchema {
    /// Crawled pages and saved documents
    Page,
    /// Timeline posts without downloads
    Text,
    /// Timeline posts with one row per downloaded media file
    Media,
}

impl RecordSchema {
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            Self::Page => &["Title", "URL", "Content", "Captured At"],
            Self::Text => &[
                "Tweet Date",
                "Display Name",
                "User Name",
                "Tweet URL",
                "Tweet Content",
                "Favorite Count",
                "Retweet Count",
                "Reply Count",
            ],
            Self::Media => &[
                "Tweet Date",
                "Display Name",
                "User Name",
                "Tweet URL",
                "Media Type",
                "Media URL",
                "Saved Path",
                "Tweet Content",
                "Favorite Count",
                "Retweet Count",
                "Reply Count",
            ],
        }
    }

    pub fn width(&self) -> usize {
        self.header().len()
    }
}

/// Append-only destination for output rows
///
/// Implementations must be thread-safe; each call appends one whole row.
pub trait RecordSink: Send + Sync {
    fn append(&self, record: &[String]) -> OutputResult<()>;
}
