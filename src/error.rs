//! Error types for the page collation library.
//!
//! Per-item failures (one file, one page, one export group) are recorded as
//! values inside reports and never abort sibling items. Only a handful of
//! variants are fatal for a whole operation: [`Error::EmptySelection`],
//! [`Error::NothingIngested`], [`Error::NothingExported`], [`Error::NotReady`]
//! and [`Error::InvalidExportName`].

use crate::export::ExportFailure;
use crate::ingest::IngestFailure;

/// Result type alias for collation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while ingesting, editing or exporting pages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Source could not be opened (unreadable, corrupt or encrypted)
    #[error("Failed to decode source: {0}")]
    Decode(String),

    /// A single page could not be rasterized
    #[error("Failed to render page {page}: {reason}")]
    Render {
        /// 1-based page number within the source
        page: usize,
        /// Reason for the render failure
        reason: String,
    },

    /// A single page could not be transplanted into the output document
    #[error("Failed to copy page {page}: {reason}")]
    Copy {
        /// 1-based page number within the source
        page: usize,
        /// Reason for the copy failure
        reason: String,
    },

    /// Export attempted with nothing selected
    #[error("No pages selected for export")]
    EmptySelection,

    /// Operation invoked before the decoder/renderer finished initializing
    #[error("PDF processor is not initialized yet")]
    NotReady,

    /// A whole ingestion batch produced zero pages
    #[error("No pages could be processed from the selected files ({} failure(s))", failures.len())]
    NothingIngested {
        /// Every per-file and per-page failure seen during the batch
        failures: Vec<IngestFailure>,
    },

    /// Every selected page failed to make it into the export
    #[error("No pages could be exported ({} failure(s))", failures.len())]
    NothingExported {
        /// Every per-group and per-page failure seen during the export
        failures: Vec<ExportFailure>,
    },

    /// Export name is empty or whitespace
    #[error("Export file name must not be empty")]
    InvalidExportName,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// Object graph too deep while copying a page
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),
}

impl Error {
    /// True for errors that only affect a single file, page or group.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            Error::Decode(_) | Error::Render { .. } | Error::Copy { .. } | Error::RecursionLimitExceeded(_)
        )
    }
}
