//! Ingestion pipeline: source files in, page records appended.
//!
//! Files are processed one at a time and pages one at a time within a file,
//! so at most one page is being rasterized at any moment. A file that fails
//! to open, or a page that fails to render, is recorded and skipped; the rest
//! of the batch carries on.

use crate::backend::{Composer, Decoder, Renderer};
use crate::error::{Error, Result};
use crate::model::{PageRecord, SourceFile};
use crate::store::PageStore;
use crate::toolkit::Toolkit;
use std::sync::Arc;

/// A single file or page that could not be ingested.
#[derive(Debug)]
pub enum IngestFailure {
    /// The file could not be read from disk
    Read {
        /// Path as given by the caller
        source_name: String,
        /// Underlying IO error
        error: Error,
    },
    /// The whole file could not be opened
    File {
        /// Display name of the source
        source_name: String,
        /// Underlying decode error
        error: Error,
    },
    /// One page of an opened file could not be rendered
    Page {
        /// Display name of the source
        source_name: String,
        /// 1-based page number
        page_number: usize,
        /// Underlying render error
        error: Error,
    },
}

impl IngestFailure {
    /// Display name of the affected source.
    pub fn source_name(&self) -> &str {
        match self {
            IngestFailure::Read { source_name, .. }
            | IngestFailure::File { source_name, .. }
            | IngestFailure::Page { source_name, .. } => source_name,
        }
    }

    /// Human-readable description for notices.
    pub fn message(&self) -> String {
        match self {
            IngestFailure::Read { source_name, .. } => format!("Failed to read {}", source_name),
            IngestFailure::File { source_name, .. } => format!(
                "Failed to process {}. The file might be corrupted or password-protected.",
                source_name
            ),
            IngestFailure::Page {
                source_name,
                page_number,
                ..
            } => format!("Failed to process page {} of {}", page_number, source_name),
        }
    }
}

/// Outcome of a batch that produced at least one page.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Number of records appended to the store
    pub pages_added: usize,
    /// Files and pages that were skipped
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    /// True when nothing was skipped.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Options controlling how new records are created.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Initial selection flag of new records
    pub select_new_pages: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self { select_new_pages: true }
    }
}

/// Decode, render and append every page of `files`, in order.
///
/// Fails with [`Error::NotReady`] before touching the store if the toolkit is
/// not initialized, and with [`Error::NothingIngested`] if the whole batch
/// produced zero pages.
pub fn ingest<D, R, C>(
    store: &mut PageStore,
    toolkit: &Toolkit<D, R, C>,
    files: Vec<SourceFile>,
    options: IngestOptions,
) -> Result<IngestReport>
where
    D: Decoder,
    R: Renderer<D>,
    C: Composer<D>,
{
    toolkit.ensure_ready()?;

    let mut report = IngestReport::default();
    for file in files {
        let source = Arc::new(file);
        let document = match toolkit.decoder().open(source.bytes()) {
            Ok(document) => document,
            Err(error) => {
                log::warn!("Error processing PDF file {}: {}", source.name(), error);
                report.failures.push(IngestFailure::File {
                    source_name: source.name().to_string(),
                    error,
                });
                continue;
            },
        };

        let page_count = toolkit.decoder().page_count(&document);
        log::debug!("Ingesting {} ({} pages)", source.name(), page_count);

        for page_number in 1..=page_count {
            match toolkit.renderer().render_page(&document, page_number) {
                Ok(preview) => {
                    let record = PageRecord::new(source.clone(), page_number, preview, options.select_new_pages);
                    if store.append(record) {
                        report.pages_added += 1;
                    }
                },
                Err(error) => {
                    log::warn!("Error processing page {} of {}: {}", page_number, source.name(), error);
                    report.failures.push(IngestFailure::Page {
                        source_name: source.name().to_string(),
                        page_number,
                        error,
                    });
                },
            }
        }
    }

    if report.pages_added == 0 {
        return Err(Error::NothingIngested {
            failures: report.failures,
        });
    }

    log::info!(
        "Ingested {} page(s) with {} failure(s)",
        report.pages_added,
        report.failures.len()
    );
    Ok(report)
}
