//! Editing session: the page store, the toolkit and a notice queue.
//!
//! [`EditorSession`] is the front door for interactive callers. It routes
//! every action to the store and the engines, and turns each outcome
//! (success or failure, bulk or per item) into a [`Notice`].
//!
//! ```ignore
//! use pdf_collate::{EditorSession, SessionConfig, SourceFile};
//!
//! let mut session = EditorSession::new(SessionConfig::new().with_export_name("bundle"));
//! session.initialize()?;
//! session.upload(vec![SourceFile::from_path("a.pdf")?, SourceFile::from_path("b.pdf")?])?;
//! session.move_selected_down();
//! let artifact = session.export()?;
//! for notice in session.drain_notices() {
//!     println!("{}", notice);
//! }
//! ```

use crate::backend::{Composer, Decoder, DefaultRenderer, LopdfComposer, LopdfDecoder, Renderer};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::export::{self, ExportArtifact};
use crate::ingest::{self, IngestFailure, IngestOptions, IngestReport};
use crate::model::{PageId, PageRecord, SourceFile};
use crate::notice::{Notice, NoticeQueue};
use crate::ordering::Direction;
use crate::selection::AreaMode;
use crate::store::PageStore;
use crate::toolkit::{PdfToolkit, Toolkit};
use std::path::{Path, PathBuf};

const NOT_READY_MESSAGE: &str = "PDF processor is not initialized yet. Please wait a moment and try again.";

/// One editing session over an ordered page sequence.
#[derive(Debug)]
pub struct EditorSession<D = LopdfDecoder, R = DefaultRenderer, C = LopdfComposer> {
    store: PageStore,
    toolkit: Toolkit<D, R, C>,
    config: SessionConfig,
    notices: NoticeQueue,
}

impl EditorSession {
    /// Session backed by the bundled `lopdf` toolkit.
    pub fn new(config: SessionConfig) -> Self {
        let toolkit = PdfToolkit::pdf(config.preview.clone(), config.compress_output);
        Self::with_toolkit(config, toolkit)
    }
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl<D, R, C> EditorSession<D, R, C>
where
    D: Decoder,
    R: Renderer<D>,
    C: Composer<D>,
{
    /// Session over caller-supplied collaborators.
    pub fn with_toolkit(config: SessionConfig, toolkit: Toolkit<D, R, C>) -> Self {
        Self {
            store: PageStore::new(),
            toolkit,
            config,
            notices: NoticeQueue::new(),
        }
    }

    /// Initialize the toolkit. Must succeed before upload or export.
    pub fn initialize(&mut self) -> Result<()> {
        if let Err(e) = self.toolkit.initialize() {
            log::error!("Failed to initialize PDF processing: {}", e);
            self.notices
                .error("Failed to initialize PDF processing. Please refresh the page and try again.");
            return Err(e);
        }
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    pub fn is_ready(&self) -> bool {
        self.toolkit.is_ready()
    }

    /// Current configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The page sequence.
    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Records in display order.
    pub fn pages(&self) -> &[PageRecord] {
        self.store.pages()
    }

    // ---- upload ----

    /// Ingest `files` and append their pages.
    pub fn upload(&mut self, files: Vec<SourceFile>) -> Result<IngestReport> {
        self.upload_with_failures(files, Vec::new())
    }

    /// Read `paths` from disk and ingest them.
    ///
    /// Unreadable paths are reported and skipped like undecodable files.
    pub fn upload_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<IngestReport> {
        let mut files = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();
        for path in paths {
            let path = path.as_ref();
            match SourceFile::from_path(path) {
                Ok(file) => files.push(file),
                Err(error) => {
                    log::warn!("Cannot read {}: {}", path.display(), error);
                    unreadable.push(IngestFailure::Read {
                        source_name: path.display().to_string(),
                        error,
                    });
                },
            }
        }
        self.upload_with_failures(files, unreadable)
    }

    /// Ingest `files`; `earlier` failures lead the report.
    fn upload_with_failures(&mut self, files: Vec<SourceFile>, mut earlier: Vec<IngestFailure>) -> Result<IngestReport> {
        let options = IngestOptions {
            select_new_pages: self.config.select_uploaded,
        };
        match ingest::ingest(&mut self.store, &self.toolkit, files, options) {
            Ok(mut report) => {
                earlier.append(&mut report.failures);
                report.failures = earlier;
                for failure in &report.failures {
                    self.notices.error(failure.message());
                }
                self.notices
                    .success(format!("{} pages added successfully.", report.pages_added));
                Ok(report)
            },
            Err(Error::NothingIngested { mut failures }) => {
                earlier.append(&mut failures);
                for failure in &earlier {
                    self.notices.error(failure.message());
                }
                self.notices.error("No pages could be processed from the selected files.");
                Err(Error::NothingIngested { failures: earlier })
            },
            Err(Error::NotReady) => {
                self.notices.error(NOT_READY_MESSAGE);
                Err(Error::NotReady)
            },
            Err(e) => {
                self.notices.error("Failed to process PDFs. Please try again.");
                Err(e)
            },
        }
    }

    // ---- selection ----

    /// Flip one record's selection flag.
    pub fn toggle_page_selection(&mut self, id: PageId) -> Option<bool> {
        self.store.toggle(id)
    }

    /// Select every record.
    pub fn select_all_pages(&mut self) {
        self.store.select_all();
        self.notices.success("All pages selected");
    }

    /// Deselect every record.
    pub fn deselect_all_pages(&mut self) {
        self.store.deselect_all();
        self.notices.success("All pages deselected");
    }

    /// Apply an area selection computed by the caller.
    pub fn select_pages_by_area(&mut self, ids: &[PageId], mode: AreaMode) -> usize {
        let matched = self.store.select_by_area(ids, mode);
        self.notices.success(format!("{} page(s) {}", matched, mode.verb()));
        matched
    }

    /// Selected records in display order.
    pub fn selected_pages(&self) -> Vec<&PageRecord> {
        self.store.selected_pages()
    }

    /// `(selected, total)`.
    pub fn summary(&self) -> (usize, usize) {
        self.store.summary()
    }

    /// `"N of M pages selected"`.
    pub fn summary_text(&self) -> String {
        let (selected, total) = self.summary();
        format!("{} of {} pages selected", selected, total)
    }

    // ---- ordering ----

    /// Move the given records one step up.
    pub fn move_pages_up(&mut self, ids: &[PageId]) -> bool {
        self.store.move_pages_up(ids)
    }

    /// Move the given records one step down.
    pub fn move_pages_down(&mut self, ids: &[PageId]) -> bool {
        self.store.move_pages_down(ids)
    }

    /// Move the selected records one step up.
    pub fn move_selected_up(&mut self) -> bool {
        self.move_selected(Direction::Up)
    }

    /// Move the selected records one step down.
    pub fn move_selected_down(&mut self) -> bool {
        self.move_selected(Direction::Down)
    }

    fn move_selected(&mut self, direction: Direction) -> bool {
        let ids = self.store.selected_ids();
        if ids.is_empty() {
            self.notices.error("No pages selected to move");
            return false;
        }
        self.store.move_pages(&ids, direction)
    }

    /// Relocate the record at `from` to `to` (drag and drop).
    pub fn reorder_pages(&mut self, from: usize, to: usize) -> bool {
        self.store.reorder(from, to)
    }

    // ---- removal ----

    /// Remove one record.
    pub fn remove_page(&mut self, id: PageId) -> Option<PageRecord> {
        self.store.remove_page(id)
    }

    /// Remove every selected record.
    pub fn remove_selected_pages(&mut self) -> usize {
        let removed = self.store.remove_selected_pages();
        self.notices.success(format!("{} page(s) removed", removed));
        removed
    }

    // ---- export ----

    /// Output name without extension.
    pub fn export_file_name(&self) -> &str {
        &self.config.export_name
    }

    /// Set the output name.
    pub fn set_export_file_name(&mut self, name: impl Into<String>) {
        self.config.export_name = name.into();
    }

    /// Compose the selected records into one document.
    pub fn export(&mut self) -> Result<ExportArtifact> {
        let result = export::export(
            &self.store,
            &self.toolkit,
            &self.config.export_name,
            &self.config.extension,
        );
        match result {
            Ok(artifact) => {
                for failure in &artifact.failures {
                    self.notices.error(failure.message());
                }
                self.notices
                    .success(format!("PDF exported successfully! ({} page(s))", artifact.page_count));
                Ok(artifact)
            },
            Err(Error::NothingExported { failures }) => {
                for failure in &failures {
                    self.notices.error(failure.message());
                }
                log::error!("Export produced no pages ({} failure(s))", failures.len());
                self.notices.error("No pages could be exported.");
                Err(Error::NothingExported { failures })
            },
            Err(e) => {
                let message = match &e {
                    Error::EmptySelection => "No pages selected for export",
                    Error::NotReady => NOT_READY_MESSAGE,
                    Error::InvalidExportName => "Please enter a file name for the export",
                    _ => "Failed to export PDF. Please try again.",
                };
                log::error!("Export error: {}", e);
                self.notices.error(message);
                Err(e)
            },
        }
    }

    /// Export and write the artifact into `dir`.
    pub fn export_to_dir(&mut self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let artifact = self.export()?;
        match artifact.write_to_dir(dir) {
            Ok(path) => Ok(path),
            Err(e) => {
                self.notices.error("Failed to export PDF. Please try again.");
                Err(e)
            },
        }
    }

    // ---- notices ----

    /// Pending notices.
    pub fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    /// Take every pending notice.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }
}
