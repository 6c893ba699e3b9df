//! Export composer: selected pages out, one assembled document.
//!
//! The selected subset is partitioned by source name. Groups follow the
//! display position of their first selected member; inside a group pages are
//! put back into ascending source-page order (ties keep display order). Each
//! group's source is opened once, through the handle of its first member, so
//! same-named uploads share one group and one source.
//!
//! Export never mutates the store. A group that fails to open or a page that
//! fails to copy is recorded and skipped; the artifact is built from whatever
//! succeeded.

use crate::backend::{Composer, Decoder, Renderer};
use crate::error::{Error, Result};
use crate::model::{PageId, SourceHandle};
use crate::store::PageStore;
use crate::toolkit::Toolkit;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// One page scheduled for export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPage {
    /// Record id
    pub id: PageId,
    /// 1-based page number within the source
    pub source_page_index: usize,
    /// Display position at planning time
    pub display_index: usize,
}

/// Selected pages sharing one source name.
#[derive(Debug, Clone)]
pub struct ExportGroup {
    /// Shared source name
    pub source_name: String,
    /// Source opened for the whole group (its first member's)
    pub source: SourceHandle,
    /// Pages in output order
    pub pages: Vec<PlannedPage>,
}

/// The grouping step of an export, computed without touching any backend.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    /// Groups in output order
    pub groups: Vec<ExportGroup>,
}

impl ExportPlan {
    /// Group the selected subset of `store`.
    ///
    /// Fails with [`Error::EmptySelection`] when nothing is selected.
    pub fn from_store(store: &PageStore) -> Result<Self> {
        let mut groups: IndexMap<&str, ExportGroup> = IndexMap::new();
        for (display_index, record) in store.iter().enumerate() {
            if !record.is_selected() {
                continue;
            }
            let group = groups.entry(record.source_name()).or_insert_with(|| ExportGroup {
                source_name: record.source_name().to_string(),
                source: record.source().clone(),
                pages: Vec::new(),
            });
            group.pages.push(PlannedPage {
                id: record.id(),
                source_page_index: record.source_page_index(),
                display_index,
            });
        }

        if groups.is_empty() {
            return Err(Error::EmptySelection);
        }

        let groups = groups
            .into_values()
            .map(|mut group| {
                // Stable: equal source indices keep display order.
                group.pages.sort_by_key(|p| p.source_page_index);
                group
            })
            .collect();
        Ok(Self { groups })
    }

    /// Total pages across all groups.
    pub fn page_count(&self) -> usize {
        self.groups.iter().map(|g| g.pages.len()).sum()
    }

    /// Record ids in output order.
    pub fn page_ids(&self) -> Vec<PageId> {
        self.groups.iter().flat_map(|g| g.pages.iter().map(|p| p.id)).collect()
    }
}

/// A group or page left out of the exported document.
#[derive(Debug)]
pub enum ExportFailure {
    /// The group's source could not be reopened
    Group {
        /// Source name of the group
        source_name: String,
        /// Underlying decode error
        error: Error,
    },
    /// One page could not be copied
    Page {
        /// Source name of the page
        source_name: String,
        /// 1-based page number within the source
        page_number: usize,
        /// Underlying copy error
        error: Error,
    },
}

impl ExportFailure {
    /// Human-readable description for notices.
    pub fn message(&self) -> String {
        match self {
            ExportFailure::Group { source_name, .. } => format!("Failed to process {} for export.", source_name),
            ExportFailure::Page {
                source_name,
                page_number,
                ..
            } => format!("Failed to copy page {} from {}", page_number, source_name),
        }
    }
}

/// Serialized output of an export.
#[derive(Debug)]
pub struct ExportArtifact {
    /// `<name>.<extension>`
    pub file_name: String,
    /// Serialized document
    pub bytes: Vec<u8>,
    /// Pages that made it into the document
    pub page_count: usize,
    /// Groups and pages that were skipped
    pub failures: Vec<ExportFailure>,
}

impl ExportArtifact {
    /// True when every planned page was included.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Write the artifact into `dir` under its file name.
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Build `<name>.<extension>`, rejecting blank names.
pub fn artifact_file_name(name: &str, extension: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidExportName);
    }
    let extension = extension.trim_start_matches('.');
    if extension.is_empty() {
        Ok(name.to_string())
    } else {
        Ok(format!("{}.{}", name, extension))
    }
}

/// Assemble the selected pages of `store` into one document.
///
/// Fails with [`Error::NotReady`], [`Error::InvalidExportName`] or
/// [`Error::EmptySelection`] before doing any work; otherwise returns the
/// best-effort artifact together with every per-group and per-page failure.
/// When not a single page could be copied the failures come back inside
/// [`Error::NothingExported`] instead.
pub fn export<D, R, C>(
    store: &PageStore,
    toolkit: &Toolkit<D, R, C>,
    name: &str,
    extension: &str,
) -> Result<ExportArtifact>
where
    D: Decoder,
    R: Renderer<D>,
    C: Composer<D>,
{
    toolkit.ensure_ready()?;
    let file_name = artifact_file_name(name, extension)?;
    let plan = ExportPlan::from_store(store)?;
    compose(&plan, toolkit, file_name)
}

/// Drive the decoder and composer over an already computed plan.
pub fn compose<D, R, C>(plan: &ExportPlan, toolkit: &Toolkit<D, R, C>, file_name: String) -> Result<ExportArtifact>
where
    D: Decoder,
    R: Renderer<D>,
    C: Composer<D>,
{
    toolkit.ensure_ready()?;
    let composer = toolkit.composer();
    let mut output = composer.create_accumulator();
    let mut failures = Vec::new();
    let mut page_count = 0;

    for group in &plan.groups {
        let source = match toolkit.decoder().open(group.source.bytes()) {
            Ok(source) => source,
            Err(error) => {
                log::warn!("Error processing file {} for export: {}", group.source_name, error);
                failures.push(ExportFailure::Group {
                    source_name: group.source_name.clone(),
                    error,
                });
                continue;
            },
        };

        for page in &group.pages {
            let copied = match page.source_page_index.checked_sub(1) {
                Some(index) => composer.copy_page(&source, index, &mut output),
                None => Err(Error::Copy {
                    page: 0,
                    reason: "page numbers start at 1".to_string(),
                }),
            };
            match copied {
                Ok(copied) => {
                    composer.append_copied_page(&mut output, copied);
                    page_count += 1;
                },
                Err(error) => {
                    log::warn!(
                        "Error copying page {} from {}: {}",
                        page.source_page_index,
                        group.source_name,
                        error
                    );
                    failures.push(ExportFailure::Page {
                        source_name: group.source_name.clone(),
                        page_number: page.source_page_index,
                        error,
                    });
                },
            }
        }
    }

    if page_count == 0 {
        log::warn!("Nothing exported for {}: {} failure(s)", file_name, failures.len());
        if failures.is_empty() {
            return Err(Error::EmptySelection);
        }
        return Err(Error::NothingExported { failures });
    }

    let bytes = composer.serialize(output)?;
    log::info!(
        "Exported {} ({} page(s), {} failure(s))",
        file_name,
        page_count,
        failures.len()
    );
    Ok(ExportArtifact {
        file_name,
        bytes,
        page_count,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::scripted::{ScriptedComposer, ScriptedDecoder, ScriptedRenderer};
    use crate::model::{PageRecord, SourceFile};
    use crate::store::test_support::preview;
    use std::sync::Arc;

    type ScriptedToolkit = Toolkit<ScriptedDecoder, ScriptedRenderer, ScriptedComposer>;

    fn toolkit(composer: ScriptedComposer) -> ScriptedToolkit {
        let mut toolkit = Toolkit::new(ScriptedDecoder::default(), ScriptedRenderer::default(), composer);
        toolkit.initialize().unwrap();
        toolkit
    }

    /// Append selected records `(source, page)` drawn from `sources`.
    fn store_from(sources: &[(&str, &str)], pages: &[(usize, usize)]) -> PageStore {
        let handles: Vec<SourceHandle> = sources
            .iter()
            .map(|(name, bytes)| Arc::new(SourceFile::new(*name, bytes.as_bytes().to_vec())))
            .collect();
        let mut store = PageStore::new();
        for &(source, page) in pages {
            store.append(PageRecord::new(handles[source].clone(), page, preview(), true));
        }
        store
    }

    fn output(artifact: &ExportArtifact) -> String {
        String::from_utf8(artifact.bytes.clone()).unwrap()
    }

    #[test]
    fn test_group_sorted_by_source_page() {
        // Display order: page 5 then page 2 of the same source.
        let store = store_from(&[("a.pdf", "a:6")], &[(0, 5), (0, 2)]);
        let artifact = export(&store, &toolkit(ScriptedComposer::default()), "out", "pdf").unwrap();
        assert_eq!(output(&artifact), "a#2,a#5");
        assert_eq!(artifact.file_name, "out.pdf");
    }

    #[test]
    fn test_groups_follow_first_display_position() {
        let store = store_from(&[("a.pdf", "a:3"), ("b.pdf", "b:3")], &[(1, 2), (0, 3), (1, 1), (0, 1)]);
        let plan = ExportPlan::from_store(&store).unwrap();
        let names: Vec<&str> = plan.groups.iter().map(|g| g.source_name.as_str()).collect();
        assert_eq!(names, vec!["b.pdf", "a.pdf"]);

        let artifact = compose(&plan, &toolkit(ScriptedComposer::default()), "x.pdf".into()).unwrap();
        assert_eq!(output(&artifact), "b#1,b#2,a#1,a#3");
        assert_eq!(artifact.page_count, 4);
    }

    #[test]
    fn test_unselected_pages_are_left_out() {
        let mut store = store_from(&[("a.pdf", "a:3")], &[(0, 1), (0, 2), (0, 3)]);
        let middle = store.ids()[1];
        store.toggle(middle);

        let artifact = export(&store, &toolkit(ScriptedComposer::default()), "out", "pdf").unwrap();
        assert_eq!(output(&artifact), "a#1,a#3");
    }

    #[test]
    fn test_empty_selection_fails() {
        let mut store = store_from(&[("a.pdf", "a:1")], &[(0, 1)]);
        store.deselect_all();
        let err = export(&store, &toolkit(ScriptedComposer::default()), "out", "pdf").unwrap_err();
        assert!(matches!(err, Error::EmptySelection));
    }

    #[test]
    fn test_copy_failure_skips_only_that_page() {
        let store = store_from(&[("a.pdf", "a:3"), ("b.pdf", "b:2")], &[(0, 1), (0, 2), (0, 3), (1, 1), (1, 2)]);
        let artifact = export(&store, &toolkit(ScriptedComposer::failing(&[("a", 1)])), "out", "pdf").unwrap();

        assert_eq!(output(&artifact), "a#1,a#3,b#1,b#2");
        assert_eq!(artifact.page_count, 4);
        assert_eq!(artifact.failures.len(), 1);
        assert_eq!(artifact.failures[0].message(), "Failed to copy page 2 from a.pdf");
    }

    #[test]
    fn test_page_number_zero_is_reported_not_copied() {
        let store = store_from(&[("a.pdf", "a:2")], &[(0, 0), (0, 1)]);
        let artifact = export(&store, &toolkit(ScriptedComposer::default()), "out", "pdf").unwrap();

        assert_eq!(output(&artifact), "a#1");
        assert_eq!(artifact.page_count, 1);
        assert_eq!(artifact.failures.len(), 1);
        assert!(matches!(
            artifact.failures[0],
            ExportFailure::Page {
                page_number: 0,
                error: Error::Copy { page: 0, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_every_page_failing_is_nothing_exported() {
        let store = store_from(&[("a.pdf", "a:2"), ("b.pdf", "corrupt")], &[(0, 1), (0, 2), (1, 1)]);
        let failing = toolkit(ScriptedComposer::failing(&[("a", 0), ("a", 1)]));

        match export(&store, &failing, "out", "pdf").unwrap_err() {
            Error::NothingExported { failures } => {
                assert_eq!(failures.len(), 3);
                assert!(matches!(failures[2], ExportFailure::Group { .. }));
            },
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unopenable_group_is_skipped() {
        let store = store_from(&[("a.pdf", "corrupt"), ("b.pdf", "b:1")], &[(0, 1), (1, 1)]);
        let artifact = export(&store, &toolkit(ScriptedComposer::default()), "out", "pdf").unwrap();

        assert_eq!(output(&artifact), "b#1");
        assert!(matches!(artifact.failures[0], ExportFailure::Group { .. }));
        assert!(!artifact.is_complete());
    }

    #[test]
    fn test_same_named_sources_share_first_source() {
        // Two different uploads called "scan.pdf"; the first has 1 page, the second 3.
        let store = store_from(&[("scan.pdf", "first:1"), ("scan.pdf", "second:3")], &[(0, 1), (1, 1), (1, 3)]);
        let plan = ExportPlan::from_store(&store).unwrap();
        assert_eq!(plan.groups.len(), 1);
        // Equal source indices keep display order.
        let display: Vec<usize> = plan.groups[0].pages.iter().map(|p| p.display_index).collect();
        assert_eq!(display, vec![0, 1, 2]);

        let artifact = compose(&plan, &toolkit(ScriptedComposer::default()), "x.pdf".into()).unwrap();
        // Everything is copied from the first upload; its missing page 3 fails.
        assert_eq!(output(&artifact), "first#1,first#1");
        assert_eq!(artifact.failures.len(), 1);
    }

    #[test]
    fn test_export_does_not_mutate_store() {
        let store = store_from(&[("a.pdf", "a:2")], &[(0, 2), (0, 1)]);
        let before = store.ids();
        export(&store, &toolkit(ScriptedComposer::default()), "out", "pdf").unwrap();
        assert_eq!(store.ids(), before);
        assert_eq!(store.selected_count(), 2);
    }

    #[test]
    fn test_not_ready_and_bad_name() {
        let store = store_from(&[("a.pdf", "a:1")], &[(0, 1)]);
        let cold: ScriptedToolkit =
            Toolkit::new(ScriptedDecoder::default(), ScriptedRenderer::default(), ScriptedComposer::default());
        assert!(matches!(export(&store, &cold, "out", "pdf"), Err(Error::NotReady)));

        let warm = toolkit(ScriptedComposer::default());
        assert!(matches!(export(&store, &warm, "   ", "pdf"), Err(Error::InvalidExportName)));
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(artifact_file_name(" merged ", ".pdf").unwrap(), "merged.pdf");
        assert_eq!(artifact_file_name("merged", "").unwrap(), "merged");
        assert!(artifact_file_name("", "pdf").is_err());
    }

    #[test]
    fn test_real_pdf_export() {
        use crate::backend::samples::{page_labels, pdf_with_pages};
        use crate::toolkit::PdfToolkit;

        let a = Arc::new(SourceFile::new("a.pdf", pdf_with_pages(&["a1", "a2", "a3"])));
        let b = Arc::new(SourceFile::new("b.pdf", pdf_with_pages(&["b1", "b2"])));
        let mut store = PageStore::new();
        for (source, page) in [(&b, 2), (&a, 3), (&a, 1), (&b, 1)] {
            store.append(PageRecord::new(source.clone(), page, preview(), true));
        }

        let mut toolkit = PdfToolkit::default();
        toolkit.initialize().unwrap();
        let artifact = export(&store, &toolkit, "merged", "pdf").unwrap();

        assert!(artifact.is_complete());
        assert_eq!(page_labels(&artifact.bytes), vec!["b1", "b2", "a1", "a3"]);

        let dir = tempfile::tempdir().unwrap();
        let path = artifact.write_to_dir(dir.path()).unwrap();
        assert_eq!(path.file_name().unwrap(), "merged.pdf");
        assert_eq!(std::fs::read(path).unwrap(), artifact.bytes);
    }
}
