//! Page records and the source/preview data they point at.
//!
//! A [`PageRecord`] is one page of one uploaded source. Its provenance
//! (`source_name`, `source_page_index`, `source`) is fixed at creation and
//! only reachable through getters; the `selected` flag is the only mutable
//! field and is only changed by the selection engine.

use crate::error::Result;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque page identifier, unique for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(Uuid);

impl PageId {
    /// Allocate a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One uploaded source document: display name plus raw bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    name: String,
    bytes: Arc<[u8]>,
}

impl SourceFile {
    /// Create a source from in-memory bytes.
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a source from disk. The display name is the file name component.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self::new(name, bytes))
    }

    /// Display name of the source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw source bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Shared handle to a source, retained by every record created from it.
pub type SourceHandle = Arc<SourceFile>;

/// Encoding of a preview image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PreviewFormat {
    /// PNG (lossless)
    #[default]
    Png,
    /// JPEG (lossy)
    Jpeg,
}

impl PreviewFormat {
    /// MIME type for embedding the preview.
    pub fn mime_type(&self) -> &'static str {
        match self {
            PreviewFormat::Png => "image/png",
            PreviewFormat::Jpeg => "image/jpeg",
        }
    }
}

/// Rendered preview of a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// Encoded image data
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Encoding of `data`
    pub format: PreviewFormat,
}

/// One page of one source, after rasterization.
#[derive(Debug, Clone)]
pub struct PageRecord {
    id: PageId,
    source_name: String,
    source_page_index: usize,
    preview: Arc<Preview>,
    source: SourceHandle,
    pub(crate) selected: bool,
}

impl PageRecord {
    /// Create a record for page `source_page_index` (1-based) of `source`.
    pub fn new(source: SourceHandle, source_page_index: usize, preview: Preview, selected: bool) -> Self {
        Self {
            id: PageId::new(),
            source_name: source.name().to_string(),
            source_page_index,
            preview: Arc::new(preview),
            source,
            selected,
        }
    }

    /// Session-unique identifier.
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Display name of the originating source.
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// 1-based page number within the originating source.
    pub fn source_page_index(&self) -> usize {
        self.source_page_index
    }

    /// Rendered preview.
    pub fn preview(&self) -> &Arc<Preview> {
        &self.preview
    }

    /// Handle to the original source bytes.
    pub fn source(&self) -> &SourceHandle {
        &self.source
    }

    /// Whether the page is part of the selected subset.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Human-readable label, e.g. `report.pdf - Page 3`.
    pub fn label(&self) -> String {
        format!("{} - Page {}", self.source_name, self.source_page_index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview() -> Preview {
        Preview {
            data: vec![1, 2, 3],
            width: 10,
            height: 13,
            format: PreviewFormat::Png,
        }
    }

    #[test]
    fn test_page_ids_are_unique() {
        let a = PageId::new();
        let b = PageId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_takes_name_from_source() {
        let source = Arc::new(SourceFile::new("report.pdf", vec![0u8; 4]));
        let record = PageRecord::new(source.clone(), 3, preview(), true);

        assert_eq!(record.source_name(), "report.pdf");
        assert_eq!(record.source_page_index(), 3);
        assert!(record.is_selected());
        assert!(Arc::ptr_eq(record.source(), &source));
        assert_eq!(record.label(), "report.pdf - Page 3");
    }

    #[test]
    fn test_clone_keeps_id() {
        let source = Arc::new(SourceFile::new("a.pdf", Vec::new()));
        let record = PageRecord::new(source, 1, preview(), false);
        let copy = record.clone();
        assert_eq!(record.id(), copy.id());
        assert!(Arc::ptr_eq(record.preview(), copy.preview()));
    }

    #[test]
    fn test_source_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let source = SourceFile::from_path(&path).unwrap();
        assert_eq!(source.name(), "scan.pdf");
        assert_eq!(source.bytes(), b"%PDF-1.4");
    }

    #[test]
    fn test_source_from_missing_path_is_io_error() {
        let err = SourceFile::from_path("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }

    #[test]
    fn test_preview_mime() {
        assert_eq!(PreviewFormat::Png.mime_type(), "image/png");
        assert_eq!(PreviewFormat::Jpeg.mime_type(), "image/jpeg");
    }
}
