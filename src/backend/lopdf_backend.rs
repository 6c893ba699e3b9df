//! `lopdf` implementation of the decoder and composer.
//!
//! Copying a page imports the page dictionary and everything it references
//! into the output document, renumbering objects as it goes. The page-tree
//! parent is dropped and its inheritable attributes are flattened onto the
//! page, so each copied page stands on its own. Objects shared between pages
//! of one source (fonts, images) are imported once per output.

use super::{Composer, Decoder};
use crate::error::{Error, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Page attributes a page may inherit from its ancestors (PDF 32000-1 §7.7.3.4).
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Maximum nesting followed while importing a page's object graph.
const MAX_COPY_DEPTH: u32 = 256;

/// Guard against cyclic `/Parent` chains.
const MAX_PARENT_CHAIN: usize = 64;

static NEXT_DOCUMENT_KEY: AtomicU64 = AtomicU64::new(1);

/// A source PDF opened by [`LopdfDecoder`].
#[derive(Debug)]
pub struct LoadedPdf {
    key: u64,
    document: Document,
    pages: Vec<ObjectId>,
}

impl LoadedPdf {
    /// Wrap an already parsed document.
    pub fn from_document(document: Document) -> Self {
        let pages = document.get_pages().into_values().collect();
        Self {
            key: NEXT_DOCUMENT_KEY.fetch_add(1, Ordering::Relaxed),
            document,
            pages,
        }
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Underlying `lopdf` document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    pub(super) fn page_id(&self, index: usize) -> Option<ObjectId> {
        self.pages.get(index).copied()
    }

    /// Effective box and rotation of 1-based `page_number`.
    ///
    /// Uses the CropBox when present, otherwise the MediaBox.
    pub fn page_geometry(&self, page_number: usize) -> Option<PageGeometry> {
        let page_id = self.page_id(page_number.checked_sub(1)?)?;
        let rect = self
            .inherited(page_id, b"CropBox")
            .or_else(|| self.inherited(page_id, b"MediaBox"))?;
        let coords: Vec<f32> = self.resolve(rect)?.as_array().ok()?.iter().filter_map(|o| self.number(o)).collect();
        if coords.len() != 4 {
            return None;
        }

        let rotation = self
            .inherited(page_id, b"Rotate")
            .and_then(|r| self.number(r))
            .map(|r| (r as i64).rem_euclid(360))
            .unwrap_or(0);
        Some(PageGeometry {
            rect: [
                coords[0].min(coords[2]),
                coords[1].min(coords[3]),
                coords[0].max(coords[2]),
                coords[1].max(coords[3]),
            ],
            rotation: match rotation {
                90 | 180 | 270 => rotation as u16,
                _ => 0,
            },
        })
    }

    /// Displayed size in points of 1-based `page_number`, after `/Rotate`.
    pub fn page_size(&self, page_number: usize) -> Option<(f32, f32)> {
        self.page_geometry(page_number).map(|g| g.display_size())
    }

    /// Decoded content stream of 1-based `page_number`; empty for pages without content.
    pub fn page_content(&self, page_number: usize) -> Result<Vec<u8>> {
        let page_id = page_number
            .checked_sub(1)
            .and_then(|index| self.page_id(index))
            .ok_or_else(|| Error::Render {
                page: page_number,
                reason: format!("source has only {} page(s)", self.page_count()),
            })?;
        self.document.get_page_content(page_id).map_err(|e| Error::Render {
            page: page_number,
            reason: e.to_string(),
        })
    }

    /// Resource dictionary in effect for 1-based `page_number`.
    pub fn page_resources(&self, page_number: usize) -> Option<&Dictionary> {
        let page_id = self.page_id(page_number.checked_sub(1)?)?;
        self.resolve(self.inherited(page_id, b"Resources")?)?.as_dict().ok()
    }

    /// Look up `key` on the page or the nearest ancestor that defines it.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.document.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_PARENT_CHAIN {
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.document.get_dictionary(parent).ok()?;
        }
        None
    }

    pub(super) fn resolve<'a>(&'a self, object: &'a Object) -> Option<&'a Object> {
        match object {
            Object::Reference(id) => self.document.get_object(*id).ok(),
            other => Some(other),
        }
    }

    pub(super) fn number(&self, object: &Object) -> Option<f32> {
        match self.resolve(object)? {
            Object::Integer(i) => Some(*i as f32),
            Object::Real(r) => Some(*r as f32),
            _ => None,
        }
    }
}

/// Page box and rotation, in default user space units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// `[llx, lly, urx, ury]`, normalized so `llx <= urx` and `lly <= ury`
    pub rect: [f32; 4],
    /// Clockwise display rotation: 0, 90, 180 or 270
    pub rotation: u16,
}

impl PageGeometry {
    /// Unrotated width.
    pub fn width(&self) -> f32 {
        self.rect[2] - self.rect[0]
    }

    /// Unrotated height.
    pub fn height(&self) -> f32 {
        self.rect[3] - self.rect[1]
    }

    /// Size as displayed, after rotation.
    pub fn display_size(&self) -> (f32, f32) {
        if self.rotation == 90 || self.rotation == 270 {
            (self.height(), self.width())
        } else {
            (self.width(), self.height())
        }
    }
}

/// Decoder backed by `lopdf`.
///
/// Encrypted sources are rejected; password handling is out of scope.
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfDecoder;

impl LopdfDecoder {
    /// Create a decoder.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for LopdfDecoder {
    type Document = LoadedPdf;

    fn open(&self, bytes: &[u8]) -> Result<LoadedPdf> {
        let document = Document::load_mem(bytes).map_err(|e| Error::Decode(e.to_string()))?;
        if document.is_encrypted() {
            return Err(Error::Decode("document is password-protected".to_string()));
        }
        let loaded = LoadedPdf::from_document(document);
        log::debug!("Opened PDF with {} page(s)", loaded.page_count());
        Ok(loaded)
    }

    fn page_count(&self, document: &LoadedPdf) -> usize {
        document.page_count()
    }
}

/// Output document being assembled by [`LopdfComposer`].
#[derive(Debug)]
pub struct OutputDocument {
    document: Document,
    pages: Vec<ObjectId>,
    /// (source key, source object) -> output object
    imported: HashMap<(u64, ObjectId), ObjectId>,
}

impl OutputDocument {
    fn new() -> Self {
        Self {
            document: Document::with_version("1.7"),
            pages: Vec::new(),
            imported: HashMap::new(),
        }
    }

    /// Pages placed so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Composer backed by `lopdf`.
#[derive(Debug, Clone)]
pub struct LopdfComposer {
    compress: bool,
    producer: String,
}

impl Default for LopdfComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl LopdfComposer {
    /// Create a composer that compresses output streams.
    pub fn new() -> Self {
        Self {
            compress: true,
            producer: format!("{} {}", crate::NAME, crate::VERSION),
        }
    }

    /// Enable or disable stream compression on serialize.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set the `/Producer` written to the output's Info dictionary.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }
}

impl Composer<LopdfDecoder> for LopdfComposer {
    type Accumulator = OutputDocument;
    type CopiedPage = ObjectId;

    fn create_accumulator(&self) -> OutputDocument {
        OutputDocument::new()
    }

    fn copy_page(&self, source: &LoadedPdf, index: usize, dest: &mut OutputDocument) -> Result<ObjectId> {
        let page_number = index + 1;
        let page_id = source.page_id(index).ok_or_else(|| Error::Copy {
            page: page_number,
            reason: format!("source has only {} page(s)", source.page_count()),
        })?;
        let page = source.document.get_dictionary(page_id).map_err(|e| Error::Copy {
            page: page_number,
            reason: e.to_string(),
        })?;

        let mut flattened = page.clone();
        flattened.remove(b"Parent");
        // Article beads point into the source's thread tree.
        flattened.remove(b"B");
        for key in INHERITABLE_KEYS {
            if !flattened.has(key) {
                if let Some(value) = source.inherited(page_id, key) {
                    flattened.set(key.to_vec(), value.clone());
                }
            }
        }

        let mut importer = PageImporter {
            source,
            output: dest,
            added: Vec::new(),
        };
        // Reserve the page id first so annotations' /P back-links resolve to the copy.
        let new_page = importer.reserve(page_id);
        match importer.import_dictionary(&flattened, 0) {
            Ok(dict) => {
                importer.output.document.objects.insert(new_page, Object::Dictionary(dict));
                Ok(new_page)
            },
            Err(e) => {
                importer.rollback();
                Err(Error::Copy {
                    page: page_number,
                    reason: e.to_string(),
                })
            },
        }
    }

    fn append_copied_page(&self, dest: &mut OutputDocument, page: ObjectId) {
        dest.pages.push(page);
    }

    fn serialize(&self, mut output: OutputDocument) -> Result<Vec<u8>> {
        let document = &mut output.document;
        let pages_id = document.new_object_id();

        for &page_id in &output.pages {
            if let Ok(Object::Dictionary(page)) = document.get_object_mut(page_id) {
                page.set("Parent", pages_id);
            }
        }

        let kids: Vec<Object> = output.pages.iter().map(|&id| Object::Reference(id)).collect();
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", output.pages.len() as i64);
        pages.set("Kids", kids);
        document.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", pages_id);
        let catalog_id = document.add_object(catalog);

        let mut info = Dictionary::new();
        info.set("Producer", Object::string_literal(self.producer.clone()));
        info.set(
            "CreationDate",
            Object::string_literal(chrono::Local::now().format("D:%Y%m%d%H%M%S").to_string()),
        );
        let info_id = document.add_object(info);

        document.trailer.set("Root", catalog_id);
        document.trailer.set("Info", info_id);

        if self.compress {
            document.compress();
        }

        let mut bytes = Vec::new();
        document
            .save_to(&mut bytes)
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))?;
        log::debug!("Serialized {} page(s) into {} bytes", output.pages.len(), bytes.len());
        Ok(bytes)
    }
}

/// Copies one page's object graph from a source into an output document.
struct PageImporter<'a> {
    source: &'a LoadedPdf,
    output: &'a mut OutputDocument,
    /// Objects created by this import and the mapping each one replaced, for rollback
    added: Vec<(ObjectId, ObjectId, Option<ObjectId>)>,
}

impl PageImporter<'_> {
    fn reserve(&mut self, source_id: ObjectId) -> ObjectId {
        let new_id = self.output.document.new_object_id();
        let previous = self.output.imported.insert((self.source.key, source_id), new_id);
        self.added.push((source_id, new_id, previous));
        new_id
    }

    fn import_reference(&mut self, id: ObjectId, depth: u32) -> Result<ObjectId> {
        if let Some(&mapped) = self.output.imported.get(&(self.source.key, id)) {
            return Ok(mapped);
        }
        let new_id = self.reserve(id);
        let copied = match self.source.document.get_object(id) {
            Ok(object) => self.import_value(object, depth + 1)?,
            Err(_) => {
                log::debug!("Dangling reference {} {} R, substituting null", id.0, id.1);
                Object::Null
            },
        };
        self.output.document.objects.insert(new_id, copied);
        Ok(new_id)
    }

    fn import_value(&mut self, object: &Object, depth: u32) -> Result<Object> {
        if depth > MAX_COPY_DEPTH {
            return Err(Error::RecursionLimitExceeded(MAX_COPY_DEPTH));
        }
        let copied = match object {
            Object::Reference(id) => Object::Reference(self.import_reference(*id, depth)?),
            Object::Array(items) => {
                let mut copy = Vec::with_capacity(items.len());
                for item in items {
                    copy.push(self.import_value(item, depth + 1)?);
                }
                Object::Array(copy)
            },
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(dict, depth + 1)?),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.import_dictionary(&stream.dict, depth + 1)?;
                Object::Stream(copy)
            },
            other => other.clone(),
        };
        Ok(copied)
    }

    fn import_dictionary(&mut self, dict: &Dictionary, depth: u32) -> Result<Dictionary> {
        let skip_parent = is_page_tree_node(dict);
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if skip_parent && key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.import_value(value, depth)?);
        }
        Ok(copy)
    }

    fn rollback(self) {
        for (source_id, new_id, previous) in self.added.into_iter().rev() {
            let key = (self.source.key, source_id);
            match previous {
                Some(earlier) => {
                    self.output.imported.insert(key, earlier);
                },
                None => {
                    self.output.imported.remove(&key);
                },
            }
            self.output.document.objects.remove(&new_id);
        }
    }
}

fn is_page_tree_node(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name == b"Page" || name == b"Pages")
}

/// Builders for small in-memory PDFs used by unit tests.
#[cfg(test)]
pub(crate) mod samples {
    use lopdf::{Dictionary, Document, Object, Stream};

    /// One page per label; each page shows its label. MediaBox is inherited.
    pub fn pdf_with_pages(labels: &[&str]) -> Vec<u8> {
        let contents: Vec<String> = labels
            .iter()
            .map(|label| format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", label))
            .collect();
        let contents: Vec<&str> = contents.iter().map(String::as_str).collect();
        pdf_with_contents(&contents)
    }

    /// One US Letter page per content stream, sharing one font resource.
    pub fn pdf_with_contents(contents: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
        let font_id = doc.add_object(font);

        let mut fonts = Dictionary::new();
        fonts.set("F1", font_id);
        let mut resources = Dictionary::new();
        resources.set("Font", fonts);
        let resources_id = doc.add_object(resources);

        let mut kids = Vec::new();
        for content in contents {
            let content_id = doc.add_object(Stream::new(Dictionary::new(), content.as_bytes().to_vec()));
            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", pages_id);
            page.set("Contents", content_id);
            kids.push(Object::Reference(doc.add_object(page)));
        }

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", kids.len() as i64);
        pages.set("Kids", kids);
        pages.set("Resources", resources_id);
        pages.set(
            "MediaBox",
            vec![Object::Integer(0), Object::Integer(0), Object::Integer(612), Object::Integer(792)],
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", pages_id);
        let catalog_id = doc.add_object(catalog);
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    /// Text shown on each page of a serialized PDF, in page order.
    pub fn page_labels(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| {
                let content = String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned();
                let start = content.find('(').unwrap() + 1;
                let end = content.find(')').unwrap();
                content[start..end].to_string()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::samples::*;
    use super::*;

    #[test]
    fn test_open_counts_pages() {
        let decoder = LopdfDecoder::new();
        let doc = decoder.open(&pdf_with_pages(&["a", "b", "c"])).unwrap();
        assert_eq!(decoder.page_count(&doc), 3);
    }

    #[test]
    fn test_open_garbage_is_decode_error() {
        let decoder = LopdfDecoder::new();
        let err = decoder.open(b"this is not a pdf").unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_page_size_uses_inherited_media_box() {
        let doc = LopdfDecoder::new().open(&pdf_with_pages(&["a"])).unwrap();
        assert_eq!(doc.page_size(1), Some((612.0, 792.0)));
        assert_eq!(doc.page_size(0), None);
        assert_eq!(doc.page_size(2), None);
    }

    #[test]
    fn test_copy_and_serialize_in_given_order() {
        let decoder = LopdfDecoder::new();
        let composer = LopdfComposer::new().with_compression(false);
        let source = decoder.open(&pdf_with_pages(&["one", "two", "three"])).unwrap();

        let mut output = composer.create_accumulator();
        for index in [2, 0] {
            let page = composer.copy_page(&source, index, &mut output).unwrap();
            composer.append_copied_page(&mut output, page);
        }
        assert_eq!(output.page_count(), 2);

        let bytes = composer.serialize(output).unwrap();
        assert_eq!(page_labels(&bytes), vec!["three", "one"]);
    }

    #[test]
    fn test_copied_page_carries_inherited_attributes() {
        let decoder = LopdfDecoder::new();
        let composer = LopdfComposer::new();
        let source = decoder.open(&pdf_with_pages(&["x"])).unwrap();

        let mut output = composer.create_accumulator();
        let page = composer.copy_page(&source, 0, &mut output).unwrap();
        composer.append_copied_page(&mut output, page);
        let bytes = composer.serialize(output).unwrap();

        let reopened = decoder.open(&bytes).unwrap();
        assert_eq!(reopened.page_size(1), Some((612.0, 792.0)));
        let page_id = reopened.page_id(0).unwrap();
        let dict = reopened.document().get_dictionary(page_id).unwrap();
        assert!(dict.has(b"Resources"));
    }

    #[test]
    fn test_copy_out_of_range_is_copy_error() {
        let decoder = LopdfDecoder::new();
        let composer = LopdfComposer::new();
        let source = decoder.open(&pdf_with_pages(&["a"])).unwrap();

        let mut output = composer.create_accumulator();
        let err = composer.copy_page(&source, 4, &mut output).unwrap_err();
        assert!(matches!(err, Error::Copy { page: 5, .. }));
        assert_eq!(output.page_count(), 0);
    }

    #[test]
    fn test_shared_resources_imported_once() {
        let decoder = LopdfDecoder::new();
        let composer = LopdfComposer::new();
        let source = decoder.open(&pdf_with_pages(&["a", "b"])).unwrap();

        let mut output = composer.create_accumulator();
        composer.copy_page(&source, 0, &mut output).unwrap();
        let after_first = output.document.objects.len();
        composer.copy_page(&source, 1, &mut output).unwrap();
        // Second page only adds its own dictionary and content stream.
        assert_eq!(output.document.objects.len(), after_first + 2);
    }

    #[test]
    fn test_failed_copy_restores_earlier_import() {
        let decoder = LopdfDecoder::new();
        let composer = LopdfComposer::new();
        let source = decoder.open(&pdf_with_pages(&["a"])).unwrap();
        let page_id = source.page_id(0).unwrap();

        let mut output = composer.create_accumulator();
        let first = composer.copy_page(&source, 0, &mut output).unwrap();
        let objects_before = output.document.objects.len();

        // A second import of the same page that gets abandoned part way.
        let mut importer = PageImporter {
            source: &source,
            output: &mut output,
            added: Vec::new(),
        };
        let second = importer.reserve(page_id);
        assert_ne!(second, first);
        importer.rollback();

        assert_eq!(output.imported.get(&(source.key, page_id)), Some(&first));
        assert_eq!(output.document.objects.len(), objects_before);

        // Copying the page again only adds a page dictionary; its content is shared.
        composer.copy_page(&source, 0, &mut output).unwrap();
        assert_eq!(output.document.objects.len(), objects_before + 1);
    }

    #[test]
    fn test_too_deep_page_is_rolled_back() {
        let mut doc = Document::load_mem(&pdf_with_pages(&["a", "b"])).unwrap();
        let mut nested = Object::Null;
        for _ in 0..(MAX_COPY_DEPTH + 8) {
            nested = Object::Array(vec![nested]);
        }
        let page_two = *doc.get_pages().get(&2).unwrap();
        doc.get_dictionary_mut(page_two).unwrap().set("Deep", nested);
        let source = LoadedPdf::from_document(doc);

        let composer = LopdfComposer::new();
        let mut output = composer.create_accumulator();
        composer.copy_page(&source, 0, &mut output).unwrap();
        let objects_before = output.document.objects.len();
        let imported_before = output.imported.len();

        let err = composer.copy_page(&source, 1, &mut output).unwrap_err();
        assert!(matches!(err, Error::Copy { page: 2, .. }));
        assert_eq!(output.document.objects.len(), objects_before);
        assert_eq!(output.imported.len(), imported_before);
    }

    #[test]
    fn test_empty_output_still_serializes() {
        let composer = LopdfComposer::new();
        let bytes = composer.serialize(composer.create_accumulator()).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().is_empty());
    }
}
