//! Scripted collaborators for unit tests.
//!
//! Source bytes are `"<tag>:<page count>"`; anything else fails to decode.
//! The composer serializes to `"<tag>#<page>,..."` so tests can read back
//! exactly which source pages were placed and in what order.

use super::{Composer, Decoder, Renderer};
use crate::error::{Error, Result};
use crate::model::{Preview, PreviewFormat};
use std::collections::HashSet;

#[derive(Debug, Clone)]
pub struct ScriptedDocument {
    pub tag: String,
    pub pages: usize,
}

#[derive(Debug, Default)]
pub struct ScriptedDecoder {
    pub fail_initialize: bool,
}

impl Decoder for ScriptedDecoder {
    type Document = ScriptedDocument;

    fn initialize(&mut self) -> Result<()> {
        if self.fail_initialize {
            return Err(Error::Decode("worker unavailable".to_string()));
        }
        Ok(())
    }

    fn open(&self, bytes: &[u8]) -> Result<ScriptedDocument> {
        let text = std::str::from_utf8(bytes).map_err(|e| Error::Decode(e.to_string()))?;
        let (tag, pages) = text
            .split_once(':')
            .ok_or_else(|| Error::Decode(format!("unreadable source '{}'", text)))?;
        let pages = pages.parse().map_err(|_| Error::Decode(format!("bad page count '{}'", pages)))?;
        Ok(ScriptedDocument {
            tag: tag.to_string(),
            pages,
        })
    }

    fn page_count(&self, document: &ScriptedDocument) -> usize {
        document.pages
    }
}

/// Fails to render the listed `(tag, page number)` pairs.
#[derive(Debug, Default)]
pub struct ScriptedRenderer {
    pub failing: HashSet<(String, usize)>,
}

impl ScriptedRenderer {
    pub fn failing(pages: &[(&str, usize)]) -> Self {
        Self {
            failing: pages.iter().map(|(t, p)| (t.to_string(), *p)).collect(),
        }
    }
}

impl Renderer<ScriptedDecoder> for ScriptedRenderer {
    fn render_page(&self, document: &ScriptedDocument, page_number: usize) -> Result<Preview> {
        if self.failing.contains(&(document.tag.clone(), page_number)) {
            return Err(Error::Render {
                page: page_number,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(Preview {
            data: format!("{}#{}", document.tag, page_number).into_bytes(),
            width: 10,
            height: 13,
            format: PreviewFormat::Png,
        })
    }
}

/// Fails to copy the listed `(tag, zero-based index)` pairs.
#[derive(Debug, Default)]
pub struct ScriptedComposer {
    pub failing: HashSet<(String, usize)>,
}

impl ScriptedComposer {
    pub fn failing(pages: &[(&str, usize)]) -> Self {
        Self {
            failing: pages.iter().map(|(t, i)| (t.to_string(), *i)).collect(),
        }
    }
}

impl Composer<ScriptedDecoder> for ScriptedComposer {
    type Accumulator = Vec<String>;
    type CopiedPage = String;

    fn create_accumulator(&self) -> Vec<String> {
        Vec::new()
    }

    fn copy_page(&self, source: &ScriptedDocument, index: usize, _dest: &mut Vec<String>) -> Result<String> {
        if index >= source.pages || self.failing.contains(&(source.tag.clone(), index)) {
            return Err(Error::Copy {
                page: index + 1,
                reason: "scripted failure".to_string(),
            });
        }
        Ok(format!("{}#{}", source.tag, index + 1))
    }

    fn append_copied_page(&self, dest: &mut Vec<String>, page: String) {
        dest.push(page);
    }

    fn serialize(&self, accumulator: Vec<String>) -> Result<Vec<u8>> {
        Ok(accumulator.join(",").into_bytes())
    }
}
