//! Collaborator interfaces for decoding, rendering and composing documents.
//!
//! The core never looks inside source bytes. It talks to three
//! collaborators:
//!
//! ```text
//! SourceFile bytes
//!     ↓ Decoder::open
//! Document handle ──→ Renderer::render_page ──→ Preview
//!     ↓ Composer::copy_page
//! Accumulator ──→ Composer::serialize ──→ output bytes
//! ```
//!
//! `copy_page` is part of [`Composer`] because it writes into the
//! composer-owned accumulator type.
//!
//! The crate ships [`LopdfDecoder`] and [`LopdfComposer`] built on `lopdf`,
//! and two renderers: [`RasterRenderer`] (feature `rendering`, on by default)
//! draws page content with `tiny-skia`, and [`PlaceholderRenderer`] draws
//! blank page-shaped thumbnails with `image` only. [`DefaultRenderer`] names
//! whichever one the build carries.

mod lopdf_backend;
mod placeholder;
#[cfg(feature = "rendering")]
mod raster;
#[cfg(test)]
pub(crate) mod scripted;

pub use lopdf_backend::{LoadedPdf, LopdfComposer, LopdfDecoder, OutputDocument, PageGeometry};
pub use placeholder::{PlaceholderRenderer, PreviewOptions};
#[cfg(feature = "rendering")]
pub use raster::RasterRenderer;

/// Renderer used by [`crate::PdfToolkit`].
#[cfg(feature = "rendering")]
pub type DefaultRenderer = RasterRenderer;
/// Renderer used by [`crate::PdfToolkit`].
#[cfg(not(feature = "rendering"))]
pub type DefaultRenderer = PlaceholderRenderer;

#[cfg(test)]
pub(crate) use lopdf_backend::samples;

use crate::error::Result;
use crate::model::Preview;

/// Parses source bytes into a page-addressable document.
pub trait Decoder {
    /// Opened document handle
    type Document;

    /// Prepare the decoder. Called once by [`crate::Toolkit::initialize`].
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Open a source. Fails with [`crate::Error::Decode`].
    fn open(&self, bytes: &[u8]) -> Result<Self::Document>;

    /// Number of pages in an opened document.
    fn page_count(&self, document: &Self::Document) -> usize;
}

/// Rasterizes a single page of an opened document.
pub trait Renderer<D: Decoder> {
    /// Prepare the renderer. Called once by [`crate::Toolkit::initialize`].
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Render 1-based `page_number`. Fails with [`crate::Error::Render`].
    fn render_page(&self, document: &D::Document, page_number: usize) -> Result<Preview>;
}

/// Assembles copied pages into a new output document.
pub trait Composer<D: Decoder> {
    /// Output document under construction
    type Accumulator;
    /// A page that has been copied into an accumulator but not yet placed
    type CopiedPage;

    /// Prepare the composer. Called once by [`crate::Toolkit::initialize`].
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    /// Start an empty output document.
    fn create_accumulator(&self) -> Self::Accumulator;

    /// Copy zero-based page `index` of `source` into `dest`.
    ///
    /// Fails with [`crate::Error::Copy`]; a failed copy leaves no page in the
    /// output.
    fn copy_page(
        &self,
        source: &D::Document,
        index: usize,
        dest: &mut Self::Accumulator,
    ) -> Result<Self::CopiedPage>;

    /// Place a copied page at the end of the output.
    fn append_copied_page(&self, dest: &mut Self::Accumulator, page: Self::CopiedPage);

    /// Serialize the finished output.
    fn serialize(&self, accumulator: Self::Accumulator) -> Result<Vec<u8>>;
}
