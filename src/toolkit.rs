//! Decoder, renderer and composer bundled behind an explicit readiness step.
//!
//! A [`Toolkit`] starts out not ready. [`Toolkit::initialize`] prepares each
//! collaborator once; ingestion and export refuse to run before that with
//! [`Error::NotReady`].

use crate::backend::{Composer, Decoder, DefaultRenderer, LopdfComposer, LopdfDecoder, PreviewOptions, Renderer};
use crate::error::{Error, Result};

/// The three collaborators used by ingestion and export.
#[derive(Debug)]
pub struct Toolkit<D, R, C> {
    decoder: D,
    renderer: R,
    composer: C,
    ready: bool,
}

/// Toolkit built from the bundled `lopdf` backend and the default renderer.
pub type PdfToolkit = Toolkit<LopdfDecoder, DefaultRenderer, LopdfComposer>;

impl<D, R, C> Toolkit<D, R, C>
where
    D: Decoder,
    R: Renderer<D>,
    C: Composer<D>,
{
    /// Bundle collaborators. The toolkit is not ready until initialized.
    pub fn new(decoder: D, renderer: R, composer: C) -> Self {
        Self {
            decoder,
            renderer,
            composer,
            ready: false,
        }
    }

    /// Initialize every collaborator and mark the toolkit ready.
    ///
    /// Calling this again on a ready toolkit is a no-op.
    pub fn initialize(&mut self) -> Result<()> {
        if self.ready {
            return Ok(());
        }
        self.decoder.initialize()?;
        self.renderer.initialize()?;
        self.composer.initialize()?;
        self.ready = true;
        log::info!("PDF processing initialized");
        Ok(())
    }

    /// Whether [`initialize`](Self::initialize) has completed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Fail with [`Error::NotReady`] unless initialized.
    pub fn ensure_ready(&self) -> Result<()> {
        if self.ready {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }

    /// Decoder collaborator.
    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Renderer collaborator.
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Composer collaborator.
    pub fn composer(&self) -> &C {
        &self.composer
    }
}

impl PdfToolkit {
    /// Bundled backend with the given preview options and stream compression.
    pub fn pdf(preview: PreviewOptions, compress: bool) -> Self {
        Toolkit::new(
            LopdfDecoder::new(),
            DefaultRenderer::new(preview),
            LopdfComposer::new().with_compression(compress),
        )
    }
}

impl Default for PdfToolkit {
    fn default() -> Self {
        Self::pdf(PreviewOptions::default(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_until_initialized() {
        let mut toolkit = PdfToolkit::default();
        assert!(!toolkit.is_ready());
        assert!(matches!(toolkit.ensure_ready(), Err(Error::NotReady)));

        toolkit.initialize().unwrap();
        assert!(toolkit.is_ready());
        assert!(toolkit.ensure_ready().is_ok());

        // Idempotent
        toolkit.initialize().unwrap();
        assert!(toolkit.is_ready());
    }

    #[test]
    fn test_pdf_toolkit_carries_preview_options() {
        let toolkit = PdfToolkit::pdf(PreviewOptions::with_width(64), false);
        assert_eq!(toolkit.renderer().options().width, 64);
    }
}
