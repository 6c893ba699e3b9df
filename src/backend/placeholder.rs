//! Placeholder previews: page-shaped thumbnails without rasterizing content.
//!
//! Used when the `rendering` feature is off. It only needs the page geometry,
//! so ingestion stays cheap. Sizing and encoding are shared with the
//! content rasterizer.

use super::{LoadedPdf, LopdfDecoder, Renderer};
use crate::error::{Error, Result};
use crate::model::{Preview, PreviewFormat};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use serde::Deserialize;
use std::io::Cursor;

/// Size and colours of page previews.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PreviewOptions {
    /// Thumbnail width in pixels; height follows the page aspect ratio
    pub width: u32,
    /// Upper bound for the height of very tall pages
    pub max_height: u32,
    /// Page fill colour
    pub background: [u8; 3],
    /// Frame colour
    pub border: [u8; 3],
    /// Output encoding
    #[serde(skip)]
    pub format: PreviewFormat,
    /// JPEG quality (1-100), only used for JPEG
    pub jpeg_quality: u8,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            width: 200,
            max_height: 600,
            background: [255, 255, 255],
            border: [160, 160, 160],
            format: PreviewFormat::Png,
            jpeg_quality: 85,
        }
    }
}

impl PreviewOptions {
    /// Options with a custom thumbnail width.
    pub fn with_width(width: u32) -> Self {
        Self {
            width,
            ..Default::default()
        }
    }

    /// Encode previews as JPEG.
    pub fn as_jpeg(mut self, quality: u8) -> Self {
        self.format = PreviewFormat::Jpeg;
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

/// Renderer producing blank, correctly proportioned page thumbnails.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderRenderer {
    options: PreviewOptions,
}

impl PlaceholderRenderer {
    /// Create a renderer with the given options.
    pub fn new(options: PreviewOptions) -> Self {
        Self { options }
    }

    /// Current options.
    pub fn options(&self) -> &PreviewOptions {
        &self.options
    }

    fn draw(&self, width: u32, height: u32) -> RgbImage {
        let background = Rgb(self.options.background);
        let border = Rgb(self.options.border);
        RgbImage::from_fn(width, height, |x, y| {
            if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                border
            } else {
                background
            }
        })
    }
}

impl Renderer<LopdfDecoder> for PlaceholderRenderer {
    fn render_page(&self, document: &LoadedPdf, page_number: usize) -> Result<Preview> {
        let (page_width, page_height) = document
            .page_size(page_number)
            .filter(|(w, h)| *w > 0.0 && *h > 0.0)
            .ok_or_else(|| Error::Render {
                page: page_number,
                reason: "page has no usable MediaBox".to_string(),
            })?;

        let (width, height) = thumbnail_size(&self.options, page_width, page_height);
        let data = encode_preview(&self.options, self.draw(width, height)).map_err(|e| Error::Render {
            page: page_number,
            reason: e.to_string(),
        })?;

        Ok(Preview {
            data,
            width,
            height,
            format: self.options.format,
        })
    }
}

/// Pixel size of a thumbnail for a page of the given displayed size.
pub(super) fn thumbnail_size(options: &PreviewOptions, page_width: f32, page_height: f32) -> (u32, u32) {
    let width = options.width.max(1);
    let height = ((width as f32) * page_height / page_width).round() as u32;
    (width, height.clamp(1, options.max_height.max(1)))
}

pub(super) fn encode_preview(
    options: &PreviewOptions,
    image: RgbImage,
) -> std::result::Result<Vec<u8>, image::ImageError> {
    let output_format = match options.format {
        PreviewFormat::Png => ImageOutputFormat::Png,
        PreviewFormat::Jpeg => ImageOutputFormat::Jpeg(options.jpeg_quality),
    };
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image).write_to(&mut bytes, output_format)?;
    Ok(bytes.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::lopdf_backend::samples::pdf_with_pages;
    use crate::backend::Decoder;

    #[test]
    fn test_letter_page_thumbnail_size() {
        let doc = LopdfDecoder::new().open(&pdf_with_pages(&["a"])).unwrap();
        let renderer = PlaceholderRenderer::default();

        let preview = renderer.render_page(&doc, 1).unwrap();
        assert_eq!(preview.width, 200);
        // 792 / 612 * 200 = 258.8
        assert_eq!(preview.height, 259);
        assert_eq!(preview.format, PreviewFormat::Png);
        assert_eq!(&preview.data[1..4], b"PNG");
    }

    #[test]
    fn test_missing_page_is_render_error() {
        let doc = LopdfDecoder::new().open(&pdf_with_pages(&["a"])).unwrap();
        let err = PlaceholderRenderer::default().render_page(&doc, 3).unwrap_err();
        assert!(matches!(err, Error::Render { page: 3, .. }));
    }

    #[test]
    fn test_height_is_capped() {
        let options = PreviewOptions {
            max_height: 100,
            ..Default::default()
        };
        assert_eq!(thumbnail_size(&options, 10.0, 1000.0), (200, 100));
    }

    #[test]
    fn test_jpeg_previews() {
        let doc = LopdfDecoder::new().open(&pdf_with_pages(&["a"])).unwrap();
        let renderer = PlaceholderRenderer::new(PreviewOptions::with_width(50).as_jpeg(200));
        assert_eq!(renderer.options().jpeg_quality, 100);

        let preview = renderer.render_page(&doc, 1).unwrap();
        assert_eq!(preview.format, PreviewFormat::Jpeg);
        assert_eq!(&preview.data[..2], &[0xFF, 0xD8]);
    }
}
