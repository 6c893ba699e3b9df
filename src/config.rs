//! Session configuration.

use crate::backend::PreviewOptions;
use crate::error::Result;
use serde::Deserialize;
use std::path::Path;

/// Prefix of the dated default export name.
pub const DEFAULT_EXPORT_PREFIX: &str = "merged_document";

/// Default export extension.
pub const DEFAULT_EXTENSION: &str = "pdf";

/// `merged_document_<YYYY-MM-DD>` for today's local date.
pub fn default_export_name() -> String {
    format!("{}_{}", DEFAULT_EXPORT_PREFIX, chrono::Local::now().format("%Y-%m-%d"))
}

/// Editing session configuration.
///
/// Every field is optional in JSON; missing fields take their defaults.
///
/// ```ignore
/// {
///   "export_name": "report",
///   "select_uploaded": false,
///   "preview": { "width": 120 }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Output name without extension.
    pub export_name: String,

    /// Output extension, without the dot.
    pub extension: String,

    /// Initial selection flag of newly uploaded pages.
    pub select_uploaded: bool,

    /// Compress streams of the exported document.
    pub compress_output: bool,

    /// Thumbnail settings.
    pub preview: PreviewOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            export_name: default_export_name(),
            extension: DEFAULT_EXTENSION.to_string(),
            select_uploaded: true,
            compress_output: true,
            preview: PreviewOptions::default(),
        }
    }

    /// Set the output name.
    pub fn with_export_name(mut self, name: impl Into<String>) -> Self {
        self.export_name = name.into();
        self
    }

    /// Set the output extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Select or leave unselected newly uploaded pages.
    pub fn with_select_uploaded(mut self, select: bool) -> Self {
        self.select_uploaded = select;
        self
    }

    /// Enable stream compression on export.
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress_output = compress;
        self
    }

    /// Set thumbnail options.
    pub fn with_preview(mut self, preview: PreviewOptions) -> Self {
        self.preview = preview;
        self
    }

    /// Parse a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
