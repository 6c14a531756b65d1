//! Extension handling for the formats the dispatcher knows how to save.
//!
//! All comparisons are done on the lowercase extension, and written file
//! names use the lowercase form too.

use crate::constants::SUPPORTED_IMAGE_EXTENSIONS;
use crate::error::{Result, ThumbnailError};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Output formats with a save strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Lossy, saved with an explicit quality and stripped metadata
    Jpeg,
    /// Lossless, saved at maximum compression or copied verbatim
    Png,
}

impl OutputFormat {
    /// Looks up a format by a bare extension (`"JPG"`, `"png"`), case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            _ => None,
        }
    }

    /// Format selected by the extension of `path`, or an unsupported-format error naming it.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = lowercase_extension(path);
        extension
            .as_deref()
            .and_then(OutputFormat::from_extension)
            .ok_or_else(|| {
                ThumbnailError::UnsupportedFormat(match extension {
                    Some(ext) => format!(".{}", ext),
                    None => format!("{} has no extension", path.display()),
                })
            })
    }

    /// Name of the libvips save operation for this format
    pub fn save_operation(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpegsave",
            OutputFormat::Png => "pngsave",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for OutputFormat {
    type Err = ThumbnailError;

    fn from_str(s: &str) -> Result<Self> {
        OutputFormat::from_extension(s.trim_start_matches('.'))
            .ok_or_else(|| ThumbnailError::UnsupportedFormat(s.to_string()))
    }
}

/// Lowercase extension of `path` without the leading dot.
pub fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
}

/// Whether the walker should pick this file up as an image candidate.
pub fn is_image_file(path: &Path) -> bool {
    lowercase_extension(path)
        .map(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Normalizes an `--ext` value to the `.ext` form in lowercase; `png`, `.PNG`
/// and ` .png ` all become `.png`. Empty input yields `None`.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_lowercase()))
}

/// Extension the output of `input` is written with: the override if any,
/// else the input's own extension. Empty when neither exists.
pub fn resolve_extension(input: &Path, ext_override: Option<&str>) -> String {
    match ext_override {
        Some(ext) => ext.to_string(),
        None => lowercase_extension(input)
            .map(|ext| format!(".{}", ext))
            .unwrap_or_default(),
    }
}
