//! Shared data structures for the application state
//!
//! These structs represent the data model that flows between
//! the host bridge, the session store and the UI layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image extensions recognized by the folder scan (compared lower-case)
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "gif", "webp", "tiff", "tif",
];

/// Check whether a file extension names a supported image format
pub fn is_supported_extension(extension: &str) -> bool {
    let ext = extension.to_ascii_lowercase();
    SUPPORTED_EXTENSIONS.contains(&ext.as_str())
}

/// MIME type used to label base64 image payloads.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        _ => "application/octet-stream",
    }
}

/// Represents a single image produced by a folder scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Stable id, unique within one scan result
    pub id: String,
    /// Filename only (e.g., "IMG_0001.jpg")
    pub name: String,
    /// Full path to the image file
    pub path: String,
    /// File size in bytes
    pub size: u64,
    /// Last modification time (Unix seconds)
    pub modified: u64,
    /// Lower-case extension without the dot
    pub extension: String,
}

impl ImageRecord {
    pub fn mime_type(&self) -> &'static str {
        mime_for_extension(&self.extension)
    }
}

/// Result of scanning a folder for images
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub images: Vec<ImageRecord>,
    pub total_count: usize,
    pub scan_time_ms: u64,
}

/// Header-level information about one image file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub color_type: String,
    pub file_size: u64,
}

/// Whether a batch transfer keeps the source files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    #[default]
    Copy,
    Move,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Copy => write!(f, "copy"),
            TransferMode::Move => write!(f, "move"),
        }
    }
}

/// Aggregate outcome reported by the host for one bulk transfer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub success_count: usize,
    pub failed_count: usize,
    /// One message per failed item
    pub errors: Vec<String>,
}

impl TransferResult {
    /// Number of items the host accounted for
    pub fn total(&self) -> usize {
        self.success_count + self.failed_count
    }

    pub fn has_failures(&self) -> bool {
        self.failed_count > 0
    }
}

/// Position of the cursor for display ("3 / 10")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
}

impl Progress {
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f32 / self.total as f32 * 100.0
        }
    }
}

/// Top-level screen of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Folder selection and batch dialog
    #[default]
    Browsing,
    /// One image at a time
    Viewing,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_extensions_ignore_case() {
        assert!(is_supported_extension("JPG"));
        assert!(is_supported_extension("Tiff"));
        assert!(is_supported_extension("webp"));
        assert!(!is_supported_extension("nef"));
        assert!(!is_supported_extension(""));
    }

    #[test]
    fn test_mime_follows_extension() {
        assert_eq!(mime_for_extension("jpeg"), "image/jpeg");
        assert_eq!(mime_for_extension("PNG"), "image/png");
        assert_eq!(mime_for_extension("gif"), "image/gif");
        assert_eq!(mime_for_extension("bmp"), "image/bmp");
        assert_eq!(mime_for_extension("webp"), "image/webp");
        assert_eq!(mime_for_extension("tif"), "image/tiff");
        assert_eq!(mime_for_extension("xyz"), "application/octet-stream");
    }

    #[test]
    fn test_progress_percentage() {
        let progress = Progress { current: 1, total: 4 };
        assert_eq!(progress.percentage(), 25.0);
        assert_eq!(Progress::default().percentage(), 0.0);
    }

    #[test]
    fn test_transfer_mode_serializes_lowercase() {
        let json = serde_json::to_string(&TransferMode::Move).unwrap();
        assert_eq!(json, "\"move\"");
        assert_eq!(TransferMode::Copy.to_string(), "copy");
    }
}
