//! Host bridge
//!
//! Everything that touches the outside world goes through [`HostBridge`]:
//! - Folder picker dialog
//! - Recursive folder scan
//! - Metadata extraction
//! - Bulk copy/move and directory creation
//! - Display helpers (path -> URI conversion, decode test, base64 read)
//!
//! The session, resolver and transfer modules only see the trait, so the
//! local implementation can be swapped for a remote host or a test double.

pub mod local;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::state::data::{ImageMetadata, ImageRecord, ScanResult, TransferResult};

pub use local::LocalBridge;

#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Show a folder picker. `Ok(None)` means the user cancelled.
    async fn open_folder_dialog(&self, title: &str) -> Result<Option<String>, BridgeError>;

    async fn scan_folder(&self, folder: &str) -> Result<ScanResult, BridgeError>;

    async fn get_image_metadata(&self, path: &str) -> Result<ImageMetadata, BridgeError>;

    /// Copy every file into `target`. Per-item failures are reported in the
    /// result; `Err` means the call itself failed.
    async fn batch_copy_files(
        &self,
        files: &[ImageRecord],
        target: &str,
    ) -> Result<TransferResult, BridgeError>;

    /// Move every file into `target`, same reporting as copy.
    async fn batch_move_files(
        &self,
        files: &[ImageRecord],
        target: &str,
    ) -> Result<TransferResult, BridgeError>;

    async fn create_directory(&self, path: &str) -> Result<(), BridgeError>;

    async fn read_file_as_base64(&self, path: &str) -> Result<String, BridgeError>;

    /// Fast synchronous conversion of a path into a URI the display can load.
    /// May fail when the environment does not support direct file access.
    fn convert_path_to_display_uri(&self, path: &str) -> Result<String, BridgeError>;

    /// Try to load a display URI through the image decoder
    async fn load_display_uri(&self, uri: &str) -> Result<(), BridgeError>;
}
