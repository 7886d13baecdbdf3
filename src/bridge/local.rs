//! In-process host bridge backed by the local filesystem
//!
//! Scans with walkdir, decodes headers with the `image` crate and moves
//! bytes with tokio::fs. CPU-heavy or blocking work runs on the blocking
//! pool so the event loop stays responsive.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::ImageDecoder;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};
use tokio::{fs, task};
use uuid::Uuid;
use walkdir::WalkDir;

use super::HostBridge;
use crate::error::BridgeError;
use crate::state::data::{
    is_supported_extension, ImageMetadata, ImageRecord, ScanResult, TransferMode, TransferResult,
};
use crate::uri;

/// OS error code for a rename across filesystems
#[cfg(unix)]
const CROSS_DEVICE_ERROR: i32 = 18; // EXDEV
#[cfg(windows)]
const CROSS_DEVICE_ERROR: i32 = 17; // ERROR_NOT_SAME_DEVICE

/// Numbered alternatives tried before a name collision becomes a failure
const MAX_RENAME_ATTEMPTS: u32 = 999;

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBridge;

impl LocalBridge {
    pub fn new() -> Self {
        Self
    }

    async fn transfer_each(
        &self,
        files: &[ImageRecord],
        target: &str,
        mode: TransferMode,
    ) -> Result<TransferResult, BridgeError> {
        if target.trim().is_empty() {
            return Err(BridgeError::Transfer {
                mode,
                target: target.to_string(),
                reason: "target path is empty".to_string(),
            });
        }

        let mut result = TransferResult::default();
        for file in files {
            let destination = match free_destination(Path::new(target), &file.name).await {
                Ok(destination) => destination,
                Err(e) => {
                    result.failed_count += 1;
                    result
                        .errors
                        .push(format!("{} {} failed: {}", mode, file.path, e));
                    continue;
                }
            };
            let outcome = match mode {
                TransferMode::Copy => copy_file(Path::new(&file.path), &destination).await,
                TransferMode::Move => move_file(Path::new(&file.path), &destination).await,
            };

            match outcome {
                Ok(()) => result.success_count += 1,
                Err(e) => {
                    result.failed_count += 1;
                    result.errors.push(format!(
                        "{} {} to {} failed: {}",
                        mode,
                        file.path,
                        destination.display(),
                        e
                    ));
                }
            }
        }

        Ok(result)
    }
}

#[async_trait]
impl HostBridge for LocalBridge {
    async fn open_folder_dialog(&self, title: &str) -> Result<Option<String>, BridgeError> {
        let folder = rfd::AsyncFileDialog::new()
            .set_title(title)
            .pick_folder()
            .await;

        Ok(folder.map(|handle| handle.path().to_string_lossy().to_string()))
    }

    async fn scan_folder(&self, folder: &str) -> Result<ScanResult, BridgeError> {
        let folder = folder.to_string();
        task::spawn_blocking(move || scan_folder_blocking(&folder))
            .await
            .map_err(|e| BridgeError::Task(format!("Task join error: {}", e)))?
    }

    async fn get_image_metadata(&self, path: &str) -> Result<ImageMetadata, BridgeError> {
        let path = path.to_string();
        task::spawn_blocking(move || {
            read_metadata_blocking(&path).map_err(|reason| BridgeError::Metadata {
                path: path.clone(),
                reason,
            })
        })
        .await
        .map_err(|e| BridgeError::Task(format!("Task join error: {}", e)))?
    }

    async fn batch_copy_files(
        &self,
        files: &[ImageRecord],
        target: &str,
    ) -> Result<TransferResult, BridgeError> {
        self.transfer_each(files, target, TransferMode::Copy).await
    }

    async fn batch_move_files(
        &self,
        files: &[ImageRecord],
        target: &str,
    ) -> Result<TransferResult, BridgeError> {
        self.transfer_each(files, target, TransferMode::Move).await
    }

    async fn create_directory(&self, path: &str) -> Result<(), BridgeError> {
        if path.trim().is_empty() {
            return Err(BridgeError::CreateDirectory {
                path: path.to_string(),
                reason: "path is empty".to_string(),
            });
        }

        fs::create_dir_all(path)
            .await
            .map_err(|e| BridgeError::CreateDirectory {
                path: path.to_string(),
                reason: e.to_string(),
            })
    }

    async fn read_file_as_base64(&self, path: &str) -> Result<String, BridgeError> {
        let bytes = fs::read(path).await.map_err(|e| BridgeError::ReadFile {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok(BASE64.encode(bytes))
    }

    fn convert_path_to_display_uri(&self, path: &str) -> Result<String, BridgeError> {
        uri::file_uri_from_path(Path::new(path)).ok_or_else(|| BridgeError::Conversion {
            path: path.to_string(),
            reason: "path is not absolute UTF-8".to_string(),
        })
    }

    async fn load_display_uri(&self, display_uri: &str) -> Result<(), BridgeError> {
        let decode_error = |reason: String| BridgeError::Decode {
            uri: display_uri.to_string(),
            reason,
        };

        let path = uri::path_from_file_uri(display_uri)
            .ok_or_else(|| decode_error("not a file URI".to_string()))?;

        // Only the header is decoded; enough to prove the file is reachable
        // and in a format the decoder understands.
        task::spawn_blocking(move || -> Result<(u32, u32), String> {
            image::ImageReader::open(&path)
                .map_err(|e| e.to_string())?
                .with_guessed_format()
                .map_err(|e| e.to_string())?
                .into_dimensions()
                .map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| decode_error(format!("Task join error: {}", e)))?
        .map(|_| ())
        .map_err(decode_error)
    }
}

/// Walk `folder` recursively and collect every supported image, sorted by name
fn scan_folder_blocking(folder: &str) -> Result<ScanResult, BridgeError> {
    let start = Instant::now();
    let root = Path::new(folder);

    if !root.is_dir() {
        return Err(BridgeError::Scan {
            path: folder.to_string(),
            reason: "folder does not exist".to_string(),
        });
    }

    log::info!("Scanning folder: {}", root.display());

    let mut images = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let supported = entry
            .path()
            .extension()
            .map(|ext| is_supported_extension(&ext.to_string_lossy()))
            .unwrap_or(false);
        if !supported {
            continue;
        }

        match image_record(entry.path()) {
            Ok(record) => images.push(record),
            Err(e) => log::warn!("Skipping {}: {}", entry.path().display(), e),
        }
    }

    images.sort_by(|a, b| a.name.cmp(&b.name));

    let scan_time_ms = start.elapsed().as_millis() as u64;
    log::info!("Scan found {} images in {} ms", images.len(), scan_time_ms);

    Ok(ScanResult {
        total_count: images.len(),
        images,
        scan_time_ms,
    })
}

/// Build the record for one file. The id is a name-based UUID of the path,
/// so rescanning the same folder yields the same ids.
fn image_record(path: &Path) -> io::Result<ImageRecord> {
    let metadata = std::fs::metadata(path)?;
    let modified = metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);

    let path_str = path.to_string_lossy().to_string();
    let name = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let extension = path
        .extension()
        .unwrap_or_default()
        .to_string_lossy()
        .to_lowercase();

    Ok(ImageRecord {
        id: Uuid::new_v5(&Uuid::NAMESPACE_URL, path_str.as_bytes()).to_string(),
        name,
        path: path_str,
        size: metadata.len(),
        modified,
        extension,
    })
}

fn read_metadata_blocking(path: &str) -> Result<ImageMetadata, String> {
    let reader = image::ImageReader::open(path)
        .map_err(|e| e.to_string())?
        .with_guessed_format()
        .map_err(|e| e.to_string())?;

    let format = reader
        .format()
        .map(|format| format!("{:?}", format))
        .unwrap_or_else(|| "Unknown".to_string());

    // Header only; pixel data is left to the display
    let decoder = reader.into_decoder().map_err(|e| e.to_string())?;
    let (width, height) = decoder.dimensions();
    let color_type = format!("{:?}", decoder.color_type());
    let file_size = std::fs::metadata(path).map_err(|e| e.to_string())?.len();

    Ok(ImageMetadata {
        width,
        height,
        format,
        color_type,
        file_size,
    })
}

/// `target/name`, or `target/stem (n).ext` when that name is taken.
/// Scans are recursive, so two marked files may share a name.
async fn free_destination(target: &Path, name: &str) -> io::Result<PathBuf> {
    let candidate = target.join(name);
    if !fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let file_name = Path::new(name);
    let stem = file_name
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    let extension = file_name
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();

    for n in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = target.join(format!("{} ({}){}", stem, n, extension));
        if !fs::try_exists(&candidate).await? {
            log::info!("{} exists in {}, using {}", name, target.display(), candidate.display());
            return Ok(candidate);
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for {} in {}", name, target.display()),
    ))
}

async fn copy_file(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::copy(source, target).await?;
    Ok(())
}

async fn move_file(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }

    match fs::rename(source, target).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(CROSS_DEVICE_ERROR) => {
            log::debug!(
                "Rename across devices, copying instead: {}",
                source.display()
            );
            fs::copy(source, target).await?;
            fs::remove_file(source).await
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    /// Write a real 4x3 PNG so the decoder has something to read
    fn write_png(path: &Path) {
        let img = image::RgbImage::from_pixel(4, 3, image::Rgb([200, 10, 10]));
        img.save(path).unwrap();
    }

    fn write_bytes(path: &Path, bytes: &[u8]) {
        let mut file = File::create(path).unwrap();
        file.write_all(bytes).unwrap();
    }

    #[tokio::test]
    async fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write_png(&dir.path().join("b.png"));
        write_bytes(&dir.path().join("a.JPG"), b"not really a jpeg");
        write_bytes(&dir.path().join("nested").join("c.webp"), b"x");
        write_bytes(&dir.path().join("notes.txt"), b"skip me");

        let bridge = LocalBridge::new();
        let result = bridge
            .scan_folder(dir.path().to_str().unwrap())
            .await
            .unwrap();

        let names: Vec<_> = result.images.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.webp"]);
        assert_eq!(result.total_count, 3);
        assert_eq!(result.images[0].extension, "jpg");
        assert_eq!(result.images[2].size, 1);
    }

    #[tokio::test]
    async fn test_scan_ids_are_stable_and_unique() {
        let dir = TempDir::new().unwrap();
        write_bytes(&dir.path().join("one.gif"), b"1");
        write_bytes(&dir.path().join("two.gif"), b"2");

        let bridge = LocalBridge::new();
        let folder = dir.path().to_str().unwrap();
        let first = bridge.scan_folder(folder).await.unwrap();
        let second = bridge.scan_folder(folder).await.unwrap();

        assert_ne!(first.images[0].id, first.images[1].id);
        assert_eq!(first.images[0].id, second.images[0].id);
    }

    #[tokio::test]
    async fn test_scan_missing_folder_fails() {
        let bridge = LocalBridge::new();
        let err = bridge.scan_folder("/definitely/not/here").await.unwrap_err();
        assert!(matches!(err, BridgeError::Scan { .. }));
    }

    #[tokio::test]
    async fn test_metadata_of_png() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("meta.png");
        write_png(&path);

        let bridge = LocalBridge::new();
        let metadata = bridge
            .get_image_metadata(path.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!((metadata.width, metadata.height), (4, 3));
        assert_eq!(metadata.format, "Png");
        assert_eq!(metadata.color_type, "Rgb8");
    }

    #[tokio::test]
    async fn test_display_uri_loads_real_image() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("with space.png");
        write_png(&path);

        let bridge = LocalBridge::new();
        let display_uri = bridge
            .convert_path_to_display_uri(path.to_str().unwrap())
            .unwrap();
        assert!(display_uri.starts_with("file://"));
        bridge.load_display_uri(&display_uri).await.unwrap();
    }

    #[tokio::test]
    async fn test_display_uri_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        write_bytes(&path, b"definitely not a png");

        let bridge = LocalBridge::new();
        let display_uri = bridge
            .convert_path_to_display_uri(path.to_str().unwrap())
            .unwrap();
        let err = bridge.load_display_uri(&display_uri).await.unwrap_err();
        assert!(matches!(err, BridgeError::Decode { .. }));
        assert!(bridge.convert_path_to_display_uri("relative.png").is_err());
    }

    #[tokio::test]
    async fn test_copy_reports_per_item_failures() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.png");
        write_png(&source);
        let target = dir.path().join("out").join("deeper");

        let good = ImageRecord {
            id: "1".to_string(),
            name: "src.png".to_string(),
            path: source.to_string_lossy().to_string(),
            size: 0,
            modified: 0,
            extension: "png".to_string(),
        };
        let missing = ImageRecord {
            id: "2".to_string(),
            name: "gone.png".to_string(),
            path: dir.path().join("gone.png").to_string_lossy().to_string(),
            ..good.clone()
        };

        let bridge = LocalBridge::new();
        let result = bridge
            .batch_copy_files(&[good, missing], target.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(result.failed_count, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("gone.png"));
        assert!(target.join("src.png").exists());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_move_removes_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("moving.gif");
        write_bytes(&source, b"gif");
        let target = dir.path().join("dest");

        let record = ImageRecord {
            id: "m".to_string(),
            name: "moving.gif".to_string(),
            path: source.to_string_lossy().to_string(),
            size: 3,
            modified: 0,
            extension: "gif".to_string(),
        };

        let bridge = LocalBridge::new();
        let result = bridge
            .batch_move_files(&[record], target.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(result, TransferResult { success_count: 1, failed_count: 0, errors: vec![] });
        assert!(!source.exists());
        assert!(target.join("moving.gif").exists());
    }

    fn record_at(path: &Path) -> ImageRecord {
        ImageRecord {
            id: path.to_string_lossy().to_string(),
            name: path.file_name().unwrap().to_string_lossy().to_string(),
            path: path.to_string_lossy().to_string(),
            size: 0,
            modified: 0,
            extension: "jpg".to_string(),
        }
    }

    #[tokio::test]
    async fn test_move_same_name_from_subfolders_keeps_both() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();
        write_bytes(&dir.path().join("a").join("IMG.jpg"), b"first");
        write_bytes(&dir.path().join("b").join("IMG.jpg"), b"second");

        let bridge = LocalBridge::new();
        let scanned = bridge
            .scan_folder(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(scanned.images.len(), 2);

        let out = dir.path().join("out");
        let result = bridge
            .batch_move_files(&scanned.images, out.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(result.success_count, 2);
        assert_eq!(result.failed_count, 0);
        let mut contents = vec![
            std::fs::read(out.join("IMG.jpg")).unwrap(),
            std::fs::read(out.join("IMG (1).jpg")).unwrap(),
        ];
        contents.sort();
        assert_eq!(contents, vec![b"first".to_vec(), b"second".to_vec()]);
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 2);
    }

    #[tokio::test]
    async fn test_copy_does_not_overwrite_existing_target() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("shot.jpg");
        write_bytes(&source, b"new");
        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        write_bytes(&out.join("shot.jpg"), b"old");
        write_bytes(&out.join("shot (1).jpg"), b"older");

        let bridge = LocalBridge::new();
        let result = bridge
            .batch_copy_files(&[record_at(&source)], out.to_str().unwrap())
            .await
            .unwrap();

        assert_eq!(result.success_count, 1);
        assert_eq!(std::fs::read(out.join("shot.jpg")).unwrap(), b"old");
        assert_eq!(std::fs::read(out.join("shot (1).jpg")).unwrap(), b"older");
        assert_eq!(std::fs::read(out.join("shot (2).jpg")).unwrap(), b"new");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_metadata_rejects_garbage_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.png");
        write_bytes(&path, b"not an image at all");

        let bridge = LocalBridge::new();
        let err = bridge
            .get_image_metadata(path.to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Metadata { .. }));
    }

    #[tokio::test]
    async fn test_base64_read_and_directory_creation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tiny.bmp");
        write_bytes(&path, &[1, 2, 3]);

        let bridge = LocalBridge::new();
        let encoded = bridge.read_file_as_base64(path.to_str().unwrap()).await.unwrap();
        assert_eq!(encoded, "AQID");

        let created = dir.path().join("a").join("b");
        bridge.create_directory(created.to_str().unwrap()).await.unwrap();
        assert!(created.is_dir());
        assert!(bridge.create_directory("  ").await.is_err());
        assert!(bridge.read_file_as_base64("/no/such/file.png").await.is_err());
    }
}
