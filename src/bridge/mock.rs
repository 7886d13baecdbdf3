//! Scripted host bridge for unit tests.
//!
//! Every call is counted. The probe decode can be made slow or failing,
//! conversions and base64 reads can be made to fail, and bulk transfers
//! return a scripted result, optionally held back by a gate.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Semaphore;

use super::HostBridge;
use crate::error::BridgeError;
use crate::state::data::{ImageMetadata, ImageRecord, ScanResult, TransferMode, TransferResult};

#[derive(Default)]
pub struct MockBridge {
    pub decode_delay: Mutex<Duration>,
    pub decode_fails: AtomicBool,
    pub conversion_fails: AtomicBool,
    pub base64_fails: AtomicBool,
    pub create_directory_fails: AtomicBool,
    /// Returned by both bulk calls; None means "everything succeeded"
    pub transfer_response: Mutex<Option<Result<TransferResult, BridgeError>>>,
    /// When set, bulk calls wait for a permit before answering
    pub transfer_gate: Option<Semaphore>,

    pub decode_calls: AtomicUsize,
    pub conversion_calls: AtomicUsize,
    pub base64_calls: AtomicUsize,
    pub transfer_calls: AtomicUsize,
    pub create_directory_calls: AtomicUsize,
    pub last_transfer: Mutex<Option<(TransferMode, Vec<String>, String)>>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk calls block until `release_transfer` is called
    pub fn gated() -> Self {
        Self {
            transfer_gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    pub fn release_transfer(&self) {
        if let Some(gate) = &self.transfer_gate {
            gate.add_permits(1);
        }
    }

    pub fn set_decode_delay(&self, delay: Duration) {
        *self.decode_delay.lock().unwrap() = delay;
    }

    pub fn respond_with(&self, response: Result<TransferResult, BridgeError>) {
        *self.transfer_response.lock().unwrap() = Some(response);
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    async fn transfer(
        &self,
        mode: TransferMode,
        files: &[ImageRecord],
        target: &str,
    ) -> Result<TransferResult, BridgeError> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_transfer.lock().unwrap() = Some((
            mode,
            files.iter().map(|f| f.name.clone()).collect(),
            target.to_string(),
        ));

        if let Some(gate) = &self.transfer_gate {
            gate.acquire().await.unwrap().forget();
        }

        let scripted = self.transfer_response.lock().unwrap().clone();
        scripted.unwrap_or_else(|| {
            Ok(TransferResult {
                success_count: files.len(),
                failed_count: 0,
                errors: Vec::new(),
            })
        })
    }
}

#[async_trait]
impl HostBridge for MockBridge {
    async fn open_folder_dialog(&self, _title: &str) -> Result<Option<String>, BridgeError> {
        Ok(Some("/photos".to_string()))
    }

    async fn scan_folder(&self, _folder: &str) -> Result<ScanResult, BridgeError> {
        Ok(ScanResult {
            images: Vec::new(),
            total_count: 0,
            scan_time_ms: 0,
        })
    }

    async fn get_image_metadata(&self, path: &str) -> Result<ImageMetadata, BridgeError> {
        Err(BridgeError::Metadata {
            path: path.to_string(),
            reason: "not scripted".to_string(),
        })
    }

    async fn batch_copy_files(
        &self,
        files: &[ImageRecord],
        target: &str,
    ) -> Result<TransferResult, BridgeError> {
        self.transfer(TransferMode::Copy, files, target).await
    }

    async fn batch_move_files(
        &self,
        files: &[ImageRecord],
        target: &str,
    ) -> Result<TransferResult, BridgeError> {
        self.transfer(TransferMode::Move, files, target).await
    }

    async fn create_directory(&self, path: &str) -> Result<(), BridgeError> {
        self.create_directory_calls.fetch_add(1, Ordering::SeqCst);
        if self.create_directory_fails.load(Ordering::SeqCst) {
            return Err(BridgeError::CreateDirectory {
                path: path.to_string(),
                reason: "read-only filesystem".to_string(),
            });
        }
        Ok(())
    }

    async fn read_file_as_base64(&self, path: &str) -> Result<String, BridgeError> {
        self.base64_calls.fetch_add(1, Ordering::SeqCst);
        if self.base64_fails.load(Ordering::SeqCst) {
            return Err(BridgeError::ReadFile {
                path: path.to_string(),
                reason: "permission denied".to_string(),
            });
        }
        Ok("AQID".to_string())
    }

    fn convert_path_to_display_uri(&self, path: &str) -> Result<String, BridgeError> {
        self.conversion_calls.fetch_add(1, Ordering::SeqCst);
        if self.conversion_fails.load(Ordering::SeqCst) {
            return Err(BridgeError::Conversion {
                path: path.to_string(),
                reason: "sandboxed".to_string(),
            });
        }
        Ok(format!("file://{}", path))
    }

    async fn load_display_uri(&self, uri: &str) -> Result<(), BridgeError> {
        self.decode_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.decode_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.decode_fails.load(Ordering::SeqCst) {
            return Err(BridgeError::Decode {
                uri: uri.to_string(),
                reason: "blocked by sandbox".to_string(),
            });
        }
        Ok(())
    }
}
