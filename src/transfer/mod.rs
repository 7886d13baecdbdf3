//! Batch transfer of marked images
//!
//! One bulk copy/move job at a time. A job is validated and claimed
//! synchronously from the session ([`BatchTransferOrchestrator::begin`]),
//! then run asynchronously against the host bridge
//! ([`PendingTransfer::run`]). The in-flight claim is released when the
//! pending job is dropped, whether it completed, failed or was abandoned.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::bridge::HostBridge;
use crate::error::TransferError;
use crate::state::data::{ImageRecord, TransferMode, TransferResult};
use crate::state::session::SessionStore;

/// Why a transfer request was refused before any bridge call.
/// Not an error: the request is simply ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferRejection {
    NoMarkedImages,
    EmptyTarget,
    AlreadyRunning,
}

impl fmt::Display for TransferRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferRejection::NoMarkedImages => write!(f, "No images are marked"),
            TransferRejection::EmptyTarget => write!(f, "No target folder selected"),
            TransferRejection::AlreadyRunning => write!(f, "A transfer is already running"),
        }
    }
}

/// Result of [`BatchTransferOrchestrator::start_transfer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed(TransferResult),
    Rejected(TransferRejection),
}

/// The work submitted to the bridge. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    target_path: String,
    mode: TransferMode,
    items: Vec<ImageRecord>,
}

impl TransferJob {
    /// None when there is nothing to transfer or nowhere to put it
    pub fn new(target_path: &str, mode: TransferMode, items: Vec<ImageRecord>) -> Option<Self> {
        let target_path = target_path.trim();
        if target_path.is_empty() || items.is_empty() {
            return None;
        }
        Some(Self {
            target_path: target_path.to_string(),
            mode,
            items,
        })
    }

    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    pub fn mode(&self) -> TransferMode {
        self.mode
    }

    pub fn items(&self) -> &[ImageRecord] {
        &self.items
    }
}

/// Releases the in-flight claim on drop
#[derive(Debug)]
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives bulk copy/move jobs and enforces that only one runs at a time.
#[derive(Clone)]
pub struct BatchTransferOrchestrator {
    bridge: Arc<dyn HostBridge>,
    in_flight: Arc<AtomicBool>,
    progress: Arc<AtomicU8>,
    create_target: bool,
}

impl BatchTransferOrchestrator {
    pub fn new(bridge: Arc<dyn HostBridge>, create_target: bool) -> Self {
        Self {
            bridge,
            in_flight: Arc::new(AtomicBool::new(false)),
            progress: Arc::new(AtomicU8::new(0)),
            create_target,
        }
    }

    /// Validate the request and claim the single in-flight slot.
    ///
    /// Marked images are collected in ascending index order. Nothing is sent
    /// to the bridge until the returned job is run.
    pub fn begin(
        &self,
        session: &SessionStore,
        target_path: &str,
        mode: TransferMode,
    ) -> Result<PendingTransfer, TransferRejection> {
        if session.marked_count() == 0 {
            return Err(TransferRejection::NoMarkedImages);
        }
        let job = TransferJob::new(target_path, mode, session.marked_images())
            .ok_or(TransferRejection::EmptyTarget)?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log::warn!("Transfer rejected: another job is still running");
            return Err(TransferRejection::AlreadyRunning);
        }
        self.progress.store(0, Ordering::SeqCst);

        Ok(PendingTransfer {
            job,
            bridge: Arc::clone(&self.bridge),
            progress: Arc::clone(&self.progress),
            create_target: self.create_target,
            _guard: InFlightGuard(Arc::clone(&self.in_flight)),
        })
    }

    /// Validate, claim and run a transfer in one call.
    pub async fn start_transfer(
        &self,
        session: &SessionStore,
        target_path: &str,
        mode: TransferMode,
    ) -> Result<TransferOutcome, TransferError> {
        match self.begin(session, target_path, mode) {
            Ok(pending) => pending.run().await.map(TransferOutcome::Completed),
            Err(rejection) => {
                log::info!("Transfer request ignored: {}", rejection);
                Ok(TransferOutcome::Rejected(rejection))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Coarse progress in percent: 0 until the bulk call answers, then 100
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }
}

/// A validated job holding the in-flight claim
pub struct PendingTransfer {
    job: TransferJob,
    bridge: Arc<dyn HostBridge>,
    progress: Arc<AtomicU8>,
    create_target: bool,
    _guard: InFlightGuard,
}

impl PendingTransfer {
    pub fn job(&self) -> &TransferJob {
        &self.job
    }

    /// Send the job to the bridge and wait for the aggregate result.
    ///
    /// Items that fail individually are reported in the result; only a
    /// failed bridge call or an inconsistent answer is an error. Completed
    /// items are never rolled back.
    pub async fn run(self) -> Result<TransferResult, TransferError> {
        let job = &self.job;
        log::info!(
            "Starting bulk {} of {} images to {}",
            job.mode,
            job.items.len(),
            job.target_path
        );

        if self.create_target {
            self.bridge.create_directory(&job.target_path).await.map_err(|e| {
                log::error!("Transfer aborted: {}", e);
                e
            })?;
        }

        let response = match job.mode {
            TransferMode::Copy => self.bridge.batch_copy_files(&job.items, &job.target_path).await,
            TransferMode::Move => self.bridge.batch_move_files(&job.items, &job.target_path).await,
        };
        let result = response.map_err(|e| {
            log::error!("Bulk {} failed: {}", job.mode, e);
            e
        })?;

        let submitted = job.items.len();
        if result.total() != submitted {
            log::error!(
                "Host accounted for {} of {} submitted items",
                result.total(),
                submitted
            );
            return Err(TransferError::InconsistentResult {
                submitted,
                success: result.success_count,
                failed: result.failed_count,
            });
        }

        self.progress.store(100, Ordering::SeqCst);
        log::info!(
            "Bulk {} finished: {} succeeded, {} failed",
            job.mode,
            result.success_count,
            result.failed_count
        );
        for error in &result.errors {
            log::warn!("{}", error);
        }

        Ok(result)
    }
}

impl fmt::Debug for PendingTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTransfer")
            .field("job", &self.job)
            .field("create_target", &self.create_target)
            .finish()
    }
}

impl fmt::Debug for BatchTransferOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchTransferOrchestrator")
            .field("in_flight", &self.is_running())
            .field("progress", &self.progress())
            .finish()
    }
}
