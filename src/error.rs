//! Error types for every failure the application can surface.
//!
//! Partial transfer failures are deliberately absent: they are data
//! (`TransferResult::errors`), not errors.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::state::data::TransferMode;

/// A host bridge call failed. The caller may retry the same operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("failed to scan {path}: {reason}")]
    Scan { path: String, reason: String },

    #[error("failed to read metadata of {path}: {reason}")]
    Metadata { path: String, reason: String },

    #[error("bulk {mode} to {target} failed: {reason}")]
    Transfer {
        mode: TransferMode,
        target: String,
        reason: String,
    },

    #[error("failed to create directory {path}: {reason}")]
    CreateDirectory { path: String, reason: String },

    #[error("failed to read {path}: {reason}")]
    ReadFile { path: String, reason: String },

    #[error("cannot convert {path} to a display URI: {reason}")]
    Conversion { path: String, reason: String },

    #[error("failed to load {uri}: {reason}")]
    Decode { uri: String, reason: String },

    #[error("background task failed: {0}")]
    Task(String),
}

/// Why the direct display path was rejected.
/// Never surfaced to the user; it selects the base64 fallback.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("capability probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("capability probe could not build a URI: {0}")]
    Conversion(BridgeError),

    #[error("capability probe could not decode the URI: {0}")]
    Decode(BridgeError),
}

/// Neither display strategy produced a source for the image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("could not resolve a display source for {path}: {reason}")]
    ResolutionFailure { path: String, reason: BridgeError },
}

/// A bulk transfer that could not complete as a job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("host reported {success} succeeded and {failed} failed for {submitted} submitted items")]
    InconsistentResult {
        submitted: usize,
        success: usize,
        failed: usize,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),

    #[error("could not determine the user configuration directory")]
    NoConfigDir,
}
