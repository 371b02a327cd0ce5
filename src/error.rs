//! Typed failures that are absorbed into data or declined results.
//! Store failures travel as [`anyhow::Error`] instead.

use thiserror::Error;

use crate::ImageId;

/// Why a file could not be digested. Recorded as a validation error, never fatal to a run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChecksumFailure {
    #[error("file not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("read failed: {0}")]
    Io(String),
}

impl From<std::io::Error> for ChecksumFailure {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => ChecksumFailure::NotFound,
            std::io::ErrorKind::PermissionDenied => ChecksumFailure::PermissionDenied,
            _ => ChecksumFailure::Io(e.to_string()),
        }
    }
}

/// A request refused before anything was written.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Declined {
    #[error("a {0} run is already active")]
    AlreadyRunning(&'static str),
    #[error("image {0} has no new checksum to accept; only checksum mismatches can be accepted")]
    NoNewDigest(ImageId),
    #[error("catalog has no validation tables")]
    NotInitialized,
}
