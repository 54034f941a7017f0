//! Error types for the sync engine.

use crate::transport::Method;
use ccpeed_coap::Code;
use ccpeed_sync_protocol::{ListingError, ManifestError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during a sync session.
///
/// Every error is fatal to the session that raised it.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The device answered with an unexpected status.
    #[error("{method} {path} returned {status}{}", body_suffix(.body))]
    Protocol {
        /// Request method.
        method: Method,
        /// Resource path.
        path: String,
        /// Status the device returned.
        status: Code,
        /// Response body, kept for diagnostics.
        body: Vec<u8>,
    },

    /// A response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A local file could not be read.
    #[error("failed to read {path:?}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest could not be loaded or resolved.
    #[error("manifest resolution failed")]
    Manifest(#[from] ManifestError),

    /// Network or socket failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Underlying socket error, if any.
        #[source]
        source: Option<std::io::Error>,
    },

    /// The device did not answer in time.
    #[error("no response for {path} after {attempts} attempt(s)")]
    Timeout {
        /// Resource path.
        path: String,
        /// Transmissions made.
        attempts: u32,
    },

    /// Syncing one file failed; the session stopped there.
    #[error("failed to sync {file} (remote {remote}) after {uploaded} upload(s)")]
    FileFailed {
        /// Local file name.
        file: String,
        /// Remote file name.
        remote: String,
        /// Files already uploaded in this session; they stay on the device.
        uploaded: u32,
        /// What went wrong.
        #[source]
        source: Box<SyncError>,
    },

    /// The restart request failed after files were uploaded.
    #[error("reboot failed after {changes} update(s)")]
    RebootFailed {
        /// Files uploaded in this session.
        changes: u32,
        /// What went wrong.
        #[source]
        source: Box<SyncError>,
    },
}

/// Broad classification of a session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unexpected status code from the device.
    Protocol,
    /// Malformed or unsupported response body.
    Decode,
    /// Local file or manifest unreadable.
    Io,
    /// Manifest malformed or device class unknown.
    Manifest,
    /// Socket failure or timeout.
    Transport,
}

impl SyncError {
    /// Creates a transport error without an underlying cause.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport error from a socket error.
    pub fn transport_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Classifies the error, looking through the per-file and reboot wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Protocol { .. } => ErrorKind::Protocol,
            SyncError::Decode(_) => ErrorKind::Decode,
            SyncError::Io { .. } => ErrorKind::Io,
            SyncError::Manifest(e) if e.is_io() => ErrorKind::Io,
            SyncError::Manifest(_) => ErrorKind::Manifest,
            SyncError::Transport { .. } | SyncError::Timeout { .. } => ErrorKind::Transport,
            SyncError::FileFailed { source, .. } | SyncError::RebootFailed { source, .. } => {
                source.kind()
            }
        }
    }

    /// Status code of the underlying protocol error, if that is the cause.
    pub fn status(&self) -> Option<Code> {
        match self {
            SyncError::Protocol { status, .. } => Some(*status),
            SyncError::FileFailed { source, .. } | SyncError::RebootFailed { source, .. } => {
                source.status()
            }
            _ => None,
        }
    }
}

impl From<ListingError> for SyncError {
    fn from(err: ListingError) -> Self {
        SyncError::Decode(err.to_string())
    }
}

fn body_suffix(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }
    match std::str::from_utf8(body) {
        Ok(text) => format!(": {}", text.trim()),
        Err(_) => format!(": {} bytes", body.len()),
    }
}
