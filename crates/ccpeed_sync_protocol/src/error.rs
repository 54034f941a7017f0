//! Error types for manifests and remote listings.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Errors raised while loading or resolving a manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest file could not be read.
    #[error("failed to read manifest {path:?}")]
    Io {
        /// Manifest path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not a valid document of the expected shape.
    #[error("malformed manifest")]
    Parse(#[from] serde_yaml::Error),

    /// The requested device class is not listed.
    #[error(
        "device class '{class}' not found in manifest (available: {})",
        .available.join(", ")
    )]
    UnknownClass {
        /// Requested class.
        class: String,
        /// Classes the manifest does define.
        available: Vec<String>,
    },

    /// A file entry cannot be used as a device file name.
    #[error("invalid manifest entry '{entry}': {reason}")]
    InvalidEntry {
        /// Offending entry.
        entry: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

impl ManifestError {
    /// Returns true if the manifest could not be read at all.
    pub fn is_io(&self) -> bool {
        matches!(self, ManifestError::Io { .. })
    }
}

/// Errors raised while decoding the device's file listing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    /// The listing body is not a map.
    #[error("file listing is not a map")]
    NotAMap,

    /// The `files` field is absent.
    #[error("file listing has no 'files' field")]
    MissingFiles,

    /// The `files` field is not a map.
    #[error("'files' field is not a map")]
    FilesNotAMap,

    /// A file name is not a text string.
    #[error("file name is not a text string")]
    InvalidName,

    /// An etag is not a 16-byte byte string.
    #[error("etag for '{name}' is not a 16-byte string")]
    InvalidEtag {
        /// File the etag belongs to.
        name: String,
    },
}
