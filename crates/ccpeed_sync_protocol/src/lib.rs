//! # ccpeed Sync Protocol
//!
//! Data model of the device file sync.
//!
//! This crate provides:
//! - `Fingerprint` content digests, compared against device etags
//! - `RemoteFileTable` decoded from the device's `fs` listing
//! - `Manifest` and `LocalFileList` resolution for a device class
//! - Well-known device resource paths
//!
//! Nothing here talks to the network. The only I/O is reading the manifest
//! and stating source files during resolution.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod files;
mod fingerprint;
mod listing;
mod manifest;
mod resources;

pub use error::{ListingError, ManifestError, ManifestResult};
pub use files::{resolve, DeviceAddress, FileEntry, LocalFileList};
pub use fingerprint::{Fingerprint, FINGERPRINT_LEN};
pub use listing::RemoteFileTable;
pub use manifest::{Manifest, MANIFEST_FILE};
pub use resources::{file_resource, BOOT_SCRIPT, FS_RESOURCE, RESTART_RESOURCE};
