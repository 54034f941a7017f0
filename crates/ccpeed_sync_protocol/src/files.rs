//! Local file list resolution.

use crate::error::{ManifestError, ManifestResult};
use crate::manifest::{validate_entry, Manifest};
use crate::resources::{file_resource, BOOT_SCRIPT};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Network address of a device, as given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceAddress(String);

impl DeviceAddress {
    /// Wraps an address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the per-device boot script in the source directory.
    ///
    /// Every `:` becomes `_`, then `.lua` is appended:
    /// `fdbf:1afc::964d` maps to `fdbf_1afc__964d.lua`.
    pub fn script_name(&self) -> String {
        format!("{}.lua", self.0.replace(':', "_"))
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceAddress {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// One file to be placed on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Local file name, as listed in the manifest.
    pub name: String,
    /// Where the content is read from.
    pub source: PathBuf,
    /// Name of the file on the device.
    pub remote: String,
}

impl FileEntry {
    /// Device resource path this entry is written to.
    pub fn resource_path(&self) -> String {
        file_resource(&self.remote)
    }
}

/// Ordered files for one device.
///
/// The first entry is always the device's own script, stored remotely as
/// `init.lua`. The rest follow the manifest: `common` first, then the
/// device class. Order is never changed after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileList {
    entries: Vec<FileEntry>,
}

impl LocalFileList {
    /// Builds the list for `address` and `device_class` from a manifest.
    pub fn build(
        manifest: &Manifest,
        device_class: &str,
        address: &DeviceAddress,
        source_dir: &Path,
    ) -> ManifestResult<Self> {
        let class_files = manifest.class_files(device_class)?;

        let script = address.script_name();
        validate_entry(&script)?;
        if script.contains(['/', '\\']) {
            return Err(ManifestError::InvalidEntry {
                entry: script,
                reason: "device address must not contain path separators",
            });
        }

        let mut entries = Vec::with_capacity(1 + manifest.common.len() + class_files.len());
        entries.push(FileEntry {
            source: source_dir.join(&script),
            name: script,
            remote: BOOT_SCRIPT.to_string(),
        });
        entries.extend(
            manifest
                .common
                .iter()
                .chain(class_files)
                .map(|name| FileEntry {
                    name: name.clone(),
                    source: source_dir.join(name),
                    remote: name.clone(),
                }),
        );

        Ok(Self { entries })
    }

    /// The boot script entry.
    pub fn boot_script(&self) -> &FileEntry {
        &self.entries[0]
    }

    /// All entries in upload order.
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Iterates entries in upload order.
    pub fn iter(&self) -> std::slice::Iter<'_, FileEntry> {
        self.entries.iter()
    }

    /// Number of entries, boot script included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries whose source path does not exist.
    pub fn missing_sources(&self) -> Vec<&FileEntry> {
        self.entries
            .iter()
            .filter(|entry| !entry.source.is_file())
            .collect()
    }
}

impl<'a> IntoIterator for &'a LocalFileList {
    type Item = &'a FileEntry;
    type IntoIter = std::slice::Iter<'a, FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Loads the manifest and resolves the file list for one device.
///
/// File contents are not read here. Missing sources are only logged; the
/// sync engine fails when it reaches them.
pub fn resolve(
    manifest_path: &Path,
    device_class: &str,
    address: &DeviceAddress,
    source_dir: &Path,
) -> ManifestResult<LocalFileList> {
    let manifest = Manifest::load(manifest_path)?;
    let list = LocalFileList::build(&manifest, device_class, address, source_dir)?;

    for entry in list.missing_sources() {
        warn!(file = %entry.name, path = ?entry.source, "source file not found");
    }
    debug!(
        device = %address,
        class = device_class,
        files = list.len(),
        "resolved file list"
    );

    Ok(list)
}
