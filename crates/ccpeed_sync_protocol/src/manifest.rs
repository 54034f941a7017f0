//! Declarative file-list manifest.

use crate::error::{ManifestError, ManifestResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path};

/// File name of the manifest inside a source directory.
pub const MANIFEST_FILE: &str = "manifest.yml";

/// Which files go onto which device class.
///
/// ```yaml
/// common:
///   - util.lua
/// device_classes:
///   dali_bridge:
///     - dali.lua
///   switch:
///     - buttons.lua
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Files installed on every device, in order.
    pub common: Vec<String>,
    /// Files per device class, in order.
    pub device_classes: BTreeMap<String, Vec<String>>,
}

impl Manifest {
    /// Parses and validates a manifest document.
    pub fn from_yaml(document: &str) -> ManifestResult<Self> {
        let manifest: Manifest = serde_yaml::from_str(document)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Reads a manifest from disk.
    pub fn load(path: &Path) -> ManifestResult<Self> {
        let document = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&document)
    }

    /// Files listed for a device class.
    pub fn class_files(&self, device_class: &str) -> ManifestResult<&[String]> {
        self.device_classes
            .get(device_class)
            .map(Vec::as_slice)
            .ok_or_else(|| ManifestError::UnknownClass {
                class: device_class.to_string(),
                available: self.device_classes.keys().cloned().collect(),
            })
    }

    /// Every entry must be usable both as a relative local path and as a
    /// device file name.
    fn validate(&self) -> ManifestResult<()> {
        let entries = self
            .common
            .iter()
            .chain(self.device_classes.values().flatten());
        for entry in entries {
            validate_entry(entry)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_entry(entry: &str) -> ManifestResult<()> {
    let invalid = |reason| ManifestError::InvalidEntry {
        entry: entry.to_string(),
        reason,
    };

    if entry.trim().is_empty() {
        return Err(invalid("empty file name"));
    }
    let path = Path::new(entry);
    if path.is_absolute() || entry.starts_with('/') {
        return Err(invalid("absolute paths are not allowed"));
    }
    if path
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(invalid("parent directory references are not allowed"));
    }
    Ok(())
}
