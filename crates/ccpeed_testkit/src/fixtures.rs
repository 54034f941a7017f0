//! Script directory fixtures.
//!
//! A [`ScriptDir`] is a temporary source directory holding a manifest and
//! the scripts it names, removed when dropped.

use ccpeed_sync_protocol::{DeviceAddress, Manifest, MANIFEST_FILE};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Device address used by the standard fixture.
pub const TEST_DEVICE: &str = "fd00:1::2";

/// Device class used by the standard fixture.
pub const TEST_CLASS: &str = "dali_bridge";

/// A temporary script source directory.
pub struct ScriptDir {
    dir: TempDir,
}

impl ScriptDir {
    /// Creates an empty directory with no manifest.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Creates a directory with a manifest built from `common` and
    /// `classes`. No scripts are written.
    pub fn with_manifest(common: &[&str], classes: &[(&str, &[&str])]) -> Self {
        let scripts = Self::new();
        let manifest = Manifest {
            common: common.iter().map(|s| s.to_string()).collect(),
            device_classes: classes
                .iter()
                .map(|(class, files)| {
                    (
                        class.to_string(),
                        files.iter().map(|s| s.to_string()).collect(),
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        };
        scripts.write_manifest(&manifest);
        scripts
    }

    /// The standard layout.
    ///
    /// `common = [a.lua, b.lua]`, `dali_bridge = [c.lua]`, every script
    /// present, plus the boot script for [`TEST_DEVICE`].
    pub fn standard() -> Self {
        let scripts = Self::with_manifest(&["a.lua", "b.lua"], &[(TEST_CLASS, &["c.lua"])]);
        scripts.write_device_script(&DeviceAddress::new(TEST_DEVICE), "-- boot\nrequire 'a'\n");
        scripts.write("a.lua", "-- a\nreturn {}\n");
        scripts.write("b.lua", "-- b\nreturn {}\n");
        scripts.write("c.lua", "-- c\nreturn {}\n");
        scripts
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Manifest path.
    pub fn manifest_path(&self) -> PathBuf {
        self.path().join(MANIFEST_FILE)
    }

    /// Writes a manifest.
    pub fn write_manifest(&self, manifest: &Manifest) {
        let document = serde_yaml::to_string(manifest).expect("Failed to serialize manifest");
        self.write_raw_manifest(&document);
    }

    /// Writes arbitrary text as the manifest.
    pub fn write_raw_manifest(&self, document: &str) {
        std::fs::write(self.manifest_path(), document).expect("Failed to write manifest");
    }

    /// Writes a script, creating parent directories. Returns its path.
    pub fn write(&self, name: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create script directory");
        }
        std::fs::write(&path, content).expect("Failed to write script");
        path
    }

    /// Writes the boot script for `address`.
    pub fn write_device_script(
        &self,
        address: &DeviceAddress,
        content: impl AsRef<[u8]>,
    ) -> PathBuf {
        self.write(&address.script_name(), content)
    }

    /// Reads a script.
    pub fn read(&self, name: &str) -> Vec<u8> {
        std::fs::read(self.path().join(name)).expect("Failed to read script")
    }

    /// Deletes a script.
    pub fn remove(&self, name: &str) {
        std::fs::remove_file(self.path().join(name)).expect("Failed to remove script");
    }
}

impl Default for ScriptDir {
    fn default() -> Self {
        Self::new()
    }
}
