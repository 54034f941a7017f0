//! Device resource paths.

/// File table resource (`GET` returns the listing).
pub const FS_RESOURCE: &str = "fs";

/// Restart resource (`POST` with an empty payload reboots the device).
pub const RESTART_RESOURCE: &str = "restart";

/// Remote name of the boot script.
pub const BOOT_SCRIPT: &str = "init.lua";

/// Resource path of a single remote file.
pub fn file_resource(remote_name: &str) -> String {
    format!("{}/{}", FS_RESOURCE, remote_name)
}
