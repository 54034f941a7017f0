//! Restarts the device after changes.

use crate::error::{SyncError, SyncResult};
use crate::transport::{DeviceClient, DeviceTransport, Method};
use ccpeed_sync_protocol::RESTART_RESOURCE;
use tracing::{debug, info};

/// Asks the device to restart if `changes` is non-zero.
///
/// Returns whether a restart was requested. A failed restart leaves the
/// uploaded files in place.
pub fn maybe_reboot<C: DeviceClient>(
    transport: &DeviceTransport<C>,
    changes: u32,
) -> SyncResult<bool> {
    if changes == 0 {
        debug!("device up to date, not restarting");
        return Ok(false);
    }

    info!(device = %transport.address(), changes, "restarting device");
    transport
        .request(RESTART_RESOURCE, Method::WriteCreate, Vec::new())
        .map_err(|source| SyncError::RebootFailed {
            changes,
            source: Box::new(source),
        })?;
    Ok(true)
}
