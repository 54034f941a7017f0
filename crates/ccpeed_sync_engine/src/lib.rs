//! # ccpeed Sync Engine
//!
//! Brings the Lua scripts on a CoAP device in line with a local source
//! directory.
//!
//! A session:
//! 1. resolves the ordered file list from the manifest (device script
//!    first, uploaded as `init.lua`)
//! 2. reads the device file table once
//! 3. uploads every file whose MD5 differs from the device etag
//! 4. restarts the device if anything was uploaded
//!
//! The first failure ends the session. Files already uploaded stay on the
//! device, and the restart is skipped.
//!
//! The device is reached through [`DeviceTransport`], which checks statuses
//! and decodes bodies on top of a [`DeviceClient`]. [`CoapClient`] speaks
//! CoAP over UDP; [`MemoryDevice`] and [`MockClient`] stand in for a device
//! in tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod coap;
mod config;
mod device;
mod engine;
mod error;
mod reboot;
mod remote;
mod transport;

pub use coap::CoapClient;
pub use config::{
    CoapConfig, SessionConfig, DEFAULT_DEVICE_CLASS, DEFAULT_PORT, DEFAULT_SOURCE_DIR,
};
pub use device::MemoryDevice;
pub use engine::{
    FileOutcome, FileStatus, NoProgress, ProgressSink, SessionPhase, SessionReport, SyncEngine,
    SyncReport,
};
pub use error::{ErrorKind, SyncError, SyncResult};
pub use reboot::maybe_reboot;
pub use remote::fetch_remote_table;
pub use transport::{
    DeviceClient, DeviceRequest, DeviceResponse, DeviceTransport, Method, MockClient,
    ResponseBody,
};
