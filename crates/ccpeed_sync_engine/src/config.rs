//! Configuration for the CoAP client and for sync sessions.

use ccpeed_sync_protocol::MANIFEST_FILE;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default CoAP port.
pub const DEFAULT_PORT: u16 = 5683;

/// Device class used when none is given.
pub const DEFAULT_DEVICE_CLASS: &str = "dali_bridge";

/// Script directory used when none is given.
pub const DEFAULT_SOURCE_DIR: &str = "./scripts";

/// Transmission parameters for the CoAP client.
#[derive(Debug, Clone)]
pub struct CoapConfig {
    /// UDP port of the device.
    pub port: u16,
    /// Initial acknowledgement timeout before jitter.
    pub ack_timeout: Duration,
    /// Upper bound of the random factor applied to `ack_timeout`.
    pub ack_random_factor: f64,
    /// Retransmissions before an exchange times out.
    pub max_retransmit: u32,
    /// How long to wait for a separate response after an empty ACK.
    pub response_timeout: Duration,
    block_szx: u8,
}

impl CoapConfig {
    /// Creates a configuration with the protocol's default parameters.
    pub fn new() -> Self {
        Self {
            port: DEFAULT_PORT,
            ack_timeout: Duration::from_secs(2),
            ack_random_factor: 1.5,
            max_retransmit: 4,
            response_timeout: Duration::from_secs(60),
            block_szx: 6,
        }
    }

    /// Sets the device port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the acknowledgement timeout.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Sets the random factor. Values below 1.0 are raised to 1.0.
    pub fn with_ack_random_factor(mut self, factor: f64) -> Self {
        self.ack_random_factor = factor.max(1.0);
        self
    }

    /// Sets the retransmission count.
    pub fn with_max_retransmit(mut self, count: u32) -> Self {
        self.max_retransmit = count;
        self
    }

    /// Sets the separate response timeout.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Sets the preferred block size.
    ///
    /// The size is clamped to 16..=1024 and rounded down to a power of two.
    pub fn with_block_size(mut self, size: usize) -> Self {
        let size = size.clamp(16, 1024);
        self.block_szx = (usize::BITS - 1 - size.leading_zeros() - 4) as u8;
        self
    }

    /// Block size exponent used for block-wise transfers.
    pub fn block_szx(&self) -> u8 {
        self.block_szx
    }

    /// Block size in bytes.
    pub fn block_size(&self) -> usize {
        1 << (self.block_szx + 4)
    }

    /// Timeout for the first transmission of a message.
    ///
    /// A random point between `ack_timeout` and
    /// `ack_timeout * ack_random_factor`.
    pub fn initial_timeout(&self) -> Duration {
        let factor = if self.ack_random_factor > 1.0 {
            rand::thread_rng().gen_range(1.0..=self.ack_random_factor)
        } else {
            1.0
        };
        self.ack_timeout.mul_f64(factor)
    }

    /// Timeout for transmission `attempt` (0-indexed), given the initial one.
    pub fn retransmit_timeout(&self, initial: Duration, attempt: u32) -> Duration {
        initial.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX))
    }
}

impl Default for CoapConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What a session syncs and how.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Device class to resolve from the manifest.
    pub device_class: String,
    /// Directory holding the scripts and the manifest.
    pub source_dir: PathBuf,
    /// Manifest file name inside `source_dir`.
    pub manifest_file: String,
    /// Compare only; never upload or reboot.
    pub dry_run: bool,
}

impl SessionConfig {
    /// Creates a session configuration for a device class.
    pub fn new(device_class: impl Into<String>) -> Self {
        Self {
            device_class: device_class.into(),
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            manifest_file: MANIFEST_FILE.to_string(),
            dry_run: false,
        }
    }

    /// Sets the source directory.
    pub fn with_source_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.source_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sets the manifest file name.
    pub fn with_manifest_file(mut self, name: impl Into<String>) -> Self {
        self.manifest_file = name.into();
        self
    }

    /// Enables or disables dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Full path of the manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.source_dir.join(&self.manifest_file)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_CLASS)
    }
}
