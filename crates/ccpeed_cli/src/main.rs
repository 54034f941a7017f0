//! ccpeed sync CLI
//!
//! Pushes the Lua scripts for one device from a local source directory.
//!
//! ```text
//! ccpeed-sync fdbf:1afc:5480:1:30a3:bef2:6c55:fccd -c dali_bridge -s ./scripts
//! ```
//!
//! Exit codes: 0 on success (including nothing to do), 2 protocol error,
//! 3 undecodable response, 4 local I/O error, 5 manifest error,
//! 6 transport error or timeout, 1 anything else.

mod commands;

use ccpeed_sync_engine::{
    CoapConfig, ErrorKind, SessionConfig, SyncError, DEFAULT_DEVICE_CLASS, DEFAULT_PORT,
    DEFAULT_SOURCE_DIR,
};
use ccpeed_sync_protocol::DeviceAddress;
use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Sync Lua scripts to a CoAP device.
#[derive(Parser)]
#[command(name = "ccpeed-sync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Device address
    ip: String,

    /// Device class from the manifest
    #[arg(short, long, default_value = DEFAULT_DEVICE_CLASS)]
    class: String,

    /// Directory holding the scripts and manifest.yml
    #[arg(short, long, default_value = DEFAULT_SOURCE_DIR)]
    src: PathBuf,

    /// CoAP port of the device
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Seconds to wait for a delayed response
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Dry run - compare only, upload nothing and do not restart
    #[arg(long)]
    dry_run: bool,

    /// Print the device file table and exit
    #[arg(long)]
    list: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn coap_config(&self) -> CoapConfig {
        CoapConfig::new()
            .with_port(self.port)
            .with_response_timeout(Duration::from_secs(self.timeout))
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig::new(&self.class)
            .with_source_dir(&self.src)
            .with_dry_run(self.dry_run)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins over --verbose
    let default_filter = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let address = DeviceAddress::new(cli.ip.clone());
    let result = if cli.list {
        commands::list::run(address, cli.coap_config(), &cli.format)
    } else {
        commands::sync::run(address, cli.coap_config(), cli.session_config(), &cli.format)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "sync failed");
            print_error_chain(err.as_ref());
            ExitCode::from(exit_code(err.as_ref()))
        }
    }
}

fn print_error_chain(err: &(dyn Error + 'static)) {
    eprintln!("error: {}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }
}

fn exit_code(err: &(dyn Error + 'static)) -> u8 {
    match err.downcast_ref::<SyncError>().map(SyncError::kind) {
        Some(ErrorKind::Protocol) => 2,
        Some(ErrorKind::Decode) => 3,
        Some(ErrorKind::Io) => 4,
        Some(ErrorKind::Manifest) => 5,
        Some(ErrorKind::Transport) => 6,
        None => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["ccpeed-sync", "fd00::1"]).unwrap();
        assert_eq!(cli.ip, "fd00::1");
        assert_eq!(cli.class, "dali_bridge");
        assert_eq!(cli.src, PathBuf::from("./scripts"));
        assert_eq!(cli.port, 5683);
        assert!(!cli.dry_run);
        assert_eq!(cli.format, "text");

        let session = cli.session_config();
        assert_eq!(session.manifest_path(), PathBuf::from("./scripts/manifest.yml"));
    }

    #[test]
    fn short_flags() {
        let cli = Cli::try_parse_from([
            "ccpeed-sync",
            "fd00::1",
            "-c",
            "switch",
            "-s",
            "/tmp/lua",
            "-f",
            "json",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.class, "switch");
        assert_eq!(cli.src, PathBuf::from("/tmp/lua"));
        assert_eq!(cli.format, "json");
        assert!(cli.verbose);
    }

    #[test]
    fn address_is_required_and_format_checked() {
        assert!(Cli::try_parse_from(["ccpeed-sync"]).is_err());
        assert!(Cli::try_parse_from(["ccpeed-sync", "fd00::1", "-f", "xml"]).is_err());
    }

    #[test]
    fn exit_codes_follow_error_kind() {
        let err = SyncError::FileFailed {
            file: "a.lua".into(),
            remote: "a.lua".into(),
            uploaded: 0,
            source: Box::new(SyncError::Decode("bad".into())),
        };
        assert_eq!(exit_code(&err), 3);
        assert_eq!(exit_code(&SyncError::transport("down")), 6);

        let other: Box<dyn Error> = "serialization failed".into();
        assert_eq!(exit_code(other.as_ref()), 1);
    }
}
