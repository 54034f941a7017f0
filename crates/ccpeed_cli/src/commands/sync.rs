//! Sync command implementation.

use ccpeed_sync_engine::{
    CoapConfig, DeviceTransport, FileOutcome, SessionConfig, SessionReport, SyncEngine, SyncError,
};
use ccpeed_sync_protocol::DeviceAddress;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// Session summary.
#[derive(Debug, Serialize)]
pub struct SyncSummary {
    /// Device address.
    pub device: String,
    /// Device class.
    pub class: String,
    /// Whether uploads were skipped.
    pub dry_run: bool,
    /// Files the device reported before the session.
    pub remote_files: usize,
    /// Files that differed.
    pub changes: u32,
    /// Whether a restart was requested.
    pub rebooted: bool,
    /// Session duration in milliseconds.
    pub duration_ms: u128,
    /// Per-file results.
    pub files: Vec<FileLine>,
}

/// Result for a single file.
#[derive(Debug, Serialize)]
pub struct FileLine {
    /// Local file name.
    pub name: String,
    /// Name on the device.
    pub remote: String,
    /// Outcome label.
    pub status: &'static str,
    /// Size in bytes.
    pub size: usize,
    /// Local MD5, hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    /// Device etag before the session, hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_etag: Option<String>,
}

impl From<&FileOutcome> for FileLine {
    fn from(outcome: &FileOutcome) -> Self {
        Self {
            name: outcome.name.clone(),
            remote: outcome.remote.clone(),
            status: outcome.status.label(),
            size: outcome.size,
            local: outcome.local.map(|f| f.to_hex()),
            remote_etag: outcome.remote_etag.map(|f| f.to_hex()),
        }
    }
}

/// What a failed session got through before it stopped.
///
/// Files listed as updated are on the device; the last entry is the file
/// that failed.
#[derive(Debug, Serialize)]
pub struct FailedSummary {
    /// Device address.
    pub device: String,
    /// Device class.
    pub class: String,
    /// Whether uploads were skipped.
    pub dry_run: bool,
    /// Error message, without its causes.
    pub error: String,
    /// Per-file results up to and including the failure.
    pub files: Vec<FileLine>,
}

impl FailedSummary {
    fn new(
        address: &DeviceAddress,
        session: &SessionConfig,
        outcomes: &[FileOutcome],
        err: &SyncError,
    ) -> Self {
        Self {
            device: address.to_string(),
            class: session.device_class.clone(),
            dry_run: session.dry_run,
            error: err.to_string(),
            files: outcomes.iter().map(FileLine::from).collect(),
        }
    }
}

impl SyncSummary {
    fn new(address: &DeviceAddress, session: &SessionConfig, report: &SessionReport) -> Self {
        Self {
            device: address.to_string(),
            class: session.device_class.clone(),
            dry_run: report.sync.dry_run,
            remote_files: report.remote_files,
            changes: report.sync.changes,
            rebooted: report.rebooted,
            duration_ms: report.duration.as_millis(),
            files: report.sync.outcomes.iter().map(FileLine::from).collect(),
        }
    }
}

/// Runs a sync session.
pub fn run(
    address: DeviceAddress,
    coap: CoapConfig,
    session: SessionConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let transport = DeviceTransport::connect(address.clone(), coap)?;

    let json = format == "json";
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let engine = SyncEngine::new(transport, session).with_progress({
        let outcomes = Arc::clone(&outcomes);
        move |_index: usize, _total: usize, outcome: &FileOutcome| {
            if !json {
                print_progress(outcome);
            }
            outcomes.lock().push(outcome.clone());
        }
    });

    let report = match engine.run() {
        Ok(report) => report,
        Err(err) => {
            if json {
                let partial =
                    FailedSummary::new(&address, engine.config(), &outcomes.lock(), &err);
                println!("{}", serde_json::to_string_pretty(&partial)?);
            }
            return Err(err.into());
        }
    };
    let summary = SyncSummary::new(&address, engine.config(), &report);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => {
            print_text_output(&summary);
        }
    }

    Ok(())
}

fn print_progress(outcome: &FileOutcome) {
    if outcome.name == outcome.remote {
        println!("{} {}", outcome.name, outcome.status.label());
    } else {
        println!(
            "{} ({}) {}",
            outcome.name,
            outcome.remote,
            outcome.status.label()
        );
    }
}

fn print_text_output(summary: &SyncSummary) {
    println!();
    if summary.changes == 0 {
        println!("{}: all {} file(s) in sync", summary.device, summary.files.len());
    } else if summary.dry_run {
        println!(
            "{}: {} of {} file(s) would be updated",
            summary.device,
            summary.changes,
            summary.files.len()
        );
    } else {
        println!(
            "{}: updated {} of {} file(s)",
            summary.device,
            summary.changes,
            summary.files.len()
        );
    }
    if summary.rebooted {
        println!("{}: restarting", summary.device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ccpeed_sync_engine::{FileStatus, SyncReport};
    use ccpeed_sync_protocol::Fingerprint;
    use std::time::Duration;

    #[test]
    fn summary_serializes_outcomes() {
        let report = SessionReport {
            remote_files: 3,
            sync: SyncReport {
                outcomes: vec![FileOutcome {
                    name: "fd00__1.lua".into(),
                    remote: "init.lua".into(),
                    status: FileStatus::Updated,
                    local: Some(Fingerprint::of(b"")),
                    remote_etag: None,
                    size: 0,
                }],
                changes: 1,
                dry_run: false,
            },
            rebooted: true,
            duration: Duration::from_millis(42),
        };

        let summary = SyncSummary::new(
            &DeviceAddress::new("fd00::1"),
            &SessionConfig::default(),
            &report,
        );
        let json: serde_json::Value = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["device"], "fd00::1");
        assert_eq!(json["class"], "dali_bridge");
        assert_eq!(json["changes"], 1);
        assert_eq!(json["rebooted"], true);
        assert_eq!(json["files"][0]["remote"], "init.lua");
        assert_eq!(json["files"][0]["status"], "updated");
        assert_eq!(
            json["files"][0]["local"],
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert!(json["files"][0].get("remote_etag").is_none());
    }

    #[test]
    fn failed_summary_lists_files_reached() {
        let outcome = |name: &str, status| FileOutcome {
            name: name.into(),
            remote: name.into(),
            status,
            local: None,
            remote_etag: None,
            size: 0,
        };
        let outcomes = vec![
            outcome("a.lua", FileStatus::Updated),
            outcome("b.lua", FileStatus::Failed),
        ];
        let err = SyncError::FileFailed {
            file: "b.lua".into(),
            remote: "b.lua".into(),
            uploaded: 1,
            source: Box::new(SyncError::Decode("bad".into())),
        };

        let summary = FailedSummary::new(
            &DeviceAddress::new("fd00::1"),
            &SessionConfig::default(),
            &outcomes,
            &err,
        );
        let json: serde_json::Value = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["device"], "fd00::1");
        assert_eq!(json["dry_run"], false);
        assert_eq!(json["error"], err.to_string());
        assert_eq!(json["files"][0]["status"], "updated");
        assert_eq!(json["files"][1]["name"], "b.lua");
        assert_eq!(json["files"][1]["status"], "failed");
    }
}
