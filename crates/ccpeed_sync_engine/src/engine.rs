//! Sync session: resolve, fetch, diff, upload, restart.

use crate::config::SessionConfig;
use crate::error::{SyncError, SyncResult};
use crate::reboot;
use crate::remote;
use crate::transport::{DeviceClient, DeviceTransport, Method};
use ccpeed_sync_protocol::{resolve, FileEntry, Fingerprint, LocalFileList, RemoteFileTable};
use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span};

/// Where a session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session has run yet.
    Idle,
    /// Loading the manifest and building the file list.
    Resolving,
    /// Reading the device file table.
    Fetching,
    /// Comparing and uploading files.
    Syncing,
    /// Asking the device to restart.
    Rebooting,
    /// The last session succeeded.
    Done,
    /// The last session failed.
    Failed,
}

impl SessionPhase {
    /// Returns true while a session is in progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            SessionPhase::Resolving
                | SessionPhase::Fetching
                | SessionPhase::Syncing
                | SessionPhase::Rebooting
        )
    }
}

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Device copy already matches.
    Unchanged,
    /// Uploaded.
    Updated,
    /// Differs from the device copy but was not uploaded (dry run).
    Stale,
    /// Reading or uploading failed.
    Failed,
}

impl FileStatus {
    /// Returns true for files that differ from the device copy.
    pub fn is_change(self) -> bool {
        matches!(self, FileStatus::Updated | FileStatus::Stale)
    }

    /// Short human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            FileStatus::Unchanged => "in sync",
            FileStatus::Updated => "updated",
            FileStatus::Stale => "would update",
            FileStatus::Failed => "failed",
        }
    }
}

/// Outcome of syncing one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    /// Local file name.
    pub name: String,
    /// Name on the device.
    pub remote: String,
    /// What happened.
    pub status: FileStatus,
    /// Fingerprint of the local content, if it could be read.
    pub local: Option<Fingerprint>,
    /// Etag the device reported before the session, if it had the file.
    pub remote_etag: Option<Fingerprint>,
    /// Size of the local content in bytes.
    pub size: usize,
}

impl FileOutcome {
    fn pending(entry: &FileEntry, remote_etag: Option<Fingerprint>) -> Self {
        Self {
            name: entry.name.clone(),
            remote: entry.remote.clone(),
            status: FileStatus::Failed,
            local: None,
            remote_etag,
            size: 0,
        }
    }
}

/// Receives per-file outcomes as a session progresses.
pub trait ProgressSink: Send + Sync {
    /// Called once per file, in order, including the file that failed.
    fn file_done(&self, index: usize, total: usize, outcome: &FileOutcome);
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize, &FileOutcome) + Send + Sync,
{
    fn file_done(&self, index: usize, total: usize, outcome: &FileOutcome) {
        self(index, total, outcome)
    }
}

/// A progress sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn file_done(&self, _index: usize, _total: usize, _outcome: &FileOutcome) {}
}

/// Result of comparing and uploading a file list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Per-file outcomes, in list order.
    pub outcomes: Vec<FileOutcome>,
    /// Files that differed from the device.
    pub changes: u32,
    /// Whether uploads were skipped.
    pub dry_run: bool,
}

impl SyncReport {
    /// Files actually written to the device.
    pub fn uploaded(&self) -> u32 {
        if self.dry_run {
            0
        } else {
            self.changes
        }
    }

    /// Outcomes of files that differed from the device.
    pub fn changed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.status.is_change())
    }

    /// Number of files already in sync.
    pub fn unchanged(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == FileStatus::Unchanged)
            .count()
    }

    /// Returns true if every file was already in sync.
    pub fn is_noop(&self) -> bool {
        self.changes == 0
    }
}

/// Result of a complete session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    /// Files the device reported before the session.
    pub remote_files: usize,
    /// Per-file results.
    pub sync: SyncReport,
    /// Whether a restart was requested.
    pub rebooted: bool,
    /// Wall time of the session.
    pub duration: Duration,
}

/// Brings one device's scripts in line with a local source directory.
pub struct SyncEngine<C: DeviceClient> {
    transport: DeviceTransport<C>,
    config: SessionConfig,
    progress: Box<dyn ProgressSink>,
    phase: RwLock<SessionPhase>,
}

impl<C: DeviceClient> SyncEngine<C> {
    /// Creates an engine for the device behind `transport`.
    pub fn new(transport: DeviceTransport<C>, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            progress: Box::new(NoProgress),
            phase: RwLock::new(SessionPhase::Idle),
        }
    }

    /// Sets the progress sink.
    pub fn with_progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.progress = Box::new(sink);
        self
    }

    /// The transport.
    pub fn transport(&self) -> &DeviceTransport<C> {
        &self.transport
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        *self.phase.read()
    }

    fn set_phase(&self, phase: SessionPhase) {
        *self.phase.write() = phase;
    }

    /// Resolves the file list for the transport's device.
    pub fn resolve_files(&self) -> SyncResult<LocalFileList> {
        let list = resolve(
            &self.config.manifest_path(),
            &self.config.device_class,
            self.transport.address(),
            &self.config.source_dir,
        )?;
        Ok(list)
    }

    /// Reads the device file table.
    pub fn fetch_remote_table(&self) -> SyncResult<RemoteFileTable> {
        remote::fetch_remote_table(&self.transport)
    }

    /// Compares every file with the remote table and uploads the ones that
    /// differ, in list order.
    ///
    /// Stops at the first file that cannot be read or uploaded. Files
    /// uploaded before that stay on the device.
    pub fn sync(&self, files: &LocalFileList, remote: &RemoteFileTable) -> SyncResult<SyncReport> {
        let mut report = SyncReport {
            dry_run: self.config.dry_run,
            ..SyncReport::default()
        };

        for (index, entry) in files.iter().enumerate() {
            let mut outcome = FileOutcome::pending(entry, remote.get(&entry.remote).copied());
            let result = self.sync_entry(entry, &mut outcome);
            self.progress.file_done(index, files.len(), &outcome);

            if let Err(source) = result {
                error!(
                    file = %entry.name,
                    remote = %entry.remote,
                    error = %source,
                    "file sync failed"
                );
                return Err(SyncError::FileFailed {
                    file: entry.name.clone(),
                    remote: entry.remote.clone(),
                    uploaded: report.uploaded(),
                    source: Box::new(source),
                });
            }
            if outcome.status.is_change() {
                report.changes += 1;
            }
            report.outcomes.push(outcome);
        }

        Ok(report)
    }

    fn sync_entry(&self, entry: &FileEntry, outcome: &mut FileOutcome) -> SyncResult<()> {
        let content = std::fs::read(&entry.source).map_err(|source| SyncError::Io {
            path: entry.source.clone(),
            source,
        })?;
        let local = Fingerprint::of(&content);
        outcome.size = content.len();
        outcome.local = Some(local);

        if outcome.remote_etag == Some(local) {
            debug!(file = %entry.name, etag = %local, "in sync");
            outcome.status = FileStatus::Unchanged;
            return Ok(());
        }

        if self.config.dry_run {
            info!(file = %entry.name, remote = %entry.remote, "would upload");
            outcome.status = FileStatus::Stale;
            return Ok(());
        }

        info!(
            file = %entry.name,
            remote = %entry.remote,
            bytes = content.len(),
            "uploading"
        );
        self.transport
            .request(&entry.resource_path(), Method::WriteReplace, content)?;
        outcome.status = FileStatus::Updated;
        Ok(())
    }

    /// Restarts the device if `changes` is non-zero.
    pub fn maybe_reboot(&self, changes: u32) -> SyncResult<bool> {
        reboot::maybe_reboot(&self.transport, changes)
    }

    /// Runs a complete session.
    ///
    /// The file list is resolved before the device is contacted; the remote
    /// table is then read once and never refreshed. Dry runs never restart
    /// the device.
    pub fn run(&self) -> SyncResult<SessionReport> {
        let span = info_span!(
            "sync",
            device = %self.transport.address(),
            class = %self.config.device_class
        );
        let _guard = span.enter();

        let result = self.run_phases(Instant::now());
        self.set_phase(if result.is_ok() {
            SessionPhase::Done
        } else {
            SessionPhase::Failed
        });
        result
    }

    fn run_phases(&self, start: Instant) -> SyncResult<SessionReport> {
        self.set_phase(SessionPhase::Resolving);
        let files = self.resolve_files()?;

        self.set_phase(SessionPhase::Fetching);
        let remote = self.fetch_remote_table()?;

        self.set_phase(SessionPhase::Syncing);
        let sync = self.sync(&files, &remote)?;

        let rebooted = if sync.dry_run {
            false
        } else {
            self.set_phase(SessionPhase::Rebooting);
            self.maybe_reboot(sync.changes)?
        };

        info!(
            files = files.len(),
            changes = sync.changes,
            rebooted,
            "session complete"
        );
        Ok(SessionReport {
            remote_files: remote.len(),
            sync,
            rebooted,
            duration: start.elapsed(),
        })
    }
}
