//! Periodic background replication of the working log.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::{OccupancyError, Result};
use crate::persistence::resolver::{Destination, PathResolver};
use crate::persistence::snapshot::{FsSnapshotSink, SnapshotSink};

/// Replicator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplicatorState {
    /// Waiting for the next tick
    #[default]
    Idle,
    /// Performing the durable and backup copy attempts
    Copying,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The working log does not exist yet
    MissingWorkingLog,
    /// No backup directory is configured
    BackupNotConfigured,
    /// A backup directory is configured but not currently accessible
    BackupUnavailable,
    /// The durable copy already landed in the backup directory this cycle
    SameAsDurable,
}

/// Result of one copy attempt. Failures are values here, never errors
/// propagated to the frame consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { target: PathBuf, bytes: u64 },
    Skipped(SkipReason),
    Failed { target: PathBuf, error: String },
    TimedOut { target: PathBuf, timeout: Duration },
}

impl CopyOutcome {
    pub fn is_copied(&self) -> bool {
        matches!(self, Self::Copied { .. })
    }

    pub fn target(&self) -> Option<&Path> {
        match self {
            Self::Copied { target, .. }
            | Self::Failed { target, .. }
            | Self::TimedOut { target, .. } => Some(target),
            Self::Skipped(_) => None,
        }
    }
}

/// Outcome of one Copying phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Where the durable destination resolved to this cycle
    pub resolved: Destination,
    pub durable: CopyOutcome,
    pub backup: CopyOutcome,
}

/// Replicator settings.
#[derive(Debug, Clone)]
pub struct ReplicatorConfig {
    /// The working log to snapshot
    pub working_log: PathBuf,
    /// File name of the snapshot inside each destination directory
    pub snapshot_name: String,
    /// Time between two Copying phases
    pub period: Duration,
    /// Upper bound for a single copy attempt
    pub copy_timeout: Duration,
    /// Run one cycle immediately when the loop starts
    pub replicate_on_start: bool,
}

impl ReplicatorConfig {
    pub fn new(working_log: impl Into<PathBuf>, snapshot_name: impl Into<String>) -> Self {
        Self {
            working_log: working_log.into(),
            snapshot_name: snapshot_name.into(),
            period: Duration::from_secs(60),
            copy_timeout: Duration::from_secs(30),
            replicate_on_start: true,
        }
    }
}

/// Copies the working log to the resolved durable directory and to the
/// backup directory, once per period.
///
/// The replicator only reads the working log; it shares nothing with the
/// frame consumer except the filesystem. Each cycle snapshots the file as
/// it is at copy time, so concurrent appends are tolerated.
pub struct Replicator {
    config: ReplicatorConfig,
    resolver: PathResolver,
    sink: Arc<dyn SnapshotSink>,
    state_tx: watch::Sender<ReplicatorState>,
    report_tx: watch::Sender<Option<CycleReport>>,
}

impl Replicator {
    pub fn new(config: ReplicatorConfig, resolver: PathResolver) -> Self {
        let (state_tx, _) = watch::channel(ReplicatorState::Idle);
        let (report_tx, _) = watch::channel(None);
        Self {
            config,
            resolver,
            sink: Arc::new(FsSnapshotSink),
            state_tx,
            report_tx,
        }
    }

    /// Replace the filesystem writer, e.g. to inject failures in tests.
    pub fn with_sink(mut self, sink: impl SnapshotSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn config(&self) -> &ReplicatorConfig {
        &self.config
    }

    pub fn state(&self) -> ReplicatorState {
        *self.state_tx.borrow()
    }

    /// Run one Copying phase and return to Idle, whatever the outcome.
    pub async fn run_cycle(&self) -> CycleReport {
        self.state_tx.send_replace(ReplicatorState::Copying);
        let report = self.copy_both().await;
        self.state_tx.send_replace(ReplicatorState::Idle);
        self.report_tx.send_replace(Some(report.clone()));
        report
    }

    async fn copy_both(&self) -> CycleReport {
        // Re-resolved every cycle: media may have been inserted or removed.
        let resolved = self.resolver.resolve();

        if !self.config.working_log.is_file() {
            tracing::warn!(
                path = %self.config.working_log.display(),
                "working log missing, skipping replication cycle"
            );
            return CycleReport {
                resolved: resolved.destination,
                durable: CopyOutcome::Skipped(SkipReason::MissingWorkingLog),
                backup: CopyOutcome::Skipped(SkipReason::MissingWorkingLog),
            };
        }

        if resolved.destination != Destination::Primary {
            tracing::warn!(
                primary = %self.resolver.primary().display(),
                destination = %resolved.destination,
                dir = %resolved.dir.display(),
                "primary destination unavailable, writing durable snapshot elsewhere"
            );
        }

        let durable_target = resolved.dir.join(&self.config.snapshot_name);
        let durable = self.attempt(resolved.destination, durable_target).await;

        let backup = match (self.resolver.secondary(), self.resolver.backup_dir()) {
            (None, _) => CopyOutcome::Skipped(SkipReason::BackupNotConfigured),
            (Some(dir), None) => {
                tracing::warn!(dir = %dir.display(), "backup directory not accessible");
                CopyOutcome::Skipped(SkipReason::BackupUnavailable)
            }
            (Some(_), Some(dir)) => {
                let target = dir.join(&self.config.snapshot_name);
                if durable.is_copied() && durable.target() == Some(target.as_path()) {
                    CopyOutcome::Skipped(SkipReason::SameAsDurable)
                } else {
                    self.attempt(Destination::Secondary, target).await
                }
            }
        };

        CycleReport {
            resolved: resolved.destination,
            durable,
            backup,
        }
    }

    async fn attempt(&self, destination: Destination, target: PathBuf) -> CopyOutcome {
        match self.copy_with_timeout(&target).await {
            Ok(bytes) => {
                tracing::info!(%destination, target = %target.display(), bytes, "snapshot copied");
                CopyOutcome::Copied { target, bytes }
            }
            Err(OccupancyError::CopyTimedOut { timeout, .. }) => {
                tracing::error!(
                    %destination,
                    target = %target.display(),
                    ?timeout,
                    "snapshot copy timed out"
                );
                CopyOutcome::TimedOut { target, timeout }
            }
            Err(e) => {
                tracing::error!(%destination, error = %e, "snapshot copy failed");
                CopyOutcome::Failed {
                    target,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Copy on the blocking pool, bounded by `copy_timeout`. A hung copy
    /// keeps its blocking thread, but the cycle moves on.
    async fn copy_with_timeout(&self, target: &Path) -> Result<u64> {
        let sink = Arc::clone(&self.sink);
        let source = self.config.working_log.clone();
        let dest = target.to_path_buf();
        let task = tokio::task::spawn_blocking(move || sink.write_snapshot(&source, &dest));

        match tokio::time::timeout(self.config.copy_timeout, task).await {
            Err(_) => Err(OccupancyError::CopyTimedOut {
                target: target.to_path_buf(),
                timeout: self.config.copy_timeout,
            }),
            Ok(Err(join_err)) => Err(OccupancyError::Copy {
                target: target.to_path_buf(),
                source: std::io::Error::other(join_err),
            }),
            Ok(Ok(result)) => result.map_err(|source| OccupancyError::Copy {
                target: target.to_path_buf(),
                source,
            }),
        }
    }

    /// Run the Idle/Copying loop until `cancel` fires, then perform one
    /// last cycle so the durable copies include the final appends.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(
            working_log = %self.config.working_log.display(),
            snapshot = %self.config.snapshot_name,
            period = ?self.config.period,
            "replicator started"
        );

        if self.config.replicate_on_start {
            self.run_cycle().await;
        }

        let first_tick = Instant::now() + self.config.period;
        let mut ticker = tokio::time::interval_at(first_tick, self.config.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = cancel.cancelled() => {
                    tracing::info!("replicator: cancellation requested, running final cycle");
                    self.run_cycle().await;
                    break;
                }
            }
        }
    }

    /// Run the loop as a background task.
    pub fn spawn(self) -> ReplicatorHandle {
        let cancel = CancellationToken::new();
        let state = self.state_tx.subscribe();
        let reports = self.report_tx.subscribe();
        let task = tokio::spawn(self.run(cancel.clone()));
        ReplicatorHandle {
            state,
            reports,
            cancel,
            task,
        }
    }
}

/// Handle to a spawned replicator.
pub struct ReplicatorHandle {
    state: watch::Receiver<ReplicatorState>,
    reports: watch::Receiver<Option<CycleReport>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ReplicatorHandle {
    pub fn state(&self) -> ReplicatorState {
        *self.state.borrow()
    }

    pub fn last_report(&self) -> Option<CycleReport> {
        self.reports.borrow().clone()
    }

    /// Wait for the next completed cycle. Returns `None` once the
    /// replicator has stopped.
    pub async fn next_report(&mut self) -> Option<CycleReport> {
        self.reports.changed().await.ok()?;
        self.reports.borrow_and_update().clone()
    }

    /// Stop the loop after a final cycle and return that cycle's report.
    pub async fn shutdown(self) -> Option<CycleReport> {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "replicator task ended abnormally");
        }
        self.reports.borrow().clone()
    }
}
