use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use occupancy_log::persistence::{
    CopyOutcome, Destination, FsSnapshotSink, ReplicatorConfig, ReplicatorState, SkipReason,
    SnapshotSink, read_intervals,
};
use occupancy_log::{ClosedInterval, PathResolver, Replicator, Timestamp, TrackId, WorkingLog};
use tempfile::TempDir;

const SNAPSHOT: &str = "detection_2026-10-17_10-00-00.csv";

struct Layout {
    root: TempDir,
    log: PathBuf,
    usb: PathBuf,
    backup: PathBuf,
}

impl Layout {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let log = root.path().join("temp.csv");
        let usb = root.path().join("usb");
        let backup = root.path().join("backup");
        Self { root, log, usb, backup }
    }

    fn resolver(&self) -> PathResolver {
        PathResolver::new(&self.usb, Some(self.backup.clone()), self.root.path().join("local"))
    }

    fn config(&self) -> ReplicatorConfig {
        let mut config = ReplicatorConfig::new(&self.log, SNAPSHOT);
        config.copy_timeout = Duration::from_secs(5);
        config
    }
}

fn t(s: u32) -> Timestamp {
    NaiveDate::from_ymd_opt(2026, 10, 17)
        .unwrap()
        .and_hms_opt(10, 0, s)
        .unwrap()
}

/// Fails every copy into `blocked` while the switch is on.
struct SwitchableSink {
    blocked: PathBuf,
    unplugged: Arc<AtomicBool>,
}

impl SnapshotSink for SwitchableSink {
    fn write_snapshot(&self, source: &Path, target: &Path) -> io::Result<u64> {
        if self.unplugged.load(Ordering::SeqCst) && target.starts_with(&self.blocked) {
            return Err(io::Error::other("device disconnected"));
        }
        FsSnapshotSink.write_snapshot(source, target)
    }
}

/// Blocks on copies into `slow` for longer than the replicator waits.
struct HangingSink {
    slow: PathBuf,
    delay: Duration,
}

impl SnapshotSink for HangingSink {
    fn write_snapshot(&self, source: &Path, target: &Path) -> io::Result<u64> {
        if target.starts_with(&self.slow) {
            std::thread::sleep(self.delay);
        }
        FsSnapshotSink.write_snapshot(source, target)
    }
}

#[tokio::test]
async fn test_header_only_snapshot() {
    let layout = Layout::new();
    std::fs::create_dir(&layout.usb).unwrap();
    WorkingLog::initialize(&layout.log).unwrap();

    let replicator = Replicator::new(layout.config(), layout.resolver());
    let report = replicator.run_cycle().await;

    assert_eq!(report.resolved, Destination::Primary);
    assert!(report.durable.is_copied());
    assert_eq!(report.backup, CopyOutcome::Skipped(SkipReason::BackupUnavailable));
    assert_eq!(
        std::fs::read(layout.usb.join(SNAPSHOT)).unwrap(),
        std::fs::read(&layout.log).unwrap()
    );
    assert!(read_intervals(layout.usb.join(SNAPSHOT)).unwrap().is_empty());
}

#[tokio::test]
async fn test_primary_absent_writes_only_backup() {
    let layout = Layout::new();
    std::fs::create_dir(&layout.backup).unwrap();
    let mut log = WorkingLog::initialize(&layout.log).unwrap();
    log.append(&ClosedInterval::new(TrackId::new(3), t(1), t(4))).unwrap();

    let replicator = Replicator::new(layout.config(), layout.resolver());
    let report = replicator.run_cycle().await;

    assert_eq!(report.resolved, Destination::Secondary);
    assert_eq!(report.durable.target(), Some(layout.backup.join(SNAPSHOT).as_path()));
    assert_eq!(report.backup, CopyOutcome::Skipped(SkipReason::SameAsDurable));
    assert!(!layout.usb.exists());
    assert_eq!(read_intervals(layout.backup.join(SNAPSHOT)).unwrap().len(), 1);
}

#[tokio::test]
async fn test_nothing_mounted_uses_fallback() {
    let layout = Layout::new();
    let fallback = layout.root.path().join("local");
    std::fs::create_dir(&fallback).unwrap();
    WorkingLog::initialize(&layout.log).unwrap();

    let report = Replicator::new(layout.config(), layout.resolver()).run_cycle().await;

    assert_eq!(report.resolved, Destination::Fallback);
    assert!(report.durable.is_copied());
    assert!(fallback.join(SNAPSHOT).is_file());
}

#[tokio::test]
async fn test_primary_failure_does_not_affect_backup() {
    let layout = Layout::new();
    std::fs::create_dir(&layout.usb).unwrap();
    std::fs::create_dir(&layout.backup).unwrap();
    let mut log = WorkingLog::initialize(&layout.log).unwrap();

    let unplugged = Arc::new(AtomicBool::new(false));
    let replicator = Replicator::new(layout.config(), layout.resolver()).with_sink(SwitchableSink {
        blocked: layout.usb.clone(),
        unplugged: Arc::clone(&unplugged),
    });

    // Cycle N-1: both destinations healthy
    log.append(&ClosedInterval::new(TrackId::new(1), t(0), t(1))).unwrap();
    let report = replicator.run_cycle().await;
    assert!(report.durable.is_copied());
    assert!(report.backup.is_copied());

    // Cycle N: primary unreachable, backup still gets the new row
    log.append(&ClosedInterval::new(TrackId::new(2), t(1), t(2))).unwrap();
    unplugged.store(true, Ordering::SeqCst);
    let report = replicator.run_cycle().await;
    assert!(matches!(report.durable, CopyOutcome::Failed { .. }));
    assert!(report.backup.is_copied());
    assert_eq!(read_intervals(layout.backup.join(SNAPSHOT)).unwrap().len(), 2);
    assert_eq!(read_intervals(layout.usb.join(SNAPSHOT)).unwrap().len(), 1);
    assert_eq!(replicator.state(), ReplicatorState::Idle);

    // Cycle N+1: primary back, catches up
    unplugged.store(false, Ordering::SeqCst);
    let report = replicator.run_cycle().await;
    assert!(report.durable.is_copied());
    assert_eq!(read_intervals(layout.usb.join(SNAPSHOT)).unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hung_primary_is_bounded_by_timeout() {
    let layout = Layout::new();
    std::fs::create_dir(&layout.usb).unwrap();
    std::fs::create_dir(&layout.backup).unwrap();
    WorkingLog::initialize(&layout.log).unwrap();

    let mut config = layout.config();
    config.copy_timeout = Duration::from_millis(100);
    let replicator = Replicator::new(config, layout.resolver()).with_sink(HangingSink {
        slow: layout.usb.clone(),
        delay: Duration::from_millis(800),
    });

    let started = Instant::now();
    let report = replicator.run_cycle().await;

    assert!(matches!(report.durable, CopyOutcome::TimedOut { .. }));
    assert!(report.backup.is_copied());
    assert!(layout.backup.join(SNAPSHOT).is_file());
    assert!(started.elapsed() < Duration::from_millis(700));
}

#[tokio::test]
async fn test_spawned_loop_replicates_and_drains() {
    let layout = Layout::new();
    std::fs::create_dir(&layout.usb).unwrap();
    let mut log = WorkingLog::initialize(&layout.log).unwrap();

    let mut config = layout.config();
    config.period = Duration::from_millis(50);
    let mut handle = Replicator::new(config, layout.resolver()).spawn();

    // Startup cycle writes the header-only snapshot
    let first = handle.next_report().await.unwrap();
    assert!(first.durable.is_copied());

    log.append(&ClosedInterval::new(TrackId::new(9), t(2), t(8))).unwrap();
    let final_report = handle.shutdown().await.unwrap();

    assert!(final_report.durable.is_copied());
    assert_eq!(
        read_intervals(layout.usb.join(SNAPSHOT)).unwrap(),
        vec![ClosedInterval::new(TrackId::new(9), t(2), t(8))]
    );
}

#[test]
fn test_teardown_does_not_wait_for_hung_copy() {
    let layout = Layout::new();
    std::fs::create_dir(&layout.usb).unwrap();
    WorkingLog::initialize(&layout.log).unwrap();

    let copy_timeout = Duration::from_millis(100);
    let mut config = layout.config();
    config.copy_timeout = copy_timeout;
    let replicator = Replicator::new(config, layout.resolver()).with_sink(HangingSink {
        slow: layout.usb.clone(),
        delay: Duration::from_secs(3),
    });

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let started = Instant::now();
    let report = runtime.block_on(async move {
        let handle = replicator.spawn();
        handle.shutdown().await
    });
    runtime.shutdown_timeout(copy_timeout);

    assert!(matches!(report.unwrap().durable, CopyOutcome::TimedOut { .. }));
    assert!(started.elapsed() < Duration::from_secs(2));
}
