//! Snapshot naming and whole-file copy of the working log.

use std::io::{self, Write};
use std::path::Path;

use fs_err as fs;
use tempfile::NamedTempFile;

use crate::occupancy::Timestamp;

/// Format of the process-start stamp embedded in snapshot file names.
pub const SNAPSHOT_STAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Build `<stem>_<start stamp><.ext>` from the configured base name, so
/// each run gets its own durable artifact.
///
/// ```
/// use chrono::NaiveDate;
/// use occupancy_log::persistence::snapshot_file_name;
///
/// let started = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap().and_hms_opt(8, 0, 0).unwrap();
/// assert_eq!(snapshot_file_name("detection.csv", started), "detection_2026-10-17_08-00-00.csv");
/// ```
pub fn snapshot_file_name(base: &str, started: Timestamp) -> String {
    let base_path = Path::new(base);
    let stem = base_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = started.format(SNAPSHOT_STAMP_FORMAT);
    match base_path.extension() {
        Some(ext) => format!("{stem}_{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{stamp}"),
    }
}

/// Writes a full snapshot of `source` to `target`, replacing any previous one.
///
/// Implementations run on a blocking thread and may block for as long as
/// the destination takes; the replicator bounds each call with a timeout.
pub trait SnapshotSink: Send + Sync + 'static {
    /// Returns the number of bytes written.
    fn write_snapshot(&self, source: &Path, target: &Path) -> io::Result<u64>;
}

/// Filesystem snapshot writer.
///
/// The copy goes to a temporary file next to `target` and is renamed over
/// it once synced, so readers of the destination only ever see complete
/// snapshots. The snapshot takes the permissions of the working log.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSnapshotSink;

impl SnapshotSink for FsSnapshotSink {
    fn write_snapshot(&self, source: &Path, target: &Path) -> io::Result<u64> {
        let parent = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let mut reader = fs::File::open(source)?;
        let permissions = reader.metadata()?.permissions();
        let mut temp = NamedTempFile::new_in(parent)?;
        let bytes = io::copy(&mut reader, &mut temp)?;
        temp.flush()?;
        temp.as_file().set_permissions(permissions)?;
        temp.as_file().sync_all()?;
        temp.persist(target).map_err(|e| e.error)?;
        Ok(bytes)
    }
}
