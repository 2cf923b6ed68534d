//! Durable storage of closed presence intervals.
//!
//! The working log is the single source of truth and is appended to by the
//! frame consumer. The replicator periodically snapshots it to removable
//! media and to a backup directory without touching the occupancy table.

mod replicator;
mod resolver;
mod snapshot;
mod working_log;

pub use replicator::{
    CopyOutcome, CycleReport, Replicator, ReplicatorConfig, ReplicatorHandle, ReplicatorState,
    SkipReason,
};
pub use resolver::{Destination, PathResolver, ResolvedDir};
pub use snapshot::{FsSnapshotSink, SNAPSHOT_STAMP_FORMAT, SnapshotSink, snapshot_file_name};
pub use working_log::{LOG_HEADER, WorkingLog, format_row, read_intervals};
