//! Durable presence-interval logging for per-frame person tracking.
//!
//! Each video frame's person detections update an [`OccupancyTable`] of
//! open presence intervals. Intervals closed by a frame are appended to a
//! crash-safe [`WorkingLog`] right away, and a background [`Replicator`]
//! copies that log to removable media and a backup directory on a fixed
//! period.

pub mod config;
pub mod error;
pub mod integration;
pub mod occupancy;
pub mod persistence;

pub use config::OccupancyConfig;
pub use error::{FrameError, OccupancyError, Result};
pub use integration::{
    Detection, DetectionBuilder, DetectionSource, Frame, FrameAnnotator, FrameSummary,
    OccupancyPipeline,
};
pub use occupancy::{ClosedInterval, OccupancyTable, PresenceInterval, Timestamp, TrackId};
pub use persistence::{CycleReport, PathResolver, Replicator, ReplicatorHandle, WorkingLog};
