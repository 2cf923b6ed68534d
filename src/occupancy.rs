mod interval;
mod table;
mod track_id;

pub use interval::{
    ClosedInterval, IntervalState, PresenceInterval, TIMESTAMP_FORMAT, Timestamp,
    truncate_to_second,
};
pub use table::OccupancyTable;
pub use track_id::TrackId;
