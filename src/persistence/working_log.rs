//! Append-only CSV working log.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use fs_err as fs;

use crate::error::{OccupancyError, Result};
use crate::occupancy::{ClosedInterval, TIMESTAMP_FORMAT, TrackId};

/// Header row written at the top of every log and snapshot.
pub const LOG_HEADER: &str = "Track ID,Start Time,End Time";

const LINE_ENDING: &str = "\r\n";

/// Format one closed interval as a CSV row, without line terminator.
pub fn format_row(interval: &ClosedInterval) -> String {
    format!(
        "{},{},{}",
        interval.track_id,
        interval.start_time.format(TIMESTAMP_FORMAT),
        interval.end_time.format(TIMESTAMP_FORMAT)
    )
}

/// The working log file, owned by the frame consumer.
///
/// Every append is flushed and synced before returning so that a crash
/// right after `append` never loses the row.
#[derive(Debug)]
pub struct WorkingLog {
    path: PathBuf,
    file: fs::File,
    rows: u64,
    /// Length of the file up to the last complete row
    committed: u64,
}

impl WorkingLog {
    /// Create or truncate the log at `path` and write the header row.
    ///
    /// Fails if the directory is not writable; callers should abort
    /// startup rather than run without a log.
    pub fn initialize(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let init_err = |source| OccupancyError::LogInit {
            path: path.clone(),
            source,
        };

        let header = format!("{LOG_HEADER}{LINE_ENDING}");
        let mut file = fs::File::create(&path).map_err(init_err)?;
        file.write_all(header.as_bytes()).map_err(init_err)?;
        file.flush().map_err(init_err)?;
        file.sync_data().map_err(init_err)?;

        tracing::info!(path = %path.display(), "working log initialized");
        Ok(Self {
            path,
            file,
            rows: 0,
            committed: header.len() as u64,
        })
    }

    /// Append one closed interval.
    ///
    /// A failed write is retried once on a freshly opened handle; a second
    /// failure is returned as [`OccupancyError::Append`]. Before the retry
    /// the file is cut back to its last complete row, so a torn first write
    /// never leaves a fragment in front of the retried row.
    pub fn append(&mut self, interval: &ClosedInterval) -> Result<()> {
        let line = format!("{}{LINE_ENDING}", format_row(interval));

        if let Err(first) = write_synced(&mut self.file, &line) {
            tracing::warn!(
                path = %self.path.display(),
                track_id = %interval.track_id,
                error = %first,
                "working log append failed, reopening and retrying once"
            );
            self.file = self
                .reopen_at_committed()
                .and_then(|mut reopened| {
                    write_synced(&mut reopened, &line)?;
                    Ok(reopened)
                })
                .map_err(|source| OccupancyError::Append {
                    path: self.path.clone(),
                    source,
                })?;
        }

        self.committed += line.len() as u64;
        self.rows += 1;
        tracing::debug!(path = %self.path.display(), row = self.rows, "{}", line.trim_end());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of rows appended since initialization, excluding the header.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    fn reopen_at_committed(&self) -> std::io::Result<fs::File> {
        let file = fs::OpenOptions::new().append(true).open(&self.path)?;
        file.set_len(self.committed)?;
        Ok(file)
    }
}

fn write_synced(file: &mut fs::File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes())?;
    file.flush()?;
    file.sync_data()
}

/// Parse a working log or snapshot back into its closed intervals,
/// in file order.
pub fn read_intervals(path: impl AsRef<Path>) -> Result<Vec<ClosedInterval>> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| OccupancyError::Io {
        context: format!("opening {}", path.display()),
        source,
    })?;

    let mut intervals = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| OccupancyError::Io {
            context: format!("reading {} line {line_no}", path.display()),
            source,
        })?;
        let line = line.trim_end_matches('\r');

        if line_no == 1 {
            if line != LOG_HEADER {
                return Err(malformed(path, line_no, format!("unexpected header {line:?}")));
            }
            continue;
        }
        if line.is_empty() {
            continue;
        }
        intervals.push(parse_row(line).map_err(|details| malformed(path, line_no, details))?);
    }
    Ok(intervals)
}

fn parse_row(line: &str) -> std::result::Result<ClosedInterval, String> {
    let mut fields = line.split(',');
    let (Some(id), Some(start), Some(end), None) =
        (fields.next(), fields.next(), fields.next(), fields.next())
    else {
        return Err(format!("expected 3 fields in {line:?}"));
    };

    let track_id = id
        .parse::<u64>()
        .map(TrackId::new)
        .map_err(|e| format!("bad track id {id:?}: {e}"))?;
    let start_time = NaiveDateTime::parse_from_str(start, TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad start time {start:?}: {e}"))?;
    let end_time = NaiveDateTime::parse_from_str(end, TIMESTAMP_FORMAT)
        .map_err(|e| format!("bad end time {end:?}: {e}"))?;

    Ok(ClosedInterval::new(track_id, start_time, end_time))
}

fn malformed(path: &Path, line: usize, details: String) -> OccupancyError {
    OccupancyError::MalformedRow {
        path: path.to_path_buf(),
        line,
        details,
    }
}
