//! OccupancyPipeline for turning per-frame detections into durable intervals.

use crate::error::{FrameError, Result};
use crate::occupancy::{ClosedInterval, OccupancyTable, Timestamp};
use crate::persistence::WorkingLog;

use super::{Detection, DetectionSource, Frame, FrameAnnotator, active_person_ids};

/// What one frame did to the occupancy state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSummary {
    /// 1-based index of the frame since the pipeline was created
    pub frame_index: u64,
    /// Number of person detections, counting each untracked one
    pub person_count: usize,
    /// Open intervals after this frame
    pub open: usize,
    /// Intervals closed by this frame, already appended to the log
    pub closed: Vec<ClosedInterval>,
}

/// The frame consumer: sole owner of the occupancy table and working log.
///
/// Call one of the `process_*`/`observe_*` methods once per frame, in frame
/// order, with every detection of that frame.
pub struct OccupancyPipeline {
    table: OccupancyTable,
    log: WorkingLog,
    annotator: Option<FrameAnnotator>,
    frames: u64,
}

impl OccupancyPipeline {
    /// Create a pipeline writing closures to an initialized working log.
    pub fn new(log: WorkingLog) -> Self {
        Self {
            table: OccupancyTable::new(),
            log,
            annotator: None,
            frames: 0,
        }
    }

    /// Draw the live count onto frames passed to `process_frame`.
    pub fn with_annotator(mut self, annotator: FrameAnnotator) -> Self {
        self.annotator = Some(annotator);
        self
    }

    /// Update occupancy from one frame's detections.
    ///
    /// Every interval the frame closes is appended to the working log
    /// before this returns. An append failure is returned as-is; the
    /// closures of this frame that were not yet written are lost, so the
    /// caller should stop rather than continue without durability.
    pub fn observe_detections(
        &mut self,
        detections: &[Detection],
        now: Timestamp,
    ) -> Result<FrameSummary> {
        self.frames += 1;

        let mut person_count = 0;
        for det in detections.iter().filter(|d| d.is_person()) {
            person_count += 1;
            tracing::debug!(
                frame = self.frames,
                track_id = %det.occupancy_id(),
                label = %det.label,
                confidence = format_args!("{:.2}", det.confidence),
                "detection"
            );
        }

        let active = active_person_ids(detections);
        let closed = self.table.observe(&active, now);
        for interval in &closed {
            self.log.append(interval)?;
        }

        tracing::debug!(
            frame = self.frames,
            persons = person_count,
            open = self.table.len(),
            closed = closed.len(),
            "frame processed"
        );

        Ok(FrameSummary {
            frame_index: self.frames,
            person_count,
            open: self.table.len(),
            closed,
        })
    }

    /// Run detection on `frame`, update occupancy and annotate the frame.
    pub fn process_frame<D: DetectionSource>(
        &mut self,
        source: &mut D,
        frame: &mut Frame,
        now: Timestamp,
    ) -> std::result::Result<FrameSummary, FrameError<D::Error>> {
        let detections = source.detect(frame).map_err(FrameError::Detect)?;
        let summary = self.observe_detections(&detections, now)?;
        if let Some(annotator) = &self.annotator {
            annotator.annotate(frame, summary.person_count);
        }
        Ok(summary)
    }

    /// Close and log every interval still open, for a controlled shutdown.
    pub fn shutdown(&mut self, now: Timestamp) -> Result<Vec<ClosedInterval>> {
        let closed = self.table.close_all(now);
        for interval in &closed {
            self.log.append(interval)?;
        }
        tracing::info!(
            closed = closed.len(),
            frames = self.frames,
            rows = self.log.rows(),
            "occupancy pipeline drained"
        );
        Ok(closed)
    }

    pub fn table(&self) -> &OccupancyTable {
        &self.table
    }

    pub fn log(&self) -> &WorkingLog {
        &self.log
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::occupancy::TrackId;
    use crate::persistence::read_intervals;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    struct MockDetector {
        frames: Vec<Vec<Detection>>,
    }

    impl DetectionSource for MockDetector {
        type Error = std::convert::Infallible;

        fn detect(&mut self, _frame: &Frame) -> std::result::Result<Vec<Detection>, Self::Error> {
            Ok(if self.frames.is_empty() {
                vec![]
            } else {
                self.frames.remove(0)
            })
        }
    }

    fn t(s: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2026, 10, 17)
            .unwrap()
            .and_hms_opt(18, 0, s)
            .unwrap()
    }

    #[test]
    fn test_occupancy_pipeline() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("temp.csv");
        let mut pipeline = OccupancyPipeline::new(WorkingLog::initialize(&path).unwrap())
            .with_annotator(FrameAnnotator::default());
        let mut detector = MockDetector {
            frames: vec![vec![Detection::person(7, 0.9)], vec![Detection::person(7, 0.8)], vec![]],
        };
        let mut frame = Frame::zeros((48, 240, 3));

        let first = pipeline.process_frame(&mut detector, &mut frame, t(1)).unwrap();
        assert_eq!(first.person_count, 1);
        assert_eq!(first.open, 1);
        assert!(frame.iter().any(|&v| v == 255));

        pipeline.process_frame(&mut detector, &mut frame, t(2)).unwrap();
        let last = pipeline.process_frame(&mut detector, &mut frame, t(3)).unwrap();

        let expected = vec![ClosedInterval::new(TrackId::new(7), t(1), t(3))];
        assert_eq!(last.closed, expected);
        assert_eq!(last.frame_index, 3);
        assert_eq!(read_intervals(&path).unwrap(), expected);
    }

    #[test]
    fn test_non_person_detections_are_ignored() {
        let dir = tempdir().unwrap();
        let log = WorkingLog::initialize(dir.path().join("temp.csv")).unwrap();
        let mut pipeline = OccupancyPipeline::new(log);

        let summary = pipeline
            .observe_detections(&[Detection::new("dog", 0.9, Some(TrackId::new(1)))], t(0))
            .unwrap();
        assert_eq!(summary.person_count, 0);
        assert!(pipeline.table().is_empty());
    }

    #[test]
    fn test_untracked_count_vs_open_intervals() {
        let dir = tempdir().unwrap();
        let log = WorkingLog::initialize(dir.path().join("temp.csv")).unwrap();
        let mut pipeline = OccupancyPipeline::new(log);

        let untracked = Detection::new(crate::integration::PERSON_LABEL, 0.5, None);
        let summary = pipeline.observe_detections(&[untracked.clone(), untracked], t(0)).unwrap();
        assert_eq!(summary.person_count, 2);
        assert_eq!(summary.open, 1);
        assert!(pipeline.table().is_open(TrackId::UNTRACKED));
    }

    #[test]
    fn test_shutdown_flushes_open_intervals() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("temp.csv");
        let mut pipeline = OccupancyPipeline::new(WorkingLog::initialize(&path).unwrap());

        pipeline
            .observe_detections(&[Detection::person(1, 0.9), Detection::person(2, 0.9)], t(0))
            .unwrap();
        let closed = pipeline.shutdown(t(5)).unwrap();

        assert_eq!(closed.len(), 2);
        assert_eq!(read_intervals(&path).unwrap(), closed);
        assert_eq!(pipeline.log().rows(), 2);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_detections_logged_at_debug() {
        let dir = tempdir().unwrap();
        let log = WorkingLog::initialize(dir.path().join("temp.csv")).unwrap();
        let mut pipeline = OccupancyPipeline::new(log);

        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            pipeline.observe_detections(&[Detection::person(4, 0.87)], t(0)).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let line = output
            .lines()
            .find(|l| l.contains("detection") && l.contains("track_id=4"))
            .unwrap();
        assert!(line.contains("DEBUG"));
        assert!(line.contains("confidence=0.87"));
    }
}
