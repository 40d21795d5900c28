//! Inspection session: one part spec, one detector, one calibration
//!
//! Frames are processed one at a time to completion. Per-frame calibration
//! problems and per-record validation failures are logged and counted; only
//! store failures end the session early.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::core::calibration::{CalibrationAnchor, CalibrationError, CalibrationState};
use crate::detect::{detector_for, DetectorParams, Frame, Roi, ShapeDetector};
use crate::entities::comparison::{ComparisonRecord, ComparisonReport};
use crate::entities::measurement::Measurement;
use crate::entities::part::{Dimension, PartSpec};
use crate::inspect::compare::{compare, ToleranceConfig};
use crate::inspect::slot::LatestSlot;
use crate::store::{LiveStatus, MeasurementLog, StoreError};

/// What happened to one region of interest
#[derive(Debug)]
pub enum FrameOutcome {
    /// No candidate satisfied the detector
    NoDetection,

    /// Detected, but no scale is available to convert it
    CalibrationPending(CalibrationError),

    /// Converted and logged; `record` is `None` if nothing matched the nominal
    Measured {
        measurement: Measurement,
        record: Option<ComparisonRecord>,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub frames: usize,
    pub rois: usize,
    pub detections: usize,
    pub measurements: usize,
    pub calibration_errors: usize,
    pub validation_errors: usize,
    /// Frames overwritten in the live slot before the loop got to them
    pub dropped_frames: u64,
}

/// Limits applied by the drivers between frames
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub max_frames: Option<usize>,
    /// Live mode only: pause between frames published by the producer
    pub frame_interval: Option<Duration>,
}

/// Final state of a session
#[derive(Debug, Serialize)]
pub struct SessionSummary {
    pub stats: SessionStats,
    pub scale_mm_per_px: Option<f64>,
    pub report: ComparisonReport,
}

pub struct InspectionSession {
    spec: PartSpec,
    detector: Box<dyn ShapeDetector>,
    calibration: CalibrationState,
    anchor: Option<CalibrationAnchor>,
    tolerance: ToleranceConfig,
    log: Option<MeasurementLog>,
    raw_log: Option<MeasurementLog>,
    live: Option<LiveStatus>,
    stats: SessionStats,
    records: Vec<ComparisonRecord>,
}

impl InspectionSession {
    /// Start a session; the detector is fixed by the spec's part type.
    pub fn new(spec: PartSpec, params: &DetectorParams, tolerance: ToleranceConfig) -> Self {
        let detector = detector_for(spec.part_type, params);
        Self {
            spec,
            detector,
            calibration: CalibrationState::new(),
            anchor: None,
            tolerance,
            log: None,
            raw_log: None,
            live: None,
            stats: SessionStats::default(),
            records: Vec::new(),
        }
    }

    pub fn with_anchor(mut self, anchor: CalibrationAnchor) -> Self {
        self.anchor = Some(anchor);
        self
    }

    pub fn with_log(mut self, log: MeasurementLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_raw_log(mut self, log: MeasurementLog) -> Self {
        self.raw_log = Some(log);
        self
    }

    pub fn with_live_status(mut self, live: LiveStatus) -> Self {
        self.live = Some(live);
        self
    }

    pub fn spec(&self) -> &PartSpec {
        &self.spec
    }

    pub fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Process every region of a frame
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Vec<FrameOutcome>, StoreError> {
        self.stats.frames += 1;
        let timestamp = frame.timestamp.unwrap_or_else(Utc::now);
        frame
            .rois
            .iter()
            .map(|roi| self.process_roi(roi, timestamp))
            .collect()
    }

    pub fn process_roi(
        &mut self,
        roi: &Roi,
        timestamp: DateTime<Utc>,
    ) -> Result<FrameOutcome, StoreError> {
        self.stats.rois += 1;

        let Some(typed) = self.detector.detect(roi, &self.calibration) else {
            tracing::debug!(part = %self.spec.part_type, "no detection in roi");
            return Ok(FrameOutcome::NoDetection);
        };
        self.stats.detections += 1;

        if let Err(err) = self.try_anchor(|d| typed.pixel_value(d)) {
            tracing::warn!(error = %err, "calibration anchor rejected");
            self.stats.calibration_errors += 1;
            return Ok(FrameOutcome::CalibrationPending(err));
        }

        let measurement =
            match Measurement::from_pixels(self.spec.part_type, &typed, &self.calibration, timestamp) {
                Ok(m) => m,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping detection");
                    self.stats.calibration_errors += 1;
                    return Ok(FrameOutcome::CalibrationPending(err));
                }
            };
        self.stats.measurements += 1;

        if let Some(log) = self.log.as_mut() {
            log.append(&measurement)?;
        }
        if let Some(log) = self.raw_log.as_mut() {
            log.append(&measurement)?;
        }

        let record = match compare(&measurement, &self.spec, &self.tolerance) {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(error = %err, "measurement not comparable");
                self.stats.validation_errors += 1;
                None
            }
        };

        if let Some(live) = &self.live {
            live.update(&measurement, record.as_ref().map(|r| r.status))?;
        }
        if let Some(record) = &record {
            tracing::debug!(status = %record.status, "measurement compared");
            self.records.push(record.clone());
        }

        Ok(FrameOutcome::Measured {
            measurement,
            record,
        })
    }

    /// Lock the scale from this detection if the session is still pending
    fn try_anchor(&self, pixel_value: impl Fn(Dimension) -> Option<f64>) -> Result<(), CalibrationError> {
        if self.calibration.is_locked() {
            return Ok(());
        }
        let Some(anchor) = &self.anchor else {
            return Ok(());
        };
        if let Some(pair) = anchor.pair(pixel_value, &self.spec)? {
            self.calibration.try_lock(pair.reference_px, pair.reference_mm)?;
        }
        Ok(())
    }

    /// Synchronous driver: process frames in order until the source ends,
    /// `stop` is raised, or `max_frames` is reached. `on_outcome` sees every
    /// ROI outcome as it is produced.
    pub fn run_replay(
        &mut self,
        frames: impl IntoIterator<Item = Frame>,
        stop: &AtomicBool,
        options: &RunOptions,
        mut on_outcome: impl FnMut(&FrameOutcome),
    ) -> Result<(), StoreError> {
        tracing::info!(part = %self.spec.part_type, "replay session started");
        for frame in frames {
            if self.should_stop(stop, options) {
                break;
            }
            self.process_frame(&frame)?.iter().for_each(&mut on_outcome);
        }
        tracing::info!(frames = self.stats.frames, "replay session stopped");
        Ok(())
    }

    /// Live driver: a producer thread publishes frames into a latest-value
    /// slot and this thread always processes the most recent one. Frames the
    /// loop did not get to are dropped and counted.
    ///
    /// Returns as soon as the consumer stops, even if the frame source is
    /// blocked; a producer still waiting on its source is left detached and
    /// exits on its next publish into the closed slot.
    pub fn run_live<I>(
        &mut self,
        frames: I,
        stop: &AtomicBool,
        options: &RunOptions,
        mut on_outcome: impl FnMut(&FrameOutcome),
    ) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = Frame>,
        I::IntoIter: Send + 'static,
    {
        tracing::info!(part = %self.spec.part_type, "live session started");
        let slot: Arc<LatestSlot<Frame>> = Arc::new(LatestSlot::new());
        let frames = frames.into_iter();
        let interval = options.frame_interval;

        let producer = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                for frame in frames {
                    if !slot.publish(frame) {
                        break;
                    }
                    if let Some(interval) = interval {
                        thread::sleep(interval);
                    }
                }
                slot.close();
            })
        };

        let result = self.consume(&slot, stop, options, &mut on_outcome);
        slot.close();
        if producer.is_finished() {
            if producer.join().is_err() {
                tracing::warn!("frame producer panicked");
            }
        } else {
            tracing::debug!("frame source still blocked, producer detached");
        }

        self.stats.dropped_frames = slot.stats().dropped;
        tracing::info!(
            frames = self.stats.frames,
            dropped = self.stats.dropped_frames,
            "live session stopped"
        );
        result
    }

    fn consume(
        &mut self,
        slot: &LatestSlot<Frame>,
        stop: &AtomicBool,
        options: &RunOptions,
        on_outcome: &mut impl FnMut(&FrameOutcome),
    ) -> Result<(), StoreError> {
        const POLL: Duration = Duration::from_millis(50);
        loop {
            if self.should_stop(stop, options) {
                return Ok(());
            }
            let frame = match slot.take(Some(POLL)) {
                Some(frame) => frame,
                // a frame published right before close is still pending
                None if slot.is_closed() => match slot.try_take() {
                    Some(frame) => frame,
                    None => return Ok(()),
                },
                None => continue,
            };
            self.process_frame(&frame)?.iter().for_each(&mut *on_outcome);
        }
    }

    fn should_stop(&self, stop: &AtomicBool, options: &RunOptions) -> bool {
        stop.load(Ordering::Relaxed)
            || options
                .max_frames
                .is_some_and(|max| self.stats.frames >= max)
    }

    pub fn finish(self) -> SessionSummary {
        let skipped = self.stats.validation_errors;
        SessionSummary {
            stats: self.stats,
            scale_mm_per_px: self.calibration.get_scale(),
            report: ComparisonReport::new(self.records, skipped),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::tests::circle;
    use crate::entities::comparison::Verdict;
    use crate::entities::part::PartType;
    use crate::store::read_measurements;
    use std::fs;
    use tempfile::TempDir;

    fn bearing_spec() -> PartSpec {
        PartSpec::new(
            PartType::Bearing,
            [(Dimension::OuterDiameter, 30.0), (Dimension::InnerDiameter, 14.0)],
        )
        .unwrap()
    }

    /// Bearing frame at 4 px/mm: OD `od_mm`, bore 14 mm
    fn bearing_frame(od_mm: f64) -> Frame {
        Frame {
            timestamp: None,
            rois: vec![Roi {
                width: 300.0,
                height: 300.0,
                circles: vec![circle(150.0, 150.0, od_mm * 2.0), circle(150.0, 150.0, 28.0)],
                ..Default::default()
            }],
        }
    }

    fn empty_frame() -> Frame {
        Frame {
            timestamp: None,
            rois: vec![Roi {
                width: 300.0,
                height: 300.0,
                ..Default::default()
            }],
        }
    }

    fn nominal_session() -> InspectionSession {
        InspectionSession::new(bearing_spec(), &DetectorParams::default(), ToleranceConfig::default())
            .with_anchor(CalibrationAnchor::Nominal {
                dimension: Dimension::OuterDiameter,
            })
    }

    #[test]
    fn test_first_detection_locks_scale() {
        let mut session = nominal_session();
        let outcomes = session.process_frame(&bearing_frame(30.0)).unwrap();
        assert!(matches!(
            &outcomes[0],
            FrameOutcome::Measured { record: Some(r), .. } if r.status == Verdict::NotDefective
        ));
        assert!((session.calibration().get_scale().unwrap() - 0.25).abs() < 1e-12);

        // a larger part later is measured against the locked scale
        let outcomes = session.process_frame(&bearing_frame(35.0)).unwrap();
        match &outcomes[0] {
            FrameOutcome::Measured { measurement, record } => {
                assert!((measurement.get(Dimension::OuterDiameter).unwrap() - 35.0).abs() < 1e-9);
                assert_eq!(record.as_ref().unwrap().status, Verdict::Defective);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!((session.calibration().get_scale().unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_no_anchor_means_pending_but_session_continues() {
        let mut session =
            InspectionSession::new(bearing_spec(), &DetectorParams::default(), ToleranceConfig::default());
        let outcomes = session.process_frame(&bearing_frame(30.0)).unwrap();
        assert!(matches!(
            outcomes[0],
            FrameOutcome::CalibrationPending(CalibrationError::Pending)
        ));
        let outcomes = session.process_frame(&empty_frame()).unwrap();
        assert!(matches!(outcomes[0], FrameOutcome::NoDetection));

        let summary = session.finish();
        assert_eq!(summary.stats.frames, 2);
        assert_eq!(summary.stats.calibration_errors, 1);
        assert_eq!(summary.scale_mm_per_px, None);
        assert!(summary.report.records.is_empty());
    }

    #[test]
    fn test_missing_nominal_anchor_is_isolated() {
        let mut session =
            InspectionSession::new(bearing_spec(), &DetectorParams::default(), ToleranceConfig::default())
                .with_anchor(CalibrationAnchor::Nominal {
                    dimension: Dimension::AcrossFlats,
                });
        let outcomes = session.process_frame(&bearing_frame(30.0)).unwrap();
        assert!(matches!(
            outcomes[0],
            FrameOutcome::CalibrationPending(CalibrationError::MissingNominal(Dimension::AcrossFlats))
        ));
    }

    #[test]
    fn test_replay_writes_log_and_sidecar() {
        let tmp = TempDir::new().unwrap();
        let log_path = tmp.path().join("measurements.csv");
        let live_path = tmp.path().join("live.txt");

        let mut session = nominal_session()
            .with_log(MeasurementLog::open(&log_path, PartType::Bearing, false).unwrap())
            .with_live_status(LiveStatus::new(&live_path));

        let frames = vec![bearing_frame(30.0), empty_frame(), bearing_frame(30.5)];
        session
            .run_replay(frames, &AtomicBool::new(false), &RunOptions::default(), |_| {})
            .unwrap();

        let summary = session.finish();
        assert_eq!(summary.stats.frames, 3);
        assert_eq!(summary.stats.measurements, 2);
        assert_eq!(summary.report.stats.not_defective, 2);

        assert_eq!(read_measurements(&log_path).unwrap().len(), 2);
        let live = fs::read_to_string(&live_path).unwrap();
        assert!(live.contains("OUTER DIAMETER: 30.50 mm"));
        assert!(live.contains("STATUS: NOT DEFECTIVE"));
    }

    #[test]
    fn test_replay_honours_stop_and_max_frames() {
        let mut session = nominal_session();
        let frames: Vec<Frame> = (0..10).map(|_| bearing_frame(30.0)).collect();
        let options = RunOptions {
            max_frames: Some(4),
            ..Default::default()
        };
        session
            .run_replay(frames.clone(), &AtomicBool::new(false), &options, |_| {})
            .unwrap();
        assert_eq!(session.stats().frames, 4);

        let mut stopped = nominal_session();
        stopped
            .run_replay(frames, &AtomicBool::new(true), &RunOptions::default(), |_| {})
            .unwrap();
        assert_eq!(stopped.stats().frames, 0);
    }

    #[test]
    fn test_live_processes_latest_frames() {
        let mut session = nominal_session();
        let frames: Vec<Frame> = (0..20).map(|_| bearing_frame(30.0)).collect();
        let options = RunOptions {
            frame_interval: Some(Duration::from_millis(1)),
            ..Default::default()
        };
        session
            .run_live(frames, &AtomicBool::new(false), &options, |_| {})
            .unwrap();

        let stats = session.stats();
        assert!(stats.frames >= 1);
        assert_eq!(stats.frames as u64 + stats.dropped_frames, 20);
        assert!(session.calibration().is_locked());
    }

    #[test]
    fn test_live_returns_on_stop_while_source_blocks() {
        let (tx, rx) = std::sync::mpsc::channel::<Frame>();
        let source = std::iter::from_fn(move || rx.recv().ok());
        let stop = Arc::new(AtomicBool::new(false));

        let timer = {
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                stop.store(true, Ordering::Relaxed);
            })
        };

        let (done_tx, done_rx) = std::sync::mpsc::channel();
        let worker_stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut session = nominal_session();
            let result = session.run_live(source, &worker_stop, &RunOptions::default(), |_| {});
            let _ = done_tx.send((result.is_ok(), session.stats().frames));
        });

        let (ok, frames) = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("live loop should return once stopped");
        assert!(ok);
        assert_eq!(frames, 0);
        timer.join().unwrap();
        // the sender outlives the session, so the source never ended on its own
        drop(tx);
    }
}
