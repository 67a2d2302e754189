//! Pipeline orchestration
//!
//! This module provides the public API for Synheart Presence.
//! It wires one instance of every detector, the attention tracker and the
//! session logger into a per-interview session.

use crate::attention::{AttentionInputs, AttentionTracker};
use crate::config::PresenceConfig;
use crate::detectors::{
    estimate_face_direction, EmotionClassifier, ExpressionDetector, GestureDetector,
    HeadPoseEstimator, PostureAnalyzer,
};
use crate::error::PresenceError;
use crate::input::{view_frame, FrameAdapter};
use crate::session::{InterviewAnalysisReport, InterviewReporter, SessionInfo, SessionLogger, SessionSummary};
use crate::types::{FrameInput, FrameRecord, LandmarkSet};
use std::path::Path;
use tracing::{info, warn};

/// Analyze a complete recorded stream with the default configuration.
///
/// Runs a fresh session over `frames` in order and returns the report
/// without writing any artifacts. Frames rejected as invalid are skipped.
///
/// # Example
/// ```ignore
/// let frames = FrameAdapter::parse_ndjson(&ndjson)?;
/// let report = analyze_frames(&frames)?;
/// println!("{}", report.overall_interview_score.overall_score);
/// ```
pub fn analyze_frames(frames: &[FrameInput]) -> Result<InterviewAnalysisReport, PresenceError> {
    analyze_frames_with_config(frames, PresenceConfig::default())
}

pub fn analyze_frames_with_config(
    frames: &[FrameInput],
    config: PresenceConfig,
) -> Result<InterviewAnalysisReport, PresenceError> {
    let mut session = InterviewSession::new(config);
    session.start_session();
    for (index, frame) in frames.iter().enumerate() {
        match session.process_frame(frame) {
            Ok(_) => {}
            Err(PresenceError::InvalidFrame(reason)) => {
                warn!(index, %reason, "skipping invalid frame");
            }
            Err(e) => return Err(e),
        }
    }
    session.current_report()
}

/// Convert an NDJSON frame stream into report JSON.
///
/// # Arguments
/// * `ndjson` - One `FrameInput` JSON object per line
///
/// # Returns
/// The pretty-printed interview analysis report
pub fn analyze_ndjson(ndjson: String) -> Result<String, PresenceError> {
    let frames = FrameAdapter::parse_ndjson(&ndjson)?;
    let report = analyze_frames(&frames)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Stateful per-interview session.
///
/// Call `start_session`, feed frames in capture order with `process_frame`,
/// then `stop_session` to write the artifacts and get the report. Sessions
/// share nothing; run one per concurrent interview.
pub struct InterviewSession {
    config: PresenceConfig,
    expression: ExpressionDetector,
    head_pose: HeadPoseEstimator,
    posture: PostureAnalyzer,
    gesture: GestureDetector,
    attention: AttentionTracker,
    logger: SessionLogger,
    reporter: InterviewReporter,
}

impl Default for InterviewSession {
    fn default() -> Self {
        Self::new(PresenceConfig::default())
    }
}

impl InterviewSession {
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            expression: ExpressionDetector::new(config.expression.clone()),
            head_pose: HeadPoseEstimator::new(config.head_pose.clone()),
            posture: PostureAnalyzer::new(config.posture.clone()),
            gesture: GestureDetector::new(config.gesture.clone()),
            attention: AttentionTracker::new(config.attention.clone()),
            logger: SessionLogger::new(config.session.clone()),
            reporter: InterviewReporter::new(config.session.clone()),
            config,
        }
    }

    /// Attach the external emotion classifier
    pub fn with_classifier(mut self, classifier: Box<dyn EmotionClassifier>) -> Self {
        self.expression.set_classifier(Some(classifier));
        self
    }

    /// Use a fixed report producer instance id
    pub fn with_instance_id(mut self, instance_id: String) -> Self {
        self.reporter = InterviewReporter::with_instance_id(instance_id, self.config.session.clone());
        self
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    pub fn is_active(&self) -> bool {
        self.logger.is_active()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.logger.session_id()
    }

    pub fn frames_logged(&self) -> u64 {
        self.logger.frames_logged()
    }

    /// Calibrate the posture baseline from frames of the candidate sitting
    /// upright. Returns false when too few frames had a usable pose.
    pub fn calibrate_posture(&mut self, frames: &[LandmarkSet]) -> bool {
        let calibrated = self.posture.calibrate(frames);
        if calibrated {
            info!(frames = frames.len(), "posture baseline calibrated");
        } else {
            warn!(frames = frames.len(), "posture calibration needs more usable frames");
        }
        calibrated
    }

    /// Start a new session. Every detector and the tracker are reset; a
    /// session already in progress is discarded.
    pub fn start_session(&mut self) -> SessionInfo {
        if let Some(previous) = self.logger.session_id() {
            warn!(session_id = previous, "discarding unfinished session");
        }
        self.expression.reset();
        self.posture.reset();
        self.gesture.reset();
        self.attention.reset();
        let info = self.logger.start_session();
        info!(
            session_id = %info.session_id,
            buffer_capacity = info.buffer_capacity,
            posture_calibrated = self.posture.is_calibrated(),
            "session started"
        );
        info
    }

    /// Run one frame through every detector and the tracker, and log it
    pub fn process_frame(&mut self, frame: &FrameInput) -> Result<FrameRecord, PresenceError> {
        if !self.logger.is_active() {
            return Err(PresenceError::NoActiveSession(
                "call start_session before process_frame".to_string(),
            ));
        }
        let view = view_frame(frame)?;
        for issue in &view.issues {
            warn!(timestamp = view.timestamp, %issue, "ignoring malformed frame input");
        }

        let expression = self.expression.analyze(view.face, view.image, view.timestamp);
        let head_pose = self.head_pose.estimate(view.face, view.width, view.height);
        let face_direction = match head_pose {
            Some(pose) if pose.solved => None,
            _ => view.face.and_then(|face| {
                estimate_face_direction(face, view.width, view.height, self.head_pose.config())
            }),
        };
        let posture = self.posture.analyze(view.pose);
        let gesture = self.gesture.analyze(&view.hands, view.face);

        let attention = self.attention.calculate_attention(&AttentionInputs {
            expression: Some(&expression),
            posture: Some(&posture),
            gesture: Some(&gesture),
            head_pose: head_pose.as_ref(),
            face_direction: face_direction.as_ref(),
        });

        let record = FrameRecord {
            frame_number: 0,
            elapsed_seconds: 0.0,
            expression: Some(expression),
            head_pose,
            posture: Some(posture),
            gesture: Some(gesture),
            attention,
        };
        self.logger.log_frame_data(record, view.timestamp)
    }

    /// Report over the frames buffered so far, without ending the session
    pub fn current_report(&self) -> Result<InterviewAnalysisReport, PresenceError> {
        self.logger.export_interview_analysis(&self.reporter)
    }

    /// Write the session artifacts into `dir` and end the session
    pub fn stop_session(&mut self, dir: &Path) -> Result<SessionSummary, PresenceError> {
        let summary = self.logger.finish(dir, &self.reporter)?;
        info!(
            session_id = %summary.session_id,
            frames = summary.frame_count,
            duration_sec = summary.duration_sec,
            score = summary.report.overall_interview_score.overall_score,
            "session stopped"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{EmotionReading, FaceCrop};
    use crate::fixtures::{frame_at, hand_at, posed_face_mesh, slouched_pose, solid_image};
    use crate::session::{load_report, Rating};
    use crate::types::{Emotion, EmotionSource, GazeSource, Point};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    struct FailingClassifier;

    impl EmotionClassifier for FailingClassifier {
        fn classify(&mut self, _face: &FaceCrop) -> Result<EmotionReading, PresenceError> {
            Err(PresenceError::Classifier("model not loaded".to_string()))
        }
    }

    struct HappyClassifier;

    impl EmotionClassifier for HappyClassifier {
        fn classify(&mut self, _face: &FaceCrop) -> Result<EmotionReading, PresenceError> {
            Ok(EmotionReading::single(Emotion::Happy, 0.9))
        }
    }

    fn engaged_frames(count: usize) -> Vec<FrameInput> {
        (0..count).map(|i| frame_at(i as f64 / 30.0)).collect()
    }

    fn disengaged_frames(count: usize) -> Vec<FrameInput> {
        (0..count)
            .map(|i| {
                let mut frame = frame_at(i as f64 / 30.0);
                frame.face = Some(posed_face_mesh(0.3, 0.1, 40.0, 0.0, 0.0));
                frame.pose = Some(slouched_pose());
                frame.hands = vec![hand_at(0.5, 0.45, None)];
                frame
            })
            .collect()
    }

    #[test]
    fn test_process_before_start() {
        let mut session = InterviewSession::default();
        let err = session.process_frame(&frame_at(0.0)).unwrap_err();
        assert!(matches!(err, PresenceError::NoActiveSession(_)));
    }

    #[test]
    fn test_frames_are_stamped() {
        let mut session = InterviewSession::default();
        session.start_session();
        let first = session.process_frame(&frame_at(5.0)).unwrap();
        let second = session.process_frame(&frame_at(5.5)).unwrap();
        assert_eq!(first.frame_number, 1);
        assert_eq!(second.frame_number, 2);
        assert_eq!(second.elapsed_seconds, 0.5);
        assert!(first.head_pose.map_or(false, |h| h.solved));
        assert_eq!(first.attention.gaze_source, GazeSource::HeadPose);
    }

    #[test]
    fn test_malformed_parts_are_treated_as_missing() {
        let mut session = InterviewSession::default();
        session.start_session();
        let mut frame = frame_at(0.0);
        frame.face = Some(LandmarkSet::new(vec![Point::new(0.5, 0.5); 3]));
        let record = session.process_frame(&frame).unwrap();
        assert!(record.head_pose.is_none());
        assert!(!record.expression.as_ref().map_or(true, |e| e.face_detected));
        assert!(record.posture.as_ref().map_or(false, |p| p.pose_detected));
        assert_eq!(record.attention.gaze_source, GazeSource::Default);
    }

    #[test]
    fn test_bad_timestamp_is_rejected() {
        let mut session = InterviewSession::default();
        session.start_session();
        let err = session.process_frame(&frame_at(f64::NAN)).unwrap_err();
        assert!(matches!(err, PresenceError::InvalidFrame(_)));
        assert_eq!(session.frames_logged(), 0);
    }

    #[test]
    fn test_stop_writes_artifacts_once() {
        let dir = tempdir().unwrap();
        let mut session = InterviewSession::default().with_instance_id("test-instance".to_string());
        let info = session.start_session();
        for frame in engaged_frames(90) {
            session.process_frame(&frame).unwrap();
        }
        let summary = session.stop_session(dir.path()).unwrap();

        assert_eq!(summary.session_id, info.session_id);
        assert_eq!(summary.frame_count, 90);
        assert!((summary.duration_sec - 89.0 / 30.0).abs() < 1e-9);
        assert_eq!(summary.report.total_frames, 90);
        assert_eq!(summary.report.producer.instance_id, "test-instance");
        assert!(summary.report_paths.raw.exists());

        let loaded = load_report(&summary.report_paths.analysis).unwrap();
        assert_eq!(loaded, summary.report);

        let err = session.stop_session(dir.path()).unwrap_err();
        assert!(matches!(err, PresenceError::NoActiveSession(_)));
    }

    #[test]
    fn test_engaged_outscores_disengaged() {
        let engaged = analyze_frames(&engaged_frames(120)).unwrap();
        let disengaged = analyze_frames(&disengaged_frames(120)).unwrap();

        let engaged_score = engaged.overall_interview_score.overall_score;
        let disengaged_score = disengaged.overall_interview_score.overall_score;
        assert!(engaged_score > 80.0, "engaged score {engaged_score}");
        assert!(
            disengaged_score < engaged_score - 20.0,
            "disengaged score {disengaged_score}"
        );
        assert_ne!(engaged.overall_interview_score.rating, Rating::Poor);
    }

    #[test]
    fn test_restart_resets_state() {
        let mut session = InterviewSession::default();
        let first = session.start_session();
        for frame in disengaged_frames(10) {
            session.process_frame(&frame).unwrap();
        }
        let second = session.start_session();
        assert_ne!(first.session_id, second.session_id);
        let record = session.process_frame(&frame_at(100.0)).unwrap();
        assert_eq!(record.frame_number, 1);
        assert_eq!(record.elapsed_seconds, 0.0);
        assert_eq!(record.gesture.map(|g| g.face_touch_count), Some(0));
    }

    #[test]
    fn test_classifier_failure_falls_back_to_heuristic() {
        let mut session = InterviewSession::default().with_classifier(Box::new(FailingClassifier));
        session.start_session();
        let mut frame = frame_at(0.0);
        frame.image = Some(solid_image(640, 480));
        let record = session.process_frame(&frame).unwrap();
        let expression = record.expression.unwrap();
        assert!(expression.face_detected);
        assert_eq!(expression.emotion_source, EmotionSource::Heuristic);
    }

    #[test]
    fn test_classifier_drives_expression() {
        let mut session = InterviewSession::default().with_classifier(Box::new(HappyClassifier));
        session.start_session();
        let mut last = None;
        for i in 0..12 {
            let mut frame = frame_at(i as f64 / 30.0);
            frame.image = Some(solid_image(640, 480));
            last = Some(session.process_frame(&frame).unwrap());
        }
        let expression = last.and_then(|r| r.expression).unwrap();
        assert!(expression.expression.is_positive());
    }

    #[test]
    fn test_analyze_ndjson() {
        let ndjson = engaged_frames(3)
            .iter()
            .map(|f| serde_json::to_string(f).unwrap())
            .collect::<Vec<_>>()
            .join("\n");
        let json = analyze_ndjson(ndjson).unwrap();
        let report: InterviewAnalysisReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.total_frames, 3);
    }

    #[test]
    fn test_invalid_frame_does_not_stop_analysis() {
        let mut frames = engaged_frames(30);
        frames[15].width = 0;
        frames[20].timestamp = f64::NAN;
        let report = analyze_frames(&frames).unwrap();
        assert_eq!(report.total_frames, 28);

        let clean: Vec<FrameInput> = frames
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != 15 && *i != 20)
            .map(|(_, f)| f.clone())
            .collect();
        let expected = analyze_frames(&clean).unwrap();
        assert_eq!(report.overall_interview_score, expected.overall_interview_score);
    }

    #[test]
    fn test_degenerate_face_keeps_pose_fallback_gaze() {
        let mut session = InterviewSession::default();
        session.start_session();
        let mut frame = frame_at(0.0);
        frame.face = Some(LandmarkSet::new(vec![Point::new(0.5, 0.5); 468]));
        let record = session.process_frame(&frame).unwrap();
        let pose = record.head_pose.unwrap();
        assert!(!pose.solved);
        assert_eq!(record.attention.gaze_source, GazeSource::HeadPose);
        assert_eq!(record.attention.gaze_score, pose.engagement);
    }

    #[test]
    fn test_empty_stream_is_neutral() {
        let report = analyze_frames(&[]).unwrap();
        assert_eq!(report.total_frames, 0);
        assert_eq!(report.overall_interview_score.overall_score, 50.0);
    }
}
