//! Attention fusion
//!
//! Scores each detector's output, fuses the four sub-scores into a single
//! weighted attention score, and tracks consecutive-frame counters that
//! raise alerts once an adverse behavior persists.

use crate::config::AttentionConfig;
use crate::history::History;
use crate::types::{
    AlertKind, AttentionAlert, AttentionMetrics, ExpressionMetrics, FaceDirection, GazeSource,
    GestureMetrics, HeadDirection, HeadPoseMetrics, PostureBucket, PostureMetrics,
};

/// Gaze score when neither head pose nor face direction is available
pub const DEFAULT_GAZE_SCORE: f64 = 0.5;

/// The four per-signal sub-scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SignalScores {
    pub expression: f64,
    pub posture: f64,
    pub gesture: f64,
    pub gaze: f64,
}

/// Weighted sum of the sub-scores
pub fn fuse(scores: &SignalScores, config: &AttentionConfig) -> f64 {
    let fused = config.expression_weight * scores.expression
        + config.posture_weight * scores.posture
        + config.gesture_weight * scores.gesture
        + config.gaze_weight * scores.gaze;
    fused.clamp(0.0, 1.0)
}

pub fn expression_score(expression: Option<&ExpressionMetrics>) -> f64 {
    match expression {
        Some(e) if e.face_detected && e.expression.is_positive() => 0.8 + 0.2 * e.confidence,
        Some(e) if e.face_detected && e.expression.is_negative() => (0.2 - 0.2 * e.confidence).max(0.0),
        _ => 0.5,
    }
}

pub fn posture_score(posture: Option<&PostureMetrics>) -> f64 {
    match posture.map(|p| p.status.bucket()) {
        Some(PostureBucket::Good) => 0.9,
        Some(PostureBucket::Poor) => 0.2,
        _ => 0.6,
    }
}

pub fn gesture_score(gesture: Option<&GestureMetrics>, config: &AttentionConfig) -> f64 {
    let Some(g) = gesture else {
        return 1.0;
    };
    let mut score = 1.0;
    if g.face_touching {
        score -= config.face_touch_penalty;
    }
    if g.hand_fidgeting {
        score -= config.fidget_penalty;
    }
    if g.excessive_gesturing {
        score -= config.excessive_gesture_penalty;
    }
    if g.arms_crossed {
        score -= config.crossed_arms_penalty;
    }
    if g.hand_near_head {
        score -= config.near_head_penalty;
    }
    f64::max(score, 0.0)
}

/// Gaze score from the face-direction heuristic: frontal faces score high,
/// larger deviations score lower.
pub fn face_direction_score(direction: &FaceDirection) -> f64 {
    let by_angle = (1.0 - direction.angle / 90.0).clamp(0.0, 1.0);
    match direction.direction {
        HeadDirection::Center => by_angle.max(0.7),
        _ => by_angle.min(0.6),
    }
}

/// Gaze: solved head pose first, then face direction, then the head pose
/// fallback engagement of an unsolved pose, then a neutral default
pub fn gaze_score(
    head_pose: Option<&HeadPoseMetrics>,
    face_direction: Option<&FaceDirection>,
) -> (f64, GazeSource) {
    match (head_pose, face_direction) {
        (Some(pose), _) if pose.solved => (pose.engagement, GazeSource::HeadPose),
        (_, Some(direction)) => (face_direction_score(direction), GazeSource::FaceDirection),
        (Some(pose), None) => (pose.engagement, GazeSource::HeadPose),
        (None, None) => (DEFAULT_GAZE_SCORE, GazeSource::Default),
    }
}

/// Detector outputs for one frame
#[derive(Debug, Clone, Copy, Default)]
pub struct AttentionInputs<'a> {
    pub expression: Option<&'a ExpressionMetrics>,
    pub posture: Option<&'a PostureMetrics>,
    pub gesture: Option<&'a GestureMetrics>,
    pub head_pose: Option<&'a HeadPoseMetrics>,
    pub face_direction: Option<&'a FaceDirection>,
}

/// Per-session attention tracker
#[derive(Debug, Clone)]
pub struct AttentionTracker {
    config: AttentionConfig,
    poor_posture_consecutive: u32,
    not_focusing_consecutive: u32,
    fidgeting_consecutive: u32,
    total_frames: u64,
    history: History<f64>,
}

impl Default for AttentionTracker {
    fn default() -> Self {
        Self::new(AttentionConfig::default())
    }
}

impl AttentionTracker {
    pub fn new(config: AttentionConfig) -> Self {
        Self {
            history: History::new(config.score_history),
            poor_posture_consecutive: 0,
            not_focusing_consecutive: 0,
            fidgeting_consecutive: 0,
            total_frames: 0,
            config,
        }
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Mean of the recent attention history
    pub fn average_attention(&self) -> Option<f64> {
        self.history.mean()
    }

    pub fn calculate_attention(&mut self, inputs: &AttentionInputs<'_>) -> AttentionMetrics {
        let (gaze, gaze_source) = gaze_score(inputs.head_pose, inputs.face_direction);
        let scores = SignalScores {
            expression: expression_score(inputs.expression),
            posture: posture_score(inputs.posture),
            gesture: gesture_score(inputs.gesture, &self.config),
            gaze,
        };
        let attention = fuse(&scores, &self.config);

        let poor_posture = inputs
            .posture
            .map(|p| p.status.bucket() == PostureBucket::Poor)
            .unwrap_or(false);
        let not_focusing = gaze < self.config.focus_threshold;
        let fidgeting = inputs.gesture.map(|g| g.hand_fidgeting).unwrap_or(false)
            || inputs.posture.map(|p| p.is_fidgeting).unwrap_or(false);

        self.poor_posture_consecutive = advance(self.poor_posture_consecutive, poor_posture);
        self.not_focusing_consecutive = advance(self.not_focusing_consecutive, not_focusing);
        self.fidgeting_consecutive = advance(self.fidgeting_consecutive, fidgeting);
        self.total_frames += 1;
        self.history.push(attention);

        AttentionMetrics {
            attention_score: attention,
            expression_score: scores.expression,
            posture_score: scores.posture,
            gesture_score: scores.gesture,
            gaze_score: scores.gaze,
            gaze_source,
            is_engaged: attention > self.config.engaged_threshold,
            is_distracted: attention < self.config.distracted_threshold,
            alerts: self.alerts(),
            poor_posture_consecutive: self.poor_posture_consecutive,
            not_focusing_consecutive: self.not_focusing_consecutive,
            fidgeting_consecutive: self.fidgeting_consecutive,
            average_attention: self.history.mean().unwrap_or(attention),
        }
    }

    /// One alert per behavior whose counter has reached its threshold
    fn alerts(&self) -> Vec<AttentionAlert> {
        [
            (
                AlertKind::PoorPosture,
                self.poor_posture_consecutive,
                self.config.poor_posture_frames,
            ),
            (
                AlertKind::NotFocusing,
                self.not_focusing_consecutive,
                self.config.not_focusing_frames,
            ),
            (
                AlertKind::Fidgeting,
                self.fidgeting_consecutive,
                self.config.fidgeting_frames,
            ),
        ]
        .into_iter()
        .filter(|(_, count, threshold)| *count >= *threshold)
        .map(|(kind, count, _)| AttentionAlert {
            kind,
            consecutive_frames: count,
            message: alert_message(kind, count),
        })
        .collect()
    }

    pub fn reset(&mut self) {
        self.poor_posture_consecutive = 0;
        self.not_focusing_consecutive = 0;
        self.fidgeting_consecutive = 0;
        self.total_frames = 0;
        self.history.clear();
    }
}

fn advance(counter: u32, condition: bool) -> u32 {
    if condition {
        counter.saturating_add(1)
    } else {
        0
    }
}

fn alert_message(kind: AlertKind, frames: u32) -> String {
    match kind {
        AlertKind::PoorPosture => format!("Poor posture for {frames} frames: sit upright"),
        AlertKind::NotFocusing => format!("Looking away for {frames} frames: face the camera"),
        AlertKind::Fidgeting => format!("Fidgeting for {frames} frames: keep your hands still"),
    }
}
