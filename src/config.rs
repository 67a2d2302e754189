//! Pipeline configuration
//!
//! Every threshold, window and weight the detectors use lives here, one
//! struct per component, injected at construction. All sections deserialize
//! with defaults so a config file only needs the values it overrides.
//!
//! The fusion and head-pose weights are product-tuning defaults, not
//! canonical values.

use crate::error::PresenceError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Expression detector thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpressionConfig {
    /// Smoothing factor for EAR/MAR (weight of the previous value)
    pub smoothing_alpha: f64,
    /// Frames of smoothed EAR/MAR kept
    pub ratio_window: usize,
    /// Classified labels kept
    pub label_window: usize,
    /// Labels considered by the majority vote
    pub vote_window: usize,
    /// Votes a non-calm label needs to be reported
    pub min_votes: usize,
    /// Smoothed EAR below this counts as eyes closed
    pub ear_sleepy_threshold: f64,
    /// Minimum seconds between two recorded blinks
    pub blink_debounce_sec: f64,
    /// Window for the blink rate, seconds
    pub blink_window_sec: f64,
    /// Upper bound on the reported blink rate
    pub max_blink_rate: f64,
    /// Run the classifier every Nth frame
    pub classifier_interval: u32,
    /// Classifier results below this are forced to calm
    pub min_confidence: f64,
    /// Confidence multiplier applied to gated readings
    pub low_confidence_scale: f64,
    /// Boost when exactly `min_votes` agree
    pub consistency_boost_min: f64,
    /// Boost when the whole vote window agrees
    pub consistency_boost_max: f64,
    pub confidence_cap: f64,
    /// Smallest face crop side (pixels) handed to the classifier
    pub min_face_size_px: u32,
    /// Padding around the landmark bounding box, as a fraction of its size
    pub crop_padding: f64,
    pub high_stress_bpm: f64,
    pub moderate_stress_bpm: f64,
    pub drowsy_bpm: f64,
}

impl Default for ExpressionConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.6,
            ratio_window: 30,
            label_window: 7,
            vote_window: 5,
            min_votes: 3,
            ear_sleepy_threshold: 0.20,
            blink_debounce_sec: 0.15,
            blink_window_sec: 60.0,
            max_blink_rate: 100.0,
            classifier_interval: 2,
            min_confidence: 0.35,
            low_confidence_scale: 0.5,
            consistency_boost_min: 0.05,
            consistency_boost_max: 0.10,
            confidence_cap: 0.95,
            min_face_size_px: 48,
            crop_padding: 0.15,
            high_stress_bpm: 35.0,
            moderate_stress_bpm: 25.0,
            drowsy_bpm: 10.0,
        }
    }
}

/// Head pose estimator thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadPoseConfig {
    /// |yaw| and |pitch| below this are "center"
    pub center_tolerance_deg: f64,
    /// |yaw| beyond this is left/right
    pub yaw_direction_deg: f64,
    /// |pitch| beyond this is up/down
    pub pitch_direction_deg: f64,
    pub yaw_tolerance_deg: f64,
    pub pitch_tolerance_deg: f64,
    pub roll_tolerance_deg: f64,
    /// Degrees past tolerance at which each penalty saturates
    pub yaw_penalty_span_deg: f64,
    pub pitch_penalty_span_deg: f64,
    pub roll_penalty_span_deg: f64,
    pub yaw_weight: f64,
    pub pitch_weight: f64,
    pub roll_weight: f64,
    pub min_engagement: f64,
    /// Engagement reported when the solver fails
    pub fallback_engagement: f64,
    /// RMS reprojection error (pixels, relative to face width) beyond which a solve is rejected
    pub max_reprojection_ratio: f64,
    pub max_iterations: usize,
}

impl Default for HeadPoseConfig {
    fn default() -> Self {
        Self {
            center_tolerance_deg: 15.0,
            yaw_direction_deg: 20.0,
            pitch_direction_deg: 15.0,
            yaw_tolerance_deg: 15.0,
            pitch_tolerance_deg: 15.0,
            roll_tolerance_deg: 10.0,
            yaw_penalty_span_deg: 45.0,
            pitch_penalty_span_deg: 30.0,
            roll_penalty_span_deg: 30.0,
            yaw_weight: 0.6,
            pitch_weight: 0.3,
            roll_weight: 0.1,
            min_engagement: 0.3,
            fallback_engagement: 0.7,
            max_reprojection_ratio: 0.25,
            max_iterations: 100,
        }
    }
}

/// Posture analyzer thresholds (degrees unless noted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    pub smoothing_alpha: f64,
    pub angle_window: usize,
    pub shoulder_window: usize,
    pub fidget_window: usize,
    /// Shoulder-center variance above this is fidgeting
    pub fidget_variance_threshold: f64,
    pub min_calibration_frames: usize,
    /// Minimum visibility for a pose point to count
    pub min_visibility: f64,
    pub slouch_torso_deg: f64,
    pub bad_neck_deg: f64,
    pub lean_back_torso_deg: f64,
    /// Shoulder depth difference (normalized z) above this is facing away
    pub facing_away_depth: f64,
    /// Shoulder height difference (normalized y) below this is aligned
    pub shoulder_alignment: f64,
    pub forward_lean_min_deg: f64,
    pub good_torso_deg: f64,
    pub good_neck_deg: f64,
    pub neutral_torso_deg: f64,
    pub neutral_neck_deg: f64,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            smoothing_alpha: 0.7,
            angle_window: 30,
            shoulder_window: 90,
            fidget_window: 30,
            fidget_variance_threshold: 0.0008,
            min_calibration_frames: 10,
            min_visibility: 0.5,
            slouch_torso_deg: 20.0,
            bad_neck_deg: 25.0,
            lean_back_torso_deg: -12.0,
            facing_away_depth: 0.15,
            shoulder_alignment: 0.05,
            forward_lean_min_deg: 8.0,
            good_torso_deg: 8.0,
            good_neck_deg: 12.0,
            neutral_torso_deg: 12.0,
            neutral_neck_deg: 20.0,
        }
    }
}

/// Gesture detector thresholds (normalized image units)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub history_window: usize,
    pub motion_window: usize,
    pub face_touch_distance: f64,
    /// Multiplier on the touch distance for hand-near-head
    pub near_head_factor: f64,
    pub fidget_velocity: f64,
    pub fidget_variance: f64,
    pub excessive_amplitude: f64,
    pub crossed_arms_distance: f64,
    /// Max horizontal offset from frame center for crossed arms
    pub crossed_arms_center_band: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            history_window: 90,
            motion_window: 30,
            face_touch_distance: 0.06,
            near_head_factor: 2.0,
            fidget_velocity: 0.008,
            fidget_variance: 0.0002,
            excessive_amplitude: 0.35,
            crossed_arms_distance: 0.2,
            crossed_arms_center_band: 0.15,
        }
    }
}

/// Attention fusion weights, scores and alert thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttentionConfig {
    pub expression_weight: f64,
    pub posture_weight: f64,
    pub gesture_weight: f64,
    pub gaze_weight: f64,
    pub face_touch_penalty: f64,
    pub fidget_penalty: f64,
    pub excessive_gesture_penalty: f64,
    pub crossed_arms_penalty: f64,
    pub near_head_penalty: f64,
    /// Gaze below this counts as not focusing
    pub focus_threshold: f64,
    pub engaged_threshold: f64,
    pub distracted_threshold: f64,
    pub poor_posture_frames: u32,
    pub not_focusing_frames: u32,
    pub fidgeting_frames: u32,
    pub score_history: usize,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            expression_weight: 0.25,
            posture_weight: 0.30,
            gesture_weight: 0.15,
            gaze_weight: 0.30,
            face_touch_penalty: 0.3,
            fidget_penalty: 0.25,
            excessive_gesture_penalty: 0.2,
            crossed_arms_penalty: 0.15,
            near_head_penalty: 0.1,
            focus_threshold: 0.3,
            engaged_threshold: 0.7,
            distracted_threshold: 0.4,
            poor_posture_frames: 300,
            not_focusing_frames: 90,
            fidgeting_frames: 150,
            score_history: 100,
        }
    }
}

/// Session buffer and report weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum frames kept in the session buffer (FIFO eviction)
    pub buffer_capacity: usize,
    pub attention_weight: f64,
    pub posture_weight: f64,
    pub emotional_control_weight: f64,
    pub gesture_control_weight: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 54_000,
            attention_weight: 0.30,
            posture_weight: 0.25,
            emotional_control_weight: 0.25,
            gesture_control_weight: 0.20,
        }
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    pub expression: ExpressionConfig,
    pub head_pose: HeadPoseConfig,
    pub posture: PostureConfig,
    pub gesture: GestureConfig,
    pub attention: AttentionConfig,
    pub session: SessionConfig,
}

impl PresenceConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, PresenceError> {
        let config: PresenceConfig = serde_json::from_str(json)
            .map_err(|e| PresenceError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn from_file(path: &Path) -> Result<Self, PresenceError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, PresenceError> {
        serde_json::to_string_pretty(self).map_err(PresenceError::JsonError)
    }

    /// Reject configurations the detectors cannot run with
    pub fn validate(&self) -> Result<(), PresenceError> {
        let fusion = self.attention.expression_weight
            + self.attention.posture_weight
            + self.attention.gesture_weight
            + self.attention.gaze_weight;
        if (fusion - 1.0).abs() > 1e-6 {
            return Err(PresenceError::Config(format!(
                "attention weights must sum to 1.0, got {fusion:.4}"
            )));
        }

        let report = self.session.attention_weight
            + self.session.posture_weight
            + self.session.emotional_control_weight
            + self.session.gesture_control_weight;
        if (report - 1.0).abs() > 1e-6 {
            return Err(PresenceError::Config(format!(
                "report weights must sum to 1.0, got {report:.4}"
            )));
        }

        for (name, alpha) in [
            ("expression.smoothing_alpha", self.expression.smoothing_alpha),
            ("posture.smoothing_alpha", self.posture.smoothing_alpha),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(PresenceError::Config(format!("{name} must be within [0, 1]")));
            }
        }

        if self.expression.classifier_interval == 0 {
            return Err(PresenceError::Config(
                "expression.classifier_interval must be at least 1".to_string(),
            ));
        }
        if self.expression.min_votes > self.expression.vote_window {
            return Err(PresenceError::Config(
                "expression.min_votes cannot exceed expression.vote_window".to_string(),
            ));
        }
        if self.session.buffer_capacity == 0 {
            return Err(PresenceError::Config(
                "session.buffer_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
