//! Posture analysis
//!
//! Neck and torso inclination from body pose landmarks, a personal baseline
//! from an explicit calibration pass, priority-ordered posture classification
//! and shoulder-based fidget detection.

use crate::config::PostureConfig;
use crate::geometry::{angle_from_vertical, exponential_smooth, position_variance};
use crate::history::History;
use crate::landmarks::pose;
use crate::types::{LandmarkSet, Point, PostureMetrics, PostureStatus};
use serde::{Deserialize, Serialize};

/// Raw geometric signals from one pose
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PostureSignals {
    /// Sagittal neck inclination, degrees (positive = head forward)
    pub neck_angle: f64,
    /// Sagittal torso inclination, degrees (positive = forward lean)
    pub torso_angle: f64,
    /// |left.y - right.y| of the shoulders
    pub shoulder_tilt: f64,
    /// |left.z - right.z| of the shoulders
    pub shoulder_depth_delta: f64,
    pub shoulder_center: Point,
}

/// Personal neutral posture captured during calibration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PostureBaseline {
    pub neck_angle: f64,
    pub torso_angle: f64,
    pub shoulder_height: f64,
}

fn visible(p: Point, min_visibility: f64) -> Option<Point> {
    match p.visibility {
        Some(v) if v < min_visibility => None,
        _ => Some(p),
    }
}

/// Extract posture signals; `None` when a required point is missing,
/// non-finite or below the visibility threshold.
pub fn extract_signals(landmarks: &LandmarkSet, config: &PostureConfig) -> Option<PostureSignals> {
    if !landmarks.is_usable(pose::POINT_COUNT) {
        return None;
    }
    let point = |idx| landmarks.get(idx).and_then(|p| visible(p, config.min_visibility));

    let left_ear = point(pose::LEFT_EAR)?;
    let right_ear = point(pose::RIGHT_EAR)?;
    let left_shoulder = point(pose::LEFT_SHOULDER)?;
    let right_shoulder = point(pose::RIGHT_SHOULDER)?;
    let left_hip = point(pose::LEFT_HIP)?;
    let right_hip = point(pose::RIGHT_HIP)?;

    let ears = left_ear.midpoint(&right_ear);
    let shoulders = left_shoulder.midpoint(&right_shoulder);
    let hips = left_hip.midpoint(&right_hip);

    // Smaller z is closer to the camera: an upper point ahead of the lower
    // one leans forward.
    let neck_angle = angle_from_vertical(shoulders.z - ears.z, shoulders.y - ears.y);
    let torso_angle = angle_from_vertical(hips.z - shoulders.z, hips.y - shoulders.y);

    Some(PostureSignals {
        neck_angle,
        torso_angle,
        shoulder_tilt: (left_shoulder.y - right_shoulder.y).abs(),
        shoulder_depth_delta: (left_shoulder.z - right_shoulder.z).abs(),
        shoulder_center: shoulders,
    })
}

/// Average the signals of a calibration pass.
///
/// Frames without a usable pose are skipped; fewer than
/// `min_calibration_frames` valid frames yields `None`.
pub fn compute_baseline(frames: &[LandmarkSet], config: &PostureConfig) -> Option<PostureBaseline> {
    let samples: Vec<PostureSignals> = frames
        .iter()
        .filter_map(|f| extract_signals(f, config))
        .collect();
    if samples.is_empty() || samples.len() < config.min_calibration_frames {
        return None;
    }
    let n = samples.len() as f64;
    Some(PostureBaseline {
        neck_angle: samples.iter().map(|s| s.neck_angle).sum::<f64>() / n,
        torso_angle: samples.iter().map(|s| s.torso_angle).sum::<f64>() / n,
        shoulder_height: samples.iter().map(|s| s.shoulder_center.y).sum::<f64>() / n,
    })
}

/// Classify baseline-relative signals. The first matching rule wins.
pub fn classify_posture(signals: &PostureSignals, config: &PostureConfig) -> (PostureStatus, f64) {
    let torso = signals.torso_angle;
    let neck = signals.neck_angle;
    let aligned = signals.shoulder_tilt < config.shoulder_alignment;

    if torso > config.slouch_torso_deg || neck > config.bad_neck_deg {
        (PostureStatus::Slouching, 0.85)
    } else if torso < config.lean_back_torso_deg {
        (PostureStatus::LeaningBack, 0.8)
    } else if signals.shoulder_depth_delta > config.facing_away_depth {
        (PostureStatus::FacingAway, 0.75)
    } else if torso > config.forward_lean_min_deg && torso <= config.slouch_torso_deg && aligned {
        (PostureStatus::EngagedForwardLean, 0.85)
    } else if torso.abs() <= config.good_torso_deg && neck.abs() <= config.good_neck_deg && aligned {
        (PostureStatus::UprightRelaxed, 0.9)
    } else if torso.abs() <= config.neutral_torso_deg && neck.abs() <= config.neutral_neck_deg {
        (PostureStatus::NeutralPosture, 0.7)
    } else {
        (PostureStatus::SlightlyPoor, 0.6)
    }
}

/// Per-session posture analyzer
#[derive(Debug, Clone)]
pub struct PostureAnalyzer {
    config: PostureConfig,
    baseline: Option<PostureBaseline>,
    smoothed_neck: Option<f64>,
    smoothed_torso: Option<f64>,
    neck_history: History<f64>,
    torso_history: History<f64>,
    shoulder_history: History<Point>,
}

impl Default for PostureAnalyzer {
    fn default() -> Self {
        Self::new(PostureConfig::default())
    }
}

impl PostureAnalyzer {
    pub fn new(config: PostureConfig) -> Self {
        Self {
            baseline: None,
            smoothed_neck: None,
            smoothed_torso: None,
            neck_history: History::new(config.angle_window),
            torso_history: History::new(config.angle_window),
            shoulder_history: History::new(config.shoulder_window),
            config,
        }
    }

    pub fn config(&self) -> &PostureConfig {
        &self.config
    }

    pub fn baseline(&self) -> Option<&PostureBaseline> {
        self.baseline.as_ref()
    }

    pub fn is_calibrated(&self) -> bool {
        self.baseline.is_some()
    }

    /// Set the baseline from a calibration pass. Returns false, leaving the
    /// current baseline untouched, when too few frames were usable.
    pub fn calibrate(&mut self, frames: &[LandmarkSet]) -> bool {
        match compute_baseline(frames, &self.config) {
            Some(baseline) => {
                self.baseline = Some(baseline);
                true
            }
            None => false,
        }
    }

    /// Mean smoothed torso angle over the angle window
    pub fn average_torso_angle(&self) -> Option<f64> {
        self.torso_history.mean()
    }

    pub fn average_neck_angle(&self) -> Option<f64> {
        self.neck_history.mean()
    }

    pub fn analyze(&mut self, landmarks: Option<&LandmarkSet>) -> PostureMetrics {
        let Some(signals) = landmarks.and_then(|l| extract_signals(l, &self.config)) else {
            return PostureMetrics {
                calibrated: self.is_calibrated(),
                ..PostureMetrics::default()
            };
        };

        let alpha = self.config.smoothing_alpha;
        let neck = match self.smoothed_neck {
            Some(prev) => exponential_smooth(prev, signals.neck_angle, alpha),
            None => signals.neck_angle,
        };
        let torso = match self.smoothed_torso {
            Some(prev) => exponential_smooth(prev, signals.torso_angle, alpha),
            None => signals.torso_angle,
        };
        self.smoothed_neck = Some(neck);
        self.smoothed_torso = Some(torso);
        self.neck_history.push(neck);
        self.torso_history.push(torso);
        self.shoulder_history.push(signals.shoulder_center);

        let baseline = self.baseline.unwrap_or_default();
        let relative = PostureSignals {
            neck_angle: neck - baseline.neck_angle,
            torso_angle: torso - baseline.torso_angle,
            ..signals
        };
        let (status, confidence) = classify_posture(&relative, &self.config);

        let recent = self.shoulder_history.recent_vec(self.config.fidget_window);
        let shoulder_variance = position_variance(&recent);
        let shoulder_drop = match self.baseline {
            Some(b) => signals.shoulder_center.y - b.shoulder_height,
            None => 0.0,
        };

        PostureMetrics {
            pose_detected: true,
            status,
            confidence,
            neck_angle: neck,
            torso_angle: torso,
            shoulder_tilt: signals.shoulder_tilt,
            shoulder_depth_delta: signals.shoulder_depth_delta,
            shoulder_drop,
            is_fidgeting: recent.len() >= 2
                && shoulder_variance > self.config.fidget_variance_threshold,
            shoulder_variance,
            calibrated: self.is_calibrated(),
        }
    }

    /// Clear rolling state. The calibrated baseline survives; it belongs to
    /// the person, not the session.
    pub fn reset(&mut self) {
        self.smoothed_neck = None;
        self.smoothed_torso = None;
        self.neck_history.clear();
        self.torso_history.clear();
        self.shoulder_history.clear();
    }

    pub fn clear_baseline(&mut self) {
        self.baseline = None;
    }
}
