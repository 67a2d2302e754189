//! Head pose estimation
//!
//! Six face landmarks are matched against a fixed anthropometric head model.
//! A damped Gauss-Newton (Levenberg-Marquardt) solve recovers the model's
//! rotation and translation under a pinhole camera whose focal length is the
//! frame width and whose optical center is the frame center. The rotation is
//! decomposed into pitch/yaw/roll, which drive a direction label and an
//! engagement sub-score.

use crate::config::HeadPoseConfig;
use crate::error::PresenceError;
use crate::landmarks::face;
use crate::types::{FaceDirection, HeadDirection, HeadPoseMetrics, LandmarkSet};
use nalgebra::{Matrix6, Rotation3, SMatrix, SVector, Vector3, Vector6};
use tracing::debug;

/// Head model in millimetres, in `face::POSE_POINTS` order.
///
/// Camera axes: x right, y down, z away from the camera. The nose tip is the
/// origin and the face looks toward -z.
pub const MODEL_POINTS: [[f64; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [0.0, 330.0, 65.0],
    [-225.0, -170.0, 135.0],
    [225.0, -170.0, 135.0],
    [-150.0, 150.0, 125.0],
    [150.0, 150.0, 125.0],
];

/// Distance between the model's outer eye corners
const MODEL_EYE_SPAN: f64 = 450.0;

/// Frontal ratio of the nose drop below the eye line to the eye span
const NEUTRAL_NOSE_DROP: f64 = 0.38;

/// Nose-to-eye-line depth over eye span, used by the face-direction heuristic
const NOSE_DEPTH_RATIO: f64 = 0.3;

type Residuals = SVector<f64, 12>;
type Jacobian = SMatrix<f64, 12, 6>;

/// Pinhole camera approximated from the frame size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub focal: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Camera {
    pub fn for_frame(width: u32, height: u32) -> Self {
        Self {
            focal: width as f64,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
        }
    }
}

/// Result of a successful pose solve
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseSolution {
    pub rotation: Rotation3<f64>,
    pub translation: Vector3<f64>,
    /// RMS reprojection error in pixels
    pub rms_error: f64,
}

/// Project the head model into pixel coordinates.
///
/// Returns `None` if any model point lands behind the camera.
pub fn project_model(
    rotation: &Rotation3<f64>,
    translation: &Vector3<f64>,
    camera: &Camera,
) -> Option<[(f64, f64); 6]> {
    let mut out = [(0.0, 0.0); 6];
    for (slot, model) in out.iter_mut().zip(MODEL_POINTS.iter()) {
        let p = rotation * Vector3::new(model[0], model[1], model[2]) + translation;
        if p.z <= 1e-6 {
            return None;
        }
        *slot = (
            camera.focal * p.x / p.z + camera.cx,
            camera.focal * p.y / p.z + camera.cy,
        );
    }
    Some(out)
}

fn residuals(params: &Vector6<f64>, observed: &[(f64, f64); 6], camera: &Camera) -> Option<Residuals> {
    let rotation = Rotation3::new(Vector3::new(params[0], params[1], params[2]));
    let translation = Vector3::new(params[3], params[4], params[5]);
    let projected = project_model(&rotation, &translation, camera)?;

    let mut r = Residuals::zeros();
    for (i, ((u, v), (ou, ov))) in projected.iter().zip(observed.iter()).enumerate() {
        r[2 * i] = u - ou;
        r[2 * i + 1] = v - ov;
    }
    Some(r)
}

/// Central-difference Jacobian of the residuals
fn jacobian(params: &Vector6<f64>, observed: &[(f64, f64); 6], camera: &Camera) -> Option<Jacobian> {
    let mut j = Jacobian::zeros();
    for k in 0..6 {
        let step = if k < 3 {
            1e-6
        } else {
            1e-4 * params[k].abs().max(1.0)
        };
        let mut plus = *params;
        plus[k] += step;
        let mut minus = *params;
        minus[k] -= step;
        let diff = (residuals(&plus, observed, camera)? - residuals(&minus, observed, camera)?)
            / (2.0 * step);
        j.set_column(k, &diff);
    }
    Some(j)
}

/// Solve the model pose from six pixel observations in `face::POSE_POINTS` order
pub fn solve_pose(
    observed: &[(f64, f64); 6],
    camera: &Camera,
    max_iterations: usize,
) -> Result<PoseSolution, PresenceError> {
    if observed.iter().any(|(u, v)| !u.is_finite() || !v.is_finite()) {
        return Err(PresenceError::Solver("non-finite image points".to_string()));
    }

    let (ru, rv) = observed[2];
    let (lu, lv) = observed[3];
    let eye_px = ((lu - ru).powi(2) + (lv - rv).powi(2)).sqrt();
    if eye_px < 1.0 {
        return Err(PresenceError::Solver(format!(
            "degenerate eye span ({eye_px:.3} px)"
        )));
    }

    // Start frontal at the depth implied by the eye span
    let z = camera.focal * MODEL_EYE_SPAN / eye_px;
    let (nu, nv) = observed[0];
    let mut params = Vector6::new(
        0.0,
        0.0,
        0.0,
        (nu - camera.cx) * z / camera.focal,
        (nv - camera.cy) * z / camera.focal,
        z,
    );

    let mut r = residuals(&params, observed, camera)
        .ok_or_else(|| PresenceError::Solver("initial pose behind camera".to_string()))?;
    let mut cost = r.norm_squared();
    let mut lambda = 1e-3;

    for _ in 0..max_iterations {
        if cost < 1e-12 {
            break;
        }
        let Some(j) = jacobian(&params, observed, camera) else {
            break;
        };
        let jtj: Matrix6<f64> = j.transpose() * j;
        let gradient = j.transpose() * r;

        let mut step_taken = None;
        while lambda < 1e10 {
            let mut damped = jtj;
            for i in 0..6 {
                damped[(i, i)] += lambda * jtj[(i, i)].max(1e-9);
            }
            if let Some(cholesky) = damped.cholesky() {
                let delta = cholesky.solve(&(-gradient));
                let candidate = params + delta;
                if let Some(candidate_r) = residuals(&candidate, observed, camera) {
                    let candidate_cost = candidate_r.norm_squared();
                    if candidate_cost < cost {
                        step_taken = Some((candidate, candidate_r, candidate_cost, delta.norm()));
                        lambda = (lambda * 0.1).max(1e-12);
                        break;
                    }
                }
            }
            lambda *= 10.0;
        }

        let Some((candidate, candidate_r, candidate_cost, step)) = step_taken else {
            break;
        };
        let gain = cost - candidate_cost;
        params = candidate;
        r = candidate_r;
        cost = candidate_cost;
        if step < 1e-10 || gain < 1e-12 * cost.max(1e-12) {
            break;
        }
    }

    if params.iter().any(|v| !v.is_finite()) || params[5] <= 0.0 {
        return Err(PresenceError::Solver("solver diverged".to_string()));
    }

    Ok(PoseSolution {
        rotation: Rotation3::new(Vector3::new(params[0], params[1], params[2])),
        translation: Vector3::new(params[3], params[4], params[5]),
        rms_error: (cost / 6.0).sqrt(),
    })
}

/// Decompose a rotation into `(pitch, yaw, roll)` degrees.
///
/// The rotation is read as `Rz * Ry * Rx`. Pitch is the x angle, roll the z
/// angle, and yaw the negated y angle so that a face turned toward the
/// image's right reads positive. Near gimbal lock (|y| ≈ 90°) roll is pinned
/// to zero and the remaining freedom is assigned to pitch.
pub fn rotation_to_euler(rotation: &Rotation3<f64>) -> (f64, f64, f64) {
    let m = rotation.matrix();
    let sy = (m[(0, 0)].powi(2) + m[(1, 0)].powi(2)).sqrt();

    let (x, y, z) = if sy > 1e-6 {
        (
            m[(2, 1)].atan2(m[(2, 2)]),
            (-m[(2, 0)]).atan2(sy),
            m[(1, 0)].atan2(m[(0, 0)]),
        )
    } else {
        ((-m[(1, 2)]).atan2(m[(1, 1)]), (-m[(2, 0)]).atan2(sy), 0.0)
    };

    (x.to_degrees(), -y.to_degrees(), z.to_degrees())
}

/// Coarse direction from yaw and pitch
pub fn classify_direction(yaw: f64, pitch: f64, config: &HeadPoseConfig) -> HeadDirection {
    if yaw.abs() < config.center_tolerance_deg && pitch.abs() < config.center_tolerance_deg {
        HeadDirection::Center
    } else if yaw.abs() > config.yaw_direction_deg {
        if yaw > 0.0 {
            HeadDirection::Right
        } else {
            HeadDirection::Left
        }
    } else if pitch.abs() > config.pitch_direction_deg {
        if pitch > 0.0 {
            HeadDirection::Down
        } else {
            HeadDirection::Up
        }
    } else {
        HeadDirection::Center
    }
}

fn axis_penalty(angle: f64, tolerance: f64, span: f64) -> f64 {
    let excess = angle.abs() - tolerance;
    if excess <= 0.0 || span <= 0.0 {
        return 0.0;
    }
    (excess / span).min(1.0)
}

/// Engagement sub-score: penalties only past each axis tolerance, floored
pub fn engagement_score(yaw: f64, pitch: f64, roll: f64, config: &HeadPoseConfig) -> f64 {
    let penalty = config.yaw_weight
        * axis_penalty(yaw, config.yaw_tolerance_deg, config.yaw_penalty_span_deg)
        + config.pitch_weight
            * axis_penalty(pitch, config.pitch_tolerance_deg, config.pitch_penalty_span_deg)
        + config.roll_weight
            * axis_penalty(roll, config.roll_tolerance_deg, config.roll_penalty_span_deg);
    (1.0 - penalty).max(config.min_engagement)
}

/// Face direction from the nose offset relative to the eye line.
///
/// Works without a pose solve; used as the gaze fallback.
pub fn estimate_face_direction(
    landmarks: &LandmarkSet,
    width: u32,
    height: u32,
    config: &HeadPoseConfig,
) -> Option<FaceDirection> {
    let nose = landmarks.get(face::NOSE_TIP)?;
    let right = landmarks.get(face::RIGHT_EYE_OUTER)?;
    let left = landmarks.get(face::LEFT_EYE_OUTER)?;
    let (w, h) = (width as f64, height as f64);

    let eye_span = ((left.x - right.x) * w).hypot((left.y - right.y) * h);
    if eye_span < 1.0 {
        return None;
    }
    let mid = right.midpoint(&left);
    let dx = (nose.x - mid.x) * w / eye_span;
    let dy = (nose.y - mid.y) * h / eye_span - NEUTRAL_NOSE_DROP;

    let horizontal = (dx / NOSE_DEPTH_RATIO).atan().to_degrees();
    let vertical = (dy / NOSE_DEPTH_RATIO).atan().to_degrees();

    let direction = if horizontal.abs() > config.yaw_direction_deg {
        if horizontal > 0.0 {
            HeadDirection::Right
        } else {
            HeadDirection::Left
        }
    } else if vertical.abs() > config.pitch_direction_deg {
        if vertical > 0.0 {
            HeadDirection::Down
        } else {
            HeadDirection::Up
        }
    } else {
        HeadDirection::Center
    };

    Some(FaceDirection {
        direction,
        angle: horizontal.hypot(vertical).min(90.0),
    })
}

/// Per-session head pose estimator
#[derive(Debug, Clone, Default)]
pub struct HeadPoseEstimator {
    config: HeadPoseConfig,
}

impl HeadPoseEstimator {
    pub fn new(config: HeadPoseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HeadPoseConfig {
        &self.config
    }

    /// Estimate head pose for one frame. `None` when no usable face is present;
    /// a failed solve yields the unsolved default.
    pub fn estimate(&self, landmarks: Option<&LandmarkSet>, width: u32, height: u32) -> Option<HeadPoseMetrics> {
        let landmarks = landmarks.filter(|l| l.is_usable(face::POINT_COUNT))?;
        let points = landmarks.select(&face::POSE_POINTS)?;

        let (w, h) = (width as f64, height as f64);
        let mut observed = [(0.0, 0.0); 6];
        for (slot, p) in observed.iter_mut().zip(points.iter()) {
            *slot = (p.x * w, p.y * h);
        }

        let camera = Camera::for_frame(width, height);
        let solution = match solve_pose(&observed, &camera, self.config.max_iterations) {
            Ok(solution) => solution,
            Err(e) => {
                debug!(error = %e, "head pose solve failed, using default pose");
                return Some(self.unsolved());
            }
        };

        let (ru, rv) = observed[2];
        let (lu, lv) = observed[3];
        let face_width = (lu - ru).hypot(lv - rv);
        if solution.rms_error > self.config.max_reprojection_ratio * face_width {
            debug!(
                rms_error = solution.rms_error,
                face_width, "head pose reprojection error too large, using default pose"
            );
            return Some(self.unsolved());
        }

        let (pitch, yaw, roll) = rotation_to_euler(&solution.rotation);
        Some(HeadPoseMetrics {
            yaw,
            pitch,
            roll,
            direction: classify_direction(yaw, pitch, &self.config),
            engagement: engagement_score(yaw, pitch, roll, &self.config),
            solved: true,
            reprojection_error: solution.rms_error,
        })
    }

    fn unsolved(&self) -> HeadPoseMetrics {
        HeadPoseMetrics {
            engagement: self.config.fallback_engagement,
            ..HeadPoseMetrics::default()
        }
    }
}
