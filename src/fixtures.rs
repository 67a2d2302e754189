//! Synthetic landmark fixtures shared by the unit tests

use crate::detectors::head_pose::{project_model, Camera};
use crate::landmarks::{face, hand, pose};
use crate::types::{FrameInput, Handedness, HandLandmarks, ImageFrame, LandmarkSet, Point};
use nalgebra::{Rotation3, Vector3};

pub const FRAME_WIDTH: u32 = 640;
pub const FRAME_HEIGHT: u32 = 480;

/// Camera distance of the synthetic head (mm); gives a 128 px eye span
const HEAD_DISTANCE: f64 = 2115.0;

/// Normalized positions of the six pose points for a head at the given angles
pub fn project_head(yaw: f64, pitch: f64, roll: f64) -> [Point; 6] {
    let rotation = Rotation3::from_euler_angles(
        pitch.to_radians(),
        (-yaw).to_radians(),
        roll.to_radians(),
    );
    let translation = Vector3::new(0.0, 0.0, HEAD_DISTANCE);
    let camera = Camera::for_frame(FRAME_WIDTH, FRAME_HEIGHT);
    let pixels = project_model(&rotation, &translation, &camera).expect("head in front of camera");
    pixels.map(|(u, v)| Point::new(u / FRAME_WIDTH as f64, v / FRAME_HEIGHT as f64))
}

/// Full face mesh with the given eye/mouth aspect ratios and head angles
pub fn posed_face_mesh(ear: f64, mar: f64, yaw: f64, pitch: f64, roll: f64) -> LandmarkSet {
    let mut points = vec![Point::new(0.5, 0.5); face::POINT_COUNT];
    points[face::FOREHEAD] = Point::new(0.5, 0.22);
    points[109] = Point::new(0.45, 0.23);
    points[338] = Point::new(0.55, 0.23);
    points[face::RIGHT_CHEEK] = Point::new(0.33, 0.5);
    points[face::LEFT_CHEEK] = Point::new(0.67, 0.5);

    for (idx, p) in face::POSE_POINTS.iter().zip(project_head(yaw, pitch, roll)) {
        points[*idx] = p;
    }

    // Eyes: 0.06 wide, lid opening scaled to the requested EAR
    let lid = ear * 0.03;
    let outer = points[face::RIGHT_EYE_OUTER];
    let right = [
        (0.0, 0.0),
        (0.02, -lid),
        (0.04, -lid),
        (0.06, 0.0),
        (0.04, lid),
        (0.02, lid),
    ];
    for (idx, (dx, dy)) in face::RIGHT_EYE.iter().zip(right) {
        points[*idx] = Point::new(outer.x + dx, outer.y + dy);
    }
    let outer = points[face::LEFT_EYE_OUTER];
    for (idx, (dx, dy)) in face::LEFT_EYE.iter().zip(right) {
        points[*idx] = Point::new(outer.x - dx, outer.y + dy);
    }

    // Inner lips: 0.10 wide, opening scaled to the requested MAR
    let corner_r = points[face::MOUTH_RIGHT];
    let corner_l = points[face::MOUTH_LEFT];
    let center = corner_r.midpoint(&corner_l);
    let open = mar * 0.05;
    let mouth = [
        (-0.05, 0.0),
        (-0.03, -open),
        (0.0, -open),
        (0.03, -open),
        (0.05, 0.0),
        (0.03, open),
        (0.0, open),
        (-0.03, open),
    ];
    for (idx, (dx, dy)) in face::MOUTH.iter().zip(mouth) {
        points[*idx] = Point::new(center.x + dx, center.y + dy);
    }

    LandmarkSet::new(points)
}

/// Frontal face mesh
pub fn face_mesh(ear: f64, mar: f64) -> LandmarkSet {
    posed_face_mesh(ear, mar, 0.0, 0.0, 0.0)
}

/// Mid-grey frame of the given size
pub fn solid_image(width: u32, height: u32) -> ImageFrame {
    ImageFrame {
        width,
        height,
        channels: 3,
        data: vec![128; width as usize * height as usize * 3],
    }
}

/// Body pose with the shoulders `torso_forward` closer to the camera than
/// the hips and the ears `neck_forward` closer than the shoulders
pub fn body_pose(torso_forward: f64, neck_forward: f64) -> LandmarkSet {
    let visible = |x: f64, y: f64, z: f64| Point {
        visibility: Some(0.99),
        ..Point::new_3d(x, y, z)
    };
    let mut points = vec![visible(0.5, 0.6, 0.0); pose::POINT_COUNT];
    let shoulder_z = -torso_forward;
    let ear_z = shoulder_z - neck_forward;

    points[pose::NOSE] = visible(0.5, 0.3, ear_z - 0.05);
    points[pose::LEFT_EAR] = visible(0.55, 0.28, ear_z);
    points[pose::RIGHT_EAR] = visible(0.45, 0.28, ear_z);
    points[pose::LEFT_SHOULDER] = visible(0.62, 0.5, shoulder_z);
    points[pose::RIGHT_SHOULDER] = visible(0.38, 0.5, shoulder_z);
    points[pose::LEFT_HIP] = visible(0.58, 0.85, 0.0);
    points[pose::RIGHT_HIP] = visible(0.42, 0.85, 0.0);
    LandmarkSet::new(points)
}

pub fn upright_pose() -> LandmarkSet {
    body_pose(0.0, 0.0)
}

/// Torso leaning forward about 30 degrees
pub fn slouched_pose() -> LandmarkSet {
    body_pose(0.2, 0.0)
}

/// Hand whose fingertips sit at `(x, y)` with the wrist 0.08 below
pub fn hand_at(x: f64, y: f64, handedness: Option<Handedness>) -> HandLandmarks {
    let mut points = vec![Point::new(x, y + 0.04); hand::POINT_COUNT];
    points[hand::WRIST] = Point::new(x, y + 0.08);
    for (i, idx) in hand::FINGERTIPS.iter().enumerate() {
        points[*idx] = Point::new(x + (i as f64 - 2.0) * 0.005, y);
    }
    HandLandmarks {
        landmarks: LandmarkSet::new(points),
        handedness,
    }
}

/// Frame with a frontal face and upright body at `timestamp`
pub fn frame_at(timestamp: f64) -> FrameInput {
    FrameInput {
        timestamp,
        width: FRAME_WIDTH,
        height: FRAME_HEIGHT,
        face: Some(face_mesh(0.3, 0.1)),
        pose: Some(upright_pose()),
        hands: Vec::new(),
        image: None,
    }
}
