//! Core data types
//!
//! Landmark inputs produced by an external detector, the per-detector frame
//! metrics, and the `FrameRecord` that the session logger buffers.

use serde::{Deserialize, Serialize};

// ============================================================================
// Landmark inputs
// ============================================================================

/// A normalized keypoint. `x` and `y` are in [0, 1] image space, `z` is the
/// detector's relative depth (smaller = closer to the camera).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    /// Detector visibility/presence score when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f64>,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            z: 0.0,
            visibility: None,
        }
    }

    pub fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            visibility: None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new_3d(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
    }
}

/// Ordered keypoints for one face, one body or one hand in a single frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    pub points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at `index`, if present
    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// Collect the points at `indices` in order; `None` if any index is missing
    pub fn select(&self, indices: &[usize]) -> Option<Vec<Point>> {
        indices.iter().map(|&i| self.get(i)).collect()
    }

    /// True when the set has at least `count` points and all are finite
    pub fn is_usable(&self, count: usize) -> bool {
        self.points.len() >= count && self.points.iter().all(Point::is_finite)
    }
}

/// Which hand a hand landmark set belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handedness {
    Left,
    Right,
}

/// One detected hand. `handedness` is set only when the landmark source
/// supplies a real handedness signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HandLandmarks {
    pub landmarks: LandmarkSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handedness: Option<Handedness>,
}

/// Raw 8-bit pixels of a frame (row-major, interleaved channels)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl ImageFrame {
    /// True when the buffer holds exactly `width * height * channels` bytes
    pub fn is_consistent(&self) -> bool {
        self.channels > 0
            && self.data.len() == self.width as usize * self.height as usize * self.channels as usize
    }
}

/// Everything the landmark source delivers for a single frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameInput {
    /// Capture timestamp in seconds (any monotonic origin)
    pub timestamp: f64,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Face mesh landmarks (468+ points)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<LandmarkSet>,
    /// Body pose landmarks (33 points)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<LandmarkSet>,
    /// Zero to two hands, in detection order
    #[serde(default)]
    pub hands: Vec<HandLandmarks>,
    /// Frame pixels for the emotion classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageFrame>,
}

// ============================================================================
// Expression
// ============================================================================

/// Raw emotion categories produced by the external classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Angry,
    Disgust,
    Fear,
    Happy,
    Sad,
    Surprise,
    Neutral,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
        Emotion::Happy,
        Emotion::Sad,
        Emotion::Surprise,
        Emotion::Neutral,
    ];
}

/// Internal expression vocabulary reported by the expression detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    GenuineSmile,
    #[default]
    Calm,
    Frowning,
    Tense,
    Concerned,
    Surprised,
}

impl Expression {
    /// Map a raw classifier category onto the expression vocabulary
    pub fn from_emotion(emotion: Emotion) -> Self {
        match emotion {
            Emotion::Happy => Expression::GenuineSmile,
            Emotion::Angry | Emotion::Disgust => Expression::Frowning,
            Emotion::Fear => Expression::Tense,
            Emotion::Sad => Expression::Concerned,
            Emotion::Surprise => Expression::Surprised,
            Emotion::Neutral => Expression::Calm,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Expression::GenuineSmile => "genuine_smile",
            Expression::Calm => "calm",
            Expression::Frowning => "frowning",
            Expression::Tense => "tense",
            Expression::Concerned => "concerned",
            Expression::Surprised => "surprised",
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Expression::GenuineSmile)
    }

    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            Expression::Frowning | Expression::Tense | Expression::Concerned
        )
    }
}

/// Stress level derived from the blink rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StressLevel {
    HighStress,
    ModerateStress,
    Normal,
    Drowsy,
    #[default]
    Unknown,
}

impl StressLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            StressLevel::HighStress => "high_stress",
            StressLevel::ModerateStress => "moderate_stress",
            StressLevel::Normal => "normal",
            StressLevel::Drowsy => "drowsy",
            StressLevel::Unknown => "unknown",
        }
    }
}

/// Where the current emotion reading came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionSource {
    /// Fresh result from the external classifier
    Classifier,
    /// Landmark heuristic (classifier missing or failed)
    Heuristic,
    /// Reused from an earlier frame between classifier runs
    Cached,
    /// No usable face crop
    #[default]
    Default,
}

/// Per-frame output of the expression detector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpressionMetrics {
    pub face_detected: bool,
    /// Smoothed, reported expression
    pub expression: Expression,
    /// Confidence of the reported expression (0-0.95)
    pub confidence: f64,
    /// Raw classifier category behind the latest reading
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_emotion: Option<Emotion>,
    pub emotion_source: EmotionSource,
    pub ear_left: f64,
    pub ear_right: f64,
    /// Smoothed average eye aspect ratio
    pub ear_avg: f64,
    /// Smoothed mouth aspect ratio
    pub mar: f64,
    pub eyes_closed: bool,
    pub blink_detected: bool,
    /// Blinks recorded so far in this session
    pub blink_count: u32,
    /// Blinks per minute over the last 60 s
    pub blink_rate: f64,
    pub stress_level: StressLevel,
}

// ============================================================================
// Head pose
// ============================================================================

/// Coarse head direction label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadDirection {
    #[default]
    Center,
    Left,
    Right,
    Up,
    Down,
}

impl HeadDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeadDirection::Center => "center",
            HeadDirection::Left => "left",
            HeadDirection::Right => "right",
            HeadDirection::Up => "up",
            HeadDirection::Down => "down",
        }
    }
}

/// Per-frame output of the head pose estimator. Angles are in degrees:
/// positive yaw = turned toward the image's right, positive pitch = looking down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadPoseMetrics {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub direction: HeadDirection,
    /// Engagement sub-score (0.3-1.0)
    pub engagement: f64,
    /// False when the solver failed and defaults were substituted
    pub solved: bool,
    /// RMS reprojection error in pixels
    pub reprojection_error: f64,
}

impl Default for HeadPoseMetrics {
    fn default() -> Self {
        Self {
            yaw: 0.0,
            pitch: 0.0,
            roll: 0.0,
            direction: HeadDirection::Center,
            engagement: 0.7,
            solved: false,
            reprojection_error: 0.0,
        }
    }
}

/// Legacy face-direction estimate used when no solved head pose is available
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceDirection {
    pub direction: HeadDirection,
    /// Approximate deviation from frontal, degrees
    pub angle: f64,
}

// ============================================================================
// Posture
// ============================================================================

/// Posture taxonomy, in classification priority order after `NoPose`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureStatus {
    Slouching,
    LeaningBack,
    FacingAway,
    EngagedForwardLean,
    UprightRelaxed,
    NeutralPosture,
    SlightlyPoor,
    #[default]
    NoPose,
}

/// Scoring bucket of a posture status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostureBucket {
    Good,
    Neutral,
    Poor,
    Unknown,
}

impl PostureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostureStatus::Slouching => "slouching",
            PostureStatus::LeaningBack => "leaning_back",
            PostureStatus::FacingAway => "facing_away",
            PostureStatus::EngagedForwardLean => "engaged_forward_lean",
            PostureStatus::UprightRelaxed => "upright_relaxed",
            PostureStatus::NeutralPosture => "neutral_posture",
            PostureStatus::SlightlyPoor => "slightly_poor",
            PostureStatus::NoPose => "no_pose",
        }
    }

    pub fn bucket(&self) -> PostureBucket {
        match self {
            PostureStatus::UprightRelaxed | PostureStatus::EngagedForwardLean => {
                PostureBucket::Good
            }
            PostureStatus::Slouching | PostureStatus::LeaningBack | PostureStatus::FacingAway => {
                PostureBucket::Poor
            }
            PostureStatus::NeutralPosture | PostureStatus::SlightlyPoor => PostureBucket::Neutral,
            PostureStatus::NoPose => PostureBucket::Unknown,
        }
    }
}

/// Per-frame output of the posture analyzer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostureMetrics {
    pub pose_detected: bool,
    pub status: PostureStatus,
    pub confidence: f64,
    /// Smoothed neck inclination, degrees (positive = head forward)
    pub neck_angle: f64,
    /// Smoothed torso inclination, degrees (positive = forward lean)
    pub torso_angle: f64,
    /// Vertical offset between shoulders (normalized)
    pub shoulder_tilt: f64,
    /// Depth offset between shoulders (normalized)
    pub shoulder_depth_delta: f64,
    /// Shoulder drop below the calibrated height (0 when uncalibrated)
    pub shoulder_drop: f64,
    pub is_fidgeting: bool,
    pub shoulder_variance: f64,
    pub calibrated: bool,
}

// ============================================================================
// Gestures
// ============================================================================

/// Per-frame output of the gesture detector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GestureMetrics {
    pub hands_detected: u8,
    pub face_touching: bool,
    /// Consecutive frames of the current touch
    pub face_touch_duration: u32,
    /// Distinct touches so far in this session
    pub face_touch_count: u32,
    pub hand_near_head: bool,
    pub hand_fidgeting: bool,
    pub excessive_gesturing: bool,
    pub arms_crossed: bool,
    /// Highest mean hand velocity over the motion window
    pub hand_velocity: f64,
    /// Highest hand range of motion over the motion window
    pub gesture_amplitude: f64,
}

// ============================================================================
// Attention
// ============================================================================

/// Behaviors tracked by the hysteresis counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    PoorPosture,
    NotFocusing,
    Fidgeting,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::PoorPosture => "poor_posture",
            AlertKind::NotFocusing => "not_focusing",
            AlertKind::Fidgeting => "fidgeting",
        }
    }
}

/// An alert raised once a behavior has persisted past its frame threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionAlert {
    pub kind: AlertKind,
    pub consecutive_frames: u32,
    pub message: String,
}

/// Which signal supplied the gaze sub-score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GazeSource {
    HeadPose,
    FaceDirection,
    #[default]
    Default,
}

/// Fused attention output for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttentionMetrics {
    /// Weighted fusion of the four sub-scores (0-1)
    pub attention_score: f64,
    pub expression_score: f64,
    pub posture_score: f64,
    pub gesture_score: f64,
    pub gaze_score: f64,
    pub gaze_source: GazeSource,
    pub is_engaged: bool,
    pub is_distracted: bool,
    #[serde(default)]
    pub alerts: Vec<AttentionAlert>,
    pub poor_posture_consecutive: u32,
    pub not_focusing_consecutive: u32,
    pub fidgeting_consecutive: u32,
    /// Mean of the recent attention history
    pub average_attention: f64,
}

// ============================================================================
// Frame record
// ============================================================================

/// Union of every detector's metrics for one frame, as buffered by the logger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Strictly increasing within a session, starting at 1
    pub frame_number: u64,
    /// Seconds since session start
    pub elapsed_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<ExpressionMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_pose: Option<HeadPoseMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture: Option<PostureMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gesture: Option<GestureMetrics>,
    #[serde(default)]
    pub attention: AttentionMetrics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_mapping() {
        assert_eq!(Expression::from_emotion(Emotion::Happy), Expression::GenuineSmile);
        assert_eq!(Expression::from_emotion(Emotion::Angry), Expression::Frowning);
        assert_eq!(Expression::from_emotion(Emotion::Disgust), Expression::Frowning);
        assert_eq!(Expression::from_emotion(Emotion::Fear), Expression::Tense);
        assert_eq!(Expression::from_emotion(Emotion::Neutral), Expression::Calm);
    }

    #[test]
    fn test_label_serialization_matches_as_str() {
        let json = serde_json::to_string(&PostureStatus::EngagedForwardLean).unwrap();
        assert_eq!(json, format!("\"{}\"", PostureStatus::EngagedForwardLean.as_str()));

        let json = serde_json::to_string(&StressLevel::ModerateStress).unwrap();
        assert_eq!(json, "\"moderate_stress\"");

        let json = serde_json::to_string(&Expression::GenuineSmile).unwrap();
        assert_eq!(json, "\"genuine_smile\"");
    }

    #[test]
    fn test_landmark_set_is_transparent() {
        let json = r#"[{"x": 0.1, "y": 0.2}, {"x": 0.3, "y": 0.4, "z": -0.1}]"#;
        let set: LandmarkSet = serde_json::from_str(json).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(1).unwrap().z, -0.1);
        assert!(set.get(2).is_none());
        assert!(set.select(&[0, 1]).is_some());
        assert!(set.select(&[0, 5]).is_none());
    }

    #[test]
    fn test_frame_input_deserialization_defaults() {
        let json = r#"{ "timestamp": 1.5, "width": 640, "height": 480 }"#;
        let frame: FrameInput = serde_json::from_str(json).unwrap();
        assert!(frame.face.is_none());
        assert!(frame.pose.is_none());
        assert!(frame.hands.is_empty());
        assert!(frame.image.is_none());
    }

    #[test]
    fn test_posture_buckets() {
        assert_eq!(PostureStatus::UprightRelaxed.bucket(), PostureBucket::Good);
        assert_eq!(PostureStatus::Slouching.bucket(), PostureBucket::Poor);
        assert_eq!(PostureStatus::SlightlyPoor.bucket(), PostureBucket::Neutral);
        assert_eq!(PostureStatus::NoPose.bucket(), PostureBucket::Unknown);
    }

    #[test]
    fn test_image_consistency() {
        let image = ImageFrame {
            width: 2,
            height: 2,
            channels: 3,
            data: vec![0; 12],
        };
        assert!(image.is_consistent());

        let short = ImageFrame {
            data: vec![0; 5],
            ..image
        };
        assert!(!short.is_consistent());
    }
}
