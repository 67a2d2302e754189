//! Per-frame detectors
//!
//! Each detector owns its rolling state for one session and is reset only by
//! an explicit `reset` (done by the session orchestrator on session start).

pub mod expression;
pub mod gesture;
pub mod head_pose;
pub mod posture;

pub use expression::{EmotionClassifier, EmotionReading, ExpressionDetector, FaceCrop};
pub use gesture::GestureDetector;
pub use head_pose::{estimate_face_direction, HeadPoseEstimator};
pub use posture::{PostureAnalyzer, PostureBaseline};
