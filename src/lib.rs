//! Synheart Presence - On-device behavioral-signal engine for interview practice
//!
//! Presence turns per-frame face, body and hand landmarks into behavioral
//! metrics through a deterministic pipeline: frame input → expression, head
//! pose, posture and gesture detectors → attention fusion → session logging
//! → interview report.
//!
//! ## Modules
//!
//! - **Detectors**: Per-frame expression, head pose, posture and gesture analysis
//! - **Attention**: Weighted fusion of the detector outputs with persistence alerts
//! - **Session**: Bounded frame buffer, aggregate statistics and report export
//!
//! Landmark detection and emotion classification are external; the classifier
//! plugs in through [`EmotionClassifier`].

pub mod attention;
pub mod config;
pub mod detectors;
pub mod error;
pub mod geometry;
pub mod history;
pub mod input;
pub mod landmarks;
pub mod pipeline;
pub mod session;
pub mod types;

#[cfg(test)]
mod fixtures;

pub use attention::AttentionTracker;
pub use config::PresenceConfig;
pub use detectors::{EmotionClassifier, EmotionReading, FaceCrop};
pub use error::PresenceError;
pub use input::FrameAdapter;
pub use pipeline::{analyze_frames, analyze_ndjson, InterviewSession};
pub use session::{InterviewAnalysisReport, SessionInfo, SessionSummary};
pub use types::{FrameInput, FrameRecord, HandLandmarks, ImageFrame, LandmarkSet, Point};

/// Presence version embedded in every report
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "synheart-presence";
