//! Error types for Synheart Presence

use thiserror::Error;

/// Errors that can surface from the presence pipeline.
///
/// Per-frame problems (missing landmarks, classifier failures, pose solver
/// divergence) never reach the caller; they degrade to documented defaults.
/// Only session misuse, malformed input streams and export I/O are reported.
#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("No active session: {0}")]
    NoActiveSession(String),

    #[error("Failed to parse frame input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("Emotion classifier failed: {0}")]
    Classifier(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Pose solver failed: {0}")]
    Solver(String),
}
