//! Frame input adapter
//!
//! Parses frame streams (JSON array or NDJSON) produced by the landmark
//! source and checks landmark-set shapes before they reach the detectors.

use crate::error::PresenceError;
use crate::landmarks::{face, hand, pose};
use crate::types::{FrameInput, HandLandmarks, ImageFrame, LandmarkSet};
use std::borrow::Cow;
use thiserror::Error;

/// Most hands a frame may carry
pub const MAX_HANDS: usize = 2;

/// A problem with one part of a frame. The part is treated as missing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameIssue {
    #[error("face mesh has {0} points or non-finite coordinates (need {min} finite)", min = face::POINT_COUNT)]
    Face(usize),

    #[error("body pose has {0} points or non-finite coordinates (need {count} finite)", count = pose::POINT_COUNT)]
    Pose(usize),

    #[error("hand {index} has {points} points or non-finite coordinates (need {count} finite)", count = hand::POINT_COUNT)]
    Hand { index: usize, points: usize },

    #[error("{0} hands supplied, only the first {max} are used", max = MAX_HANDS)]
    ExtraHands(usize),

    #[error("image buffer holds {len} bytes, expected {width}x{height}x{channels}")]
    Image {
        width: u32,
        height: u32,
        channels: u8,
        len: usize,
    },
}

/// Frame parts that passed the shape checks
#[derive(Debug, Clone)]
pub struct FrameView<'a> {
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    pub face: Option<&'a LandmarkSet>,
    pub pose: Option<&'a LandmarkSet>,
    pub hands: Cow<'a, [HandLandmarks]>,
    pub image: Option<&'a ImageFrame>,
    pub issues: Vec<FrameIssue>,
}

fn check_header(frame: &FrameInput) -> Result<(), PresenceError> {
    if !frame.timestamp.is_finite() {
        return Err(PresenceError::InvalidFrame(format!(
            "timestamp must be finite, got {}",
            frame.timestamp
        )));
    }
    if frame.width == 0 || frame.height == 0 {
        return Err(PresenceError::InvalidFrame(format!(
            "frame size must be non-zero, got {}x{}",
            frame.width, frame.height
        )));
    }
    Ok(())
}

fn hand_is_usable(hand: &HandLandmarks) -> bool {
    hand.landmarks.len() == hand::POINT_COUNT && hand.landmarks.is_usable(hand::POINT_COUNT)
}

/// Split a frame into its usable parts.
///
/// Fails only when the frame as a whole is unusable (bad timestamp or
/// frame size); malformed landmark sets are dropped and listed in `issues`.
pub fn view_frame(frame: &FrameInput) -> Result<FrameView<'_>, PresenceError> {
    check_header(frame)?;
    let mut issues = Vec::new();

    let face = match &frame.face {
        Some(set) if !set.is_usable(face::POINT_COUNT) => {
            issues.push(FrameIssue::Face(set.len()));
            None
        }
        other => other.as_ref(),
    };

    let pose = match &frame.pose {
        Some(set) if set.len() != pose::POINT_COUNT || !set.is_usable(pose::POINT_COUNT) => {
            issues.push(FrameIssue::Pose(set.len()));
            None
        }
        other => other.as_ref(),
    };

    if frame.hands.len() > MAX_HANDS {
        issues.push(FrameIssue::ExtraHands(frame.hands.len()));
    }
    let considered = &frame.hands[..frame.hands.len().min(MAX_HANDS)];
    let mut bad_hand = false;
    for (index, hand) in considered.iter().enumerate() {
        if !hand_is_usable(hand) {
            issues.push(FrameIssue::Hand {
                index,
                points: hand.landmarks.len(),
            });
            bad_hand = true;
        }
    }
    let hands = if bad_hand {
        Cow::Owned(considered.iter().filter(|h| hand_is_usable(h)).cloned().collect())
    } else {
        Cow::Borrowed(considered)
    };

    let image = match &frame.image {
        Some(image) if !image.is_consistent() => {
            issues.push(FrameIssue::Image {
                width: image.width,
                height: image.height,
                channels: image.channels,
                len: image.data.len(),
            });
            None
        }
        other => other.as_ref(),
    };

    Ok(FrameView {
        timestamp: frame.timestamp,
        width: frame.width,
        height: frame.height,
        face,
        pose,
        hands,
        image,
        issues,
    })
}

/// Strict check: any issue is an error
pub fn validate_frame(frame: &FrameInput) -> Result<(), PresenceError> {
    let view = view_frame(frame)?;
    match view.issues.first() {
        Some(issue) => Err(PresenceError::InvalidFrame(issue.to_string())),
        None => Ok(()),
    }
}

/// Result of validating one frame of a stream
#[derive(Debug, Clone, PartialEq)]
pub struct FrameValidation {
    pub index: usize,
    pub timestamp: f64,
    pub errors: Vec<String>,
}

/// Parser and validator for frame streams
pub struct FrameAdapter;

impl FrameAdapter {
    /// Parse a JSON array of frames
    pub fn parse_array(json: &str) -> Result<Vec<FrameInput>, PresenceError> {
        serde_json::from_str(json)
            .map_err(|e| PresenceError::ParseError(format!("Failed to parse frame array: {}", e)))
    }

    /// Parse NDJSON, one frame per line; blank lines are skipped
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<FrameInput>, PresenceError> {
        let mut frames = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let frame = serde_json::from_str::<FrameInput>(trimmed).map_err(|e| {
                PresenceError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Frames with at least one problem, in stream order
    pub fn validate_frames(frames: &[FrameInput]) -> Vec<FrameValidation> {
        frames
            .iter()
            .enumerate()
            .filter_map(|(index, frame)| {
                let errors = match view_frame(frame) {
                    Ok(view) => view.issues.iter().map(ToString::to_string).collect(),
                    Err(e) => vec![e.to_string()],
                };
                (!errors.is_empty()).then(|| FrameValidation {
                    index,
                    timestamp: frame.timestamp,
                    errors,
                })
            })
            .collect()
    }
}
