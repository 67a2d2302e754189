//! Gesture detection
//!
//! Face touching, hand near head, hand fidgeting, excessive gesturing and
//! crossed arms from hand/face landmark proximity and per-hand motion
//! history.
//!
//! Hands are assigned to the left/right slot by the landmark source's
//! handedness label when it supplies one. Otherwise detection order is used
//! (first hand = left), which is only an approximation: the slots may swap
//! between frames when the detector reorders its output.

use crate::config::GestureConfig;
use crate::geometry::{centroid, distance_2d, mean_velocity, position_variance, range_of_motion};
use crate::history::History;
use crate::landmarks::{face, hand};
use crate::types::{GestureMetrics, HandLandmarks, Handedness, LandmarkSet, Point};

/// Hands for one frame, by slot
#[derive(Debug, Clone, Copy, Default)]
pub struct AssignedHands<'a> {
    pub left: Option<&'a LandmarkSet>,
    pub right: Option<&'a LandmarkSet>,
}

impl<'a> AssignedHands<'a> {
    fn slot_mut(&mut self, side: Handedness) -> &mut Option<&'a LandmarkSet> {
        match side {
            Handedness::Left => &mut self.left,
            Handedness::Right => &mut self.right,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a LandmarkSet> {
        self.left.into_iter().chain(self.right)
    }

    pub fn count(&self) -> u8 {
        self.left.is_some() as u8 + self.right.is_some() as u8
    }
}

/// Assign usable hands to slots: labelled hands first, then unlabelled hands
/// fill the free slots in detection order. Extra hands are ignored.
pub fn assign_hands(hands: &[HandLandmarks]) -> AssignedHands<'_> {
    let mut assigned = AssignedHands::default();
    let usable = move || hands.iter().filter(|h| h.landmarks.is_usable(hand::POINT_COUNT));

    for h in usable() {
        let Some(side) = h.handedness else {
            continue;
        };
        // A duplicated label falls through to the other slot
        let other = match side {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        };
        for candidate in [side, other] {
            let slot = assigned.slot_mut(candidate);
            if slot.is_none() {
                *slot = Some(&h.landmarks);
                break;
            }
        }
    }

    for h in usable().filter(|h| h.handedness.is_none()) {
        if assigned.left.is_none() {
            assigned.left = Some(&h.landmarks);
        } else if assigned.right.is_none() {
            assigned.right = Some(&h.landmarks);
        }
    }

    assigned
}

/// True when any fingertip lies within `threshold` of any face-region point
pub fn is_touching_face(hand_points: &LandmarkSet, face_points: &[Point], threshold: f64) -> bool {
    hand::FINGERTIPS
        .iter()
        .filter_map(|&i| hand_points.get(i))
        .any(|tip| face_points.iter().any(|f| distance_2d(&tip, f) < threshold))
}

/// True when the wrist lies within `threshold` of any top-of-head point
pub fn is_near_head(hand_points: &LandmarkSet, head_points: &[Point], threshold: f64) -> bool {
    match hand_points.get(hand::WRIST) {
        Some(wrist) => head_points.iter().any(|p| distance_2d(&wrist, p) < threshold),
        None => false,
    }
}

/// Coarse crossed-arms check: both wrists close together near the horizontal center
pub fn arms_crossed(left: &LandmarkSet, right: &LandmarkSet, config: &GestureConfig) -> bool {
    let (Some(lw), Some(rw)) = (left.get(hand::WRIST), right.get(hand::WRIST)) else {
        return false;
    };
    distance_2d(&lw, &rw) < config.crossed_arms_distance
        && (lw.x - 0.5).abs() < config.crossed_arms_center_band
        && (rw.x - 0.5).abs() < config.crossed_arms_center_band
}

/// Motion statistics of one hand over the motion window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HandMotion {
    pub samples: usize,
    pub velocity: f64,
    pub variance: f64,
    pub amplitude: f64,
}

impl HandMotion {
    pub fn from_history(history: &History<Point>, window: usize) -> Self {
        let recent = history.recent_vec(window);
        Self {
            samples: history.len(),
            velocity: mean_velocity(&recent),
            variance: position_variance(&recent),
            amplitude: range_of_motion(&recent),
        }
    }

    /// Jittery small motion: needs a full window, fast and spread out
    pub fn is_fidgeting(&self, config: &GestureConfig) -> bool {
        self.samples >= config.motion_window
            && self.velocity > config.fidget_velocity
            && self.variance > config.fidget_variance
    }

    pub fn is_excessive(&self, config: &GestureConfig) -> bool {
        self.amplitude > config.excessive_amplitude
    }
}

/// Per-session gesture detector
#[derive(Debug, Clone)]
pub struct GestureDetector {
    config: GestureConfig,
    left_history: History<Point>,
    right_history: History<Point>,
    touch_duration: u32,
    touch_count: u32,
}

impl Default for GestureDetector {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureDetector {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            left_history: History::new(config.history_window),
            right_history: History::new(config.history_window),
            touch_duration: 0,
            touch_count: 0,
            config,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn history(&self, side: Handedness) -> &History<Point> {
        match side {
            Handedness::Left => &self.left_history,
            Handedness::Right => &self.right_history,
        }
    }

    pub fn touch_count(&self) -> u32 {
        self.touch_count
    }

    pub fn analyze(&mut self, hands: &[HandLandmarks], face_landmarks: Option<&LandmarkSet>) -> GestureMetrics {
        let assigned = assign_hands(hands);

        // A hand that leaves the frame starts a fresh track when it returns
        for (slot, history) in [
            (assigned.left, &mut self.left_history),
            (assigned.right, &mut self.right_history),
        ] {
            match slot.and_then(|l| centroid(&l.points)) {
                Some(center) => {
                    history.push(center);
                }
                None => history.clear(),
            }
        }

        let face_points = face_landmarks
            .filter(|l| l.is_usable(face::POINT_COUNT))
            .and_then(|l| Some((l.select(&face::TOUCH_REGION)?, l.select(&face::HEAD_TOP)?)));

        let (touching, near_head) = match &face_points {
            Some((region, head_top)) => (
                assigned
                    .iter()
                    .any(|h| is_touching_face(h, region, self.config.face_touch_distance)),
                assigned.iter().any(|h| {
                    is_near_head(
                        h,
                        head_top,
                        self.config.face_touch_distance * self.config.near_head_factor,
                    )
                }),
            ),
            None => (false, false),
        };

        if touching {
            self.touch_duration += 1;
            if self.touch_duration == 1 {
                self.touch_count += 1;
            }
        } else {
            self.touch_duration = 0;
        }

        let motions: Vec<HandMotion> = [&self.left_history, &self.right_history]
            .into_iter()
            .filter(|h| !h.is_empty())
            .map(|h| HandMotion::from_history(h, self.config.motion_window))
            .collect();

        let crossed = match (assigned.left, assigned.right) {
            (Some(l), Some(r)) => arms_crossed(l, r, &self.config),
            _ => false,
        };

        GestureMetrics {
            hands_detected: assigned.count(),
            face_touching: touching,
            face_touch_duration: self.touch_duration,
            face_touch_count: self.touch_count,
            hand_near_head: near_head,
            hand_fidgeting: motions.iter().any(|m| m.is_fidgeting(&self.config)),
            excessive_gesturing: motions.iter().any(|m| m.is_excessive(&self.config)),
            arms_crossed: crossed,
            hand_velocity: motions.iter().map(|m| m.velocity).fold(0.0, f64::max),
            gesture_amplitude: motions.iter().map(|m| m.amplitude).fold(0.0, f64::max),
        }
    }

    pub fn reset(&mut self) {
        self.left_history.clear();
        self.right_history.clear();
        self.touch_duration = 0;
        self.touch_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{face_mesh, hand_at};

    #[test]
    fn test_no_hands() {
        let mut detector = GestureDetector::default();
        let metrics = detector.analyze(&[], Some(&face_mesh(0.3, 0.1)));
        assert_eq!(metrics, GestureMetrics::default());
    }

    #[test]
    fn test_face_touch_counted_once_per_touch() {
        let mut detector = GestureDetector::default();
        let face = face_mesh(0.3, 0.1);
        let on_nose = hand_at(0.5, 0.5, None);
        let away = hand_at(0.9, 0.9, None);

        for expected_duration in 1..=5 {
            let metrics = detector.analyze(std::slice::from_ref(&on_nose), Some(&face));
            assert!(metrics.face_touching);
            assert_eq!(metrics.face_touch_duration, expected_duration);
            assert_eq!(metrics.face_touch_count, 1);
        }

        let metrics = detector.analyze(std::slice::from_ref(&away), Some(&face));
        assert!(!metrics.face_touching);
        assert_eq!(metrics.face_touch_duration, 0);

        let metrics = detector.analyze(std::slice::from_ref(&on_nose), Some(&face));
        assert_eq!(metrics.face_touch_count, 2);
        assert_eq!(detector.touch_count(), 2);
    }

    #[test]
    fn test_touch_needs_face() {
        let mut detector = GestureDetector::default();
        let metrics = detector.analyze(&[hand_at(0.5, 0.5, None)], None);
        assert_eq!(metrics.hands_detected, 1);
        assert!(!metrics.face_touching);
    }

    #[test]
    fn test_hand_near_head() {
        let mut detector = GestureDetector::default();
        let face = face_mesh(0.3, 0.1);
        // Wrist 0.08 below the fingertips lands just under the forehead
        let metrics = detector.analyze(&[hand_at(0.5, 0.15, None)], Some(&face));
        assert!(metrics.hand_near_head);
    }

    #[test]
    fn test_fidgeting_needs_full_window() {
        let mut detector = GestureDetector::default();
        let mut last = GestureMetrics::default();
        for i in 0..30 {
            let offset = if i % 2 == 0 { 0.03 } else { -0.03 };
            last = detector.analyze(&[hand_at(0.8 + offset, 0.8 - offset, None)], None);
            if i < 29 {
                assert!(!last.hand_fidgeting, "frame {i}");
            }
        }
        assert!(last.hand_fidgeting);
        assert!(!last.excessive_gesturing);
    }

    #[test]
    fn test_still_hand_is_not_fidgeting() {
        let mut detector = GestureDetector::default();
        let mut last = GestureMetrics::default();
        for _ in 0..40 {
            last = detector.analyze(&[hand_at(0.8, 0.8, None)], None);
        }
        assert!(!last.hand_fidgeting);
        assert_eq!(last.hand_velocity, 0.0);
    }

    #[test]
    fn test_excessive_gesturing() {
        let mut detector = GestureDetector::default();
        let mut last = GestureMetrics::default();
        for i in 0..10 {
            last = detector.analyze(&[hand_at(0.1 + i as f64 * 0.06, 0.5, None)], None);
        }
        assert!(last.excessive_gesturing);
        assert!(last.gesture_amplitude > 0.35);
    }

    #[test]
    fn test_arms_crossed() {
        let mut detector = GestureDetector::default();
        let hands = [hand_at(0.46, 0.7, None), hand_at(0.54, 0.7, None)];
        let metrics = detector.analyze(&hands, None);
        assert_eq!(metrics.hands_detected, 2);
        assert!(metrics.arms_crossed);

        let apart = [hand_at(0.2, 0.7, None), hand_at(0.8, 0.7, None)];
        assert!(!detector.analyze(&apart, None).arms_crossed);
    }

    #[test]
    fn test_detection_order_assignment() {
        let mut detector = GestureDetector::default();
        let hands = [hand_at(0.8, 0.7, None), hand_at(0.2, 0.7, None)];
        detector.analyze(&hands, None);
        let left = detector.history(Handedness::Left).back().unwrap();
        assert!(left.x > 0.7);
    }

    #[test]
    fn test_handedness_label_overrides_order() {
        let mut detector = GestureDetector::default();
        let hands = [
            hand_at(0.8, 0.7, Some(Handedness::Right)),
            hand_at(0.2, 0.7, Some(Handedness::Left)),
        ];
        detector.analyze(&hands, None);
        let left = detector.history(Handedness::Left).back().unwrap();
        let right = detector.history(Handedness::Right).back().unwrap();
        assert!(left.x < 0.3);
        assert!(right.x > 0.7);
    }

    #[test]
    fn test_mixed_labels_fill_free_slot() {
        let hands = [
            hand_at(0.2, 0.7, None),
            hand_at(0.8, 0.7, Some(Handedness::Left)),
        ];
        let assigned = assign_hands(&hands);
        assert!(assigned.left.unwrap().points[0].x > 0.7);
        assert!(assigned.right.unwrap().points[0].x < 0.3);
    }

    #[test]
    fn test_lost_hand_resets_track() {
        let mut detector = GestureDetector::default();
        for _ in 0..5 {
            detector.analyze(&[hand_at(0.5, 0.8, None)], None);
        }
        assert_eq!(detector.history(Handedness::Left).len(), 5);
        detector.analyze(&[], None);
        assert!(detector.history(Handedness::Left).is_empty());
    }
}
