//! Session aggregate statistics
//!
//! Pure reducers over buffered frame records: label distributions,
//! continuous-signal summaries and alert totals.

use crate::types::{AlertKind, FrameRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counts and percentages of a categorical label
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub total: u64,
    pub counts: BTreeMap<String, u64>,
    /// Percent of `total` per label (sums to 100 when non-empty)
    pub percentages: BTreeMap<String, f64>,
}

impl Distribution {
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = &'a str>) -> Self {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut total = 0u64;
        for label in labels {
            *counts.entry(label.to_string()).or_default() += 1;
            total += 1;
        }
        let percentages = counts
            .iter()
            .map(|(label, count)| (label.clone(), *count as f64 / total as f64 * 100.0))
            .collect();
        Self {
            total,
            counts,
            percentages,
        }
    }

    /// Percentage of `label`, 0 when never seen
    pub fn percentage(&self, label: &str) -> f64 {
        self.percentages.get(label).copied().unwrap_or(0.0)
    }

    /// Most frequent label; ties resolve to the alphabetically first
    pub fn dominant(&self) -> Option<String> {
        let mut best: Option<(&String, u64)> = None;
        for (label, count) in &self.counts {
            if best.map_or(true, |(_, c)| *count > c) {
                best = Some((label, *count));
            }
        }
        best.map(|(label, _)| label.clone())
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Summary of a continuous signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalSummary {
    pub samples: u64,
    pub mean: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

impl SignalSummary {
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let (mean, variance) = crate::geometry::mean_and_variance(values);
        Self {
            samples: values.len() as u64,
            mean,
            variance,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Frames spent in each alert, and how many separate episodes occurred
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertTotals {
    pub poor_posture_frames: u64,
    pub not_focusing_frames: u64,
    pub fidgeting_frames: u64,
    pub poor_posture_episodes: u64,
    pub not_focusing_episodes: u64,
    pub fidgeting_episodes: u64,
}

impl AlertTotals {
    pub fn total_frames(&self) -> u64 {
        self.poor_posture_frames + self.not_focusing_frames + self.fidgeting_frames
    }

    pub fn total_episodes(&self) -> u64 {
        self.poor_posture_episodes + self.not_focusing_episodes + self.fidgeting_episodes
    }
}

pub fn alert_totals(frames: &[FrameRecord]) -> AlertTotals {
    let mut totals = AlertTotals::default();
    let mut active = [false; 3];

    for frame in frames {
        let alerts = &frame.attention.alerts;
        for (slot, kind) in [AlertKind::PoorPosture, AlertKind::NotFocusing, AlertKind::Fidgeting]
            .into_iter()
            .enumerate()
        {
            let raised = alerts.iter().any(|a| a.kind == kind);
            let (frames_total, episodes) = match kind {
                AlertKind::PoorPosture => (
                    &mut totals.poor_posture_frames,
                    &mut totals.poor_posture_episodes,
                ),
                AlertKind::NotFocusing => (
                    &mut totals.not_focusing_frames,
                    &mut totals.not_focusing_episodes,
                ),
                AlertKind::Fidgeting => (&mut totals.fidgeting_frames, &mut totals.fidgeting_episodes),
            };
            if raised {
                *frames_total += 1;
                if !active[slot] {
                    *episodes += 1;
                }
            }
            active[slot] = raised;
        }
    }

    totals
}

/// Session-wide aggregate statistics, stored in the raw dump
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_frames: u64,
    pub expression_distribution: Distribution,
    pub posture_distribution: Distribution,
    pub stress_distribution: Distribution,
    pub head_direction_distribution: Distribution,
    pub attention: SignalSummary,
    pub ear_avg: SignalSummary,
    pub mar: SignalSummary,
    pub blink_rate: SignalSummary,
    /// Solved poses only
    pub head_yaw: SignalSummary,
    pub head_pitch: SignalSummary,
    pub neck_angle: SignalSummary,
    pub torso_angle: SignalSummary,
    pub alerts: AlertTotals,
}

pub fn compute_stats(frames: &[FrameRecord]) -> SessionStats {
    let faces = || {
        frames
            .iter()
            .filter_map(|f| f.expression.as_ref())
            .filter(|e| e.face_detected)
    };
    let poses = || {
        frames
            .iter()
            .filter_map(|f| f.head_pose.as_ref())
            .filter(|h| h.solved)
    };
    let bodies = || {
        frames
            .iter()
            .filter_map(|f| f.posture.as_ref())
            .filter(|p| p.pose_detected)
    };
    let summarize = |values: Vec<f64>| SignalSummary::from_values(&values);
    let attention: Vec<f64> = frames.iter().map(|f| f.attention.attention_score).collect();

    SessionStats {
        total_frames: frames.len() as u64,
        expression_distribution: Distribution::from_labels(faces().map(|e| e.expression.as_str())),
        posture_distribution: Distribution::from_labels(
            frames
                .iter()
                .filter_map(|f| f.posture.as_ref())
                .map(|p| p.status.as_str()),
        ),
        stress_distribution: Distribution::from_labels(faces().map(|e| e.stress_level.as_str())),
        head_direction_distribution: Distribution::from_labels(
            frames
                .iter()
                .filter_map(|f| f.head_pose.as_ref())
                .map(|h| h.direction.as_str()),
        ),
        attention: SignalSummary::from_values(&attention),
        ear_avg: summarize(faces().map(|e| e.ear_avg).collect()),
        mar: summarize(faces().map(|e| e.mar).collect()),
        blink_rate: summarize(faces().map(|e| e.blink_rate).collect()),
        head_yaw: summarize(poses().map(|h| h.yaw).collect()),
        head_pitch: summarize(poses().map(|h| h.pitch).collect()),
        neck_angle: summarize(bodies().map(|p| p.neck_angle).collect()),
        torso_angle: summarize(bodies().map(|p| p.torso_angle).collect()),
        alerts: alert_totals(frames),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        AttentionAlert, AttentionMetrics, ExpressionMetrics, HeadPoseMetrics, PostureMetrics,
    };
    use pretty_assertions::assert_eq;

    fn with_alert(kind: Option<AlertKind>) -> FrameRecord {
        FrameRecord {
            attention: AttentionMetrics {
                alerts: kind
                    .map(|kind| {
                        vec![AttentionAlert {
                            kind,
                            consecutive_frames: 1,
                            message: String::new(),
                        }]
                    })
                    .unwrap_or_default(),
                ..AttentionMetrics::default()
            },
            ..FrameRecord::default()
        }
    }

    #[test]
    fn test_distribution() {
        let dist = Distribution::from_labels(["calm", "calm", "tense", "calm"]);
        assert_eq!(dist.total, 4);
        assert_eq!(dist.counts["calm"], 3);
        assert_eq!(dist.percentage("calm"), 75.0);
        assert_eq!(dist.percentage("surprised"), 0.0);
        assert_eq!(dist.dominant().as_deref(), Some("calm"));
        let sum: f64 = dist.percentages.values().sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_distribution() {
        let dist = Distribution::from_labels(std::iter::empty());
        assert!(dist.is_empty());
        assert!(dist.dominant().is_none());
        assert!(dist.percentages.is_empty());
    }

    #[test]
    fn test_dominant_tie_is_stable() {
        let dist = Distribution::from_labels(["tense", "calm"]);
        assert_eq!(dist.dominant().as_deref(), Some("calm"));
    }

    #[test]
    fn test_signal_summary() {
        let summary = SignalSummary::from_values(&[0.2, 0.4, 0.6]);
        assert_eq!(summary.samples, 3);
        assert!((summary.mean - 0.4).abs() < 1e-12);
        assert_eq!(summary.min, 0.2);
        assert_eq!(summary.max, 0.6);
        assert_eq!(SignalSummary::from_values(&[]), SignalSummary::default());
    }

    #[test]
    fn test_alert_episodes() {
        let frames = vec![
            with_alert(None),
            with_alert(Some(AlertKind::Fidgeting)),
            with_alert(Some(AlertKind::Fidgeting)),
            with_alert(None),
            with_alert(Some(AlertKind::Fidgeting)),
            with_alert(Some(AlertKind::NotFocusing)),
        ];
        let totals = alert_totals(&frames);
        assert_eq!(totals.fidgeting_frames, 3);
        assert_eq!(totals.fidgeting_episodes, 2);
        assert_eq!(totals.not_focusing_frames, 1);
        assert_eq!(totals.not_focusing_episodes, 1);
        assert_eq!(totals.poor_posture_frames, 0);
        assert_eq!(totals.total_episodes(), 3);
    }

    #[test]
    fn test_stats_skip_missing_columns() {
        let frames = vec![FrameRecord::default(); 4];
        let stats = compute_stats(&frames);
        assert_eq!(stats.total_frames, 4);
        assert!(stats.expression_distribution.is_empty());
        assert!(stats.head_direction_distribution.is_empty());
        assert_eq!(stats.attention.samples, 4);
        assert_eq!(stats.ear_avg.samples, 0);
        assert_eq!(stats.blink_rate.samples, 0);
        assert_eq!(stats.head_yaw.samples, 0);
        assert_eq!(stats.neck_angle.samples, 0);
    }

    #[test]
    fn test_stats_summarize_continuous_signals() {
        let frame = |ear: f64, yaw: f64, neck: f64, detected: bool| FrameRecord {
            expression: Some(ExpressionMetrics {
                face_detected: detected,
                ear_avg: ear,
                mar: 0.25,
                blink_rate: 15.0,
                ..ExpressionMetrics::default()
            }),
            head_pose: Some(HeadPoseMetrics {
                yaw,
                pitch: -4.0,
                solved: detected,
                ..HeadPoseMetrics::default()
            }),
            posture: Some(PostureMetrics {
                pose_detected: detected,
                neck_angle: neck,
                torso_angle: 5.0,
                ..PostureMetrics::default()
            }),
            ..FrameRecord::default()
        };
        let frames = vec![
            frame(0.25, -10.0, 10.0, true),
            frame(0.35, 10.0, 20.0, true),
            frame(0.0, 90.0, 80.0, false),
        ];
        let stats = compute_stats(&frames);

        assert_eq!(stats.ear_avg.samples, 2);
        assert!((stats.ear_avg.mean - 0.3).abs() < 1e-12);
        assert_eq!(stats.ear_avg.min, 0.25);
        assert_eq!(stats.ear_avg.max, 0.35);
        assert_eq!(stats.mar.samples, 2);
        assert_eq!(stats.blink_rate.mean, 15.0);
        assert_eq!(stats.head_yaw.samples, 2);
        assert_eq!(stats.head_yaw.mean, 0.0);
        assert_eq!(stats.head_yaw.max, 10.0);
        assert_eq!(stats.head_pitch.mean, -4.0);
        assert_eq!(stats.neck_angle.samples, 2);
        assert_eq!(stats.neck_angle.mean, 15.0);
        assert_eq!(stats.neck_angle.max, 20.0);
        assert_eq!(stats.torso_angle.variance, 0.0);
    }
}
