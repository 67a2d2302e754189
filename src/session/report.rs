//! Interview analysis report
//!
//! Each sub-report is a pure reducer over the full frame-record collection
//! and tolerates missing detector columns by substituting neutral defaults.
//! `InterviewReporter` stamps producer metadata and assembles the final
//! report once, at session end.

use crate::config::SessionConfig;
use crate::session::stats::{alert_totals, AlertTotals, Distribution, SignalSummary};
use crate::types::{
    Expression, ExpressionMetrics, FrameRecord, GestureMetrics, HeadDirection, HeadPoseMetrics,
    PostureBucket, PostureStatus, StressLevel,
};
use crate::{PRODUCER_NAME, VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sub-score used for every component when there is nothing to score
pub const NEUTRAL_SUBSCORE: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionReport {
    pub distribution: Distribution,
    pub dominant: Option<String>,
    pub positive_pct: f64,
    pub negative_pct: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacialMetricsReport {
    pub frames_with_face: u64,
    pub average_ear: f64,
    pub average_mar: f64,
    pub average_blink_rate: f64,
    pub total_blinks: u32,
    pub eyes_closed_pct: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadPoseReport {
    pub distribution: Distribution,
    pub dominant: Option<String>,
    pub average_yaw: f64,
    pub average_pitch: f64,
    pub average_roll: f64,
    pub average_engagement: f64,
    pub center_pct: f64,
    pub solved_frames: u64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostureReport {
    pub distribution: Distribution,
    pub dominant: Option<String>,
    pub good_pct: f64,
    pub neutral_pct: f64,
    pub poor_pct: f64,
    pub fidgeting_pct: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureReport {
    pub frames_analyzed: u64,
    pub face_touch_pct: f64,
    pub face_touch_count: u32,
    pub fidgeting_pct: f64,
    pub excessive_gesturing_pct: f64,
    pub arms_crossed_pct: f64,
    pub hand_near_head_pct: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub distribution: Distribution,
    pub dominant: Option<String>,
    pub high_stress_pct: f64,
    pub moderate_stress_pct: f64,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttentionReport {
    pub summary: SignalSummary,
    pub engaged_pct: f64,
    pub distracted_pct: f64,
    pub alerts: AlertTotals,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
    Poor,
}

impl Rating {
    pub fn from_score(score: f64) -> Self {
        if score >= 85.0 {
            Rating::Excellent
        } else if score >= 70.0 {
            Rating::Good
        } else if score >= 55.0 {
            Rating::Fair
        } else if score >= 40.0 {
            Rating::NeedsImprovement
        } else {
            Rating::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Fair => "fair",
            Rating::NeedsImprovement => "needs_improvement",
            Rating::Poor => "poor",
        }
    }
}

/// Weighted overall score and its components, each 0-100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    pub overall_score: f64,
    pub attention_score: f64,
    pub posture_score: f64,
    pub emotional_control_score: f64,
    pub gesture_control_score: f64,
    pub rating: Rating,
}

/// Final report, computed once at session end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewAnalysisReport {
    pub producer: ReportProducer,
    pub session_id: String,
    pub generated_at_utc: String,
    pub duration_sec: f64,
    pub total_frames: u64,
    pub emotions: EmotionReport,
    pub facial_metrics: FacialMetricsReport,
    pub head_pose: HeadPoseReport,
    pub postures: PostureReport,
    pub gestures: GestureReport,
    pub stress: StressReport,
    pub attention: AttentionReport,
    pub overall_interview_score: OverallScore,
}

fn pct(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn expressions(frames: &[FrameRecord]) -> impl Iterator<Item = &ExpressionMetrics> {
    frames
        .iter()
        .filter_map(|f| f.expression.as_ref())
        .filter(|e| e.face_detected)
}

// ============================================================================
// Sub-reports
// ============================================================================

pub fn emotions_report(frames: &[FrameRecord]) -> EmotionReport {
    let labels: Vec<Expression> = expressions(frames).map(|e| e.expression).collect();
    let distribution = Distribution::from_labels(labels.iter().map(|e| e.as_str()));
    let positive_pct = pct(labels.iter().filter(|e| e.is_positive()).count(), labels.len());
    let negative_pct = pct(labels.iter().filter(|e| e.is_negative()).count(), labels.len());

    let recommendation = if labels.is_empty() {
        "No face was visible; make sure your face is well lit and in frame."
    } else if negative_pct > 30.0 {
        "Tense or negative expressions were frequent; practice relaxed, open expressions."
    } else if positive_pct < 10.0 {
        "Smile occasionally to come across as more approachable."
    } else {
        "Expressions looked natural and composed."
    };

    EmotionReport {
        dominant: distribution.dominant(),
        distribution,
        positive_pct,
        negative_pct,
        recommendation: recommendation.to_string(),
    }
}

pub fn facial_metrics_report(frames: &[FrameRecord]) -> FacialMetricsReport {
    let faces: Vec<_> = expressions(frames).collect();
    let average_blink_rate = mean(faces.iter().map(|e| e.blink_rate)).unwrap_or(0.0);
    let eyes_closed_pct = pct(faces.iter().filter(|e| e.eyes_closed).count(), faces.len());

    let recommendation = if faces.is_empty() {
        "No facial metrics were captured."
    } else if eyes_closed_pct > 10.0 {
        "Eyes were often closed; keep your eyes open and on the camera."
    } else if average_blink_rate > 25.0 {
        "An elevated blink rate can signal nerves; slow your breathing before answering."
    } else {
        "Eye behavior looked natural."
    };

    FacialMetricsReport {
        frames_with_face: faces.len() as u64,
        average_ear: mean(faces.iter().map(|e| e.ear_avg)).unwrap_or(0.0),
        average_mar: mean(faces.iter().map(|e| e.mar)).unwrap_or(0.0),
        average_blink_rate,
        total_blinks: faces.iter().map(|e| e.blink_count).max().unwrap_or(0),
        eyes_closed_pct,
        recommendation: recommendation.to_string(),
    }
}

/// Frames without a head pose count as centered with engagement 0.7
pub fn head_pose_report(frames: &[FrameRecord]) -> HeadPoseReport {
    let poses: Vec<HeadPoseMetrics> = frames
        .iter()
        .map(|f| f.head_pose.unwrap_or_default())
        .collect();
    let distribution = Distribution::from_labels(poses.iter().map(|h| h.direction.as_str()));
    let center_pct = if poses.is_empty() {
        100.0
    } else {
        pct(
            poses.iter().filter(|h| h.direction == HeadDirection::Center).count(),
            poses.len(),
        )
    };

    let recommendation = if center_pct < 60.0 {
        "You often looked away from the camera; keep your head facing forward."
    } else if center_pct < 85.0 {
        "Mostly facing the camera; try to hold eye contact a little longer."
    } else {
        "Consistently facing the camera."
    };

    HeadPoseReport {
        dominant: distribution.dominant(),
        distribution,
        average_yaw: mean(poses.iter().map(|h| h.yaw)).unwrap_or(0.0),
        average_pitch: mean(poses.iter().map(|h| h.pitch)).unwrap_or(0.0),
        average_roll: mean(poses.iter().map(|h| h.roll)).unwrap_or(0.0),
        average_engagement: mean(poses.iter().map(|h| h.engagement))
            .unwrap_or(HeadPoseMetrics::default().engagement),
        center_pct,
        solved_frames: poses.iter().filter(|h| h.solved).count() as u64,
        recommendation: recommendation.to_string(),
    }
}

pub fn posture_report(frames: &[FrameRecord]) -> PostureReport {
    let postures: Vec<_> = frames
        .iter()
        .filter_map(|f| f.posture.as_ref())
        .filter(|p| p.status != PostureStatus::NoPose)
        .collect();
    let distribution = Distribution::from_labels(postures.iter().map(|p| p.status.as_str()));
    let bucket_pct = |bucket: PostureBucket| {
        pct(
            postures.iter().filter(|p| p.status.bucket() == bucket).count(),
            postures.len(),
        )
    };
    let good_pct = bucket_pct(PostureBucket::Good);
    let neutral_pct = bucket_pct(PostureBucket::Neutral);
    let poor_pct = bucket_pct(PostureBucket::Poor);

    let recommendation = if postures.is_empty() {
        "Your upper body was not visible; sit so your shoulders are in frame."
    } else if poor_pct > 30.0 {
        "Sit upright and avoid slouching or leaning back."
    } else if good_pct >= 60.0 {
        "Posture looked upright and confident."
    } else {
        "Posture was acceptable; aim for a more upright stance."
    };

    PostureReport {
        dominant: distribution.dominant(),
        distribution,
        good_pct,
        neutral_pct,
        poor_pct,
        fidgeting_pct: pct(postures.iter().filter(|p| p.is_fidgeting).count(), postures.len()),
        recommendation: recommendation.to_string(),
    }
}

pub fn gesture_report(frames: &[FrameRecord]) -> GestureReport {
    let gestures: Vec<_> = frames.iter().filter_map(|f| f.gesture.as_ref()).collect();
    let share = |flag: fn(&GestureMetrics) -> bool| {
        pct(gestures.iter().filter(|g| flag(g)).count(), gestures.len())
    };
    let face_touch_pct = share(|g| g.face_touching);
    let fidgeting_pct = share(|g| g.hand_fidgeting);
    let excessive_gesturing_pct = share(|g| g.excessive_gesturing);

    let recommendation = if face_touch_pct > 10.0 {
        "Avoid touching your face while answering."
    } else if fidgeting_pct > 15.0 {
        "Keep your hands calm; fidgeting reads as nervousness."
    } else if excessive_gesturing_pct > 20.0 {
        "Tone down large hand movements."
    } else {
        "Hand movements looked controlled."
    };

    GestureReport {
        frames_analyzed: gestures.len() as u64,
        face_touch_pct,
        face_touch_count: gestures.iter().map(|g| g.face_touch_count).max().unwrap_or(0),
        fidgeting_pct,
        excessive_gesturing_pct,
        arms_crossed_pct: share(|g| g.arms_crossed),
        hand_near_head_pct: share(|g| g.hand_near_head),
        recommendation: recommendation.to_string(),
    }
}

pub fn stress_report(frames: &[FrameRecord]) -> StressReport {
    let levels: Vec<StressLevel> = expressions(frames).map(|e| e.stress_level).collect();
    let distribution = Distribution::from_labels(levels.iter().map(|s| s.as_str()));
    let high_stress_pct = distribution.percentage(StressLevel::HighStress.as_str());
    let moderate_stress_pct = distribution.percentage(StressLevel::ModerateStress.as_str());

    let recommendation = if high_stress_pct > 30.0 {
        "Signs of high stress; pause and breathe between answers."
    } else if high_stress_pct + moderate_stress_pct > 40.0 {
        "Some signs of stress; slowing down can help you stay composed."
    } else {
        "You appeared composed."
    };

    StressReport {
        dominant: distribution.dominant(),
        distribution,
        high_stress_pct,
        moderate_stress_pct,
        recommendation: recommendation.to_string(),
    }
}

pub fn attention_report(frames: &[FrameRecord]) -> AttentionReport {
    let scores: Vec<f64> = frames.iter().map(|f| f.attention.attention_score).collect();
    let summary = SignalSummary::from_values(&scores);

    let recommendation = if scores.is_empty() {
        "No frames were analyzed."
    } else if summary.mean < 0.4 {
        "Attention often drifted; face the camera and keep an open posture."
    } else if summary.mean < 0.7 {
        "Moderate engagement; steadier eye contact would help."
    } else {
        "Strong, steady engagement."
    };

    AttentionReport {
        summary,
        engaged_pct: pct(frames.iter().filter(|f| f.attention.is_engaged).count(), frames.len()),
        distracted_pct: pct(
            frames.iter().filter(|f| f.attention.is_distracted).count(),
            frames.len(),
        ),
        alerts: alert_totals(frames),
        recommendation: recommendation.to_string(),
    }
}

// ============================================================================
// Overall score
// ============================================================================

/// 100 x mean fused attention
pub fn attention_subscore(frames: &[FrameRecord]) -> f64 {
    mean(frames.iter().map(|f| f.attention.attention_score))
        .map(|m| (m * 100.0).clamp(0.0, 100.0))
        .unwrap_or(NEUTRAL_SUBSCORE)
}

/// Share-weighted posture quality; frames without a pose are excluded
pub fn posture_subscore(frames: &[FrameRecord]) -> f64 {
    let weights: Vec<f64> = frames
        .iter()
        .filter_map(|f| f.posture.as_ref())
        .filter_map(|p| match p.status {
            PostureStatus::UprightRelaxed | PostureStatus::EngagedForwardLean => Some(1.0),
            PostureStatus::NeutralPosture => Some(0.6),
            PostureStatus::SlightlyPoor => Some(0.4),
            PostureStatus::Slouching | PostureStatus::LeaningBack | PostureStatus::FacingAway => {
                Some(0.0)
            }
            PostureStatus::NoPose => None,
        })
        .collect();
    mean(weights.into_iter())
        .map(|m| (m * 100.0).clamp(0.0, 100.0))
        .unwrap_or(NEUTRAL_SUBSCORE)
}

/// 100 minus negative-expression and stress shares
pub fn emotional_control_subscore(frames: &[FrameRecord]) -> f64 {
    let faces: Vec<_> = expressions(frames).collect();
    if faces.is_empty() {
        return NEUTRAL_SUBSCORE;
    }
    let share = |pred: fn(&ExpressionMetrics) -> bool| {
        pct(faces.iter().filter(|e| pred(e)).count(), faces.len())
    };
    let negative = share(|e| e.expression.is_negative());
    let high = share(|e| e.stress_level == StressLevel::HighStress);
    let moderate = share(|e| e.stress_level == StressLevel::ModerateStress);
    (100.0 - negative - 0.5 * high - 0.25 * moderate).clamp(0.0, 100.0)
}

/// 100 minus weighted shares of distracting hand behavior
pub fn gesture_control_subscore(frames: &[FrameRecord]) -> f64 {
    let report = gesture_report(frames);
    if report.frames_analyzed == 0 {
        return NEUTRAL_SUBSCORE;
    }
    (100.0
        - report.face_touch_pct
        - 0.8 * report.fidgeting_pct
        - 0.5 * report.excessive_gesturing_pct
        - 0.5 * report.arms_crossed_pct
        - 0.3 * report.hand_near_head_pct)
        .clamp(0.0, 100.0)
}

pub fn overall_score(frames: &[FrameRecord], config: &SessionConfig) -> OverallScore {
    let attention_score = attention_subscore(frames);
    let posture_score = posture_subscore(frames);
    let emotional_control_score = emotional_control_subscore(frames);
    let gesture_control_score = gesture_control_subscore(frames);

    let overall = (config.attention_weight * attention_score
        + config.posture_weight * posture_score
        + config.emotional_control_weight * emotional_control_score
        + config.gesture_control_weight * gesture_control_score)
        .clamp(0.0, 100.0);

    OverallScore {
        overall_score: overall,
        attention_score,
        posture_score,
        emotional_control_score,
        gesture_control_score,
        rating: Rating::from_score(overall),
    }
}

/// Builds interview reports stamped with this producer's identity
#[derive(Debug, Clone)]
pub struct InterviewReporter {
    instance_id: String,
    config: SessionConfig,
}

impl Default for InterviewReporter {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl InterviewReporter {
    /// Create a reporter with a unique instance ID
    pub fn new(config: SessionConfig) -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
            config,
        }
    }

    /// Create a reporter with a specific instance ID
    pub fn with_instance_id(instance_id: String, config: SessionConfig) -> Self {
        Self {
            instance_id,
            config,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn build(
        &self,
        session_id: &str,
        duration_sec: f64,
        frames: &[FrameRecord],
        generated_at: DateTime<Utc>,
    ) -> InterviewAnalysisReport {
        InterviewAnalysisReport {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            session_id: session_id.to_string(),
            generated_at_utc: generated_at.to_rfc3339(),
            duration_sec,
            total_frames: frames.len() as u64,
            emotions: emotions_report(frames),
            facial_metrics: facial_metrics_report(frames),
            head_pose: head_pose_report(frames),
            postures: posture_report(frames),
            gestures: gesture_report(frames),
            stress: stress_report(frames),
            attention: attention_report(frames),
            overall_interview_score: overall_score(frames, &self.config),
        }
    }
}
