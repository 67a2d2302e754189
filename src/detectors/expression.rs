//! Expression detector
//!
//! Eye/mouth aspect ratios, blink detection and rate, and emotion
//! classification with confidence gating and majority-vote smoothing.
//!
//! Emotion classification is delegated to an external [`EmotionClassifier`]
//! on a decimated schedule. Between classifier runs the last result is
//! reused while the EAR/MAR/blink fields refresh every frame. When the
//! classifier is missing or fails, a landmark heuristic stands in.

use crate::config::ExpressionConfig;
use crate::error::PresenceError;
use crate::geometry::{distance_2d, exponential_smooth, eye_aspect_ratio, mouth_aspect_ratio};
use crate::history::History;
use crate::landmarks::face;
use crate::types::{
    Emotion, EmotionSource, Expression, ExpressionMetrics, ImageFrame, LandmarkSet, Point,
    StressLevel,
};
use std::collections::BTreeMap;
use tracing::debug;

/// Face region cut from the frame for the classifier
#[derive(Debug, Clone, PartialEq)]
pub struct FaceCrop {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

/// One classifier result: the winning category plus the full distribution
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionReading {
    pub emotion: Emotion,
    pub confidence: f64,
    pub scores: BTreeMap<Emotion, f64>,
}

impl EmotionReading {
    /// Pick the highest-scoring category; `None` for an empty distribution
    pub fn from_scores(scores: BTreeMap<Emotion, f64>) -> Option<Self> {
        let (emotion, confidence) = scores
            .iter()
            .filter(|(_, s)| s.is_finite())
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(e, s)| (*e, *s))?;
        Some(Self {
            emotion,
            confidence: confidence.clamp(0.0, 1.0),
            scores,
        })
    }

    /// Single-category reading
    pub fn single(emotion: Emotion, confidence: f64) -> Self {
        let mut scores = BTreeMap::new();
        scores.insert(emotion, confidence);
        Self {
            emotion,
            confidence,
            scores,
        }
    }
}

/// External emotion classifier.
///
/// Implementations may fail; the detector falls back to its landmark
/// heuristic instead of propagating the error.
pub trait EmotionClassifier: Send {
    fn classify(&mut self, face: &FaceCrop) -> Result<EmotionReading, PresenceError>;
}

/// Whether the classifier should run this frame
pub fn should_recompute(frames_since_last: u32, interval: u32, has_cached: bool) -> bool {
    !has_cached || frames_since_last >= interval.max(1)
}

/// Two-state cache around the decimated classifier: the last computed
/// result and the frames elapsed since it was computed.
#[derive(Debug, Clone)]
pub struct ClassifierCache {
    interval: u32,
    frames_since_last: u32,
    last: Option<ReportedExpression>,
}

impl ClassifierCache {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            frames_since_last: 0,
            last: None,
        }
    }

    /// Advance one frame and report whether a fresh classification is due
    pub fn advance(&mut self) -> bool {
        self.frames_since_last = self.frames_since_last.saturating_add(1);
        should_recompute(self.frames_since_last, self.interval, self.last.is_some())
    }

    pub fn store(&mut self, result: ReportedExpression) {
        self.last = Some(result);
        self.frames_since_last = 0;
    }

    pub fn cached(&self) -> Option<&ReportedExpression> {
        self.last.as_ref()
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn clear(&mut self) {
        self.last = None;
        self.frames_since_last = 0;
    }
}

/// Smoothed expression as reported to callers
#[derive(Debug, Clone, PartialEq)]
pub struct ReportedExpression {
    pub expression: Expression,
    pub confidence: f64,
    pub raw_emotion: Option<Emotion>,
    pub source: EmotionSource,
}

/// Apply the minimum-confidence gate to a raw reading
pub fn gate_reading(reading: &EmotionReading, config: &ExpressionConfig) -> (Expression, f64) {
    if reading.confidence < config.min_confidence {
        (
            Expression::Calm,
            reading.confidence * config.low_confidence_scale,
        )
    } else {
        (Expression::from_emotion(reading.emotion), reading.confidence)
    }
}

/// Majority vote over the newest `vote_window` labels.
///
/// A non-calm label needs `min_votes` agreeing entries, otherwise the result
/// collapses to calm. Confidence is the mean of the agreeing entries plus a
/// consistency boost, capped.
pub fn vote_expression(
    labels: &[(Expression, f64)],
    config: &ExpressionConfig,
) -> (Expression, f64) {
    let skip = labels.len().saturating_sub(config.vote_window);
    let window = &labels[skip..];
    if window.is_empty() {
        return (Expression::Calm, 0.0);
    }

    let mut counts: Vec<(Expression, usize)> = Vec::new();
    for (label, _) in window {
        match counts.iter_mut().find(|(l, _)| l == label) {
            Some(entry) => entry.1 += 1,
            None => counts.push((*label, 1)),
        }
    }

    // Highest count wins; ties go to calm, then to the most recent label
    let (mut label, mut votes) = (Expression::Calm, 0usize);
    for (candidate, count) in &counts {
        let better = *count > votes
            || (*count == votes && *candidate == Expression::Calm)
            || (*count == votes
                && label != Expression::Calm
                && last_position(window, *candidate) > last_position(window, label));
        if better {
            label = *candidate;
            votes = *count;
        }
    }

    if label != Expression::Calm && votes < config.min_votes {
        label = Expression::Calm;
        votes = window.iter().filter(|(l, _)| *l == Expression::Calm).count();
    }

    let agreeing: Vec<f64> = window
        .iter()
        .filter(|(l, _)| *l == label)
        .map(|(_, c)| *c)
        .collect();
    let base = if agreeing.is_empty() {
        let mean = window.iter().map(|(_, c)| c).sum::<f64>() / window.len() as f64;
        mean * config.low_confidence_scale
    } else {
        agreeing.iter().sum::<f64>() / agreeing.len() as f64
    };

    let boost = consistency_boost(votes, config);
    (label, (base + boost).min(config.confidence_cap).max(0.0))
}

fn last_position(window: &[(Expression, f64)], label: Expression) -> Option<usize> {
    window.iter().rposition(|(l, _)| *l == label)
}

fn consistency_boost(votes: usize, config: &ExpressionConfig) -> f64 {
    if votes < config.min_votes {
        return 0.0;
    }
    let span = config.vote_window.saturating_sub(config.min_votes);
    if span == 0 {
        return config.consistency_boost_max;
    }
    let t = (votes - config.min_votes) as f64 / span as f64;
    config.consistency_boost_min + (config.consistency_boost_max - config.consistency_boost_min) * t
}

/// Stress label from the blink rate. No blink observed yet → unknown.
pub fn stress_from_blink_rate(
    blink_rate: f64,
    blinks_observed: u32,
    config: &ExpressionConfig,
) -> StressLevel {
    if blinks_observed == 0 {
        StressLevel::Unknown
    } else if blink_rate > config.high_stress_bpm {
        StressLevel::HighStress
    } else if blink_rate > config.moderate_stress_bpm {
        StressLevel::ModerateStress
    } else if blink_rate < config.drowsy_bpm {
        StressLevel::Drowsy
    } else {
        StressLevel::Normal
    }
}

/// Landmark-only emotion estimate used when the classifier is unavailable.
///
/// Lip-corner lift relative to the lip center drives happy/sad; an open
/// mouth with widened eyes reads as surprise.
pub fn heuristic_reading(landmarks: &LandmarkSet, ear: f64, mar: f64, ear_baseline: f64) -> EmotionReading {
    let corners = landmarks
        .get(face::MOUTH_RIGHT)
        .zip(landmarks.get(face::MOUTH_LEFT));
    let lips = landmarks
        .get(face::UPPER_LIP)
        .zip(landmarks.get(face::LOWER_LIP));

    let lift = match (corners, lips) {
        (Some((right, left)), Some((upper, lower))) => {
            let width = distance_2d(&right, &left);
            if width < 1e-6 {
                0.0
            } else {
                let center_y = (upper.y + lower.y) / 2.0;
                let corner_y = (right.y + left.y) / 2.0;
                (center_y - corner_y) / width
            }
        }
        _ => 0.0,
    };

    let eyes_widened = ear_baseline > 0.0 && ear > ear_baseline * 1.2;

    if mar > 0.5 && eyes_widened {
        EmotionReading::single(Emotion::Surprise, 0.55)
    } else if lift > 0.05 {
        EmotionReading::single(Emotion::Happy, (0.5 + lift * 2.0).min(0.8))
    } else if lift < -0.05 {
        EmotionReading::single(Emotion::Sad, (0.4 + (-lift) * 2.0).min(0.7))
    } else if eyes_widened && mar < 0.1 {
        EmotionReading::single(Emotion::Fear, 0.4)
    } else {
        EmotionReading::single(Emotion::Neutral, 0.6)
    }
}

/// Cut the padded face bounding box out of the frame.
///
/// Returns `None` when the image is inconsistent or the crop is smaller than
/// `min_face_size_px` on either side.
pub fn crop_face(landmarks: &LandmarkSet, image: &ImageFrame, config: &ExpressionConfig) -> Option<FaceCrop> {
    if !image.is_consistent() || landmarks.is_empty() {
        return None;
    }

    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in &landmarks.points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }

    let (w, h) = (image.width as f64, image.height as f64);
    let pad_x = (max_x - min_x) * config.crop_padding;
    let pad_y = (max_y - min_y) * config.crop_padding;
    let x0 = ((min_x - pad_x) * w).floor().clamp(0.0, w) as usize;
    let x1 = ((max_x + pad_x) * w).ceil().clamp(0.0, w) as usize;
    let y0 = ((min_y - pad_y) * h).floor().clamp(0.0, h) as usize;
    let y1 = ((max_y + pad_y) * h).ceil().clamp(0.0, h) as usize;

    let crop_w = x1.saturating_sub(x0);
    let crop_h = y1.saturating_sub(y0);
    let min = config.min_face_size_px as usize;
    if crop_w < min || crop_h < min {
        return None;
    }

    let channels = image.channels as usize;
    let stride = image.width as usize * channels;
    let mut data = Vec::with_capacity(crop_w * crop_h * channels);
    for row in y0..y1 {
        let start = row * stride + x0 * channels;
        data.extend_from_slice(&image.data[start..start + crop_w * channels]);
    }

    Some(FaceCrop {
        width: crop_w as u32,
        height: crop_h as u32,
        channels: image.channels,
        data,
    })
}

/// Per-session expression detector
pub struct ExpressionDetector {
    config: ExpressionConfig,
    classifier: Option<Box<dyn EmotionClassifier>>,
    cache: ClassifierCache,
    labels: History<(Expression, f64)>,
    ear_history: History<f64>,
    mar_history: History<f64>,
    smoothed_ear: Option<f64>,
    smoothed_mar: Option<f64>,
    blink_times: History<f64>,
    last_blink: Option<f64>,
    blink_count: u32,
    first_timestamp: Option<f64>,
}

impl Default for ExpressionDetector {
    fn default() -> Self {
        Self::new(ExpressionConfig::default())
    }
}

impl ExpressionDetector {
    pub fn new(config: ExpressionConfig) -> Self {
        // Enough room for the capped blink rate over the whole window
        let blink_capacity = (config.max_blink_rate * config.blink_window_sec / 60.0).ceil() as usize + 1;
        Self {
            cache: ClassifierCache::new(config.classifier_interval),
            labels: History::new(config.label_window),
            ear_history: History::new(config.ratio_window),
            mar_history: History::new(config.ratio_window),
            smoothed_ear: None,
            smoothed_mar: None,
            blink_times: History::new(blink_capacity.max(1)),
            last_blink: None,
            blink_count: 0,
            first_timestamp: None,
            classifier: None,
            config,
        }
    }

    /// Install the external emotion classifier
    pub fn with_classifier(mut self, classifier: Box<dyn EmotionClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn set_classifier(&mut self, classifier: Option<Box<dyn EmotionClassifier>>) {
        self.classifier = classifier;
    }

    pub fn config(&self) -> &ExpressionConfig {
        &self.config
    }

    pub fn blink_count(&self) -> u32 {
        self.blink_count
    }

    /// Mean smoothed EAR over the ratio window
    pub fn average_ear(&self) -> Option<f64> {
        self.ear_history.mean()
    }

    /// Mean smoothed MAR over the ratio window
    pub fn average_mar(&self) -> Option<f64> {
        self.mar_history.mean()
    }

    /// Analyze one frame. `timestamp` is in seconds.
    pub fn analyze(
        &mut self,
        landmarks: Option<&LandmarkSet>,
        image: Option<&ImageFrame>,
        timestamp: f64,
    ) -> ExpressionMetrics {
        self.first_timestamp.get_or_insert(timestamp);

        let Some(landmarks) = landmarks.filter(|l| l.is_usable(face::POINT_COUNT)) else {
            return self.no_face_metrics(timestamp);
        };

        let (ear_left, ear_right, raw_mar) = match measure_ratios(landmarks) {
            Some(ratios) => ratios,
            None => return self.no_face_metrics(timestamp),
        };
        let raw_ear = (ear_left + ear_right) / 2.0;

        let alpha = self.config.smoothing_alpha;
        let ear = match self.smoothed_ear {
            Some(prev) => exponential_smooth(prev, raw_ear, alpha),
            None => raw_ear,
        };
        let mar = match self.smoothed_mar {
            Some(prev) => exponential_smooth(prev, raw_mar, alpha),
            None => raw_mar,
        };
        self.smoothed_ear = Some(ear);
        self.smoothed_mar = Some(mar);
        let ear_baseline = self.ear_history.mean().unwrap_or(ear);
        self.ear_history.push(ear);
        self.mar_history.push(mar);

        let eyes_closed = ear < self.config.ear_sleepy_threshold;
        let blink_detected = eyes_closed && self.record_blink(timestamp);
        let blink_rate = self.blink_rate(timestamp);
        let stress_level = stress_from_blink_rate(blink_rate, self.blink_count, &self.config);

        let reported = if self.cache.advance() {
            let fresh = self.classify(landmarks, image, ear, mar, ear_baseline);
            self.cache.store(fresh.clone());
            fresh
        } else {
            match self.cache.cached() {
                Some(cached) => ReportedExpression {
                    source: EmotionSource::Cached,
                    ..cached.clone()
                },
                None => default_expression(),
            }
        };

        ExpressionMetrics {
            face_detected: true,
            expression: reported.expression,
            confidence: reported.confidence,
            raw_emotion: reported.raw_emotion,
            emotion_source: reported.source,
            ear_left,
            ear_right,
            ear_avg: ear,
            mar,
            eyes_closed,
            blink_detected,
            blink_count: self.blink_count,
            blink_rate,
            stress_level,
        }
    }

    fn classify(
        &mut self,
        landmarks: &LandmarkSet,
        image: Option<&ImageFrame>,
        ear: f64,
        mar: f64,
        ear_baseline: f64,
    ) -> ReportedExpression {
        let Some(crop) = image.and_then(|img| crop_face(landmarks, img, &self.config)) else {
            return default_expression();
        };

        let (reading, source) = match self.classifier.as_mut() {
            Some(classifier) => match classifier.classify(&crop) {
                Ok(reading) => (reading, EmotionSource::Classifier),
                Err(e) => {
                    debug!(error = %e, "emotion classifier failed, using landmark heuristic");
                    (
                        heuristic_reading(landmarks, ear, mar, ear_baseline),
                        EmotionSource::Heuristic,
                    )
                }
            },
            None => (
                heuristic_reading(landmarks, ear, mar, ear_baseline),
                EmotionSource::Heuristic,
            ),
        };

        let gated = gate_reading(&reading, &self.config);
        self.labels.push(gated);
        let (expression, confidence) = vote_expression(&self.labels.to_vec(), &self.config);

        ReportedExpression {
            expression,
            confidence,
            raw_emotion: Some(reading.emotion),
            source,
        }
    }

    /// Record a blink unless one was recorded within the debounce interval
    fn record_blink(&mut self, timestamp: f64) -> bool {
        if let Some(last) = self.last_blink {
            if timestamp - last < self.config.blink_debounce_sec {
                return false;
            }
        }
        self.last_blink = Some(timestamp);
        self.blink_times.push(timestamp);
        self.blink_count += 1;
        true
    }

    /// Blinks per minute over the trailing window, extrapolated when less
    /// than a full window has been observed
    fn blink_rate(&mut self, timestamp: f64) -> f64 {
        let window = self.config.blink_window_sec;
        self.blink_times.evict_while(|&t| timestamp - t > window);
        if self.blink_times.is_empty() {
            return 0.0;
        }
        let observed = timestamp - self.first_timestamp.unwrap_or(timestamp);
        let span = observed.min(window).max(1.0);
        (self.blink_times.len() as f64 / span * 60.0).min(self.config.max_blink_rate)
    }

    fn no_face_metrics(&mut self, timestamp: f64) -> ExpressionMetrics {
        let blink_rate = self.blink_rate(timestamp);
        ExpressionMetrics {
            blink_count: self.blink_count,
            blink_rate,
            stress_level: stress_from_blink_rate(blink_rate, self.blink_count, &self.config),
            ..ExpressionMetrics::default()
        }
    }

    /// Clear all per-session state, keeping the configuration and classifier
    pub fn reset(&mut self) {
        self.cache.clear();
        self.labels.clear();
        self.ear_history.clear();
        self.mar_history.clear();
        self.smoothed_ear = None;
        self.smoothed_mar = None;
        self.blink_times.clear();
        self.last_blink = None;
        self.blink_count = 0;
        self.first_timestamp = None;
    }
}

fn default_expression() -> ReportedExpression {
    ReportedExpression {
        expression: Expression::Calm,
        confidence: 0.0,
        raw_emotion: None,
        source: EmotionSource::Default,
    }
}

/// Raw left EAR, right EAR and MAR from a face mesh
fn measure_ratios(landmarks: &LandmarkSet) -> Option<(f64, f64, f64)> {
    let left: [Point; 6] = landmarks.select(&face::LEFT_EYE)?.try_into().ok()?;
    let right: [Point; 6] = landmarks.select(&face::RIGHT_EYE)?.try_into().ok()?;
    let mouth: [Point; 8] = landmarks.select(&face::MOUTH)?.try_into().ok()?;
    Some((
        eye_aspect_ratio(&left),
        eye_aspect_ratio(&right),
        mouth_aspect_ratio(&mouth),
    ))
}
