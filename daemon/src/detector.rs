//! Shake detection engine

use crate::collector::{SubjectId, SubjectSample};
use crate::config::Thresholds;
use crate::history::{History, Position};
use nalgebra::distance;
use tracing::debug;

/// Geometry of one window of positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShakeMetrics {
    /// Length of the polyline through every sample.
    pub total_travel: f64,
    /// Straight-line distance from the first sample to the last.
    pub net_displacement: f64,
}

impl ShakeMetrics {
    /// Returns `None` for fewer than two points.
    pub fn measure<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Position>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut prev = first;
        let mut total_travel = 0.0;
        let mut count = 1;
        for p in iter {
            total_travel += distance(prev, p);
            prev = p;
            count += 1;
        }
        if count < 2 {
            return None;
        }
        Some(Self {
            total_travel,
            net_displacement: distance(first, prev),
        })
    }

    /// Long path, short net displacement: shaking in place rather than dragging.
    pub fn is_shake(&self, thresholds: &Thresholds) -> bool {
        self.total_travel > thresholds.shake_threshold
            && self.net_displacement < thresholds.range_limit
    }
}

/// Classifies complete windows of `window` samples.
#[derive(Debug, Clone, Copy)]
pub struct ShakeClassifier {
    window: usize,
}

impl ShakeClassifier {
    pub fn new(window: usize) -> Self {
        Self { window: window.max(2) }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Metrics for a complete window; partial windows yield `None`.
    pub fn evaluate(&self, points: &[Position]) -> Option<ShakeMetrics> {
        if points.len() < self.window {
            return None;
        }
        ShakeMetrics::measure(points)
    }

    pub fn classify(&self, points: &[Position], thresholds: &Thresholds) -> bool {
        self.evaluate(points)
            .is_some_and(|metrics| metrics.is_shake(thresholds))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShakeDetected {
    pub subject: SubjectId,
    pub metrics: ShakeMetrics,
}

pub trait Detector: Send {
    fn check(&mut self, sample: &SubjectSample, thresholds: &Thresholds) -> Option<ShakeDetected>;
}

/// Keeps the recent trajectory of one subject and flags shakes.
#[derive(Debug, Clone)]
pub struct MotionTracker {
    history: History,
    classifier: ShakeClassifier,
    subject: Option<SubjectId>,
    min_movement: f64,
}

impl MotionTracker {
    pub fn new(history_len: usize, min_movement: f64) -> Self {
        let classifier = ShakeClassifier::new(history_len);
        Self {
            history: History::new(classifier.window()),
            classifier,
            subject: None,
            min_movement,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn subject(&self) -> Option<&SubjectId> {
        self.subject.as_ref()
    }

    /// Records a sample. Returns whether it was kept.
    pub fn record(&mut self, sample: &SubjectSample) -> bool {
        if self.subject.as_ref() != Some(&sample.id) {
            if let Some(prev) = &self.subject {
                debug!("Tracking switched from {} to {}", prev, sample.id);
            }
            self.history.clear();
            self.subject = Some(sample.id.clone());
        }

        if let Some(last) = self.history.last() {
            if distance(last, &sample.position) < self.min_movement {
                return false;
            }
        }

        self.history.push(sample.position);
        true
    }
}

impl Detector for MotionTracker {
    fn check(&mut self, sample: &SubjectSample, thresholds: &Thresholds) -> Option<ShakeDetected> {
        if !self.record(sample) || !self.history.is_full() {
            return None;
        }

        let metrics = self.classifier.evaluate(&self.history.to_vec())?;
        debug!(
            subject = %sample.id,
            total_travel = metrics.total_travel,
            net_displacement = metrics.net_displacement,
            "Window complete"
        );
        if !metrics.is_shake(thresholds) {
            return None;
        }

        // Start over so the same gesture cannot fire twice
        self.history.clear();
        Some(ShakeDetected {
            subject: sample.id.clone(),
            metrics,
        })
    }
}
