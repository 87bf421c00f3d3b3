//! Confidence for fuzzy triples.
//!
//! The matcher only asks for a number; anything implementing
//! [`ConfidenceScorer`] can stand in for the built-in heuristics, including
//! an adapter over an external model. The result is clamped to `[0, 1]`
//! by the caller.

use crate::config::ThresholdMode;
use crate::similarity::{ratio_from_distance, Threshold};

/// What a scorer gets to look at for one fuzzy triple.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput<'a> {
    pub anchor_key: &'a str,
    pub key_a: &'a str,
    pub key_b: &'a str,
    pub distance_a: usize,
    pub distance_b: usize,
}

pub trait ConfidenceScorer {
    fn score(&self, input: &ScoreInput<'_>) -> f64;
}

/// `1 - (dA + dB) / (2 * max_distance)`.
#[derive(Debug, Clone, Copy)]
pub struct DistanceConfidence {
    pub max_distance: f64,
}

impl ConfidenceScorer for DistanceConfidence {
    fn score(&self, input: &ScoreInput<'_>) -> f64 {
        let total = (input.distance_a + input.distance_b) as f64;
        1.0 - total / (2.0 * self.max_distance)
    }
}

/// Mean similarity ratio of both pairs, rescaled so `min_similarity` maps
/// to 0 and identical keys to 1.
#[derive(Debug, Clone, Copy)]
pub struct RatioConfidence {
    pub min_similarity: f64,
}

impl ConfidenceScorer for RatioConfidence {
    fn score(&self, input: &ScoreInput<'_>) -> f64 {
        let ratio_a = ratio_from_distance(input.distance_a, input.anchor_key, input.key_a);
        let ratio_b = ratio_from_distance(input.distance_b, input.anchor_key, input.key_b);
        let mean = (ratio_a + ratio_b) / 2.0;
        let span = 1.0 - self.min_similarity;
        if span <= 0.0 {
            return if mean >= 1.0 { 1.0 } else { 0.0 };
        }
        (mean - self.min_similarity) / span
    }
}

/// Default scorer: measures confidence with whatever the threshold accepted
/// on. `either` takes the more favourable measure, `both` the stricter one.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdConfidence {
    pub threshold: Threshold,
}

impl ConfidenceScorer for ThresholdConfidence {
    fn score(&self, input: &ScoreInput<'_>) -> f64 {
        let by_distance = DistanceConfidence {
            max_distance: self.threshold.max_distance,
        };
        let by_ratio = RatioConfidence {
            min_similarity: self.threshold.min_similarity,
        };
        match self.threshold.mode {
            ThresholdMode::Distance => by_distance.score(input),
            ThresholdMode::Ratio => by_ratio.score(input),
            ThresholdMode::Either => by_distance.score(input).max(by_ratio.score(input)),
            ThresholdMode::Both => by_distance.score(input).min(by_ratio.score(input)),
        }
    }
}

pub fn clamp_confidence(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
