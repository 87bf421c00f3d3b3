use crate::config::{MatchConfig, ThresholdMode};

/// Levenshtein distance over Unicode scalar values. Symmetric, zero on
/// identical input.
pub fn distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

/// `1 - distance / max(len_a, len_b)`; two empty strings are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    ratio_from_distance(distance(a, b), a, b)
}

/// Ratio for an already computed `distance` between `a` and `b`.
pub fn ratio_from_distance(distance: usize, a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - distance as f64 / longest as f64
}

/// Inclusive: a candidate exactly at the limit is accepted.
pub fn within_threshold(distance: usize, max_distance: f64) -> bool {
    distance as f64 <= max_distance
}

/// Acceptance policy for fuzzy candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub mode: ThresholdMode,
    pub max_distance: f64,
    pub min_similarity: f64,
}

impl Threshold {
    pub fn from_config(config: &MatchConfig) -> Self {
        Self {
            mode: config.mode,
            max_distance: config.max_distance,
            min_similarity: config.min_similarity,
        }
    }

    /// Whether `candidate`, at `distance` from `key`, is close enough.
    pub fn accepts(&self, key: &str, candidate: &str, distance: usize) -> bool {
        let by_distance = || within_threshold(distance, self.max_distance);
        let by_ratio = || ratio_from_distance(distance, key, candidate) >= self.min_similarity;
        match self.mode {
            ThresholdMode::Distance => by_distance(),
            ThresholdMode::Ratio => by_ratio(),
            ThresholdMode::Either => by_distance() || by_ratio(),
            ThresholdMode::Both => by_distance() && by_ratio(),
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self::from_config(&MatchConfig::default())
    }
}
