//! Prediction result types.

use serde::{Deserialize, Serialize};

/// Decision threshold on the positive-class probability.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Output of the classifier for one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Binary prediction (0 = no disease, 1 = disease present)
    pub label: u8,

    /// Probability of disease (0.0 to 1.0)
    pub probability: f64,

    /// Probability of the predicted label (0.5 to 1.0)
    pub confidence: f64,
}

impl PredictionResult {
    /// Threshold a positive-class probability.
    #[must_use]
    pub fn from_probability(probability: f64) -> Self {
        let label = u8::from(probability >= DECISION_THRESHOLD);
        let confidence = if label == 1 {
            probability
        } else {
            1.0 - probability
        };

        Self {
            label,
            probability,
            confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        assert_eq!(PredictionResult::from_probability(0.5).label, 1);
        assert_eq!(PredictionResult::from_probability(0.499_999).label, 0);
        assert_eq!(PredictionResult::from_probability(0.9).label, 1);
    }

    #[test]
    fn test_confidence() {
        let negative = PredictionResult::from_probability(0.2);
        assert!((negative.confidence - 0.8).abs() < 1e-12);

        let positive = PredictionResult::from_probability(0.75);
        assert!((positive.confidence - 0.75).abs() < 1e-12);
    }
}
