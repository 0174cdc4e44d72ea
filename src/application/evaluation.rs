//! Held-out evaluation metrics.

use serde::{Deserialize, Serialize};

use crate::domain::PredictionResult;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvaluationError {
    #[error("labels and probabilities differ in length ({labels} vs {probabilities})")]
    LengthMismatch { labels: usize, probabilities: usize },

    #[error("evaluation set is empty")]
    Empty,

    #[error("ROC-AUC is undefined when only one class is present")]
    SingleClass,
}

/// Binary classification metrics on a labeled set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub roc_auc: f64,
    /// Number of evaluated rows
    pub support: usize,
}

impl EvaluationReport {
    /// Score positive-class probabilities against true labels.
    ///
    /// Predicted labels use the serving decision threshold.
    ///
    /// # Errors
    /// Returns error if the inputs differ in length, are empty, or contain a
    /// single class.
    pub fn compute(labels: &[u8], probabilities: &[f64]) -> Result<Self, EvaluationError> {
        if labels.len() != probabilities.len() {
            return Err(EvaluationError::LengthMismatch {
                labels: labels.len(),
                probabilities: probabilities.len(),
            });
        }
        if labels.is_empty() {
            return Err(EvaluationError::Empty);
        }

        let predicted: Vec<u8> = probabilities
            .iter()
            .map(|p| PredictionResult::from_probability(*p).label)
            .collect();

        Ok(Self {
            accuracy: accuracy(labels, &predicted),
            precision: precision(labels, &predicted),
            recall: recall(labels, &predicted),
            roc_auc: roc_auc(labels, probabilities)?,
            support: labels.len(),
        })
    }

    /// Metric name/value pairs, in reporting order.
    #[must_use]
    pub fn metrics(&self) -> [(&'static str, f64); 4] {
        [
            ("accuracy", self.accuracy),
            ("precision", self.precision),
            ("recall", self.recall),
            ("roc_auc", self.roc_auc),
        ]
    }
}

fn as_f64(labels: &[u8]) -> Vec<f64> {
    labels.iter().map(|y| f64::from(*y)).collect()
}

/// Undefined ratios (zero denominators) score 0.
fn or_zero(score: f64) -> f64 {
    if score.is_finite() {
        score
    } else {
        0.0
    }
}

#[must_use]
pub fn accuracy(labels: &[u8], predicted: &[u8]) -> f64 {
    if labels.is_empty() {
        return 0.0;
    }
    or_zero(smartcore::metrics::accuracy(&labels.to_vec(), &predicted.to_vec()))
}

/// `tp / (tp + fp)`; 0 when nothing is predicted positive.
#[must_use]
pub fn precision(labels: &[u8], predicted: &[u8]) -> f64 {
    if !predicted.contains(&1) {
        return 0.0;
    }
    or_zero(smartcore::metrics::precision(&as_f64(labels), &as_f64(predicted)))
}

/// `tp / (tp + fn)`; 0 when there are no actual positives.
#[must_use]
pub fn recall(labels: &[u8], predicted: &[u8]) -> f64 {
    if !labels.contains(&1) {
        return 0.0;
    }
    or_zero(smartcore::metrics::recall(&as_f64(labels), &as_f64(predicted)))
}

/// Area under the ROC curve (Mann-Whitney statistic, tied scores share the
/// average of their ranks).
///
/// # Errors
/// Returns `EvaluationError::SingleClass` if either class is absent.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Result<f64, EvaluationError> {
    let positives = labels.iter().filter(|y| **y == 1).count();
    if positives == 0 || positives == labels.len() {
        return Err(EvaluationError::SingleClass);
    }
    Ok(smartcore::metrics::roc_auc_score(
        &as_f64(labels),
        &scores.to_vec(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roc_auc_known_value() {
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).expect("auc");
        assert!((auc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_ties_and_extremes() {
        let tied = roc_auc(&[0, 1, 0, 1], &[0.5, 0.5, 0.5, 0.5]).expect("auc");
        assert!((tied - 0.5).abs() < 1e-12);

        let perfect = roc_auc(&[0, 0, 1], &[0.1, 0.2, 0.9]).expect("auc");
        assert!((perfect - 1.0).abs() < 1e-12);

        let inverted = roc_auc(&[1, 0], &[0.1, 0.9]).expect("auc");
        assert!(inverted.abs() < 1e-12);

        assert_eq!(roc_auc(&[1, 1], &[0.2, 0.3]), Err(EvaluationError::SingleClass));
    }

    #[test]
    fn test_confusion_metrics() {
        let labels = [1, 1, 1, 0, 0, 0, 0, 1];
        let predicted = [1, 1, 0, 0, 1, 0, 0, 0];
        // tp=2 fp=1 fn=2
        assert!((accuracy(&labels, &predicted) - 5.0 / 8.0).abs() < 1e-12);
        assert!((precision(&labels, &predicted) - 2.0 / 3.0).abs() < 1e-12);
        assert!((recall(&labels, &predicted) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_policy() {
        assert_eq!(precision(&[1, 0], &[0, 0]), 0.0);
        assert_eq!(recall(&[0, 0], &[1, 0]), 0.0);
    }

    #[test]
    fn test_report_uses_decision_threshold() {
        let report =
            EvaluationReport::compute(&[0, 1, 1, 0], &[0.2, 0.5, 0.7, 0.6]).expect("report");
        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert!((report.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.recall - 1.0).abs() < 1e-12);
        assert_eq!(report.support, 4);
        assert_eq!(report.metrics()[3].0, "roc_auc");
    }

    #[test]
    fn test_report_input_errors() {
        assert_eq!(
            EvaluationReport::compute(&[], &[]),
            Err(EvaluationError::Empty)
        );
        assert!(matches!(
            EvaluationReport::compute(&[0, 1], &[0.5]),
            Err(EvaluationError::LengthMismatch { .. })
        ));
    }
}
