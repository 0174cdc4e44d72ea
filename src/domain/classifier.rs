//! Logistic decision function.
//!
//! Applies trained weights only; fitting lives in the training service.

use super::params::FittedPipelineParameters;
use super::preprocess::NumericFeatureVector;
use super::prediction::PredictionResult;

/// The classifier produced an unusable score.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    #[error("decision score is not finite ({0})")]
    NonFiniteScore(f64),
}

/// Numerically stable logistic function.
#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Linear score `w · x + b`.
///
/// Each term is clamped to the finite range, so extreme inputs saturate the
/// score at +/- infinity instead of producing `inf - inf`.
#[must_use]
pub fn decision_score(vector: &NumericFeatureVector, params: &FittedPipelineParameters) -> f64 {
    let dot: f64 = params
        .weights()
        .iter()
        .zip(vector.as_slice())
        .map(|(w, x)| (w * x).clamp(-f64::MAX, f64::MAX))
        .sum();
    dot + params.bias()
}

/// Classify a transformed record.
///
/// # Errors
/// Returns `ClassifierError::NonFiniteScore` if the vector carries a NaN.
pub fn predict(
    vector: &NumericFeatureVector,
    params: &FittedPipelineParameters,
) -> Result<PredictionResult, ClassifierError> {
    let score = decision_score(vector, params);
    if score.is_nan() {
        return Err(ClassifierError::NonFiniteScore(score));
    }

    // sigmoid saturates cleanly at +/- infinity
    Ok(PredictionResult::from_probability(sigmoid(score)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::patient::PatientRecord;
    use crate::domain::preprocess::transform;

    #[test]
    fn test_sigmoid_properties() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!((sigmoid(2.0) + sigmoid(-2.0) - 1.0).abs() < 1e-15);
        assert_eq!(sigmoid(f64::INFINITY), 1.0);
        assert_eq!(sigmoid(f64::NEG_INFINITY), 0.0);
        assert!(sigmoid(-800.0) >= 0.0);
    }

    #[test]
    fn test_reference_record_baseline() {
        let params = FittedPipelineParameters::fixture();
        let vector = transform(&PatientRecord::reference(), &params);

        assert_eq!(decision_score(&vector, &params), 0.5);

        let result = predict(&vector, &params).expect("Should predict");
        assert_eq!(result.label, 1);
        assert!((result.probability - 0.622_459_331_201_854_6).abs() < 1e-12);
    }

    #[test]
    fn test_opposing_infinite_terms_saturate() {
        let params = FittedPipelineParameters::fixture();
        let mut values = [0.0; crate::domain::schema::NUM_FEATURES];
        // chol weight +2.0, oldpeak weight +0.25
        values[2] = f64::INFINITY;
        values[4] = f64::NEG_INFINITY;

        let score = decision_score(&NumericFeatureVector::from(values), &params);
        assert!(!score.is_nan());
        let result = predict(&NumericFeatureVector::from(values), &params).expect("Should predict");
        assert!((0.0..=1.0).contains(&result.probability));

        values[3] = f64::MAX;
        let result = predict(&NumericFeatureVector::from(values), &params).expect("Should predict");
        // thalach weight -3.0 dominates
        assert_eq!(result.label, 0);
    }

    #[test]
    fn test_nan_feature_is_an_error() {
        let params = FittedPipelineParameters::fixture();
        let mut values = [0.0; crate::domain::schema::NUM_FEATURES];
        values[0] = f64::NAN;

        let err = predict(&NumericFeatureVector::from(values), &params).expect_err("must fail");
        assert!(matches!(err, ClassifierError::NonFiniteScore(_)));
    }
}
