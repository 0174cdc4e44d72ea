//! Record → model-ready vector.
//!
//! The continuous prefix of `FEATURE_ORDER` is imputed with the training
//! median and standardized; the remaining columns pass through unchanged.
//! Training uses the same functions, so fit and serve cannot drift apart.

use super::params::FittedPipelineParameters;
use super::patient::PatientRecord;
use super::schema::{Feature, NUM_CONTINUOUS, NUM_FEATURES};

/// Model-ready features in `FEATURE_ORDER`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericFeatureVector([f64; NUM_FEATURES]);

impl NumericFeatureVector {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.column()]
    }
}

impl From<[f64; NUM_FEATURES]> for NumericFeatureVector {
    fn from(values: [f64; NUM_FEATURES]) -> Self {
        Self(values)
    }
}

/// Standardize a single value.
///
/// A zero standard deviation maps every input to `0.0` instead of NaN or
/// infinity: the feature was constant in training and carries no signal.
/// Finite inputs always give a finite output.
#[must_use]
pub fn standardize(value: f64, mean: f64, std: f64) -> f64 {
    if std == 0.0 {
        0.0
    } else {
        ((value - mean) / std).clamp(-f64::MAX, f64::MAX)
    }
}

/// Replace a missing (NaN) value with the imputation value.
#[must_use]
pub fn impute(value: f64, median: f64) -> f64 {
    if value.is_nan() {
        median
    } else {
        value
    }
}

/// Transform a validated record.
#[must_use]
pub fn transform(record: &PatientRecord, params: &FittedPipelineParameters) -> NumericFeatureVector {
    transform_values(&record.to_values(), params)
}

/// Transform raw values given in `FEATURE_ORDER`.
///
/// NaN in a continuous column marks a missing value and is imputed.
/// Passthrough columns are copied as-is.
#[must_use]
pub fn transform_values(
    raw: &[f64; NUM_FEATURES],
    params: &FittedPipelineParameters,
) -> NumericFeatureVector {
    let mut out = *raw;
    let stats = params
        .medians()
        .iter()
        .zip(params.means())
        .zip(params.stds());

    for (slot, ((median, mean), std)) in out[..NUM_CONTINUOUS].iter_mut().zip(stats) {
        *slot = standardize(impute(*slot, *median), *mean, *std);
    }

    NumericFeatureVector(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::{CONTINUOUS_FEATURES, FEATURE_ORDER};

    #[test]
    fn test_reference_record_transform() {
        let params = FittedPipelineParameters::fixture();
        let vector = transform(&PatientRecord::reference(), &params);

        assert_eq!(vector.get(Feature::Age), 1.0);
        assert_eq!(vector.get(Feature::Trestbps), 1.0);
        assert_eq!(vector.get(Feature::Chol), 0.0);
        assert_eq!(vector.get(Feature::Thalach), 0.0);
        assert_eq!(vector.get(Feature::Oldpeak), 1.0);
        assert_eq!(vector.get(Feature::Cp), 3.0);
        assert_eq!(vector.get(Feature::Thal), 1.0);
    }

    #[test]
    fn test_zero_std_yields_exact_zero() {
        let params = FittedPipelineParameters::fixture();
        let mut record = PatientRecord::reference();
        record.thalach = 202.0;

        let value = transform(&record, &params).get(Feature::Thalach);
        assert_eq!(value, 0.0);
        assert!(value.is_finite());
        assert_eq!(standardize(1e300, -1e300, 0.0), 0.0);
    }

    #[test]
    fn test_standardize_stays_finite() {
        assert_eq!(standardize(f64::MAX, -f64::MAX, 0.5), f64::MAX);
        assert_eq!(standardize(-f64::MAX, f64::MAX, 0.5), -f64::MAX);
    }

    #[test]
    fn test_missing_continuous_values_are_imputed() {
        let params = FittedPipelineParameters::fixture();
        let mut raw = PatientRecord::reference().to_values();
        raw[Feature::Age.column()] = f64::NAN;
        raw[Feature::Chol.column()] = f64::NAN;

        let vector = transform_values(&raw, &params);
        // median 55, mean 54, std 9
        assert!((vector.get(Feature::Age) - 1.0 / 9.0).abs() < 1e-12);
        // median 240, mean 233, std 50
        assert!((vector.get(Feature::Chol) - 7.0 / 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_passthrough_columns_unchanged() {
        let params = FittedPipelineParameters::fixture();
        let record = PatientRecord::reference();
        let vector = transform(&record, &params);

        for feature in &FEATURE_ORDER[NUM_CONTINUOUS..] {
            assert_eq!(vector.get(*feature), record.value(*feature), "{feature}");
        }
    }

    #[test]
    fn test_column_order_matches_schema() {
        // Distinct values per column reveal any positional swap.
        let params = FittedPipelineParameters::new(
            vec![0.0; NUM_CONTINUOUS],
            vec![0.0; NUM_CONTINUOUS],
            vec![1.0; NUM_CONTINUOUS],
            vec![0.0; NUM_FEATURES],
            0.0,
        )
        .expect("identity scaler");

        let record = PatientRecord {
            age: 1.0,
            trestbps: 2.0,
            chol: 3.0,
            thalach: 4.0,
            oldpeak: 5.0,
            sex: 6,
            cp: 7,
            fbs: 8,
            restecg: 9,
            exang: 10,
            slope: 11,
            ca: 12.0,
            thal: 13,
        };

        let vector = transform(&record, &params);
        let expected: Vec<f64> = (1..=13).map(f64::from).collect();
        assert_eq!(vector.as_slice(), expected.as_slice());
        for (i, feature) in CONTINUOUS_FEATURES.iter().enumerate() {
            assert_eq!(feature.column(), i);
        }
    }
}
