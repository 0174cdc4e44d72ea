//! Fitted pipeline parameters.
//!
//! Produced once by the offline fit, then loaded read-only by every serving
//! process. Every instance, whether built in code or deserialized, has passed
//! [`FittedPipelineParameters::check`], so consumers may index the parameter
//! vectors by `FEATURE_ORDER` position without further checks.

use serde::{Deserialize, Serialize};

use super::schema::{feature_names, Feature, NUM_CONTINUOUS, NUM_FEATURES, SCHEMA_VERSION};

/// Inconsistent or incompatible parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("schema version {found} is not supported (expected {expected})")]
    SchemaVersion { expected: u32, found: u32 },

    #[error("feature order mismatch: expected [{expected}], artifact has [{found}]")]
    ColumnOrderMismatch { expected: String, found: String },

    #[error("`{name}` has {found} entries, expected {expected}")]
    Length {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("`{name}[{index}]` is not finite")]
    NotFinite { name: &'static str, index: usize },

    #[error("`stds[{index}]` is negative")]
    NegativeStd { index: usize },
}

/// Imputation, scaling and logistic parameters for the inference pipeline.
///
/// `medians`, `means` and `stds` follow the continuous prefix of
/// `FEATURE_ORDER`; `weights` has one entry per `FEATURE_ORDER` column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ParametersRepr")]
pub struct FittedPipelineParameters {
    schema_version: u32,
    feature_order: Vec<String>,
    medians: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

/// Wire shape, checked before it becomes a `FittedPipelineParameters`.
///
/// Deserialize into this directly to keep a typed `ParameterError` instead of
/// a serde message.
#[derive(Debug, Deserialize)]
pub struct ParametersRepr {
    schema_version: u32,
    feature_order: Vec<String>,
    medians: Vec<f64>,
    means: Vec<f64>,
    stds: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
}

impl TryFrom<ParametersRepr> for FittedPipelineParameters {
    type Error = ParameterError;

    fn try_from(repr: ParametersRepr) -> Result<Self, Self::Error> {
        let params = Self {
            schema_version: repr.schema_version,
            feature_order: repr.feature_order,
            medians: repr.medians,
            means: repr.means,
            stds: repr.stds,
            weights: repr.weights,
            bias: repr.bias,
        };
        params.check()?;
        Ok(params)
    }
}

impl FittedPipelineParameters {
    /// Build parameters for the current schema.
    ///
    /// # Errors
    /// Returns error if any vector has the wrong length, a value is not
    /// finite, or a standard deviation is negative.
    pub fn new(
        medians: Vec<f64>,
        means: Vec<f64>,
        stds: Vec<f64>,
        weights: Vec<f64>,
        bias: f64,
    ) -> Result<Self, ParameterError> {
        let params = Self {
            schema_version: SCHEMA_VERSION,
            feature_order: feature_names(),
            medians,
            means,
            stds,
            weights,
            bias,
        };
        params.check()?;
        Ok(params)
    }

    /// Verify the parameters against the compiled schema.
    ///
    /// # Errors
    /// Returns the first inconsistency found.
    pub fn check(&self) -> Result<(), ParameterError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ParameterError::SchemaVersion {
                expected: SCHEMA_VERSION,
                found: self.schema_version,
            });
        }

        let expected = feature_names();
        if self.feature_order != expected {
            return Err(ParameterError::ColumnOrderMismatch {
                expected: expected.join(", "),
                found: self.feature_order.join(", "),
            });
        }

        let vectors: [(&'static str, &[f64], usize); 4] = [
            ("medians", self.medians.as_slice(), NUM_CONTINUOUS),
            ("means", self.means.as_slice(), NUM_CONTINUOUS),
            ("stds", self.stds.as_slice(), NUM_CONTINUOUS),
            ("weights", self.weights.as_slice(), NUM_FEATURES),
        ];
        for (name, values, len) in vectors {
            if values.len() != len {
                return Err(ParameterError::Length {
                    name,
                    expected: len,
                    found: values.len(),
                });
            }
            if let Some(index) = values.iter().position(|v| !v.is_finite()) {
                return Err(ParameterError::NotFinite { name, index });
            }
        }

        if !self.bias.is_finite() {
            return Err(ParameterError::NotFinite {
                name: "bias",
                index: 0,
            });
        }
        if let Some(index) = self.stds.iter().position(|s| *s < 0.0) {
            return Err(ParameterError::NegativeStd { index });
        }

        Ok(())
    }

    #[must_use]
    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    #[must_use]
    pub fn feature_order(&self) -> &[String] {
        &self.feature_order
    }

    /// Imputation values for the continuous features.
    #[must_use]
    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    #[must_use]
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    #[must_use]
    pub fn stds(&self) -> &[f64] {
        &self.stds
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[must_use]
    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Weight of one feature, looked up through `FEATURE_ORDER`.
    #[must_use]
    pub fn weight_of(&self, feature: Feature) -> f64 {
        self.weights[feature.column()]
    }
}

#[cfg(test)]
impl FittedPipelineParameters {
    /// Hand-built parameters with exactly representable intermediate values.
    ///
    /// For `PatientRecord::reference()` every continuous feature standardizes
    /// to 0 or 1 and the decision score is exactly 0.5. `thalach` has a zero
    /// standard deviation.
    pub(crate) fn fixture() -> Self {
        Self::new(
            // age, trestbps, chol, thalach, oldpeak
            vec![55.0, 130.0, 240.0, 153.0, 0.8],
            vec![54.0, 130.0, 233.0, 150.0, 0.0],
            vec![9.0, 15.0, 50.0, 0.0, 2.3],
            vec![
                0.5, 0.25, 2.0, -3.0, 0.25, // continuous
                0.5, 0.25, -0.5, 1.0, 1.0, 1.0, 1.0, -0.5, // passthrough
            ],
            -0.75,
        )
        .expect("fixture parameters are consistent")
    }
}
