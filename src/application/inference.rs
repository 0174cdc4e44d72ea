//! Inference pipeline: raw request body → prediction.
//!
//! Validation, preprocessing and classification always run in that order,
//! and a validation failure short-circuits before any arithmetic.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use crate::domain::{
    classifier, preprocess, ClassifierError, FittedPipelineParameters, PatientRecord,
    PredictionResult, ValidationError,
};
use crate::ports::{ArtifactError, ArtifactStore};

/// Failure while scoring a single request.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    /// The caller sent an unusable record.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The model produced an unusable score.
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Read-only composition of schema, preprocessor and classifier.
///
/// Cheap to clone; all clones share one parameter set.
#[derive(Debug, Clone)]
pub struct InferencePipeline {
    params: Arc<FittedPipelineParameters>,
}

impl InferencePipeline {
    #[must_use]
    pub fn new(params: Arc<FittedPipelineParameters>) -> Self {
        Self { params }
    }

    /// Load fitted parameters through an artifact store.
    ///
    /// # Errors
    /// Returns error if the artifact is missing, corrupt or incompatible.
    pub fn load<S: ArtifactStore + ?Sized>(store: &S, path: &Path) -> Result<Self, ArtifactError> {
        let params = store.load(path)?;
        Ok(Self::new(Arc::new(params)))
    }

    #[must_use]
    pub fn params(&self) -> &FittedPipelineParameters {
        &self.params
    }

    /// Validate, transform and classify one raw JSON body.
    ///
    /// # Errors
    /// Returns `InferenceError::Validation` naming the offending field, or
    /// `InferenceError::Classifier` if the score is unusable.
    pub fn infer(&self, raw: &Value) -> Result<PredictionResult, InferenceError> {
        let record = PatientRecord::validate(raw)?;
        Ok(self.infer_record(&record)?)
    }

    /// Transform and classify an already validated record.
    ///
    /// # Errors
    /// Returns `ClassifierError` if the score is unusable.
    pub fn infer_record(&self, record: &PatientRecord) -> Result<PredictionResult, ClassifierError> {
        let vector = preprocess::transform(record, &self.params);
        classifier::predict(&vector, &self.params)
    }
}
