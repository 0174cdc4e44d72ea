//! Prediction service shared by every connection of the HTTP server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::inference::{InferenceError, InferencePipeline};
use crate::domain::ValidationError;

/// Process-wide count of prediction requests.
///
/// Every call to `increment` is counted exactly once, regardless of how many
/// workers race on it. Starts at zero and is never persisted.
#[derive(Debug, Default)]
pub struct RequestCounter(AtomicU64);

impl RequestCounter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request and return the new total.
    pub fn increment(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }

    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Body of a successful `POST /predict`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub heart_disease_prediction: u8,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<f64>,
}

/// Body of `GET /metrics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub total_prediction_requests: u64,
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Details are logged server-side, never returned to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<InferenceError> for ServeError {
    fn from(err: InferenceError) -> Self {
        match err {
            InferenceError::Validation(e) => Self::Validation(e),
            InferenceError::Classifier(e) => Self::Internal(e.to_string()),
        }
    }
}

/// Counts, scores and logs prediction requests.
#[derive(Debug, Clone)]
pub struct PredictionService {
    pipeline: InferencePipeline,
    counter: Arc<RequestCounter>,
    include_probability: bool,
}

impl PredictionService {
    #[must_use]
    pub fn new(pipeline: InferencePipeline) -> Self {
        Self {
            pipeline,
            counter: Arc::new(RequestCounter::new()),
            include_probability: false,
        }
    }

    /// Also return the positive-class probability in responses.
    #[must_use]
    pub fn with_probability(mut self, include: bool) -> Self {
        self.include_probability = include;
        self
    }

    #[must_use]
    pub fn counter(&self) -> &Arc<RequestCounter> {
        &self.counter
    }

    /// Handle one prediction request.
    ///
    /// The request is counted before validation, so rejected bodies are
    /// counted too.
    ///
    /// # Errors
    /// Returns `ServeError::Validation` for a bad record and
    /// `ServeError::Internal` if scoring fails.
    pub fn predict(&self, raw: &Value) -> Result<PredictionResponse, ServeError> {
        let request_id = self.counter.increment();
        tracing::debug!(request_id, input = %raw, "Received prediction request");

        let result = match self.pipeline.infer(raw) {
            Ok(result) => result,
            Err(InferenceError::Validation(e)) => {
                tracing::info!(request_id, field = %e.field, reason = e.reason.kind(), "Rejected prediction request");
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!(request_id, error = %e, "Prediction failed");
                return Err(e.into());
            }
        };

        tracing::info!(
            request_id,
            prediction = result.label,
            probability = result.probability,
            "Prediction complete"
        );

        Ok(PredictionResponse {
            heart_disease_prediction: result.label,
            probability: self.include_probability.then_some(result.probability),
        })
    }

    /// Snapshot of the request counter. Does not count itself.
    #[must_use]
    pub fn metrics(&self) -> MetricsResponse {
        MetricsResponse {
            total_prediction_requests: self.counter.get(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FittedPipelineParameters, PatientRecord};

    fn service() -> PredictionService {
        PredictionService::new(InferencePipeline::new(Arc::new(
            FittedPipelineParameters::fixture(),
        )))
    }

    #[test]
    fn test_predict_reference_record() {
        let response = service()
            .predict(&PatientRecord::reference_json())
            .expect("Should predict");
        assert_eq!(response.heart_disease_prediction, 1);
        assert_eq!(response.probability, None);

        let json = serde_json::to_value(response).expect("Should serialize");
        assert_eq!(json, serde_json::json!({ "heart_disease_prediction": 1 }));
    }

    #[test]
    fn test_optional_probability() {
        let response = service()
            .with_probability(true)
            .predict(&PatientRecord::reference_json())
            .expect("Should predict");
        let p = response.probability.expect("Should include probability");
        assert!((p - 0.622_459_331_201_854_6).abs() < 1e-12);
    }

    #[test]
    fn test_counter_counts_every_predict_call() {
        let service = service();
        assert_eq!(service.metrics().total_prediction_requests, 0);

        service
            .predict(&PatientRecord::reference_json())
            .expect("Should predict");
        assert_eq!(service.metrics().total_prediction_requests, 1);

        // Rejected requests count too.
        let err = service
            .predict(&serde_json::json!({ "age": 63 }))
            .expect_err("Should reject");
        assert!(matches!(err, ServeError::Validation(_)));
        assert_eq!(service.metrics().total_prediction_requests, 2);
    }

    #[test]
    fn test_metrics_does_not_count_itself() {
        let service = service();
        service
            .predict(&PatientRecord::reference_json())
            .expect("Should predict");
        for _ in 0..5 {
            assert_eq!(service.metrics().total_prediction_requests, 1);
        }
    }

    #[test]
    fn test_concurrent_requests_are_all_counted() {
        let service = service();
        let threads = 8;
        let per_thread = 250;

        std::thread::scope(|s| {
            for _ in 0..threads {
                s.spawn(|| {
                    for _ in 0..per_thread {
                        service
                            .predict(&PatientRecord::reference_json())
                            .expect("Should predict");
                    }
                });
            }
        });

        assert_eq!(
            service.metrics().total_prediction_requests,
            (threads * per_thread) as u64
        );
    }

    #[test]
    fn test_concurrent_requests_do_not_interfere() {
        let service = service().with_probability(true);
        let healthy = {
            let mut record = PatientRecord::reference();
            record.age = 40.0;
            record.oldpeak = 0.0;
            record.cp = 0;
            serde_json::to_value(record).expect("Should serialize")
        };
        let expected_healthy = service.predict(&healthy).expect("Should predict");
        let reference = PatientRecord::reference_json();
        let expected_reference = service.predict(&reference).expect("Should predict");
        assert_ne!(expected_healthy, expected_reference);

        std::thread::scope(|s| {
            for i in 0..8 {
                let service = &service;
                let (body, expected) = if i % 2 == 0 {
                    (&healthy, expected_healthy)
                } else {
                    (&reference, expected_reference)
                };
                s.spawn(move || {
                    for _ in 0..100 {
                        assert_eq!(service.predict(body).expect("Should predict"), expected);
                    }
                });
            }
        });
    }

    #[test]
    fn test_shared_counter_across_clones() {
        let service = service();
        let clone = service.clone();
        clone
            .predict(&PatientRecord::reference_json())
            .expect("Should predict");
        assert_eq!(service.metrics().total_prediction_requests, 1);
    }
}
