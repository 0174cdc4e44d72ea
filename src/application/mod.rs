//! Application layer: use cases composed from domain logic and ports.

pub mod evaluation;
mod inference;
mod serving;
pub mod training;

pub use evaluation::{EvaluationError, EvaluationReport};
pub use inference::{InferenceError, InferencePipeline};
pub use serving::{MetricsResponse, PredictionResponse, PredictionService, RequestCounter, ServeError};
pub use training::{TrainingError, TrainingOptions, TrainingOutcome, TrainingService};
