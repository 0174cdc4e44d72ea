//! Domain layer: Core types and the pure inference math.
//!
//! Nothing here performs I/O. The schema, preprocessor and classifier are
//! shared verbatim by the training and serving paths.

pub mod classifier;
pub mod dataset;
mod params;
mod patient;
pub mod preprocess;
mod prediction;
pub mod schema;

pub use classifier::ClassifierError;
pub use dataset::{LabeledDataset, LabeledRow};
pub use params::{FittedPipelineParameters, ParameterError, ParametersRepr};
pub use patient::{PatientRecord, ValidationError, ValidationReason};
pub use prediction::{PredictionResult, DECISION_THRESHOLD};
pub use preprocess::NumericFeatureVector;
pub use schema::{Feature, FEATURE_ORDER, SCHEMA_VERSION};
