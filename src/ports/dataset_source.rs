//! Dataset source port: labeled training data.

use crate::domain::LabeledDataset;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("dataset is malformed: {0}")]
    Malformed(String),

    #[error("dataset is missing column `{0}`")]
    MissingColumn(String),

    #[error("row {row}: invalid value {value:?} in column `{column}`")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("row {row}: invalid label {value:?}")]
    InvalidLabel { row: usize, value: String },
}

/// Trait for loading a labeled dataset.
pub trait DatasetSource {
    /// Load every labeled row.
    ///
    /// # Errors
    /// Returns error if the source cannot be read or a label is unusable.
    fn load(&self) -> Result<LabeledDataset, DatasetError>;
}
