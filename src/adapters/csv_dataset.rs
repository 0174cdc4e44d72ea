//! CSV adapter: Implementation of DatasetSource.
//!
//! Expects a header row naming the 13 feature columns (any order, extra
//! columns ignored) plus a label column. Empty cells and `?` are missing
//! values, as in the UCI export.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::domain::dataset::binarize_label;
use crate::domain::schema::{Feature, FEATURE_ORDER, NUM_FEATURES};
use crate::domain::{LabeledDataset, LabeledRow};
use crate::ports::{DatasetError, DatasetSource};

/// Default name of the label column.
pub const DEFAULT_LABEL_COLUMN: &str = "target";

const MISSING_MARKERS: [&str; 3] = ["", "?", "NA"];

/// Reads a labeled dataset from a CSV file.
#[derive(Debug, Clone)]
pub struct CsvDatasetSource {
    path: PathBuf,
    label_column: String,
}

impl CsvDatasetSource {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            label_column: DEFAULT_LABEL_COLUMN.to_string(),
        }
    }

    #[must_use]
    pub fn with_label_column(mut self, label_column: impl Into<String>) -> Self {
        self.label_column = label_column.into();
        self
    }

    fn parse_cell(row: usize, column: &str, raw: &str) -> Result<Option<f64>, DatasetError> {
        if MISSING_MARKERS.contains(&raw) {
            return Ok(None);
        }
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| DatasetError::InvalidValue {
                row,
                column: column.to_string(),
                value: raw.to_string(),
            })
    }
}

impl DatasetSource for CsvDatasetSource {
    fn load(&self) -> Result<LabeledDataset, DatasetError> {
        let file = File::open(&self.path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| DatasetError::Malformed(e.to_string()))?
            .clone();
        let column_index = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
        };

        let mut feature_columns = [0usize; NUM_FEATURES];
        for (slot, feature) in feature_columns.iter_mut().zip(FEATURE_ORDER) {
            *slot = column_index(feature.name())?;
        }
        let label_column = column_index(&self.label_column)?;
        for (i, name) in headers.iter().enumerate() {
            if i != label_column && Feature::from_name(name).is_none() {
                tracing::debug!(column = name, "Ignoring non-feature column");
            }
        }

        let mut dataset = LabeledDataset::default();
        for (i, record) in reader.records().enumerate() {
            let row = i + 1;
            let record = record.map_err(|e| DatasetError::Malformed(e.to_string()))?;

            let mut values = [None; NUM_FEATURES];
            for ((value, feature), column) in
                values.iter_mut().zip(FEATURE_ORDER).zip(feature_columns)
            {
                let raw = record.get(column).unwrap_or("");
                *value = Self::parse_cell(row, feature.name(), raw)?;
            }

            let raw_label = record.get(label_column).unwrap_or("");
            let label = raw_label
                .parse::<f64>()
                .ok()
                .and_then(binarize_label)
                .ok_or_else(|| DatasetError::InvalidLabel {
                    row,
                    value: raw_label.to_string(),
                })?;

            dataset.push(LabeledRow { values, label });
        }

        let (negatives, positives) = dataset.class_counts();
        tracing::info!(
            "Loaded {} rows from {:?} ({} negative, {} positive)",
            dataset.len(),
            self.path,
            negatives,
            positives
        );

        Ok(dataset)
    }
}
