//! Labeled training data.

use super::schema::{Feature, FEATURE_ORDER, NUM_FEATURES};

/// One training row. Values follow `FEATURE_ORDER`; `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRow {
    pub values: [Option<f64>; NUM_FEATURES],
    pub label: u8,
}

impl LabeledRow {
    /// First passthrough feature with a missing value, if any.
    ///
    /// Only continuous features can be imputed.
    #[must_use]
    pub fn missing_passthrough(&self) -> Option<Feature> {
        FEATURE_ORDER
            .iter()
            .zip(&self.values)
            .find(|(feature, value)| !feature.is_continuous() && value.is_none())
            .map(|(feature, _)| *feature)
    }

    /// Raw values with missing cells encoded as NaN, ready for `transform_values`.
    #[must_use]
    pub fn raw_values(&self) -> [f64; NUM_FEATURES] {
        self.values.map(|v| v.unwrap_or(f64::NAN))
    }
}

/// Binary-labeled table of patient records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LabeledDataset {
    rows: Vec<LabeledRow>,
}

impl LabeledDataset {
    #[must_use]
    pub fn new(rows: Vec<LabeledRow>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: LabeledRow) {
        self.rows.push(row);
    }

    #[must_use]
    pub fn rows(&self) -> &[LabeledRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// (negatives, positives)
    #[must_use]
    pub fn class_counts(&self) -> (usize, usize) {
        let positives = self.rows.iter().filter(|r| r.label == 1).count();
        (self.rows.len() - positives, positives)
    }
}

/// Collapse a raw diagnosis code to a binary label.
///
/// The source dataset grades disease 0-4; any grade above zero is presence.
#[must_use]
pub fn binarize_label(raw: f64) -> Option<u8> {
    if !raw.is_finite() || raw < 0.0 {
        None
    } else {
        Some(u8::from(raw > 0.0))
    }
}
