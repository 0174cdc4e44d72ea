//! Feature schema shared by training and serving.
//!
//! `FEATURE_ORDER` is the single source of truth for column order. The
//! preprocessor, the fitting code and the artifact loader all read it, so a
//! model can never be applied to columns in a different order than it was fit.

use serde::{Deserialize, Serialize};

/// Version of the feature layout. Bump whenever `FEATURE_ORDER` changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Number of features in a patient record.
pub const NUM_FEATURES: usize = 13;

/// Number of standardized (continuous) features at the front of the vector.
pub const NUM_CONTINUOUS: usize = 5;

/// Declared value type of a feature at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Floating point measurement.
    Float,
    /// Integer-coded category or flag.
    Integer,
}

impl FieldKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Float => "float",
            Self::Integer => "integer",
        }
    }
}

/// Clinical features of the UCI heart disease dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// Age in years
    Age,
    /// Sex (1 = male, 0 = female)
    Sex,
    /// Chest pain type
    Cp,
    /// Resting blood pressure in mmHg
    Trestbps,
    /// Serum cholesterol in mg/dl
    Chol,
    /// Fasting blood sugar > 120 mg/dl
    Fbs,
    /// Resting ECG result
    Restecg,
    /// Maximum heart rate achieved
    Thalach,
    /// Exercise induced angina
    Exang,
    /// ST depression induced by exercise relative to rest
    Oldpeak,
    /// Slope of the peak exercise ST segment
    Slope,
    /// Number of major vessels colored by fluoroscopy
    Ca,
    /// Thalassemia type
    Thal,
}

/// Column order of the model-ready vector.
///
/// The first `NUM_CONTINUOUS` entries are imputed and standardized, the rest
/// pass through unchanged.
pub const FEATURE_ORDER: [Feature; NUM_FEATURES] = [
    Feature::Age,
    Feature::Trestbps,
    Feature::Chol,
    Feature::Thalach,
    Feature::Oldpeak,
    Feature::Sex,
    Feature::Cp,
    Feature::Fbs,
    Feature::Restecg,
    Feature::Exang,
    Feature::Slope,
    Feature::Ca,
    Feature::Thal,
];

/// Features that are imputed and standardized.
pub const CONTINUOUS_FEATURES: [Feature; NUM_CONTINUOUS] = [
    Feature::Age,
    Feature::Trestbps,
    Feature::Chol,
    Feature::Thalach,
    Feature::Oldpeak,
];

impl Feature {
    /// Field name as it appears in requests and dataset headers.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Age => "age",
            Self::Sex => "sex",
            Self::Cp => "cp",
            Self::Trestbps => "trestbps",
            Self::Chol => "chol",
            Self::Fbs => "fbs",
            Self::Restecg => "restecg",
            Self::Thalach => "thalach",
            Self::Exang => "exang",
            Self::Oldpeak => "oldpeak",
            Self::Slope => "slope",
            Self::Ca => "ca",
            Self::Thal => "thal",
        }
    }

    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Age | Self::Trestbps | Self::Chol | Self::Thalach | Self::Oldpeak | Self::Ca => {
                FieldKind::Float
            }
            Self::Sex
            | Self::Cp
            | Self::Fbs
            | Self::Restecg
            | Self::Exang
            | Self::Slope
            | Self::Thal => FieldKind::Integer,
        }
    }

    /// Position of this feature in `FEATURE_ORDER`.
    #[must_use]
    pub fn column(&self) -> usize {
        FEATURE_ORDER
            .iter()
            .position(|f| f == self)
            .unwrap_or_else(|| unreachable!("every feature is listed in FEATURE_ORDER"))
    }

    /// Whether this feature is standardized by the preprocessor.
    #[must_use]
    pub fn is_continuous(&self) -> bool {
        self.column() < NUM_CONTINUOUS
    }

    /// Look a feature up by its field name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        FEATURE_ORDER.iter().copied().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Field names in `FEATURE_ORDER`, as persisted in artifacts.
#[must_use]
pub fn feature_names() -> Vec<String> {
    FEATURE_ORDER.iter().map(|f| f.name().to_string()).collect()
}
