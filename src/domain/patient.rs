//! Patient record and boundary validation.
//!
//! Requests arrive as untyped JSON. `PatientRecord::validate` turns them into
//! a typed record or a `ValidationError` naming the offending field. Values
//! are checked for type only; physiologically implausible values pass.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::{Feature, FieldKind, FEATURE_ORDER, NUM_FEATURES};

/// Why a field failed validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationReason {
    #[error("field required")]
    Missing,

    #[error("must not be null")]
    Null,

    #[error("expected {expected}, got {found}")]
    WrongType {
        expected: &'static str,
        found: &'static str,
    },

    #[error("could not parse {value:?} as {expected}")]
    NotCoercible {
        expected: &'static str,
        value: String,
    },

    #[error("must be a finite number")]
    NotFinite,

    #[error("request body must be a JSON object")]
    NotObject,
}

impl ValidationReason {
    /// Short machine-readable tag for error payloads.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Null => "null",
            Self::WrongType { .. } => "type_error",
            Self::NotCoercible { .. } => "parse_error",
            Self::NotFinite => "not_finite",
            Self::NotObject => "not_object",
        }
    }
}

/// A field failed to validate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid field `{field}`: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: ValidationReason,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, reason: ValidationReason) -> Self {
        Self {
            field: field.into(),
            reason,
        }
    }
}

/// Clinical measurements for one patient.
///
/// Field names match the UCI heart disease dataset columns.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    /// Age in years
    pub age: f64,
    /// Sex (1 = male, 0 = female)
    pub sex: i64,
    /// Chest pain type
    pub cp: i64,
    /// Resting blood pressure (mmHg)
    pub trestbps: f64,
    /// Serum cholesterol (mg/dl)
    pub chol: f64,
    /// Fasting blood sugar > 120 mg/dl
    pub fbs: i64,
    /// Resting ECG result
    pub restecg: i64,
    /// Maximum heart rate achieved
    pub thalach: f64,
    /// Exercise induced angina
    pub exang: i64,
    /// ST depression induced by exercise
    pub oldpeak: f64,
    /// Slope of the peak exercise ST segment
    pub slope: i64,
    /// Number of major vessels (0-3)
    pub ca: f64,
    /// Thalassemia type
    pub thal: i64,
}

impl PatientRecord {
    /// Validate an untyped request body.
    ///
    /// # Errors
    /// Returns the first field, in `FEATURE_ORDER`, that is missing, null or
    /// cannot be coerced to its declared type. A non-object body is reported
    /// against the pseudo-field `body`.
    pub fn validate(raw: &Value) -> Result<Self, ValidationError> {
        match raw {
            Value::Object(map) => Self::from_map(map),
            _ => Err(ValidationError::new("body", ValidationReason::NotObject)),
        }
    }

    /// Validate a JSON object. Unknown keys are ignored.
    ///
    /// # Errors
    /// See [`PatientRecord::validate`].
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, ValidationError> {
        let mut floats = [0.0_f64; NUM_FEATURES];
        let mut ints = [0_i64; NUM_FEATURES];

        for (i, feature) in FEATURE_ORDER.iter().enumerate() {
            let name = feature.name();
            let value = map
                .get(name)
                .ok_or_else(|| ValidationError::new(name, ValidationReason::Missing))?;
            match feature.kind() {
                FieldKind::Float => {
                    floats[i] = coerce_float(value).map_err(|r| ValidationError::new(name, r))?;
                }
                FieldKind::Integer => {
                    ints[i] = coerce_int(value).map_err(|r| ValidationError::new(name, r))?;
                }
            }
        }

        let float = |f: Feature| floats[f.column()];
        let int = |f: Feature| ints[f.column()];

        Ok(Self {
            age: float(Feature::Age),
            sex: int(Feature::Sex),
            cp: int(Feature::Cp),
            trestbps: float(Feature::Trestbps),
            chol: float(Feature::Chol),
            fbs: int(Feature::Fbs),
            restecg: int(Feature::Restecg),
            thalach: float(Feature::Thalach),
            exang: int(Feature::Exang),
            oldpeak: float(Feature::Oldpeak),
            slope: int(Feature::Slope),
            ca: float(Feature::Ca),
            thal: int(Feature::Thal),
        })
    }

    /// Value of a single feature, widened to `f64`.
    #[must_use]
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Age => self.age,
            Feature::Sex => self.sex as f64,
            Feature::Cp => self.cp as f64,
            Feature::Trestbps => self.trestbps,
            Feature::Chol => self.chol,
            Feature::Fbs => self.fbs as f64,
            Feature::Restecg => self.restecg as f64,
            Feature::Thalach => self.thalach,
            Feature::Exang => self.exang as f64,
            Feature::Oldpeak => self.oldpeak,
            Feature::Slope => self.slope as f64,
            Feature::Ca => self.ca,
            Feature::Thal => self.thal as f64,
        }
    }

    /// Raw values in `FEATURE_ORDER`.
    #[must_use]
    pub fn to_values(&self) -> [f64; NUM_FEATURES] {
        FEATURE_ORDER.map(|f| self.value(f))
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn coerce_float(value: &Value) -> Result<f64, ValidationReason> {
    let expected = FieldKind::Float.as_str();
    let parsed = match value {
        Value::Null => return Err(ValidationReason::Null),
        Value::Number(n) => n.as_f64().ok_or_else(|| ValidationReason::NotCoercible {
            expected,
            value: n.to_string(),
        })?,
        Value::String(s) => {
            s.trim()
                .parse::<f64>()
                .map_err(|_| ValidationReason::NotCoercible {
                    expected,
                    value: s.clone(),
                })?
        }
        other => {
            return Err(ValidationReason::WrongType {
                expected,
                found: json_type_name(other),
            })
        }
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ValidationReason::NotFinite)
    }
}

/// Largest magnitude at which every integer is exactly representable in f64.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

fn whole_float_to_int(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT).then_some(f as i64)
}

fn coerce_int(value: &Value) -> Result<i64, ValidationReason> {
    let expected = FieldKind::Integer.as_str();
    match value {
        Value::Null => Err(ValidationReason::Null),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(whole_float_to_int))
            .ok_or_else(|| ValidationReason::NotCoercible {
                expected,
                value: n.to_string(),
            }),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(whole_float_to_int))
                .ok_or_else(|| ValidationReason::NotCoercible {
                    expected,
                    value: s.clone(),
                })
        }
        other => Err(ValidationReason::WrongType {
            expected,
            found: json_type_name(other),
        }),
    }
}

#[cfg(test)]
impl PatientRecord {
    /// Cleveland dataset row 1.
    pub(crate) fn reference() -> Self {
        Self {
            age: 63.0,
            sex: 1,
            cp: 3,
            trestbps: 145.0,
            chol: 233.0,
            fbs: 1,
            restecg: 0,
            thalach: 150.0,
            exang: 0,
            oldpeak: 2.3,
            slope: 0,
            ca: 0.0,
            thal: 1,
        }
    }

    pub(crate) fn reference_json() -> Value {
        serde_json::json!({
            "age": 63, "sex": 1, "cp": 3, "trestbps": 145, "chol": 233, "fbs": 1,
            "restecg": 0, "thalach": 150, "exang": 0, "oldpeak": 2.3, "slope": 0,
            "ca": 0, "thal": 1
        })
    }
}
