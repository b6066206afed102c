//! Core data models for the drug classifier
//!
//! The feature vector is order-sensitive: the estimator was trained on
//! `(age, sex, blood_pressure, cholesterol, na_to_k_ratio)` and receives the
//! columns in exactly that order.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of columns in a feature vector
pub const NUM_FEATURES: usize = 5;

/// Patient sex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

/// Blood pressure level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BloodPressure {
    High,
    Low,
    Normal,
}

/// Cholesterol level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Cholesterol {
    High,
    Normal,
}

impl Sex {
    pub const CHOICES: &'static [&'static str] = &["M", "F"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
        }
    }

    /// Ordinal code, categories sorted alphabetically (F, M)
    pub fn ordinal(&self) -> f32 {
        match self {
            Sex::Female => 0.0,
            Sex::Male => 1.0,
        }
    }
}

impl BloodPressure {
    pub const CHOICES: &'static [&'static str] = &["HIGH", "LOW", "NORMAL"];

    pub fn as_str(&self) -> &'static str {
        match self {
            BloodPressure::High => "HIGH",
            BloodPressure::Low => "LOW",
            BloodPressure::Normal => "NORMAL",
        }
    }

    pub fn ordinal(&self) -> f32 {
        match self {
            BloodPressure::High => 0.0,
            BloodPressure::Low => 1.0,
            BloodPressure::Normal => 2.0,
        }
    }
}

impl Cholesterol {
    pub const CHOICES: &'static [&'static str] = &["HIGH", "NORMAL"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cholesterol::High => "HIGH",
            Cholesterol::Normal => "NORMAL",
        }
    }

    pub fn ordinal(&self) -> f32 {
        match self {
            Cholesterol::High => 0.0,
            Cholesterol::Normal => 1.0,
        }
    }
}

impl FromStr for Sex {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" => Ok(Sex::Male),
            "F" => Ok(Sex::Female),
            other => Err(InputError::invalid_choice("sex", other, Self::CHOICES)),
        }
    }
}

impl FromStr for BloodPressure {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "HIGH" => Ok(BloodPressure::High),
            "LOW" => Ok(BloodPressure::Low),
            "NORMAL" => Ok(BloodPressure::Normal),
            other => Err(InputError::invalid_choice(
                "blood_pressure",
                other,
                Self::CHOICES,
            )),
        }
    }
}

impl FromStr for Cholesterol {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "HIGH" => Ok(Cholesterol::High),
            "NORMAL" => Ok(Cholesterol::Normal),
            other => Err(InputError::invalid_choice(
                "cholesterol",
                other,
                Self::CHOICES,
            )),
        }
    }
}

/// Feature vector for ML inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub age: i64,
    pub sex: Sex,
    pub blood_pressure: BloodPressure,
    pub cholesterol: Cholesterol,
    pub na_to_k_ratio: f64,
}

impl FeatureVector {
    pub fn new(
        age: i64,
        sex: Sex,
        blood_pressure: BloodPressure,
        cholesterol: Cholesterol,
        na_to_k_ratio: f64,
    ) -> Self {
        Self {
            age,
            sex,
            blood_pressure,
            cholesterol,
            na_to_k_ratio,
        }
    }

    /// Numeric encoding in training column order
    pub fn to_encoded(&self) -> [f32; NUM_FEATURES] {
        [
            self.age as f32,
            self.sex.ordinal(),
            self.blood_pressure.ordinal(),
            self.cholesterol.ordinal(),
            self.na_to_k_ratio as f32,
        ]
    }
}

impl fmt::Display for FeatureVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}, {}]",
            self.age,
            self.sex.as_str(),
            self.blood_pressure.as_str(),
            self.cholesterol.as_str(),
            self.na_to_k_ratio
        )
    }
}

/// Predicted drug category. Values are whatever the estimator emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single submitted field: HTML forms send text, JSON clients may send numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    fn as_text(&self) -> String {
        match self {
            FieldValue::Number(n) => n.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }

    fn as_f64(&self, field: &'static str) -> Result<f64, InputError> {
        let value = match self {
            FieldValue::Number(n) => *n,
            FieldValue::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| InputError::not_numeric(field, s))?,
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(InputError::not_numeric(field, &value.to_string()))
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

/// Raw values as submitted by the UI, before any conversion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInput {
    #[serde(default)]
    pub age: Option<FieldValue>,
    #[serde(default)]
    pub sex: Option<FieldValue>,
    #[serde(default)]
    pub blood_pressure: Option<FieldValue>,
    #[serde(default)]
    pub cholesterol: Option<FieldValue>,
    #[serde(default)]
    pub na_to_k_ratio: Option<FieldValue>,
}

impl PatientInput {
    pub fn new(
        age: impl Into<FieldValue>,
        sex: &str,
        blood_pressure: &str,
        cholesterol: &str,
        na_to_k_ratio: impl Into<FieldValue>,
    ) -> Self {
        Self {
            age: Some(age.into()),
            sex: Some(sex.into()),
            blood_pressure: Some(blood_pressure.into()),
            cholesterol: Some(cholesterol.into()),
            na_to_k_ratio: Some(na_to_k_ratio.into()),
        }
    }

    /// Text rendering of a field for echoing back into the form
    pub fn field_text(&self, name: &str) -> Option<String> {
        let field = match name {
            "age" => &self.age,
            "sex" => &self.sex,
            "blood_pressure" => &self.blood_pressure,
            "cholesterol" => &self.cholesterol,
            "na_to_k_ratio" => &self.na_to_k_ratio,
            _ => return None,
        };
        field.as_ref().map(FieldValue::as_text)
    }
}

impl TryFrom<&PatientInput> for FeatureVector {
    type Error = InputError;

    fn try_from(input: &PatientInput) -> Result<Self, Self::Error> {
        let age = required(&input.age, "age")?.as_f64("age")?;
        if age.fract() != 0.0 {
            return Err(InputError::not_integer("age", age));
        }

        Ok(FeatureVector {
            age: age as i64,
            sex: required(&input.sex, "sex")?.as_text().parse()?,
            blood_pressure: required(&input.blood_pressure, "blood_pressure")?
                .as_text()
                .parse()?,
            cholesterol: required(&input.cholesterol, "cholesterol")?
                .as_text()
                .parse()?,
            na_to_k_ratio: required(&input.na_to_k_ratio, "na_to_k_ratio")?
                .as_f64("na_to_k_ratio")?,
        })
    }
}

fn required<'a>(
    value: &'a Option<FieldValue>,
    field: &'static str,
) -> Result<&'a FieldValue, InputError> {
    match value {
        Some(FieldValue::Text(s)) if s.trim().is_empty() => Err(InputError::Missing(field)),
        Some(v) => Ok(v),
        None => Err(InputError::Missing(field)),
    }
}
