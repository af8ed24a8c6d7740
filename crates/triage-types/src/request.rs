//! Per-request input: demographics, symptom codes and free text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::error::ValidationError;

/// Patient sex as captured by the intake form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Demographic code looked up in weight tables.
    pub fn code(&self) -> &'static str {
        match self {
            Sex::Male => "sex_male",
            Sex::Female => "sex_female",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "male",
            Sex::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Demographic attributes of a patient.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: u32,
    pub sex: Sex,
    pub height_cm: f64,
    pub weight_kg: f64,
}

impl Demographics {
    pub const AGE_RANGE: (u32, u32) = (10, 100);
    pub const HEIGHT_RANGE: (f64, f64) = (100.0, 250.0);
    pub const WEIGHT_RANGE: (f64, f64) = (30.0, 200.0);

    /// Every code [`Demographics::derived_codes`] can produce.
    pub const DERIVED_CODES: [&'static str; 12] = [
        "age_teens",
        "age_20s",
        "age_30s",
        "age_40s",
        "age_gte_50",
        "age_gte_60",
        "bmi_normal",
        "bmi_gte_25",
        "bmi_gte_27",
        "bmi_gte_30",
        "sex_male",
        "sex_female",
    ];

    pub fn new(age: u32, sex: Sex, height_cm: f64, weight_kg: f64) -> Self {
        Self {
            age,
            sex,
            height_cm,
            weight_kg,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let (min_age, max_age) = Self::AGE_RANGE;
        if !(min_age..=max_age).contains(&self.age) {
            return Err(ValidationError::InvalidDemographics(format!(
                "age {} outside {min_age}..={max_age}",
                self.age
            )));
        }
        let (min_h, max_h) = Self::HEIGHT_RANGE;
        if !(self.height_cm >= min_h && self.height_cm <= max_h) {
            return Err(ValidationError::InvalidDemographics(format!(
                "height {} cm outside {min_h}..={max_h}",
                self.height_cm
            )));
        }
        let (min_w, max_w) = Self::WEIGHT_RANGE;
        if !(self.weight_kg >= min_w && self.weight_kg <= max_w) {
            return Err(ValidationError::InvalidDemographics(format!(
                "weight {} kg outside {min_w}..={max_w}",
                self.weight_kg
            )));
        }
        Ok(())
    }

    /// Body-mass index rounded to one decimal.
    pub fn bmi(&self) -> f64 {
        let height_m = self.height_cm / 100.0;
        let bmi = self.weight_kg / (height_m * height_m);
        (bmi * 10.0).round() / 10.0
    }

    pub fn age_code(&self) -> &'static str {
        match self.age {
            0..=19 => "age_teens",
            20..=29 => "age_20s",
            30..=39 => "age_30s",
            40..=49 => "age_40s",
            50..=59 => "age_gte_50",
            _ => "age_gte_60",
        }
    }

    pub fn bmi_code(&self) -> &'static str {
        let bmi = self.bmi();
        if bmi >= 30.0 {
            "bmi_gte_30"
        } else if bmi >= 27.0 {
            "bmi_gte_27"
        } else if bmi >= 25.0 {
            "bmi_gte_25"
        } else {
            "bmi_normal"
        }
    }

    pub fn sex_code(&self) -> &'static str {
        self.sex.code()
    }

    /// Age bracket, BMI bracket and sex codes, in that order.
    pub fn derived_codes(&self) -> [&'static str; 3] {
        [self.age_code(), self.bmi_code(), self.sex_code()]
    }

    /// Whether `code` is reserved for demographics. Such codes are derived
    /// from the patient's attributes and never accepted as symptoms.
    pub fn is_derived_code(code: &str) -> bool {
        Self::DERIVED_CODES.contains(&code)
    }
}

/// Symptom codes plus demographics for one body part.
///
/// Codes are held in a sorted set so iteration order never depends on how
/// the caller listed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomSet {
    codes: BTreeSet<String>,
    demographics: Demographics,
}

impl SymptomSet {
    pub fn new<I, S>(codes: I, demographics: Demographics) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: codes.into_iter().map(Into::into).collect(),
            demographics,
        }
    }

    pub fn codes(&self) -> &BTreeSet<String> {
        &self.codes
    }

    pub fn demographics(&self) -> &Demographics {
        &self.demographics
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Optional free-text fields from the intake form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NaturalLanguageInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chief_complaint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pain_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl NaturalLanguageInput {
    fn labelled(&self) -> [(&'static str, Option<&str>); 5] {
        [
            ("chief complaint", self.chief_complaint.as_deref()),
            ("pain description", self.pain_description.as_deref()),
            ("history", self.history.as_deref()),
            ("goals", self.goals.as_deref()),
            ("notes", self.notes.as_deref()),
        ]
    }

    /// Non-blank fields with their labels.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        self.labelled()
            .into_iter()
            .filter_map(|(label, value)| {
                value
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| (label, v))
            })
            .collect()
    }

    pub fn has_content(&self) -> bool {
        !self.entries().is_empty()
    }

    /// One `label: value` line per non-blank field.
    pub fn to_text(&self) -> String {
        self.entries()
            .into_iter()
            .map(|(label, value)| format!("{label}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Unique identifier of one inference request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Input of one graph run: one body part of one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRequest {
    #[serde(default)]
    pub request_id: RequestId,
    pub body_part: String,
    pub symptoms: SymptomSet,
    #[serde(default)]
    pub natural_language: NaturalLanguageInput,
}

impl TriageRequest {
    pub fn new(body_part: impl Into<String>, symptoms: SymptomSet) -> Self {
        Self {
            request_id: RequestId::generate(),
            body_part: body_part.into(),
            symptoms,
            natural_language: NaturalLanguageInput::default(),
        }
    }

    pub fn with_natural_language(mut self, natural_language: NaturalLanguageInput) -> Self {
        self.natural_language = natural_language;
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }
}
