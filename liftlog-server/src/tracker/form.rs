use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use liftlog_core::NewSession;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Exercise,
    Weight,
    Reps,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Exercise => "exercise",
            FormField::Weight => "weight",
            FormField::Reps => "reps",
        }
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exercise" => Ok(FormField::Exercise),
            "weight" => Ok(FormField::Weight),
            "reps" => Ok(FormField::Reps),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(FormField),

    #[error("{0} must be a number")]
    NotNumeric(FormField),
}

/// Raw text as typed by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFields {
    pub exercise: String,
    pub weight: String,
    pub reps: String,
}

/// Form input that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEntry {
    pub exercise: String,
    pub weight: f64,
    pub reps: i32,
}

impl ValidatedEntry {
    pub fn into_new_session(self, user_id: String, date: DateTime<Utc>) -> NewSession {
        NewSession {
            user_id,
            exercise: self.exercise,
            weight: self.weight,
            reps: self.reps,
            date,
        }
    }
}

/// Pending input for a new session, independent of the session cache.
#[derive(Debug, Clone, Default)]
pub struct SessionFormController {
    fields: FormFields,
}

impl SessionFormController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> &FormFields {
        &self.fields
    }

    pub fn update(&mut self, field: FormField, value: impl Into<String>) {
        let value = value.into();
        match field {
            FormField::Exercise => self.fields.exercise = value,
            FormField::Weight => self.fields.weight = value,
            FormField::Reps => self.fields.reps = value,
        }
    }

    /// Every field has non-blank text. Says nothing about numeric validity.
    pub fn is_complete(&self) -> bool {
        !self.fields.exercise.trim().is_empty()
            && !self.fields.weight.trim().is_empty()
            && !self.fields.reps.trim().is_empty()
    }

    /// Missing fields are reported before non-numeric ones, in field order.
    pub fn validate(&self) -> Result<ValidatedEntry, ValidationError> {
        let exercise = self.fields.exercise.trim();
        let weight = self.fields.weight.trim();
        let reps = self.fields.reps.trim();

        if exercise.is_empty() {
            return Err(ValidationError::MissingField(FormField::Exercise));
        }
        if weight.is_empty() {
            return Err(ValidationError::MissingField(FormField::Weight));
        }
        if reps.is_empty() {
            return Err(ValidationError::MissingField(FormField::Reps));
        }

        let weight = weight
            .parse::<f64>()
            .ok()
            .filter(|w| w.is_finite())
            .ok_or(ValidationError::NotNumeric(FormField::Weight))?;
        let reps = reps
            .parse::<i32>()
            .map_err(|_| ValidationError::NotNumeric(FormField::Reps))?;

        Ok(ValidatedEntry {
            exercise: exercise.to_string(),
            weight,
            reps,
        })
    }

    pub fn clear(&mut self) {
        self.fields = FormFields::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(exercise: &str, weight: &str, reps: &str) -> SessionFormController {
        let mut form = SessionFormController::new();
        form.update(FormField::Exercise, exercise);
        form.update(FormField::Weight, weight);
        form.update(FormField::Reps, reps);
        form
    }

    #[test]
    fn test_valid_input_is_parsed() {
        let entry = form(" Squat ", "102.5", "5").validate().unwrap();
        assert_eq!(
            entry,
            ValidatedEntry {
                exercise: "Squat".to_string(),
                weight: 102.5,
                reps: 5,
            }
        );
    }

    #[test]
    fn test_missing_fields_are_reported_in_order() {
        assert_eq!(
            form("", "50", "5").validate(),
            Err(ValidationError::MissingField(FormField::Exercise))
        );
        assert_eq!(
            form("Squat", "  ", "abc").validate(),
            Err(ValidationError::MissingField(FormField::Weight))
        );
        assert_eq!(
            form("Squat", "50", "").validate(),
            Err(ValidationError::MissingField(FormField::Reps))
        );
    }

    #[test]
    fn test_non_numeric_values_are_rejected() {
        assert_eq!(
            form("Squat", "heavy", "5").validate(),
            Err(ValidationError::NotNumeric(FormField::Weight))
        );
        assert_eq!(
            form("Squat", "NaN", "5").validate(),
            Err(ValidationError::NotNumeric(FormField::Weight))
        );
        assert_eq!(
            form("Squat", "50", "5.5").validate(),
            Err(ValidationError::NotNumeric(FormField::Reps))
        );
    }

    #[test]
    fn test_clear_resets_all_fields() {
        let mut f = form("Squat", "50", "5");
        assert!(f.is_complete());
        f.clear();
        assert_eq!(f.fields(), &FormFields::default());
        assert!(!f.is_complete());
    }

    #[test]
    fn test_field_names_parse_case_insensitively() {
        assert_eq!("Weight".parse::<FormField>(), Ok(FormField::Weight));
        assert_eq!("reps".parse::<FormField>(), Ok(FormField::Reps));
        assert_eq!("sets".parse::<FormField>(), Err("sets".to_string()));
    }

    #[test]
    fn test_validation_error_serializes_with_field() {
        let json = serde_json::to_value(ValidationError::MissingField(FormField::Exercise)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "missing_field", "field": "exercise"}));
    }
}
