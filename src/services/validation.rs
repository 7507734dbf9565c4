use std::collections::HashMap;

use crate::config::Config;

/// Validation rejections carry the localized message shown to the submitter.
/// Missing-field failures are deliberately generic (no per-field detail).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Vennligst fyll ut alle obligatoriske felter og samtykker.")]
    MissingRequired,
    #[error("Alder må være mellom {min} og {max} år for dette arrangementet.")]
    AgeOutOfRange { min: i64, max: i64 },
    #[error("Ugyldig alder.")]
    InvalidAge,
}

/// Required-field set and age bound are deployment configuration, so the
/// same pipeline serves every form variant.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    pub required_fields: Vec<String>,
    pub age_min: i64,
    pub age_max: i64,
}

impl ValidationRules {
    pub fn from_config(config: &Config) -> Self {
        Self {
            required_fields: config.required_fields.clone(),
            age_min: config.age_min,
            age_max: config.age_max,
        }
    }
}

/// Pure check over the raw submitted fields; no side effects.
pub fn validate(rules: &ValidationRules, form: &HashMap<String, String>) -> Result<(), ValidationError> {
    for field in &rules.required_fields {
        let present = form.get(field).map(|v| !v.trim().is_empty()).unwrap_or(false);
        if !present {
            return Err(ValidationError::MissingRequired);
        }
    }

    let raw_age = form.get("age").map(String::as_str).unwrap_or("0");
    match raw_age.trim().parse::<i64>() {
        Ok(age) if age < rules.age_min || age > rules.age_max => Err(ValidationError::AgeOutOfRange {
            min: rules.age_min,
            max: rules.age_max,
        }),
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::InvalidAge),
    }
}
