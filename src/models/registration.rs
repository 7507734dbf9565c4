use std::collections::HashMap;

use chrono::Local;

use crate::config::Config;

/// Localized rendering of the consent checkboxes in the stored log.
pub const CONSENT_YES: &str = "Ja";
pub const CONSENT_NO: &str = "Nei";

const LEADING_COLUMNS: [&str; 11] = [
    "timestamp",
    "participant_name",
    "age",
    "phone",
    "email",
    "school",
    "guardian_name",
    "guardian_phone",
    "emergency_name",
    "emergency_phone",
    "health_notes",
];

const CONSENT_COLUMNS: [&str; 4] = [
    "consent_participation",
    "consent_photo",
    "consent_rules",
    "consent_privacy",
];

const TRAILING_COLUMNS: [&str; 2] = ["ip", "user_agent"];

/// Fixed column order of the registration log. Deployment variants add
/// their extra columns between `health_notes` and the consent block.
#[derive(Debug, Clone)]
pub struct FieldSchema {
    columns: Vec<String>,
}

impl FieldSchema {
    pub fn from_config(config: &Config) -> Self {
        let mut columns: Vec<String> = LEADING_COLUMNS.iter().map(|s| s.to_string()).collect();
        columns.extend(config.extra_fields.iter().cloned());
        columns.extend(CONSENT_COLUMNS.iter().map(|s| s.to_string()));
        columns.extend(TRAILING_COLUMNS.iter().map(|s| s.to_string()));
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn header_row(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }
}

/// Network metadata captured from the request, not user-supplied.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: String,
    pub user_agent: String,
}

/// One normalized registration, values aligned with the schema columns.
/// Immutable once built; appended to the log and handed to the notifier.
#[derive(Debug, Clone)]
pub struct Registration {
    values: Vec<(String, String)>,
}

impl Registration {
    /// Builds the full record from a submitted form. Optional fields
    /// default to the empty string; consent checkboxes coerce to the
    /// localized yes/no strings; the timestamp is local time at second
    /// precision.
    pub fn from_form(
        schema: &FieldSchema,
        form: &HashMap<String, String>,
        meta: &RequestMeta,
    ) -> Self {
        let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        let values = schema
            .columns()
            .iter()
            .map(|col| {
                let value = match col.as_str() {
                    "timestamp" => timestamp.clone(),
                    "ip" => meta.ip.clone(),
                    "user_agent" => meta.user_agent.clone(),
                    c if CONSENT_COLUMNS.contains(&c) => {
                        let checked = form.get(c).map(|v| !v.trim().is_empty()).unwrap_or(false);
                        if checked { CONSENT_YES } else { CONSENT_NO }.to_string()
                    }
                    c => form.get(c).map(|v| v.trim().to_string()).unwrap_or_default(),
                };
                (col.clone(), value)
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, column: &str) -> &str {
        self.values
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }

    pub fn timestamp(&self) -> &str {
        self.get("timestamp")
    }

    /// Registrant's own email, used as Reply-To when present.
    pub fn participant_email(&self) -> &str {
        self.get("email")
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(c, v)| (c.as_str(), v.as_str()))
    }

    pub fn csv_row(&self) -> Vec<&str> {
        self.values.iter().map(|(_, v)| v.as_str()).collect()
    }
}
