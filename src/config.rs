use std::env;
use std::path::PathBuf;

/// Default required-field set; deployments override via REQUIRED_FIELDS.
pub const DEFAULT_REQUIRED_FIELDS: [&str; 8] = [
    "participant_name",
    "age",
    "phone",
    "guardian_name",
    "guardian_phone",
    "consent_participation",
    "consent_rules",
    "consent_privacy",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub secret_key: String,
    pub host: String,
    pub port: u16,
    pub event_name: String,
    pub data_dir: PathBuf,
    pub img_dir: PathBuf,
    pub disable_csv: bool,
    pub required_fields: Vec<String>,
    pub extra_fields: Vec<String>,
    pub age_min: i64,
    pub age_max: i64,
    // SMTP provider (optional)
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub smtp_tls: bool,
    pub smtp_ssl: bool,
    // Resend API provider (optional)
    pub resend_api_key: Option<String>,
    pub resend_from: Option<String>,
    // Notification recipient; nothing is sent without it
    pub notify_email: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            secret_key: env::var("SECRET_KEY").unwrap_or_else(|_| "dev-secret-change".into()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT").unwrap_or_else(|_| "5000".into()).parse()?,
            event_name: env::var("EVENT_NAME").unwrap_or_else(|_| "Puls Musikkverksted".into()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".into()).into(),
            img_dir: env::var("IMG_DIR").unwrap_or_else(|_| "img".into()).into(),
            // VERCEL marks an ephemeral filesystem; the log would not survive there
            disable_csv: truthy("DISABLE_CSV") || env::var("VERCEL").is_ok(),
            required_fields: list_var("REQUIRED_FIELDS").unwrap_or_else(|| {
                DEFAULT_REQUIRED_FIELDS.iter().map(|s| s.to_string()).collect()
            }),
            extra_fields: list_var("EXTRA_FIELDS").unwrap_or_default(),
            age_min: env::var("AGE_MIN").unwrap_or_else(|_| "6".into()).parse()?,
            age_max: env::var("AGE_MAX").unwrap_or_else(|_| "14".into()).parse()?,
            smtp_host: env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_user: env::var("SMTP_USER").ok().filter(|s| !s.is_empty()),
            smtp_pass: env::var("SMTP_PASS").ok().filter(|s| !s.is_empty()),
            smtp_tls: env::var("SMTP_TLS").map(|v| is_truthy(&v)).unwrap_or(true),
            smtp_ssl: truthy("SMTP_SSL"),
            resend_api_key: env::var("RESEND_API_KEY").ok().filter(|s| !s.is_empty()),
            resend_from: env::var("RESEND_FROM").ok().filter(|s| !s.is_empty()),
            notify_email: env::var("NOTIFY_EMAIL").ok().filter(|s| !s.is_empty()),
        })
    }

    pub fn csv_path(&self) -> PathBuf {
        self.data_dir.join("registrations.csv")
    }

    /// Sender address for outgoing notifications, in preference order.
    pub fn notify_from(&self) -> Option<&str> {
        self.resend_from
            .as_deref()
            .or(self.smtp_user.as_deref())
            .or(self.notify_email.as_deref())
    }
}

fn is_truthy(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn truthy(key: &str) -> bool {
    env::var(key).map(|v| is_truthy(&v)).unwrap_or(false)
}

fn list_var(key: &str) -> Option<Vec<String>> {
    let raw = env::var(key).ok()?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}
