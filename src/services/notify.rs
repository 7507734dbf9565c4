use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde_json::json;
use uuid::Uuid;

use crate::config::Config;
use crate::models::registration::Registration;
use crate::services::storage;

const RESEND_URL: &str = "https://api.resend.com/emails";
// Bounded so a slow provider cannot hold up the submission response
const PROVIDER_TIMEOUT_SECS: u64 = 10;

/// Final disposition of one notification. The orchestrator ignores it,
/// but the distinction is logged and asserted in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    Skipped(String),
    Failed(String),
}

/// One provider attempt. `Rejected` means the provider was reached and
/// refused the message (attempt complete, no chaining); `Unreachable`
/// means the attempt never completed and the next provider may be tried.
enum Attempt {
    Delivered,
    Rejected(String),
    Unreachable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Provider {
    Resend,
    Smtp,
}

/// Best-effort organizer notification. Never returns an error and never
/// blocks the submission's success path on its outcome.
pub struct Notifier {
    client: reqwest::Client,
    config: Arc<Config>,
}

impl Notifier {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .context("building HTTP client")?;
        Ok(Self { client, config })
    }

    pub async fn notify(&self, record: &Registration) -> NotifyOutcome {
        let outcome = self.dispatch(record).await;
        match &outcome {
            NotifyOutcome::Delivered => tracing::info!("Registration notification delivered"),
            NotifyOutcome::Skipped(reason) => {
                tracing::warn!("Registration notification skipped: {reason}")
            }
            NotifyOutcome::Failed(reason) => {
                tracing::warn!("Registration notification failed: {reason}")
            }
        }
        outcome
    }

    async fn dispatch(&self, record: &Registration) -> NotifyOutcome {
        let Some(to) = self.config.notify_email.clone() else {
            return NotifyOutcome::Skipped("NOTIFY_EMAIL not set".into());
        };
        let providers = self.enabled_providers();
        if providers.is_empty() {
            return NotifyOutcome::Skipped(
                "no provider configured (RESEND_API_KEY or SMTP_HOST/SMTP_PORT)".into(),
            );
        }

        let content = EmailContent::from_record(&self.config.event_name, record);

        for provider in providers {
            let attempt = match provider {
                Provider::Resend => self.attempt_resend(&to, &content).await,
                Provider::Smtp => self.attempt_smtp(&to, &content, record).await,
            };
            match attempt {
                Attempt::Delivered => return NotifyOutcome::Delivered,
                Attempt::Rejected(reason) => return NotifyOutcome::Failed(reason),
                Attempt::Unreachable(reason) => {
                    tracing::warn!("{:?} unreachable, trying next provider: {reason}", provider);
                }
            }
        }
        NotifyOutcome::Failed("every configured provider was unreachable".into())
    }

    /// Priority order: Resend API first, direct SMTP second.
    fn enabled_providers(&self) -> Vec<Provider> {
        let mut providers = Vec::new();
        if self.config.resend_api_key.is_some() {
            providers.push(Provider::Resend);
        }
        if self.config.smtp_host.is_some() && self.config.smtp_port.is_some() {
            providers.push(Provider::Smtp);
        }
        providers
    }

    async fn attempt_resend(&self, to: &str, content: &EmailContent) -> Attempt {
        let Some(api_key) = self.config.resend_api_key.as_deref() else {
            return Attempt::Unreachable("RESEND_API_KEY not set".into());
        };
        let from = self.config.notify_from().unwrap_or("noreply@localhost");

        let payload = json!({
            "from": from,
            "to": [to],
            "subject": content.subject,
            "text": content.body,
            "attachments": [{
                "filename": content.attachment_name,
                "content": BASE64.encode(&content.attachment),
                "content_type": "text/csv",
            }],
        });

        let response = self
            .client
            .post(RESEND_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() || resp.status().is_redirection() => {
                Attempt::Delivered
            }
            Ok(resp) => {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                Attempt::Rejected(format!("Resend responded {status}: {text}"))
            }
            Err(e) => Attempt::Unreachable(format!("Resend request failed: {e}")),
        }
    }

    async fn attempt_smtp(
        &self,
        to: &str,
        content: &EmailContent,
        record: &Registration,
    ) -> Attempt {
        match self.send_smtp(to, content, record).await {
            Ok(()) => Attempt::Delivered,
            Err(e) => Attempt::Rejected(format!("SMTP send failed: {e:#}")),
        }
    }

    async fn send_smtp(
        &self,
        to: &str,
        content: &EmailContent,
        record: &Registration,
    ) -> anyhow::Result<()> {
        let host = self.config.smtp_host.as_deref().context("SMTP_HOST missing")?;
        let port = self.config.smtp_port.context("SMTP_PORT missing")?;
        let from: Mailbox = self
            .config
            .notify_from()
            .context("no sender address configured")?
            .parse()
            .context("invalid sender address")?;
        let to: Mailbox = to.parse().context("invalid NOTIFY_EMAIL address")?;

        let message_id = format!("<{}@{}>", Uuid::new_v4(), from.email.domain());
        let mut builder = Message::builder()
            .message_id(Some(message_id))
            .from(from)
            .to(to)
            .subject(content.subject.as_str());
        // Replies go to the registrant when they left an address
        let reply_to = record.participant_email();
        if !reply_to.is_empty() {
            if let Ok(mailbox) = reply_to.parse::<Mailbox>() {
                builder = builder.reply_to(mailbox);
            }
        }

        let message = builder
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(content.body.clone()))
                    .singlepart(
                        Attachment::new(content.attachment_name.clone()).body(
                            content.attachment.clone(),
                            ContentType::parse("text/csv").context("attachment content type")?,
                        ),
                    ),
            )
            .context("building email message")?;

        self.smtp_transport(host, port)?
            .send(message)
            .await
            .context("submitting to SMTP server")?;
        Ok(())
    }

    fn smtp_transport(
        &self,
        host: &str,
        port: u16,
    ) -> anyhow::Result<AsyncSmtpTransport<Tokio1Executor>> {
        let use_ssl = self.config.smtp_ssl || port == 465;
        let mut builder = if use_ssl && !self.config.smtp_tls {
            tracing::info!("Sending email via implicit TLS to {host}:{port}");
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)?
        } else if self.config.smtp_tls {
            tracing::info!("Sending email via STARTTLS to {host}:{port}");
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
        } else {
            tracing::info!("Sending email without TLS to {host}:{port}");
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        };
        builder = builder
            .port(port)
            .timeout(Some(Duration::from_secs(PROVIDER_TIMEOUT_SECS)));
        if let (Some(user), Some(pass)) = (&self.config.smtp_user, &self.config.smtp_pass) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }
        Ok(builder.build())
    }
}

/// Subject, plaintext summary and the one-row CSV attachment shared by
/// both providers.
struct EmailContent {
    subject: String,
    body: String,
    attachment_name: String,
    attachment: Vec<u8>,
}

impl EmailContent {
    fn from_record(event_name: &str, record: &Registration) -> Self {
        let subject = format!("Ny påmelding – {event_name}");

        let body = record
            .fields()
            .filter(|(column, _)| *column != "user_agent")
            .map(|(column, value)| format!("{column}: {value}"))
            .collect::<Vec<_>>()
            .join("\n");

        // Header + one data row; newlines flattened so the attachment stays
        // two lines for spreadsheet imports
        let columns: Vec<&str> = record.fields().map(|(c, _)| c).collect();
        let row: Vec<String> = record
            .fields()
            .map(|(_, v)| v.replace('\n', " "))
            .collect();
        let row_refs: Vec<&str> = row.iter().map(String::as_str).collect();
        let mut attachment = storage::serialize_row(&columns).unwrap_or_default();
        attachment.extend(storage::serialize_row(&row_refs).unwrap_or_default());

        Self {
            subject,
            body,
            attachment_name: format!("registration-{}.csv", record.timestamp()),
            attachment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEFAULT_REQUIRED_FIELDS};
    use crate::models::registration::{FieldSchema, RequestMeta};
    use std::collections::HashMap;

    fn test_config() -> Config {
        Config {
            secret_key: "test".into(),
            host: "127.0.0.1".into(),
            port: 0,
            event_name: "Testfest".into(),
            data_dir: "data".into(),
            img_dir: "img".into(),
            disable_csv: false,
            required_fields: DEFAULT_REQUIRED_FIELDS.iter().map(|s| s.to_string()).collect(),
            extra_fields: vec![],
            age_min: 6,
            age_max: 14,
            smtp_host: None,
            smtp_port: None,
            smtp_user: None,
            smtp_pass: None,
            smtp_tls: true,
            smtp_ssl: false,
            resend_api_key: None,
            resend_from: None,
            notify_email: None,
        }
    }

    fn sample_record(config: &Config) -> Registration {
        let schema = FieldSchema::from_config(config);
        let mut form = HashMap::new();
        for (k, v) in [
            ("participant_name", "Ada"),
            ("age", "10"),
            ("phone", "123"),
            ("email", "ada@example.com"),
            ("guardian_name", "Bea"),
            ("guardian_phone", "456"),
            ("health_notes", "nut allergy\nno dairy"),
            ("consent_participation", "on"),
            ("consent_rules", "on"),
            ("consent_privacy", "on"),
        ] {
            form.insert(k.to_string(), v.to_string());
        }
        let meta = RequestMeta {
            ip: "198.51.100.7".into(),
            user_agent: "secret-agent".into(),
        };
        Registration::from_form(&schema, &form, &meta)
    }

    #[tokio::test]
    async fn skipped_without_recipient() {
        let mut config = test_config();
        config.resend_api_key = Some("re_test".into());
        let notifier = Notifier::new(Arc::new(config.clone())).unwrap();
        let outcome = notifier.notify(&sample_record(&config)).await;
        assert!(matches!(outcome, NotifyOutcome::Skipped(_)));
    }

    #[tokio::test]
    async fn skipped_without_any_provider() {
        let mut config = test_config();
        config.notify_email = Some("org@example.com".into());
        let notifier = Notifier::new(Arc::new(config.clone())).unwrap();
        let outcome = notifier.notify(&sample_record(&config)).await;
        assert!(matches!(outcome, NotifyOutcome::Skipped(_)));
    }

    #[test]
    fn provider_order_prefers_resend() {
        let mut config = test_config();
        config.resend_api_key = Some("re_test".into());
        config.smtp_host = Some("smtp.example.com".into());
        config.smtp_port = Some(587);
        let notifier = Notifier::new(Arc::new(config)).unwrap();
        assert_eq!(notifier.enabled_providers(), vec![Provider::Resend, Provider::Smtp]);
    }

    #[test]
    fn smtp_alone_needs_host_and_port() {
        let mut config = test_config();
        config.smtp_host = Some("smtp.example.com".into());
        let notifier = Notifier::new(Arc::new(config)).unwrap();
        assert!(notifier.enabled_providers().is_empty());
    }

    #[test]
    fn body_lists_fields_but_not_user_agent() {
        let config = test_config();
        let content = EmailContent::from_record(&config.event_name, &sample_record(&config));
        assert!(content.body.contains("participant_name: Ada"));
        assert!(content.body.contains("ip: 198.51.100.7"));
        assert!(!content.body.contains("secret-agent"));
        assert!(!content.body.contains("user_agent"));
    }

    #[test]
    fn subject_carries_event_name() {
        let config = test_config();
        let content = EmailContent::from_record(&config.event_name, &sample_record(&config));
        assert_eq!(content.subject, "Ny påmelding – Testfest");
    }

    #[test]
    fn attachment_is_two_line_csv() {
        let config = test_config();
        let record = sample_record(&config);
        let content = EmailContent::from_record(&config.event_name, &record);
        let text = String::from_utf8(content.attachment.clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2, "attachment must stay header + one row");
        assert!(lines[0].starts_with("timestamp,participant_name,"));
        assert!(lines[1].contains("nut allergy no dairy"));
        assert_eq!(
            content.attachment_name,
            format!("registration-{}.csv", record.timestamp())
        );
    }
}
