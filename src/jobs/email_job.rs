//! Email background job.
//!
//! OTP emails are queued by the API and picked up by `jobs work`. With
//! `SMTP_HOST` set the worker delivers them through lettre; without it the
//! message is only noted in the log, and its body is written at debug level
//! for local development.

use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use std::env;

use crate::config::{DEFAULT_SMTP_FROM, DEFAULT_SMTP_PORT, SMTPS_PORT};
use crate::domain::OtpPurpose;
use crate::errors::AppError;

/// Email job payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailJob {
    /// Recipient email address
    pub to: String,
    pub subject: String,
    /// Plain text body
    pub body: String,
    /// Optional sender override (defaults to SMTP_FROM)
    #[serde(default)]
    pub from: Option<String>,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            from: None,
        }
    }

    /// One-time password message for the given purpose
    pub fn otp(to: impl Into<String>, code: &str, ttl_minutes: u64, purpose: OtpPurpose) -> Self {
        let action = match purpose {
            OtpPurpose::Verify => "verify your account",
            OtpPurpose::Reset => "reset your password",
        };
        let body = format!(
            "Your one-time code is {}.\n\nUse it to {} within {} minutes. \
             If you did not request this code you can ignore this email.",
            code, action, ttl_minutes
        );
        Self::new(to, purpose.email_subject(), body)
    }

    /// Set custom sender address
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    fn to_message(&self, from: &str) -> Result<Message, AppError> {
        Message::builder()
            .from(parse_mailbox(from)?)
            .to(parse_mailbox(&self.to)?)
            .subject(&self.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone())
            .map_err(|e| AppError::internal(format!("Invalid email message: {}", e)))
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, AppError> {
    address
        .parse()
        .map_err(|e| AppError::internal(format!("Invalid email address {:?}: {}", address, e)))
}

/// SMTP settings read by the worker process.
#[derive(Debug, Clone)]
struct EmailConfig {
    smtp_host: Option<String>,
    smtp_port: u16,
    smtp_user: Option<String>,
    smtp_pass: Option<String>,
    smtp_from: String,
    smtp_tls: bool,
}

impl EmailConfig {
    fn from_env() -> Self {
        Self {
            smtp_host: env::var("SMTP_HOST").ok().filter(|h| !h.trim().is_empty()),
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            smtp_user: env::var("SMTP_USER").ok(),
            smtp_pass: env::var("SMTP_PASS").ok(),
            smtp_from: env::var("SMTP_FROM").unwrap_or_else(|_| DEFAULT_SMTP_FROM.to_string()),
            smtp_tls: env::var("SMTP_TLS")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// Transport for the configured relay, or `None` when no host is set.
    fn transport(&self) -> Result<Option<AsyncSmtpTransport<Tokio1Executor>>, AppError> {
        let Some(host) = self.smtp_host.as_deref() else {
            return Ok(None);
        };

        let builder = match (self.smtp_tls, self.smtp_port) {
            (true, SMTPS_PORT) => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
            (true, _) => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
            (false, _) => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
        }
        .map_err(|e| AppError::internal(format!("SMTP relay {} rejected: {}", host, e)))?
        .port(self.smtp_port);

        let builder = match (&self.smtp_user, &self.smtp_pass) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(Some(builder.build()))
    }
}

/// Email job handler - processes email sending jobs
pub async fn email_job_handler(job: EmailJob) -> Result<(), AppError> {
    let config = EmailConfig::from_env();
    let from = job.from.as_deref().unwrap_or(&config.smtp_from);

    tracing::info!(
        to = %job.to,
        from = %from,
        subject = %job.subject,
        "Processing email job"
    );

    let Some(transport) = config.transport()? else {
        tracing::warn!(to = %job.to, "SMTP not configured - email not sent");
        tracing::debug!(
            "=== EMAIL (not sent) ===\n\
             From: {}\n\
             To: {}\n\
             Subject: {}\n\
             Body:\n{}\n\
             ========================",
            from,
            job.to,
            job.subject,
            job.body
        );
        return Ok(());
    };

    let message = job.to_message(from)?;
    transport.send(message).await.map_err(|e| {
        tracing::error!(to = %job.to, error = %e, "SMTP delivery failed");
        AppError::internal(format!("SMTP delivery failed: {}", e))
    })?;

    tracing::info!(to = %job.to, "Email sent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> EmailConfig {
        EmailConfig {
            smtp_host: None,
            smtp_port: DEFAULT_SMTP_PORT,
            smtp_user: None,
            smtp_pass: None,
            smtp_from: DEFAULT_SMTP_FROM.to_string(),
            smtp_tls: true,
        }
    }

    #[test]
    fn test_otp_email_mentions_code_and_ttl() {
        let job = EmailJob::otp("a@example.com", "123456", 5, OtpPurpose::Verify);
        assert_eq!(job.to, "a@example.com");
        assert_eq!(job.subject, "Your verification code");
        assert!(job.body.contains("123456"));
        assert!(job.body.contains("5 minutes"));
        assert!(job.from.is_none());
    }

    #[test]
    fn test_reset_email_subject() {
        let job = EmailJob::otp("a@example.com", "000111", 5, OtpPurpose::Reset)
            .with_from("support@example.com");
        assert_eq!(job.subject, "Your password reset code");
        assert_eq!(job.from.as_deref(), Some("support@example.com"));
    }

    #[test]
    fn test_without_host_there_is_no_transport() {
        assert!(unconfigured().transport().unwrap().is_none());
    }

    #[test]
    fn test_configured_host_selects_smtp_delivery() {
        let config = EmailConfig {
            smtp_host: Some("localhost".to_string()),
            smtp_port: 2525,
            smtp_user: Some("mailer".to_string()),
            smtp_pass: Some("secret".to_string()),
            smtp_tls: false,
            ..unconfigured()
        };
        assert!(config.transport().unwrap().is_some());
    }

    #[test]
    fn test_message_requires_valid_addresses() {
        let job = EmailJob::new("a@example.com", "Subject", "Body");
        assert!(job.to_message("noreply@example.com").is_ok());
        assert!(job.to_message("not an address").is_err());
    }

    #[tokio::test]
    async fn test_handler_without_smtp_host_succeeds() {
        if env::var("SMTP_HOST").is_ok() {
            return;
        }
        let job = EmailJob::new("a@example.com", "Subject", "Body");
        assert!(email_job_handler(job).await.is_ok());
    }
}
