//! Outgoing mail port and its job-queue adapter.

use apalis::prelude::Storage;
use apalis_sql::postgres::PostgresStorage;
use async_trait::async_trait;

use crate::domain::{Otp, OtpPurpose};
use crate::errors::{AppError, AppResult};
use crate::jobs::EmailJob;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Sends one-time passwords to users.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(
        &self,
        email: &str,
        otp: &Otp,
        ttl_minutes: u64,
        purpose: OtpPurpose,
    ) -> AppResult<()>;
}

/// Mailer that enqueues an `EmailJob` for the background worker.
#[derive(Clone)]
pub struct QueuedMailer {
    storage: PostgresStorage<EmailJob>,
    from: String,
}

impl QueuedMailer {
    pub fn new(storage: PostgresStorage<EmailJob>, from: impl Into<String>) -> Self {
        Self {
            storage,
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for QueuedMailer {
    async fn send_otp(
        &self,
        email: &str,
        otp: &Otp,
        ttl_minutes: u64,
        purpose: OtpPurpose,
    ) -> AppResult<()> {
        let job = EmailJob::otp(email, otp.as_str(), ttl_minutes, purpose).with_from(&self.from);

        // push needs &mut; the storage handle is a cheap pool clone
        let mut storage = self.storage.clone();
        storage
            .push(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to enqueue email: {}", e)))?;

        tracing::debug!(to = %email, purpose = purpose.as_str(), "OTP email queued");
        Ok(())
    }
}
