//! Service Container - Centralized service access.
//!
//! Builds every service against the production adapters once at startup
//! and hands out trait objects to the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use super::{
    AuthService, Authenticator, ConnectManager, ConnectService, PaymentManager, PaymentService,
    WebhookService, WebhookVerifier,
};
use crate::config::Config;
use crate::errors::{AppError, AppResult};
use crate::infra::{
    Cache, FacebookProvider, GoogleProvider, Mailer, Persistence, StripeClient, StripeConnect,
    StripePayments,
};

/// Timeout for calls to Stripe and the OAuth providers
const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);

/// Service container trait for dependency injection.
pub trait ServiceContainer: Send + Sync {
    fn auth(&self) -> Arc<dyn AuthService>;

    fn payments(&self) -> Arc<dyn PaymentService>;

    fn connect(&self) -> Arc<dyn ConnectService>;

    fn webhooks(&self) -> Arc<dyn WebhookService>;
}

/// Concrete implementation of ServiceContainer
#[derive(Clone)]
pub struct Services {
    auth_service: Arc<dyn AuthService>,
    payment_service: Arc<dyn PaymentService>,
    connect_service: Arc<dyn ConnectService>,
    webhook_service: Arc<dyn WebhookService>,
}

impl Services {
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        payment_service: Arc<dyn PaymentService>,
        connect_service: Arc<dyn ConnectService>,
        webhook_service: Arc<dyn WebhookService>,
    ) -> Self {
        Self {
            auth_service,
            payment_service,
            connect_service,
            webhook_service,
        }
    }

    /// Wire every service against Postgres, Redis, the mail queue, Stripe
    /// and whichever OAuth providers are configured.
    pub fn from_infra(
        config: &Config,
        db: DatabaseConnection,
        cache: Arc<Cache>,
        mailer: Arc<dyn Mailer>,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(OUTBOUND_TIMEOUT)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build HTTP client: {}", e)))?;

        let uow = Arc::new(Persistence::new(db));
        let mut authenticator = Authenticator::new(uow, cache.clone(), cache, mailer, config);
        if let Some(google) = &config.google {
            authenticator = authenticator
                .with_provider(Arc::new(GoogleProvider::new(http.clone(), google.clone())));
        }
        if let Some(facebook) = &config.facebook {
            authenticator = authenticator
                .with_provider(Arc::new(FacebookProvider::new(http.clone(), facebook.clone())));
        }

        let stripe = StripeClient::with_http(http, &config.stripe);
        let payments = PaymentManager::new(Arc::new(StripePayments::new(stripe.clone())));
        let connect = ConnectManager::new(Arc::new(StripeConnect::new(stripe)), &config.stripe);
        let webhooks = WebhookVerifier::new(config.stripe.webhook_secret.clone());

        if config.stripe.webhook_secret.is_none() {
            tracing::warn!("STRIPE_WEBHOOK_SECRET not set, webhook endpoint will reject events");
        }

        Ok(Self::new(
            Arc::new(authenticator),
            Arc::new(payments),
            Arc::new(connect),
            Arc::new(webhooks),
        ))
    }
}

impl ServiceContainer for Services {
    fn auth(&self) -> Arc<dyn AuthService> {
        self.auth_service.clone()
    }

    fn payments(&self) -> Arc<dyn PaymentService> {
        self.payment_service.clone()
    }

    fn connect(&self) -> Arc<dyn ConnectService> {
        self.connect_service.clone()
    }

    fn webhooks(&self) -> Arc<dyn WebhookService> {
        self.webhook_service.clone()
    }
}
