//! Application state - Dependency injection container.
//!
//! Provides centralized access to all application services and infrastructure.

use std::sync::Arc;

use crate::infra::{Cache, Database, HealthCheck, RateLimiter};
use crate::services::{
    AuthService, ConnectService, PaymentService, ServiceContainer, WebhookService,
};

/// Application state containing all services (DI container).
#[derive(Clone)]
pub struct AppState {
    /// Signup, sign-in, OTP and token operations
    pub auth_service: Arc<dyn AuthService>,
    /// Payment intents, refunds, customers
    pub payment_service: Arc<dyn PaymentService>,
    /// Connect accounts, bank accounts, transfers, payouts
    pub connect_service: Arc<dyn ConnectService>,
    pub webhook_service: Arc<dyn WebhookService>,
    /// Request counters for the rate limit middleware
    pub rate_limiter: Arc<dyn RateLimiter>,
    /// Dependencies reported by `/health`
    pub health_checks: Vec<Arc<dyn HealthCheck>>,
}

impl AppState {
    /// Build state from a service container and the live Postgres and Redis handles.
    pub fn from_container(
        services: &dyn ServiceContainer,
        database: Arc<Database>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            auth_service: services.auth(),
            payment_service: services.payments(),
            connect_service: services.connect(),
            webhook_service: services.webhooks(),
            rate_limiter: cache.clone(),
            health_checks: vec![
                database as Arc<dyn HealthCheck>,
                cache as Arc<dyn HealthCheck>,
            ],
        }
    }

    /// Create state with manually injected services.
    pub fn new(
        auth_service: Arc<dyn AuthService>,
        payment_service: Arc<dyn PaymentService>,
        connect_service: Arc<dyn ConnectService>,
        webhook_service: Arc<dyn WebhookService>,
        rate_limiter: Arc<dyn RateLimiter>,
        health_checks: Vec<Arc<dyn HealthCheck>>,
    ) -> Self {
        Self {
            auth_service,
            payment_service,
            connect_service,
            webhook_service,
            rate_limiter,
            health_checks,
        }
    }
}
