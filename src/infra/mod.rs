//! Infrastructure layer - External systems integration
//!
//! Postgres (repositories and unit of work), Redis (cache, OTP and OAuth
//! state), the email job queue, Stripe and OAuth providers.

pub mod cache;
pub mod db;
pub mod health;
pub mod mailer;
pub mod oauth;
pub mod repositories;
pub mod stripe;
pub mod unit_of_work;

pub use cache::{Cache, OAuthStateStore, OtpStore, RateLimitStatus, RateLimiter};
pub use db::{Database, Migrator};
pub use health::HealthCheck;
pub use mailer::{Mailer, QueuedMailer};
pub use oauth::{FacebookProvider, GoogleProvider, OAuthProfile, OAuthProvider};
pub use repositories::{TxUserRepository, UserRepository, UserStore};
pub use stripe::{ConnectGateway, PaymentGateway, StripeClient, StripeConnect, StripePayments};
pub use unit_of_work::{Persistence, TransactionContext, TxFuture, UnitOfWork};

#[cfg(any(test, feature = "test-utils"))]
pub use cache::{MockOAuthStateStore, MockOtpStore, MockRateLimiter};
#[cfg(any(test, feature = "test-utils"))]
pub use health::MockHealthCheck;
#[cfg(any(test, feature = "test-utils"))]
pub use mailer::MockMailer;
#[cfg(any(test, feature = "test-utils"))]
pub use oauth::MockOAuthProvider;
#[cfg(any(test, feature = "test-utils"))]
pub use repositories::MockUserRepository;
#[cfg(any(test, feature = "test-utils"))]
pub use stripe::{MockConnectGateway, MockPaymentGateway};
