//! Stripe REST adapters.

mod client;
mod connect;
mod payments;

pub use client::{ApiFailure, Form, StripeClient};
pub use connect::{ConnectGateway, StripeConnect};
pub use payments::{PaymentGateway, PaymentResult, StripePayments};

#[cfg(any(test, feature = "test-utils"))]
pub use connect::MockConnectGateway;
#[cfg(any(test, feature = "test-utils"))]
pub use payments::MockPaymentGateway;
