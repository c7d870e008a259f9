//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on ports (traits) for
//! dependency inversion.

mod auth_service;
mod connect_service;
pub mod container;
mod payment_service;
mod token;
mod webhook_service;

// Service Container
pub use container::{ServiceContainer, Services};

// Service traits and implementations
pub use auth_service::{
    AuthService, AuthSession, Authenticator, CurrentUser, OtpTimeout, SigninOutcome,
    SignupInput, SignupOutcome,
};
pub use connect_service::{
    BankAccountRequest, ConnectAccountView, ConnectManager, ConnectService,
    CreateConnectAccountRequest, CreatePayoutRequest, CreateTransferRequest,
    DeleteBankAccountRequest, DeletedResponse, OnboardingLink, OnboardingUrls,
    UpdateBankAccountRequest,
};
pub use payment_service::{
    BulkRefundFailure, BulkRefundReport, BulkRefundRequest, BulkRefundSuccess, ClientSecret,
    ConfirmPaymentIntentRequest, ConfirmedPayment, CreateCustomerRequest,
    CreatePaymentIntentRequest, CreateTopupRequest, CustomerIdResponse, DefaultPaymentMethod,
    PaymentIntentStatus, PaymentManager, PaymentService, RefundRequest, RefundResponse,
    RefundSummary, SavePaymentMethodRequest, SavedPaymentMethod, SetupIntentRequest,
};
pub use token::TokenIssuer;
pub use webhook_service::{WebhookAck, WebhookService, WebhookVerifier};

