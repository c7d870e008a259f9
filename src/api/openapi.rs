//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{auth_handler, stripe_handler};
use crate::domain::payment::{
    Account, Balance, BalanceAmount, BankAccount, CardDetails, Charge, PaymentIntent, Payout,
    Refund, RefundReason, Topup, Transfer,
};
use crate::domain::{LoginSource, TokenPair, UserResponse};
use crate::services::{
    BankAccountRequest, BulkRefundFailure, BulkRefundReport, BulkRefundRequest,
    BulkRefundSuccess, ClientSecret, ConfirmPaymentIntentRequest, ConfirmedPayment,
    ConnectAccountView, CreateConnectAccountRequest, CreateCustomerRequest,
    CreatePaymentIntentRequest, CreatePayoutRequest, CreateTopupRequest, CreateTransferRequest,
    CustomerIdResponse, DefaultPaymentMethod, DeleteBankAccountRequest, DeletedResponse,
    OnboardingLink, OnboardingUrls, OtpTimeout, PaymentIntentStatus, RefundRequest,
    RefundResponse, RefundSummary, SavePaymentMethodRequest, SavedPaymentMethod,
    SetupIntentRequest, SignupOutcome, UpdateBankAccountRequest, WebhookAck,
};

/// OpenAPI documentation for the BaaS API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "BaaS API",
        version = "0.1.0",
        description = "Authentication and Stripe payments backend",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    paths(
        // Authentication
        auth_handler::signup,
        auth_handler::signin,
        auth_handler::verify_otp,
        auth_handler::resend,
        auth_handler::forget_password,
        auth_handler::change_password,
        auth_handler::refresh,
        auth_handler::logout_all,
        auth_handler::google_authorize,
        auth_handler::google_callback,
        auth_handler::facebook_authorize,
        auth_handler::facebook_callback,
        // Payments
        stripe_handler::create_payment_intent,
        stripe_handler::confirm_payment_intent,
        stripe_handler::capture_payment,
        stripe_handler::cancel_payment,
        stripe_handler::refund_payment,
        stripe_handler::bulk_refund,
        stripe_handler::payment_intent_status,
        stripe_handler::create_topup,
        // Customers
        stripe_handler::create_card_save_intent,
        stripe_handler::create_setup_intent,
        stripe_handler::save_payment_method,
        stripe_handler::create_customer,
        stripe_handler::customer_id_by_email,
        stripe_handler::default_payment_method,
        // Connect
        stripe_handler::create_connect_account,
        stripe_handler::get_connect_account,
        stripe_handler::create_account_link,
        stripe_handler::list_external_accounts,
        stripe_handler::connect_balance,
        stripe_handler::create_transfer,
        // Payouts
        stripe_handler::create_payout,
        stripe_handler::payout_status,
        stripe_handler::list_payouts,
        stripe_handler::payout_balance,
        stripe_handler::cancel_payout,
        stripe_handler::add_bank_account,
        stripe_handler::update_bank_account,
        stripe_handler::delete_bank_account,
        // Webhooks
        stripe_handler::webhook,
    ),
    components(
        schemas(
            // Auth
            LoginSource,
            UserResponse,
            TokenPair,
            OtpTimeout,
            SignupOutcome,
            auth_handler::SignupRequest,
            auth_handler::SigninRequest,
            auth_handler::VerifyOtpRequest,
            auth_handler::EmailRequest,
            auth_handler::ChangePasswordRequest,
            auth_handler::MfaStatus,
            auth_handler::SigninResponse,
            auth_handler::SessionResponse,
            auth_handler::OtpSent,
            // Stripe objects
            PaymentIntent,
            Refund,
            RefundReason,
            Charge,
            Topup,
            CardDetails,
            Account,
            BankAccount,
            Transfer,
            Payout,
            Balance,
            BalanceAmount,
            // Payment requests and responses
            CreatePaymentIntentRequest,
            ConfirmPaymentIntentRequest,
            RefundRequest,
            BulkRefundRequest,
            CreateTopupRequest,
            SetupIntentRequest,
            SavePaymentMethodRequest,
            CreateCustomerRequest,
            ClientSecret,
            ConfirmedPayment,
            RefundResponse,
            BulkRefundSuccess,
            BulkRefundFailure,
            BulkRefundReport,
            RefundSummary,
            PaymentIntentStatus,
            SavedPaymentMethod,
            CustomerIdResponse,
            DefaultPaymentMethod,
            // Connect requests and responses
            CreateConnectAccountRequest,
            OnboardingUrls,
            BankAccountRequest,
            UpdateBankAccountRequest,
            DeleteBankAccountRequest,
            CreateTransferRequest,
            CreatePayoutRequest,
            ConnectAccountView,
            OnboardingLink,
            DeletedResponse,
            WebhookAck,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Signup, sign-in, OTP and tokens"),
        (name = "OAuth", description = "Google and Facebook sign-in"),
        (name = "Payments", description = "Payment intents, refunds and top-ups"),
        (name = "Customers", description = "Customers and saved payment methods"),
        (name = "Connect", description = "Marketplace accounts and transfers"),
        (name = "Payouts", description = "Bank accounts and payouts"),
        (name = "Webhooks", description = "Stripe event delivery")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Access token from /auth/signin or /auth/verify-otp"))
                        .build(),
                ),
            );
        }
    }
}
