//! Stripe payment, Connect and webhook handlers.
//!
//! Bodies are returned without the `{success, data}` envelope: clients of
//! these routes consume Stripe-shaped objects directly.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::payment::{Account, Balance, BankAccount, PaymentIntent, Payout, Topup, Transfer};
use crate::errors::{AppError, AppResult};
use crate::services::{
    BankAccountRequest, BulkRefundReport, BulkRefundRequest, ClientSecret,
    ConfirmPaymentIntentRequest, ConfirmedPayment, ConnectAccountView,
    CreateConnectAccountRequest, CreateCustomerRequest, CreatePaymentIntentRequest,
    CreatePayoutRequest, CreateTopupRequest, CreateTransferRequest, CustomerIdResponse,
    DefaultPaymentMethod, DeleteBankAccountRequest, DeletedResponse, OnboardingLink,
    OnboardingUrls, PaymentIntentStatus, RefundRequest, RefundResponse, SavePaymentMethodRequest,
    SavedPaymentMethod, SetupIntentRequest, UpdateBankAccountRequest, WebhookAck,
};

const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct CustomerQuery {
    pub customer_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ConnectAccountQuery {
    /// Acts on behalf of this Connect account
    pub connect_account_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingQuery {
    pub refresh_url: Option<String>,
    pub return_url: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PayoutListQuery {
    pub connect_account_id: Option<String>,
    /// 1 to 100, default 10
    pub limit: Option<u32>,
}

fn required(value: Option<String>, name: &str) -> AppResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::bad_request(format!("{} is required", name)))
}

/// Create Stripe routes
pub fn stripe_routes() -> Router<AppState> {
    Router::new()
        // Payment intents
        .route("/payment-intent", post(create_payment_intent))
        .route("/payment-intent/:id/confirm", post(confirm_payment_intent))
        .route("/payment-intent/:id/capture", post(capture_payment))
        .route("/payment-intent/:id/cancel", post(cancel_payment))
        .route("/payment-intent/:id/refund", post(refund_payment))
        .route("/payment-intent/:id/status", get(payment_intent_status))
        .route("/payment-intents/bulk-refund", post(bulk_refund))
        .route("/topup", post(create_topup))
        // Customers and saved cards
        .route("/create-card-save-intent", get(create_card_save_intent))
        .route("/setup-intent", post(create_setup_intent))
        .route("/save-payment-method", post(save_payment_method))
        .route("/customer", post(create_customer))
        .route("/customer/:id", get(customer_id_by_email))
        .route("/customer/:id/payment-method", get(default_payment_method))
        // Connect
        .route("/connect/account", post(create_connect_account))
        .route("/connect/account/:id", get(get_connect_account))
        .route("/connect/account/:id/link", post(create_account_link))
        .route(
            "/connect/account/:id/external-accounts",
            get(list_external_accounts),
        )
        .route("/connect/account/:id/balance", get(connect_balance))
        .route("/connect/transfer", post(create_transfer))
        .route("/connect/payout", post(create_payout))
        .route("/connect/payout/:id", get(payout_status))
        // Payouts and bank accounts
        .route(
            "/payouts/add-bank-accounts",
            post(add_bank_account).patch(update_bank_account),
        )
        .route(
            "/payouts/delete-bank-accounts",
            delete(delete_bank_account),
        )
        .route("/payouts", get(list_payouts))
        .route("/payouts/balance", get(payout_balance))
        .route("/payouts/:id/cancel", post(cancel_payout))
        // Webhook (raw body)
        .route("/webhook", post(webhook))
}

// =============================================================================
// Payment intents
// =============================================================================

/// Create a manual-capture payment intent
#[utoipa::path(
    post,
    path = "/stripe/payment-intent",
    tag = "Payments",
    request_body = CreatePaymentIntentRequest,
    responses(
        (status = 200, description = "Payment intent created", body = ClientSecret),
        (status = 400, description = "Rejected by Stripe"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_payment_intent(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePaymentIntentRequest>,
) -> AppResult<Json<ClientSecret>> {
    Ok(Json(
        state.payment_service.create_payment_intent(payload).await?,
    ))
}

/// Confirm a payment intent with a payment method
#[utoipa::path(
    post,
    path = "/stripe/payment-intent/{id}/confirm",
    tag = "Payments",
    params(("id" = String, Path, description = "Payment intent ID")),
    request_body = ConfirmPaymentIntentRequest,
    responses(
        (status = 200, description = "Authorized or succeeded", body = ConfirmedPayment),
        (status = 402, description = "Card declined"),
        (status = 404, description = "Payment intent not found"),
        (status = 502, description = "Unexpected payment status")
    )
)]
pub async fn confirm_payment_intent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<ConfirmPaymentIntentRequest>,
) -> AppResult<Json<ConfirmedPayment>> {
    let confirmed = state
        .payment_service
        .confirm_payment_intent(&id, &payload.payment_method_id)
        .await?;
    Ok(Json(confirmed))
}

/// Capture an authorized payment intent
#[utoipa::path(
    post,
    path = "/stripe/payment-intent/{id}/capture",
    tag = "Payments",
    params(("id" = String, Path, description = "Payment intent ID")),
    responses(
        (status = 200, description = "Captured", body = PaymentIntent),
        (status = 404, description = "Payment intent not found")
    )
)]
pub async fn capture_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PaymentIntent>> {
    Ok(Json(state.payment_service.capture_payment(&id).await?))
}

/// Cancel a payment intent
#[utoipa::path(
    post,
    path = "/stripe/payment-intent/{id}/cancel",
    tag = "Payments",
    params(("id" = String, Path, description = "Payment intent ID")),
    responses(
        (status = 200, description = "Canceled", body = PaymentIntent),
        (status = 404, description = "Payment intent not found")
    )
)]
pub async fn cancel_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PaymentIntent>> {
    Ok(Json(state.payment_service.cancel_payment(&id).await?))
}

/// Refund a payment intent in full or in part. Send `{}` for a full refund.
#[utoipa::path(
    post,
    path = "/stripe/payment-intent/{id}/refund",
    tag = "Payments",
    params(("id" = String, Path, description = "Payment intent ID")),
    request_body = RefundRequest,
    responses(
        (status = 200, description = "Refund created", body = RefundResponse),
        (status = 404, description = "Payment intent not found")
    )
)]
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(payload): ValidatedJson<RefundRequest>,
) -> AppResult<Json<RefundResponse>> {
    Ok(Json(state.payment_service.refund_payment(&id, payload).await?))
}

/// Fully refund several payment intents
#[utoipa::path(
    post,
    path = "/stripe/payment-intents/bulk-refund",
    tag = "Payments",
    request_body = BulkRefundRequest,
    responses(
        (status = 200, description = "Per-intent results and errors", body = BulkRefundReport)
    )
)]
pub async fn bulk_refund(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<BulkRefundRequest>,
) -> AppResult<Json<BulkRefundReport>> {
    Ok(Json(
        state
            .payment_service
            .bulk_refund(payload.payment_intent_ids)
            .await?,
    ))
}

/// Payment intent with its charges and a refund summary
#[utoipa::path(
    get,
    path = "/stripe/payment-intent/{id}/status",
    tag = "Payments",
    params(("id" = String, Path, description = "Payment intent ID")),
    responses(
        (status = 200, description = "Status", body = PaymentIntentStatus),
        (status = 404, description = "Payment intent not found")
    )
)]
pub async fn payment_intent_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<PaymentIntentStatus>> {
    Ok(Json(state.payment_service.payment_intent_status(&id).await?))
}

/// Top up the platform balance
#[utoipa::path(
    post,
    path = "/stripe/topup",
    tag = "Payments",
    request_body = CreateTopupRequest,
    responses(
        (status = 201, description = "Top-up created", body = Topup),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_topup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateTopupRequest>,
) -> AppResult<(StatusCode, Json<Topup>)> {
    let topup = state.payment_service.create_topup(payload).await?;
    Ok((StatusCode::CREATED, Json(topup)))
}

// =============================================================================
// Customers and saved payment methods
// =============================================================================

/// Setup intent for saving a card, customer given as a query parameter
#[utoipa::path(
    get,
    path = "/stripe/create-card-save-intent",
    tag = "Customers",
    params(CustomerQuery),
    responses(
        (status = 200, description = "Setup intent created", body = ClientSecret),
        (status = 400, description = "customerId missing")
    )
)]
pub async fn create_card_save_intent(
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> AppResult<Json<ClientSecret>> {
    let customer_id = required(query.customer_id, "customerId")?;
    Ok(Json(
        state
            .payment_service
            .create_setup_intent(&customer_id)
            .await?,
    ))
}

/// Off-session setup intent
#[utoipa::path(
    post,
    path = "/stripe/setup-intent",
    tag = "Customers",
    request_body = SetupIntentRequest,
    responses(
        (status = 200, description = "Setup intent created", body = ClientSecret),
        (status = 404, description = "Customer not found")
    )
)]
pub async fn create_setup_intent(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SetupIntentRequest>,
) -> AppResult<Json<ClientSecret>> {
    Ok(Json(
        state
            .payment_service
            .create_setup_intent(&payload.customer_id)
            .await?,
    ))
}

/// Attach a payment method to a customer
#[utoipa::path(
    post,
    path = "/stripe/save-payment-method",
    tag = "Customers",
    request_body = SavePaymentMethodRequest,
    responses(
        (status = 200, description = "Payment method saved", body = SavedPaymentMethod),
        (status = 404, description = "Customer not found")
    )
)]
pub async fn save_payment_method(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SavePaymentMethodRequest>,
) -> AppResult<Json<SavedPaymentMethod>> {
    Ok(Json(state.payment_service.save_payment_method(payload).await?))
}

/// Create a Stripe customer
#[utoipa::path(
    post,
    path = "/stripe/customer",
    tag = "Customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 201, description = "Customer created", body = CustomerIdResponse),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_customer(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCustomerRequest>,
) -> AppResult<(StatusCode, Json<CustomerIdResponse>)> {
    let created = state.payment_service.create_customer(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Look up a customer ID by email
#[utoipa::path(
    get,
    path = "/stripe/customer/{email}",
    tag = "Customers",
    params(("email" = String, Path, description = "Customer email")),
    responses(
        (status = 200, description = "Customer ID, null when unknown", body = CustomerIdResponse)
    )
)]
pub async fn customer_id_by_email(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> AppResult<Json<CustomerIdResponse>> {
    Ok(Json(
        state.payment_service.customer_id_by_email(&email).await?,
    ))
}

/// Default card of a customer, or null
#[utoipa::path(
    get,
    path = "/stripe/customer/{id}/payment-method",
    tag = "Customers",
    params(("id" = String, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Default payment method or null", body = DefaultPaymentMethod),
        (status = 404, description = "Customer not found")
    )
)]
pub async fn default_payment_method(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Option<DefaultPaymentMethod>>> {
    Ok(Json(state.payment_service.default_payment_method(&id).await?))
}

// =============================================================================
// Connect accounts
// =============================================================================

/// Create a Connect account
#[utoipa::path(
    post,
    path = "/stripe/connect/account",
    tag = "Connect",
    request_body = CreateConnectAccountRequest,
    responses(
        (status = 201, description = "Account created", body = Account),
        (status = 400, description = "Rejected by Stripe")
    )
)]
pub async fn create_connect_account(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateConnectAccountRequest>,
) -> AppResult<(StatusCode, Json<Account>)> {
    let account = state.connect_service.create_account(payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Connect account with its onboarding state
#[utoipa::path(
    get,
    path = "/stripe/connect/account/{id}",
    tag = "Connect",
    params(("id" = String, Path, description = "Connect account ID"), OnboardingQuery),
    responses(
        (status = 200, description = "Account", body = ConnectAccountView),
        (status = 404, description = "Account not found")
    )
)]
pub async fn get_connect_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<OnboardingQuery>,
) -> AppResult<Json<ConnectAccountView>> {
    let urls = OnboardingUrls {
        refresh_url: query.refresh_url,
        return_url: query.return_url,
    };
    Ok(Json(state.connect_service.get_account(&id, urls).await?))
}

/// Create an onboarding link
#[utoipa::path(
    post,
    path = "/stripe/connect/account/{id}/link",
    tag = "Connect",
    params(("id" = String, Path, description = "Connect account ID")),
    request_body = OnboardingUrls,
    responses(
        (status = 200, description = "Onboarding link", body = OnboardingLink),
        (status = 400, description = "No return URLs available")
    )
)]
pub async fn create_account_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(urls): ValidatedJson<OnboardingUrls>,
) -> AppResult<Json<OnboardingLink>> {
    Ok(Json(
        state.connect_service.create_account_link(&id, urls).await?,
    ))
}

/// Bank accounts attached to a Connect account
#[utoipa::path(
    get,
    path = "/stripe/connect/account/{id}/external-accounts",
    tag = "Connect",
    params(("id" = String, Path, description = "Connect account ID")),
    responses(
        (status = 200, description = "Bank accounts", body = Vec<BankAccount>),
        (status = 404, description = "Account not found")
    )
)]
pub async fn list_external_accounts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<BankAccount>>> {
    Ok(Json(state.connect_service.list_external_accounts(&id).await?))
}

/// Balance of a Connect account
#[utoipa::path(
    get,
    path = "/stripe/connect/account/{id}/balance",
    tag = "Connect",
    params(("id" = String, Path, description = "Connect account ID")),
    responses((status = 200, description = "Balance", body = Balance))
)]
pub async fn connect_balance(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Balance>> {
    Ok(Json(state.connect_service.balance(&id).await?))
}

/// Move funds from the platform to a Connect account
#[utoipa::path(
    post,
    path = "/stripe/connect/transfer",
    tag = "Connect",
    request_body = CreateTransferRequest,
    responses(
        (status = 201, description = "Transfer created", body = Transfer),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_transfer(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateTransferRequest>,
) -> AppResult<(StatusCode, Json<Transfer>)> {
    let transfer = state.connect_service.create_transfer(payload).await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}

// =============================================================================
// Payouts and bank accounts
// =============================================================================

/// Pay out a Connect account's balance to one of its bank accounts
#[utoipa::path(
    post,
    path = "/stripe/connect/payout",
    tag = "Payouts",
    request_body = CreatePayoutRequest,
    responses(
        (status = 201, description = "Payout created", body = Payout),
        (status = 422, description = "Validation error")
    )
)]
pub async fn create_payout(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreatePayoutRequest>,
) -> AppResult<(StatusCode, Json<Payout>)> {
    let payout = state.connect_service.create_payout(payload).await?;
    Ok((StatusCode::CREATED, Json(payout)))
}

/// Current state of a payout
#[utoipa::path(
    get,
    path = "/stripe/connect/payout/{id}",
    tag = "Payouts",
    params(("id" = String, Path, description = "Payout ID"), ConnectAccountQuery),
    responses((status = 200, description = "Payout", body = Payout))
)]
pub async fn payout_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ConnectAccountQuery>,
) -> AppResult<Json<Payout>> {
    Ok(Json(
        state
            .connect_service
            .payout_status(&id, query.connect_account_id)
            .await?,
    ))
}

/// Recent payouts of a Connect account
#[utoipa::path(
    get,
    path = "/stripe/payouts",
    tag = "Payouts",
    params(PayoutListQuery),
    responses(
        (status = 200, description = "Payouts", body = Vec<Payout>),
        (status = 400, description = "connectAccountId missing")
    )
)]
pub async fn list_payouts(
    State(state): State<AppState>,
    Query(query): Query<PayoutListQuery>,
) -> AppResult<Json<Vec<Payout>>> {
    let account = required(query.connect_account_id, "connectAccountId")?;
    Ok(Json(
        state
            .connect_service
            .list_payouts(&account, query.limit)
            .await?,
    ))
}

/// Balance of a Connect account
#[utoipa::path(
    get,
    path = "/stripe/payouts/balance",
    tag = "Payouts",
    params(ConnectAccountQuery),
    responses(
        (status = 200, description = "Balance", body = Balance),
        (status = 400, description = "connectAccountId missing")
    )
)]
pub async fn payout_balance(
    State(state): State<AppState>,
    Query(query): Query<ConnectAccountQuery>,
) -> AppResult<Json<Balance>> {
    let account = required(query.connect_account_id, "connectAccountId")?;
    Ok(Json(state.connect_service.balance(&account).await?))
}

/// Cancel a pending payout
#[utoipa::path(
    post,
    path = "/stripe/payouts/{id}/cancel",
    tag = "Payouts",
    params(("id" = String, Path, description = "Payout ID"), ConnectAccountQuery),
    responses((status = 200, description = "Canceled payout", body = Payout))
)]
pub async fn cancel_payout(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ConnectAccountQuery>,
) -> AppResult<Json<Payout>> {
    Ok(Json(
        state
            .connect_service
            .cancel_payout(&id, query.connect_account_id)
            .await?,
    ))
}

/// Attach a bank account to a Connect account
#[utoipa::path(
    post,
    path = "/stripe/payouts/add-bank-accounts",
    tag = "Payouts",
    request_body = BankAccountRequest,
    responses(
        (status = 201, description = "Bank account added", body = BankAccount),
        (status = 404, description = "Account not found")
    )
)]
pub async fn add_bank_account(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<BankAccountRequest>,
) -> AppResult<(StatusCode, Json<BankAccount>)> {
    let account = state.connect_service.add_bank_account(payload).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Replace a bank account
#[utoipa::path(
    patch,
    path = "/stripe/payouts/add-bank-accounts",
    tag = "Payouts",
    request_body = UpdateBankAccountRequest,
    responses((status = 200, description = "New bank account", body = BankAccount))
)]
pub async fn update_bank_account(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<UpdateBankAccountRequest>,
) -> AppResult<Json<BankAccount>> {
    Ok(Json(state.connect_service.update_bank_account(payload).await?))
}

/// Remove a bank account
#[utoipa::path(
    delete,
    path = "/stripe/payouts/delete-bank-accounts",
    tag = "Payouts",
    request_body = DeleteBankAccountRequest,
    responses((status = 200, description = "Deleted", body = DeletedResponse))
)]
pub async fn delete_bank_account(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<DeleteBankAccountRequest>,
) -> AppResult<Json<DeletedResponse>> {
    Ok(Json(state.connect_service.delete_bank_account(payload).await?))
}

// =============================================================================
// Webhook
// =============================================================================

/// Receive a Stripe event. The signature covers the raw body.
#[utoipa::path(
    post,
    path = "/stripe/webhook",
    tag = "Webhooks",
    params(("Stripe-Signature" = String, Header, description = "t=<unix>,v1=<hex>")),
    request_body(content = String, content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted", body = WebhookAck),
        (status = 400, description = "Signature verification failed")
    )
)]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    Ok(Json(state.webhook_service.handle(&body, signature)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_blank() {
        assert!(required(None, "customerId").is_err());
        assert!(required(Some("  ".into()), "customerId").is_err());
        assert_eq!(required(Some("cus_1".into()), "customerId").unwrap(), "cus_1");
    }

    #[test]
    fn test_required_message_names_parameter() {
        let err = required(None, "connectAccountId").unwrap_err();
        assert_eq!(err.to_string(), "connectAccountId is required");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
