//! Payment service - payment intents, refunds, top-ups, customers and
//! saved payment methods.
//!
//! Request amounts are dollars and are converted to cents here, before
//! anything reaches the gateway.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::config::STRIPE_CUSTOMER_PREFIX;
use crate::domain::payment::{
    CardDetails, Charge, NewCustomer, NewPaymentIntent, NewRefund, NewTopup, PaymentIntent,
    Refund, RefundReason, Topup,
};
use crate::domain::{to_minor_units, PaymentError};
use crate::errors::AppResult;
use crate::infra::PaymentGateway;

const DEFAULT_PAYMENT_METHOD_TYPE: &str = "card";
const NEW_CUSTOMER_NOTE: &str = "New customer created";

// =============================================================================
// Request DTOs
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentIntentRequest {
    /// Amount in dollars
    #[validate(range(min = 0.01, message = "Amount must be positive"))]
    #[schema(example = 49.99)]
    pub amount: f64,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    #[schema(example = "usd")]
    pub currency: String,
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "customer@example.com")]
    pub customer_email: Option<String>,
    pub description: Option<String>,
    #[schema(example = "pm_card_visa")]
    pub payment_method_id: Option<String>,
    #[schema(example = "cus_123")]
    pub customer_id: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
    pub payment_method_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentIntentRequest {
    #[validate(length(min = 1, message = "Payment method is required"))]
    #[schema(example = "pm_card_visa")]
    pub payment_method_id: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    /// Partial amount in dollars. Omit for a full refund.
    #[validate(range(min = 0.01, message = "Amount must be positive"))]
    pub amount: Option<f64>,
    pub reason: Option<RefundReason>,
    pub metadata: Option<HashMap<String, String>>,
    pub reverse_transfer: Option<bool>,
    pub refund_application_fee: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkRefundRequest {
    #[validate(length(min = 1, message = "At least one payment intent is required"))]
    pub payment_intent_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopupRequest {
    /// Amount in dollars
    #[validate(range(min = 1.0, message = "Top-up amount must be at least 1"))]
    #[schema(example = 100.0)]
    pub amount: f64,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: String,
    pub source: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SetupIntentRequest {
    #[validate(length(min = 1, message = "Customer id is required"))]
    #[schema(example = "cus_123")]
    pub customer_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavePaymentMethodRequest {
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method_id: String,
    #[validate(length(min = 1, message = "Customer id is required"))]
    pub customer_id: String,
    /// Defaults to true
    pub set_as_default: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "customer@example.com")]
    pub email: String,
    pub name: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClientSecret {
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedPayment {
    pub status: String,
    pub payment_intent: PaymentIntent,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub reason: Option<String>,
    pub receipt_number: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl From<Refund> for RefundResponse {
    fn from(refund: Refund) -> Self {
        Self {
            id: refund.id,
            amount: refund.amount,
            currency: refund.currency,
            status: refund.status.unwrap_or_else(|| "pending".to_string()),
            reason: refund.reason,
            receipt_number: refund.receipt_number,
            metadata: refund.metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkRefundSuccess {
    pub payment_intent_id: String,
    pub status: String,
    pub refund_amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkRefundFailure {
    pub payment_intent_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct BulkRefundReport {
    pub results: Vec<BulkRefundSuccess>,
    pub errors: Vec<BulkRefundFailure>,
}

/// Refund totals for one payment intent, in cents
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RefundSummary {
    pub total_captured: i64,
    pub total_refunded: i64,
    pub refundable_remaining: i64,
    pub currency: String,
    pub is_fully_refunded: bool,
    pub is_partially_refunded: bool,
    pub refunds: Vec<Refund>,
}

impl RefundSummary {
    pub fn new(captured: i64, currency: String, refunds: Vec<Refund>) -> Self {
        let refunded: i64 = refunds.iter().map(|r| r.amount).sum();
        Self {
            total_captured: captured,
            total_refunded: refunded,
            refundable_remaining: (captured - refunded).max(0),
            currency,
            is_fully_refunded: captured > 0 && refunded >= captured,
            is_partially_refunded: refunded > 0 && refunded < captured,
            refunds,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentIntentStatus {
    #[serde(flatten)]
    pub intent: PaymentIntent,
    pub charges: Vec<Charge>,
    pub refund_summary: RefundSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SavedPaymentMethod {
    pub success: bool,
    pub payment_method_id: String,
    pub customer_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerIdResponse {
    #[schema(example = "cus_123")]
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DefaultPaymentMethod {
    pub payment_method_id: String,
    pub customer_id: String,
    pub card: CardDetails,
}

// =============================================================================
// Service
// =============================================================================

#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Manual-capture payment intent; returns its client secret
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> AppResult<ClientSecret>;

    async fn confirm_payment_intent(
        &self,
        id: &str,
        payment_method_id: &str,
    ) -> AppResult<ConfirmedPayment>;

    async fn capture_payment(&self, id: &str) -> AppResult<PaymentIntent>;

    async fn cancel_payment(&self, id: &str) -> AppResult<PaymentIntent>;

    async fn refund_payment(&self, id: &str, request: RefundRequest) -> AppResult<RefundResponse>;

    /// Full refunds, one after another. Failures are collected, not raised.
    async fn bulk_refund(&self, payment_intent_ids: Vec<String>) -> AppResult<BulkRefundReport>;

    async fn payment_intent_status(&self, id: &str) -> AppResult<PaymentIntentStatus>;

    async fn create_topup(&self, request: CreateTopupRequest) -> AppResult<Topup>;

    /// Off-session setup intent for saving a card
    async fn create_setup_intent(&self, customer_id: &str) -> AppResult<ClientSecret>;

    async fn save_payment_method(
        &self,
        request: SavePaymentMethodRequest,
    ) -> AppResult<SavedPaymentMethod>;

    async fn create_customer(&self, request: CreateCustomerRequest) -> AppResult<CustomerIdResponse>;

    async fn customer_id_by_email(&self, email: &str) -> AppResult<CustomerIdResponse>;

    async fn default_payment_method(
        &self,
        customer_id: &str,
    ) -> AppResult<Option<DefaultPaymentMethod>>;
}

/// Concrete implementation of PaymentService over a PaymentGateway.
pub struct PaymentManager {
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentManager {
    pub fn new(gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { gateway }
    }
}

/// Only real Stripe customer ids are forwarded
fn stripe_customer(customer_id: Option<String>) -> Option<String> {
    customer_id.filter(|id| id.starts_with(STRIPE_CUSTOMER_PREFIX))
}

#[async_trait]
impl PaymentService for PaymentManager {
    async fn create_payment_intent(
        &self,
        request: CreatePaymentIntentRequest,
    ) -> AppResult<ClientSecret> {
        let payment_method_types = request
            .payment_method_types
            .filter(|types| !types.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_PAYMENT_METHOD_TYPE.to_string()]);

        let intent = self
            .gateway
            .create_payment_intent(NewPaymentIntent {
                amount: to_minor_units(request.amount),
                currency: request.currency.to_lowercase(),
                receipt_email: request.customer_email,
                description: request.description,
                metadata: request.metadata.unwrap_or_default(),
                payment_method: request.payment_method_id,
                customer: stripe_customer(request.customer_id),
                payment_method_types,
            })
            .await?;

        tracing::info!(payment_intent = %intent.id, amount = intent.amount, "Payment intent created");
        Ok(ClientSecret {
            client_secret: intent.client_secret,
        })
    }

    async fn confirm_payment_intent(
        &self,
        id: &str,
        payment_method_id: &str,
    ) -> AppResult<ConfirmedPayment> {
        let intent = self
            .gateway
            .confirm_payment_intent(id, payment_method_id)
            .await?;

        let message = match intent.status.as_str() {
            PaymentIntent::REQUIRES_CAPTURE => "Payment authorized, awaiting capture.",
            PaymentIntent::SUCCEEDED => "Payment succeeded.",
            other => return Err(PaymentError::UnexpectedStatus(other.to_string()).into()),
        };

        Ok(ConfirmedPayment {
            status: intent.status.clone(),
            payment_intent: intent,
            message: message.to_string(),
        })
    }

    async fn capture_payment(&self, id: &str) -> AppResult<PaymentIntent> {
        let intent = self.gateway.capture_payment_intent(id).await?;
        tracing::info!(payment_intent = %intent.id, "Payment captured");
        Ok(intent)
    }

    async fn cancel_payment(&self, id: &str) -> AppResult<PaymentIntent> {
        Ok(self.gateway.cancel_payment_intent(id).await?)
    }

    async fn refund_payment(&self, id: &str, request: RefundRequest) -> AppResult<RefundResponse> {
        let refund = self
            .gateway
            .create_refund(NewRefund {
                payment_intent: id.to_string(),
                amount: request.amount.map(to_minor_units),
                reason: request.reason,
                metadata: request.metadata,
                reverse_transfer: request.reverse_transfer,
                refund_application_fee: request.refund_application_fee,
            })
            .await?;

        tracing::info!(payment_intent = %id, refund = %refund.id, amount = refund.amount, "Refund created");
        Ok(refund.into())
    }

    async fn bulk_refund(&self, payment_intent_ids: Vec<String>) -> AppResult<BulkRefundReport> {
        let mut report = BulkRefundReport::default();

        for payment_intent_id in payment_intent_ids {
            let params = NewRefund {
                payment_intent: payment_intent_id.clone(),
                ..NewRefund::default()
            };
            match self.gateway.create_refund(params).await {
                Ok(refund) => report.results.push(BulkRefundSuccess {
                    payment_intent_id,
                    status: "succeeded".to_string(),
                    refund_amount: refund.amount,
                    currency: refund.currency,
                }),
                Err(e) => {
                    tracing::warn!(payment_intent = %payment_intent_id, error = %e, "Bulk refund item failed");
                    report.errors.push(BulkRefundFailure {
                        payment_intent_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(report)
    }

    async fn payment_intent_status(&self, id: &str) -> AppResult<PaymentIntentStatus> {
        let intent = self.gateway.retrieve_payment_intent(id).await?;
        let (refunds, charges) =
            tokio::try_join!(self.gateway.list_refunds(id), self.gateway.list_charges(id))?;

        let refund_summary =
            RefundSummary::new(intent.amount_received, intent.currency.clone(), refunds);

        Ok(PaymentIntentStatus {
            intent,
            charges,
            refund_summary,
        })
    }

    async fn create_topup(&self, request: CreateTopupRequest) -> AppResult<Topup> {
        let topup = self
            .gateway
            .create_topup(NewTopup {
                amount: to_minor_units(request.amount),
                currency: request.currency.to_lowercase(),
                source: request.source,
                description: request.description,
                metadata: request.metadata.unwrap_or_default(),
            })
            .await?;
        Ok(topup)
    }

    async fn create_setup_intent(&self, customer_id: &str) -> AppResult<ClientSecret> {
        let intent = self.gateway.create_setup_intent(customer_id).await?;
        Ok(ClientSecret {
            client_secret: intent.client_secret,
        })
    }

    async fn save_payment_method(
        &self,
        request: SavePaymentMethodRequest,
    ) -> AppResult<SavedPaymentMethod> {
        self.gateway
            .attach_payment_method(&request.payment_method_id, &request.customer_id)
            .await?;

        if request.set_as_default.unwrap_or(true) {
            self.gateway
                .set_default_payment_method(&request.customer_id, &request.payment_method_id)
                .await?;
        }

        Ok(SavedPaymentMethod {
            success: true,
            payment_method_id: request.payment_method_id,
            customer_id: request.customer_id,
        })
    }

    async fn create_customer(&self, request: CreateCustomerRequest) -> AppResult<CustomerIdResponse> {
        let mut metadata = request.metadata.unwrap_or_default();
        metadata
            .entry("notes".to_string())
            .or_insert_with(|| NEW_CUSTOMER_NOTE.to_string());

        let customer = self
            .gateway
            .create_customer(NewCustomer {
                email: request.email,
                name: request.name,
                metadata,
            })
            .await?;

        tracing::info!(customer = %customer.id, "Customer created");
        Ok(CustomerIdResponse {
            customer_id: Some(customer.id),
        })
    }

    async fn customer_id_by_email(&self, email: &str) -> AppResult<CustomerIdResponse> {
        let customer = self.gateway.find_customer_by_email(email).await?;
        Ok(CustomerIdResponse {
            customer_id: customer.map(|c| c.id),
        })
    }

    async fn default_payment_method(
        &self,
        customer_id: &str,
    ) -> AppResult<Option<DefaultPaymentMethod>> {
        let customer = self.gateway.retrieve_customer(customer_id).await?;
        if customer.deleted {
            return Err(PaymentError::CustomerNotFound(customer_id.to_string()).into());
        }

        let Some(payment_method_id) = customer.invoice_settings.default_payment_method else {
            return Ok(None);
        };

        let payment_method = self.gateway.retrieve_payment_method(&payment_method_id).await?;
        Ok(payment_method.card.map(|card| DefaultPaymentMethod {
            payment_method_id: payment_method.id,
            customer_id: customer_id.to_string(),
            card,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Customer, InvoiceSettings, PaymentMethod};
    use crate::errors::AppError;
    use crate::infra::MockPaymentGateway;
    use mockall::predicate::*;

    fn intent(id: &str, status: &str) -> PaymentIntent {
        PaymentIntent {
            id: id.to_string(),
            amount: 4999,
            amount_capturable: 0,
            amount_received: 0,
            currency: "usd".into(),
            status: status.to_string(),
            capture_method: Some("manual".into()),
            confirmation_method: None,
            client_secret: Some(format!("{}_secret_abc", id)),
            created: 0,
            description: None,
            customer: None,
            receipt_email: None,
            payment_method: None,
            payment_method_types: vec!["card".into()],
            metadata: HashMap::new(),
        }
    }

    fn refund(id: &str, amount: i64) -> Refund {
        Refund {
            id: id.to_string(),
            amount,
            currency: "usd".into(),
            status: Some("succeeded".into()),
            reason: None,
            receipt_number: None,
            charge: Some("ch_1".into()),
            created: 0,
            metadata: HashMap::new(),
        }
    }

    fn intent_request(amount: f64, customer_id: Option<&str>) -> CreatePaymentIntentRequest {
        CreatePaymentIntentRequest {
            amount,
            currency: "USD".into(),
            customer_email: Some("customer@example.com".into()),
            description: None,
            payment_method_id: None,
            customer_id: customer_id.map(String::from),
            metadata: None,
            payment_method_types: None,
        }
    }

    #[tokio::test]
    async fn test_create_payment_intent_converts_dollars() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_intent()
            .withf(|params| {
                params.amount == 1999
                    && params.currency == "usd"
                    && params.payment_method_types == vec!["card".to_string()]
                    && params.customer.as_deref() == Some("cus_123")
                    && params.receipt_email.as_deref() == Some("customer@example.com")
            })
            .returning(|_| Ok(intent("pi_1", "requires_payment_method")));

        let service = PaymentManager::new(Arc::new(gateway));
        let secret = service
            .create_payment_intent(intent_request(19.99, Some("cus_123")))
            .await
            .unwrap();

        assert_eq!(secret.client_secret.as_deref(), Some("pi_1_secret_abc"));
    }

    #[tokio::test]
    async fn test_non_stripe_customer_id_is_dropped() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_payment_intent()
            .withf(|params| params.customer.is_none() && params.amount == 1001)
            .returning(|_| Ok(intent("pi_1", "requires_payment_method")));

        let service = PaymentManager::new(Arc::new(gateway));
        service
            .create_payment_intent(intent_request(10.01, Some("user-42")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_confirm_requires_capture_message() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_confirm_payment_intent()
            .with(eq("pi_1"), eq("pm_card_visa"))
            .returning(|id, _| Ok(intent(id, "requires_capture")));

        let service = PaymentManager::new(Arc::new(gateway));
        let confirmed = service
            .confirm_payment_intent("pi_1", "pm_card_visa")
            .await
            .unwrap();

        assert_eq!(confirmed.status, "requires_capture");
        assert_eq!(confirmed.message, "Payment authorized, awaiting capture.");
    }

    #[tokio::test]
    async fn test_confirm_unexpected_status() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_confirm_payment_intent()
            .returning(|id, _| Ok(intent(id, "requires_action")));

        let service = PaymentManager::new(Arc::new(gateway));
        let result = service.confirm_payment_intent("pi_1", "pm_1").await;

        assert!(matches!(
            result,
            Err(AppError::Payment(PaymentError::UnexpectedStatus(status))) if status == "requires_action"
        ));
    }

    #[tokio::test]
    async fn test_refund_defaults_pending_status() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_refund()
            .withf(|params| params.payment_intent == "pi_1" && params.amount == Some(250))
            .returning(|_| {
                let mut r = refund("re_1", 250);
                r.status = None;
                Ok(r)
            });

        let service = PaymentManager::new(Arc::new(gateway));
        let response = service
            .refund_payment(
                "pi_1",
                RefundRequest {
                    amount: Some(2.5),
                    ..RefundRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(response.status, "pending");
        assert_eq!(response.amount, 250);
    }

    #[tokio::test]
    async fn test_bulk_refund_splits_results_and_errors() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_refund()
            .withf(|params| params.payment_intent == "pi_ok" && params.amount.is_none())
            .returning(|_| Ok(refund("re_1", 1500)));
        gateway
            .expect_create_refund()
            .withf(|params| params.payment_intent == "pi_bad")
            .returning(|_| Err(PaymentError::PaymentIntentNotFound("pi_bad".into())));

        let service = PaymentManager::new(Arc::new(gateway));
        let report = service
            .bulk_refund(vec!["pi_ok".into(), "pi_bad".into()])
            .await
            .unwrap();

        assert_eq!(
            report.results,
            vec![BulkRefundSuccess {
                payment_intent_id: "pi_ok".into(),
                status: "succeeded".into(),
                refund_amount: 1500,
                currency: "usd".into(),
            }]
        );
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].payment_intent_id, "pi_bad");
        assert_eq!(report.errors[0].error, "Payment intent not found: pi_bad");
    }

    #[test]
    fn test_refund_summary_partial() {
        let summary = RefundSummary::new(
            10_000,
            "usd".into(),
            vec![refund("re_1", 2_000), refund("re_2", 3_000)],
        );
        assert_eq!(summary.total_refunded, 5_000);
        assert_eq!(summary.refundable_remaining, 5_000);
        assert!(summary.is_partially_refunded);
        assert!(!summary.is_fully_refunded);
    }

    #[test]
    fn test_refund_summary_full_and_over() {
        let summary = RefundSummary::new(1_000, "usd".into(), vec![refund("re_1", 1_200)]);
        assert_eq!(summary.refundable_remaining, 0);
        assert!(summary.is_fully_refunded);
        assert!(!summary.is_partially_refunded);
    }

    #[test]
    fn test_refund_summary_nothing_captured() {
        let summary = RefundSummary::new(0, "usd".into(), vec![]);
        assert!(!summary.is_fully_refunded);
        assert!(!summary.is_partially_refunded);
        assert_eq!(summary.refundable_remaining, 0);
    }

    #[tokio::test]
    async fn test_payment_intent_status_combines_lists() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_retrieve_payment_intent().returning(|id| {
            let mut pi = intent(id, "succeeded");
            pi.amount_received = 4999;
            Ok(pi)
        });
        gateway
            .expect_list_refunds()
            .returning(|_| Ok(vec![refund("re_1", 999)]));
        gateway.expect_list_charges().returning(|_| Ok(vec![]));

        let service = PaymentManager::new(Arc::new(gateway));
        let status = service.payment_intent_status("pi_1").await.unwrap();

        assert_eq!(status.intent.id, "pi_1");
        assert_eq!(status.refund_summary.refundable_remaining, 4000);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["id"], "pi_1");
        assert_eq!(json["refund_summary"]["total_refunded"], 999);
        assert!(json.get("client_secret").is_none());
    }

    #[tokio::test]
    async fn test_save_payment_method_sets_default_unless_disabled() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_attach_payment_method().times(2).returning(|pm, customer| {
            Ok(PaymentMethod {
                id: pm.to_string(),
                customer: Some(customer.to_string()),
                card: None,
            })
        });
        gateway
            .expect_set_default_payment_method()
            .with(eq("cus_1"), eq("pm_1"))
            .times(1)
            .returning(|_, _| Ok(()));

        let service = PaymentManager::new(Arc::new(gateway));
        let saved = service
            .save_payment_method(SavePaymentMethodRequest {
                payment_method_id: "pm_1".into(),
                customer_id: "cus_1".into(),
                set_as_default: None,
            })
            .await
            .unwrap();
        assert!(saved.success);

        service
            .save_payment_method(SavePaymentMethodRequest {
                payment_method_id: "pm_2".into(),
                customer_id: "cus_1".into(),
                set_as_default: Some(false),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_customer_adds_note() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_customer()
            .withf(|params| {
                params.email == "customer@example.com"
                    && params.metadata.get("notes").map(String::as_str) == Some("New customer created")
            })
            .returning(|params| {
                Ok(Customer {
                    id: "cus_new".into(),
                    deleted: false,
                    email: Some(params.email),
                    invoice_settings: InvoiceSettings::default(),
                })
            });

        let service = PaymentManager::new(Arc::new(gateway));
        let response = service
            .create_customer(CreateCustomerRequest {
                email: "customer@example.com".into(),
                name: None,
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(response.customer_id.as_deref(), Some("cus_new"));
    }

    #[tokio::test]
    async fn test_customer_id_by_email_none() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_find_customer_by_email()
            .returning(|_| Ok(None));

        let service = PaymentManager::new(Arc::new(gateway));
        let response = service.customer_id_by_email("nobody@example.com").await.unwrap();
        assert_eq!(response.customer_id, None);
    }

    #[tokio::test]
    async fn test_default_payment_method_for_deleted_customer() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_retrieve_customer().returning(|id| {
            Ok(Customer {
                id: id.to_string(),
                deleted: true,
                email: None,
                invoice_settings: InvoiceSettings::default(),
            })
        });

        let service = PaymentManager::new(Arc::new(gateway));
        let result = service.default_payment_method("cus_gone").await;
        assert!(matches!(
            result,
            Err(AppError::Payment(PaymentError::CustomerNotFound(id))) if id == "cus_gone"
        ));
    }

    #[tokio::test]
    async fn test_default_payment_method_card_details() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_retrieve_customer().returning(|id| {
            Ok(Customer {
                id: id.to_string(),
                deleted: false,
                email: None,
                invoice_settings: InvoiceSettings {
                    default_payment_method: Some("pm_1".into()),
                },
            })
        });
        gateway.expect_retrieve_payment_method().returning(|id| {
            Ok(PaymentMethod {
                id: id.to_string(),
                customer: Some("cus_1".into()),
                card: Some(CardDetails {
                    brand: "visa".into(),
                    last4: "4242".into(),
                    exp_month: 12,
                    exp_year: 2030,
                }),
            })
        });

        let service = PaymentManager::new(Arc::new(gateway));
        let method = service.default_payment_method("cus_1").await.unwrap().unwrap();
        assert_eq!(method.payment_method_id, "pm_1");
        assert_eq!(method.card.last4, "4242");
    }

    #[tokio::test]
    async fn test_default_payment_method_absent() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_retrieve_customer().returning(|id| {
            Ok(Customer {
                id: id.to_string(),
                deleted: false,
                email: None,
                invoice_settings: InvoiceSettings::default(),
            })
        });
        gateway.expect_retrieve_payment_method().never();

        let service = PaymentManager::new(Arc::new(gateway));
        assert_eq!(service.default_payment_method("cus_1").await.unwrap(), None);
    }
}
