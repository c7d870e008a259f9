//! Stripe objects and request parameters.
//!
//! Objects mirror Stripe's JSON (snake_case) and are returned to clients as
//! Stripe sent them. Only the fields the API exposes are modelled.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

pub type Metadata = HashMap<String, String>;

/// Paginated Stripe list envelope
#[derive(Debug, Clone, Deserialize)]
pub struct List<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_capturable: i64,
    #[serde(default)]
    pub amount_received: i64,
    pub currency: String,
    pub status: String,
    pub capture_method: Option<String>,
    pub confirmation_method: Option<String>,
    #[serde(default, skip_serializing)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub created: i64,
    pub description: Option<String>,
    pub customer: Option<String>,
    pub receipt_email: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub payment_method_types: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentIntent {
    /// Authorized but not yet captured
    pub const REQUIRES_CAPTURE: &'static str = "requires_capture";
    pub const SUCCEEDED: &'static str = "succeeded";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Refund {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: Option<String>,
    pub reason: Option<String>,
    pub receipt_number: Option<String>,
    pub charge: Option<String>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Charge {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub captured: bool,
    #[serde(default)]
    pub paid: bool,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub created: i64,
    pub description: Option<String>,
    pub failure_code: Option<String>,
    pub failure_message: Option<String>,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Topup {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub description: Option<String>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InvoiceSettings {
    pub default_payment_method: Option<String>,
}

/// Customer, or the tombstone Stripe returns for a deleted one
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
    pub email: Option<String>,
    #[serde(default)]
    pub invoice_settings: InvoiceSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CardDetails {
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub customer: Option<String>,
    pub card: Option<CardDetails>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetupIntent {
    pub id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: String,
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub details_submitted: bool,
    #[schema(value_type = Object)]
    pub business_profile: Option<serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Account {
    /// Onboarding is outstanding until details are submitted and both
    /// charges and payouts are enabled.
    pub fn needs_onboarding(&self) -> bool {
        !self.details_submitted || !self.charges_enabled || !self.payouts_enabled
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountLink {
    pub url: String,
    #[serde(default)]
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BankAccount {
    pub id: String,
    #[serde(default)]
    pub last4: String,
    pub status: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub bank_name: Option<String>,
    pub routing_number: Option<String>,
    pub account_holder_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transfer {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub destination: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Payout {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub arrival_date: i64,
    pub destination: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BalanceAmount {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Balance {
    #[serde(default)]
    pub available: Vec<BalanceAmount>,
    #[serde(default)]
    pub pending: Vec<BalanceAmount>,
}

/// Webhook event envelope
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Reasons Stripe accepts for a refund
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    Duplicate,
    Fraudulent,
    RequestedByCustomer,
}

impl RefundReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundReason::Duplicate => "duplicate",
            RefundReason::Fraudulent => "fraudulent",
            RefundReason::RequestedByCustomer => "requested_by_customer",
        }
    }
}

// =============================================================================
// Request parameters (amounts already in minor units)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPaymentIntent {
    pub amount: i64,
    pub currency: String,
    pub receipt_email: Option<String>,
    pub description: Option<String>,
    pub metadata: Metadata,
    pub payment_method: Option<String>,
    pub customer: Option<String>,
    pub payment_method_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewRefund {
    pub payment_intent: String,
    pub amount: Option<i64>,
    pub reason: Option<RefundReason>,
    pub metadata: Option<Metadata>,
    pub reverse_transfer: Option<bool>,
    pub refund_application_fee: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTopup {
    pub amount: i64,
    pub currency: String,
    pub source: Option<String>,
    pub description: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewCustomer {
    pub email: String,
    pub name: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewConnectAccount {
    pub account_type: String,
    pub country: String,
    pub email: String,
    pub business_name: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewAccountLink {
    pub account: String,
    pub refresh_url: String,
    pub return_url: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBankAccount {
    pub connect_account_id: String,
    pub account_number: String,
    pub routing_number: String,
    pub account_holder_name: String,
    pub country: String,
    pub currency: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTransfer {
    pub amount: i64,
    pub currency: String,
    pub destination: String,
    pub description: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPayout {
    pub connect_account_id: String,
    pub amount: i64,
    pub currency: String,
    pub destination: String,
    pub description: Option<String>,
    pub metadata: Metadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(details: bool, charges: bool, payouts: bool) -> Account {
        Account {
            id: "acct_1".into(),
            country: Some("US".into()),
            account_type: Some("express".into()),
            email: None,
            charges_enabled: charges,
            payouts_enabled: payouts,
            details_submitted: details,
            business_profile: None,
            metadata: Metadata::new(),
        }
    }

    #[test]
    fn test_needs_onboarding() {
        assert!(!account(true, true, true).needs_onboarding());
        assert!(account(false, true, true).needs_onboarding());
        assert!(account(true, false, true).needs_onboarding());
        assert!(account(true, true, false).needs_onboarding());
    }

    #[test]
    fn test_deleted_customer_tombstone_parses() {
        let json = r#"{"id":"cus_1","object":"customer","deleted":true}"#;
        let customer: Customer = serde_json::from_str(json).unwrap();
        assert!(customer.deleted);
        assert_eq!(customer.invoice_settings.default_payment_method, None);
    }

    #[test]
    fn test_refund_reason_wire_format() {
        let reason: RefundReason = serde_json::from_str("\"requested_by_customer\"").unwrap();
        assert_eq!(reason, RefundReason::RequestedByCustomer);
        assert_eq!(reason.as_str(), "requested_by_customer");
    }
}
