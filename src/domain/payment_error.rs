//! Payment provider failures, translated into the application's vocabulary.

use thiserror::Error;

/// Stripe error type string for declined cards
pub const CARD_ERROR: &str = "card_error";
/// Stripe error type string for malformed requests
pub const INVALID_REQUEST_ERROR: &str = "invalid_request_error";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Generic payment failure; `kind` carries Stripe's error type
    #[error("{message}")]
    Payment {
        message: String,
        code: Option<String>,
        kind: Option<String>,
    },

    #[error("{message}")]
    InvalidRequest {
        message: String,
        code: Option<String>,
    },

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Payment intent not found: {0}")]
    PaymentIntentNotFound(String),

    /// Failure from a Connect (marketplace) operation
    #[error("{message}")]
    Connect {
        message: String,
        code: Option<String>,
        kind: Option<String>,
    },

    #[error("Connect account not found: {0}")]
    ConnectAccountNotFound(String),

    #[error("Webhook verification failed: {0}")]
    WebhookVerification(String),

    #[error("Unexpected payment status: {0}")]
    UnexpectedStatus(String),
}

impl PaymentError {
    /// Machine-readable code for API clients. Stripe's own code wins when present.
    pub fn code(&self) -> String {
        match self {
            PaymentError::Payment { code, .. } => {
                code.clone().unwrap_or_else(|| "PAYMENT_ERROR".to_string())
            }
            PaymentError::InvalidRequest { code, .. } => {
                code.clone().unwrap_or_else(|| "INVALID_REQUEST".to_string())
            }
            PaymentError::CustomerNotFound(_) => "CUSTOMER_NOT_FOUND".to_string(),
            PaymentError::PaymentIntentNotFound(_) => "PAYMENT_INTENT_NOT_FOUND".to_string(),
            PaymentError::Connect { code, .. } => {
                code.clone().unwrap_or_else(|| "CONNECT_ERROR".to_string())
            }
            PaymentError::ConnectAccountNotFound(_) => "ACCOUNT_NOT_FOUND".to_string(),
            PaymentError::WebhookVerification(_) => "WEBHOOK_VERIFICATION_FAILED".to_string(),
            PaymentError::UnexpectedStatus(_) => "UNEXPECTED_PAYMENT_STATUS".to_string(),
        }
    }

    /// Declined card
    pub fn is_card_error(&self) -> bool {
        matches!(self, PaymentError::Payment { kind: Some(kind), .. } if kind == CARD_ERROR)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PaymentError::CustomerNotFound(_)
                | PaymentError::PaymentIntentNotFound(_)
                | PaymentError::ConnectAccountNotFound(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_prefer_stripe_code() {
        let err = PaymentError::Payment {
            message: "declined".into(),
            code: Some("card_declined".into()),
            kind: Some(CARD_ERROR.into()),
        };
        assert_eq!(err.code(), "card_declined");
        assert!(err.is_card_error());

        let err = PaymentError::InvalidRequest {
            message: "bad".into(),
            code: None,
        };
        assert_eq!(err.code(), "INVALID_REQUEST");
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            PaymentError::CustomerNotFound("cus_1".into()).to_string(),
            "Customer not found: cus_1"
        );
        assert_eq!(
            PaymentError::WebhookVerification("bad signature".into()).to_string(),
            "Webhook verification failed: bad signature"
        );
        assert!(PaymentError::ConnectAccountNotFound("acct_1".into()).is_not_found());
    }
}
