//! Payment-intent, refund, customer and payment-method calls.

use async_trait::async_trait;

use super::client::{ApiFailure, Form, StripeClient};
use crate::config::STRIPE_LIST_MAX_LIMIT;
use crate::domain::payment::{
    Charge, Customer, List, NewCustomer, NewPaymentIntent, NewRefund, NewTopup, PaymentIntent,
    PaymentMethod, Refund, SetupIntent, Topup,
};
use crate::domain::payment_error::INVALID_REQUEST_ERROR;
use crate::domain::PaymentError;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

pub type PaymentResult<T> = Result<T, PaymentError>;

/// Port for the payment side of the Stripe API.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_intent(&self, params: NewPaymentIntent) -> PaymentResult<PaymentIntent>;

    async fn confirm_payment_intent(
        &self,
        id: &str,
        payment_method: &str,
    ) -> PaymentResult<PaymentIntent>;

    async fn capture_payment_intent(&self, id: &str) -> PaymentResult<PaymentIntent>;

    async fn cancel_payment_intent(&self, id: &str) -> PaymentResult<PaymentIntent>;

    async fn retrieve_payment_intent(&self, id: &str) -> PaymentResult<PaymentIntent>;

    async fn create_refund(&self, params: NewRefund) -> PaymentResult<Refund>;

    async fn list_refunds(&self, payment_intent: &str) -> PaymentResult<Vec<Refund>>;

    async fn list_charges(&self, payment_intent: &str) -> PaymentResult<Vec<Charge>>;

    async fn create_topup(&self, params: NewTopup) -> PaymentResult<Topup>;

    async fn create_setup_intent(&self, customer: &str) -> PaymentResult<SetupIntent>;

    async fn create_customer(&self, params: NewCustomer) -> PaymentResult<Customer>;

    /// First customer registered with the email, if any
    async fn find_customer_by_email(&self, email: &str) -> PaymentResult<Option<Customer>>;

    async fn retrieve_customer(&self, id: &str) -> PaymentResult<Customer>;

    async fn retrieve_payment_method(&self, id: &str) -> PaymentResult<PaymentMethod>;

    async fn attach_payment_method(
        &self,
        payment_method: &str,
        customer: &str,
    ) -> PaymentResult<PaymentMethod>;

    async fn set_default_payment_method(
        &self,
        customer: &str,
        payment_method: &str,
    ) -> PaymentResult<()>;
}

/// Stripe-backed PaymentGateway
#[derive(Clone)]
pub struct StripePayments {
    client: StripeClient,
}

impl StripePayments {
    pub fn new(client: StripeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaymentGateway for StripePayments {
    async fn create_payment_intent(&self, params: NewPaymentIntent) -> PaymentResult<PaymentIntent> {
        let form = Form::new()
            .field("amount", params.amount)
            .field("currency", &params.currency)
            .field("capture_method", "manual")
            .optional("receipt_email", params.receipt_email.as_ref())
            .optional("description", params.description.as_ref())
            .optional("payment_method", params.payment_method.as_ref())
            .optional("customer", params.customer.as_ref())
            .list("payment_method_types", &params.payment_method_types)
            .map("metadata", &params.metadata);

        self.client
            .post("payment_intents", &form, None)
            .await
            .map_err(translate)
    }

    async fn confirm_payment_intent(
        &self,
        id: &str,
        payment_method: &str,
    ) -> PaymentResult<PaymentIntent> {
        let form = Form::new().field("payment_method", payment_method);
        self.client
            .post(&format!("payment_intents/{}/confirm", id), &form, None)
            .await
            .map_err(translate)
    }

    async fn capture_payment_intent(&self, id: &str) -> PaymentResult<PaymentIntent> {
        self.client
            .post(&format!("payment_intents/{}/capture", id), &Form::new(), None)
            .await
            .map_err(translate)
    }

    async fn cancel_payment_intent(&self, id: &str) -> PaymentResult<PaymentIntent> {
        self.client
            .post(&format!("payment_intents/{}/cancel", id), &Form::new(), None)
            .await
            .map_err(translate)
    }

    async fn retrieve_payment_intent(&self, id: &str) -> PaymentResult<PaymentIntent> {
        self.client
            .get(&format!("payment_intents/{}", id), &Form::new(), None)
            .await
            .map_err(translate)
    }

    async fn create_refund(&self, params: NewRefund) -> PaymentResult<Refund> {
        let mut form = Form::new()
            .field("payment_intent", &params.payment_intent)
            .optional("amount", params.amount)
            .optional("reason", params.reason.map(|r| r.as_str()))
            .optional("reverse_transfer", params.reverse_transfer)
            .optional("refund_application_fee", params.refund_application_fee);
        if let Some(metadata) = &params.metadata {
            form = form.map("metadata", metadata);
        }

        self.client
            .post("refunds", &form, None)
            .await
            .map_err(translate)
    }

    async fn list_refunds(&self, payment_intent: &str) -> PaymentResult<Vec<Refund>> {
        let query = Form::new()
            .field("payment_intent", payment_intent)
            .field("limit", STRIPE_LIST_MAX_LIMIT);
        let list: List<Refund> = self
            .client
            .get("refunds", &query, None)
            .await
            .map_err(translate)?;
        Ok(list.data)
    }

    async fn list_charges(&self, payment_intent: &str) -> PaymentResult<Vec<Charge>> {
        let query = Form::new()
            .field("payment_intent", payment_intent)
            .field("limit", STRIPE_LIST_MAX_LIMIT);
        let list: List<Charge> = self
            .client
            .get("charges", &query, None)
            .await
            .map_err(translate)?;
        Ok(list.data)
    }

    async fn create_topup(&self, params: NewTopup) -> PaymentResult<Topup> {
        let form = Form::new()
            .field("amount", params.amount)
            .field("currency", &params.currency)
            .optional("source", params.source.as_ref())
            .optional("description", params.description.as_ref())
            .map("metadata", &params.metadata);

        self.client
            .post("topups", &form, None)
            .await
            .map_err(translate)
    }

    async fn create_setup_intent(&self, customer: &str) -> PaymentResult<SetupIntent> {
        let form = Form::new()
            .field("customer", customer)
            .field("usage", "off_session");
        self.client
            .post("setup_intents", &form, None)
            .await
            .map_err(translate)
    }

    async fn create_customer(&self, params: NewCustomer) -> PaymentResult<Customer> {
        let form = Form::new()
            .field("email", &params.email)
            .optional("name", params.name.as_ref())
            .map("metadata", &params.metadata);
        self.client
            .post("customers", &form, None)
            .await
            .map_err(translate)
    }

    async fn find_customer_by_email(&self, email: &str) -> PaymentResult<Option<Customer>> {
        let query = Form::new().field("email", email).field("limit", 1);
        let list: List<Customer> = self
            .client
            .get("customers", &query, None)
            .await
            .map_err(translate)?;
        Ok(list.data.into_iter().next())
    }

    async fn retrieve_customer(&self, id: &str) -> PaymentResult<Customer> {
        self.client
            .get(&format!("customers/{}", id), &Form::new(), None)
            .await
            .map_err(translate)
    }

    async fn retrieve_payment_method(&self, id: &str) -> PaymentResult<PaymentMethod> {
        self.client
            .get(&format!("payment_methods/{}", id), &Form::new(), None)
            .await
            .map_err(translate)
    }

    async fn attach_payment_method(
        &self,
        payment_method: &str,
        customer: &str,
    ) -> PaymentResult<PaymentMethod> {
        let form = Form::new().field("customer", customer);
        self.client
            .post(&format!("payment_methods/{}/attach", payment_method), &form, None)
            .await
            .map_err(translate)
    }

    async fn set_default_payment_method(
        &self,
        customer: &str,
        payment_method: &str,
    ) -> PaymentResult<()> {
        let form = Form::new().field("invoice_settings[default_payment_method]", payment_method);
        let _: Customer = self
            .client
            .post(&format!("customers/{}", customer), &form, None)
            .await
            .map_err(translate)?;
        Ok(())
    }
}

/// Map a Stripe failure onto the payment error vocabulary.
pub(crate) fn translate(failure: ApiFailure) -> PaymentError {
    if failure.is_resource_missing() {
        let target = failure.param.clone().unwrap_or_default();
        if failure.message.contains("payment_intent") {
            return PaymentError::PaymentIntentNotFound(target);
        }
        if failure.message.contains("customer") {
            return PaymentError::CustomerNotFound(target);
        }
    }

    match failure.kind.as_str() {
        INVALID_REQUEST_ERROR => PaymentError::InvalidRequest {
            message: failure.message,
            code: failure.code,
        },
        _ => PaymentError::Payment {
            message: failure.message,
            code: failure.code,
            kind: Some(failure.kind),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment_error::CARD_ERROR;

    fn failure(kind: &str, code: Option<&str>, message: &str) -> ApiFailure {
        ApiFailure {
            status: Some(400),
            kind: kind.to_string(),
            code: code.map(str::to_string),
            message: message.to_string(),
            param: Some("id".to_string()),
        }
    }

    #[test]
    fn test_missing_payment_intent() {
        let err = translate(failure(
            INVALID_REQUEST_ERROR,
            Some("resource_missing"),
            "No such payment_intent: 'pi_1'",
        ));
        assert_eq!(err, PaymentError::PaymentIntentNotFound("id".into()));
    }

    #[test]
    fn test_missing_customer() {
        let err = translate(failure(
            INVALID_REQUEST_ERROR,
            Some("resource_missing"),
            "No such customer: 'cus_1'",
        ));
        assert_eq!(err, PaymentError::CustomerNotFound("id".into()));
    }

    #[test]
    fn test_invalid_request() {
        let err = translate(failure(
            INVALID_REQUEST_ERROR,
            Some("parameter_invalid_integer"),
            "Invalid integer",
        ));
        assert_eq!(
            err,
            PaymentError::InvalidRequest {
                message: "Invalid integer".into(),
                code: Some("parameter_invalid_integer".into()),
            }
        );
    }

    #[test]
    fn test_card_error() {
        let err = translate(failure(CARD_ERROR, Some("card_declined"), "Your card was declined."));
        assert!(err.is_card_error());
        assert_eq!(err.code(), "card_declined");
    }

    #[test]
    fn test_other_errors_keep_type() {
        let err = translate(failure("api_error", None, "Something went wrong"));
        assert_eq!(
            err,
            PaymentError::Payment {
                message: "Something went wrong".into(),
                code: None,
                kind: Some("api_error".into()),
            }
        );
    }
}
