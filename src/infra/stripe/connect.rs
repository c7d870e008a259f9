//! Connect accounts, bank accounts, transfers and payouts.

use async_trait::async_trait;

use super::client::{ApiFailure, Form, StripeClient};
use crate::domain::payment::{
    Account, AccountLink, Balance, BankAccount, List, NewAccountLink, NewBankAccount,
    NewConnectAccount, NewPayout, NewTransfer, Payout, Transfer,
};
use crate::domain::PaymentError;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use super::payments::PaymentResult;

/// Port for the Connect side of the Stripe API.
///
/// `connect_account` arguments are sent as the `Stripe-Account` header so
/// the call runs against the connected account instead of the platform.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ConnectGateway: Send + Sync {
    async fn create_account(&self, params: NewConnectAccount) -> PaymentResult<Account>;

    async fn retrieve_account(&self, id: &str) -> PaymentResult<Account>;

    async fn create_account_link(&self, params: NewAccountLink) -> PaymentResult<AccountLink>;

    async fn create_bank_account(&self, params: NewBankAccount) -> PaymentResult<BankAccount>;

    async fn list_bank_accounts(&self, account: &str) -> PaymentResult<Vec<BankAccount>>;

    async fn delete_external_account(&self, account: &str, external_account: &str)
        -> PaymentResult<()>;

    async fn create_transfer(&self, params: NewTransfer) -> PaymentResult<Transfer>;

    async fn create_payout(&self, params: NewPayout) -> PaymentResult<Payout>;

    async fn retrieve_payout(
        &self,
        id: &str,
        connect_account: Option<String>,
    ) -> PaymentResult<Payout>;

    async fn list_payouts(&self, connect_account: &str, limit: u32) -> PaymentResult<Vec<Payout>>;

    async fn cancel_payout(
        &self,
        id: &str,
        connect_account: Option<String>,
    ) -> PaymentResult<Payout>;

    async fn retrieve_balance(&self, connect_account: &str) -> PaymentResult<Balance>;
}

/// Stripe-backed ConnectGateway
#[derive(Clone)]
pub struct StripeConnect {
    client: StripeClient,
}

impl StripeConnect {
    pub fn new(client: StripeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConnectGateway for StripeConnect {
    async fn create_account(&self, params: NewConnectAccount) -> PaymentResult<Account> {
        let form = Form::new()
            .field("type", &params.account_type)
            .field("country", params.country.to_uppercase())
            .field("email", &params.email)
            .optional("business_profile[name]", params.business_name.as_ref())
            .map("metadata", &params.metadata);

        self.client
            .post("accounts", &form, None)
            .await
            .map_err(translate)
    }

    async fn retrieve_account(&self, id: &str) -> PaymentResult<Account> {
        self.client
            .get(&format!("accounts/{}", id), &Form::new(), None)
            .await
            .map_err(translate)
    }

    async fn create_account_link(&self, params: NewAccountLink) -> PaymentResult<AccountLink> {
        let form = Form::new()
            .field("account", &params.account)
            .field("refresh_url", &params.refresh_url)
            .field("return_url", &params.return_url)
            .field("type", "account_onboarding");

        self.client
            .post("account_links", &form, None)
            .await
            .map_err(translate)
    }

    async fn create_bank_account(&self, params: NewBankAccount) -> PaymentResult<BankAccount> {
        let form = Form::new()
            .field("external_account[object]", "bank_account")
            .field("external_account[country]", params.country.to_uppercase())
            .field("external_account[currency]", &params.currency)
            .field("external_account[account_number]", &params.account_number)
            .field("external_account[routing_number]", &params.routing_number)
            .field("external_account[account_holder_name]", &params.account_holder_name)
            .field("external_account[account_holder_type]", "individual")
            .map("metadata", &params.metadata);

        self.client
            .post(
                &format!("accounts/{}/external_accounts", params.connect_account_id),
                &form,
                None,
            )
            .await
            .map_err(translate)
    }

    async fn list_bank_accounts(&self, account: &str) -> PaymentResult<Vec<BankAccount>> {
        let query = Form::new().field("object", "bank_account");
        let list: List<BankAccount> = self
            .client
            .get(&format!("accounts/{}/external_accounts", account), &query, None)
            .await
            .map_err(translate)?;
        Ok(list.data)
    }

    async fn delete_external_account(
        &self,
        account: &str,
        external_account: &str,
    ) -> PaymentResult<()> {
        let _: serde_json::Value = self
            .client
            .delete(
                &format!("accounts/{}/external_accounts/{}", account, external_account),
                None,
            )
            .await
            .map_err(translate)?;
        Ok(())
    }

    async fn create_transfer(&self, params: NewTransfer) -> PaymentResult<Transfer> {
        let form = Form::new()
            .field("amount", params.amount)
            .field("currency", &params.currency)
            .field("destination", &params.destination)
            .optional("description", params.description.as_ref())
            .map("metadata", &params.metadata);

        self.client
            .post("transfers", &form, None)
            .await
            .map_err(translate)
    }

    async fn create_payout(&self, params: NewPayout) -> PaymentResult<Payout> {
        let form = Form::new()
            .field("amount", params.amount)
            .field("currency", &params.currency)
            .field("destination", &params.destination)
            .optional("description", params.description.as_ref())
            .map("metadata", &params.metadata);

        self.client
            .post("payouts", &form, Some(params.connect_account_id.as_str()))
            .await
            .map_err(translate)
    }

    async fn retrieve_payout(
        &self,
        id: &str,
        connect_account: Option<String>,
    ) -> PaymentResult<Payout> {
        self.client
            .get(&format!("payouts/{}", id), &Form::new(), connect_account.as_deref())
            .await
            .map_err(translate)
    }

    async fn list_payouts(&self, connect_account: &str, limit: u32) -> PaymentResult<Vec<Payout>> {
        let query = Form::new().field("limit", limit);
        let list: List<Payout> = self
            .client
            .get("payouts", &query, Some(connect_account))
            .await
            .map_err(translate)?;
        Ok(list.data)
    }

    async fn cancel_payout(
        &self,
        id: &str,
        connect_account: Option<String>,
    ) -> PaymentResult<Payout> {
        self.client
            .post(&format!("payouts/{}/cancel", id), &Form::new(), connect_account.as_deref())
            .await
            .map_err(translate)
    }

    async fn retrieve_balance(&self, connect_account: &str) -> PaymentResult<Balance> {
        self.client
            .get("balance", &Form::new(), Some(connect_account))
            .await
            .map_err(translate)
    }
}

/// Map a Stripe failure onto Connect errors.
pub(crate) fn translate(failure: ApiFailure) -> PaymentError {
    if failure.is_resource_missing() && failure.message.contains("account") {
        return PaymentError::ConnectAccountNotFound(failure.param.unwrap_or_default());
    }

    PaymentError::Connect {
        message: failure.message,
        code: failure.code,
        kind: Some(failure.kind),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_account() {
        let err = translate(ApiFailure {
            status: Some(404),
            kind: "invalid_request_error".into(),
            code: Some("resource_missing".into()),
            message: "No such account: 'acct_1'".into(),
            param: Some("account".into()),
        });
        assert_eq!(err, PaymentError::ConnectAccountNotFound("account".into()));
    }

    #[test]
    fn test_other_connect_errors() {
        let err = translate(ApiFailure {
            status: Some(400),
            kind: "invalid_request_error".into(),
            code: Some("routing_number_invalid".into()),
            message: "Invalid routing number".into(),
            param: None,
        });
        assert_eq!(err.code(), "routing_number_invalid");
        assert!(matches!(err, PaymentError::Connect { .. }));
    }
}
