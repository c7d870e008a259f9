//! Connect service - marketplace accounts, onboarding links, bank accounts,
//! transfers and payouts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;
use validator::Validate;

use crate::config::{StripeConfig, DEFAULT_PAYOUT_LIST_LIMIT, STRIPE_LIST_MAX_LIMIT};
use crate::domain::payment::{
    Account, Balance, BankAccount, NewAccountLink, NewBankAccount, NewConnectAccount, NewPayout,
    NewTransfer, Payout, Transfer,
};
use crate::domain::{currency_for_country, to_minor_units};
use crate::errors::{AppError, AppResult};
use crate::infra::ConnectGateway;

const ONBOARDING_GUIDANCE: &str = "Account onboarding incomplete. Provide refreshUrl and returnUrl query parameters, or set STRIPE_CONNECT_REFRESH_URL and STRIPE_CONNECT_RETURN_URL environment variables.";
const MISSING_LINK_URLS: &str = "refreshUrl and returnUrl are required. Provide them in the request body or set STRIPE_CONNECT_REFRESH_URL and STRIPE_CONNECT_RETURN_URL environment variables.";

fn default_currency() -> String {
    "usd".to_string()
}

// =============================================================================
// Request DTOs
// =============================================================================

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateConnectAccountRequest {
    #[validate(length(equal = 2, message = "Country must be a 2-letter ISO code"))]
    #[schema(example = "US")]
    pub country: String,
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "seller@example.com")]
    pub email: String,
    pub business_name: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

/// Onboarding return URLs. Missing values fall back to configuration.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingUrls {
    #[validate(url(message = "Invalid refresh URL"))]
    pub refresh_url: Option<String>,
    #[validate(url(message = "Invalid return URL"))]
    pub return_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BankAccountRequest {
    #[validate(length(min = 1, message = "Connect account is required"))]
    #[schema(example = "acct_123")]
    pub connect_account_id: String,
    #[validate(length(min = 1, message = "Bank account number is required"))]
    #[schema(example = "000123456789")]
    pub bank_account_number: String,
    #[validate(length(min = 1, message = "Routing number is required"))]
    #[schema(example = "110000000")]
    pub routing_number: String,
    #[validate(length(min = 1, message = "Account holder name is required"))]
    pub account_holder_name: String,
    #[validate(length(equal = 2, message = "Country must be a 2-letter ISO code"))]
    pub country: String,
    /// Defaults to the country's settlement currency
    pub currency: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBankAccountRequest {
    /// Bank account being replaced
    #[validate(length(min = 1, message = "External account is required"))]
    #[schema(example = "ba_123")]
    pub external_account_id: String,
    #[serde(flatten)]
    #[validate(nested)]
    pub account: BankAccountRequest,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBankAccountRequest {
    #[validate(length(min = 1, message = "Connect account is required"))]
    pub connect_account_id: String,
    #[validate(length(min = 1, message = "External account is required"))]
    pub external_account_id: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTransferRequest {
    #[validate(length(min = 1, message = "Connect account is required"))]
    pub connect_account_id: String,
    /// Amount in dollars
    #[validate(range(min = 0.5, message = "Transfer amount must be at least 0.5"))]
    pub amount: f64,
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: String,
    pub description: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayoutRequest {
    #[validate(length(min = 1, message = "Connect account is required"))]
    pub connect_account_id: String,
    /// Amount in dollars
    #[validate(range(min = 0.01, message = "Amount must be positive"))]
    pub amount: f64,
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: String,
    #[validate(length(min = 1, message = "External account is required"))]
    pub external_account_id: String,
    pub description: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

// =============================================================================
// Responses
// =============================================================================

/// Account plus what is still missing before it can take payments
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectAccountView {
    #[serde(flatten)]
    pub account: Account,
    pub needs_onboarding: bool,
    pub onboarding_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onboarding_expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingLink {
    pub url: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DeletedResponse {
    pub success: bool,
}

// =============================================================================
// Service
// =============================================================================

#[async_trait]
pub trait ConnectService: Send + Sync {
    async fn create_account(&self, request: CreateConnectAccountRequest) -> AppResult<Account>;

    /// Account status; adds an onboarding link when onboarding is outstanding
    async fn get_account(&self, id: &str, urls: OnboardingUrls) -> AppResult<ConnectAccountView>;

    async fn create_account_link(&self, id: &str, urls: OnboardingUrls)
        -> AppResult<OnboardingLink>;

    async fn list_external_accounts(&self, id: &str) -> AppResult<Vec<BankAccount>>;

    async fn add_bank_account(&self, request: BankAccountRequest) -> AppResult<BankAccount>;

    /// Add the new bank account, then remove the old one
    async fn update_bank_account(&self, request: UpdateBankAccountRequest)
        -> AppResult<BankAccount>;

    async fn delete_bank_account(&self, request: DeleteBankAccountRequest)
        -> AppResult<DeletedResponse>;

    async fn create_transfer(&self, request: CreateTransferRequest) -> AppResult<Transfer>;

    async fn create_payout(&self, request: CreatePayoutRequest) -> AppResult<Payout>;

    async fn payout_status(&self, id: &str, connect_account: Option<String>) -> AppResult<Payout>;

    async fn list_payouts(&self, connect_account: &str, limit: Option<u32>)
        -> AppResult<Vec<Payout>>;

    async fn cancel_payout(&self, id: &str, connect_account: Option<String>) -> AppResult<Payout>;

    async fn balance(&self, connect_account: &str) -> AppResult<Balance>;
}

/// Concrete implementation of ConnectService over a ConnectGateway.
pub struct ConnectManager {
    gateway: Arc<dyn ConnectGateway>,
    account_type: String,
    default_business_name: Option<String>,
    refresh_url: Option<String>,
    return_url: Option<String>,
}

impl ConnectManager {
    pub fn new(gateway: Arc<dyn ConnectGateway>, config: &StripeConfig) -> Self {
        Self {
            gateway,
            account_type: config.connect_account_type.clone(),
            default_business_name: config.default_business_name.clone(),
            refresh_url: config.connect_refresh_url.clone(),
            return_url: config.connect_return_url.clone(),
        }
    }

    /// Request URLs win over configured ones. None unless both are known.
    fn resolve_urls(&self, urls: OnboardingUrls) -> Option<(String, String)> {
        let refresh = urls
            .refresh_url
            .filter(|u| !u.is_empty())
            .or_else(|| self.refresh_url.clone())?;
        let ret = urls
            .return_url
            .filter(|u| !u.is_empty())
            .or_else(|| self.return_url.clone())?;
        Some((refresh, ret))
    }

    async fn link(
        &self,
        account: &str,
        refresh_url: String,
        return_url: String,
    ) -> AppResult<OnboardingLink> {
        let link = self
            .gateway
            .create_account_link(NewAccountLink {
                account: account.to_string(),
                refresh_url,
                return_url,
            })
            .await?;
        Ok(OnboardingLink {
            url: link.url,
            expires_at: link.expires_at,
        })
    }
}

fn new_bank_account(request: BankAccountRequest) -> NewBankAccount {
    let country = request.country.to_uppercase();
    let currency = request
        .currency
        .filter(|c| !c.is_empty())
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| currency_for_country(&country).to_string());

    NewBankAccount {
        connect_account_id: request.connect_account_id,
        account_number: request.bank_account_number,
        routing_number: request.routing_number,
        account_holder_name: request.account_holder_name,
        country,
        currency,
        metadata: request.metadata.unwrap_or_default(),
    }
}

#[async_trait]
impl ConnectService for ConnectManager {
    async fn create_account(&self, request: CreateConnectAccountRequest) -> AppResult<Account> {
        let business_name = request
            .business_name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.default_business_name.clone());

        let account = self
            .gateway
            .create_account(NewConnectAccount {
                account_type: self.account_type.clone(),
                country: request.country.to_uppercase(),
                email: request.email,
                business_name,
                metadata: request.metadata.unwrap_or_default(),
            })
            .await?;

        tracing::info!(account = %account.id, "Connect account created");
        Ok(account)
    }

    async fn get_account(&self, id: &str, urls: OnboardingUrls) -> AppResult<ConnectAccountView> {
        let account = self.gateway.retrieve_account(id).await?;

        if !account.needs_onboarding() {
            return Ok(ConnectAccountView {
                account,
                needs_onboarding: false,
                onboarding_url: None,
                onboarding_expires_at: None,
                message: None,
            });
        }

        match self.resolve_urls(urls) {
            Some((refresh_url, return_url)) => {
                let link = self.link(id, refresh_url, return_url).await?;
                Ok(ConnectAccountView {
                    account,
                    needs_onboarding: true,
                    onboarding_url: Some(link.url),
                    onboarding_expires_at: Some(link.expires_at),
                    message: None,
                })
            }
            None => Ok(ConnectAccountView {
                account,
                needs_onboarding: true,
                onboarding_url: None,
                onboarding_expires_at: None,
                message: Some(ONBOARDING_GUIDANCE.to_string()),
            }),
        }
    }

    async fn create_account_link(
        &self,
        id: &str,
        urls: OnboardingUrls,
    ) -> AppResult<OnboardingLink> {
        let (refresh_url, return_url) = self
            .resolve_urls(urls)
            .ok_or_else(|| AppError::bad_request(MISSING_LINK_URLS))?;
        self.link(id, refresh_url, return_url).await
    }

    async fn list_external_accounts(&self, id: &str) -> AppResult<Vec<BankAccount>> {
        Ok(self.gateway.list_bank_accounts(id).await?)
    }

    async fn add_bank_account(&self, request: BankAccountRequest) -> AppResult<BankAccount> {
        let bank_account = self
            .gateway
            .create_bank_account(new_bank_account(request))
            .await?;
        tracing::info!(bank_account = %bank_account.id, "Bank account added");
        Ok(bank_account)
    }

    async fn update_bank_account(
        &self,
        request: UpdateBankAccountRequest,
    ) -> AppResult<BankAccount> {
        let connect_account = request.account.connect_account_id.clone();
        let replacement = self
            .gateway
            .create_bank_account(new_bank_account(request.account))
            .await?;

        if let Err(e) = self
            .gateway
            .delete_external_account(&connect_account, &request.external_account_id)
            .await
        {
            tracing::warn!(
                account = %connect_account,
                bank_account = %request.external_account_id,
                error = %e,
                "Failed to remove replaced bank account"
            );
        }

        Ok(replacement)
    }

    async fn delete_bank_account(
        &self,
        request: DeleteBankAccountRequest,
    ) -> AppResult<DeletedResponse> {
        self.gateway
            .delete_external_account(&request.connect_account_id, &request.external_account_id)
            .await?;
        Ok(DeletedResponse { success: true })
    }

    async fn create_transfer(&self, request: CreateTransferRequest) -> AppResult<Transfer> {
        let transfer = self
            .gateway
            .create_transfer(NewTransfer {
                amount: to_minor_units(request.amount),
                currency: request.currency.to_lowercase(),
                destination: request.connect_account_id,
                description: request.description,
                metadata: request.metadata.unwrap_or_default(),
            })
            .await?;
        tracing::info!(transfer = %transfer.id, amount = transfer.amount, "Transfer created");
        Ok(transfer)
    }

    async fn create_payout(&self, request: CreatePayoutRequest) -> AppResult<Payout> {
        let payout = self
            .gateway
            .create_payout(NewPayout {
                connect_account_id: request.connect_account_id,
                amount: to_minor_units(request.amount),
                currency: request.currency.to_lowercase(),
                destination: request.external_account_id,
                description: request.description,
                metadata: request.metadata.unwrap_or_default(),
            })
            .await?;
        tracing::info!(payout = %payout.id, amount = payout.amount, "Payout created");
        Ok(payout)
    }

    async fn payout_status(&self, id: &str, connect_account: Option<String>) -> AppResult<Payout> {
        Ok(self.gateway.retrieve_payout(id, connect_account).await?)
    }

    async fn list_payouts(
        &self,
        connect_account: &str,
        limit: Option<u32>,
    ) -> AppResult<Vec<Payout>> {
        let limit = limit
            .unwrap_or(DEFAULT_PAYOUT_LIST_LIMIT)
            .clamp(1, STRIPE_LIST_MAX_LIMIT);
        Ok(self.gateway.list_payouts(connect_account, limit).await?)
    }

    async fn cancel_payout(&self, id: &str, connect_account: Option<String>) -> AppResult<Payout> {
        let payout = self.gateway.cancel_payout(id, connect_account).await?;
        tracing::info!(payout = %payout.id, "Payout canceled");
        Ok(payout)
    }

    async fn balance(&self, connect_account: &str) -> AppResult<Balance> {
        Ok(self.gateway.retrieve_balance(connect_account).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::AccountLink;
    use crate::domain::PaymentError;
    use crate::infra::MockConnectGateway;
    use mockall::predicate::*;

    fn config() -> StripeConfig {
        let mut config = StripeConfig::with_secret_key("sk_test_123");
        config.default_business_name = Some("Acme Marketplace".into());
        config
    }

    fn config_with_urls() -> StripeConfig {
        let mut config = config();
        config.connect_refresh_url = Some("https://app.example.com/refresh".into());
        config.connect_return_url = Some("https://app.example.com/return".into());
        config
    }

    fn account(onboarded: bool) -> Account {
        Account {
            id: "acct_1".into(),
            country: Some("US".into()),
            account_type: Some("express".into()),
            email: Some("seller@example.com".into()),
            charges_enabled: onboarded,
            payouts_enabled: onboarded,
            details_submitted: onboarded,
            business_profile: None,
            metadata: HashMap::new(),
        }
    }

    fn bank_request(currency: Option<&str>) -> BankAccountRequest {
        BankAccountRequest {
            connect_account_id: "acct_1".into(),
            bank_account_number: "000123456789".into(),
            routing_number: "110000000".into(),
            account_holder_name: "Jane Doe".into(),
            country: "gb".into(),
            currency: currency.map(String::from),
            metadata: None,
        }
    }

    fn bank_account(id: &str) -> BankAccount {
        BankAccount {
            id: id.to_string(),
            last4: "6789".into(),
            status: Some("new".into()),
            country: Some("GB".into()),
            currency: Some("gbp".into()),
            bank_name: None,
            routing_number: None,
            account_holder_name: Some("Jane Doe".into()),
        }
    }

    #[tokio::test]
    async fn test_create_account_uses_configured_defaults() {
        let mut gateway = MockConnectGateway::new();
        gateway
            .expect_create_account()
            .withf(|params| {
                params.account_type == "express"
                    && params.country == "US"
                    && params.business_name.as_deref() == Some("Acme Marketplace")
            })
            .returning(|_| Ok(account(false)));

        let service = ConnectManager::new(Arc::new(gateway), &config());
        service
            .create_account(CreateConnectAccountRequest {
                country: "us".into(),
                email: "seller@example.com".into(),
                business_name: None,
                metadata: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_onboarded_account_needs_nothing() {
        let mut gateway = MockConnectGateway::new();
        gateway
            .expect_retrieve_account()
            .returning(|_| Ok(account(true)));
        gateway.expect_create_account_link().never();

        let service = ConnectManager::new(Arc::new(gateway), &config_with_urls());
        let view = service
            .get_account("acct_1", OnboardingUrls::default())
            .await
            .unwrap();

        assert!(!view.needs_onboarding);
        assert_eq!(view.onboarding_url, None);
    }

    #[tokio::test]
    async fn test_onboarding_link_from_config_urls() {
        let mut gateway = MockConnectGateway::new();
        gateway
            .expect_retrieve_account()
            .returning(|_| Ok(account(false)));
        gateway
            .expect_create_account_link()
            .withf(|params| {
                params.account == "acct_1" && params.refresh_url == "https://app.example.com/refresh"
            })
            .returning(|_| {
                Ok(AccountLink {
                    url: "https://connect.stripe.com/setup/e/acct_1".into(),
                    expires_at: 1_700_000_000,
                })
            });

        let service = ConnectManager::new(Arc::new(gateway), &config_with_urls());
        let view = service
            .get_account("acct_1", OnboardingUrls::default())
            .await
            .unwrap();

        assert!(view.needs_onboarding);
        assert_eq!(
            view.onboarding_url.as_deref(),
            Some("https://connect.stripe.com/setup/e/acct_1")
        );
        assert_eq!(view.onboarding_expires_at, Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_onboarding_without_urls_gives_guidance() {
        let mut gateway = MockConnectGateway::new();
        gateway
            .expect_retrieve_account()
            .returning(|_| Ok(account(false)));
        gateway.expect_create_account_link().never();

        let service = ConnectManager::new(Arc::new(gateway), &config());
        let view = service
            .get_account(
                "acct_1",
                OnboardingUrls {
                    refresh_url: Some("https://app.example.com/refresh".into()),
                    return_url: None,
                },
            )
            .await
            .unwrap();

        assert!(view.needs_onboarding);
        assert_eq!(view.onboarding_url, None);
        assert!(view.message.is_some());

        let json = serde_json::to_value(&view).unwrap();
        assert!(json["onboardingUrl"].is_null());
        assert_eq!(json["id"], "acct_1");
    }

    #[tokio::test]
    async fn test_account_link_requires_urls() {
        let service = ConnectManager::new(Arc::new(MockConnectGateway::new()), &config());
        let result = service
            .create_account_link("acct_1", OnboardingUrls::default())
            .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_bank_account_currency_defaults_from_country() {
        let mut gateway = MockConnectGateway::new();
        gateway
            .expect_create_bank_account()
            .withf(|params| params.country == "GB" && params.currency == "gbp")
            .returning(|_| Ok(bank_account("ba_1")));

        let service = ConnectManager::new(Arc::new(gateway), &config());
        service.add_bank_account(bank_request(None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_bank_account_tolerates_delete_failure() {
        let mut gateway = MockConnectGateway::new();
        gateway
            .expect_create_bank_account()
            .withf(|params| params.currency == "eur")
            .returning(|_| Ok(bank_account("ba_new")));
        gateway
            .expect_delete_external_account()
            .with(eq("acct_1"), eq("ba_old"))
            .times(1)
            .returning(|_, _| {
                Err(PaymentError::Connect {
                    message: "cannot delete default account".into(),
                    code: None,
                    kind: None,
                })
            });

        let service = ConnectManager::new(Arc::new(gateway), &config());
        let replacement = service
            .update_bank_account(UpdateBankAccountRequest {
                external_account_id: "ba_old".into(),
                account: bank_request(Some("EUR")),
            })
            .await
            .unwrap();

        assert_eq!(replacement.id, "ba_new");
    }

    #[tokio::test]
    async fn test_transfer_converts_dollars() {
        let mut gateway = MockConnectGateway::new();
        gateway
            .expect_create_transfer()
            .withf(|params| params.amount == 1250 && params.destination == "acct_1")
            .returning(|params| {
                Ok(Transfer {
                    id: "tr_1".into(),
                    amount: params.amount,
                    currency: params.currency,
                    destination: Some(params.destination),
                    description: None,
                    metadata: HashMap::new(),
                })
            });

        let service = ConnectManager::new(Arc::new(gateway), &config());
        let transfer = service
            .create_transfer(CreateTransferRequest {
                connect_account_id: "acct_1".into(),
                amount: 12.5,
                currency: "usd".into(),
                description: None,
                metadata: None,
            })
            .await
            .unwrap();
        assert_eq!(transfer.amount, 1250);
    }

    #[tokio::test]
    async fn test_list_payouts_default_limit() {
        let mut gateway = MockConnectGateway::new();
        gateway
            .expect_list_payouts()
            .with(eq("acct_1"), eq(10u32))
            .returning(|_, _| Ok(vec![]));

        let service = ConnectManager::new(Arc::new(gateway), &config());
        assert!(service.list_payouts("acct_1", None).await.unwrap().is_empty());
    }
}
