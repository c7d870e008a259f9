//! OAuth 2.0 authorization-code providers.
//!
//! Each provider builds its consent URL and turns a callback code into a
//! profile. Users are matched on the profile email.

mod facebook;
mod google;

use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;

use crate::domain::LoginSource;
use crate::errors::{AppError, AppResult};

pub use facebook::FacebookProvider;
pub use google::GoogleProvider;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Identity returned by a provider after a successful code exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    /// Subject id at the provider
    pub provider_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn source(&self) -> LoginSource;

    /// Consent page URL carrying the CSRF state
    fn authorize_url(&self, state: &str) -> AppResult<String>;

    /// Exchange the callback code and fetch the user's profile
    async fn fetch_profile(&self, code: &str) -> AppResult<OAuthProfile>;
}

#[derive(serde::Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

/// Decode a provider response. A rejected code surfaces as Unauthorized.
async fn read_json<T: DeserializeOwned>(response: Response, step: &str) -> AppResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(%status, body = %body, "OAuth {} rejected", step);
        return Err(AppError::Unauthorized);
    }

    response
        .json()
        .await
        .map_err(|e| AppError::internal(format!("OAuth {} response parse failed: {}", step, e)))
}

fn transport_error(step: &str, e: reqwest::Error) -> AppError {
    AppError::internal(format!("OAuth {} failed: {}", step, e))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
