use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{non_empty, read_json, transport_error, AccessTokenResponse, OAuthProfile, OAuthProvider};
use crate::config::OAuthClientConfig;
use crate::domain::LoginSource;
use crate::errors::{AppError, AppResult};

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

#[derive(Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    given_name: Option<String>,
    family_name: Option<String>,
}

/// Google sign-in over OpenID Connect
pub struct GoogleProvider {
    http: Client,
    config: OAuthClientConfig,
}

impl GoogleProvider {
    pub fn new(http: Client, config: OAuthClientConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn source(&self) -> LoginSource {
        LoginSource::Google
    }

    fn authorize_url(&self, state: &str) -> AppResult<String> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("access_type", "online"),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| AppError::internal(format!("Invalid Google authorize URL: {}", e)))?;
        Ok(url.into())
    }

    async fn fetch_profile(&self, code: &str) -> AppResult<OAuthProfile> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error("token exchange", e))?;
        let token: AccessTokenResponse = read_json(response, "token exchange").await?;

        let response = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| transport_error("userinfo", e))?;
        let info: GoogleUserInfo = read_json(response, "userinfo").await?;

        // Unverified Google addresses are not trusted for account matching
        let email = non_empty(info.email).filter(|_| info.email_verified);

        Ok(OAuthProfile {
            provider_id: info.sub,
            email,
            first_name: non_empty(info.given_name),
            last_name: non_empty(info.family_name),
        })
    }
}
