use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{non_empty, read_json, transport_error, AccessTokenResponse, OAuthProfile, OAuthProvider};
use crate::config::OAuthClientConfig;
use crate::domain::LoginSource;
use crate::errors::{AppError, AppResult};

const AUTHORIZE_URL: &str = "https://www.facebook.com/v19.0/dialog/oauth";
const TOKEN_URL: &str = "https://graph.facebook.com/v19.0/oauth/access_token";
const PROFILE_URL: &str = "https://graph.facebook.com/v19.0/me";
const PROFILE_FIELDS: &str = "id,email,first_name,last_name";
const SCOPES: &str = "email,public_profile";

#[derive(Deserialize)]
struct GraphUser {
    id: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

/// Facebook Login over the Graph API
pub struct FacebookProvider {
    http: Client,
    config: OAuthClientConfig,
}

impl FacebookProvider {
    pub fn new(http: Client, config: OAuthClientConfig) -> Self {
        Self { http, config }
    }
}

#[async_trait]
impl OAuthProvider for FacebookProvider {
    fn source(&self) -> LoginSource {
        LoginSource::Facebook
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
            ],
        )
        .map_err(|e| AppError::internal(format!("Invalid Facebook authorize URL: {}", e)))?;
        Ok(url.into())
    }

    async fn fetch_profile(&self, code: &str) -> AppResult<OAuthProfile> {
        let response = self
            .http
            .get(TOKEN_URL)
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.callback_url.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| transport_error("token exchange", e))?;
        let token: AccessTokenResponse = read_json(response, "token exchange").await?;

        let response = self
            .http
            .get(PROFILE_URL)
            .query(&[("fields", PROFILE_FIELDS)])
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| transport_error("profile", e))?;
        let user: GraphUser = read_json(response, "profile").await?;

        Ok(OAuthProfile {
            provider_id: user.id,
            email: non_empty(user.email),
            first_name: non_empty(user.first_name),
            last_name: non_empty(user.last_name),
        })
    }
}
