//! Minimal Stripe REST client.
//!
//! Stripe takes form-encoded bodies with bracket notation for nested
//! values and answers with JSON, or with an `{"error": {...}}` envelope.

use reqwest::{Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::HashMap;

use crate::config::{StripeConfig, STRIPE_API_VERSION};

/// Error type string used for transport and decoding failures
pub const API_CONNECTION_ERROR: &str = "api_connection_error";

/// Failed Stripe call, as reported by Stripe or by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub kind: String,
    pub code: Option<String>,
    pub message: String,
    pub param: Option<String>,
}

impl ApiFailure {
    fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            kind: API_CONNECTION_ERROR.to_string(),
            code: None,
            message: message.into(),
            param: None,
        }
    }

    pub fn is_resource_missing(&self) -> bool {
        self.code.as_deref() == Some("resource_missing")
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

/// Form body in Stripe's bracket notation.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Form {
    pairs: Vec<(String, String)>,
}

impl Form {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    pub fn optional(self, key: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(v) => self.field(key, v),
            None => self,
        }
    }

    /// `key[0]=a&key[1]=b`
    pub fn list(mut self, key: &str, values: &[String]) -> Self {
        for (i, value) in values.iter().enumerate() {
            self.pairs.push((format!("{}[{}]", key, i), value.clone()));
        }
        self
    }

    /// `key[name]=value`, sorted for a stable body
    pub fn map(mut self, key: &str, values: &HashMap<String, String>) -> Self {
        let mut entries: Vec<_> = values.iter().collect();
        entries.sort();
        for (name, value) in entries {
            self.pairs.push((format!("{}[{}]", key, name), value.clone()));
        }
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }
}

/// Authenticated client for one Stripe platform account.
#[derive(Clone)]
pub struct StripeClient {
    http: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(config: &StripeConfig) -> Self {
        Self::with_http(Client::new(), config)
    }

    pub fn with_http(http: Client, config: &StripeConfig) -> Self {
        Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key().to_string(),
        }
    }

    fn request(&self, method: Method, path: &str, account: Option<&str>) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.api_base, path.trim_start_matches('/'));
        let builder = self
            .http
            .request(method, url)
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", STRIPE_API_VERSION);

        match account {
            Some(account) => builder.header("Stripe-Account", account),
            None => builder,
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &Form,
        account: Option<&str>,
    ) -> Result<T, ApiFailure> {
        let builder = self.request(Method::GET, path, account).query(query.pairs());
        Self::execute(builder).await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &Form,
        account: Option<&str>,
    ) -> Result<T, ApiFailure> {
        let builder = self.request(Method::POST, path, account).form(form.pairs());
        Self::execute(builder).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        account: Option<&str>,
    ) -> Result<T, ApiFailure> {
        Self::execute(self.request(Method::DELETE, path, account)).await
    }

    async fn execute<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ApiFailure> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiFailure::transport(format!("Stripe request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiFailure::transport(format!("Stripe response unreadable: {}", e)))?;

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                tracing::error!(error = %e, "Unexpected Stripe response shape");
                ApiFailure::transport(format!("Stripe response could not be parsed: {}", e))
            });
        }

        Err(parse_failure(status.as_u16(), &body))
    }
}

/// Decode Stripe's error envelope; fall back to the raw status when the body is not one.
pub(crate) fn parse_failure(status: u16, body: &str) -> ApiFailure {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => ApiFailure {
            status: Some(status),
            kind: error.kind.unwrap_or_else(|| "api_error".to_string()),
            code: error.code,
            message: error
                .message
                .unwrap_or_else(|| format!("Stripe returned status {}", status)),
            param: error.param,
        },
        Err(_) => ApiFailure {
            status: Some(status),
            kind: "api_error".to_string(),
            code: None,
            message: format!("Stripe returned status {}", status),
            param: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_bracket_notation() {
        let mut metadata = HashMap::new();
        metadata.insert("order".to_string(), "42".to_string());
        metadata.insert("source".to_string(), "web".to_string());

        let form = Form::new()
            .field("amount", 1999)
            .optional("description", None::<String>)
            .optional("customer", Some("cus_1"))
            .list("payment_method_types", &["card".to_string(), "link".to_string()])
            .map("metadata", &metadata);

        let pairs: Vec<(&str, &str)> = form
            .pairs()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                ("amount", "1999"),
                ("customer", "cus_1"),
                ("payment_method_types[0]", "card"),
                ("payment_method_types[1]", "link"),
                ("metadata[order]", "42"),
                ("metadata[source]", "web"),
            ]
        );
    }

    #[test]
    fn test_parse_error_envelope() {
        let body = r#"{"error":{"type":"invalid_request_error","code":"resource_missing",
            "message":"No such payment_intent: 'pi_123'","param":"intent"}}"#;
        let failure = parse_failure(404, body);

        assert_eq!(failure.status, Some(404));
        assert_eq!(failure.kind, "invalid_request_error");
        assert!(failure.is_resource_missing());
        assert_eq!(failure.param.as_deref(), Some("intent"));
    }

    #[test]
    fn test_parse_non_json_error() {
        let failure = parse_failure(502, "<html>Bad gateway</html>");
        assert_eq!(failure.kind, "api_error");
        assert_eq!(failure.message, "Stripe returned status 502");
    }
}
