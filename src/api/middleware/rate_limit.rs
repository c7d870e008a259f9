//! Rate limiting middleware backed by Redis counters.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;

use crate::api::AppState;
use crate::config::{
    RATE_LIMIT_AUTH_REQUESTS, RATE_LIMIT_AUTH_WINDOW_SECONDS, RATE_LIMIT_REQUESTS,
    RATE_LIMIT_WINDOW_SECONDS,
};

/// Rate limit error response
#[derive(Debug)]
pub struct RateLimitError {
    pub retry_after: u64,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert("Retry-After", HeaderValue::from(self.retry_after));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));

        let body = json!({
            "success": false,
            "error": {
                "code": "TOO_MANY_REQUESTS",
                "message": "Too many requests. Please try again later.",
            }
        });

        (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
    }
}

/// Per-route-group request budget.
#[derive(Debug, Clone, Copy)]
struct Budget {
    scope: &'static str,
    max_requests: u64,
    window_seconds: u64,
}

const GENERAL: Budget = Budget {
    scope: "general",
    max_requests: RATE_LIMIT_REQUESTS,
    window_seconds: RATE_LIMIT_WINDOW_SECONDS,
};

const AUTH: Budget = Budget {
    scope: "auth",
    max_requests: RATE_LIMIT_AUTH_REQUESTS,
    window_seconds: RATE_LIMIT_AUTH_WINDOW_SECONDS,
};

/// Extract client identifier for rate limiting.
/// Uses X-Forwarded-For header if behind proxy, otherwise uses connection IP.
fn client_identifier(request: &Request) -> String {
    // First hop is the original client
    if let Some(ip) = request
        .headers()
        .get("X-Forwarded-For")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return ip.to_string();
    }

    if let Some(real_ip) = request
        .headers()
        .get("X-Real-IP")
        .and_then(|h| h.to_str().ok())
    {
        return real_ip.trim().to_string();
    }

    if let Some(connect_info) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip().to_string();
    }

    "unknown".to_string()
}

async fn enforce(
    state: AppState,
    request: Request,
    next: Next,
    budget: Budget,
) -> Result<Response, RateLimitError> {
    let client_id = client_identifier(&request);
    let key = format!("{}:{}", budget.scope, client_id);

    let status = match state
        .rate_limiter
        .hit(&key, budget.max_requests, budget.window_seconds)
        .await
    {
        Ok(status) => status,
        Err(e) => {
            // Fail closed when Redis is unavailable
            tracing::error!(error = %e, scope = budget.scope, "Rate limit check failed - denying request");
            return Err(RateLimitError {
                retry_after: budget.window_seconds,
            });
        }
    };

    if !status.allowed {
        tracing::warn!(
            client = %client_id,
            scope = budget.scope,
            count = status.count,
            "Rate limit exceeded"
        );
        return Err(RateLimitError {
            retry_after: status.reset_after,
        });
    }

    let mut response = next.run(request).await;

    let remaining = budget.max_requests.saturating_sub(status.count);
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(budget.max_requests));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));

    Ok(response)
}

/// General rate limiting middleware.
/// Limits requests to RATE_LIMIT_REQUESTS per RATE_LIMIT_WINDOW_SECONDS.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(state, request, next, GENERAL).await
}

/// Stricter rate limiting for authentication endpoints.
/// Limits requests to RATE_LIMIT_AUTH_REQUESTS per RATE_LIMIT_AUTH_WINDOW_SECONDS.
pub async fn rate_limit_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    enforce(state, request, next, AUTH).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_rate_limit_error_response() {
        let response = RateLimitError { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["Retry-After"], "42");
    }

    #[test]
    fn test_client_identifier_prefers_forwarded_for() {
        let request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .header("X-Real-IP", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_identifier(&request), "203.0.113.7");
    }

    #[test]
    fn test_client_identifier_falls_back() {
        let request = Request::builder()
            .header("X-Real-IP", "10.0.0.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_identifier(&request), "10.0.0.2");

        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_identifier(&request), "unknown");
    }
}
