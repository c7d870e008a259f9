//! Application route configuration.

use std::collections::BTreeMap;

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode},
    middleware,
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{account_routes, auth_routes, refresh_routes, stripe_routes};
use super::middleware::{
    auth_middleware, rate_limit_auth_middleware, rate_limit_middleware, refresh_middleware,
};
use super::openapi::ApiDoc;
use super::AppState;

/// Create the application router with all routes configured
pub fn create_router(state: AppState) -> Router {
    let auth = auth_routes()
        .merge(account_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        )))
        .merge(refresh_routes().route_layer(middleware::from_fn_with_state(
            state.clone(),
            refresh_middleware,
        )))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_auth_middleware,
        ));

    let stripe = stripe_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        rate_limit_middleware,
    ));

    Router::new()
        // Health check endpoints (no rate limiting)
        .route("/", get(root))
        .route("/health", get(health))
        // OpenAPI Swagger UI documentation
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/auth", auth)
        .nest("/stripe", stripe)
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy. An empty origin list allows any origin.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Root endpoint
async fn root() -> &'static str {
    "Welcome to BaaS API"
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    services: BTreeMap<&'static str, ServiceStatus>,
}

/// Service status
#[derive(Serialize)]
struct ServiceStatus {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint with database and Redis connectivity check
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut services = BTreeMap::new();
    let mut all_healthy = true;

    for check in &state.health_checks {
        let status = match check.check().await {
            Ok(()) => ServiceStatus {
                status: "healthy",
                error: None,
            },
            Err(e) => {
                all_healthy = false;
                ServiceStatus {
                    status: "unhealthy",
                    error: Some(e),
                }
            }
        };
        services.insert(check.name(), status);
    }

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" },
        services,
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(response))
}
