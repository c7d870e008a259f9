//! Authentication handlers.

use axum::{
    extract::{Query, State},
    http::{
        header::{CACHE_CONTROL, LOCATION},
        StatusCode,
    },
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::middleware::CurrentUser;
use crate::api::AppState;
use crate::domain::{LoginSource, TokenPair, UserResponse};
use crate::errors::{AppError, AppResult};
use crate::services::{AuthSession, OtpTimeout, SigninOutcome, SignupInput, SignupOutcome};
use crate::types::ApiResponse;

/// User signup request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    /// Minimum 8 characters
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "SecurePass123!", min_length = 8)]
    pub password: String,
    #[schema(example = "Jane")]
    pub first_name: Option<String>,
    #[schema(example = "Doe")]
    pub last_name: Option<String>,
    /// Require an emailed OTP on every sign-in
    pub mfa_enabled: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SigninRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "SecurePass123!")]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[validate(length(equal = 6, message = "OTP must be 6 digits"))]
    #[schema(example = "123456")]
    pub otp: String,
}

/// Body of the resend and forget-password endpoints
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Not needed when the token came from a password reset OTP
    pub old_password: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(min_length = 8)]
    pub new_password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user declines consent
    pub error: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MfaStatus {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<OtpTimeout>,
}

/// Sign-in result; `tokens` is absent while an MFA code is pending
#[derive(Debug, Serialize, ToSchema)]
pub struct SigninResponse {
    pub success: bool,
    pub message: String,
    pub data: UserResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenPair>,
    pub mfa: MfaStatus,
}

/// Signed-in user with a fresh token pair
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub success: bool,
    pub message: String,
    pub data: UserResponse,
    pub tokens: TokenPair,
}

impl SessionResponse {
    fn new(session: AuthSession, message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            data: session.user,
            tokens: session.tokens,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OtpSent {
    pub otp: OtpTimeout,
}

/// Create authentication routes that need no token
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/signin", post(signin))
        .route("/verify-otp", post(verify_otp))
        .route("/resend", post(resend))
        .route("/forget-password", post(forget_password))
        .route("/google", get(google_authorize))
        .route("/google/callback", get(google_callback))
        .route("/facebook", get(facebook_authorize))
        .route("/facebook/callback", get(facebook_callback))
}

/// Routes that require an access token
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/change-password", post(change_password))
        .route("/logout-all", post(logout_all))
}

/// Routes that require a refresh token
pub fn refresh_routes() -> Router<AppState> {
    Router::new().route("/refresh", post(refresh))
}

/// Register a new user and email a verification OTP
#[utoipa::path(
    post,
    path = "/auth/signup",
    tag = "Authentication",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created, OTP sent", body = SignupOutcome),
        (status = 409, description = "User already exists"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SignupRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<SignupOutcome>>)> {
    let outcome = state
        .auth_service
        .signup(SignupInput {
            email: payload.email,
            password: payload.password,
            first_name: payload.first_name,
            last_name: payload.last_name,
            mfa_enabled: payload.mfa_enabled.unwrap_or(false),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            outcome,
            "Signup successful and please verify your user",
        )),
    ))
}

/// Sign in with email and password
#[utoipa::path(
    post,
    path = "/auth/signin",
    tag = "Authentication",
    request_body = SigninRequest,
    responses(
        (status = 200, description = "Signed in, or MFA code sent", body = SigninResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "User not verified or account locked")
    )
)]
pub async fn signin(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<SigninRequest>,
) -> AppResult<Json<SigninResponse>> {
    let outcome = state
        .auth_service
        .signin(payload.email, payload.password)
        .await?;

    let response = match outcome {
        SigninOutcome::Authenticated(session) => SigninResponse {
            success: true,
            message: "Signin successful".to_string(),
            data: session.user,
            tokens: Some(session.tokens),
            mfa: MfaStatus {
                enabled: false,
                otp: None,
            },
        },
        SigninOutcome::MfaRequired { user, otp } => SigninResponse {
            success: true,
            message: "OTP sent, please verify to complete signin".to_string(),
            data: user,
            tokens: None,
            mfa: MfaStatus {
                enabled: true,
                otp: Some(otp),
            },
        },
    };

    Ok(Json(response))
}

/// Verify an emailed OTP and receive tokens
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    tag = "Authentication",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP accepted", body = SessionResponse),
        (status = 401, description = "Invalid or expired OTP"),
        (status = 403, description = "Account locked")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<VerifyOtpRequest>,
) -> AppResult<Json<SessionResponse>> {
    let session = state
        .auth_service
        .verify_otp(payload.email, payload.otp)
        .await?;

    Ok(Json(SessionResponse::new(session, "OTP verified successfully")))
}

/// Send a fresh verification OTP
#[utoipa::path(
    post,
    path = "/auth/resend",
    tag = "Authentication",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "OTP sent", body = OtpSent),
        (status = 400, description = "Unknown or already verified user")
    )
)]
pub async fn resend(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<Json<ApiResponse<OtpSent>>> {
    let otp = state.auth_service.resend_otp(payload.email).await?;

    Ok(Json(ApiResponse::with_message(
        OtpSent { otp },
        "OTP sent successfully",
    )))
}

/// Email a password reset OTP
#[utoipa::path(
    post,
    path = "/auth/forget-password",
    tag = "Authentication",
    request_body = EmailRequest,
    responses(
        (status = 200, description = "Reset OTP sent", body = OtpSent),
        (status = 400, description = "Unknown user")
    )
)]
pub async fn forget_password(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<EmailRequest>,
) -> AppResult<Json<ApiResponse<OtpSent>>> {
    let otp = state.auth_service.forget_password(payload.email).await?;

    Ok(Json(ApiResponse::with_message(
        OtpSent { otp },
        "Password reset OTP sent successfully",
    )))
}

/// Change the password of the signed-in user
#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "Authentication",
    request_body = ChangePasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Old password missing or incorrect"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    ValidatedJson(payload): ValidatedJson<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    state
        .auth_service
        .change_password(&current_user, payload.old_password, payload.new_password)
        .await?;

    Ok(Json(ApiResponse::message("Password changed successfully")))
}

/// Exchange a refresh token for a new token pair
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "New token pair", body = SessionResponse),
        (status = 401, description = "Invalid or revoked refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<impl IntoResponse> {
    let session = state.auth_service.refresh(&current_user).await?;

    Ok((
        [(CACHE_CONTROL, "no-store")],
        Json(SessionResponse::new(session, "Token refreshed successfully")),
    ))
}

/// Invalidate every token issued to the signed-in user
#[utoipa::path(
    post,
    path = "/auth/logout-all",
    tag = "Authentication",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out everywhere"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn logout_all(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<()>>> {
    state.auth_service.logout_all(&current_user).await?;

    Ok(Json(ApiResponse::message("Logged out from all devices")))
}

/// Redirect to Google's consent screen
#[utoipa::path(
    get,
    path = "/auth/google",
    tag = "OAuth",
    responses(
        (status = 302, description = "Redirect to Google"),
        (status = 400, description = "Google sign-in is not configured")
    )
)]
pub async fn google_authorize(State(state): State<AppState>) -> AppResult<Response> {
    oauth_redirect(&state, LoginSource::Google).await
}

/// Complete Google sign-in
#[utoipa::path(
    get,
    path = "/auth/google/callback",
    tag = "OAuth",
    params(OAuthCallbackQuery),
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid state or no email on the profile")
    )
)]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> AppResult<Json<SessionResponse>> {
    oauth_complete(&state, LoginSource::Google, query).await
}

/// Redirect to Facebook's consent screen
#[utoipa::path(
    get,
    path = "/auth/facebook",
    tag = "OAuth",
    responses(
        (status = 302, description = "Redirect to Facebook"),
        (status = 400, description = "Facebook sign-in is not configured")
    )
)]
pub async fn facebook_authorize(State(state): State<AppState>) -> AppResult<Response> {
    oauth_redirect(&state, LoginSource::Facebook).await
}

/// Complete Facebook sign-in
#[utoipa::path(
    get,
    path = "/auth/facebook/callback",
    tag = "OAuth",
    params(OAuthCallbackQuery),
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid state or no email on the profile")
    )
)]
pub async fn facebook_callback(
    State(state): State<AppState>,
    Query(query): Query<OAuthCallbackQuery>,
) -> AppResult<Json<SessionResponse>> {
    oauth_complete(&state, LoginSource::Facebook, query).await
}

async fn oauth_redirect(state: &AppState, source: LoginSource) -> AppResult<Response> {
    let url = state.auth_service.oauth_authorize_url(source).await?;
    Ok((StatusCode::FOUND, [(LOCATION, url)]).into_response())
}

async fn oauth_complete(
    state: &AppState,
    source: LoginSource,
    query: OAuthCallbackQuery,
) -> AppResult<Json<SessionResponse>> {
    if let Some(error) = query.error {
        tracing::warn!(provider = %source, error = %error, "OAuth consent declined");
        return Err(AppError::Unauthorized);
    }
    let (code, oauth_state) = query
        .code
        .zip(query.state)
        .ok_or(AppError::Unauthorized)?;

    let session = state
        .auth_service
        .oauth_callback(source, code, oauth_state)
        .await?;

    Ok(Json(SessionResponse::new(session, "Signin successful")))
}
