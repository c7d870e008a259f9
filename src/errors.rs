//! Centralized error handling.
//!
//! Provides a unified error type for the entire application,
//! with automatic HTTP response conversion.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::domain::PaymentError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication & Authorization
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired OTP")]
    InvalidOtp,

    #[error("User is not verified")]
    UserNotVerified,

    #[error("Account is temporarily locked")]
    AccountLocked,

    // Resource errors
    #[error("Resource not found")]
    NotFound,

    #[error("{0} already exists")]
    Conflict(String),

    // Validation
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    BadRequest(String),

    // External service errors
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),

    #[error("Authentication error")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    // Internal
    #[error("Internal server error")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    success: bool,
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
}

impl AppError {
    /// Get error code for client
    pub fn code(&self) -> String {
        match self {
            AppError::Unauthorized => "UNAUTHORIZED".into(),
            AppError::InvalidCredentials => "INVALID_CREDENTIALS".into(),
            AppError::InvalidOtp => "INVALID_OTP".into(),
            AppError::UserNotVerified => "USER_NOT_VERIFIED".into(),
            AppError::AccountLocked => "ACCOUNT_LOCKED".into(),
            AppError::NotFound => "NOT_FOUND".into(),
            AppError::Conflict(_) => "CONFLICT".into(),
            AppError::Validation(_) => "VALIDATION_ERROR".into(),
            AppError::BadRequest(_) => "BAD_REQUEST".into(),
            AppError::Payment(e) => e.code(),
            AppError::Database(_) => "DATABASE_ERROR".into(),
            AppError::Jwt(_) => "INVALID_TOKEN".into(),
            AppError::Internal(_) => "INTERNAL_ERROR".into(),
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized
            | AppError::InvalidCredentials
            | AppError::InvalidOtp
            | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::UserNotVerified | AppError::AccountLocked => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Payment(e) => payment_status(e),
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::BadRequest(msg) => msg.clone(),
            AppError::Conflict(msg) => format!("{} already exists", msg),
            AppError::Payment(e) => {
                if payment_status(e).is_server_error() {
                    tracing::error!("Payment provider error: {:?}", e);
                } else {
                    tracing::warn!("Payment request rejected: {}", e);
                }
                e.to_string()
            }

            // Hide details for internal/security errors
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                "A database error occurred".to_string()
            }
            AppError::Jwt(e) => {
                tracing::debug!("JWT error: {:?}", e);
                "Invalid or expired token".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "An internal error occurred".to_string()
            }

            _ => self.to_string(),
        }
    }
}

fn payment_status(error: &PaymentError) -> StatusCode {
    match error {
        PaymentError::InvalidRequest { .. }
        | PaymentError::Connect { .. }
        | PaymentError::WebhookVerification(_) => StatusCode::BAD_REQUEST,
        PaymentError::CustomerNotFound(_)
        | PaymentError::PaymentIntentNotFound(_)
        | PaymentError::ConnectAccountNotFound(_) => StatusCode::NOT_FOUND,
        PaymentError::Payment { .. } if error.is_card_error() => StatusCode::PAYMENT_REQUIRED,
        PaymentError::Payment { .. } | PaymentError::UnexpectedStatus(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            success: false,
            error: ErrorBody {
                code: self.code(),
                message: self.user_message(),
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Extension trait for Option -> AppError conversion
pub trait OptionExt<T> {
    fn ok_or_not_found(self) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self) -> AppResult<T> {
        self.ok_or(AppError::NotFound)
    }
}

/// Convenience constructors
impl AppError {
    pub fn conflict(entity: impl Into<String>) -> Self {
        AppError::Conflict(entity.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}
