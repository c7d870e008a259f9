//! Validated JSON extractor - Combines deserialization with validation.

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::errors::AppError;

/// Validated JSON extractor that automatically validates requests.
///
/// # Example
///
/// ```rust,ignore
/// use serde::Deserialize;
/// use validator::Validate;
/// use baas_api::api::extractors::ValidatedJson;
///
/// #[derive(Deserialize, Validate)]
/// struct SigninRequest {
///     #[validate(email)]
///     email: String,
///     password: String,
/// }
///
/// async fn signin(ValidatedJson(payload): ValidatedJson<SigninRequest>) {
///     // payload is already validated
/// }
/// ```
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;

        value
            .validate()
            .map_err(|e| AppError::validation(format_validation_errors(&e)))?;

        Ok(ValidatedJson(value))
    }
}

/// Flatten validation errors, nested structs included, into one message.
fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();
    collect_messages(errors, &mut messages);
    messages.sort();
    messages.join(", ")
}

fn collect_messages(errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(errs) => out.extend(errs.iter().map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is invalid", field))
            })),
            ValidationErrorsKind::Struct(inner) => collect_messages(inner, out),
            ValidationErrorsKind::List(items) => {
                for inner in items.values() {
                    collect_messages(inner, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header::CONTENT_TYPE, StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Inner {
        #[validate(length(min = 1, message = "name is required"))]
        name: String,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Outer {
        #[validate(email(message = "Invalid email format"))]
        email: String,
        #[validate(nested)]
        inner: Inner,
    }

    async fn extract(body: &'static str) -> Result<ValidatedJson<Outer>, AppError> {
        let request = Request::builder()
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        ValidatedJson::<Outer>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn test_valid_body_passes() {
        let ValidatedJson(value) = extract(r#"{"email":"a@example.com","inner":{"name":"x"}}"#)
            .await
            .unwrap();
        assert_eq!(value.inner.name, "x");
    }

    #[tokio::test]
    async fn test_nested_errors_are_reported() {
        let err = extract(r#"{"email":"nope","inner":{"name":""}}"#)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "Invalid email format, name is required");
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let err = extract("{not json").await.err().unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
