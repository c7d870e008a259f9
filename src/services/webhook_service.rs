//! Stripe webhook verification.
//!
//! The `Stripe-Signature` header looks like `t=<unix>,v1=<hex>[,v1=<hex>]`.
//! Each `v1` is an HMAC-SHA256 of `"{t}.{raw body}"` keyed with the
//! endpoint secret. Any matching `v1` within the tolerance window is accepted.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use utoipa::ToSchema;

use crate::config::WEBHOOK_TOLERANCE_SECONDS;
use crate::domain::payment::WebhookEvent;
use crate::domain::PaymentError;
use crate::errors::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Events that get logged at info level
const TRACKED_EVENTS: &[&str] = &[
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "payout.paid",
    "payout.failed",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(rename = "type")]
    #[schema(example = "payment_intent.succeeded")]
    pub event_type: String,
}

pub trait WebhookService: Send + Sync {
    /// Verify the signature over the raw body and acknowledge the event.
    fn handle(&self, payload: &[u8], signature: Option<&str>) -> AppResult<WebhookAck>;
}

pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance_seconds: i64,
}

impl WebhookVerifier {
    /// `secret` is None when no webhook endpoint is configured; every call
    /// then fails with an internal error.
    pub fn new(secret: Option<String>) -> Self {
        Self {
            secret,
            tolerance_seconds: WEBHOOK_TOLERANCE_SECONDS,
        }
    }

    /// Verify against an explicit clock and decode the event.
    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> AppResult<WebhookEvent> {
        let secret = self
            .secret
            .as_deref()
            .ok_or_else(|| AppError::internal("STRIPE_WEBHOOK_SECRET is not configured"))?;

        let (timestamp, signatures) = parse_header(header)?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| AppError::internal(format!("Invalid webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);

        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            return Err(rejected(
                "No signatures found matching the expected signature for payload",
            ));
        }

        if (now - timestamp).abs() > self.tolerance_seconds {
            return Err(rejected("Timestamp outside the tolerance zone"));
        }

        serde_json::from_slice(payload).map_err(|e| rejected(&format!("Invalid payload: {}", e)))
    }
}

impl WebhookService for WebhookVerifier {
    fn handle(&self, payload: &[u8], signature: Option<&str>) -> AppResult<WebhookAck> {
        let header = signature.ok_or_else(|| rejected("Missing Stripe-Signature header"))?;
        let event = self.verify_at(payload, header, Utc::now().timestamp())?;

        if TRACKED_EVENTS.contains(&event.event_type.as_str()) {
            tracing::info!(event_id = %event.id, event_type = %event.event_type, "Stripe webhook received");
        } else {
            tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Unhandled Stripe webhook");
        }

        Ok(WebhookAck {
            received: true,
            event_type: event.event_type,
        })
    }
}

fn rejected(reason: &str) -> AppError {
    PaymentError::WebhookVerification(reason.to_string()).into()
}

/// Timestamp and every `v1` signature from the header. Other schemes are ignored.
fn parse_header(header: &str) -> AppResult<(i64, Vec<&str>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    match timestamp {
        Some(t) if !signatures.is_empty() => Ok((t, signatures)),
        _ => Err(rejected(
            "Unable to extract timestamp and signatures from header",
        )),
    }
}
