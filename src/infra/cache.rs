//! Redis cache implementation.
//!
//! Typed JSON storage over a multiplexed connection, plus the short-lived
//! records the auth flow keeps in Redis: one-time passwords, OAuth state
//! values and rate limit counters.

use async_trait::async_trait;
use rand::{distr::Alphanumeric, Rng};
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::{
    Config, CACHE_PREFIX_OAUTH_STATE, CACHE_PREFIX_OTP, CACHE_PREFIX_RATE_LIMIT,
    OAUTH_STATE_TTL_SECONDS, SECONDS_PER_MINUTE,
};
use crate::domain::{Otp, OtpPurpose};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Length of generated OAuth state values
const OAUTH_STATE_LENGTH: usize = 32;

/// Delete KEYS[1] only while it still holds ARGV[1]. Returns 1 when deleted.
const COMPARE_AND_DELETE: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Redis cache wrapper with connection pooling.
#[derive(Clone)]
pub struct Cache {
    connection: ConnectionManager,
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub count: u64,
    pub allowed: bool,
    /// Seconds until the current window resets
    pub reset_after: u64,
}

impl Cache {
    /// Connect to Redis.
    pub async fn connect(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.redis_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Redis cache connected");

        Ok(Self { connection })
    }

    /// Store a JSON value that expires after `ttl_seconds`.
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        conn.set_ex::<_, _, ()>(key, json, ttl_seconds)
            .await
            .map_err(cache_error)?;

        Ok(())
    }

    /// Read and delete a value in one round trip.
    pub async fn take<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get_del(key).await.map_err(cache_error)?;

        value
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    AppError::internal(format!("Cache deserialization error: {}", e))
                })
            })
            .transpose()
    }

    /// Delete `key` if it still holds `expected`, in a single server-side step.
    ///
    /// Returns false when the key is missing or holds another value.
    pub async fn compare_and_delete<T: Serialize + ?Sized>(
        &self,
        key: &str,
        expected: &T,
    ) -> AppResult<bool> {
        let mut conn = self.connection.clone();
        let json = serde_json::to_string(expected)
            .map_err(|e| AppError::internal(format!("Cache serialization error: {}", e)))?;

        let script = redis::Script::new(COMPARE_AND_DELETE);
        let deleted: i64 = script
            .key(key)
            .arg(json)
            .invoke_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(deleted == 1)
    }

    /// Round-trip check used by the health endpoint.
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(cache_error)?;
        Ok(())
    }

    // =========================================================================
    // Rate Limiting Operations
    // =========================================================================

    /// Count a request against a fixed window.
    ///
    /// The window starts with the first request; INCR runs before EXPIRE so
    /// concurrent first requests cannot reset each other's counts. Any hit
    /// that finds the counter without a TTL sets one, so a failed EXPIRE
    /// cannot throttle a client for good.
    pub async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<RateLimitStatus> {
        let key = format!("{}{}", CACHE_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        let count: i64 = conn.incr(&key, 1).await.map_err(cache_error)?;
        let ttl: i64 = conn.ttl(&key).await.map_err(cache_error)?;

        let reset_after = match remaining_window(ttl, window_seconds) {
            Some(seconds) => seconds,
            None => {
                let _: () = conn
                    .expire(&key, window_seconds as i64)
                    .await
                    .map_err(cache_error)?;
                window_seconds
            }
        };

        let count = count.max(0) as u64;
        Ok(RateLimitStatus {
            count,
            allowed: count <= max_requests,
            reset_after,
        })
    }
}

/// Reply to TTL for a key that exists but never expires
const NO_EXPIRY: i64 = -1;

/// Seconds left in a rate limit window, or `None` when the counter has no
/// TTL and one must be set.
fn remaining_window(ttl: i64, window_seconds: u64) -> Option<u64> {
    match ttl {
        NO_EXPIRY => None,
        t if t > 0 => Some(t as u64),
        _ => Some(window_seconds),
    }
}

fn otp_key(purpose: OtpPurpose, email: &str) -> String {
    format!("{}{}:{}", CACHE_PREFIX_OTP, purpose.as_str(), email)
}

fn oauth_state_key(state: &str) -> String {
    format!("{}{}", CACHE_PREFIX_OAUTH_STATE, state)
}

/// Storage for pending one-time passwords.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Store a code, replacing any pending code for the same purpose.
    async fn store(
        &self,
        purpose: OtpPurpose,
        email: &str,
        otp: &Otp,
        ttl_minutes: u64,
    ) -> AppResult<()>;

    /// Delete the pending code if it equals `code`.
    ///
    /// Returns true for exactly one caller per stored code.
    async fn consume(&self, purpose: OtpPurpose, email: &str, code: &str) -> AppResult<bool>;
}

/// Single-use CSRF state values for OAuth redirects.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait OAuthStateStore: Send + Sync {
    /// Issue a fresh state bound to a provider name.
    async fn issue_state(&self, provider: &str) -> AppResult<String>;

    /// Consume a state, returning the provider it was issued for.
    async fn consume_state(&self, state: &str) -> AppResult<Option<String>>;
}

/// Fixed-window request counter keyed by client.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn hit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<RateLimitStatus>;
}

#[async_trait]
impl RateLimiter for Cache {
    async fn hit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<RateLimitStatus> {
        self.check_rate_limit(identifier, max_requests, window_seconds)
            .await
    }
}

#[async_trait]
impl OtpStore for Cache {
    async fn store(
        &self,
        purpose: OtpPurpose,
        email: &str,
        otp: &Otp,
        ttl_minutes: u64,
    ) -> AppResult<()> {
        let ttl = ttl_minutes * SECONDS_PER_MINUTE as u64;
        self.set_with_ttl(&otp_key(purpose, email), &otp.as_str(), ttl)
            .await
    }

    async fn consume(&self, purpose: OtpPurpose, email: &str, code: &str) -> AppResult<bool> {
        self.compare_and_delete(&otp_key(purpose, email), code.trim())
            .await
    }
}

#[async_trait]
impl OAuthStateStore for Cache {
    async fn issue_state(&self, provider: &str) -> AppResult<String> {
        let state: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(OAUTH_STATE_LENGTH)
            .map(char::from)
            .collect();

        self.set_with_ttl(&oauth_state_key(&state), &provider, OAUTH_STATE_TTL_SECONDS)
            .await?;
        Ok(state)
    }

    async fn consume_state(&self, state: &str) -> AppResult<Option<String>> {
        self.take(&oauth_state_key(state)).await
    }
}

/// Convert Redis errors to application errors.
fn cache_error(e: RedisError) -> AppError {
    tracing::error!("Redis error: {:?}", e);
    AppError::internal(format!("Cache error: {}", e))
}
