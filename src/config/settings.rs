//! Application settings loaded from environment variables.

use std::env;

use super::constants::{
    is_valid_connect_account_type, is_valid_stripe_secret_key, DEFAULT_ACCESS_TOKEN_MINUTES,
    DEFAULT_ACCOUNT_LOCK_MINUTES, DEFAULT_CONNECT_ACCOUNT_TYPE, DEFAULT_DATABASE_URL,
    DEFAULT_OTP_EXPIRE_MINUTES, DEFAULT_OTP_MAX_ATTEMPTS, DEFAULT_REDIS_URL,
    DEFAULT_REFRESH_TOKEN_DAYS, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, DEFAULT_SMTP_FROM,
    DEFAULT_STRIPE_API_BASE, MIN_JWT_SECRET_LENGTH,
};

const DEV_JWT_SECRET: &str = "dev-secret-key-minimum-32-chars!!";
const DEV_JWT_REFRESH_SECRET: &str = "dev-refresh-secret-minimum-32-chars";
const DEV_STRIPE_SECRET_KEY: &str = "sk_test_development_placeholder";

/// Credentials for one OAuth provider
#[derive(Clone)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

impl std::fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl OAuthClientConfig {
    /// Read `{PREFIX}_CLIENT_ID`, `{PREFIX}_CLIENT_SECRET` and `{PREFIX}_CALLBACK_URL`.
    /// Returns `None` unless all three are present.
    fn from_env(prefix: &str) -> Option<Self> {
        Some(Self {
            client_id: env::var(format!("{prefix}_CLIENT_ID")).ok()?,
            client_secret: env::var(format!("{prefix}_CLIENT_SECRET")).ok()?,
            callback_url: env::var(format!("{prefix}_CALLBACK_URL")).ok()?,
        })
    }
}

/// Stripe settings
#[derive(Clone)]
pub struct StripeConfig {
    secret_key: String,
    pub webhook_secret: Option<String>,
    pub publishable_key: Option<String>,
    pub api_base: String,
    pub connect_account_type: String,
    pub default_business_name: Option<String>,
    pub connect_refresh_url: Option<String>,
    pub connect_return_url: Option<String>,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "[REDACTED]"))
            .field("publishable_key", &self.publishable_key)
            .field("api_base", &self.api_base)
            .field("connect_account_type", &self.connect_account_type)
            .field("default_business_name", &self.default_business_name)
            .field("connect_refresh_url", &self.connect_refresh_url)
            .field("connect_return_url", &self.connect_return_url)
            .finish()
    }
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: DEV_STRIPE_SECRET_KEY.to_string(),
            webhook_secret: None,
            publishable_key: None,
            api_base: DEFAULT_STRIPE_API_BASE.to_string(),
            connect_account_type: DEFAULT_CONNECT_ACCOUNT_TYPE.to_string(),
            default_business_name: None,
            connect_refresh_url: None,
            connect_return_url: None,
        }
    }
}

impl StripeConfig {
    /// Create settings with an explicit secret key.
    pub fn with_secret_key(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            ..Self::default()
        }
    }

    /// Secret key used as the bearer credential for the Stripe API.
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// Load Stripe settings from the environment.
    ///
    /// # Panics
    /// Panics if STRIPE_SECRET_KEY is missing in release builds, has an
    /// unknown prefix, or STRIPE_CONNECT_ACCOUNT_TYPE is unsupported.
    fn from_env() -> Self {
        let secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_else(|_| {
            if cfg!(debug_assertions) {
                tracing::warn!("STRIPE_SECRET_KEY not set, using placeholder for development");
                DEV_STRIPE_SECRET_KEY.to_string()
            } else {
                panic!("STRIPE_SECRET_KEY environment variable must be set in production");
            }
        });

        if !is_valid_stripe_secret_key(&secret_key) {
            panic!("STRIPE_SECRET_KEY must start with sk_test_ or sk_live_");
        }

        let connect_account_type = env::var("STRIPE_CONNECT_ACCOUNT_TYPE")
            .unwrap_or_else(|_| DEFAULT_CONNECT_ACCOUNT_TYPE.to_string());
        if !is_valid_connect_account_type(&connect_account_type) {
            panic!("STRIPE_CONNECT_ACCOUNT_TYPE must be express or custom");
        }

        Self {
            secret_key,
            webhook_secret: non_empty_var("STRIPE_WEBHOOK_SECRET"),
            publishable_key: non_empty_var("STRIPE_PUBLISHABLE_KEY"),
            api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_STRIPE_API_BASE.to_string()),
            connect_account_type,
            default_business_name: non_empty_var("STRIPE_DEFAULT_BUSINESS_NAME"),
            connect_refresh_url: non_empty_var("STRIPE_CONNECT_REFRESH_URL"),
            connect_return_url: non_empty_var("STRIPE_CONNECT_RETURN_URL"),
        }
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    jwt_secret: String,
    jwt_refresh_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
    pub otp_expire_minutes: u64,
    pub otp_max_attempts: i32,
    pub account_lock_minutes: i64,
    pub server_host: String,
    pub server_port: u16,
    /// Empty means any origin
    pub cors_allowed_origins: Vec<String>,
    pub smtp_from: String,
    pub stripe: StripeConfig,
    pub google: Option<OAuthClientConfig>,
    pub facebook: Option<OAuthClientConfig>,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("redis_url", &"[REDACTED]")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_refresh_secret", &"[REDACTED]")
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .field("otp_expire_minutes", &self.otp_expire_minutes)
            .field("otp_max_attempts", &self.otp_max_attempts)
            .field("account_lock_minutes", &self.account_lock_minutes)
            .field("server_host", &self.server_host)
            .field("server_port", &self.server_port)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("smtp_from", &self.smtp_from)
            .field("stripe", &self.stripe)
            .field("google", &self.google)
            .field("facebook", &self.facebook)
            .finish()
    }
}

/// Development defaults. `from_env` starts from these.
impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_refresh_secret: DEV_JWT_REFRESH_SECRET.to_string(),
            access_token_minutes: DEFAULT_ACCESS_TOKEN_MINUTES,
            refresh_token_days: DEFAULT_REFRESH_TOKEN_DAYS,
            otp_expire_minutes: DEFAULT_OTP_EXPIRE_MINUTES,
            otp_max_attempts: DEFAULT_OTP_MAX_ATTEMPTS,
            account_lock_minutes: DEFAULT_ACCOUNT_LOCK_MINUTES,
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            cors_allowed_origins: Vec::new(),
            smtp_from: DEFAULT_SMTP_FROM.to_string(),
            stripe: StripeConfig::default(),
            google: None,
            facebook: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Panics
    /// Panics if JWT secrets are not set in release builds or are too short,
    /// or if the Stripe settings are invalid (security requirement).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let jwt_secret = required_secret("JWT_SECRET", DEV_JWT_SECRET);
        let jwt_refresh_secret = required_secret("JWT_REFRESH_SECRET", DEV_JWT_REFRESH_SECRET);

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            jwt_secret,
            jwt_refresh_secret,
            access_token_minutes: parsed_var("JWT_ACCESS_EXPIRATION_MINUTES")
                .unwrap_or(defaults.access_token_minutes),
            refresh_token_days: parsed_var("JWT_REFRESH_EXPIRATION_DAYS")
                .unwrap_or(defaults.refresh_token_days),
            otp_expire_minutes: parsed_var("OTP_EXPIRE_MINUTES")
                .unwrap_or(defaults.otp_expire_minutes),
            otp_max_attempts: parsed_var("OTP_MAX_ATTEMPTS").unwrap_or(defaults.otp_max_attempts),
            account_lock_minutes: parsed_var("ACCOUNT_LOCK_MINUTES")
                .unwrap_or(defaults.account_lock_minutes),
            server_host: env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parsed_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|v| parse_origins(&v))
                .unwrap_or_default(),
            smtp_from: env::var("SMTP_FROM").unwrap_or(defaults.smtp_from),
            stripe: StripeConfig::from_env(),
            google: OAuthClientConfig::from_env("GOOGLE"),
            facebook: OAuthClientConfig::from_env("FACEBOOK"),
        }
    }

    /// Replace both signing secrets.
    pub fn with_jwt_secrets(mut self, access: impl Into<String>, refresh: impl Into<String>) -> Self {
        self.jwt_secret = access.into();
        self.jwt_refresh_secret = refresh.into();
        self
    }

    /// Get access token secret bytes for signing/verification.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Get refresh token secret bytes for signing/verification.
    pub fn jwt_refresh_secret_bytes(&self) -> &[u8] {
        self.jwt_refresh_secret.as_bytes()
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn required_secret(name: &str, dev_default: &str) -> String {
    let secret = env::var(name).unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            tracing::warn!("{} not set, using insecure default for development", name);
            dev_default.to_string()
        } else {
            panic!("{} environment variable must be set in production", name);
        }
    });

    if secret.len() < MIN_JWT_SECRET_LENGTH {
        panic!(
            "{} must be at least {} characters long",
            name, MIN_JWT_SECRET_LENGTH
        );
    }

    secret
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origins_skips_blanks() {
        let origins = parse_origins("https://a.example, ,https://b.example,");
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = Config::default().with_jwt_secrets(
            "access-secret-that-is-long-enough-000",
            "refresh-secret-that-is-long-enough-00",
        );
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("access-secret"));
        assert!(!rendered.contains("refresh-secret"));
        assert!(!rendered.contains(DEV_STRIPE_SECRET_KEY));
    }

    #[test]
    fn test_default_stripe_key_is_test_mode() {
        let config = Config::default();
        assert!(is_valid_stripe_secret_key(config.stripe.secret_key()));
    }
}
