//! Authentication service - signup, OTP verification, sign-in, password
//! management, token refresh and OAuth sign-in.
//!
//! User state changes are expressed as `User` methods and persisted through
//! the Unit of Work. OTP delivery goes through the `OtpStore` and `Mailer`
//! ports so the service never touches Redis or the job queue directly.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::token::TokenIssuer;
use crate::config::{Config, OTP_TIMEOUT_UNIT};
use crate::domain::password::DUMMY_HASH;
use crate::domain::{
    LoginSource, Otp, OtpPurpose, Password, TokenKind, TokenPair, User, UserResponse,
};
use crate::errors::{AppError, AppResult};
use crate::infra::{Mailer, OAuthProvider, OAuthStateStore, OtpStore, UnitOfWork};

/// Authenticated caller, resolved from a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    /// Token was issued from a password reset OTP
    pub forget_password: bool,
}

/// How long a freshly sent OTP stays valid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct OtpTimeout {
    #[schema(example = 5)]
    pub timeout: u64,
    #[schema(example = "mins")]
    pub unit: String,
}

/// Signup input, already validated for shape by the handler
#[derive(Debug, Clone)]
pub struct SignupInput {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub mfa_enabled: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignupOutcome {
    pub user: UserResponse,
    pub otp: OtpTimeout,
}

/// Signed-in user with a fresh token pair
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: UserResponse,
    pub tokens: TokenPair,
}

#[derive(Debug, Clone)]
pub enum SigninOutcome {
    Authenticated(AuthSession),
    /// Password accepted; an OTP was sent and must be verified next
    MfaRequired { user: UserResponse, otp: OtpTimeout },
}

/// Authentication service trait for dependency injection.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Register or restore an account and send a verification OTP
    async fn signup(&self, input: SignupInput) -> AppResult<SignupOutcome>;

    async fn signin(&self, email: String, password: String) -> AppResult<SigninOutcome>;

    /// Check a reset or verification OTP and sign the user in
    async fn verify_otp(&self, email: String, otp: String) -> AppResult<AuthSession>;

    async fn resend_otp(&self, email: String) -> AppResult<OtpTimeout>;

    async fn forget_password(&self, email: String) -> AppResult<OtpTimeout>;

    async fn change_password(
        &self,
        current: &CurrentUser,
        old_password: Option<String>,
        new_password: String,
    ) -> AppResult<()>;

    /// New token pair for a caller holding a valid refresh token
    async fn refresh(&self, current: &CurrentUser) -> AppResult<AuthSession>;

    /// Revoke every token issued so far
    async fn logout_all(&self, current: &CurrentUser) -> AppResult<()>;

    /// Provider consent URL with a fresh CSRF state
    async fn oauth_authorize_url(&self, source: LoginSource) -> AppResult<String>;

    async fn oauth_callback(
        &self,
        source: LoginSource,
        code: String,
        state: String,
    ) -> AppResult<AuthSession>;

    /// Resolve a bearer token of the given kind to its user.
    ///
    /// The token's pin must match the user's current logout pin.
    async fn authenticate(&self, token: &str, kind: TokenKind) -> AppResult<CurrentUser>;
}

/// Concrete implementation of AuthService using Unit of Work.
pub struct Authenticator<U: UnitOfWork> {
    uow: Arc<U>,
    otp_store: Arc<dyn OtpStore>,
    oauth_state: Arc<dyn OAuthStateStore>,
    mailer: Arc<dyn Mailer>,
    providers: HashMap<LoginSource, Arc<dyn OAuthProvider>>,
    tokens: TokenIssuer,
    otp_ttl_minutes: u64,
    otp_max_attempts: i32,
    lock_duration: Duration,
}

impl<U: UnitOfWork> Authenticator<U> {
    pub fn new(
        uow: Arc<U>,
        otp_store: Arc<dyn OtpStore>,
        oauth_state: Arc<dyn OAuthStateStore>,
        mailer: Arc<dyn Mailer>,
        config: &Config,
    ) -> Self {
        Self {
            uow,
            otp_store,
            oauth_state,
            mailer,
            providers: HashMap::new(),
            tokens: TokenIssuer::new(config),
            otp_ttl_minutes: config.otp_expire_minutes,
            otp_max_attempts: config.otp_max_attempts,
            lock_duration: Duration::minutes(config.account_lock_minutes),
        }
    }

    /// Enable sign-in through an OAuth provider
    pub fn with_provider(mut self, provider: Arc<dyn OAuthProvider>) -> Self {
        self.providers.insert(provider.source(), provider);
        self
    }

    fn otp_timeout(&self) -> OtpTimeout {
        OtpTimeout {
            timeout: self.otp_ttl_minutes,
            unit: OTP_TIMEOUT_UNIT.to_string(),
        }
    }

    fn provider(&self, source: LoginSource) -> AppResult<&Arc<dyn OAuthProvider>> {
        self.providers
            .get(&source)
            .ok_or_else(|| AppError::bad_request(format!("{} sign-in is not configured", source)))
    }

    /// Store a fresh OTP for `purpose` and queue the email.
    async fn send_otp(&self, email: &str, purpose: OtpPurpose) -> AppResult<()> {
        let otp = Otp::generate();
        self.otp_store
            .store(purpose, email, &otp, self.otp_ttl_minutes)
            .await?;
        self.mailer
            .send_otp(email, &otp, self.otp_ttl_minutes, purpose)
            .await
    }

    async fn touch_activity(&self, user_id: Uuid) {
        if let Err(e) = self
            .uow
            .users()
            .touch_last_activity(user_id, Utc::now())
            .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to update last activity");
        }
    }

    fn session(&self, user: User, forget_password: bool) -> AppResult<AuthSession> {
        let tokens = self.tokens.issue_pair(&user, forget_password)?;
        Ok(AuthSession {
            user: user.into(),
            tokens,
        })
    }

    /// Consume the pending OTP that `code` matches. Reset codes are checked
    /// first.
    async fn consume_otp(&self, email: &str, code: &str) -> AppResult<Option<OtpPurpose>> {
        for purpose in [OtpPurpose::Reset, OtpPurpose::Verify] {
            if self.otp_store.consume(purpose, email, code).await? {
                return Ok(Some(purpose));
            }
        }
        Ok(None)
    }

    async fn load_current(&self, current: &CurrentUser) -> AppResult<User> {
        self.uow
            .users()
            .find_by_id(current.id)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl<U: UnitOfWork> AuthService for Authenticator<U> {
    async fn signup(&self, input: SignupInput) -> AppResult<SignupOutcome> {
        let email = normalize_email(&input.email);
        let password_hash = Password::new(&input.password)?.into_string();
        let SignupInput {
            first_name,
            last_name,
            mfa_enabled,
            ..
        } = input;

        let lookup_email = email.clone();
        let user = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    match ctx.users().find_by_email_with_deleted(&lookup_email).await? {
                        Some(existing) if existing.verified && !existing.is_deleted() => {
                            Err(AppError::conflict("User"))
                        }
                        Some(mut existing) => {
                            existing.restore_for_signup(
                                password_hash,
                                first_name,
                                last_name,
                                mfa_enabled,
                            );
                            ctx.users().update(existing).await
                        }
                        None => {
                            let mut user = User::new(lookup_email, password_hash);
                            user.first_name = first_name;
                            user.last_name = last_name;
                            user.mfa_enabled = mfa_enabled;
                            ctx.users().create(user).await
                        }
                    }
                })
            })
            .await?;

        if let Err(e) = self.send_otp(&email, OtpPurpose::Verify).await {
            tracing::error!(user_id = %user.id, error = %e, "Failed to send signup OTP");
        }
        self.touch_activity(user.id).await;

        tracing::info!(user_id = %user.id, "User signed up");
        Ok(SignupOutcome {
            user: user.into(),
            otp: self.otp_timeout(),
        })
    }

    async fn signin(&self, email: String, password: String) -> AppResult<SigninOutcome> {
        let email = normalize_email(&email);
        let user = self.uow.users().find_by_email(&email).await?;

        // Unknown emails still pay for a hash verification
        let stored = Password::from_hash(
            user.as_ref()
                .map(|u| u.password_hash.as_str())
                .unwrap_or(DUMMY_HASH),
        );
        let password_valid = stored.verify(&password);

        let user = match user {
            Some(user) if password_valid => user,
            _ => return Err(AppError::InvalidCredentials),
        };

        if user.is_locked(Utc::now()) {
            return Err(AppError::AccountLocked);
        }
        if !user.verified {
            return Err(AppError::UserNotVerified);
        }

        if user.mfa_enabled {
            self.send_otp(&user.email, OtpPurpose::Verify).await?;
            return Ok(SigninOutcome::MfaRequired {
                user: user.into(),
                otp: self.otp_timeout(),
            });
        }

        self.touch_activity(user.id).await;
        Ok(SigninOutcome::Authenticated(self.session(user, false)?))
    }

    async fn verify_otp(&self, email: String, otp: String) -> AppResult<AuthSession> {
        let email = normalize_email(&email);
        let mut user = self
            .uow
            .users()
            .find_by_email(&email)
            .await?
            .ok_or(AppError::InvalidOtp)?;

        let now = Utc::now();
        if user.is_locked(now) {
            return Err(AppError::AccountLocked);
        }

        let Some(purpose) = self.consume_otp(&email, &otp).await? else {
            let locked = user.record_failed_otp(self.otp_max_attempts, self.lock_duration, now);
            let user = self.uow.users().update(user).await?;
            if locked {
                tracing::warn!(user_id = %user.id, "Account locked after repeated OTP failures");
            }
            return Err(AppError::InvalidOtp);
        };

        user.complete_otp_verification(now);
        let user = self.uow.users().update(user).await?;

        self.session(user, purpose == OtpPurpose::Reset)
    }

    async fn resend_otp(&self, email: String) -> AppResult<OtpTimeout> {
        let email = normalize_email(&email);
        let user = self
            .uow
            .users()
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::bad_request("User not found"))?;

        if user.verified {
            return Err(AppError::bad_request("User already verified"));
        }

        self.send_otp(&email, OtpPurpose::Verify).await?;
        Ok(self.otp_timeout())
    }

    async fn forget_password(&self, email: String) -> AppResult<OtpTimeout> {
        let email = normalize_email(&email);
        if self.uow.users().find_by_email(&email).await?.is_none() {
            return Err(AppError::bad_request("User not found"));
        }

        self.send_otp(&email, OtpPurpose::Reset).await?;
        Ok(self.otp_timeout())
    }

    async fn change_password(
        &self,
        current: &CurrentUser,
        old_password: Option<String>,
        new_password: String,
    ) -> AppResult<()> {
        let mut user = self.load_current(current).await?;
        if !user.verified {
            return Err(AppError::UserNotVerified);
        }

        let stored = Password::from_hash(user.password_hash.clone());
        if !current.forget_password {
            let old_password = old_password
                .filter(|p| !p.is_empty())
                .ok_or_else(|| AppError::bad_request("Old password is required"))?;
            if !stored.verify(&old_password) {
                return Err(AppError::bad_request("Old password is incorrect"));
            }
        }

        Password::check_policy(&new_password).map_err(|e| AppError::bad_request(e.to_string()))?;
        if stored.verify(&new_password) {
            return Err(AppError::bad_request(
                "New password must be different from the old password",
            ));
        }

        user.change_password(Password::new(&new_password)?.into_string());
        self.uow.users().update(user).await?;

        tracing::info!(user_id = %current.id, "Password changed");
        Ok(())
    }

    async fn refresh(&self, current: &CurrentUser) -> AppResult<AuthSession> {
        let user = self.load_current(current).await?;
        self.touch_activity(user.id).await;
        self.session(user, false)
    }

    async fn logout_all(&self, current: &CurrentUser) -> AppResult<()> {
        let mut user = self.load_current(current).await?;
        user.rotate_logout_pin();
        self.uow.users().update(user).await?;
        Ok(())
    }

    async fn oauth_authorize_url(&self, source: LoginSource) -> AppResult<String> {
        let provider = self.provider(source)?;
        let state = self.oauth_state.issue_state(source.as_str()).await?;
        provider.authorize_url(&state)
    }

    async fn oauth_callback(
        &self,
        source: LoginSource,
        code: String,
        state: String,
    ) -> AppResult<AuthSession> {
        let provider = self.provider(source)?.clone();

        let issued_for = self.oauth_state.consume_state(&state).await?;
        if issued_for.as_deref() != Some(source.as_str()) {
            tracing::warn!(provider = %source, "OAuth callback with unknown state");
            return Err(AppError::Unauthorized);
        }

        let profile = provider.fetch_profile(&code).await?;
        let email = profile
            .email
            .as_deref()
            .map(normalize_email)
            .ok_or(AppError::Unauthorized)?;
        let placeholder_hash = Password::random()?.into_string();

        let user = self
            .uow
            .transaction(move |ctx| {
                Box::pin(async move {
                    match ctx.users().find_by_email_with_deleted(&email).await? {
                        Some(mut user) => {
                            user.link_oauth(
                                source,
                                profile.provider_id,
                                profile.first_name,
                                profile.last_name,
                            );
                            ctx.users().update(user).await
                        }
                        None => {
                            let mut user = User::new(email, placeholder_hash);
                            user.link_oauth(
                                source,
                                profile.provider_id,
                                profile.first_name,
                                profile.last_name,
                            );
                            ctx.users().create(user).await
                        }
                    }
                })
            })
            .await?;

        self.touch_activity(user.id).await;
        tracing::info!(user_id = %user.id, provider = %source, "OAuth sign-in");
        self.session(user, false)
    }

    async fn authenticate(&self, token: &str, kind: TokenKind) -> AppResult<CurrentUser> {
        let claims = self.tokens.verify(token, kind)?;

        let user = self
            .uow
            .users()
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if user.logout_pin != claims.pin {
            return Err(AppError::Unauthorized);
        }

        Ok(CurrentUser {
            id: user.id,
            email: user.email,
            forget_password: claims.forget_password,
        })
    }
}
