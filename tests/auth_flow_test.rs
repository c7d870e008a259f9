//! End-to-end account flows through `Authenticator`.
//!
//! Persistence, the OTP store and the mailer are in-memory so every step
//! from signup to logout runs without Postgres or Redis.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

use baas_api::config::Config;
use baas_api::domain::{Otp, OtpPurpose, TokenKind, User};
use baas_api::errors::{AppError, AppResult};
use baas_api::infra::{
    Mailer, OAuthStateStore, OtpStore, TransactionContext, TxFuture, UnitOfWork, UserRepository,
};
use baas_api::services::{AuthService, Authenticator, CurrentUser, SigninOutcome, SignupInput};

// =============================================================================
// In-memory infrastructure
// =============================================================================

#[derive(Default)]
struct InMemoryUsers {
    rows: Mutex<HashMap<Uuid, User>>,
}

impl InMemoryUsers {
    fn by_email(&self, email: &str) -> Option<User> {
        self.rows
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned()
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_by_id(&self, id: Uuid) -> AppResult<Option<User>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&id)
            .filter(|u| !u.is_deleted())
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.by_email(email).filter(|u| !u.is_deleted()))
    }

    async fn find_by_email_with_deleted(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self.by_email(email))
    }

    async fn create(&self, user: User) -> AppResult<User> {
        self.rows.lock().unwrap().insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, user: User) -> AppResult<User> {
        let mut rows = self.rows.lock().unwrap();
        if !rows.contains_key(&user.id) {
            return Err(AppError::NotFound);
        }
        rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn touch_last_activity(&self, id: Uuid, at: DateTime<Utc>) -> AppResult<()> {
        if let Some(user) = self.rows.lock().unwrap().get_mut(&id) {
            user.last_activity_at = Some(at);
        }
        Ok(())
    }
}

struct InMemoryUow {
    users: Arc<InMemoryUsers>,
}

#[async_trait]
impl UnitOfWork for InMemoryUow {
    fn users(&self) -> Arc<dyn UserRepository> {
        self.users.clone()
    }

    async fn transaction<F, T>(&self, f: F) -> AppResult<T>
    where
        F: for<'a> FnOnce(TransactionContext<'a>) -> TxFuture<'a, T> + Send,
        T: Send,
    {
        f(TransactionContext::new(self.users.as_ref())).await
    }
}

#[derive(Default)]
struct InMemoryOtps {
    codes: Mutex<HashMap<String, String>>,
}

fn otp_key(purpose: OtpPurpose, email: &str) -> String {
    format!("{}:{}", purpose.as_str(), email)
}

#[async_trait]
impl OtpStore for InMemoryOtps {
    async fn store(
        &self,
        purpose: OtpPurpose,
        email: &str,
        otp: &Otp,
        _ttl_minutes: u64,
    ) -> AppResult<()> {
        self.codes
            .lock()
            .unwrap()
            .insert(otp_key(purpose, email), otp.as_str().to_string());
        Ok(())
    }

    async fn consume(&self, purpose: OtpPurpose, email: &str, code: &str) -> AppResult<bool> {
        let mut codes = self.codes.lock().unwrap();
        let key = otp_key(purpose, email);
        if codes.get(&key).map(String::as_str) == Some(code.trim()) {
            codes.remove(&key);
            return Ok(true);
        }
        Ok(false)
    }
}

/// Records every code instead of delivering it
#[derive(Default)]
struct CapturingMailer {
    sent: Mutex<Vec<(String, OtpPurpose, String)>>,
}

impl CapturingMailer {
    fn last_code(&self, email: &str, purpose: OtpPurpose) -> String {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, p, _)| to == email && *p == purpose)
            .map(|(_, _, code)| code.clone())
            .expect("no code sent")
    }
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send_otp(
        &self,
        email: &str,
        otp: &Otp,
        _ttl_minutes: u64,
        purpose: OtpPurpose,
    ) -> AppResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), purpose, otp.as_str().to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct InMemoryOAuthStates {
    states: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl OAuthStateStore for InMemoryOAuthStates {
    async fn issue_state(&self, provider: &str) -> AppResult<String> {
        let state = Uuid::new_v4().to_string();
        self.states
            .lock()
            .unwrap()
            .insert(state.clone(), provider.to_string());
        Ok(state)
    }

    async fn consume_state(&self, state: &str) -> AppResult<Option<String>> {
        Ok(self.states.lock().unwrap().remove(state))
    }
}

// =============================================================================
// Test Helpers
// =============================================================================

const EMAIL: &str = "jane@example.com";
const PASSWORD: &str = "correct-horse-battery";

struct Harness {
    auth: Authenticator<InMemoryUow>,
    users: Arc<InMemoryUsers>,
    mailer: Arc<CapturingMailer>,
}

fn harness() -> Harness {
    let users = Arc::new(InMemoryUsers::default());
    let mailer = Arc::new(CapturingMailer::default());
    let config = Config::default().with_jwt_secrets(
        "access-secret-that-is-at-least-32-chars",
        "refresh-secret-that-is-at-least-32-chars",
    );

    let auth = Authenticator::new(
        Arc::new(InMemoryUow {
            users: users.clone(),
        }),
        Arc::new(InMemoryOtps::default()),
        Arc::new(InMemoryOAuthStates::default()),
        mailer.clone(),
        &config,
    );

    Harness {
        auth,
        users,
        mailer,
    }
}

fn signup_input(email: &str) -> SignupInput {
    SignupInput {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        first_name: Some("Jane".to_string()),
        last_name: Some("Doe".to_string()),
        mfa_enabled: false,
    }
}

/// A code of the same length that is guaranteed not to match `code`
fn wrong_code(code: &str) -> String {
    code.chars()
        .map(|c| if c == '0' { '1' } else { '0' })
        .collect()
}

/// Sign up and verify, returning the access and refresh tokens
async fn verified_account(h: &Harness) -> (String, String) {
    h.auth.signup(signup_input(EMAIL)).await.unwrap();
    let code = h.mailer.last_code(EMAIL, OtpPurpose::Verify);
    let session = h.auth.verify_otp(EMAIL.to_string(), code).await.unwrap();
    (session.tokens.access_token, session.tokens.refresh_token)
}

async fn current(h: &Harness, token: &str) -> CurrentUser {
    h.auth.authenticate(token, TokenKind::Access).await.unwrap()
}

// =============================================================================
// Signup and verification
// =============================================================================

#[tokio::test]
async fn test_signup_creates_unverified_user_and_sends_code() {
    let h = harness();

    let outcome = h.auth.signup(signup_input(" Jane@Example.com ")).await.unwrap();

    assert_eq!(outcome.user.email, EMAIL);
    assert!(!outcome.user.verified);
    assert_eq!(outcome.otp.timeout, 5);
    assert_eq!(outcome.otp.unit, "mins");
    assert_eq!(h.mailer.last_code(EMAIL, OtpPurpose::Verify).len(), 6);
}

#[tokio::test]
async fn test_signin_before_verification_is_rejected() {
    let h = harness();
    h.auth.signup(signup_input(EMAIL)).await.unwrap();

    let err = h
        .auth
        .signin(EMAIL.to_string(), PASSWORD.to_string())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UserNotVerified));
}

#[tokio::test]
async fn test_wrong_code_counts_a_failed_attempt() {
    let h = harness();
    h.auth.signup(signup_input(EMAIL)).await.unwrap();
    let code = h.mailer.last_code(EMAIL, OtpPurpose::Verify);

    let err = h
        .auth
        .verify_otp(EMAIL.to_string(), wrong_code(&code))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidOtp));
    let stored = h.users.by_email(EMAIL).unwrap();
    assert_eq!(stored.failed_otp_attempts, 1);
    assert!(!stored.verified);
}

#[tokio::test]
async fn test_correct_code_verifies_and_issues_tokens() {
    let h = harness();
    h.auth.signup(signup_input(EMAIL)).await.unwrap();
    let code = h.mailer.last_code(EMAIL, OtpPurpose::Verify);

    let session = h.auth.verify_otp(EMAIL.to_string(), code.clone()).await.unwrap();

    assert!(session.user.verified);
    assert_eq!(session.tokens.token_type, "Bearer");
    assert!(h.users.by_email(EMAIL).unwrap().verified);

    // The code is single use
    assert_err!(h.auth.verify_otp(EMAIL.to_string(), code).await);
}

#[tokio::test]
async fn test_signing_up_again_does_not_lift_a_lockout() {
    let h = harness();
    h.auth.signup(signup_input(EMAIL)).await.unwrap();
    let code = h.mailer.last_code(EMAIL, OtpPurpose::Verify);
    for _ in 0..Config::default().otp_max_attempts {
        assert_err!(h.auth.verify_otp(EMAIL.to_string(), wrong_code(&code)).await);
    }
    assert!(h.users.by_email(EMAIL).unwrap().is_locked(Utc::now()));

    assert_ok!(h.auth.signup(signup_input(EMAIL)).await);
    let fresh = h.mailer.last_code(EMAIL, OtpPurpose::Verify);

    assert!(h.users.by_email(EMAIL).unwrap().is_locked(Utc::now()));
    let err = h.auth.verify_otp(EMAIL.to_string(), fresh).await.unwrap_err();
    assert!(matches!(err, AppError::AccountLocked));
}

#[tokio::test]
async fn test_duplicate_signup_of_verified_user_conflicts() {
    let h = harness();
    verified_account(&h).await;

    let err = h.auth.signup(signup_input(EMAIL)).await.unwrap_err();

    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn test_resend_for_verified_user_is_rejected() {
    let h = harness();
    verified_account(&h).await;

    let err = h.auth.resend_otp(EMAIL.to_string()).await.unwrap_err();

    assert!(matches!(err, AppError::BadRequest(ref m) if m == "User already verified"));
}

// =============================================================================
// Tokens
// =============================================================================

#[tokio::test]
async fn test_tokens_only_authenticate_as_their_own_kind() {
    let h = harness();
    let (access, refresh) = verified_account(&h).await;

    let user = current(&h, &access).await;
    assert_eq!(user.email, EMAIL);
    assert!(!user.forget_password);

    assert_err!(h.auth.authenticate(&access, TokenKind::Refresh).await);
    assert_err!(h.auth.authenticate(&refresh, TokenKind::Access).await);
    assert_ok!(h.auth.authenticate(&refresh, TokenKind::Refresh).await);
}

#[tokio::test]
async fn test_refresh_issues_a_usable_pair() {
    let h = harness();
    let (_, refresh) = verified_account(&h).await;

    let caller = h
        .auth
        .authenticate(&refresh, TokenKind::Refresh)
        .await
        .unwrap();
    let session = h.auth.refresh(&caller).await.unwrap();

    assert_ok!(
        h.auth
            .authenticate(&session.tokens.access_token, TokenKind::Access)
            .await
    );
}

#[tokio::test]
async fn test_signin_after_verification_returns_session() {
    let h = harness();
    verified_account(&h).await;

    let outcome = h
        .auth
        .signin(EMAIL.to_string(), PASSWORD.to_string())
        .await
        .unwrap();

    assert!(matches!(outcome, SigninOutcome::Authenticated(_)));
}

#[tokio::test]
async fn test_logout_all_revokes_existing_tokens() {
    let h = harness();
    let (access, refresh) = verified_account(&h).await;
    let caller = current(&h, &access).await;

    h.auth.logout_all(&caller).await.unwrap();

    assert!(matches!(
        h.auth.authenticate(&access, TokenKind::Access).await,
        Err(AppError::Unauthorized)
    ));
    assert_err!(h.auth.authenticate(&refresh, TokenKind::Refresh).await);
}

// =============================================================================
// Password management
// =============================================================================

#[tokio::test]
async fn test_change_password_rotates_tokens() {
    let h = harness();
    let (access, _) = verified_account(&h).await;
    let caller = current(&h, &access).await;

    h.auth
        .change_password(
            &caller,
            Some(PASSWORD.to_string()),
            "a-brand-new-password".to_string(),
        )
        .await
        .unwrap();

    assert!(matches!(
        h.auth.authenticate(&access, TokenKind::Access).await,
        Err(AppError::Unauthorized)
    ));
    assert!(matches!(
        h.auth.signin(EMAIL.to_string(), PASSWORD.to_string()).await,
        Err(AppError::InvalidCredentials)
    ));
    assert_ok!(
        h.auth
            .signin(EMAIL.to_string(), "a-brand-new-password".to_string())
            .await
    );
}

#[tokio::test]
async fn test_change_password_requires_correct_old_password() {
    let h = harness();
    let (access, _) = verified_account(&h).await;
    let caller = current(&h, &access).await;

    let missing = h
        .auth
        .change_password(&caller, None, "a-brand-new-password".to_string())
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::BadRequest(ref m) if m == "Old password is required"));

    let wrong = h
        .auth
        .change_password(
            &caller,
            Some("not-my-password".to_string()),
            "a-brand-new-password".to_string(),
        )
        .await
        .unwrap_err();
    assert!(matches!(wrong, AppError::BadRequest(ref m) if m == "Old password is incorrect"));
}

#[tokio::test]
async fn test_forgotten_password_flow() {
    let h = harness();
    verified_account(&h).await;

    let timeout = h.auth.forget_password(EMAIL.to_string()).await.unwrap();
    assert_eq!(timeout.timeout, 5);

    let code = h.mailer.last_code(EMAIL, OtpPurpose::Reset);
    let session = h.auth.verify_otp(EMAIL.to_string(), code).await.unwrap();
    let caller = current(&h, &session.tokens.access_token).await;
    assert!(caller.forget_password);

    // A reset token does not need the old password
    h.auth
        .change_password(&caller, None, "reset-to-this-one".to_string())
        .await
        .unwrap();

    assert_ok!(
        h.auth
            .signin(EMAIL.to_string(), "reset-to-this-one".to_string())
            .await
    );
}

#[tokio::test]
async fn test_forget_password_for_unknown_email() {
    let h = harness();

    let err = h
        .auth
        .forget_password("nobody@example.com".to_string())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(ref m) if m == "User not found"));
}

// =============================================================================
// OAuth
// =============================================================================

#[tokio::test]
async fn test_oauth_without_configured_provider() {
    let h = harness();

    let err = h
        .auth
        .oauth_authorize_url(baas_api::domain::LoginSource::Google)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::BadRequest(_)));
}
