//! User domain entity and related types.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Where an account's credentials come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoginSource {
    Default,
    Google,
    Facebook,
}

impl LoginSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoginSource::Default => "default",
            LoginSource::Google => "google",
            LoginSource::Facebook => "facebook",
        }
    }
}

impl From<&str> for LoginSource {
    fn from(s: &str) -> Self {
        match s {
            "google" => LoginSource::Google,
            "facebook" => LoginSource::Facebook,
            _ => LoginSource::Default,
        }
    }
}

impl std::fmt::Display for LoginSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User domain entity
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub verified: bool,
    pub login_source: LoginSource,
    pub authorizer_id: Option<String>,
    pub mfa_enabled: bool,
    pub failed_otp_attempts: i32,
    pub account_locked_until: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Token version. Every issued JWT carries it; rotating it revokes them.
    pub logout_pin: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft delete timestamp (None = active, Some = deleted)
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Fresh, unverified account with password credentials
    pub fn new(email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email,
            password_hash,
            first_name: None,
            last_name: None,
            verified: false,
            login_source: LoginSource::Default,
            authorizer_id: None,
            mfa_enabled: false,
            failed_otp_attempts: 0,
            account_locked_until: None,
            last_activity_at: None,
            logout_pin: new_logout_pin(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// True while a lockout from failed OTP attempts is in force
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.account_locked_until.is_some_and(|until| until > now)
    }

    /// Bring back a soft-deleted or never-verified account for a new signup.
    ///
    /// Names are only overwritten when the new signup supplies them. Failed
    /// OTP attempts and any lockout carry over.
    pub fn restore_for_signup(
        &mut self,
        password_hash: String,
        first_name: Option<String>,
        last_name: Option<String>,
        mfa_enabled: bool,
    ) {
        self.password_hash = password_hash;
        if first_name.is_some() {
            self.first_name = first_name;
        }
        if last_name.is_some() {
            self.last_name = last_name;
        }
        self.verified = false;
        self.login_source = LoginSource::Default;
        self.mfa_enabled = mfa_enabled || self.mfa_enabled;
        self.logout_pin = new_logout_pin();
        self.deleted_at = None;
        self.updated_at = Utc::now();
    }

    /// Revoke every outstanding token
    pub fn rotate_logout_pin(&mut self) {
        self.logout_pin = new_logout_pin();
        self.updated_at = Utc::now();
    }

    /// Count a wrong or expired OTP. Returns true when this attempt locked
    /// the account.
    pub fn record_failed_otp(
        &mut self,
        max_attempts: i32,
        lock_for: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        self.failed_otp_attempts += 1;
        self.updated_at = now;
        if self.failed_otp_attempts >= max_attempts {
            self.account_locked_until = Some(now + lock_for);
            self.failed_otp_attempts = 0;
            return true;
        }
        false
    }

    /// Successful OTP: clears attempts and any lockout, marks the email verified.
    pub fn complete_otp_verification(&mut self, now: DateTime<Utc>) {
        self.failed_otp_attempts = 0;
        self.account_locked_until = None;
        self.verified = true;
        self.last_activity_at = Some(now);
        self.updated_at = now;
    }

    /// Replace the password and revoke outstanding tokens
    pub fn change_password(&mut self, password_hash: String) {
        self.password_hash = password_hash;
        self.rotate_logout_pin();
    }

    /// Attach an OAuth identity. Existing names win over the provider's.
    pub fn link_oauth(
        &mut self,
        source: LoginSource,
        authorizer_id: String,
        first_name: Option<String>,
        last_name: Option<String>,
    ) {
        self.login_source = source;
        self.authorizer_id = Some(authorizer_id);
        self.verified = true;
        if self.first_name.is_none() {
            self.first_name = first_name;
        }
        if self.last_name.is_none() {
            self.last_name = last_name;
        }
        if self.deleted_at.take().is_some() {
            self.logout_pin = new_logout_pin();
        }
        self.updated_at = Utc::now();
    }
}

/// Random token version
pub fn new_logout_pin() -> String {
    Uuid::new_v4().simple().to_string()
}

/// User response (safe to return to client)
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "Jane")]
    pub first_name: Option<String>,
    #[schema(example = "Doe")]
    pub last_name: Option<String>,
    pub verified: bool,
    pub login_source: LoginSource,
    pub mfa_enabled: bool,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            verified: user.verified,
            login_source: user.login_source,
            mfa_enabled: user.mfa_enabled,
            last_activity_at: user.last_activity_at,
            created_at: user.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_is_unverified() {
        let user = User::new("a@example.com".into(), "hash".into());
        assert!(!user.verified);
        assert_eq!(user.login_source, LoginSource::Default);
        assert_eq!(user.failed_otp_attempts, 0);
        assert!(!user.logout_pin.is_empty());
    }

    #[test]
    fn test_lock_expires() {
        let mut user = User::new("a@example.com".into(), "hash".into());
        let now = Utc::now();
        user.account_locked_until = Some(now + Duration::minutes(5));
        assert!(user.is_locked(now));
        assert!(!user.is_locked(now + Duration::minutes(6)));
    }

    #[test]
    fn test_restore_for_signup_resets_state() {
        let mut user = User::new("a@example.com".into(), "old".into());
        user.first_name = Some("Old".into());
        user.last_name = Some("Name".into());
        user.verified = true;
        user.deleted_at = Some(Utc::now());
        let old_pin = user.logout_pin.clone();

        user.restore_for_signup("new".into(), Some("New".into()), None, false);

        assert_eq!(user.password_hash, "new");
        assert_eq!(user.first_name.as_deref(), Some("New"));
        assert_eq!(user.last_name.as_deref(), Some("Name"));
        assert!(!user.verified);
        assert!(!user.is_deleted());
        assert_ne!(user.logout_pin, old_pin);
    }

    #[test]
    fn test_restore_for_signup_keeps_lockout() {
        let mut user = User::new("a@example.com".into(), "old".into());
        let now = Utc::now();
        user.failed_otp_attempts = 3;
        user.account_locked_until = Some(now + Duration::minutes(10));

        user.restore_for_signup("new".into(), None, None, false);

        assert_eq!(user.failed_otp_attempts, 3);
        assert!(user.is_locked(now));
    }

    #[test]
    fn test_failed_otp_locks_at_limit() {
        let mut user = User::new("a@example.com".into(), "hash".into());
        let now = Utc::now();

        assert!(!user.record_failed_otp(3, Duration::minutes(15), now));
        assert!(!user.record_failed_otp(3, Duration::minutes(15), now));
        assert_eq!(user.failed_otp_attempts, 2);
        assert!(!user.is_locked(now));

        assert!(user.record_failed_otp(3, Duration::minutes(15), now));
        assert!(user.is_locked(now));
        assert!(!user.is_locked(now + Duration::minutes(16)));
    }

    #[test]
    fn test_complete_otp_verification_clears_lock() {
        let mut user = User::new("a@example.com".into(), "hash".into());
        let now = Utc::now();
        user.failed_otp_attempts = 2;
        user.account_locked_until = Some(now - Duration::minutes(1));

        user.complete_otp_verification(now);

        assert!(user.verified);
        assert_eq!(user.failed_otp_attempts, 0);
        assert_eq!(user.account_locked_until, None);
        assert_eq!(user.last_activity_at, Some(now));
    }

    #[test]
    fn test_link_oauth_keeps_existing_names_and_restores() {
        let mut user = User::new("a@example.com".into(), "hash".into());
        user.first_name = Some("Kept".into());
        user.deleted_at = Some(Utc::now());

        user.link_oauth(
            LoginSource::Google,
            "google-123".into(),
            Some("Provider".into()),
            Some("Surname".into()),
        );

        assert!(user.verified);
        assert!(!user.is_deleted());
        assert_eq!(user.login_source, LoginSource::Google);
        assert_eq!(user.authorizer_id.as_deref(), Some("google-123"));
        assert_eq!(user.first_name.as_deref(), Some("Kept"));
        assert_eq!(user.last_name.as_deref(), Some("Surname"));
    }

    #[test]
    fn test_change_password_rotates_pin() {
        let mut user = User::new("a@example.com".into(), "old".into());
        let pin = user.logout_pin.clone();
        user.change_password("new".into());
        assert_eq!(user.password_hash, "new");
        assert_ne!(user.logout_pin, pin);
    }

    #[test]
    fn test_login_source_round_trip() {
        for source in [LoginSource::Default, LoginSource::Google, LoginSource::Facebook] {
            assert_eq!(LoginSource::from(source.as_str()), source);
        }
        assert_eq!(LoginSource::from("unknown"), LoginSource::Default);
    }
}
