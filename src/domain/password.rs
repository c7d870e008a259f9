//! Password value object backed by Argon2.
//!
//! Hashes are stored as PHC strings. OAuth-created accounts receive a hash
//! of a random secret so that password sign-in can never match.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::{distr::Alphanumeric, Rng};

use crate::config::MIN_PASSWORD_LENGTH;
use crate::errors::{AppError, AppResult};

/// Length of the throwaway secret hashed for OAuth accounts
const RANDOM_SECRET_LENGTH: usize = 48;

/// Hash that never verifies. Used to keep sign-in timing uniform for
/// unknown emails.
pub const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$ZHVtbXlzYWx0MTIzNDU2$ZHVtbXloYXNoMTIzNDU2Nzg5MDEyMzQ1Njc4OTAxMg";

/// Hashed password.
#[derive(Clone, PartialEq, Eq)]
pub struct Password {
    hash: String,
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

impl Password {
    /// Hash a plain text password after checking the length policy.
    ///
    /// # Errors
    /// Returns a validation error if the password is shorter than
    /// `MIN_PASSWORD_LENGTH`.
    pub fn new(plain_text: &str) -> AppResult<Self> {
        Self::check_policy(plain_text)?;
        Ok(Self {
            hash: hash(plain_text)?,
        })
    }

    /// Hash of a random secret nobody knows.
    pub fn random() -> AppResult<Self> {
        let secret: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_SECRET_LENGTH)
            .map(char::from)
            .collect();
        Ok(Self {
            hash: hash(&secret)?,
        })
    }

    /// Wrap a hash loaded from storage.
    pub fn from_hash(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    /// Reject passwords that do not meet the length policy.
    pub fn check_policy(plain_text: &str) -> AppResult<()> {
        if plain_text.chars().count() < MIN_PASSWORD_LENGTH as usize {
            return Err(AppError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }

    pub fn into_string(self) -> String {
        self.hash
    }

    /// True if `plain_text` matches. Malformed hashes never match.
    pub fn verify(&self, plain_text: &str) -> bool {
        match PasswordHash::new(&self.hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(plain_text.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl From<Password> for String {
    fn from(password: Password) -> Self {
        password.hash
    }
}

fn hash(plain_text: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain_text.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::internal(format!("Password hash failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hash_and_verify() {
        let password = Password::new("SecurePassword123!").unwrap();

        assert!(password.verify("SecurePassword123!"));
        assert!(!password.verify("WrongPassword123"));
    }

    #[test]
    fn test_password_from_hash_round_trip() {
        let password = Password::new("TestPassword123").unwrap();
        let restored = Password::from_hash(password.as_str());
        assert!(restored.verify("TestPassword123"));
    }

    #[test]
    fn test_same_password_different_salts() {
        let first = Password::new("SamePassword123").unwrap();
        let second = Password::new("SamePassword123").unwrap();

        assert_ne!(first.as_str(), second.as_str());
        assert!(first.verify("SamePassword123"));
        assert!(second.verify("SamePassword123"));
    }

    #[test]
    fn test_password_policy() {
        assert!(Password::new("short").is_err());
        assert!(Password::new("12345678").is_ok());
        assert!(Password::check_policy("1234567").is_err());
    }

    #[test]
    fn test_random_password_rejects_common_guesses() {
        let password = Password::random().unwrap();
        assert!(!password.verify(""));
        assert!(!password.verify("password"));
    }

    #[test]
    fn test_dummy_hash_never_verifies() {
        let dummy = Password::from_hash(DUMMY_HASH);
        assert!(!dummy.verify("anything"));
        assert!(!dummy.verify(""));
    }

    #[test]
    fn test_malformed_hash_does_not_panic() {
        assert!(!Password::from_hash("not-a-hash").verify("whatever"));
    }
}
