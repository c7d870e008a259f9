//! JWT issuing and verification.
//!
//! Access and refresh tokens are signed with separate secrets. Both carry
//! the user's logout pin so that rotating it revokes every token at once.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};

use crate::config::{Config, SECONDS_PER_MINUTE, TOKEN_TYPE_BEARER};
use crate::domain::{Claims, TokenKind, TokenPair, User};
use crate::errors::{AppError, AppResult};

/// Signs and checks tokens. Cheap to clone.
#[derive(Clone)]
pub struct TokenIssuer {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(config: &Config) -> Self {
        Self {
            access_secret: config.jwt_secret_bytes().to_vec(),
            refresh_secret: config.jwt_refresh_secret_bytes().to_vec(),
            access_ttl: Duration::minutes(config.access_token_minutes),
            refresh_ttl: Duration::days(config.refresh_token_days),
        }
    }

    /// Issue an access/refresh pair for `user`.
    ///
    /// `forget_password` marks the access token as coming from a password
    /// reset OTP, which lets the holder change the password without the old one.
    pub fn issue_pair(&self, user: &User, forget_password: bool) -> AppResult<TokenPair> {
        let access_token = self.sign(user, TokenKind::Access, forget_password)?;
        let refresh_token = self.sign(user, TokenKind::Refresh, false)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.access_ttl.num_minutes() * SECONDS_PER_MINUTE,
        })
    }

    /// Decode and check a token of the expected kind.
    pub fn verify(&self, token: &str, kind: TokenKind) -> AppResult<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret(kind)),
            &Validation::default(),
        )?;

        if data.claims.kind != kind {
            return Err(AppError::Unauthorized);
        }
        Ok(data.claims)
    }

    fn sign(&self, user: &User, kind: TokenKind, forget_password: bool) -> AppResult<String> {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };

        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            kind,
            pin: user.logout_pin.clone(),
            forget_password,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )?)
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => &self.access_secret,
            TokenKind::Refresh => &self.refresh_secret,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&Config::default().with_jwt_secrets(
            "access-secret-that-is-at-least-32-chars",
            "refresh-secret-that-is-at-least-32-chars",
        ))
    }

    fn user() -> User {
        User::new("jane@example.com".into(), "hash".into())
    }

    #[test]
    fn test_issue_pair_embeds_pin() {
        let issuer = issuer();
        let user = user();
        let pair = issuer.issue_pair(&user, false).unwrap();

        assert_eq!(pair.token_type, "Bearer");
        assert_eq!(pair.expires_in, 3600);

        let claims = issuer.verify(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.pin, user.logout_pin);
        assert!(!claims.forget_password);

        let refresh = issuer.verify(&pair.refresh_token, TokenKind::Refresh).unwrap();
        assert_eq!(refresh.kind, TokenKind::Refresh);
    }

    #[test]
    fn test_forget_password_flag_only_on_access_token() {
        let issuer = issuer();
        let pair = issuer.issue_pair(&user(), true).unwrap();

        assert!(issuer.verify(&pair.access_token, TokenKind::Access).unwrap().forget_password);
        assert!(!issuer.verify(&pair.refresh_token, TokenKind::Refresh).unwrap().forget_password);
    }

    #[test]
    fn test_tokens_are_not_interchangeable() {
        let issuer = issuer();
        let pair = issuer.issue_pair(&user(), false).unwrap();

        assert!(issuer.verify(&pair.refresh_token, TokenKind::Access).is_err());
        assert!(issuer.verify(&pair.access_token, TokenKind::Refresh).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(matches!(
            issuer().verify("not.a.jwt", TokenKind::Access),
            Err(AppError::Jwt(_))
        ));
    }
}
