//! Session tokens: HS256-signed JWTs carrying `{userId, email, iat, exp}`.

use hmac::{Hmac, Mac};
use jwt::{SignWithKey, VerifyWithKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

/// Session lifetime in seconds.
pub const SESSION_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("session expired")]
    Expired,

    #[error("invalid session token: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "userId")]
    pub user_id: Uuid,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenSigner {
    key: Hmac<Sha256>,
}

impl TokenSigner {
    pub fn new(secret: &str) -> anyhow::Result<Self> {
        let key = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid JWT secret: {e}"))?;
        Ok(Self { key })
    }

    /// Signs a token valid for `SESSION_TTL_SECS` from `now` (unix seconds).
    pub fn issue(&self, user_id: Uuid, email: &str, now: i64) -> Result<String, TokenError> {
        let claims = Claims {
            user_id,
            email: email.to_string(),
            iat: now,
            exp: now + SESSION_TTL_SECS,
        };
        claims
            .sign_with_key(&self.key)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    /// Checks signature first, then expiry against `now` (unix seconds).
    pub fn verify(&self, token: &str, now: i64) -> Result<Claims, TokenError> {
        let claims: Claims = token
            .verify_with_key(&self.key)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_790_000_000;

    #[test]
    fn test_issue_then_verify_returns_user() {
        let signer = TokenSigner::new("test-secret").unwrap();
        let user_id = Uuid::new_v4();
        let token = signer.issue(user_id, "a@b.com", NOW).unwrap();
        let claims = signer.verify(&token, NOW + 60).unwrap();
        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.exp - claims.iat, SESSION_TTL_SECS);
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = TokenSigner::new("test-secret").unwrap();
        let token = signer.issue(Uuid::new_v4(), "a@b.com", NOW).unwrap();
        let result = signer.verify(&token, NOW + SESSION_TTL_SECS + 1);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_token_from_other_secret_is_invalid() {
        let ours = TokenSigner::new("test-secret").unwrap();
        let theirs = TokenSigner::new("other-secret").unwrap();
        let token = theirs.issue(Uuid::new_v4(), "a@b.com", NOW).unwrap();
        assert!(matches!(ours.verify(&token, NOW), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_garbage_token_is_invalid() {
        let signer = TokenSigner::new("test-secret").unwrap();
        assert!(matches!(
            signer.verify("not.a.jwt", NOW),
            Err(TokenError::Invalid(_))
        ));
    }
}
