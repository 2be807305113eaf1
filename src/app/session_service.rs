//! Bearer tokens identifying the caller of guarded routes.
//!
//! Tokens are HS256 JWTs carrying only the user id. Permissions are never
//! read from the token; guarded handlers load the user's stored bitmask.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infra::config::SessionConfig;

pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionService {
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        Self::from_secret(config.secret.as_bytes(), Duration::minutes(config.ttl_minutes))
    }

    pub fn from_secret(secret: &[u8], ttl: Duration) -> Result<Self, SessionError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(SessionError::WeakSecret);
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl,
        })
    }

    pub fn issue(&self, user_id: &str) -> Result<String, SessionError> {
        let now = Utc::now();
        self.sign(&SessionClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        })
    }

    /// Checks the signature and expiry and returns the claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Ok(decode::<SessionClaims>(token, &self.decoding_key, &validation)?.claims)
    }

    fn sign(&self, claims: &SessionClaims) -> Result<String, SessionError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)?)
    }
}

impl std::fmt::Debug for SessionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionService")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

    fn service() -> SessionService {
        SessionService::from_secret(SECRET, Duration::minutes(5)).unwrap()
    }

    #[test]
    fn issued_token_verifies_to_its_user() {
        let svc = service();
        let token = svc.issue("user-1").unwrap();
        let claims = svc.verify(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 300);
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let other =
            SessionService::from_secret(b"another-secret-another-secret-xx", Duration::minutes(5))
                .unwrap();
        let token = other.issue("user-1").unwrap();
        assert!(matches!(service().verify(&token), Err(SessionError::Token(_))));
    }

    #[test]
    fn expired_token_is_rejected() {
        let svc = service();
        let issued = Utc::now() - Duration::hours(2);
        let token = svc
            .sign(&SessionClaims {
                sub: "user-1".into(),
                iat: issued.timestamp(),
                exp: (issued + Duration::hours(1)).timestamp(),
            })
            .unwrap();
        assert!(svc.verify(&token).is_err());
    }

    #[test]
    fn garbage_and_short_secrets_are_rejected() {
        assert!(service().verify("not.a.token").is_err());
        assert!(matches!(
            SessionService::from_secret(b"short", Duration::minutes(5)),
            Err(SessionError::WeakSecret)
        ));
    }
}
