//! Centralized configuration (environment variables + defaults).

use anyhow::Context;

/// Database URL must be provided (no default) for safety.
pub fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL").context("DATABASE_URL must be set")
}

/// Pool size for the PostgreSQL connection pool (default 5).
pub fn database_max_connections() -> u32 {
    std::env::var("DATABASE_MAX_CONNECTIONS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(5)
        .max(1)
}

/// Address the API server binds to.
pub fn bind_addr() -> String {
    std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string())
}

/// Lifetime of a forgot-password code, in minutes (default 30).
pub fn forgot_password_code_duration_minutes() -> i32 {
    std::env::var("FORGOT_PASSWORD_CODE_DURATION_MINUTES")
        .ok()
        .and_then(|v| v.parse::<i32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(30)
}

/// Signing secret and lifetime of the bearer tokens issued at login.
#[derive(Clone)]
pub struct SessionConfig {
    /// HMAC-SHA256 signing secret, at least 32 bytes.
    pub secret: String,
    pub ttl_minutes: i64,
}

impl SessionConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let secret = std::env::var("SESSION_SECRET").context("SESSION_SECRET must be set")?;
        let ttl_minutes = std::env::var("SESSION_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(60);
        Ok(Self {
            secret,
            ttl_minutes,
        })
    }
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret", &"<redacted>")
            .field("ttl_minutes", &self.ttl_minutes)
            .finish()
    }
}

/// Key material for the password utilities.
///
/// Built once at startup and handed to [`crate::crypto::PasswordCipher`] and
/// [`crate::crypto::PasswordHasher`]; nothing in the crypto module reads the
/// environment on its own.
#[derive(Clone)]
pub struct CryptoConfig {
    /// 64 hex chars (32 bytes) used as the AES-256 key.
    pub key_hex: String,
    /// HMAC key applied before the one-way bcrypt hash.
    pub salt: String,
    /// bcrypt cost.
    pub hash_rounds: u32,
}

impl CryptoConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let key_hex = std::env::var("CRYPTO_KEY").context("CRYPTO_KEY must be set")?;
        let salt = std::env::var("CRYPTO_SALT").context("CRYPTO_SALT must be set")?;
        let hash_rounds = std::env::var("PASSWORD_HASH_ROUNDS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(4);
        Ok(Self {
            key_hex,
            salt,
            hash_rounds,
        })
    }
}

impl std::fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("key_hex", &"<redacted>")
            .field("salt", &"<redacted>")
            .field("hash_rounds", &self.hash_rounds)
            .finish()
    }
}
