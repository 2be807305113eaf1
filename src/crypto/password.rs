//! One-way credential hashing: HMAC-SHA256 with a fixed salt, then bcrypt.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::infra::config::CryptoConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct PasswordHasher {
    salt: String,
    rounds: u32,
}

impl PasswordHasher {
    pub fn new(config: &CryptoConfig) -> Self {
        Self::with_salt(&config.salt, config.hash_rounds)
    }

    /// `rounds` is clamped into the range bcrypt accepts.
    pub fn with_salt(salt: &str, rounds: u32) -> Self {
        Self {
            salt: salt.to_string(),
            rounds: rounds.clamp(4, 31),
        }
    }

    pub fn hashed_password(&self, password: &str) -> Result<String, bcrypt::BcryptError> {
        bcrypt::hash(self.hash_string(password), self.rounds)
    }

    pub fn is_password_matched(
        &self,
        password: &str,
        hashed: &str,
    ) -> Result<bool, bcrypt::BcryptError> {
        bcrypt::verify(self.hash_string(password), hashed)
    }

    fn hash_string(&self, value: &str) -> String {
        // HMAC accepts keys of any length.
        let mut mac = HmacSha256::new_from_slice(self.salt.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(value.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_only_the_hashed_password() {
        let hasher = PasswordHasher::with_salt("pepper", 4);
        let hashed = hasher.hashed_password("Secr3t!").unwrap();
        assert!(hashed.starts_with("$2"));
        assert!(hasher.is_password_matched("Secr3t!", &hashed).unwrap());
        assert!(!hasher.is_password_matched("secr3t!", &hashed).unwrap());
    }

    #[test]
    fn salt_is_part_of_the_hash() {
        let a = PasswordHasher::with_salt("salt-a", 4);
        let b = PasswordHasher::with_salt("salt-b", 4);
        let hashed = a.hashed_password("same").unwrap();
        assert!(!b.is_password_matched("same", &hashed).unwrap());
    }

    #[test]
    fn rounds_are_clamped() {
        let hasher = PasswordHasher::with_salt("s", 1);
        let hashed = hasher.hashed_password("x").unwrap();
        assert!(hashed.contains("$04$"));
    }
}
