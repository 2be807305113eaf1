//! Reversible password encryption (AES-256-CTR, IV wrapped around the ciphertext).
//!
//! Output layout, all lowercase hex:
//!
//! ```text
//! iv_hex[0..16] | ciphertext_hex | iv_hex[16..32]
//! ```
//!
//! This is deliberately recoverable: admins can reveal a password they set.
//! One-way credential storage lives in [`super::password`].

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

use crate::infra::config::CryptoConfig;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

const IV_LEN: usize = 16;
/// Hex chars of the IV placed on each side of the ciphertext.
const IV_HALF_HEX: usize = IV_LEN;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("crypto key must be 64 hex chars (32 bytes)")]
    InvalidKey,
    #[error("encrypted value too short: {0} chars, need at least {min}", min = IV_HALF_HEX * 2)]
    TooShort(usize),
    #[error("encrypted value is not valid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("decrypted value is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Symmetric cipher bound to one key for its whole lifetime.
#[derive(Clone)]
pub struct PasswordCipher {
    key: [u8; 32],
}

impl PasswordCipher {
    pub fn new(config: &CryptoConfig) -> Result<Self, CipherError> {
        Self::from_hex_key(&config.key_hex)
    }

    pub fn from_hex_key(key_hex: &str) -> Result<Self, CipherError> {
        let bytes = hex::decode(key_hex.trim()).map_err(|_| CipherError::InvalidKey)?;
        let key: [u8; 32] = bytes.try_into().map_err(|_| CipherError::InvalidKey)?;
        Ok(Self { key })
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.as_bytes().to_vec();
        let mut cipher = Aes256Ctr::new(&self.key.into(), &iv.into());
        cipher.apply_keystream(&mut buffer);

        let iv_hex = hex::encode(iv);
        let mut out = String::with_capacity(iv_hex.len() + buffer.len() * 2);
        out.push_str(&iv_hex[..IV_HALF_HEX]);
        out.push_str(&hex::encode(&buffer));
        out.push_str(&iv_hex[IV_HALF_HEX..]);
        out
    }

    pub fn decrypt(&self, text: &str) -> Result<String, CipherError> {
        if !text.is_ascii() {
            return Err(CipherError::InvalidHex(hex::FromHexError::InvalidStringLength));
        }
        if text.len() < IV_HALF_HEX * 2 {
            return Err(CipherError::TooShort(text.len()));
        }

        let tail_start = text.len() - IV_HALF_HEX;
        let iv_hex = format!("{}{}", &text[..IV_HALF_HEX], &text[tail_start..]);
        let iv: [u8; IV_LEN] = hex::decode(iv_hex)?
            .try_into()
            .map_err(|_| CipherError::InvalidHex(hex::FromHexError::InvalidStringLength))?;

        let mut buffer = hex::decode(&text[IV_HALF_HEX..tail_start])?;
        let mut cipher = Aes256Ctr::new(&self.key.into(), &iv.into());
        cipher.apply_keystream(&mut buffer);

        Ok(String::from_utf8(buffer)?)
    }
}

impl std::fmt::Debug for PasswordCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordCipher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn cipher() -> PasswordCipher {
        PasswordCipher::from_hex_key(KEY).unwrap()
    }

    #[test]
    fn round_trips_utf8() {
        let c = cipher();
        for s in ["", "p@ssw0rd", "ラベンダー の 香り", "emoji 🌸 ok"] {
            let enc = c.encrypt(s);
            assert_eq!(c.decrypt(&enc).unwrap(), s);
        }
    }

    #[test]
    fn layout_wraps_iv_around_ciphertext() {
        let enc = cipher().encrypt("abc");
        // 3 bytes of ciphertext -> 6 hex chars, plus 32 chars of IV.
        assert_eq!(enc.len(), 32 + 6);
        assert!(enc.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn random_iv_makes_outputs_differ() {
        let c = cipher();
        let a = c.encrypt("same secret");
        let b = c.encrypt("same secret");
        assert_ne!(a, b);
        assert_eq!(c.decrypt(&a).unwrap(), "same secret");
        assert_eq!(c.decrypt(&b).unwrap(), "same secret");
    }

    #[test]
    fn decrypts_known_vector() {
        // IV = 00..0f, key = 00..1f, AES-256-CTR keystream applied to "hello".
        let c = cipher();
        let iv_hex = "000102030405060708090a0b0c0d0e0f";
        let mut buf = b"hello".to_vec();
        let key: [u8; 32] = hex::decode(KEY).unwrap().try_into().unwrap();
        let iv: [u8; 16] = hex::decode(iv_hex).unwrap().try_into().unwrap();
        Aes256Ctr::new(&key.into(), &iv.into()).apply_keystream(&mut buf);
        let text = format!("{}{}{}", &iv_hex[..16], hex::encode(&buf), &iv_hex[16..]);
        assert_eq!(c.decrypt(&text).unwrap(), "hello");
    }

    #[test]
    fn short_input_fails_fast() {
        let err = cipher().decrypt("abcdef").unwrap_err();
        assert!(matches!(err, CipherError::TooShort(6)));
    }

    #[test]
    fn exactly_iv_length_decrypts_to_empty() {
        let c = cipher();
        assert_eq!(c.decrypt(&"0".repeat(32)).unwrap(), "");
    }

    #[test]
    fn rejects_bad_keys() {
        assert!(matches!(
            PasswordCipher::from_hex_key("abcd"),
            Err(CipherError::InvalidKey)
        ));
        assert!(matches!(
            PasswordCipher::from_hex_key(&"zz".repeat(32)),
            Err(CipherError::InvalidKey)
        ));
    }
}
